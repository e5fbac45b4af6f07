//! CLI command handlers, one per file.

mod get;
mod info;
mod sites;

pub use get::run_get;
pub use info::run_info;
pub use sites::run_sites;
