//! Job model: identity, lifecycle state, and engine options.

mod options;
mod types;

pub use options::{CredentialSource, FormatOptions, OptionsError, SubtitleSpec};
pub use types::{Job, JobKey, JobStatus, Thumbnail, TitleQuality, LOADING_TITLE};
