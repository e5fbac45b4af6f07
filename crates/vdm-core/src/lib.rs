pub mod config;
pub mod logging;

pub mod control;
pub mod engine;
pub mod events;
pub mod job;
pub mod naming;
pub mod prefetch;
pub mod retry;
pub mod scheduler;
pub mod site;
pub mod store;
pub mod worker;

pub use engine::{DownloadEngine, YtDlpEngine};
pub use events::{EventBus, JobEvent};
pub use job::{FormatOptions, Job, JobKey, JobStatus};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use site::{BuiltinSites, SiteResolver};
