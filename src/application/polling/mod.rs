//! Periodic job-status polling.

mod handle;
mod job_poller;

pub use handle::PollHandle;
pub use job_poller::{
    FetchError, JobPoller, PollDisposition, PollEvent, PollPolicy, PolledStatus, StatusFetcher,
};
