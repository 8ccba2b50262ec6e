//! Services that keep a push store in sync with the backend.

pub mod event_broadcaster;
mod job_fetcher;
mod job_poller;
pub mod pollers;
mod push_loader;
mod selection;
mod sync;

pub use event_broadcaster::EventBroadcaster;
pub use job_fetcher::FetchReport;
pub use job_poller::{PollKind, PollOutcome};
pub use pollers::{PollerHandle, start_job_poller, start_push_poller};
pub use sync::{PollPhase, PollState, SyncService};
