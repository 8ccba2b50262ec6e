//! Background pollers for jobs and pushes.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::job_poller::PollOutcome;
use super::sync::SyncService;

/// A running poller. Dropping the handle leaves the task running.
pub struct PollerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Cancel the poller and wait for its task to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            error!("Poller task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Start the job poller.
///
/// Each tick runs one delta poll, or a full refetch when the data is stale.
/// The first tick fires one period after start.
pub fn start_job_poller(service: SyncService) -> PollerHandle {
    let period = service.settings().job_poll_interval;
    spawn_poller("job", service, period, |service| async move {
        match service.poll_jobs().await {
            Ok(PollOutcome::Applied {
                kind,
                received,
                changed,
            }) => debug!(?kind, received, changed, "Job poll complete"),
            Ok(PollOutcome::Skipped) => debug!("Job poll skipped"),
            Err(e) => error!("Job poll error: {}", e),
        }
    })
}

/// Start the push poller.
pub fn start_push_poller(service: SyncService) -> PollerHandle {
    let period = service.settings().push_poll_interval;
    spawn_poller("push", service, period, |service| async move {
        match service.poll_pushes().await {
            Ok(added) if !added.is_empty() => info!(count = added.len(), "New pushes loaded"),
            Ok(_) => debug!("Push poll found nothing new"),
            Err(e) => error!("Push poll error: {}", e),
        }
    })
}

fn spawn_poller<F, Fut>(
    name: &'static str,
    service: SyncService,
    period: Duration,
    tick: F,
) -> PollerHandle
where
    F: Fn(SyncService) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = service.shutdown_token().child_token();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        info!(
            "Starting {} poller (interval: {} seconds)",
            name,
            period.as_secs()
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                _ = ticker.tick() => tick(service.clone()).await,
            }
        }

        info!("{} poller stopped", name);
    });

    PollerHandle { token, handle }
}
