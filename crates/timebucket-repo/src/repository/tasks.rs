use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::RepositoryInner;

/// Run `job` every `every` until `cancel` fires.
///
/// The first run happens one full interval after spawning. Each run happens on
/// the blocking pool; a cycle in progress finishes before the task observes
/// cancellation, and a sleeping task wakes as soon as the token is cancelled.
pub(super) fn spawn_periodic(
    handle: &Handle,
    name: &'static str,
    every: Duration,
    cancel: CancellationToken,
    inner: Arc<RepositoryInner>,
    job: fn(&RepositoryInner),
) -> JoinHandle<()> {
    handle.spawn(async move {
        let mut tick = interval_at(Instant::now() + every, every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let inner = Arc::clone(&inner);
                    if let Err(e) = tokio::task::spawn_blocking(move || job(&inner)).await {
                        tracing::error!(task = name, error=%e, "maintenance cycle aborted");
                    }
                }
            }
        }

        tracing::debug!(task = name, "maintenance task stopped");
    })
}
