//! Periodic daily metric aggregation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::MetricsService;

/// Recomputes today's metrics every `every` until `shutdown` fires or its
/// sender is dropped. The first run happens immediately. A failed run is
/// logged and the loop continues.
pub fn spawn_metrics_scheduler(
    service: Arc<MetricsService>,
    every: Duration,
    shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = shutdown;

        tracing::info!(interval_secs = every.as_secs(), "metrics scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = service.calculate_daily_metrics(None).await {
                        tracing::error!(error = %err, "scheduled metrics run failed");
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("metrics scheduler stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::{AnalyticsStore, MemoryPersistence};

    #[tokio::test(start_paused = true)]
    async fn runs_on_each_tick_and_stops_on_shutdown() {
        let store = Arc::new(MemoryPersistence::new());
        let service = Arc::new(MetricsService::new(
            Arc::clone(&store) as Arc<dyn AnalyticsStore>,
            9.99,
            7,
        ));
        let (tx, rx) = oneshot::channel();
        let handle = spawn_metrics_scheduler(service, Duration::from_secs(60), rx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let Ok(rows) = store.recent_daily_metrics(10).await else {
            panic!("read failed");
        };
        assert_eq!(rows.len(), 1);

        let _ = tx.send(());
        let Ok(()) = handle.await else {
            panic!("scheduler panicked");
        };
    }
}
