//! Background policy reload.
//!
//! One task per module. Each tick takes the module's exclusive lock and
//! reloads every rule from the store. Shutdown is cooperative: `shutdown`
//! flips a `watch` flag and awaits the task, which exits at its next select.
use crate::module::SharedEngine;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub(crate) struct Reloader {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reloader {
    pub(crate) fn spawn(module: String, interval: Duration, engine: SharedEngine) -> Self {
        let (shutdown, mut signal) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    changed = signal.changed() => {
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => reload_once(&module, &engine).await,
                }
            }
            tracing::debug!(module = %module, "policy reloader exiting");
        });
        Self { shutdown, handle }
    }

    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            tracing::warn!(error = %err, "policy reloader task failed");
        }
    }
}

async fn reload_once(module: &str, engine: &SharedEngine) {
    let mut slot = engine.write().await;
    let Some(engine) = slot.as_mut() else {
        return;
    };
    match engine.load_all_rules().await {
        Ok(()) => tracing::trace!(module, "policy reloaded"),
        Err(err) => tracing::warn!(module, error = %err, "policy reload failed"),
    }
}
