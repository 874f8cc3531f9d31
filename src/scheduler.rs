use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

/// Work fired on every tick.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self);
}

/// Flag held while a job is running. Released on drop.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag.clone()))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fixed-interval ticker that runs one job, never two at once.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    run_on_start: bool,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(interval: Duration, run_on_start: bool) -> Self {
        Self {
            interval,
            run_on_start,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the job unless a previous run is still in progress.
    /// Returns whether the job ran.
    pub async fn fire<J: Job + ?Sized>(&self, job: &J) -> bool {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("Previous run still in progress, skipping tick");
            return false;
        };
        job.run().await;
        true
    }

    /// Starts ticking on the current runtime.
    ///
    /// The first run happens one interval after start unless `run_on_start`
    /// is set. A tick that arrives while a run is in progress is delayed,
    /// so runs are always at least one interval apart.
    pub fn start<J: Job + ?Sized>(self, job: Arc<J>) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            if self.run_on_start {
                self.fire(job.as_ref()).await;
            }
            tracing::info!(interval_secs = self.interval.as_secs(), "Scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Stop may have been requested while the previous run was in flight.
                        if *stop_rx.borrow() {
                            break;
                        }
                        self.fire(job.as_ref()).await;
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::info!("Scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }
}

pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops ticking. A run already in progress finishes first.
    pub async fn stop(self) {
        // Send only fails when the loop is gone already.
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
    }
}
