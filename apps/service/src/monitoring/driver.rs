use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// What a tick decided; tells the driver loop whether its timer may
/// keep firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran (probe dispatched, or result discarded mid-flight).
    Ran,
    /// The schedule is paused or gone; the driver must terminate.
    Terminate,
}

/// Executes one tick for a schedule. Implemented by the engine.
#[async_trait]
pub trait ScheduleRunner: Send + Sync {
    async fn run_tick(&self, schedule_id: Uuid) -> TickOutcome;
}

struct DriverHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Registry of running schedule drivers, one recurring timer task per
/// schedule id. Every lifecycle operation consults this map, so an
/// entry always points at a live driver.
pub struct DriverRegistry {
    drivers: Mutex<HashMap<Uuid, DriverHandle>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self { drivers: Mutex::new(HashMap::new()) }
    }

    /// Starts a recurring driver for a schedule. The first tick lands
    /// one full interval after start. Fails if a driver for this id is
    /// already registered; callers edit schedules stop-then-start.
    pub fn start(
        self: &Arc<Self>,
        runner: Arc<dyn ScheduleRunner>,
        schedule_id: Uuid,
        every: Duration,
    ) -> Result<()> {
        let mut drivers = self.drivers.lock().unwrap();
        if drivers.contains_key(&schedule_id) {
            return Err(Error::AlreadyRunning(schedule_id));
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut timer = time::interval_at(time::Instant::now() + every, every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = timer.tick() => {
                        if runner.run_tick(schedule_id).await == TickOutcome::Terminate {
                            break;
                        }
                    }
                }
            }

            // A self-terminating driver clears its own entry; the task
            // id guard keeps it from evicting a restarted successor.
            registry.discard(schedule_id, tokio::task::id());
            debug!(%schedule_id, "schedule driver stopped");
        });

        drivers.insert(schedule_id, DriverHandle { stop_tx, task });
        Ok(())
    }

    /// Signals a driver to exit. Future ticks are cancelled
    /// immediately; a probe already in flight still finishes and
    /// records. Stopping an id with no driver is a valid no-op.
    pub fn stop(&self, schedule_id: Uuid) {
        if let Some(handle) = self.drivers.lock().unwrap().remove(&schedule_id) {
            let _ = handle.stop_tx.send(true);
        }
    }

    /// Signals every running driver to exit.
    pub fn stop_all(&self) {
        let mut drivers = self.drivers.lock().unwrap();
        for (_, handle) in drivers.drain() {
            let _ = handle.stop_tx.send(true);
        }
    }

    pub fn is_running(&self, schedule_id: Uuid) -> bool {
        self.drivers.lock().unwrap().contains_key(&schedule_id)
    }

    pub fn running_count(&self) -> usize {
        self.drivers.lock().unwrap().len()
    }

    fn discard(&self, schedule_id: Uuid, task_id: tokio::task::Id) {
        let mut drivers = self.drivers.lock().unwrap();
        if drivers.get(&schedule_id).is_some_and(|handle| handle.task.id() == task_id) {
            drivers.remove(&schedule_id);
        }
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
