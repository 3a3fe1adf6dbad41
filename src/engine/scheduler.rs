//! Cancellable background tasks: refill ticks, the traffic driver and the
//! analytics sampler.
//!
//! Each task re-reads the current configuration when it re-arms. Cancelling
//! bumps the task's generation under the model lock and aborts its handle,
//! and a task re-checks its generation under the same lock before every
//! mutation, so nothing fires once cancellation has returned.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, trace};

use super::Shared;
use crate::analytics::Analytics;
use crate::error::{Result, SimulatorError};

/// Handles of the tasks owned by one engine.
#[derive(Debug, Default)]
pub(crate) struct TaskSet {
    pub(crate) refill: Option<JoinHandle<()>>,
    pub(crate) driver: Option<JoinHandle<()>>,
    pub(crate) sampler: Option<JoinHandle<()>>,
}

impl TaskSet {
    pub(crate) fn cancel_refill(&mut self) {
        if let Some(handle) = self.refill.take() {
            handle.abort();
        }
    }

    pub(crate) fn cancel_driver(&mut self) {
        if let Some(handle) = self.driver.take() {
            handle.abort();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        self.cancel_refill();
        self.cancel_driver();
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
    }
}

fn runtime(task: &str) -> Result<Handle> {
    Handle::try_current().map_err(|e| {
        error!(task, error = %e, "Cannot arm scheduled task");
        SimulatorError::Scheduler(format!("cannot start {} task: {}", task, e))
    })
}

/// Add one token every refill period while `generation` is current.
pub(crate) fn spawn_refill(shared: Arc<Shared>, generation: u64) -> Result<JoinHandle<()>> {
    let handle = runtime("refill")?;
    Ok(handle.spawn(async move {
        loop {
            let period = {
                let model = shared.model.lock();
                if model.refill_generation != generation {
                    return;
                }
                model.limiter.refill_period()
            };

            sleep(period).await;

            let mut model = shared.model.lock();
            if model.refill_generation != generation {
                return;
            }
            if model.state.refill_one() {
                trace!(
                    engine = %shared.id,
                    tokens_remaining = model.state.tokens_remaining(),
                    "Refilled token"
                );
            }
        }
    }))
}

/// Submit synthetic requests until cancelled or the run limit elapses.
///
/// The driver is a self-rearming one-shot timer: each delay is drawn from
/// the simulation config current when it re-arms.
pub(crate) fn spawn_driver(shared: Arc<Shared>, generation: u64) -> Result<JoinHandle<()>> {
    let handle = runtime("traffic driver")?;
    Ok(handle.spawn(async move {
        loop {
            let delay = {
                let mut model = shared.model.lock();
                if model.driver_generation != generation {
                    return;
                }
                let simulation = model.simulation.clone();
                model.traffic.next_delay(&simulation)
            };

            sleep(delay).await;

            let now = shared.clock.now_ms();
            let mut model = shared.model.lock();
            if model.driver_generation != generation {
                return;
            }

            if model.run_expired(now) {
                model.halt_driver();
                info!(
                    engine = %shared.id,
                    requests = model.state.request_count(),
                    "Simulation reached its duration, stopping"
                );
                return;
            }

            model.admit(now);
        }
    }))
}

/// Record an analytics snapshot every sampling period until the engine
/// shuts down.
pub(crate) fn spawn_sampler(shared: Arc<Shared>) -> Result<JoinHandle<()>> {
    let handle = runtime("analytics sampler")?;
    Ok(handle.spawn(async move {
        let period = shared.engine_config.analytics_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let now = shared.clock.now_ms();
            let mut model = shared.model.lock();
            let sample = Analytics::compute(
                &model.log,
                now,
                shared.engine_config.current_rps_window_ms,
            );
            trace!(
                engine = %shared.id,
                total = sample.total_requests,
                success_rate = sample.success_rate,
                "Sampled analytics"
            );
            model.history.push(sample);
        }
    }))
}
