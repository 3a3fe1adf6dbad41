//! The simulation engine.
//!
//! An [`Engine`] owns the limiter configuration, the limiter state, the
//! event log and the analytics history behind a single lock. Commands,
//! admission decisions, refill ticks and analytics samples each run as one
//! critical section, and every read returns a consistent copy.

mod scheduler;
mod traffic;

pub use traffic::TrafficGenerator;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::analytics::{Analytics, AnalyticsHistory};
use crate::clock::{Clock, RuntimeClock, Timestamp};
use crate::config::{AppConfig, EngineConfig, RateLimiterConfig, SimulationConfig};
use crate::error::{Result, SimulatorError};
use crate::events::{EventLog, RequestEvent};
use crate::ratelimit::{Algorithm, RateLimiterState};
use scheduler::TaskSet;

/// Everything the engine mutates, guarded by one lock.
#[derive(Debug)]
pub(crate) struct Model {
    pub(crate) limiter: RateLimiterConfig,
    pub(crate) simulation: SimulationConfig,
    pub(crate) state: RateLimiterState,
    pub(crate) log: EventLog,
    pub(crate) history: AnalyticsHistory,
    pub(crate) running: bool,
    pub(crate) auto_refill: bool,
    pub(crate) next_request_id: u64,
    pub(crate) traffic: TrafficGenerator,
    pub(crate) run_started_at: Option<Timestamp>,
    pub(crate) driver_generation: u64,
    pub(crate) refill_generation: u64,
    pub(crate) tasks: TaskSet,
}

impl Model {
    /// Run one request through the active discipline and log the outcome.
    pub(crate) fn admit(&mut self, now: Timestamp) -> RequestEvent {
        let id = format!("req-{}", self.next_request_id);
        self.next_request_id += 1;
        let client_id = self.traffic.pick_client(self.simulation.client_count);

        let decision = self
            .limiter
            .algorithm
            .decide(&self.state, &self.limiter, &self.log, now);
        self.state = decision.next_state;

        let event = RequestEvent::new(id, now, decision.allowed, client_id);
        if event.allowed {
            trace!(id = %event.id, client = %event.client_id, "Request allowed");
        } else {
            debug!(
                id = %event.id,
                client = %event.client_id,
                algorithm = %self.limiter.algorithm,
                "Request blocked"
            );
        }
        self.log.push(event.clone());
        event
    }

    /// Whether a bounded run has used up its duration at `now`.
    pub(crate) fn run_expired(&self, now: Timestamp) -> bool {
        match (self.simulation.run_limit(), self.run_started_at) {
            (Some(limit), Some(started)) => now - started >= limit.as_millis() as Timestamp,
            _ => false,
        }
    }

    /// Stop the traffic driver, invalidating any pending fire.
    pub(crate) fn halt_driver(&mut self) {
        self.running = false;
        self.run_started_at = None;
        self.driver_generation += 1;
        self.tasks.cancel_driver();
    }
}

/// State shared between the engine handle and its background tasks.
pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) engine_config: EngineConfig,
    pub(crate) model: Mutex<Model>,
}

/// Consistent copy of every read view the engine exposes.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub engine_id: Uuid,
    pub taken_at: Timestamp,
    pub config: RateLimiterConfig,
    pub simulation: SimulationConfig,
    pub state: RateLimiterState,
    pub running: bool,
    pub auto_refill: bool,
    pub events: Vec<RequestEvent>,
    pub analytics: Analytics,
    pub analytics_history: Vec<Analytics>,
}

/// Admission-control simulation engine.
///
/// Must be created inside a Tokio runtime: the analytics sampler and the
/// refill scheduler start immediately. Dropping the engine cancels every
/// task it started.
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Create an engine timestamping with the runtime clock.
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(RuntimeClock::new()))
    }

    /// Create an engine with an explicit clock.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let now = clock.now_ms();
        let traffic = match config.engine.traffic_seed {
            Some(seed) => TrafficGenerator::seeded(seed),
            None => TrafficGenerator::new(),
        };

        let model = Model {
            state: RateLimiterState::new(&config.limiter, now),
            log: EventLog::new(config.engine.event_log_capacity),
            history: AnalyticsHistory::new(config.engine.history_capacity),
            limiter: config.limiter,
            simulation: config.simulation,
            running: false,
            auto_refill: true,
            next_request_id: 0,
            traffic,
            run_started_at: None,
            driver_generation: 0,
            refill_generation: 0,
            tasks: TaskSet::default(),
        };

        let engine = Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                clock,
                engine_config: config.engine,
                model: Mutex::new(model),
            }),
        };

        {
            let mut model = engine.shared.model.lock();
            model.tasks.sampler = Some(scheduler::spawn_sampler(engine.shared.clone())?);
            engine.rearm_refill(&mut model)?;

            info!(
                engine = %engine.shared.id,
                algorithm = %model.limiter.algorithm,
                requests_per_second = model.limiter.requests_per_second,
                burst_capacity = model.limiter.burst_capacity,
                "Engine started"
            );
        }

        Ok(engine)
    }

    /// Unique id of this engine instance.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    // Commands

    /// Replace the rate limiter configuration.
    ///
    /// Applies from the next decision or tick. Capacity shrinks clamp the
    /// bucket down, and the refill cadence is re-derived when the algorithm
    /// or rate changes.
    pub fn set_config(&self, config: RateLimiterConfig) -> Result<()> {
        let checked = config
            .validate()
            .and_then(|()| self.shared.engine_config.check_limiter(&config));
        if let Err(e) = checked {
            warn!(engine = %self.shared.id, error = %e, "Rejected rate limiter config");
            return Err(e);
        }

        let mut model = self.shared.model.lock();
        let rearm = model.limiter.algorithm != config.algorithm
            || model.limiter.requests_per_second != config.requests_per_second;

        model.state.apply_config(&config);
        model.limiter = config;

        info!(
            engine = %self.shared.id,
            algorithm = %model.limiter.algorithm,
            requests_per_second = model.limiter.requests_per_second,
            burst_capacity = model.limiter.burst_capacity,
            window_size_ms = model.limiter.window_size_ms,
            "Rate limiter reconfigured"
        );

        if rearm {
            self.rearm_refill(&mut model)?;
        }
        Ok(())
    }

    /// Replace the traffic configuration. The driver picks it up when it
    /// next re-arms.
    pub fn set_simulation(&self, simulation: SimulationConfig) -> Result<()> {
        if let Err(e) = simulation.validate() {
            warn!(engine = %self.shared.id, error = %e, "Rejected simulation config");
            return Err(e);
        }

        let mut model = self.shared.model.lock();
        info!(
            engine = %self.shared.id,
            request_rate = simulation.request_rate,
            burst_pattern = simulation.burst_pattern,
            client_count = simulation.client_count,
            duration = simulation.duration,
            "Simulation reconfigured"
        );
        model.simulation = simulation;
        Ok(())
    }

    /// Start generating traffic. Starting a running simulation is a no-op.
    pub fn start_simulation(&self) -> Result<()> {
        let mut model = self.shared.model.lock();
        if model.running {
            return Ok(());
        }

        model.driver_generation += 1;
        let generation = model.driver_generation;
        let handle = scheduler::spawn_driver(self.shared.clone(), generation)?;

        model.running = true;
        model.run_started_at = Some(self.shared.clock.now_ms());
        model.tasks.driver = Some(handle);

        info!(
            engine = %self.shared.id,
            request_rate = model.simulation.request_rate,
            algorithm = %model.limiter.algorithm,
            "Simulation started"
        );
        Ok(())
    }

    /// Stop generating traffic. State and log are kept.
    pub fn stop_simulation(&self) {
        let mut model = self.shared.model.lock();
        if !model.running {
            return;
        }
        model.halt_driver();
        info!(
            engine = %self.shared.id,
            requests = model.state.request_count(),
            "Simulation stopped"
        );
    }

    /// Flip between running and stopped, returning the new running flag.
    pub fn toggle_simulation(&self) -> Result<bool> {
        if self.is_running() {
            self.stop_simulation();
            Ok(false)
        } else {
            self.start_simulation()?;
            Ok(true)
        }
    }

    /// Enable or disable automatic token refill.
    pub fn set_auto_refill(&self, enabled: bool) -> Result<()> {
        let mut model = self.shared.model.lock();
        if model.auto_refill == enabled {
            return Ok(());
        }
        model.auto_refill = enabled;
        info!(engine = %self.shared.id, enabled, "Auto-refill toggled");
        self.rearm_refill(&mut model)
    }

    /// Flip automatic refill, returning the new setting.
    pub fn toggle_auto_refill(&self) -> Result<bool> {
        let enabled = !self.auto_refill_enabled();
        self.set_auto_refill(enabled)?;
        Ok(enabled)
    }

    /// Add tokens to the bucket, stopping at capacity.
    pub fn fill(&self, amount: f64) -> Result<()> {
        let mut model = self.manual_bucket_op("fill", amount)?;
        model.state.fill(amount);
        debug!(
            engine = %self.shared.id,
            amount,
            tokens_remaining = model.state.tokens_remaining(),
            "Manual fill"
        );
        Ok(())
    }

    /// Remove tokens from the bucket, stopping at zero.
    pub fn drain(&self, amount: f64) -> Result<()> {
        let mut model = self.manual_bucket_op("drain", amount)?;
        model.state.drain(amount);
        debug!(
            engine = %self.shared.id,
            amount,
            tokens_remaining = model.state.tokens_remaining(),
            "Manual drain"
        );
        Ok(())
    }

    /// Run one synthetic request through the active discipline right now.
    pub fn submit_request(&self) -> RequestEvent {
        let now = self.shared.clock.now_ms();
        self.shared.model.lock().admit(now)
    }

    /// Stop traffic and restore a full bucket, empty log and history,
    /// enabled auto-refill and a fresh request id sequence, atomically.
    pub fn reset(&self) -> Result<()> {
        let now = self.shared.clock.now_ms();
        let mut model = self.shared.model.lock();

        if model.running {
            model.halt_driver();
        }
        model.log.clear();
        model.state = RateLimiterState::new(&model.limiter, now);
        model.history.clear();
        model.auto_refill = true;
        model.next_request_id = 0;

        info!(engine = %self.shared.id, "Engine reset");
        self.rearm_refill(&mut model)
    }

    /// Cancel every background task. Reads keep working afterwards.
    pub fn shutdown(&self) {
        let mut model = self.shared.model.lock();
        model.running = false;
        model.run_started_at = None;
        model.driver_generation += 1;
        model.refill_generation += 1;
        model.tasks.cancel_all();
        info!(engine = %self.shared.id, "Engine shut down");
    }

    // Read views

    pub fn config(&self) -> RateLimiterConfig {
        self.shared.model.lock().limiter.clone()
    }

    pub fn simulation(&self) -> SimulationConfig {
        self.shared.model.lock().simulation.clone()
    }

    pub fn state(&self) -> RateLimiterState {
        self.shared.model.lock().state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.model.lock().running
    }

    pub fn auto_refill_enabled(&self) -> bool {
        self.shared.model.lock().auto_refill
    }

    /// Every retained event, oldest first.
    pub fn events(&self) -> Vec<RequestEvent> {
        self.shared.model.lock().log.to_vec()
    }

    /// The newest `n` events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<RequestEvent> {
        self.shared.model.lock().log.recent(n)
    }

    /// Analytics computed from the log as of now.
    pub fn analytics(&self) -> Analytics {
        let now = self.shared.clock.now_ms();
        let model = self.shared.model.lock();
        Analytics::compute(&model.log, now, self.shared.engine_config.current_rps_window_ms)
    }

    /// Past analytics samples, oldest first.
    pub fn analytics_history(&self) -> Vec<Analytics> {
        self.shared.model.lock().history.to_vec()
    }

    /// All read views taken under one lock.
    pub fn snapshot(&self) -> EngineSnapshot {
        let now = self.shared.clock.now_ms();
        let model = self.shared.model.lock();
        EngineSnapshot {
            engine_id: self.shared.id,
            taken_at: now,
            config: model.limiter.clone(),
            simulation: model.simulation.clone(),
            state: model.state.clone(),
            running: model.running,
            auto_refill: model.auto_refill,
            events: model.log.to_vec(),
            analytics: Analytics::compute(
                &model.log,
                now,
                self.shared.engine_config.current_rps_window_ms,
            ),
            analytics_history: model.history.to_vec(),
        }
    }

    /// Cancel the current refill task and start a new one when the token
    /// bucket is active with auto-refill on.
    fn rearm_refill(&self, model: &mut Model) -> Result<()> {
        model.refill_generation += 1;
        model.tasks.cancel_refill();

        if model.limiter.algorithm == Algorithm::TokenBucket && model.auto_refill {
            let handle = scheduler::spawn_refill(self.shared.clone(), model.refill_generation)?;
            model.tasks.refill = Some(handle);
            debug!(
                engine = %self.shared.id,
                period = ?model.limiter.refill_period(),
                "Refill scheduler armed"
            );
        }
        Ok(())
    }

    fn manual_bucket_op(
        &self,
        op: &str,
        amount: f64,
    ) -> Result<parking_lot::MutexGuard<'_, Model>> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SimulatorError::Validation(format!(
                "{} amount must be a non-negative number, got {}",
                op, amount
            )));
        }

        let model = self.shared.model.lock();
        if model.limiter.algorithm != Algorithm::TokenBucket {
            return Err(SimulatorError::Unsupported(format!(
                "{} requires the token-bucket algorithm, active is {}",
                op, model.limiter.algorithm
            )));
        }
        Ok(model)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shared.model.lock().tasks.cancel_all();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.shared.id)
            .field("engine_config", &self.shared.engine_config)
            .finish()
    }
}
