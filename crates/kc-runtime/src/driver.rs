//! Periodic control-loop driver.
//!
//! A [`ControlLoop`] owns one [`Cascade`] and the collaborators it talks to.
//! Each cycle fixes a wake time, reads the setpoint and measurements, steps
//! the cascade, writes the actuator and then sleeps until the wake time.
//! The actuator is forced to its safe value whenever the loop stops,
//! including on every error path.

use crate::clock::{Clock, Wake};
use crate::error::{RuntimeError, RuntimeResult};
use crate::report::{Reporter, Severity, TracingReporter};
use crate::stop::StopSignal;
use kc_controls::{
    Actuator, ActuatorOutput, Cascade, CascadeStep, ControlError, MeasurementProvider,
    SampleConfig, SensorChannel, SetpointSource,
};
use kc_core::{CycleStats, Real};
use kc_project::schema::OverrunPolicyDef;

const OVERRUN_MESSAGE: &str = "Update interval is too short";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Reaction to a cycle that leaves no slack before its wake time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverrunPolicy {
    /// Report a warning and start the next cycle immediately.
    #[default]
    Warn,
    /// Report a fatal error and stop the loop.
    Abort,
}

impl From<OverrunPolicyDef> for OverrunPolicy {
    fn from(def: OverrunPolicyDef) -> Self {
        match def {
            OverrunPolicyDef::Warn => Self::Warn,
            OverrunPolicyDef::Abort => Self::Abort,
        }
    }
}

/// Collaborators a loop reads from and writes to.
pub struct LoopIo {
    pub measurements: Box<dyn MeasurementProvider + Send>,
    pub setpoint: Box<dyn SetpointSource + Send>,
    pub actuator: Box<dyn Actuator + Send>,
}

impl LoopIo {
    pub fn new(
        measurements: impl MeasurementProvider + Send + 'static,
        setpoint: impl SetpointSource + Send + 'static,
        actuator: impl Actuator + Send + 'static,
    ) -> Self {
        Self {
            measurements: Box::new(measurements),
            setpoint: Box::new(setpoint),
            actuator: Box::new(actuator),
        }
    }
}

/// Timing and wiring of a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub sample: SampleConfig,
    /// Channel compared against the setpoint.
    pub sensor: SensorChannel,
    /// Channel feeding the inner stage of a cascaded loop.
    pub inner_sensor: Option<SensorChannel>,
    pub overrun_policy: OverrunPolicy,
}

impl LoopSettings {
    pub fn new(sample: SampleConfig, sensor: impl Into<SensorChannel>) -> Self {
        Self {
            sample,
            sensor: sensor.into(),
            inner_sensor: None,
            overrun_policy: OverrunPolicy::default(),
        }
    }

    pub fn with_inner_sensor(mut self, channel: impl Into<SensorChannel>) -> Self {
        self.inner_sensor = Some(channel.into());
        self
    }

    pub fn with_overrun_policy(mut self, policy: OverrunPolicy) -> Self {
        self.overrun_policy = policy;
        self
    }
}

/// One completed cycle, as seen by a run observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRecord {
    pub started_at: Real,
    pub step: CascadeStep,
    pub overran: bool,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSummary {
    pub loop_id: String,
    pub stats: CycleStats,
    /// Last value successfully written to the actuator.
    pub last_output: Option<ActuatorOutput>,
}

pub struct ControlLoop {
    id: String,
    settings: LoopSettings,
    cascade: Cascade,
    io: LoopIo,
    clock: Box<dyn Clock + Send>,
    reporter: Box<dyn Reporter + Send>,
    state: LoopState,
    stats: CycleStats,
    last_output: Option<ActuatorOutput>,
}

impl ControlLoop {
    /// Bind a cascade to its collaborators. The loop starts out stopped.
    ///
    /// # Errors
    ///
    /// Returns error if the inner sensor wiring does not match the cascade
    /// (a cascaded loop needs one, a single-stage loop must not have one).
    pub fn new(
        id: impl Into<String>,
        settings: LoopSettings,
        cascade: Cascade,
        io: LoopIo,
        clock: Box<dyn Clock + Send>,
    ) -> RuntimeResult<Self> {
        let id = id.into();
        match (cascade.is_cascaded(), settings.inner_sensor.is_some()) {
            (true, false) => {
                return Err(RuntimeError::config(format!(
                    "loop {id}: a cascaded controller needs an inner sensor"
                )));
            }
            (false, true) => {
                return Err(RuntimeError::config(format!(
                    "loop {id}: an inner sensor was given to a single-stage controller"
                )));
            }
            _ => {}
        }

        let reporter = Box::new(TracingReporter::for_loop(id.clone()));
        Ok(Self {
            id,
            settings,
            cascade,
            io,
            clock,
            reporter,
            state: LoopState::Stopped,
            stats: CycleStats::new(),
            last_output: None,
        })
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + Send + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn last_output(&self) -> Option<ActuatorOutput> {
        self.last_output
    }

    pub fn summary(&self) -> LoopSummary {
        LoopSummary {
            loop_id: self.id.clone(),
            stats: self.stats,
            last_output: self.last_output,
        }
    }

    /// Write the safe output and enter `Running`. Does nothing if already
    /// running.
    ///
    /// # Errors
    ///
    /// Returns error if the actuator rejects the initial write.
    pub fn start(&mut self) -> RuntimeResult<()> {
        if self.state == LoopState::Running {
            return Ok(());
        }
        let safe = self.cascade.safe_output();
        if let Err(e) = self.io.actuator.write_output(safe) {
            self.reporter
                .report(Severity::Fatal, &format!("Failed to initialise actuator: {e}"));
            self.stop();
            return Err(e.into());
        }
        self.last_output = Some(safe);
        self.state = LoopState::Running;
        self.reporter.report(Severity::Info, "Loop started");
        Ok(())
    }

    /// Run exactly one cycle without sleeping.
    ///
    /// # Errors
    ///
    /// Returns error if the loop is not running or a collaborator fails. A
    /// failed cycle stops the loop before returning.
    pub fn cycle(&mut self) -> RuntimeResult<CascadeStep> {
        if self.state != LoopState::Running {
            return Err(ControlError::InvalidArg {
                what: "loop is not running",
            }
            .into());
        }
        match self.try_cycle() {
            Ok(step) => Ok(step),
            Err(e) => {
                self.reporter.report(Severity::Fatal, &e.to_string());
                self.stop();
                Err(e)
            }
        }
    }

    fn try_cycle(&mut self) -> RuntimeResult<CascadeStep> {
        let setpoint = finite_input("setpoint", self.io.setpoint.read_setpoint()?)?;
        let primary = self
            .io
            .measurements
            .read_measured_value(&self.settings.sensor)?;
        let primary = finite_input(self.settings.sensor.as_str(), primary)?;
        let secondary = match &self.settings.inner_sensor {
            Some(channel) => {
                let value = self.io.measurements.read_measured_value(channel)?;
                Some(finite_input(channel.as_str(), value)?)
            }
            None => None,
        };

        let now = self.clock.now();
        let step = self.cascade.step(setpoint, primary, secondary, now)?;
        self.io.actuator.write_output(step.output())?;
        self.last_output = Some(step.output());
        self.log_step(&step);
        Ok(step)
    }

    fn log_step(&self, step: &CascadeStep) {
        if let Some(outer) = &step.outer {
            tracing::info!(
                loop_id = %self.id,
                target = outer.target,
                actual = outer.actual,
                output = outer.output.as_power(),
                integrator = outer.integrator.unwrap_or_default(),
                "Outer loop PID target/actual/output/integrator"
            );
        }
        let inner = &step.inner;
        match inner.output {
            ActuatorOutput::Power(output) => tracing::info!(
                loop_id = %self.id,
                target = inner.target,
                actual = inner.actual,
                output,
                integrator = inner.integrator.unwrap_or_default(),
                "PID target/actual/output/integrator"
            ),
            ActuatorOutput::Switch(on) => tracing::info!(
                loop_id = %self.id,
                target = inner.target,
                actual = inner.actual,
                "Hysteresis actor stays {}",
                if on { "ON" } else { "OFF" }
            ),
        }
    }

    /// Start the loop and run it until `stop` fires.
    ///
    /// # Errors
    ///
    /// Returns error on start-up failure, collaborator failure, or an
    /// overrun under [`OverrunPolicy::Abort`]. The actuator is at its safe
    /// value whenever this returns.
    pub fn run(&mut self, stop: &StopSignal) -> RuntimeResult<LoopSummary> {
        self.run_with_observer(stop, |_| {})
    }

    /// Like [`ControlLoop::run`], calling `observer` after every cycle.
    pub fn run_with_observer<F>(
        &mut self,
        stop: &StopSignal,
        mut observer: F,
    ) -> RuntimeResult<LoopSummary>
    where
        F: FnMut(&CycleRecord),
    {
        self.start()?;

        while !stop.is_stopped() {
            let started_at = self.clock.now();
            let wake_time = self.settings.sample.wake_time(started_at);

            let step = self.cycle()?;

            let finished = self.clock.now();
            let overran = self.settings.sample.overran(wake_time, finished);
            self.stats.record(finished - started_at, overran);
            observer(&CycleRecord {
                started_at,
                step,
                overran,
            });

            if overran {
                self.handle_overrun()?;
                continue;
            }
            if self.clock.sleep_until(wake_time, stop) == Wake::Stopped {
                break;
            }
        }

        self.stop();
        Ok(self.summary())
    }

    fn handle_overrun(&mut self) -> RuntimeResult<()> {
        match self.settings.overrun_policy {
            OverrunPolicy::Warn => {
                self.reporter.report(Severity::Warning, OVERRUN_MESSAGE);
                Ok(())
            }
            OverrunPolicy::Abort => {
                self.reporter.report(Severity::Fatal, OVERRUN_MESSAGE);
                self.stop();
                Err(RuntimeError::Overrun {
                    loop_id: self.id.clone(),
                    interval_s: self.settings.sample.update_interval,
                })
            }
        }
    }

    /// Force the actuator to its safe value and enter `Stopped`.
    ///
    /// Safe to call any number of times; a failed write is logged, not
    /// returned.
    pub fn stop(&mut self) {
        let safe = self.cascade.safe_output();
        match self.io.actuator.write_output(safe) {
            Ok(()) => self.last_output = Some(safe),
            Err(e) => tracing::error!(
                loop_id = %self.id,
                error = %e,
                "Failed to write safe output while stopping"
            ),
        }
        if self.state == LoopState::Running {
            self.state = LoopState::Stopped;
            self.reporter.report(Severity::Info, "Loop stopped");
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        if self.state == LoopState::Running {
            self.stop();
        }
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("cascade", &self.cascade)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Collaborator values must be finite before they reach the cascade.
fn finite_input(what: &str, value: Real) -> RuntimeResult<Real> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ControlError::Collaborator {
            what: format!("{what} is not finite: {value}"),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::stop_channel;
    use kc_controls::{FixedSetpoint, Pid, PidGains, SensorCache};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Virtual clock; sensor reads can be made to cost time.
    #[derive(Clone, Default)]
    pub(super) struct TestClock {
        time: Arc<Mutex<Real>>,
    }

    impl TestClock {
        fn advance(&self, dt: Real) {
            *self.time.lock().unwrap() += dt;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Real {
            *self.time.lock().unwrap()
        }

        fn sleep_until(&mut self, deadline: Real, stop: &StopSignal) -> Wake {
            if stop.is_stopped() {
                return Wake::Stopped;
            }
            let mut t = self.time.lock().unwrap();
            *t = (*t).max(deadline);
            Wake::Elapsed
        }
    }

    #[derive(Clone, Default)]
    pub(super) struct SharedActuator {
        writes: Arc<Mutex<Vec<ActuatorOutput>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl Actuator for SharedActuator {
        fn write_output(&mut self, output: ActuatorOutput) -> kc_controls::ControlResult<()> {
            if *self.fail.lock().unwrap() {
                return Err(ControlError::Collaborator {
                    what: "relay offline".to_string(),
                });
            }
            self.writes.lock().unwrap().push(output);
            Ok(())
        }
    }

    struct SlowSensors {
        cache: SensorCache,
        clock: TestClock,
        cost: Real,
    }

    impl MeasurementProvider for SlowSensors {
        fn read_measured_value(&self, channel: &SensorChannel) -> kc_controls::ControlResult<Real> {
            self.clock.advance(self.cost);
            self.cache.read_measured_value(channel)
        }
    }

    pub(super) fn pid_loop(cost: Real, policy: OverrunPolicy) -> (ControlLoop, SharedActuator, TestClock) {
        let clock = TestClock::default();
        let mut cache = SensorCache::new();
        cache.set("kettle", 60.0);
        let sensors = SlowSensors {
            cache,
            clock: clock.clone(),
            cost,
        };
        let actuator = SharedActuator::default();
        let pid = Pid::new(PidGains::new(10.0, 2.0, 1.0), 0.0, 100.0).unwrap();
        let settings = LoopSettings::new(SampleConfig::new(2.5).unwrap(), "kettle")
            .with_overrun_policy(policy);
        let control_loop = ControlLoop::new(
            "hlt",
            settings,
            Cascade::single(pid),
            LoopIo::new(sensors, FixedSetpoint(65.0), actuator.clone()),
            Box::new(clock.clone()),
        )
        .unwrap();
        (control_loop, actuator, clock)
    }

    #[test]
    fn start_writes_safe_output() {
        let (mut l, actuator, _) = pid_loop(0.0, OverrunPolicy::Warn);
        assert_eq!(l.state(), LoopState::Stopped);
        l.start().unwrap();
        assert_eq!(l.state(), LoopState::Running);
        assert_eq!(*actuator.writes.lock().unwrap(), vec![ActuatorOutput::Power(0.0)]);
    }

    #[test]
    fn cycle_requires_running_loop() {
        let (mut l, actuator, _) = pid_loop(0.0, OverrunPolicy::Warn);
        assert!(l.cycle().is_err());
        assert!(actuator.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn first_cycle_is_proportional() {
        let (mut l, actuator, _) = pid_loop(0.0, OverrunPolicy::Warn);
        l.start().unwrap();
        let step = l.cycle().unwrap();
        assert_eq!(step.output(), ActuatorOutput::Power(50.0));
        assert_eq!(actuator.writes.lock().unwrap().last(), Some(&ActuatorOutput::Power(50.0)));
    }

    #[test]
    fn stop_is_idempotent_and_safe() {
        let (mut l, actuator, _) = pid_loop(0.0, OverrunPolicy::Warn);
        l.start().unwrap();
        l.cycle().unwrap();
        l.stop();
        l.stop();
        assert_eq!(l.state(), LoopState::Stopped);
        let writes = actuator.writes.lock().unwrap();
        assert_eq!(writes.last(), Some(&ActuatorOutput::Power(0.0)));
        assert_eq!(l.last_output(), Some(ActuatorOutput::Power(0.0)));
    }

    #[test]
    fn stop_survives_failing_actuator() {
        let (mut l, actuator, _) = pid_loop(0.0, OverrunPolicy::Warn);
        l.start().unwrap();
        *actuator.fail.lock().unwrap() = true;
        l.stop();
        assert_eq!(l.state(), LoopState::Stopped);
    }

    #[test]
    fn failed_write_stops_loop() {
        let (mut l, actuator, _) = pid_loop(0.0, OverrunPolicy::Warn);
        l.start().unwrap();
        *actuator.fail.lock().unwrap() = true;
        assert!(matches!(l.cycle(), Err(RuntimeError::Control(_))));
        assert_eq!(l.state(), LoopState::Stopped);
    }

    #[test]
    fn missing_sensor_stops_loop() {
        let clock = TestClock::default();
        let actuator = SharedActuator::default();
        let pid = Pid::new(PidGains::new(10.0, 2.0, 1.0), 0.0, 100.0).unwrap();
        let mut l = ControlLoop::new(
            "hlt",
            LoopSettings::new(SampleConfig::default(), "missing"),
            Cascade::single(pid),
            LoopIo::new(SensorCache::new(), FixedSetpoint(65.0), actuator.clone()),
            Box::new(clock),
        )
        .unwrap();

        let (_handle, signal) = stop_channel();
        let err = l.run(&signal).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Control(ControlError::MissingSensor { .. })
        ));
        assert_eq!(l.state(), LoopState::Stopped);
        assert_eq!(
            actuator.writes.lock().unwrap().last(),
            Some(&ActuatorOutput::Power(0.0))
        );
    }

    /// Returns NaN on one chosen read and 60.0 otherwise.
    struct GlitchingSensor {
        reads: AtomicUsize,
        glitch_on: usize,
    }

    impl MeasurementProvider for GlitchingSensor {
        fn read_measured_value(&self, _: &SensorChannel) -> kc_controls::ControlResult<Real> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(if n == self.glitch_on { Real::NAN } else { 60.0 })
        }
    }

    #[test]
    fn non_finite_reading_stops_loop_safely() {
        let actuator = SharedActuator::default();
        let pid = Pid::new(PidGains::new(10.0, 2.0, 1.0), 0.0, 100.0).unwrap();
        let sensors = GlitchingSensor {
            reads: AtomicUsize::new(0),
            glitch_on: 2,
        };
        let mut l = ControlLoop::new(
            "hlt",
            LoopSettings::new(SampleConfig::default(), "kettle"),
            Cascade::single(pid),
            LoopIo::new(sensors, FixedSetpoint(65.0), actuator.clone()),
            Box::new(TestClock::default()),
        )
        .unwrap();

        let err = l.run(&StopSignal::never()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Control(ControlError::Collaborator { .. })
        ));
        assert_eq!(l.state(), LoopState::Stopped);
        let writes = actuator.writes.lock().unwrap();
        assert_eq!(
            *writes,
            vec![
                ActuatorOutput::Power(0.0),
                ActuatorOutput::Power(50.0),
                ActuatorOutput::Power(0.0)
            ]
        );
        assert!(l.cascade().inner().integrator().is_some_and(|i| i.is_finite()));
    }

    #[test]
    fn cascade_without_inner_sensor_is_rejected() {
        let outer = Pid::new(PidGains::new(5.0, 2.0, 1.0), 0.0, 75.0).unwrap();
        let inner = Pid::new(PidGains::new(5.0, 0.25, 0.0), 0.0, 100.0).unwrap();
        let result = ControlLoop::new(
            "mash",
            LoopSettings::new(SampleConfig::default(), "mash"),
            Cascade::new(outer, inner),
            LoopIo::new(SensorCache::new(), FixedSetpoint(65.0), SharedActuator::default()),
            Box::new(TestClock::default()),
        );
        assert!(matches!(result, Err(RuntimeError::Config { .. })));
    }

    #[test]
    fn run_advances_by_update_interval() {
        let (mut l, _, clock) = pid_loop(0.0, OverrunPolicy::Warn);
        let (handle, signal) = stop_channel();
        let mut starts = Vec::new();
        let summary = l
            .run_with_observer(&signal, |record| {
                starts.push(record.started_at);
                if starts.len() == 4 {
                    handle.stop();
                }
            })
            .unwrap();

        assert_eq!(starts, vec![0.0, 2.5, 5.0, 7.5]);
        assert_eq!(summary.stats.cycles(), 4);
        assert_eq!(summary.stats.overruns(), 0);
        assert_eq!(summary.last_output, Some(ActuatorOutput::Power(0.0)));
        assert_eq!(clock.now(), 7.5);
    }

    #[test]
    fn overrun_warns_and_continues() {
        let (l, _, _) = pid_loop(2.3, OverrunPolicy::Warn);
        let reporter = crate::report::CollectingReporter::new();
        let mut l = l.with_reporter(reporter.clone());
        let (handle, signal) = stop_channel();
        let mut cycles = 0;
        let summary = l
            .run_with_observer(&signal, |record| {
                assert!(record.overran);
                cycles += 1;
                if cycles == 3 {
                    handle.stop();
                }
            })
            .unwrap();

        assert_eq!(summary.stats.overruns(), 3);
        assert_eq!(reporter.count(Severity::Warning), 3);
        assert_eq!(reporter.count(Severity::Fatal), 0);
    }

    #[test]
    fn overrun_aborts_under_abort_policy() {
        let (l, actuator, _) = pid_loop(2.3, OverrunPolicy::Abort);
        let reporter = crate::report::CollectingReporter::new();
        let mut l = l.with_reporter(reporter.clone());

        let err = l.run(&StopSignal::never()).unwrap_err();
        assert!(matches!(err, RuntimeError::Overrun { .. }));
        assert_eq!(l.state(), LoopState::Stopped);
        assert_eq!(reporter.count(Severity::Fatal), 1);
        assert_eq!(
            actuator.writes.lock().unwrap().last(),
            Some(&ActuatorOutput::Power(0.0))
        );
    }

    #[test]
    fn drop_forces_safe_output() {
        let (mut l, actuator, _) = pid_loop(0.0, OverrunPolicy::Warn);
        l.start().unwrap();
        l.cycle().unwrap();
        drop(l);
        assert_eq!(
            actuator.writes.lock().unwrap().last(),
            Some(&ActuatorOutput::Power(0.0))
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::tests::pid_loop;
    use super::*;
    use crate::stop::stop_channel;
    use proptest::prelude::*;

    fn run_cycles(cost: Real, cycles: u64) -> LoopSummary {
        let (mut l, _, _) = pid_loop(cost, OverrunPolicy::Warn);
        let (handle, signal) = stop_channel();
        let mut seen = 0;
        l.run_with_observer(&signal, |_| {
            seen += 1;
            if seen == cycles {
                handle.stop();
            }
        })
        .unwrap()
    }

    proptest! {
        #[test]
        fn cycles_with_slack_never_overrun(cost in 0.0..2.2_f64, cycles in 1u64..20) {
            let summary = run_cycles(cost, cycles);
            prop_assert_eq!(summary.stats.cycles(), cycles);
            prop_assert_eq!(summary.stats.overruns(), 0);
            prop_assert!((summary.stats.max_work_seconds() - cost).abs() < 1e-9);
        }

        #[test]
        fn slow_cycles_all_overrun(cost in 2.3..10.0_f64, cycles in 1u64..20) {
            let summary = run_cycles(cost, cycles);
            prop_assert_eq!(summary.stats.cycles(), cycles);
            prop_assert_eq!(summary.stats.overruns(), cycles);
            prop_assert_eq!(summary.last_output, Some(ActuatorOutput::Power(0.0)));
        }
    }
}
