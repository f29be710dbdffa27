//! Worker supervisor: one acquisition at a time.
//!
//! The supervisor owns the device handle, one [`WorkerSlot`] per background
//! mode and the producer side of the event channel. It enforces that at most
//! one acquisition (a worker run, a one-shot read or an integration-time
//! change) touches the device at any time, routes stop requests to the
//! running worker, and publishes which controls should be enabled.
//!
//! # Completion ordering
//!
//! When a run's loop returns, the supervisor reserves a slot in the event
//! channel, then, under the exclusion lock, returns the worker to `Idle` and
//! enqueues [`AcquisitionEvent::Finished`]. A concurrent `start_*` waits for
//! that lock, so the next run's events are always queued behind the previous
//! run's completion. `on_finished` callbacks run afterwards and may start the
//! next run themselves.

use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::acquisition::worker::lock;
use crate::acquisition::{ContinuousWorker, IntegrateWorker, RunContext, StopSignal, WorkerSlot};
use crate::config::AcquisitionSettings;
use crate::core::{AcquisitionConfig, AcquisitionMode, Spectrum, WorkerState};
use crate::data::ResultSink;
use crate::error::DaqError;
use crate::hardware::Spectrometer;
use crate::messages::{event_channel, AcquisitionEvent, EventSender, RunOutcome};

/// Callback invoked once per finished run.
pub type FinishedCallback = Arc<dyn Fn(&RunOutcome) + Send + Sync>;

/// Which controls a front end should enable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    /// Acquisition currently holding the device
    pub running: Option<AcquisitionMode>,
}

impl ControlState {
    /// Single / integrate / continuous buttons.
    pub fn start_enabled(&self) -> bool {
        self.running.is_none()
    }

    /// Stop button.
    pub fn stop_enabled(&self) -> bool {
        matches!(
            self.running,
            Some(AcquisitionMode::Integrate | AcquisitionMode::Continuous)
        )
    }
}

struct Shared {
    device: Arc<dyn Spectrometer>,
    integrate: WorkerSlot,
    continuous: WorkerSlot,
    active: Mutex<Option<AcquisitionMode>>,
    config: Mutex<AcquisitionConfig>,
    callbacks: Mutex<Vec<FinishedCallback>>,
    controls: watch::Sender<ControlState>,
    events: EventSender,
}

impl Shared {
    fn slot(&self, mode: AcquisitionMode) -> Option<&WorkerSlot> {
        match mode {
            AcquisitionMode::Integrate => Some(&self.integrate),
            AcquisitionMode::Continuous => Some(&self.continuous),
            AcquisitionMode::Single => None,
        }
    }

    /// Marks `mode` as the device owner, or reports who already owns it.
    fn claim(&self, mode: AcquisitionMode) -> Result<StopSignal, DaqError> {
        let mut active = lock(&self.active);
        if let Some(running) = *active {
            return Err(DaqError::AlreadyRunning(running));
        }
        *active = Some(mode);
        let signal = self
            .slot(mode)
            .map_or_else(StopSignal::never, WorkerSlot::begin);
        self.controls.send_replace(ControlState {
            running: Some(mode),
        });
        Ok(signal)
    }

    fn release_locked(&self, active: &mut Option<AcquisitionMode>, mode: AcquisitionMode) {
        if let Some(slot) = self.slot(mode) {
            slot.reset();
        }
        *active = None;
        self.controls.send_replace(ControlState::default());
    }

    async fn execute(
        self: Arc<Self>,
        mode: AcquisitionMode,
        config: AcquisitionConfig,
        stop: StopSignal,
    ) {
        let Some(slot) = self.slot(mode) else {
            return;
        };
        let emitted = slot.emitted().clone();
        let worker = slot.worker();
        let ctx = RunContext {
            device: Arc::clone(&self.device),
            config,
            stop,
            events: self.events.clone(),
            emitted: emitted.clone(),
        };

        let device = Arc::clone(&self.device);
        let events = self.events.clone();
        let scan_count = (mode == AcquisitionMode::Integrate).then_some(config.scan_count);
        // A run whose device setup fails reports only `Finished`.
        let run = tokio::spawn(async move {
            device
                .set_integration_time(config.integration_time_ms)
                .await?;
            events
                .send(AcquisitionEvent::Started { mode, scan_count })
                .await?;
            worker.run(ctx).await
        });

        let result = match run.await {
            Ok(result) => result,
            Err(join_error) => Err(DaqError::WorkerPanicked(join_error.to_string())),
        };
        slot.finish();

        let outcome = match result {
            Ok(summary) => RunOutcome::success(mode, summary),
            Err(err) => {
                warn!("{} run failed: {}", mode, err);
                RunOutcome::failure(mode, emitted.get(), err)
            }
        };
        info!(
            %mode,
            spectra = outcome.spectra_emitted,
            stopped_early = outcome.stopped_early,
            success = outcome.is_success(),
            "Acquisition finished"
        );

        let permit = self.events.reserve().await;
        {
            let mut active = lock(&self.active);
            self.release_locked(&mut active, mode);
            match permit {
                Ok(permit) => permit.send(AcquisitionEvent::Finished(outcome.clone())),
                Err(_) => warn!("Result sink closed; {} completion not delivered", mode),
            }
        }

        let callbacks = lock(&self.callbacks).clone();
        for callback in callbacks {
            callback(&outcome);
        }
    }
}

/// Releases a foreground claim (single read, integration time change) on drop.
struct ForegroundClaim {
    shared: Arc<Shared>,
    mode: AcquisitionMode,
}

impl Drop for ForegroundClaim {
    fn drop(&mut self) {
        let mut active = lock(&self.shared.active);
        self.shared.release_locked(&mut active, self.mode);
    }
}

/// Starts, stops and observes acquisition runs.
///
/// # Example
///
/// ```rust,ignore
/// let device = Arc::new(MockSpectrometer::new(2048));
/// let (supervisor, mut sink) = WorkerSupervisor::connect(device, &settings).await?;
/// supervisor.start_integrate(AcquisitionConfig::new(50, 5))?;
/// let outcome = sink.wait_finished().await;
/// ```
pub struct WorkerSupervisor {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl WorkerSupervisor {
    /// Applies the initial integration time and creates the sink channel.
    ///
    /// Must be called from within a Tokio runtime; later `start_*` calls may
    /// come from any thread.
    pub async fn connect(
        device: Arc<dyn Spectrometer>,
        settings: &AcquisitionSettings,
    ) -> Result<(Self, ResultSink), DaqError> {
        let config = settings.acquisition_config();
        check_integration_time(device.as_ref(), config.integration_time_ms)?;
        device
            .set_integration_time(config.integration_time_ms)
            .await?;

        let (events, rx) = event_channel(settings.channel_capacity);
        let (controls, _) = watch::channel(ControlState::default());
        let shared = Arc::new(Shared {
            device,
            integrate: WorkerSlot::new(Arc::new(IntegrateWorker::new())),
            continuous: WorkerSlot::new(Arc::new(ContinuousWorker::new())),
            active: Mutex::new(None),
            config: Mutex::new(config),
            callbacks: Mutex::new(Vec::new()),
            controls,
            events,
        });
        info!(
            device = %shared.device.name(),
            integration_time_ms = config.integration_time_ms,
            "Supervisor connected"
        );

        let supervisor = Self {
            shared,
            runtime: Handle::current(),
        };
        Ok((supervisor, ResultSink::new(rx)))
    }

    /// Starts an integrate run in the background.
    ///
    /// Fails with `Configuration` for a zero scan count or an out-of-range
    /// integration time, and with `AlreadyRunning` while another acquisition
    /// holds the device. Neither failure touches the hardware.
    pub fn start_integrate(&self, config: AcquisitionConfig) -> Result<(), DaqError> {
        config.validate_scan_count()?;
        check_integration_time(self.shared.device.as_ref(), config.integration_time_ms)?;
        let stop = self.shared.claim(AcquisitionMode::Integrate)?;
        *lock(&self.shared.config) = config;
        self.spawn_run(AcquisitionMode::Integrate, config, stop);
        Ok(())
    }

    /// Starts a continuous run with the persisted integration time.
    pub fn start_continuous(&self) -> Result<(), DaqError> {
        let stop = self.shared.claim(AcquisitionMode::Continuous)?;
        let config = self.config();
        self.spawn_run(AcquisitionMode::Continuous, config, stop);
        Ok(())
    }

    fn spawn_run(&self, mode: AcquisitionMode, config: AcquisitionConfig, stop: StopSignal) {
        info!(%mode, "Starting acquisition");
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(shared.execute(mode, config, stop));
    }

    /// Asks the running worker to stop at its next iteration boundary.
    ///
    /// Returns `true` if a stop flag was raised; calling it with nothing
    /// running is a no-op.
    pub fn stop(&self) -> bool {
        let active = lock(&self.shared.active);
        let Some(mode) = *active else {
            debug!("stop() with no acquisition running");
            return false;
        };
        let raised = self
            .shared
            .slot(mode)
            .is_some_and(WorkerSlot::request_stop);
        if raised {
            info!(%mode, "Stop requested");
        }
        raised
    }

    /// Registers a callback invoked once after every run.
    pub fn on_finished<F>(&self, callback: F)
    where
        F: Fn(&RunOutcome) + Send + Sync + 'static,
    {
        lock(&self.shared.callbacks).push(Arc::new(callback));
    }

    /// Takes one spectrum in the foreground.
    ///
    /// The spectrum is returned to the caller. It is also queued for the
    /// result sink if the channel has room; a full or closed sink never makes
    /// this call wait, and the device is released before delivery.
    pub async fn single_measurement(&self) -> Result<Spectrum, DaqError> {
        let spectrum = {
            let _claim = self.claim_foreground()?;
            self.shared.device.read_spectrum().await?
        };
        debug!(pixels = spectrum.len(), "Single measurement");

        match self.shared.events.try_spectrum(spectrum.clone()) {
            Ok(true) => {}
            Ok(false) => warn!("Result sink full; single spectrum not queued"),
            Err(_) => warn!("Result sink closed; single spectrum not queued"),
        }
        Ok(spectrum)
    }

    /// Changes the integration time used by this and all later runs.
    pub async fn set_integration_time(&self, milliseconds: u32) -> Result<(), DaqError> {
        check_integration_time(self.shared.device.as_ref(), milliseconds)?;
        let _claim = self.claim_foreground()?;
        self.shared.device.set_integration_time(milliseconds).await?;
        lock(&self.shared.config).integration_time_ms = milliseconds;
        info!(milliseconds, "Integration time set");
        Ok(())
    }

    fn claim_foreground(&self) -> Result<ForegroundClaim, DaqError> {
        self.shared.claim(AcquisitionMode::Single)?;
        Ok(ForegroundClaim {
            shared: Arc::clone(&self.shared),
            mode: AcquisitionMode::Single,
        })
    }

    /// Acquisition currently holding the device.
    pub fn active_mode(&self) -> Option<AcquisitionMode> {
        *lock(&self.shared.active)
    }

    /// True while any acquisition holds the device.
    pub fn is_running(&self) -> bool {
        self.active_mode().is_some()
    }

    /// Lifecycle state of the worker for `mode`; `None` for single reads.
    pub fn worker_state(&self, mode: AcquisitionMode) -> Option<WorkerState> {
        self.shared.slot(mode).map(WorkerSlot::state)
    }

    /// Persisted configuration (integration time and last scan count).
    pub fn config(&self) -> AcquisitionConfig {
        *lock(&self.shared.config)
    }

    /// Subscribes to control enable/disable updates.
    pub fn controls(&self) -> watch::Receiver<ControlState> {
        self.shared.controls.subscribe()
    }

    /// The device this supervisor drives.
    pub fn device(&self) -> Arc<dyn Spectrometer> {
        Arc::clone(&self.shared.device)
    }
}

impl Drop for WorkerSupervisor {
    fn drop(&mut self) {
        if self.stop() {
            debug!("Supervisor dropped; running worker asked to stop");
        }
    }
}

fn check_integration_time(device: &dyn Spectrometer, milliseconds: u32) -> Result<(), DaqError> {
    let range = device.integration_time_range();
    if !range.contains(&milliseconds) {
        return Err(DaqError::Configuration(format!(
            "integration time {} ms outside device range {}..={} ms",
            milliseconds,
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockSpectrometer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing_test::traced_test;

    async fn connect(device: Arc<MockSpectrometer>) -> (WorkerSupervisor, ResultSink) {
        let settings = AcquisitionSettings {
            integration_time_ms: 5,
            ..AcquisitionSettings::default()
        };
        WorkerSupervisor::connect(device, &settings).await.unwrap()
    }

    #[test]
    fn test_control_state() {
        let idle = ControlState::default();
        assert!(idle.start_enabled());
        assert!(!idle.stop_enabled());

        let integrating = ControlState {
            running: Some(AcquisitionMode::Integrate),
        };
        assert!(!integrating.start_enabled());
        assert!(integrating.stop_enabled());

        let single = ControlState {
            running: Some(AcquisitionMode::Single),
        };
        assert!(!single.start_enabled());
        assert!(!single.stop_enabled());
    }

    #[tokio::test]
    async fn test_connect_applies_integration_time() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, _sink) = connect(device.clone()).await;
        assert_eq!(device.integration_time_ms(), 5);
        assert_eq!(supervisor.config().integration_time_ms, 5);
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_connect_rejects_out_of_range_integration_time() {
        let device = Arc::new(MockSpectrometer::new(8).with_integration_range(10..=100));
        let settings = AcquisitionSettings {
            integration_time_ms: 5,
            ..AcquisitionSettings::default()
        };
        let result = WorkerSupervisor::connect(device, &settings).await;
        assert!(matches!(result, Err(DaqError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, _sink) = connect(device).await;
        assert!(!supervisor.stop());
        assert!(!supervisor.stop());
        assert_eq!(
            supervisor.worker_state(AcquisitionMode::Integrate),
            Some(WorkerState::Idle)
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_stop_is_logged() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, mut sink) = connect(device).await;

        supervisor.start_continuous().unwrap();
        assert!(supervisor.stop());
        sink.wait_finished().await.unwrap();
        assert!(logs_contain("Stop requested"));
    }

    #[tokio::test]
    async fn test_zero_scan_count_rejected_before_hardware() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, _sink) = connect(device.clone()).await;

        let result = supervisor.start_integrate(AcquisitionConfig::new(5, 0));
        assert!(matches!(result, Err(DaqError::Configuration(_))));
        assert!(!supervisor.is_running());
        assert_eq!(device.reads(), 0);
    }

    #[tokio::test]
    async fn test_integration_time_outside_range_rejected() {
        let device = Arc::new(
            MockSpectrometer::new(8)
                .without_timing()
                .with_integration_range(1..=1000),
        );
        let (supervisor, _sink) = connect(device.clone()).await;

        assert!(matches!(
            supervisor.set_integration_time(5000).await,
            Err(DaqError::Configuration(_))
        ));
        assert!(matches!(
            supervisor.start_integrate(AcquisitionConfig::new(0, 3)),
            Err(DaqError::Configuration(_))
        ));
        assert_eq!(device.integration_time_ms(), 5);
    }

    #[tokio::test]
    async fn test_set_integration_time_persists() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, mut sink) = connect(device.clone()).await;

        supervisor.set_integration_time(20).await.unwrap();
        assert_eq!(device.integration_time_ms(), 20);
        assert!(!supervisor.is_running());

        supervisor.start_continuous().unwrap();
        sink.recv().await.unwrap();
        supervisor.stop();
        let outcome = sink.wait_finished().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(device.integration_time_ms(), 20);
    }

    #[tokio::test]
    async fn test_single_measurement_reaches_sink() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, mut sink) = connect(device.clone()).await;

        let spectrum = supervisor.single_measurement().await.unwrap();
        assert!(!supervisor.is_running());

        match sink.recv().await {
            Some(AcquisitionEvent::Spectrum(received)) => assert_eq!(received, spectrum),
            other => panic!("expected spectrum, got {:?}", other),
        }
        assert_eq!(sink.last_spectrum(), Some(&spectrum));
    }

    #[tokio::test]
    async fn test_back_to_back_single_measurements_do_not_wait_on_sink() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, mut sink) = connect(device.clone()).await;

        let first = supervisor.single_measurement().await.unwrap();
        let second = tokio::time::timeout(
            Duration::from_millis(500),
            supervisor.single_measurement(),
        )
        .await
        .expect("second single measurement waited on a full sink")
        .unwrap();
        assert_ne!(first, second);
        assert_eq!(device.reads(), 2);
        assert!(!supervisor.is_running());
        assert!(supervisor.controls().borrow().start_enabled());

        match sink.try_recv() {
            Some(AcquisitionEvent::Spectrum(queued)) => assert_eq!(queued, first),
            other => panic!("expected first spectrum, got {:?}", other),
        }
        assert!(sink.try_recv().is_none());

        supervisor.start_continuous().unwrap();
        supervisor.stop();
        assert!(sink.wait_finished().await.unwrap().is_success());
    }

    /// Accepts the integration time at connect, then refuses it.
    struct RefusesSetup {
        inner: MockSpectrometer,
        configured: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Spectrometer for RefusesSetup {
        fn name(&self) -> String {
            "RefusesSetup".to_string()
        }

        fn integration_time_range(&self) -> std::ops::RangeInclusive<u32> {
            self.inner.integration_time_range()
        }

        async fn set_integration_time(&self, milliseconds: u32) -> Result<(), DaqError> {
            if self.configured.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(DaqError::Device("setup refused".to_string()));
            }
            self.inner.set_integration_time(milliseconds).await
        }

        async fn read_spectrum(&self) -> Result<Spectrum, DaqError> {
            self.inner.read_spectrum().await
        }
    }

    #[tokio::test]
    async fn test_failed_setup_reports_only_finished() {
        let device = Arc::new(RefusesSetup {
            inner: MockSpectrometer::new(8).without_timing(),
            configured: AtomicUsize::new(0),
        });
        let settings = AcquisitionSettings {
            integration_time_ms: 5,
            ..AcquisitionSettings::default()
        };
        let (supervisor, mut sink) = WorkerSupervisor::connect(device.clone(), &settings)
            .await
            .unwrap();

        supervisor.start_continuous().unwrap();
        match sink.recv().await {
            Some(AcquisitionEvent::Finished(outcome)) => {
                assert!(matches!(outcome.error.as_deref(), Some(DaqError::Device(_))));
                assert_eq!(outcome.spectra_emitted, 0);
            }
            other => panic!("expected Finished first, got {:?}", other),
        }
        assert_eq!(device.inner.reads(), 0);
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_single_measurement_rejected_while_running() {
        let device = Arc::new(MockSpectrometer::new(8));
        let (supervisor, mut sink) = connect(device.clone()).await;

        supervisor.start_continuous().unwrap();
        assert!(matches!(
            supervisor.single_measurement().await,
            Err(DaqError::AlreadyRunning(AcquisitionMode::Continuous))
        ));
        assert!(matches!(
            supervisor.set_integration_time(10).await,
            Err(DaqError::AlreadyRunning(AcquisitionMode::Continuous))
        ));

        supervisor.stop();
        sink.wait_finished().await.unwrap();
    }

    #[tokio::test]
    async fn test_single_measurement_failure_releases_device() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, _sink) = connect(device.clone()).await;
        device.fail_on_read(1);

        assert!(matches!(
            supervisor.single_measurement().await,
            Err(DaqError::Device(_))
        ));
        assert!(!supervisor.is_running());
        assert!(supervisor.controls().borrow().start_enabled());
    }

    #[tokio::test]
    async fn test_controls_follow_run_state() {
        let device = Arc::new(MockSpectrometer::new(8));
        let (supervisor, mut sink) = connect(device).await;
        let controls = supervisor.controls();
        assert!(controls.borrow().start_enabled());

        supervisor.start_integrate(AcquisitionConfig::new(5, 3)).unwrap();
        assert!(!controls.borrow().start_enabled());
        assert!(controls.borrow().stop_enabled());

        sink.wait_finished().await.unwrap();
        assert!(controls.borrow().start_enabled());
        assert!(!controls.borrow().stop_enabled());
    }

    #[tokio::test]
    async fn test_on_finished_called_once_per_run() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, mut sink) = connect(device).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        supervisor.on_finished(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..2 {
            supervisor.start_integrate(AcquisitionConfig::new(5, 2)).unwrap();
            sink.wait_finished().await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(1), async {
            while calls.load(Ordering::SeqCst) < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_restart_immediately_after_finished() {
        let device = Arc::new(MockSpectrometer::new(8).without_timing());
        let (supervisor, mut sink) = connect(device).await;

        supervisor.start_integrate(AcquisitionConfig::new(5, 1)).unwrap();
        sink.wait_finished().await.unwrap();
        supervisor
            .start_integrate(AcquisitionConfig::new(5, 1))
            .unwrap();
        assert!(sink.wait_finished().await.unwrap().is_success());
    }
}
