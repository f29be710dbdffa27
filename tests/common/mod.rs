//! Shared helpers for acquisition integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use spectro_daq::config::AcquisitionSettings;
use spectro_daq::{
    AcquisitionEvent, DaqError, MockSpectrometer, ResultSink, Spectrometer, Spectrum,
    WorkerSupervisor,
};
use std::ops::RangeInclusive;
use std::sync::Arc;

pub const INTEGRATION_TIME_MS: u32 = 5;

/// Settings with a short integration time and a one-slot channel.
pub fn settings() -> AcquisitionSettings {
    AcquisitionSettings {
        integration_time_ms: INTEGRATION_TIME_MS,
        scan_count: 5,
        channel_capacity: 1,
    }
}

/// Supervisor on top of `device`.
pub async fn connect<D>(device: Arc<D>) -> (WorkerSupervisor, ResultSink)
where
    D: Spectrometer + 'static,
{
    WorkerSupervisor::connect(device, &settings())
        .await
        .expect("Failed to connect supervisor")
}

/// Mock that answers instantly.
pub fn fast_mock(pixels: usize) -> Arc<MockSpectrometer> {
    Arc::new(MockSpectrometer::new(pixels).without_timing())
}

/// Arithmetic mean of reads `1..=k` as the mock will produce them.
pub fn expected_mean(device: &MockSpectrometer, k: u64) -> Vec<f64> {
    let mut sums = device.synthesize(1);
    for read in 2..=k {
        for (sum, value) in sums.iter_mut().zip(device.synthesize(read)) {
            *sum += value;
        }
    }
    sums.iter().map(|sum| sum / k as f64).collect()
}

pub fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (pixel, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-9, "pixel {}: {} != {}", pixel, a, e);
    }
}

/// Events of one run, collected until `Finished`.
pub async fn collect_run(sink: &mut ResultSink) -> Vec<AcquisitionEvent> {
    let mut events = Vec::new();
    sink.wait_finished_with(|event| events.push(event.clone()))
        .await
        .expect("Event channel closed before the run finished");
    events
}

pub fn spectra(events: &[AcquisitionEvent]) -> Vec<&Spectrum> {
    events
        .iter()
        .filter_map(|event| match event {
            AcquisitionEvent::Spectrum(spectrum) => Some(spectrum),
            _ => None,
        })
        .collect()
}

/// Device whose n-th read panics.
pub struct PanickingSpectrometer {
    pub inner: MockSpectrometer,
    pub panic_on_read: u64,
}

#[async_trait]
impl Spectrometer for PanickingSpectrometer {
    fn name(&self) -> String {
        "PanickingSpectrometer".to_string()
    }

    fn integration_time_range(&self) -> RangeInclusive<u32> {
        self.inner.integration_time_range()
    }

    async fn set_integration_time(&self, milliseconds: u32) -> Result<(), DaqError> {
        self.inner.set_integration_time(milliseconds).await
    }

    async fn read_spectrum(&self) -> Result<Spectrum, DaqError> {
        if self.inner.reads() + 1 == self.panic_on_read {
            panic!("simulated driver crash");
        }
        self.inner.read_spectrum().await
    }
}
