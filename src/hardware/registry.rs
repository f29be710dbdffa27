//! Driver registry used to open the configured spectrometer.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::DeviceConfig;
use crate::error::DaqError;
use crate::hardware::{MockSpectrometer, Spectrometer};

type DynSpectrometer = Arc<dyn Spectrometer>;
type DeviceBuilder = Arc<dyn Fn(&DeviceConfig) -> Result<DynSpectrometer, DaqError> + Send + Sync>;

/// Maps driver names to factories.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    builders: HashMap<String, DeviceBuilder>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the drivers shipped in this crate (`mock`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_factory(
            "mock",
            Arc::new(|config: &DeviceConfig| {
                Ok(Arc::new(MockSpectrometer::from_config(&config.mock)) as DynSpectrometer)
            }),
        );
        registry
    }

    /// Adds or replaces a driver factory.
    pub fn register_factory(&mut self, driver: impl Into<String>, builder: DeviceBuilder) {
        self.builders.insert(driver.into(), builder);
    }

    /// Registered driver names, sorted.
    pub fn drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Opens the configured device.
    ///
    /// Fails with [`DaqError::DeviceNotFound`] if the driver is unknown or its
    /// factory finds no device.
    pub fn open(&self, config: &DeviceConfig) -> Result<DynSpectrometer, DaqError> {
        let builder = self.builders.get(&config.driver).ok_or_else(|| {
            DaqError::DeviceNotFound(format!(
                "no driver '{}' (available: {}). Please connect a compatible device.",
                config.driver,
                self.drivers().join(", ")
            ))
        })?;
        let device = builder(config)?;
        info!("Opened spectrometer '{}'", device.name());
        Ok(device)
    }
}
