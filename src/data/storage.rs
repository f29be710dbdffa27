//! Spectrum export with clean feature flag handling.
use crate::{core::Spectrum, error::DaqError};
use std::path::Path;

/// Column titles of an exported spectrum.
pub const CSV_HEADER: [&str; 2] = ["Wavelength (nm)", "Intensity"];

// ============================================================================
// CSV Writer
// ============================================================================

#[cfg(feature = "storage_csv")]
mod csv_enabled {
    use super::*;
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use tracing::info;

    /// Writes one spectrum as a two-column CSV table.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct CsvWriter;

    impl CsvWriter {
        /// Creates the writer.
        pub fn new() -> Self {
            Self
        }

        /// Header row, then one `wavelength,intensity` row per pixel.
        pub fn write<W: Write>(&self, spectrum: &Spectrum, writer: W) -> Result<(), DaqError> {
            let mut csv = csv::Writer::from_writer(writer);
            csv.write_record(CSV_HEADER)?;
            for (wavelength, intensity) in spectrum.points() {
                csv.write_record(&[wavelength.to_string(), intensity.to_string()])?;
            }
            csv.flush()?;
            Ok(())
        }

        /// Writes `spectrum` to `path`, creating parent directories as needed.
        pub fn save(&self, spectrum: &Spectrum, path: &Path) -> Result<(), DaqError> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            self.write(spectrum, BufWriter::new(file))?;
            info!(path = %path.display(), points = spectrum.len(), "Spectrum exported");
            Ok(())
        }
    }
}

#[cfg(not(feature = "storage_csv"))]
mod csv_disabled {
    use super::*;
    use std::io::Write;

    /// Placeholder used when CSV export is compiled out.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct CsvWriter;

    impl CsvWriter {
        /// Creates the writer.
        pub fn new() -> Self {
            Self
        }

        /// Always fails with `FeatureNotEnabled`.
        pub fn write<W: Write>(&self, _spectrum: &Spectrum, _writer: W) -> Result<(), DaqError> {
            Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
        }

        /// Always fails with `FeatureNotEnabled`.
        pub fn save(&self, _spectrum: &Spectrum, _path: &Path) -> Result<(), DaqError> {
            Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
        }
    }
}

#[cfg(feature = "storage_csv")]
pub use csv_enabled::CsvWriter;

#[cfg(not(feature = "storage_csv"))]
pub use csv_disabled::CsvWriter;
