//! Command-line front end for spectro_daq.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spectro_daq::config::DEFAULT_CONFIG_PATH;
use spectro_daq::{
    AcquisitionEvent, DeviceRegistry, ResultSink, RunOutcome, SpectroConfig, Spectrum,
    WorkerSupervisor,
};

/// Spectrometer acquisition tool
#[derive(Parser, Debug)]
#[command(name = "spectro_daq")]
#[command(about = "Acquire spectra in single, integrate or continuous mode")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Integration time in milliseconds (overrides the configuration)
    #[arg(short = 't', long)]
    integration_time: Option<u32>,

    /// Export the last spectrum to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Take one spectrum
    Single,
    /// Average a fixed number of scans
    Integrate {
        /// Number of scans (defaults to the configured scan count)
        #[arg(short = 'n', long)]
        scans: Option<u32>,
    },
    /// Stream raw spectra until Ctrl+C
    Continuous {
        /// Stop after this many spectra
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SpectroConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level)),
        )
        .init();

    if let Some(milliseconds) = cli.integration_time {
        config.acquisition.integration_time_ms = milliseconds;
    }

    let device = DeviceRegistry::with_builtin()
        .open(&config.device)
        .context("Failed to open spectrometer")?;
    info!("Connected to {}", device.name());

    let (supervisor, mut sink) = WorkerSupervisor::connect(device, &config.acquisition)
        .await
        .context("Failed to configure spectrometer")?;

    match cli.command {
        Command::Single => {
            let spectrum = supervisor.single_measurement().await?;
            // Take the queued copy so `--output` exports it.
            let _queued = sink.try_recv();
            print_spectrum(&spectrum);
        }
        Command::Integrate { scans } => {
            let scans = scans.unwrap_or(config.acquisition.scan_count);
            supervisor.start_integrate(supervisor.config().with_scan_count(scans))?;
            let outcome = follow(&supervisor, &mut sink, None).await?;
            report(&outcome)?;
        }
        Command::Continuous { count } => {
            supervisor.start_continuous()?;
            let outcome = follow(&supervisor, &mut sink, count).await?;
            report(&outcome)?;
        }
    }

    if let Some(output) = cli.output {
        let path = config.storage.resolve(output);
        sink.export_csv(&path)
            .with_context(|| format!("Failed to export {}", path.display()))?;
        println!("Saved {}", path.display());
    }

    Ok(())
}

/// Prints events until the run finishes. Ctrl+C, or reaching `limit`
/// spectra, asks the worker to stop.
async fn follow(
    supervisor: &WorkerSupervisor,
    sink: &mut ResultSink,
    limit: Option<u64>,
) -> Result<RunOutcome> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut received = 0u64;

    loop {
        tokio::select! {
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        info!("Interrupted, stopping acquisition");
                        supervisor.stop();
                    }
                    Err(e) => warn!("Ctrl+C handler unavailable: {}", e),
                }
            }
            event = sink.recv() => match event {
                Some(AcquisitionEvent::Spectrum(spectrum)) => {
                    received += 1;
                    print_spectrum(&spectrum);
                    if limit.is_some_and(|limit| received >= limit) {
                        supervisor.stop();
                    }
                }
                Some(AcquisitionEvent::Progress(progress)) => {
                    println!(
                        "  scan {}/{} ({:.0}%)",
                        progress.index,
                        progress.total,
                        progress.fraction() * 100.0
                    );
                }
                Some(AcquisitionEvent::Started { mode, .. }) => {
                    println!("{} acquisition started", mode)
                }
                Some(AcquisitionEvent::Finished(outcome)) => return Ok(outcome),
                None => bail!("Acquisition event channel closed"),
            }
        }
    }
}

fn report(outcome: &RunOutcome) -> Result<()> {
    if let Some(err) = &outcome.error {
        return Err(anyhow!("{} run failed: {}", outcome.mode, err));
    }
    println!(
        "{} run finished: {} spectra{}",
        outcome.mode,
        outcome.spectra_emitted,
        if outcome.stopped_early { " (stopped)" } else { "" }
    );
    Ok(())
}

fn print_spectrum(spectrum: &Spectrum) {
    let peak = spectrum.points().max_by(|a, b| a.1.total_cmp(&b.1));
    match peak {
        Some((wavelength, intensity)) => println!(
            "{} {} points, peak {:.1} at {:.2} nm",
            spectrum.timestamp().format("%H:%M:%S%.3f"),
            spectrum.len(),
            intensity,
            wavelength
        ),
        None => println!("{} empty spectrum", spectrum.timestamp().format("%H:%M:%S%.3f")),
    }
}
