use chrono::{NaiveDate, NaiveTime};
use clap::Args;
use consult_booking::booking::{self, domain, FileOrchestrator, SystemClock};
use consult_booking::config::AppConfig;
use consult_booking::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Args, Debug, Default, Clone)]
pub(crate) struct StorageArgs {
    /// Directory holding slots.txt, requests.txt and appointments.txt
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

/// Loads configuration, applies the storage override and opens the flat-file stores.
pub(crate) fn open_booking(
    storage: StorageArgs,
) -> Result<(AppConfig, Arc<FileOrchestrator>), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(data_dir) = storage.data_dir {
        config.storage.data_dir = data_dir;
    }

    debug!(
        data_dir = %config.storage.data_dir.display(),
        retention = %config.booking.slot_retention,
        "opening booking stores"
    );
    let orchestrator = booking::open_flat_files(
        &config.storage.data_dir,
        config.booking,
        Arc::new(SystemClock),
    )?;
    Ok((config, Arc::new(orchestrator)))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    domain::parse_date(raw)
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    domain::parse_time(raw)
}
