pub mod checkpoint;
pub mod config;
pub mod content;
pub mod errors;
pub mod ingestion;
pub mod pipeline;
pub mod places;
pub mod preflight;
pub mod record;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use checkpoint::{CheckpointPolicy, CheckpointWriter};
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use ingestion::load_records;
pub use pipeline::{EnrichmentPipeline, PipelineSettings, ProgressObserver, RunProgress, RunSummary};
pub use preflight::{check_keys, check_services, KeyCheckReport};
pub use record::{BusinessRecord, ProcessingStatus, RecordSet};

const MAX_ERROR_COPY_CHARS: usize = 500;

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,business_enricher=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}

/// Flattens error text to a single bounded line fit for a CSV cell.
pub fn sanitize_error_copy(message: &str) -> String {
    let flat = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_ERROR_COPY_CHARS {
        return flat;
    }
    let mut clipped: String = flat.chars().take(MAX_ERROR_COPY_CHARS).collect();
    clipped.push_str("...");
    clipped
}
