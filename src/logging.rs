//! # Structured Logging Module
//!
//! Environment-aware structured logging for long-running operations. Console
//! output is always on; JSON lines can be added for log shipping.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::models::{OperationId, WatermarkRange};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` wins over the configured level, which wins over the
/// per-environment default.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_filter(filter());

        let json = config.json.then(|| {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter())
        });

        // Hosts embedding this crate may already own the global subscriber
        if tracing_subscriber::registry()
            .with(console)
            .with(json)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            level = %level,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("DICOM_OPS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a lifecycle transition of an operation
pub fn log_operation_event(
    operation_id: OperationId,
    operation_type: &str,
    event: &str,
    percent_complete: u8,
    details: Option<&str>,
) {
    tracing::info!(
        operation_id = %operation_id,
        operation_type = %operation_type,
        event = %event,
        percent_complete = percent_complete,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "OPERATION_EVENT"
    );
}

/// Log the outcome of one batch attempt
pub fn log_batch_operation(
    operation_id: OperationId,
    range: WatermarkRange,
    attempt: u32,
    status: &str,
    item_count: Option<usize>,
    duration_ms: Option<u64>,
) {
    tracing::info!(
        operation_id = %operation_id,
        range = %range,
        attempt = attempt,
        status = %status,
        item_count = item_count,
        duration_ms = duration_ms,
        "BATCH_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
