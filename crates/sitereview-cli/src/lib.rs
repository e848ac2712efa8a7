use serde_json::{json, Value};
use sitereview_core::ErrorMetadata;
use sitereview_services::IntakeReport;
use std::path::Path;

/// Content type announced for a local file, from its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// JSON view of an intake report: per field, one entry per file in input order.
pub fn report_json(report: &IntakeReport) -> Value {
    let fields: serde_json::Map<String, Value> = report
        .field_names()
        .map(|field_name| {
            let files: Vec<Value> = report
                .outcomes(field_name)
                .iter()
                .map(|outcome| match &outcome.result {
                    Ok(uploaded) => json!({
                        "index": outcome.index,
                        "filename": outcome.original_filename,
                        "key": uploaded.key,
                        "url": uploaded.url,
                    }),
                    Err(e) => json!({
                        "index": outcome.index,
                        "filename": outcome.original_filename,
                        "error": e.to_string(),
                        "error_code": e.to_app_error().error_code(),
                        "recoverable": e.to_app_error().is_recoverable(),
                    }),
                })
                .collect();
            (field_name.to_string(), Value::Array(files))
        })
        .collect();

    json!({
        "fields": fields,
        "failed": report.failures().len(),
    })
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sitereview=info")),
        )
        .init();
}
