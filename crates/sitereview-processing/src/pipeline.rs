//! Concurrent image intake: compress and upload every file of a submission.
//!
//! Each accepted file becomes its own task: compression on the blocking pool,
//! then a single upload bounded by a timeout. Results are written back into
//! per-field slots by original position, so a field's URLs come out in the
//! order the files were received no matter which upload finishes first. A
//! failing file only fails its own slot.

use crate::compression::{CompressedImage, CompressionEngine, CompressionError};
use futures::future::join_all;
use serde::Serialize;
use sitereview_core::constants::{MAX_COMPRESSED_IMAGE_BYTES, UPLOAD_TIMEOUT_SECS};
use sitereview_core::{AppError, ErrorMetadata, FieldSpec, ImageAsset, LogLevel, ReviewConfig};
use sitereview_storage::{Storage, StorageError, UploadResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Compression failed: {0}")]
    Compression(#[from] CompressionError),

    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("Intake task failed: {0}")]
    TaskFailed(String),
}

impl IntakeError {
    /// Service-level view of this error, used for reporting and logging.
    pub fn to_app_error(&self) -> AppError {
        match self {
            IntakeError::Compression(e) => AppError::ImageProcessing(e.to_string()),
            IntakeError::Upload(e) => AppError::Storage(e.to_string()),
            IntakeError::Timeout(_) => AppError::Storage(self.to_string()),
            IntakeError::TaskFailed(_) => AppError::Internal(self.to_string()),
        }
    }
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Upload(e) => e.into(),
            other => other.to_app_error(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeOptions {
    pub max_bytes: usize,
    pub upload_timeout: Duration,
}

impl IntakeOptions {
    pub fn from_config(config: &ReviewConfig) -> Self {
        Self {
            max_bytes: config.image_max_bytes,
            upload_timeout: config.upload_timeout(),
        }
    }
}

impl Default for IntakeOptions {
    fn default() -> Self {
        Self {
            max_bytes: MAX_COMPRESSED_IMAGE_BYTES,
            upload_timeout: Duration::from_secs(UPLOAD_TIMEOUT_SECS),
        }
    }
}

/// Result for one file, at its original position within its field.
#[derive(Debug)]
pub struct FileOutcome {
    pub index: usize,
    pub original_filename: Option<String>,
    pub result: Result<UploadResult, IntakeError>,
}

/// A failed file, flattened for reporting back to the submitter.
///
/// `recoverable` tells whether sending the same file again may succeed
/// (storage hiccups and timeouts) or not (the file itself is unusable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeFailure {
    pub field_name: String,
    pub index: usize,
    pub original_filename: Option<String>,
    pub error: String,
    pub error_code: &'static str,
    pub recoverable: bool,
    pub suggested_action: Option<&'static str>,
}

impl IntakeFailure {
    fn new(field_name: &str, outcome: &FileOutcome, error: &IntakeError) -> Self {
        let app_error = error.to_app_error();
        Self {
            field_name: field_name.to_string(),
            index: outcome.index,
            original_filename: outcome.original_filename.clone(),
            error: app_error.client_message(),
            error_code: app_error.error_code(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action(),
        }
    }
}

/// Per-field outcomes of one [`ImageIntakePipeline::process`] call.
///
/// Every described field is present, possibly with no outcomes.
#[derive(Debug, Default)]
pub struct IntakeReport {
    fields: BTreeMap<String, Vec<FileOutcome>>,
}

impl IntakeReport {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn outcomes(&self, field_name: &str) -> &[FileOutcome] {
        self.fields
            .get(field_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// URLs of the successful uploads of `field_name`, in input order.
    pub fn urls(&self, field_name: &str) -> Vec<String> {
        self.outcomes(field_name)
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .map(|uploaded| uploaded.url.clone())
            .collect()
    }

    pub fn uploaded(&self) -> impl Iterator<Item = &UploadResult> {
        self.fields
            .values()
            .flatten()
            .filter_map(|outcome| outcome.result.as_ref().ok())
    }

    pub fn failures(&self) -> Vec<IntakeFailure> {
        self.fields
            .iter()
            .flat_map(|(field_name, outcomes)| {
                outcomes.iter().filter_map(move |outcome| {
                    outcome
                        .result
                        .as_ref()
                        .err()
                        .map(|error| IntakeFailure::new(field_name, outcome, error))
                })
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.fields
            .values()
            .flatten()
            .any(|outcome| outcome.result.is_err())
    }

    /// Field name to URLs, dropping failed files.
    pub fn into_url_map(self) -> BTreeMap<String, Vec<String>> {
        self.fields
            .into_iter()
            .map(|(field_name, outcomes)| {
                let urls = outcomes
                    .into_iter()
                    .filter_map(|outcome| outcome.result.ok())
                    .map(|uploaded| uploaded.url)
                    .collect();
                (field_name, urls)
            })
            .collect()
    }

    /// Field name to URLs, or the first failure in field then input order.
    pub fn into_strict_url_map(self) -> Result<BTreeMap<String, Vec<String>>, IntakeError> {
        let mut map = BTreeMap::new();
        for (field_name, outcomes) in self.fields {
            let mut urls = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                urls.push(outcome.result?.url);
            }
            map.insert(field_name, urls);
        }
        Ok(map)
    }
}

#[derive(Clone)]
pub struct ImageIntakePipeline {
    engine: Arc<CompressionEngine>,
    storage: Arc<dyn Storage>,
    upload_timeout: Duration,
}

impl ImageIntakePipeline {
    pub fn new(storage: Arc<dyn Storage>, options: IntakeOptions) -> Self {
        Self::with_engine(
            storage,
            CompressionEngine::new(options.max_bytes),
            options.upload_timeout,
        )
    }

    pub fn with_engine(
        storage: Arc<dyn Storage>,
        engine: CompressionEngine,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            storage,
            upload_timeout,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Compress and upload `files` according to `fields`.
    ///
    /// Files whose field is not described are ignored; files beyond a field's
    /// `max_count` are dropped. Never fails as a whole: per-file errors are in
    /// the report. Dropping the returned future stops waiting but uploads that
    /// already started may still complete.
    pub async fn process(&self, fields: &[FieldSpec], files: Vec<ImageAsset>) -> IntakeReport {
        let started = std::time::Instant::now();

        let mut grouped: HashMap<String, Vec<ImageAsset>> = HashMap::new();
        for asset in files {
            if fields.iter().any(|spec| spec.field_name == asset.field_name) {
                grouped
                    .entry(asset.field_name.clone())
                    .or_default()
                    .push(asset);
            } else {
                tracing::warn!(
                    field = %asset.field_name,
                    size_bytes = asset.size(),
                    "Ignoring file for undescribed upload field"
                );
            }
        }

        let mut slots: BTreeMap<String, Vec<Option<FileOutcome>>> = BTreeMap::new();
        let mut positions = Vec::new();
        let mut handles = Vec::new();

        for spec in fields {
            let mut assets = grouped.remove(&spec.field_name).unwrap_or_default();
            if assets.len() > spec.max_count {
                tracing::warn!(
                    field = %spec.field_name,
                    received = assets.len(),
                    max_count = spec.max_count,
                    "Too many files for field, dropping extras"
                );
                assets.truncate(spec.max_count);
            }

            let field_slots = slots.entry(spec.field_name.clone()).or_default();
            if field_slots.len() < assets.len() {
                field_slots.resize_with(assets.len(), || None);
            }

            for (index, asset) in assets.into_iter().enumerate() {
                positions.push((
                    spec.field_name.clone(),
                    index,
                    asset.original_filename.clone(),
                ));
                handles.push(tokio::spawn(intake_one(
                    self.engine.clone(),
                    self.storage.clone(),
                    spec.folder.clone(),
                    asset,
                    self.upload_timeout,
                )));
            }
        }

        let file_count = handles.len();
        let joined = join_all(handles).await;

        for ((field_name, index, original_filename), joined) in positions.into_iter().zip(joined) {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(IntakeError::TaskFailed(e.to_string())),
            };

            if let Err(ref e) = result {
                log_file_failure(&field_name, index, original_filename.as_deref(), e);
            }

            if let Some(slot) = slots
                .get_mut(&field_name)
                .and_then(|field_slots| field_slots.get_mut(index))
            {
                *slot = Some(FileOutcome {
                    index,
                    original_filename,
                    result,
                });
            }
        }

        let report = IntakeReport {
            fields: slots
                .into_iter()
                .map(|(field_name, field_slots)| {
                    (field_name, field_slots.into_iter().flatten().collect())
                })
                .collect(),
        };

        tracing::info!(
            files = file_count,
            uploaded = report.uploaded().count(),
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Image intake finished"
        );

        report
    }

    /// Best-effort delete of every object `report` uploaded. Returns how many
    /// were removed.
    pub async fn discard(&self, report: &IntakeReport) -> usize {
        let mut removed = 0;
        for uploaded in report.uploaded() {
            match self.storage.delete(&uploaded.key).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    key = %uploaded.key,
                    error = %e,
                    "Failed to discard uploaded image"
                ),
            }
        }
        removed
    }
}

fn log_file_failure(field_name: &str, index: usize, filename: Option<&str>, error: &IntakeError) {
    let app_error = error.to_app_error();
    let code = app_error.error_code();
    match app_error.log_level() {
        LogLevel::Debug => tracing::debug!(
            field = %field_name,
            index,
            filename = ?filename,
            error_code = code,
            error = %error,
            "Image intake failed for file"
        ),
        LogLevel::Warn => tracing::warn!(
            field = %field_name,
            index,
            filename = ?filename,
            error_code = code,
            error = %error,
            "Image intake failed for file"
        ),
        LogLevel::Error => tracing::error!(
            field = %field_name,
            index,
            filename = ?filename,
            error_code = code,
            error = %error,
            "Image intake failed for file"
        ),
    }
}

async fn intake_one(
    engine: Arc<CompressionEngine>,
    storage: Arc<dyn Storage>,
    folder: String,
    asset: ImageAsset,
    upload_timeout: Duration,
) -> Result<UploadResult, IntakeError> {
    let ImageAsset {
        data, mime_hint, ..
    } = asset;

    let compressed = tokio::task::spawn_blocking(move || engine.compress(data, &mime_hint))
        .await
        .map_err(|e| IntakeError::TaskFailed(e.to_string()))??;

    let CompressedImage {
        data,
        content_type,
        within_budget,
        ..
    } = compressed;

    if !within_budget {
        tracing::warn!(
            folder = %folder,
            size_bytes = data.len(),
            "Uploading image that is over the size budget"
        );
    }

    match tokio::time::timeout(upload_timeout, storage.upload(&folder, &content_type, data)).await
    {
        Ok(result) => Ok(result?),
        Err(_) => Err(IntakeError::Timeout(upload_timeout)),
    }
}
