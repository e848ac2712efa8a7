//! Image intake pipeline integration tests.
//!
//! Run with: `cargo test -p sitereview-processing --test intake_test`

mod helpers;

use helpers::{file, ScriptedStorage};
use image::{DynamicImage, ImageFormat, RgbImage};
use sitereview_core::{AppError, FieldSpec, ImageAsset};
use sitereview_processing::{
    CompressionEngine, ImageIntakePipeline, IntakeError, IntakeOptions,
};
use sitereview_storage::{MemoryStorage, Storage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn review_field() -> FieldSpec {
    FieldSpec::new("images", "user-reviews", 5)
}

fn pipeline(storage: Arc<dyn Storage>) -> ImageIntakePipeline {
    ImageIntakePipeline::new(storage, IntakeOptions::default())
}

fn labels(urls: &[String]) -> Vec<String> {
    urls.iter()
        .map(|url| url.rsplit('-').next().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_order_preserved_when_uploads_finish_out_of_order() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = pipeline(storage.clone());

    let files = vec![
        file("images", "slow:150:a"),
        file("images", "slow:75:b"),
        file("images", "c"),
    ];

    let report = intake.process(&[review_field()], files).await;

    assert!(!report.has_failures());
    assert_eq!(labels(&report.urls("images")), vec!["a", "b", "c"]);
    assert_eq!(storage.upload_count(), 3);
}

#[tokio::test]
async fn test_failed_file_does_not_affect_siblings() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = pipeline(storage.clone());

    let files = vec![
        file("images", "a"),
        file("images", "fail:b"),
        file("images", "c"),
    ];

    let report = intake.process(&[review_field()], files).await;

    assert_eq!(labels(&report.urls("images")), vec!["a", "c"]);

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].field_name, "images");
    assert_eq!(failures[0].index, 1);
    assert_eq!(failures[0].original_filename.as_deref(), Some("b.jpg"));

    let outcomes = report.outcomes("images");
    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[1].result, Err(IntakeError::Upload(_))));

    let strict = report.into_strict_url_map();
    assert!(matches!(strict, Err(IntakeError::Upload(_))));
}

#[tokio::test]
async fn test_lossy_url_map_keeps_successes() {
    let intake = pipeline(Arc::new(ScriptedStorage::new()));

    let report = intake
        .process(
            &[review_field()],
            vec![file("images", "fail:a"), file("images", "b")],
        )
        .await;

    let map = report.into_url_map();
    assert_eq!(labels(&map["images"]), vec!["b"]);
}

#[tokio::test]
async fn test_files_beyond_max_count_are_dropped() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = pipeline(storage.clone());

    let files = (0..7)
        .map(|i| file("images", &format!("f{}", i)))
        .collect();

    let report = intake.process(&[review_field()], files).await;

    assert_eq!(
        labels(&report.urls("images")),
        vec!["f0", "f1", "f2", "f3", "f4"]
    );
    assert_eq!(storage.upload_count(), 5);
}

#[tokio::test]
async fn test_undescribed_fields_ignored_and_described_fields_always_present() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = pipeline(storage.clone());

    let fields = [review_field(), FieldSpec::new("receipts", "receipts", 2)];
    let files = vec![file("avatar", "x"), file("images", "a")];

    let report = intake.process(&fields, files).await;

    let names: Vec<&str> = report.field_names().collect();
    assert_eq!(names, vec!["images", "receipts"]);
    assert!(report.outcomes("receipts").is_empty());
    assert!(report.outcomes("avatar").is_empty());
    assert_eq!(storage.upload_count(), 1);

    let map = report.into_strict_url_map().unwrap();
    assert!(map["receipts"].is_empty());
    assert_eq!(map["images"].len(), 1);
}

#[tokio::test]
async fn test_fields_upload_to_their_own_folders() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = pipeline(storage.clone());

    let fields = [review_field(), FieldSpec::new("receipts", "receipts", 2)];
    let files = vec![
        file("receipts", "slow:50:r0"),
        file("images", "a"),
        file("receipts", "r1"),
    ];

    let report = intake.process(&fields, files).await;

    let receipts = report.urls("receipts");
    assert_eq!(labels(&receipts), vec!["r0", "r1"]);
    assert!(receipts.iter().all(|url| url.contains("/receipts/")));
    assert!(report.urls("images")[0].contains("/user-reviews/"));
}

#[tokio::test]
async fn test_upload_timeout_is_a_file_failure() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = ImageIntakePipeline::new(
        storage.clone(),
        IntakeOptions {
            upload_timeout: Duration::from_millis(100),
            ..IntakeOptions::default()
        },
    );

    let report = intake
        .process(
            &[review_field()],
            vec![file("images", "hang:a"), file("images", "b")],
        )
        .await;

    let outcomes = report.outcomes("images");
    assert!(matches!(outcomes[0].result, Err(IntakeError::Timeout(_))));
    assert!(outcomes[1].result.is_ok());
}

#[tokio::test]
async fn test_undecodable_oversized_file_is_not_uploaded() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = ImageIntakePipeline::with_engine(
        storage.clone(),
        CompressionEngine::new(4),
        Duration::from_secs(5),
    );

    let report = intake
        .process(&[review_field()], vec![file("images", "definitely not an image")])
        .await;

    assert!(matches!(
        report.outcomes("images")[0].result,
        Err(IntakeError::Compression(_))
    ));
    assert_eq!(storage.upload_count(), 0);
}

#[tokio::test]
async fn test_discard_removes_uploaded_objects() {
    let storage = Arc::new(MemoryStorage::default());
    let intake = pipeline(storage.clone());

    let report = intake
        .process(
            &[review_field()],
            vec![file("images", "a"), file("images", "b")],
        )
        .await;
    assert_eq!(storage.len().await, 2);

    let removed = intake.discard(&report).await;

    assert_eq!(removed, 2);
    assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_empty_submission_reports_empty_fields() {
    let intake = pipeline(Arc::new(ScriptedStorage::new()));
    let report = intake.process(&[review_field()], Vec::new()).await;

    assert!(!report.has_failures());
    assert!(report.urls("images").is_empty());
    assert_eq!(report.field_names().count(), 1);
}

/// A panorama wider than WebP allows, well over a 1 KiB budget.
fn panorama() -> ImageAsset {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(16400, 8))
        .write_to(&mut out, ImageFormat::Bmp)
        .unwrap();
    ImageAsset::new("images", out.into_inner(), "image/bmp").with_filename("wide.bmp")
}

#[tokio::test]
async fn test_too_wide_image_fails_only_its_own_slot() {
    let storage = Arc::new(ScriptedStorage::new());
    let intake = ImageIntakePipeline::with_engine(
        storage.clone(),
        CompressionEngine::new(1024),
        Duration::from_secs(5),
    );

    let report = intake
        .process(&[review_field()], vec![panorama(), file("images", "b")])
        .await;

    let outcomes = report.outcomes("images");
    assert!(matches!(
        outcomes[0].result,
        Err(IntakeError::Compression(_))
    ));
    assert!(outcomes[1].result.is_ok());
    assert_eq!(storage.upload_count(), 1);

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].original_filename.as_deref(), Some("wide.bmp"));
    assert_eq!(failures[0].error_code, "IMAGE_PROCESSING_ERROR");
    assert!(!failures[0].recoverable);
}

#[tokio::test]
async fn test_failures_tell_whether_a_retry_can_help() {
    let intake = ImageIntakePipeline::new(
        Arc::new(ScriptedStorage::new()),
        IntakeOptions {
            upload_timeout: Duration::from_millis(100),
            ..IntakeOptions::default()
        },
    );

    let report = intake
        .process(
            &[review_field()],
            vec![file("images", "fail:a"), file("images", "hang:b")],
        )
        .await;

    let failures = report.failures();
    assert_eq!(failures.len(), 2);
    for failure in &failures {
        assert_eq!(failure.error_code, "STORAGE_ERROR");
        assert!(failure.recoverable);
        assert!(failure.suggested_action.is_some());
        // transport detail stays out of the submitter-facing message
        assert!(!failure.error.contains("scripted failure"));
    }

    let strict = report.into_strict_url_map();
    let app_error: AppError = strict.unwrap_err().into();
    assert!(matches!(app_error, AppError::Storage(_)));
}
