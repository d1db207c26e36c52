mod common;

use common::{assert_status, position, FakeTool, Harness, KIB};
use image_forge::infrastructure::storage::PROCESSED_FILES_FOLDER;
use image_forge::modules::image_job::model::JobStatus;
use image_forge::processing::ProcessingError;
use uuid::Uuid;

const WINDOW_50_100: &str = r#"{"compression":{"minSize":50,"maxSize":100,"unit":"KiB"}}"#;

#[tokio::test]
async fn test_plain_conversion_uses_default_quality() {
    let h = Harness::new(FakeTool::fixed(5_000));
    let id = h.add_job(vec![1; 1_000], r#"{"outputFormat":"jpg"}"#).await;

    let status = h.processor.process(id).await.unwrap();

    assert_eq!(status, JobStatus::Completed);
    let calls = h.tool.calls();
    assert_eq!(calls.len(), 1);
    let argv = &calls[0];
    assert_eq!(argv[..2], ["gm".to_string(), "convert".to_string()]);
    assert_eq!(argv[position(argv, "-quality") + 1], "100");
    assert!(argv.contains(&"-sampling-factor".to_string()));

    let job = h.job(id).await;
    assert_status(&job, JobStatus::Completed);
    assert!(job.completed_at.is_some());
    assert!(job.failure_reason.is_none());

    let key = job.processed_key.expect("processed key");
    assert!(key.starts_with("processed-files/"));
    assert!(key.ends_with(".jpg"));
    let stored = h.storage.get(&key).await.unwrap();
    assert_eq!(stored.data.len(), 5_000);
    assert_eq!(stored.content_type, "image/jpeg");

    assert_eq!(
        h.store.save_history(id).await,
        vec![JobStatus::Processing, JobStatus::Completed]
    );
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn test_size_window_search_lands_inside_window() {
    let h = Harness::new(FakeTool::sized(|q| u64::from(q.unwrap_or(100)) * 2 * KIB));
    let id = h.add_job(vec![1; 1_000], WINDOW_50_100).await;

    let status = h.processor.process(id).await.unwrap();

    assert_eq!(status, JobStatus::Completed);
    let job = h.job(id).await;
    let stored = h.storage.get(&job.processed_key.unwrap()).await.unwrap();
    let size = stored.data.len() as u64;
    assert!((51_200..=102_400).contains(&size), "size {size} outside window");
    assert!(h.tool.call_count() <= 2 + 8);
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn test_too_complex_image_fails_without_output() {
    let h = Harness::new(FakeTool::sized(|q| 150 * KIB + u64::from(q.unwrap_or(0)) * KIB));
    let id = h.add_job(vec![1; 1_000], WINDOW_50_100).await;

    let status = h.processor.process(id).await.unwrap();

    assert_eq!(status, JobStatus::Failed);
    let job = h.job(id).await;
    assert!(job.processed_key.is_none());
    assert!(job.completed_at.is_some());
    let reason = job.failure_reason.unwrap();
    assert!(reason.contains("too complex"), "{reason}");
    assert!(reason.contains("150.00 KiB"), "{reason}");
    assert_eq!(h.tool.call_count(), 2);
    assert!(h.storage.keys_under(PROCESSED_FILES_FOLDER).await.is_empty());
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn test_too_simple_image_fails() {
    let h = Harness::new(FakeTool::sized(|q| u64::from(q.unwrap_or(0)) * 10));
    let id = h.add_job(vec![1; 1_000], WINDOW_50_100).await;

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Failed);
    let reason = h.job(id).await.failure_reason.unwrap();
    assert!(reason.contains("too simple"), "{reason}");
    assert_eq!(h.tool.call_count(), 2);
}

#[tokio::test]
async fn test_crop_then_resize_order() {
    let h = Harness::new(FakeTool::fixed(2_000));
    let params = r#"{"crop":{"x":10,"y":10,"width":100,"height":100},"resize":{"width":50,"height":50}}"#;
    let id = h.add_job(vec![1; 1_000], params).await;

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Completed);

    let argv = &h.tool.calls()[0];
    let crop = position(argv, "-crop");
    let resize = position(argv, "-resize");
    assert!(crop < resize);
    assert!(resize < argv.len() - 1);
    assert_eq!(argv[crop + 1], "100x100+10+10");
    assert_eq!(argv[resize + 1], "50x50!");
}

#[tokio::test]
async fn test_raw_already_in_window_is_uploaded_untouched() {
    let h = Harness::new(FakeTool::fixed(1));
    let raw: Vec<u8> = (0..60 * KIB).map(|i| (i % 251) as u8).collect();
    let id = h.add_job(raw.clone(), WINDOW_50_100).await;

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Completed);

    assert_eq!(h.tool.call_count(), 0);
    let key = h.job(id).await.processed_key.unwrap();
    assert_eq!(h.storage.get(&key).await.unwrap().data, raw);
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn test_fixed_quality_png() {
    let h = Harness::new(FakeTool::fixed(3_000));
    let params = r#"{"outputFormat":"PNG","compression":{"quality":80,"minSize":1,"maxSize":2}}"#;
    let id = h.add_job(vec![1; 10 * KIB as usize], params).await;

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Completed);

    let calls = h.tool.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][position(&calls[0], "-quality") + 1], "80");
    let key = h.job(id).await.processed_key.unwrap();
    assert!(key.ends_with(".png"));
    assert_eq!(h.storage.get(&key).await.unwrap().content_type, "image/png");
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let h = Harness::new(FakeTool::fixed(1));
    let missing = Uuid::new_v4();

    let err = h.processor.process(missing).await.unwrap_err();

    assert!(matches!(err, ProcessingError::NotFound(id) if id == missing));
    assert_eq!(h.tool.call_count(), 0);
}

#[tokio::test]
async fn test_second_trigger_is_a_no_op() {
    let h = Harness::new(FakeTool::fixed(5_000));
    let id = h.add_job(vec![1; 1_000], "{}").await;

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Completed);
    let first = h.job(id).await;

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Completed);

    assert_eq!(h.tool.call_count(), 1);
    assert_eq!(h.job(id).await, first);
    assert_eq!(h.store.save_history(id).await.len(), 2);
}

#[tokio::test]
async fn test_download_failure_marks_job_failed() {
    let h = Harness::new(FakeTool::fixed(5_000));
    let id = h.add_job(vec![1; 1_000], "{}").await;
    h.storage.set_fail_downloads(true);

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Failed);

    let job = h.job(id).await;
    assert!(job.processed_key.is_none());
    assert!(job.failure_reason.unwrap().contains("download"));
    assert_eq!(h.tool.call_count(), 0);
}

#[tokio::test]
async fn test_upload_failure_marks_job_failed_and_cleans_up() {
    let h = Harness::new(FakeTool::fixed(5_000));
    let id = h.add_job(vec![1; 1_000], "{}").await;
    h.storage.set_fail_uploads(true);

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Failed);
    assert!(h.job(id).await.processed_key.is_none());
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn test_tool_failure_marks_job_failed() {
    let h = Harness::new(FakeTool::fixed(5_000));
    h.tool.set_fail(true);
    let id = h.add_job(vec![1; 1_000], "{}").await;

    assert_eq!(h.processor.process(id).await.unwrap(), JobStatus::Failed);

    let reason = h.job(id).await.failure_reason.unwrap();
    assert!(reason.contains("exit code 1"), "{reason}");
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn test_invalid_parameters_mark_job_failed() {
    let h = Harness::new(FakeTool::fixed(5_000));
    let undecodable = h.add_job(vec![1; 1_000], "not json").await;
    let out_of_range = h.add_job(vec![1; 1_000], r#"{"dpi":0}"#).await;

    assert_eq!(h.processor.process(undecodable).await.unwrap(), JobStatus::Failed);
    assert_eq!(h.processor.process(out_of_range).await.unwrap(), JobStatus::Failed);

    assert!(h
        .job(undecodable)
        .await
        .failure_reason
        .unwrap()
        .contains("cannot decode"));
    assert!(h
        .job(out_of_range)
        .await
        .failure_reason
        .unwrap()
        .contains("invalid job parameters"));
    assert_eq!(h.tool.call_count(), 0);
    assert_eq!(h.scratch_files(), 0);
}
