use std::io::Write as _;

use super::*;
use crate::{
    error::GatewayError,
    gateway::Payload,
    test_support::{material_json, notifier, ScriptedGateway},
};
use serde_json::json;

const UPLOAD: &str = "/materials/upload";
const LIST: &str = "/materials/list/demo-course";

fn receipt_json() -> serde_json::Value {
    json!({
        "material_id": "mat-9",
        "title": "lecture.pdf",
        "text_length": 4200,
        "message": "uploaded",
    })
}

fn flow(gateway: Arc<ScriptedGateway>) -> (Arc<MaterialsStore>, UploadFlow) {
    let notifier = notifier();
    let materials = Arc::new(MaterialsStore::new(gateway.clone(), notifier.clone()));
    let flow = UploadFlow::new(
        gateway,
        materials.clone(),
        CourseId::new("demo-course"),
        notifier,
    );
    (materials, flow)
}

#[test]
fn mime_type_is_guessed_from_extension() {
    assert_eq!(UploadFile::new("a.pdf", vec![]).mime_type, "application/pdf");
    assert_eq!(UploadFile::new("a.txt", vec![]).mime_type, "text/plain");
    assert_eq!(
        UploadFile::new("archive", vec![]).mime_type,
        "application/octet-stream"
    );
}

#[test]
fn advisory_flags_files_outside_the_hint() {
    assert!(UploadFile::new("notes.TXT", vec![0; 10]).advisory().is_clean());

    let wrong_type = UploadFile::new("photo.png", vec![0; 10]).advisory();
    assert!(!wrong_type.supported_extension);
    assert!(wrong_type.within_size_hint);

    let oversized = UploadFile::new("big.pdf", vec![0; ADVISORY_MAX_BYTES + 1]).advisory();
    assert!(oversized.supported_extension);
    assert!(!oversized.within_size_hint);
}

#[tokio::test]
async fn from_path_reads_bytes_and_file_name() {
    let mut file = tempfile::Builder::new()
        .suffix(".txt")
        .tempfile()
        .expect("tempfile");
    file.write_all(b"photosynthesis notes").expect("write");

    let upload = UploadFile::from_path(file.path()).await.expect("read");
    assert_eq!(upload.bytes, b"photosynthesis notes");
    assert!(upload.filename.ends_with(".txt"));
    assert_eq!(upload.mime_type, "text/plain");

    let missing = UploadFile::from_path(file.path().with_extension("missing")).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn successful_upload_refreshes_materials_once() {
    let gateway = ScriptedGateway::new();
    gateway.reply_ok(UPLOAD, receipt_json()).await;
    gateway
        .reply_ok(LIST, json!({"materials": [material_json("mat-9", "lecture.pdf", 4200)]}))
        .await;
    let (materials, flow) = flow(gateway.clone());

    let receipt = flow
        .submit(UploadFile::new("lecture.pdf", b"%PDF-1.4".to_vec()))
        .await
        .expect("upload");

    assert_eq!(receipt.material_id.as_str(), "mat-9");
    assert_eq!(gateway.calls_to(UPLOAD).await, 1);
    assert_eq!(gateway.calls_to(LIST).await, 1);
    assert_eq!(materials.materials().await.len(), 1);
    assert_eq!(flow.snapshot().await.state.last_receipt, Some(receipt));

    let calls = gateway.calls().await;
    assert_eq!(
        calls[0].payload,
        Payload::Multipart(UploadFile::new("lecture.pdf", b"%PDF-1.4".to_vec()))
    );
}

#[tokio::test]
async fn oversized_and_unlisted_files_are_still_sent() {
    let gateway = ScriptedGateway::new();
    gateway.reply_ok(UPLOAD, receipt_json()).await;
    gateway.reply_ok(LIST, json!({"materials": []})).await;
    let (_, flow) = flow(gateway.clone());

    flow.submit(UploadFile::new("slides.pptx", vec![7; ADVISORY_MAX_BYTES + 10]))
        .await
        .expect("no client-side limit");
    assert_eq!(gateway.calls_to(UPLOAD).await, 1);
}

#[tokio::test]
async fn failed_upload_is_recorded_and_retryable() {
    let gateway = ScriptedGateway::new();
    gateway
        .reply_err(UPLOAD, GatewayError::HttpFailure { status: 400 })
        .await;
    gateway.reply_ok(UPLOAD, receipt_json()).await;
    gateway.reply_ok(LIST, json!({"materials": []})).await;
    let (_, flow) = flow(gateway.clone());
    let file = UploadFile::new("notes.txt", b"some text".to_vec());

    flow.submit(file.clone()).await.expect_err("rejected");
    let snapshot = flow.snapshot().await;
    assert_eq!(snapshot.error.and_then(|e| e.status), Some(400));
    assert_eq!(gateway.calls_to(LIST).await, 0);

    flow.submit(file).await.expect("retry");
    assert!(flow.snapshot().await.error.is_none());
    assert_eq!(gateway.calls_to(LIST).await, 1);
}

#[tokio::test]
async fn refresh_failure_after_upload_stays_on_materials_workflow() {
    let gateway = ScriptedGateway::new();
    gateway.reply_ok(UPLOAD, receipt_json()).await;
    gateway
        .reply_err(LIST, GatewayError::NetworkFailure("reset".into()))
        .await;
    let (materials, flow) = flow(gateway.clone());

    flow.submit(UploadFile::new("notes.txt", b"text".to_vec()))
        .await
        .expect("upload itself succeeded");

    assert!(flow.snapshot().await.error.is_none());
    assert!(materials.snapshot().await.error.is_some());
}

#[tokio::test]
async fn dropped_files_submit_only_the_first() {
    let gateway = ScriptedGateway::new();
    gateway.reply_ok(UPLOAD, receipt_json()).await;
    gateway.reply_ok(LIST, json!({"materials": []})).await;
    let (_, flow) = flow(gateway.clone());

    let err = flow.submit_dropped(Vec::new()).await.expect_err("empty drop");
    assert!(err.is_validation());
    assert!(gateway.calls().await.is_empty());

    flow.submit_dropped(vec![
        UploadFile::new("first.txt", b"1".to_vec()),
        UploadFile::new("second.txt", b"2".to_vec()),
    ])
    .await
    .expect("upload");

    let calls = gateway.calls().await;
    assert_eq!(gateway.calls_to(UPLOAD).await, 1);
    match &calls[0].payload {
        Payload::Multipart(file) => assert_eq!(file.filename, "first.txt"),
        other => panic!("unexpected payload {other:?}"),
    }
}
