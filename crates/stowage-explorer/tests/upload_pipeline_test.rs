mod helpers;

use std::sync::Arc;
use std::time::Duration;

use stowage_core::models::GroupOptions;
use stowage_core::AppError;
use stowage_explorer::hooks::{
    ChangeCapacity, CleanFileContent, GenericAfterUpload, GiveBackCapacity, ValidateDestination,
    ValidateFile,
};
use stowage_explorer::{HookStage, UploadRequest};
use tokio_util::sync::CancellationToken;

use helpers::fixtures::{read_object, reader, store_file};
use helpers::hooks::CountingHook;
use helpers::{setup_test_explorer, setup_test_explorer_with};

fn new_file(name: &str, bytes: &[u8]) -> UploadRequest {
    UploadRequest {
        virtual_path: "/".to_string(),
        name: name.to_string(),
        size: bytes.len() as u64,
        mime_type: Some("text/plain".to_string()),
        reader: reader(bytes),
        original: None,
    }
}

#[tokio::test]
async fn test_before_upload_failure_leaves_record_untouched() {
    let app = setup_test_explorer().await;
    let file = store_file(&app, 42, "notes.txt", b"original").await;
    let used_before = app.storage_used().await;

    let reject = CountingHook::failing("reject");
    let first_undo = CountingHook::new("first_undo");
    let second_undo = CountingHook::new("second_undo");
    let canceled = CountingHook::new("canceled");

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::BeforeUpload, Arc::new(ChangeCapacity));
    fs.use_hook(HookStage::BeforeUpload, reject.clone());
    fs.use_hook(HookStage::AfterValidateFailed, Arc::new(GiveBackCapacity));
    fs.use_hook(HookStage::AfterValidateFailed, first_undo.clone());
    fs.use_hook(HookStage::AfterValidateFailed, second_undo.clone());
    fs.use_hook(HookStage::AfterUploadCanceled, canceled.clone());

    let req = UploadRequest {
        original: Some(file.clone()),
        ..new_file("notes.txt", b"a much longer replacement")
    };
    let err = fs.upload(req, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(reject.calls(), 1);
    assert_eq!(first_undo.calls(), 1);
    assert_eq!(second_undo.calls(), 1);
    assert_eq!(canceled.calls(), 0);

    let stored = app.store.file(42).await.unwrap();
    assert_eq!(stored.size, file.size);
    assert_eq!(stored.source_name, file.source_name);
    assert_eq!(read_object(&app, &file.source_name).await, b"original");
    assert_eq!(app.storage_used().await, used_before);
}

#[tokio::test]
async fn test_created_record_points_at_attempt_key() {
    let app = setup_test_explorer().await;

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::BeforeUpload, Arc::new(ValidateFile));
    fs.use_hook(
        HookStage::BeforeUpload,
        Arc::new(ValidateDestination {
            disable_overwrite: true,
        }),
    );
    fs.use_hook(HookStage::BeforeUpload, Arc::new(ChangeCapacity));
    fs.use_hook(HookStage::AfterUpload, Arc::new(GenericAfterUpload));

    let ctx = fs
        .upload(new_file("hello.txt", b"hello world"), &CancellationToken::new())
        .await
        .unwrap();

    let created = ctx.created.expect("record inserted");
    assert_eq!(created.source_name, ctx.save_key);
    assert_eq!(created.size, 11);
    assert_eq!(created.folder_id, app.root.id);
    assert_eq!(read_object(&app, &ctx.save_key).await, b"hello world");
    assert_eq!(app.storage_used().await, 11);
}

#[tokio::test]
async fn test_after_upload_failure_runs_validate_failed() {
    let app = setup_test_explorer().await;
    let commit = CountingHook::failing("commit");
    let undo = CountingHook::new("undo");

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::AfterUpload, commit.clone());
    fs.use_hook(HookStage::AfterValidateFailed, undo.clone());

    let err = fs
        .upload(new_file("a.txt", b"abc"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(commit.calls(), 1);
    assert_eq!(undo.calls(), 1);
}

#[tokio::test]
async fn test_client_abort_rolls_back() {
    let app = setup_test_explorer().await;
    let canceled = CountingHook::new("canceled");

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::BeforeUpload, Arc::new(ChangeCapacity));
    fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(CleanFileContent));
    fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(GiveBackCapacity));
    fs.use_hook(HookStage::AfterUploadCanceled, canceled.clone());

    // The writer half stays open without sending anything, so the transfer stalls.
    let (_client, server) = tokio::io::duplex(64);
    let req = UploadRequest {
        size: 1024,
        reader: Box::pin(server),
        ..new_file("big.bin", b"")
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = fs.upload(req, &cancel).await.unwrap_err();
    assert!(matches!(err, AppError::UploadCanceled(_)));
    assert_eq!(canceled.calls(), 1);
    assert_eq!(app.storage_used().await, 0);
}

#[tokio::test]
async fn test_short_stream_is_a_transfer_error() {
    let app = setup_test_explorer().await;
    let canceled = CountingHook::new("canceled");

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(CleanFileContent));
    fs.use_hook(HookStage::AfterUploadCanceled, canceled.clone());
    fs.use_hook(HookStage::AfterUpload, Arc::new(GenericAfterUpload));

    let req = UploadRequest {
        size: 10,
        ..new_file("short.txt", b"abc")
    };
    let err = fs.upload(req, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AppError::Transfer(_)));
    assert_eq!(canceled.calls(), 1);
    assert!(app.store.file(1).await.is_none());
}

#[tokio::test]
async fn test_failed_rollback_reports_transfer_error() {
    let app = setup_test_explorer().await;
    let broken = CountingHook::failing("broken_cleanup");
    let after = CountingHook::new("after_broken");

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::AfterUploadCanceled, broken.clone());
    fs.use_hook(HookStage::AfterUploadCanceled, after.clone());

    let req = UploadRequest {
        size: 10,
        ..new_file("short.txt", b"abc")
    };
    let err = fs.upload(req, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AppError::Transfer(_)), "got {:?}", err);
    assert_eq!(broken.calls(), 1);
    assert_eq!(after.calls(), 0);
}

#[tokio::test]
async fn test_upload_deadline_cancels_transfer() {
    let app = setup_test_explorer_with(GroupOptions::default(), 1).await;
    let canceled = CountingHook::new("canceled");

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(CleanFileContent));
    fs.use_hook(HookStage::AfterUploadCanceled, canceled.clone());

    let (_client, server) = tokio::io::duplex(64);
    let req = UploadRequest {
        size: 16,
        reader: Box::pin(server),
        ..new_file("slow.bin", b"")
    };

    let err = fs.upload(req, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AppError::UploadCanceled(_)));
    assert_eq!(canceled.calls(), 1);
}

#[tokio::test]
async fn test_rollback_cleans_partial_object() {
    let app = setup_test_explorer().await;

    let mut fs = app.explorer.filesystem(app.user.clone()).await.unwrap();
    fs.use_hook(HookStage::AfterUploadCanceled, Arc::new(CleanFileContent));

    let req = UploadRequest {
        size: 100,
        ..new_file("partial.txt", b"only a few bytes")
    };
    assert!(fs.upload(req, &CancellationToken::new()).await.is_err());

    let mut leftovers = Vec::new();
    let uploads = std::path::Path::new(&app.config.local_storage_path);
    let mut stack = vec![uploads.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                leftovers.push(path);
            }
        }
    }
    assert!(leftovers.is_empty(), "unexpected objects: {:?}", leftovers);
}
