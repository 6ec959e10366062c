//! Complete upgrades through `UpdateOrchestrator::update_if_new`.

use anyhow::Result;
use bedrock_updater::core::UpdaterError;
use bedrock_updater::deploy::{ActivePointerUpdater, AtomicPointer, RelinkPointer, WorldBackup};
use bedrock_updater::orchestrator::UpdateStatus;
use bedrock_updater::process::ProcessController;
use bedrock_updater::test_utils::{
    RecordingController, TestServer, ZipFixture, deployment_with_world, link_pointer,
};
use bedrock_updater::utils::RetryPolicy;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

use super::common::{NAV_PATH, archive_path, orchestrator, points_at, publish, publish_with_archive};

/// Pointer updater that logs the swap into a controller's call log.
struct RecordingPointer {
    log: RecordingController,
}

impl ActivePointerUpdater for RecordingPointer {
    fn activate(&self, deployment: &Path, pointer: &Path) -> Result<()> {
        self.log.record("activate");
        AtomicPointer.activate(deployment, pointer)
    }
}

/// Pointer updater that always fails.
struct RefusingPointer;

impl ActivePointerUpdater for RefusingPointer {
    fn activate(&self, _deployment: &Path, pointer: &Path) -> Result<()> {
        anyhow::bail!("{} is read-only", pointer.display())
    }
}

fn level_dat(deployment: &Path) -> String {
    fs::read_to_string(deployment.join("worlds").join("Bedrock level").join("level.dat"))
        .unwrap()
}

#[tokio::test]
async fn test_fresh_install_then_nothing_to_do() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("servers");
    let orchestrator = orchestrator(&server, &root, RetryPolicy::immediate());

    let status = orchestrator.update_if_new("", &AtomicPointer, None).await.unwrap();

    let deployment = root.join("bedrock-server-1.21.93.1");
    assert_eq!(
        status,
        UpdateStatus::Updated {
            version: "1.21.93.1".to_string(),
            deployment: deployment.clone(),
        }
    );
    assert!(points_at(&root.join("Latest"), &deployment));
    assert!(deployment.join("server.properties").is_file());
    assert!(root.join("bedrock-server-1.21.93.1.zip").is_file());
    assert_eq!(level_dat(&deployment), "vanilla");

    let again = orchestrator.update_if_new("1.21.93.1", &AtomicPointer, None).await.unwrap();
    assert_eq!(
        again,
        UpdateStatus::UpToDate {
            version: "1.21.93.1".to_string()
        }
    );
    assert_eq!(server.hits(&archive_path("1.21.93.1")), 1);
}

#[tokio::test]
async fn test_world_data_survives_upgrade() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));

    let status = orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new("1.21.92.1", &AtomicPointer, None)
        .await
        .unwrap();

    assert!(status.updated());
    let new = root.join("bedrock-server-1.21.93.1");
    assert_eq!(level_dat(&new), "testdata");
    assert!(points_at(&root.join("Latest"), &new));
    // The previous deployment is kept as it was
    assert_eq!(level_dat(&old), "testdata");
}

#[tokio::test]
async fn test_relink_pointer_upgrade() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));

    orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new("1.21.92.1", &RelinkPointer, None)
        .await
        .unwrap();

    assert!(points_at(&root.join("Latest"), &root.join("bedrock-server-1.21.93.1")));
}

#[tokio::test]
async fn test_missing_pointer_falls_back_to_last_sibling() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    deployment_with_world(root, "bedrock-server-1.21.90.0", "Bedrock level", "older");
    deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "newest");

    orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new("1.21.92.1", &AtomicPointer, None)
        .await
        .unwrap();

    assert_eq!(level_dat(&root.join("bedrock-server-1.21.93.1")), "newest");
}

#[tokio::test]
async fn test_backup_taken_before_migration() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("servers");
    let backups = temp.path().join("backups");
    let old = deployment_with_world(&root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));

    orchestrator(&server, &root, RetryPolicy::immediate())
        .with_backup(Some(WorldBackup::new(backups.clone(), None)))
        .update_if_new("1.21.92.1", &AtomicPointer, None)
        .await
        .unwrap();

    let snapshots: Vec<_> = fs::read_dir(&backups).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        fs::read_to_string(snapshots[0].join("Bedrock level").join("level.dat")).unwrap(),
        "testdata"
    );
}

#[tokio::test]
async fn test_process_is_stopped_before_swap_and_started_after() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));

    let mut controller = RecordingController::running();
    let pointer = RecordingPointer {
        log: controller.clone(),
    };
    let orchestrator = orchestrator(&server, root, RetryPolicy::immediate())
        .with_shutdown_grace(Duration::from_secs(1));

    let status = orchestrator
        .update_if_new(
            "1.21.92.1",
            &pointer,
            Some(&mut controller as &mut dyn ProcessController),
        )
        .await
        .unwrap();

    assert!(status.updated());
    assert_eq!(
        controller.calls(),
        vec![
            "is_running".to_string(),
            "request_shutdown".to_string(),
            "kill".to_string(),
            "activate".to_string(),
            format!("start:{}", root.join("Latest").display()),
        ]
    );

    // Up to date: the process is left alone
    orchestrator
        .update_if_new(
            "1.21.93.1",
            &pointer,
            Some(&mut controller as &mut dyn ProcessController),
        )
        .await
        .unwrap();
    assert_eq!(controller.calls().len(), 5);
}

#[tokio::test]
async fn test_failed_swap_restarts_previous_deployment() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));
    let mut controller = RecordingController::running();

    let err = orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new(
            "1.21.92.1",
            &RefusingPointer,
            Some(&mut controller as &mut dyn ProcessController),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to point"));
    assert!(points_at(&root.join("Latest"), &old));
    assert_eq!(
        controller.calls(),
        vec![
            "is_running".to_string(),
            "request_shutdown".to_string(),
            "kill".to_string(),
            "is_running".to_string(),
            format!("start:{}", root.join("Latest").display()),
        ]
    );
}

#[tokio::test]
async fn test_failed_world_migration_aborts_before_activation() {
    let server = TestServer::start().await;
    // `worlds` is a plain file in the new distribution, so nothing can be copied below it
    let archive = ZipFixture::new()
        .file("bedrock_server.exe", "binary")
        .file("worlds", "not a directory")
        .build();
    publish_with_archive(&server, "1.21.93.1", archive);
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));
    let mut controller = RecordingController::running();

    let err = orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new(
            "1.21.92.1",
            &AtomicPointer,
            Some(&mut controller as &mut dyn ProcessController),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("World migration failed"));
    assert!(points_at(&root.join("Latest"), &old));
    assert!(controller.calls().is_empty());
    assert_eq!(level_dat(&old), "testdata");
}

#[tokio::test]
async fn test_resolve_failure_changes_nothing() {
    let server = TestServer::start().await;
    server.route(NAV_PATH, 503, "maintenance");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));
    let mut controller = RecordingController::running();

    let err = orchestrator(&server, root, RetryPolicy::new(3, Duration::ZERO))
        .update_if_new(
            "1.21.92.1",
            &AtomicPointer,
            Some(&mut controller as &mut dyn ProcessController),
        )
        .await
        .unwrap_err();

    match err.downcast_ref::<UpdaterError>() {
        Some(UpdaterError::VersionUnavailable { attempts, .. }) => assert_eq!(*attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.hits(NAV_PATH), 3);
    assert_eq!(server.total_hits(), 3);
    assert!(controller.calls().is_empty());
    assert!(points_at(&root.join("Latest"), &old));
    assert_eq!(fs::read_dir(root).unwrap().count(), 2);
}

#[tokio::test]
async fn test_download_failure_keeps_active_deployment() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    server.route(&archive_path("1.21.93.1"), 404, "gone");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));
    let mut controller = RecordingController::running();

    let result = orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new(
            "1.21.92.1",
            &AtomicPointer,
            Some(&mut controller as &mut dyn ProcessController),
        )
        .await;

    assert!(result.is_err());
    assert!(controller.calls().is_empty());
    assert!(points_at(&root.join("Latest"), &old));
    assert!(!root.join("bedrock-server-1.21.93.1").exists());
}

#[tokio::test]
async fn test_corrupt_archive_keeps_active_deployment() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    server.file(&archive_path("1.21.93.1"), b"definitely not a zip".to_vec());
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let old = deployment_with_world(root, "bedrock-server-1.21.92.1", "Bedrock level", "testdata");
    link_pointer(&old, &root.join("Latest"));

    let result = orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new("1.21.92.1", &AtomicPointer, None)
        .await;

    assert!(result.is_err());
    assert!(points_at(&root.join("Latest"), &old));
}

#[tokio::test]
async fn test_lost_record_with_active_latest_is_up_to_date() {
    let server = TestServer::start().await;
    publish(&server, "1.21.93.1");
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let current = deployment_with_world(root, "bedrock-server-1.21.93.1", "Bedrock level", "testdata");
    link_pointer(&current, &root.join("Latest"));

    let status = orchestrator(&server, root, RetryPolicy::immediate())
        .update_if_new("", &AtomicPointer, None)
        .await
        .unwrap();

    assert!(!status.updated());
    assert_eq!(status.version(), "1.21.93.1");
    assert_eq!(server.hits(&archive_path("1.21.93.1")), 0);
    assert_eq!(level_dat(&current), "testdata");
}
