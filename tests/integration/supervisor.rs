//! Supervised mode with a real (scripted) server process.

use anyhow::Result;
use bedrock_updater::config::ServerSettings;
use bedrock_updater::deploy::ActivePointerUpdater;
use bedrock_updater::process::{ChildProcessController, ProcessController};
use bedrock_updater::supervisor::Supervisor;
use bedrock_updater::test_utils::{TestServer, ZipFixture, deployment_with_world, link_pointer};
use bedrock_updater::utils::RetryPolicy;
use bedrock_updater::version_record::VersionRecord;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use super::common::{orchestrator, points_at, publish_with_archive};

/// Console loop that exits once it reads `stop`.
const SERVER_SCRIPT: &str = "#!/bin/sh\nwhile read line; do [ \"$line\" = stop ] && exit 0; done\n";

fn scripted_distribution(version: &str) -> Vec<u8> {
    ZipFixture::new()
        .file_with_mode("bedrock_server", SERVER_SCRIPT, 0o755)
        .file("server.properties", format!("# {version}\n"))
        .file("worlds/Bedrock level/level.dat", "vanilla")
        .build()
}

/// Pointer updater that always fails.
struct FullDiskPointer;

impl ActivePointerUpdater for FullDiskPointer {
    fn activate(&self, _deployment: &Path, _pointer: &Path) -> Result<()> {
        anyhow::bail!("disk full")
    }
}

fn controller() -> ChildProcessController {
    ChildProcessController::new(ServerSettings {
        executable: "bedrock_server".to_string(),
        ..ServerSettings::default()
    })
}

/// Deployment with a scripted server and world data, active at `root/Latest`.
fn active_scripted_deployment(root: &Path, name: &str) -> PathBuf {
    let deployment = deployment_with_world(root, name, "Bedrock level", "testdata");
    let executable = deployment.join("bedrock_server");
    std::fs::write(&executable, SERVER_SCRIPT).unwrap();
    std::fs::set_permissions(&executable, std::fs::Permissions::from_mode(0o755)).unwrap();
    link_pointer(&deployment, &root.join("Latest"));
    deployment
}

fn supervisor(server: &TestServer, root: &Path) -> Supervisor {
    Supervisor::new(
        orchestrator(server, root, RetryPolicy::immediate()),
        VersionRecord::new(root.join("last_version.txt")),
        controller(),
        Duration::from_secs(3600),
        Duration::from_secs(5),
    )
}

/// Completes once the record at `path` holds `version`.
async fn recorded(path: PathBuf, version: &'static str) {
    loop {
        if std::fs::read_to_string(&path).is_ok_and(|v| v == version) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_first_check_installs_and_starts() {
    let server = TestServer::start().await;
    publish_with_archive(&server, "1.21.93.1", scripted_distribution("1.21.93.1"));
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("servers");

    let run = supervisor(&server, &root)
        .run_until(recorded(root.join("last_version.txt"), "1.21.93.1"));
    tokio::time::timeout(Duration::from_secs(30), run).await.unwrap().unwrap();

    assert!(points_at(&root.join("Latest"), &root.join("bedrock-server-1.21.93.1")));
}

#[tokio::test]
async fn test_running_server_is_upgraded_in_place() {
    let server = TestServer::start().await;
    publish_with_archive(&server, "1.21.93.1", scripted_distribution("1.21.93.1"));
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();

    active_scripted_deployment(&root, "bedrock-server-1.21.92.1");
    std::fs::write(root.join("last_version.txt"), "1.21.92.1").unwrap();

    let run = supervisor(&server, &root)
        .run_until(recorded(root.join("last_version.txt"), "1.21.93.1"));
    tokio::time::timeout(Duration::from_secs(30), run).await.unwrap().unwrap();

    let new = root.join("bedrock-server-1.21.93.1");
    assert!(points_at(&root.join("Latest"), &new));
    assert_eq!(
        std::fs::read_to_string(new.join("worlds/Bedrock level/level.dat")).unwrap(),
        "testdata"
    );
}

#[tokio::test]
async fn test_check_once_when_up_to_date() {
    let server = TestServer::start().await;
    publish_with_archive(&server, "1.21.93.1", scripted_distribution("1.21.93.1"));
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();
    std::fs::write(root.join("last_version.txt"), "1.21.93.1\n").unwrap();

    let mut supervisor = supervisor(&server, &root);
    let status = supervisor.check_once().await.unwrap();

    assert!(!status.updated());
    assert_eq!(server.hits("/bin-win/bedrock-server-1.21.93.1.zip"), 0);
    assert!(!root.join("Latest").exists());
}

#[tokio::test]
async fn test_server_restarted_when_swap_fails() {
    let server = TestServer::start().await;
    publish_with_archive(&server, "1.21.93.1", scripted_distribution("1.21.93.1"));
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();
    let old = active_scripted_deployment(&root, "bedrock-server-1.21.92.1");

    let mut controller = controller();
    controller.start(&root.join("Latest")).await.unwrap();
    let first_pid = controller.pid();
    assert!(first_pid.is_some());

    let err = orchestrator(&server, &root, RetryPolicy::immediate())
        .with_shutdown_grace(Duration::from_secs(5))
        .update_if_new(
            "1.21.92.1",
            &FullDiskPointer,
            Some(&mut controller as &mut dyn ProcessController),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to point"));
    assert!(points_at(&root.join("Latest"), &old));
    assert!(controller.is_running().await.unwrap());
    assert_ne!(controller.pid(), first_pid);

    controller.request_shutdown().await.unwrap();
    controller.kill(Duration::from_secs(5)).await.unwrap();
}
