//! Shared setup for the integration tests.

use bedrock_updater::config::Platform;
use bedrock_updater::deploy::{ArtifactDownloader, DeploymentLayout, WorldMigrator};
use bedrock_updater::orchestrator::UpdateOrchestrator;
use bedrock_updater::resolver::{VersionResolver, VersionSource};
use bedrock_updater::test_utils::{TestServer, ZipFixture, init_test_logging, test_client};
use bedrock_updater::utils::RetryPolicy;
use std::path::Path;

/// Path of the navigation page served by [`publish`].
pub const NAV_PATH: &str = "/nav";

/// Path of the archive [`publish`] serves for `version`.
pub fn archive_path(version: &str) -> String {
    format!("/bin-win/bedrock-server-{version}.zip")
}

/// Make `version` the latest release: navigation page, release page and a
/// server archive whose world holds `vanilla`.
pub fn publish(server: &TestServer, version: &str) {
    publish_with_archive(server, version, ZipFixture::server_distribution(version).build());
}

/// Like [`publish`] with a custom archive.
pub fn publish_with_archive(server: &TestServer, version: &str, archive: Vec<u8>) {
    server.html(
        NAV_PATH,
        &format!(
            r#"<table class="navbox"><tr><td>
<span class="bedrock-latest"><a href="/w/Bedrock_Edition_{version}" title="Bedrock Edition {version}">Latest: {version}</a></span>
</td></tr></table>"#
        ),
    );
    server.html(
        &format!("/w/Bedrock_Edition_{version}"),
        &format!(
            r#"<p>Server software:</p>
<a href="{}" aria-label="serverBedrockWindows">Download</a>"#,
            archive_path(version)
        ),
    );
    server.file(&archive_path(version), archive);
}

/// Layout with the default names rooted at `root`.
pub fn layout(root: &Path) -> DeploymentLayout {
    DeploymentLayout {
        root: root.to_path_buf(),
        prefix: "bedrock-server".to_string(),
        pointer_name: "Latest".to_string(),
        worlds_dir_name: "worlds".to_string(),
    }
}

/// Orchestrator reading the navigation page of `server`.
pub fn orchestrator(server: &TestServer, root: &Path, retry: RetryPolicy) -> UpdateOrchestrator {
    init_test_logging(None);
    let layout = layout(root);
    let resolver = VersionResolver::new(
        test_client(),
        vec![VersionSource::NavIndex(server.url(NAV_PATH))],
        Platform::Windows,
        retry,
    )
    .expect("resolver");

    UpdateOrchestrator::new(
        layout.clone(),
        resolver,
        ArtifactDownloader::new(test_client()),
        WorldMigrator::new(layout, None),
    )
}

/// Whether `pointer` currently resolves to `deployment`.
pub fn points_at(pointer: &Path, deployment: &Path) -> bool {
    match (std::fs::canonicalize(pointer), std::fs::canonicalize(deployment)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
