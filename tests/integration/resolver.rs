//! Version resolution against changing page layouts.

use bedrock_updater::config::Platform;
use bedrock_updater::core::UpdaterError;
use bedrock_updater::resolver::{VersionResolver, VersionSource};
use bedrock_updater::test_utils::{TestServer, init_test_logging, test_client};
use bedrock_updater::utils::RetryPolicy;
use std::time::Duration;

use super::common::NAV_PATH;

fn nav_resolver(server: &TestServer, retry: RetryPolicy) -> VersionResolver {
    init_test_logging(None);
    VersionResolver::new(
        test_client(),
        vec![VersionSource::NavIndex(server.url(NAV_PATH))],
        Platform::Windows,
        retry,
    )
    .unwrap()
}

#[tokio::test]
async fn test_marker_fallback_when_layout_changes() {
    let server = TestServer::start().await;
    // No bedrock-latest span and the label sits outside the link
    server.html(
        NAV_PATH,
        r#"<div class="navbox">
  <b>Latest:</b> 1.21.93 <br/>
  <a href="/w/Bedrock_Edition_1.21.92">previous</a>
  <a href="/w/Bedrock_Edition_1.21.93">release notes</a>
</div>"#,
    );
    server.html(
        "/w/Bedrock_Edition_1.21.93",
        r#"<ul><li><a href="/bin-win/bedrock-server-1.21.93.1.zip">Windows server</a></li></ul>"#,
    );

    let resolution = nav_resolver(&server, RetryPolicy::immediate()).resolve().await.unwrap();

    assert_eq!(resolution.version, "1.21.93");
    assert!(resolution.artifact_url.as_str().ends_with("bedrock-server-1.21.93.1.zip"));
    assert_eq!(server.hits("/w/Bedrock_Edition_1.21.92"), 0);
}

#[tokio::test]
async fn test_direct_link_used_when_marker_is_gone() {
    let server = TestServer::start().await;
    server.html(
        NAV_PATH,
        r#"<p>Current release: <a href="/w/Bedrock_Edition_1.21.94">1.21.94</a></p>"#,
    );
    server.html(
        "/w/Bedrock_Edition_1.21.94",
        r#"<a aria-label="serverBedrockWindows" href="/bin-win/bedrock-server-1.21.94.2.zip">Get it</a>"#,
    );

    let resolution = nav_resolver(&server, RetryPolicy::immediate()).resolve().await.unwrap();

    assert_eq!(resolution.version, "1.21.94");
    assert_eq!(resolution.artifact_url, server.url("/bin-win/bedrock-server-1.21.94.2.zip"));
}

#[tokio::test]
async fn test_link_straight_to_archive_is_not_fetched() {
    let server = TestServer::start().await;
    server.html(
        NAV_PATH,
        r#"<span class="bedrock-latest"><a href="/bin-win/bedrock-server-1.21.93.1.zip" title="Download">Latest: 1.21.93.1</a></span>"#,
    );

    let resolution = nav_resolver(&server, RetryPolicy::immediate()).resolve().await.unwrap();

    assert_eq!(resolution.version, "1.21.93.1");
    assert_eq!(server.total_hits(), 1);
}

#[tokio::test]
async fn test_missing_download_link_is_retried_then_reported() {
    let server = TestServer::start().await;
    server.html(
        NAV_PATH,
        r#"<span class="bedrock-latest"><a href="/w/Bedrock_Edition_1.21.93" title="x">Latest: 1.21.93</a></span>"#,
    );
    server.html("/w/Bedrock_Edition_1.21.93", "<p>Coming soon</p>");

    let err = nav_resolver(&server, RetryPolicy::new(2, Duration::ZERO))
        .resolve()
        .await
        .unwrap_err();

    match err {
        UpdaterError::VersionUnavailable { attempts, source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*source, UpdaterError::ArtifactNotFound { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.hits("/w/Bedrock_Edition_1.21.93"), 2);
}

#[tokio::test]
async fn test_broken_link_is_retried_then_reported() {
    let server = TestServer::start().await;
    server.html(
        NAV_PATH,
        r#"<span class="bedrock-latest"><a href="http://[broken/w/Bedrock_Edition_1.21.93" title="x">Latest: 1.21.93</a></span>"#,
    );

    let err = nav_resolver(&server, RetryPolicy::new(3, Duration::ZERO))
        .resolve()
        .await
        .unwrap_err();

    match err {
        UpdaterError::VersionUnavailable { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, UpdaterError::MalformedLink { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.hits(NAV_PATH), 3);
}

#[tokio::test]
async fn test_broken_link_falls_through_to_next_source() {
    let server = TestServer::start().await;
    server.html(
        NAV_PATH,
        r#"<span class="bedrock-latest"><a href="http://[broken/w/Bedrock_Edition_1.21.93" title="x">Latest: 1.21.93</a></span>"#,
    );
    server.html(
        "/download/server/bedrock",
        r#"<a href="/bin-win/bedrock-server-1.21.93.1.zip" aria-label="serverBedrockWindows">Download</a>"#,
    );

    let resolver = VersionResolver::new(
        test_client(),
        vec![
            VersionSource::NavIndex(server.url(NAV_PATH)),
            VersionSource::DownloadPage(server.url("/download/server/bedrock")),
        ],
        Platform::Windows,
        RetryPolicy::new(3, Duration::ZERO),
    )
    .unwrap();
    let resolution = resolver.resolve().await.unwrap();

    assert_eq!(resolution.version, "1.21.93.1");
    assert_eq!(resolution.artifact_url, server.url("/bin-win/bedrock-server-1.21.93.1.zip"));
    assert_eq!(server.hits(NAV_PATH), 1);
    assert_eq!(server.hits("/download/server/bedrock"), 1);
}

#[tokio::test]
async fn test_backoff_delays_between_attempts() {
    let server = TestServer::start().await;
    server.route(NAV_PATH, 500, "oops");

    let started = std::time::Instant::now();
    let err = nav_resolver(&server, RetryPolicy::new(3, Duration::from_millis(50)))
        .resolve()
        .await
        .unwrap_err();

    assert!(matches!(err, UpdaterError::VersionUnavailable { attempts: 3, .. }));
    // 50ms after the first failure, 100ms after the second
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(server.hits(NAV_PATH), 3);
}

#[tokio::test]
async fn test_vendor_download_page_picks_platform_build() {
    let server = TestServer::start().await;
    server.html(
        "/download/server/bedrock",
        r#"
	<a href="https://www.minecraft.net/bedrockdedicatedserver/bin-win/bedrock-server-1.21.93.1.zip" class="MC_Button MC_Button_Hero_Outline" aria-label="serverBedrockWindows" id="MC_Download_Server_1" target="_blank" data-bi-bhvr="DOWNLOAD">
	<span>Download</span>
	</a>
	<a href="https://www.minecraft.net/bedrockdedicatedserver/bin-linux/bedrock-server-1.21.93.1.zip" class="MC_Button MC_Button_Hero_Outline" aria-label="serverBedrockLinux" id="MC_Download_Server_2" target="_blank" data-bi-bhvr="DOWNLOAD">
	<span>Download</span>
	</a>
	"#,
    );

    let resolver = VersionResolver::new(
        test_client(),
        vec![VersionSource::DownloadPage(server.url("/download/server/bedrock"))],
        Platform::Linux,
        RetryPolicy::immediate(),
    )
    .unwrap();
    let resolution = resolver.resolve().await.unwrap();

    assert_eq!(resolution.version, "1.21.93.1");
    assert_eq!(
        resolution.artifact_url.as_str(),
        "https://www.minecraft.net/bedrockdedicatedserver/bin-linux/bedrock-server-1.21.93.1.zip"
    );
}
