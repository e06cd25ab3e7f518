use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flick::update::{UpdateError, UpdateOutcome, Updater};

fn release_body(tag: &str, server: &str) -> String {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!(
        r#"{{
            "tag_name": "{tag}",
            "assets": [
                {{"name": "flick-{os}-{arch}", "browser_download_url": "{server}/download/flick-{os}-{arch}"}},
                {{"name": "checksums.txt", "browser_download_url": "{server}/download/checksums.txt"}}
            ]
        }}"#
    )
}

#[tokio::test]
async fn test_update_replaces_binary() {
    let mock_server = MockServer::start().await;
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;

    Mock::given(method("GET"))
        .and(path("/repos/wraient/flick/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(release_body("v0.2.0", &mock_server.uri())),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/download/flick-{os}-{arch}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new flick".to_vec()))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("flick");
    std::fs::write(&exe, b"old flick").unwrap();

    let updater = Updater::with_base_url(&mock_server.uri(), "0.1.0").unwrap();
    let outcome = updater.update(&exe).await.unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: "0.1.0".to_string(),
            to: "0.2.0".to_string()
        }
    );
    assert_eq!(std::fs::read(&exe).unwrap(), b"new flick");
}

#[tokio::test]
async fn test_update_skips_current_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/wraient/flick/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(release_body("v0.1.0", &mock_server.uri())),
        )
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("flick");
    std::fs::write(&exe, b"old flick").unwrap();

    let updater = Updater::with_base_url(&mock_server.uri(), "0.1.0").unwrap();
    let outcome = updater.update(&exe).await.unwrap();

    assert_eq!(outcome, UpdateOutcome::UpToDate("0.1.0".to_string()));
    assert_eq!(std::fs::read(&exe).unwrap(), b"old flick");
}

#[tokio::test]
async fn test_update_without_matching_asset() {
    let mock_server = MockServer::start().await;

    let body = r#"{"tag_name": "v9.0.0", "assets": [{"name": "source.tar.gz", "browser_download_url": "http://x/s"}]}"#;
    Mock::given(method("GET"))
        .and(path("/repos/wraient/flick/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("flick");

    let updater = Updater::with_base_url(&mock_server.uri(), "0.1.0").unwrap();
    let result = updater.update(&exe).await;

    assert!(matches!(result, Err(UpdateError::NoAsset(_))));
}

#[tokio::test]
async fn test_release_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/wraient/flick/releases/latest"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let updater = Updater::with_base_url(&mock_server.uri(), "0.1.0").unwrap();
    let result = updater.latest_release().await;

    assert!(matches!(result, Err(UpdateError::Status(s)) if s.as_u16() == 403));
}
