use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flick::catalog::{CatalogClient, CatalogError, EpisodeSource, next_episode};

fn directory_body(id: &str, name: &str, parent: &str, files: &str) -> String {
    format!(
        r#"{{
            "message": "ok",
            "data": {{
                "id": "{id}",
                "name": "{name}",
                "parent": "{parent}",
                "dir": true,
                "files": {files}
            }}
        }}"#
    )
}

#[tokio::test]
async fn test_get_directory_returns_files() {
    let mock_server = MockServer::start().await;

    let body = directory_body(
        "show1",
        "Some Show",
        "root",
        r#"[
            {"id": "f1", "name": "Some.Show.S01E01.mkv", "dir": false, "parent": "show1"},
            {"id": "d1", "name": "Extras", "dir": true, "parent": "show1"}
        ]"#,
    );

    Mock::given(method("GET"))
        .and(path("/api/d/show1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = CatalogClient::with_base_url(&mock_server.uri(), "https://cdn.test/f");
    let dir = client.get_directory("show1").await.unwrap();

    assert_eq!(dir.name, "Some Show");
    assert!(dir.has_parent());
    assert_eq!(dir.files.len(), 2);
    assert!(dir.files[1].dir);
}

#[tokio::test]
async fn test_search_returns_matches() {
    let mock_server = MockServer::start().await;

    let body = r#"{
        "message": "ok",
        "data": [
            {"id": "a", "name": "Breaking Bad", "dir": true, "parent": "root"},
            {"id": "b", "name": "Breaking Point", "dir": true, "parent": "root"}
        ]
    }"#;

    Mock::given(method("GET"))
        .and(path("/api/s/breaking%20bad"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = CatalogClient::with_base_url(&mock_server.uri(), "https://cdn.test/f");
    let results = client.search("breaking bad").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "Breaking Bad");
}

#[tokio::test]
async fn test_list_episodes_descends_into_season_folders() {
    let mock_server = MockServer::start().await;

    let root = directory_body(
        "show1",
        "Some Show",
        "root",
        r#"[
            {"id": "s2", "name": "Season 2", "dir": true, "parent": "show1"},
            {"id": "s1", "name": "Season 1", "dir": true, "parent": "show1"},
            {"id": "readme", "name": "info.txt", "dir": false, "parent": "show1"}
        ]"#,
    );
    let season1 = directory_body(
        "s1",
        "Season 1",
        "show1",
        r#"[
            {"id": "e10", "name": "Some.Show.S01E10.mkv", "dir": false, "parent": "s1"},
            {"id": "e9", "name": "Some.Show.S01E09.mkv", "dir": false, "parent": "s1"}
        ]"#,
    );
    let season2 = directory_body(
        "s2",
        "Season 2",
        "show1",
        r#"[
            {"id": "e21", "name": "Episode 1.mp4", "dir": false, "parent": "s2"}
        ]"#,
    );

    for (id, body) in [("show1", root), ("s1", season1), ("s2", season2)] {
        Mock::given(method("GET"))
            .and(path(format!("/api/d/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;
    }

    let client = CatalogClient::with_base_url(&mock_server.uri(), "https://cdn.test/f");
    let episodes = client.list_episodes("show1").await.unwrap();

    let keys: Vec<(u32, u32)> = episodes.iter().map(|e| (e.season, e.episode)).collect();
    assert_eq!(keys, vec![(1, 9), (1, 10), (2, 1)]);

    let next = next_episode(&episodes, "e10").unwrap();
    assert_eq!(next.id, "e21");
    assert!(next_episode(&episodes, "e21").is_none());
    assert_eq!(client.source_url("e21"), "https://cdn.test/f/e21");
}

#[tokio::test]
async fn test_rate_limited_response_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/s/anything"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "42")
                .set_body_string(r#"{"message": "ok", "data": []}"#),
        )
        .mount(&mock_server)
        .await;

    let client = CatalogClient::with_base_url(&mock_server.uri(), "https://cdn.test/f");
    let result = client.search("anything").await;

    match result {
        Err(CatalogError::RateLimited(reset)) => assert_eq!(reset, "42"),
        other => panic!("expected rate limit error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/d/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = CatalogClient::with_base_url(&mock_server.uri(), "https://cdn.test/f");
    let result = client.get_directory("missing").await;

    assert!(matches!(result, Err(CatalogError::Status(s)) if s.as_u16() == 404));
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/d/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = CatalogClient::with_base_url(&mock_server.uri(), "https://cdn.test/f");
    let result = client.get_directory("broken").await;

    assert!(matches!(result, Err(CatalogError::Decode(_))));
}

#[tokio::test]
async fn test_show_without_episodes_is_error() {
    let mock_server = MockServer::start().await;

    let body = directory_body(
        "empty",
        "Empty Show",
        "root",
        r#"[{"id": "n", "name": "notes.txt", "dir": false, "parent": "empty"}]"#,
    );
    Mock::given(method("GET"))
        .and(path("/api/d/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = CatalogClient::with_base_url(&mock_server.uri(), "https://cdn.test/f");
    let result = client.list_episodes("empty").await;

    assert!(matches!(result, Err(CatalogError::NoEpisodes(name)) if name == "Empty Show"));
}
