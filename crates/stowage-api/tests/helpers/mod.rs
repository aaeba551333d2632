#![allow(dead_code)]

use axum_test::TestServer;
use stowage_api::setup::routes::setup_routes;
use stowage_api::setup::store::DEFAULT_USER_ID;
use stowage_api::setup::build_state;
use stowage_api::AppState;
use stowage_core::models::FileRecord;
use stowage_core::Config;
use tempfile::TempDir;

pub const SITE_URL: &str = "https://drive.example.com";
pub const USER_HEADER: &str = "x-stowage-user";

/// Test application state
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub _temp_dir: TempDir,
}

impl TestApp {
    /// Get the HTTP test client
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Record named `name` in the default user's root folder.
    pub async fn root_file(&self, name: &str) -> FileRecord {
        let store = self.state.explorer.store();
        let root = store
            .get_folder_by_path(DEFAULT_USER_ID, "/")
            .await
            .expect("Failed to load root folder")
            .expect("Root folder missing");
        store
            .get_child_file(root.id, name)
            .await
            .expect("Failed to load file")
            .expect("File missing")
    }
}

/// Setup a test application over a temporary storage directory
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = Config {
        site_url: SITE_URL.to_string(),
        local_storage_path: temp_dir.path().join("uploads").to_string_lossy().into_owned(),
        archive_temp_path: temp_dir.path().join("archives").to_string_lossy().into_owned(),
        ..Config::default()
    };

    let state = build_state(config).await.expect("Failed to build state");
    let router = setup_routes(&state.config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Path and query of an absolute URL issued for this site.
pub fn site_path(url: &str) -> String {
    url.strip_prefix(SITE_URL)
        .expect("URL issued for another site")
        .to_string()
}

/// Create `/{name}` for the default user and upload `content` into it.
pub async fn upload_file(app: &TestApp, name: &str, content: &[u8]) -> FileRecord {
    let response = app
        .client()
        .post("/api/v3/file/create")
        .add_header(USER_HEADER, DEFAULT_USER_ID.to_string())
        .json(&serde_json::json!({ "path": format!("/{}", name) }))
        .await;
    assert_eq!(response.json::<serde_json::Value>()["code"], 0);

    let file = app.root_file(name).await;
    let response = app
        .client()
        .put(&format!("/api/v3/file/update/{}", file.id))
        .add_header(USER_HEADER, DEFAULT_USER_ID.to_string())
        .add_header("content-length", content.len().to_string())
        .bytes(content.to_vec().into())
        .await;
    assert_eq!(response.json::<serde_json::Value>()["code"], 0);

    app.root_file(name).await
}
