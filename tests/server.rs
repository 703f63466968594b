//! End-to-end tests of the web view: login, workspace entry and the
//! workspace JSON API, with the remote service faked.

mod common;

use std::sync::Arc;

use common::{FakeBackend, PROJECT_ID, USER_ID};
use ismart::{router, ApiClient, AppState, Config, HeuristicStrategy, KeywordError};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use serde_json::{json, Value};

struct Server {
    url: String,
    client: reqwest::Client,
}

async fn start(backend: &FakeBackend) -> Server {
    let config = Config::with_api_base(&backend.base_url).unwrap();
    let state = AppState::from_parts(
        config,
        backend.api(),
        Arc::new(HeuristicStrategy),
        b"test-secret-test-secret-test-sec".to_vec(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::new(state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        url: format!("http://{}", addr),
        client: reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .unwrap(),
    }
}

impl Server {
    /// Log in and return the `name=value` session cookie.
    async fn login(&self) -> String {
        let response = self
            .client
            .post(format!("{}/login", self.url))
            .form(&[("email", "ana@example.org"), ("password", "secret")])
            .send()
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[LOCATION], "/");
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn open_workspace(&self, cookie: &str) -> String {
        let response = self
            .client
            .get(format!("{}/workspace", self.url))
            .header(COOKIE, cookie)
            .query(&[
                ("project_id", PROJECT_ID.to_string()),
                ("project_name", "Arsenic in rice".to_string()),
                ("raw_query", "arsenic uptake in rice roots".to_string()),
            ])
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        response.text().await.unwrap()
    }

    async fn post_json(&self, cookie: Option<&str>, path: &str, body: Value) -> Value {
        let mut request = self
            .client
            .post(format!("{}/api/workspace/{}", self.url, path))
            .json(&body);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        request.send().await.unwrap().json().await.unwrap()
    }
}

#[tokio::test]
async fn test_api_client_login() {
    let backend = FakeBackend::start().await;
    let api = backend.api();

    let user = api.login("ana@example.org", "secret").await.unwrap();
    assert_eq!(user.user_id, USER_ID);
    assert_eq!(user.email.as_deref(), Some("ana@example.org"));

    let err = api.login("ana@example.org", "wrong").await.unwrap_err();
    assert_eq!(err, KeywordError::Auth("Invalid credentials".to_string()));
}

#[tokio::test]
async fn test_pages_require_login() {
    let backend = FakeBackend::start().await;
    let server = start(&backend).await;

    let response = server.client.get(&server.url).send().await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[LOCATION], "/login");
}

#[tokio::test]
async fn test_bad_login_shows_message() {
    let backend = FakeBackend::start().await;
    let server = start(&backend).await;

    let html = server
        .client
        .post(format!("{}/login", server.url))
        .form(&[("email", "ana@example.org"), ("password", "nope")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(html.contains("Invalid credentials"));
    assert!(html.contains("ana@example.org"));
}

#[tokio::test]
async fn test_workspace_flow() {
    let backend = FakeBackend::start().await;
    backend.with(|s| {
        s.keywords.insert(PROJECT_ID, vec!["stored".to_string()]);
    });
    let server = start(&backend).await;
    let cookie = server.login().await;

    let html = server.open_workspace(&cookie).await;
    assert!(html.contains("Arsenic in rice"));
    assert!(html.contains(&format!("const PROJECT_ID = {};", PROJECT_ID)));

    let snapshot = server
        .client
        .get(format!("{}/api/workspace/{}", server.url, PROJECT_ID))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(snapshot["snapshot"]["keywords"], json!(["stored"]));
    assert_eq!(snapshot["snapshot"]["stats"]["total_papers"], json!(12));

    let generated = server
        .post_json(
            Some(&cookie),
            &format!("{}/generate", PROJECT_ID),
            json!({ "prompt": "arsenic uptake in rice roots", "mode": "local" }),
        )
        .await;
    assert_eq!(generated["error"], Value::Null);
    assert_eq!(
        generated["snapshot"]["keywords"],
        json!(["arsenic", "uptake", "roots"])
    );
    assert_eq!(generated["snapshot"]["phase"], json!("editable"));

    let added = server
        .post_json(
            Some(&cookie),
            &format!("{}/keywords", PROJECT_ID),
            json!({ "word": "paddy soil" }),
        )
        .await;
    assert_eq!(added["snapshot"]["keywords"][3], json!("paddy soil"));

    let removed: Value = server
        .client
        .delete(format!("{}/api/workspace/{}/keywords/0", server.url, PROJECT_ID))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        removed["snapshot"]["keywords"],
        json!(["uptake", "roots", "paddy soil"])
    );

    let saved = server
        .post_json(
            Some(&cookie),
            &format!("{}/save", PROJECT_ID),
            json!({ "prompt": "arsenic uptake in rice roots" }),
        )
        .await;
    assert_eq!(saved["error"], Value::Null);
    assert_eq!(saved["snapshot"]["editable"], json!(false));
    assert_eq!(
        backend.with(|s| s.keywords[&PROJECT_ID].clone()),
        vec!["uptake", "roots", "paddy soil"]
    );
}

#[tokio::test]
async fn test_controller_errors_are_reported_as_json() {
    let backend = FakeBackend::start().await;
    let server = start(&backend).await;
    let cookie = server.login().await;
    server.open_workspace(&cookie).await;

    let blank = server
        .post_json(
            Some(&cookie),
            &format!("{}/generate", PROJECT_ID),
            json!({ "prompt": "  ", "mode": "remote" }),
        )
        .await;
    assert_eq!(
        blank["error"],
        json!("⚠️ Enter a valid research prompt first.")
    );
    assert_eq!(blank["snapshot"]["phase"], json!("idle"));
}

#[tokio::test]
async fn test_upload_route_rejects_local_mode() {
    let backend = FakeBackend::start().await;
    let server = start(&backend).await;
    let cookie = server.login().await;
    server.open_workspace(&cookie).await;
    let before = backend.request_count();

    let form = reqwest::multipart::Form::new()
        .text("mode", "local")
        .text("prompt", "arsenic")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"%PDF-1.7".to_vec())
                .file_name("paper.pdf")
                .mime_str("application/pdf")
                .unwrap(),
        );
    let response: Value = server
        .client
        .post(format!("{}/api/workspace/{}/upload", server.url, PROJECT_ID))
        .header(COOKIE, &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(response["error"]
        .as_str()
        .unwrap()
        .contains("only available in Gemini Mode"));
    assert_eq!(backend.request_count(), before);
}

#[tokio::test]
async fn test_workspace_api_requires_session_and_open_workspace() {
    let backend = FakeBackend::start().await;
    let server = start(&backend).await;

    let anonymous = server
        .post_json(None, &format!("{}/refresh", PROJECT_ID), json!({}))
        .await;
    assert_eq!(anonymous["error"], json!("Not logged in"));
    assert_eq!(anonymous["snapshot"], Value::Null);

    let cookie = server.login().await;
    let unopened = server
        .post_json(Some(&cookie), &format!("{}/refresh", PROJECT_ID), json!({}))
        .await;
    assert_eq!(unopened["error"], json!("Workspace is not open"));

    server.open_workspace(&cookie).await;
    let response = server
        .client
        .get(format!("{}/logout", server.url))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()[LOCATION], "/login");

    let closed = server
        .post_json(Some(&cookie), &format!("{}/refresh", PROJECT_ID), json!({}))
        .await;
    assert_eq!(closed["error"], json!("Workspace is not open"));
}
