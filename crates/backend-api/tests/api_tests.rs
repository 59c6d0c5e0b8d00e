use http_body_util::BodyExt;

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS,
            ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION, CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    response::IntoResponse,
    Router,
};
use huddle_auth::{Authenticator, Company};
use huddle_backend_api::{build_router, ApiError, AppState, ServerFrame, SocketHub};
use huddle_config::{AppConfig, DatabaseConfig};
use huddle_database::initialize_database;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

type TestResult<T = ()> = anyhow::Result<T>;

const BOUNDARY: &str = "huddle-test-boundary";

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    state: AppState,
    hub: SocketHub,
    company: Company,
}

/// A registered user with a live session
struct Session {
    id: i64,
    token: String,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        Self::with_config(|_| {}).await
    }

    async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let mut config = AppConfig::default();
        config.database = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("api.sqlite").display()),
            max_connections: 5,
        };
        config.media.directory = temp_dir.path().join("media").display().to_string();
        adjust(&mut config);

        let pool = initialize_database(&config.database).await?;
        let authenticator = Authenticator::new(pool.clone(), config.auth.clone());
        let company = authenticator.create_company("Acme Support").await?;

        let hub = SocketHub::new();
        let state = AppState::with_hub(pool.clone(), authenticator, &config, hub.clone());

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            state,
            hub,
            company,
        })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn register_in(&self, company_id: i64, name: &str) -> TestResult<Session> {
        let email = format!("{}@example.com", name.to_lowercase());
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                json!({
                    "companyId": company_id,
                    "name": name,
                    "email": email,
                    "password": "correct horse battery",
                }),
            )?)
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "register failed: {body}");

        Ok(Session {
            id: body["user"]["id"].as_i64().unwrap_or_default(),
            token: body["token"].as_str().unwrap_or_default().to_owned(),
        })
    }

    async fn register(&self, name: &str) -> TestResult<Session> {
        self.register_in(self.company.id, name).await
    }

    async fn send(&self, request: Request<Body>) -> TestResult<(StatusCode, Value)> {
        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok((status, body))
    }

    async fn create_chat(&self, owner: &Session, title: &str, users: &[i64]) -> TestResult<Value> {
        let users: Vec<Value> = users.iter().map(|id| json!({ "id": id })).collect();
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/chats",
                Some(&owner.token),
                json!({ "title": title, "users": users }),
            )?)
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "create chat failed: {body}");
        Ok(body)
    }

    async fn post_text(&self, session: &Session, chat_id: i64, text: &str) -> TestResult<(StatusCode, Value)> {
        self.send(json_request(
            Method::POST,
            &format!("/api/chats/{chat_id}/messages"),
            Some(&session.token),
            json!({ "message": text }),
        )?)
        .await
    }

    async fn listen(&self, user_id: i64) -> mpsc::Receiver<ServerFrame> {
        self.hub.join([SocketHub::user_room(user_id)]).await.receiver
    }

    async fn listen_company(&self) -> mpsc::Receiver<ServerFrame> {
        self.hub
            .join([SocketHub::company_room(self.company.id)])
            .await
            .receiver
    }
}

fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> TestResult<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

fn get(uri: &str, token: Option<&str>) -> TestResult<Request<Body>> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::empty())?)
}

fn multipart_request(
    uri: &str,
    token: &str,
    files: &[(&str, &str, &str, &[u8])],
) -> TestResult<Request<Body>> {
    let mut body = Vec::new();
    for (field, file_name, mime, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))?)
}

fn drain(receiver: &mut mpsc::Receiver<ServerFrame>) -> Vec<ServerFrame> {
    let mut frames = Vec::new();
    while let Ok(frame) = receiver.try_recv() {
        frames.push(frame);
    }
    frames
}

fn unreads_of(chat: &Value, user_id: i64) -> Option<i64> {
    chat["users"]
        .as_array()?
        .iter()
        .find(|member| member["userId"].as_i64() == Some(user_id))?["unreads"]
        .as_i64()
}

mod router_tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx.send(get("/health", None)?).await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn serves_openapi_document() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .router()
            .oneshot(get("/docs/openapi.json", None)?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        assert!(
            content_type.contains("application/json"),
            "expected OpenAPI JSON content-type, got {}",
            content_type
        );

        let body = response.into_body().collect().await?.to_bytes();
        let doc: Value = serde_json::from_slice(&body)?;
        assert!(doc["paths"]["/api/chats/{chat_id}/messages"].is_object());
        Ok(())
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() -> TestResult {
        let ctx = TestContext::new().await?;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chats")
            .header(ORIGIN, "https://example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(
                ACCESS_CONTROL_REQUEST_HEADERS,
                "authorization, content-type",
            )
            .body(Body::empty())?;

        let response = ctx.router().oneshot(request).await?;
        assert!(matches!(
            response.status(),
            StatusCode::NO_CONTENT | StatusCode::OK
        ));

        let header = |name: axum::http::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase()
        };
        assert_eq!(header(ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert!(header(ACCESS_CONTROL_ALLOW_METHODS).contains("post"));
        let allow_headers = header(ACCESS_CONTROL_ALLOW_HEADERS);
        assert!(allow_headers.contains("authorization") && allow_headers.contains("content-type"));
        Ok(())
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() -> TestResult {
        let ctx = TestContext::new().await?;

        let (status, body) = ctx.send(get("/api/chats", None)?).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = ctx.send(get("/api/chats", Some("not-a-session"))?).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = ctx.send(get("/ws", None)?).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn register_login_profile_and_logout() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;

        let (status, body) = ctx.send(get("/api/users/me", Some(&alice.token))?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Alice");
        assert_eq!(body["user"]["companyId"], ctx.company.id);

        let (status, login) = ctx
            .send(json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": "alice@example.com", "password": "correct horse battery" }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(login["user"]["id"], alice.id);
        assert!(login["expiresAt"].is_string());

        let logout = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/logout")
            .header(AUTHORIZATION, format!("Bearer {}", alice.token))
            .body(Body::empty())?;
        let (status, _) = ctx.send(logout).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = ctx.send(get("/api/users/me", Some(&alice.token))?).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_bad_credentials_and_unknown_companies() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.register("Alice").await?;

        let (status, _) = ctx
            .send(json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": "alice@example.com", "password": "wrong" }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = ctx
            .send(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                json!({
                    "companyId": 9_999,
                    "name": "Mallory",
                    "email": "mallory@example.com",
                    "password": "correct horse battery",
                }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn user_directory_is_scoped_to_the_company() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        ctx.register("Bob").await?;

        let other = ctx.state.authenticator().create_company("Globex").await?;
        ctx.register_in(other.id, "Eve").await?;

        let (status, body) = ctx.send(get("/api/users", Some(&alice.token))?).await?;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["users"]
            .as_array()
            .map(|users| users.iter().filter_map(|u| u["name"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["Alice", "Bob"]);
        Ok(())
    }
}

mod chat_tests {
    use super::*;

    #[tokio::test]
    async fn create_chat_notifies_each_participant() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let mut alice_frames = ctx.listen(alice.id).await;
        let mut bob_frames = ctx.listen(bob.id).await;

        let chat = ctx.create_chat(&alice, "Release", &[bob.id]).await?;
        assert_eq!(chat["title"], "Release");
        assert_eq!(chat["ownerId"], alice.id);
        assert_eq!(chat["users"].as_array().map(Vec::len), Some(2));

        let frames = drain(&mut bob_frames);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].event,
            format!("company-{}-chat-user-{}", ctx.company.id, bob.id)
        );
        assert_eq!(frames[0].data["action"], "create");
        assert_eq!(frames[0].data["record"]["id"], chat["id"]);

        let frames = drain(&mut alice_frames);
        assert_eq!(
            frames[0].event,
            format!("company-{}-chat-user-{}", ctx.company.id, alice.id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn create_chat_validates_payload() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;

        let (status, _) = ctx
            .send(json_request(
                Method::POST,
                "/api/chats",
                Some(&alice.token),
                json!({ "title": "   ", "users": [{ "id": bob.id }] }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = ctx
            .send(json_request(
                Method::POST,
                "/api/chats",
                Some(&alice.token),
                json!({ "title": "Nobody", "users": [] }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn index_pages_through_chats() -> TestResult {
        let ctx = TestContext::with_config(|config| config.chat.page_size = 2).await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        for title in ["One", "Two", "Three"] {
            ctx.create_chat(&alice, title, &[bob.id]).await?;
        }

        let (status, first) = ctx.send(get("/api/chats", Some(&bob.token))?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["count"], 3);
        assert_eq!(first["hasMore"], true);
        assert_eq!(first["records"].as_array().map(Vec::len), Some(2));

        let (_, second) = ctx
            .send(get("/api/chats?pageNumber=2", Some(&bob.token))?)
            .await?;
        assert_eq!(second["hasMore"], false);
        assert_eq!(second["records"].as_array().map(Vec::len), Some(1));

        let (status, garbage) = ctx
            .send(get("/api/chats?pageNumber=abc", Some(&bob.token))?)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(garbage["records"], first["records"]);
        Ok(())
    }

    #[tokio::test]
    async fn show_requires_participation() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let carol = ctx.register("Carol").await?;
        let chat = ctx.create_chat(&alice, "Private", &[bob.id]).await?;
        let uuid = chat["uuid"].as_str().unwrap_or_default();

        let (status, body) = ctx
            .send(get(&format!("/api/chats/{uuid}"), Some(&bob.token))?)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], chat["id"]);

        let (status, _) = ctx
            .send(get(&format!("/api/chats/{uuid}"), Some(&carol.token))?)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = ctx
            .send(get("/api/chats/no-such-chat", Some(&bob.token))?)
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn only_the_owner_updates_and_participants_are_notified() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let carol = ctx.register("Carol").await?;
        let chat = ctx.create_chat(&alice, "Draft", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();

        let (status, _) = ctx
            .send(json_request(
                Method::PUT,
                &format!("/api/chats/{chat_id}"),
                Some(&bob.token),
                json!({ "title": "Hijacked" }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut carol_frames = ctx.listen(carol.id).await;
        let (status, updated) = ctx
            .send(json_request(
                Method::PUT,
                &format!("/api/chats/{chat_id}"),
                Some(&alice.token),
                json!({ "title": "Launch", "users": [{ "id": bob.id }, { "id": carol.id }] }),
            )?)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Launch");
        assert_eq!(updated["users"].as_array().map(Vec::len), Some(3));

        let frames = drain(&mut carol_frames);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data["action"], "update");
        assert_eq!(frames[0].data["record"]["title"], "Launch");
        Ok(())
    }

    #[tokio::test]
    async fn delete_broadcasts_to_the_company() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let chat = ctx.create_chat(&alice, "Old", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();

        let delete = |token: &str| -> TestResult<Request<Body>> {
            Ok(Request::builder()
                .method(Method::DELETE)
                .uri(format!("/api/chats/{chat_id}"))
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())?)
        };

        let (status, _) = ctx.send(delete(&bob.token)?).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut company_frames = ctx.listen_company().await;
        let (status, body) = ctx.send(delete(&alice.token)?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Chat deleted");

        let frames = drain(&mut company_frames);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, format!("company-{}-chat", ctx.company.id));
        assert_eq!(frames[0].data, json!({ "action": "delete", "id": chat_id }));

        let (status, _) = ctx.send(delete(&alice.token)?).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn mark_as_read_clears_unreads() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let chat = ctx.create_chat(&alice, "Standup", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();

        ctx.post_text(&alice, chat_id, "morning").await?;
        ctx.post_text(&alice, chat_id, "anyone?").await?;

        let mut bob_frames = ctx.listen(bob.id).await;
        let read = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/chats/{chat_id}/read"))
            .header(AUTHORIZATION, format!("Bearer {}", bob.token))
            .body(Body::empty())?;
        let (status, body) = ctx.send(read).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unreads_of(&body, bob.id), Some(0));

        let events: Vec<String> = drain(&mut bob_frames)
            .into_iter()
            .map(|frame| {
                assert_eq!(frame.data["action"], "update");
                frame.event
            })
            .collect();
        assert_eq!(
            events,
            vec![
                format!("company-{}-chat-{chat_id}", ctx.company.id),
                format!("company-{}-chat", ctx.company.id),
            ]
        );
        Ok(())
    }
}

mod message_tests {
    use super::*;

    #[tokio::test]
    async fn text_message_updates_chat_and_notifies_participants() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let chat = ctx.create_chat(&alice, "Standup", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();
        let mut bob_frames = ctx.listen(bob.id).await;

        let (status, message) = ctx.post_text(&alice, chat_id, "hello bob").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message["message"], "hello bob");
        assert_eq!(message["senderId"], alice.id);
        assert_eq!(message["sender"]["name"], "Alice");

        let frames = drain(&mut bob_frames);
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0].event,
            format!("company-{}-chat-{chat_id}", ctx.company.id)
        );
        assert_eq!(frames[1].event, format!("company-{}-chat", ctx.company.id));
        let data = &frames[0].data;
        assert_eq!(data["action"], "new-message");
        assert_eq!(data["newMessage"]["id"], message["id"]);
        assert_eq!(data["chat"]["lastMessage"], "Alice: hello bob");
        assert_eq!(unreads_of(&data["chat"], bob.id), Some(1));
        assert_eq!(unreads_of(&data["chat"], alice.id), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_empty_messages_and_outsiders() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let carol = ctx.register("Carol").await?;
        let chat = ctx.create_chat(&alice, "Standup", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();

        let (status, _) = ctx.post_text(&alice, chat_id, "   ").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = ctx.post_text(&carol, chat_id, "let me in").await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = ctx.post_text(&alice, 9_999, "anyone?").await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = ctx
            .send(get(&format!("/api/chats/{chat_id}/messages"), Some(&carol.token))?)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn history_pages_newest_first_with_oldest_first_within_a_page() -> TestResult {
        let ctx = TestContext::with_config(|config| config.chat.page_size = 2).await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let chat = ctx.create_chat(&alice, "Standup", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();
        for text in ["one", "two", "three"] {
            ctx.post_text(&alice, chat_id, text).await?;
        }

        let texts = |page: &Value| -> Vec<String> {
            page["records"]
                .as_array()
                .map(|records| {
                    records
                        .iter()
                        .filter_map(|record| record["message"].as_str().map(str::to_owned))
                        .collect()
                })
                .unwrap_or_default()
        };

        let uri = format!("/api/chats/{chat_id}/messages");
        let (status, first) = ctx.send(get(&uri, Some(&bob.token))?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(texts(&first), vec!["two", "three"]);
        assert_eq!(first["count"], 3);
        assert_eq!(first["hasMore"], true);

        let (_, second) = ctx
            .send(get(&format!("{uri}?pageNumber=2"), Some(&bob.token))?)
            .await?;
        assert_eq!(texts(&second), vec!["one"]);
        assert_eq!(second["hasMore"], false);
        Ok(())
    }

    #[tokio::test]
    async fn multipart_upload_creates_one_message_per_file() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let chat = ctx.create_chat(&alice, "Assets", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();
        let mut bob_frames = ctx.listen(bob.id).await;

        let request = multipart_request(
            &format!("/api/chats/{chat_id}/messages"),
            &alice.token,
            &[
                ("medias", "logo.png", "image/png", &b"\x89PNG fake"[..]),
                ("medias", "notes.txt", "text/plain", &b"remember the milk"[..]),
            ],
        )?;
        let (status, message) = ctx.send(request).await?;
        assert_eq!(status, StatusCode::OK, "{message}");
        assert_eq!(message["message"], "notes.txt");
        assert_eq!(message["mediaName"], "notes.txt");
        assert_eq!(message["mediaType"], "text");

        let media_path = message["mediaPath"].as_str().unwrap_or_default().to_owned();
        assert!(media_path.starts_with("/public/"), "{media_path}");
        assert!(media_path.ends_with("-notes.txt"), "{media_path}");

        let new_messages = drain(&mut bob_frames)
            .into_iter()
            .filter(|frame| frame.event == format!("company-{}-chat-{chat_id}", ctx.company.id))
            .count();
        assert_eq!(new_messages, 2);

        let response = ctx.router().oneshot(get(&media_path, None)?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await?.to_bytes();
        assert_eq!(&bytes[..], b"remember the milk");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_messages WHERE chat_id = ? AND media_path IS NOT NULL",
        )
        .bind(chat_id)
        .fetch_one(&ctx.pool)
        .await?;
        assert_eq!(count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn multipart_without_media_files_is_rejected() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let chat = ctx.create_chat(&alice, "Assets", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();

        let request = multipart_request(
            &format!("/api/chats/{chat_id}/messages"),
            &alice.token,
            &[("avatar", "me.png", "image/png", &b"png"[..])],
        )?;
        let (status, _) = ctx.send(request).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected() -> TestResult {
        let ctx = TestContext::with_config(|config| config.media.max_upload_bytes = 1_024).await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let chat = ctx.create_chat(&alice, "Assets", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();

        let large = vec![b'x'; 4_096];
        let request = multipart_request(
            &format!("/api/chats/{chat_id}/messages"),
            &alice.token,
            &[("medias", "big.bin", "application/octet-stream", large.as_slice())],
        )?;
        let (status, _) = ctx.send(request).await?;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&ctx.pool)
            .await?;
        assert_eq!(count, 0);
        Ok(())
    }
}

mod error_handling_tests {
    use super::*;

    #[tokio::test]
    async fn api_error_into_response_sets_status_and_body() -> TestResult {
        let response = ApiError::bad_request("missing payload").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await?.to_bytes();
        let payload: Value = serde_json::from_slice(&body)?;
        assert_eq!(payload["error"], "missing payload");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.register("Alice").await?;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/chats/1/messages")
            .header(AUTHORIZATION, format!("Bearer {}", alice.token))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))?;
        let (status, body) = ctx.send(request).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        Ok(())
    }
}

mod websocket_tests {
    use super::*;
    use std::{net::SocketAddr, time::Duration};

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(ctx: &TestContext) -> TestResult<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = ctx.router();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(addr)
    }

    /// Connects and consumes the hello frame, so the server has joined its rooms.
    async fn connect(addr: SocketAddr, session: &Session) -> TestResult<(Client, Value)> {
        let (mut client, _) = connect_async(format!("ws://{addr}/ws?token={}", session.token)).await?;
        let hello = next_frame(&mut client).await?;
        Ok((client, hello))
    }

    async fn next_frame(client: &mut Client) -> TestResult<Value> {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("socket closed"))??;
            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => anyhow::bail!("socket closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    async fn assert_quiet(client: &mut Client) -> TestResult {
        let pending = tokio::time::timeout(Duration::from_millis(250), client.next()).await;
        anyhow::ensure!(pending.is_err(), "unexpected frame: {pending:?}");
        Ok(())
    }

    async fn send_text(client: &mut Client, text: impl Into<String>) -> TestResult {
        client.send(Message::Text(text.into())).await?;
        Ok(())
    }

    #[tokio::test]
    async fn session_greets_answers_pings_and_rejects_garbage() -> TestResult {
        let ctx = TestContext::new().await?;
        let addr = serve(&ctx).await?;
        let alice = ctx.register("Alice").await?;

        let (mut client, hello) = connect(addr, &alice).await?;
        assert_eq!(hello["event"], "hello");
        assert_eq!(hello["data"]["userId"], alice.id);
        assert_eq!(hello["data"]["companyId"], ctx.company.id);

        send_text(&mut client, json!({ "type": "ping" }).to_string()).await?;
        assert_eq!(next_frame(&mut client).await?["event"], "pong");

        send_text(&mut client, "{not json").await?;
        let error = next_frame(&mut client).await?;
        assert_eq!(error["event"], "error");
        assert_eq!(error["data"]["message"], "Invalid event format");

        send_text(&mut client, json!({ "type": "shout" }).to_string()).await?;
        assert_eq!(next_frame(&mut client).await?["event"], "error");

        // The session survives bad input.
        send_text(&mut client, json!({ "type": "ping" }).to_string()).await?;
        assert_eq!(next_frame(&mut client).await?["event"], "pong");
        Ok(())
    }

    #[tokio::test]
    async fn typing_reaches_other_members_only() -> TestResult {
        let ctx = TestContext::new().await?;
        let addr = serve(&ctx).await?;
        let alice = ctx.register("Alice").await?;
        let bob = ctx.register("Bob").await?;
        let carol = ctx.register("Carol").await?;
        let chat = ctx.create_chat(&alice, "Launch", &[bob.id]).await?;
        let chat_id = chat["id"].as_i64().unwrap_or_default();

        let (mut alice_ws, _) = connect(addr, &alice).await?;
        let (mut bob_ws, _) = connect(addr, &bob).await?;
        let (mut carol_ws, _) = connect(addr, &carol).await?;

        let typing = json!({ "type": "typing", "chatId": chat_id, "isTyping": true });
        send_text(&mut alice_ws, typing.to_string()).await?;

        let frame = next_frame(&mut bob_ws).await?;
        assert_eq!(
            frame["event"],
            format!("company-{}-chat-{chat_id}", ctx.company.id)
        );
        assert_eq!(frame["data"]["action"], "typing");
        assert_eq!(frame["data"]["userId"], alice.id);
        assert_eq!(frame["data"]["name"], "Alice");
        assert_eq!(frame["data"]["isTyping"], true);

        assert_quiet(&mut alice_ws).await?;
        assert_quiet(&mut carol_ws).await?;

        send_text(&mut carol_ws, typing.to_string()).await?;
        let rejected = next_frame(&mut carol_ws).await?;
        assert_eq!(rejected["event"], "error");
        assert!(rejected["data"]["message"].is_string());

        assert_quiet(&mut alice_ws).await?;
        assert_quiet(&mut bob_ws).await?;
        Ok(())
    }

    #[tokio::test]
    async fn closing_the_client_releases_its_connection() -> TestResult {
        let ctx = TestContext::new().await?;
        let addr = serve(&ctx).await?;
        let alice = ctx.register("Alice").await?;

        let (mut client, _) = connect(addr, &alice).await?;
        assert_eq!(ctx.hub.connection_count().await, 1);

        client.close(None).await?;
        for _ in 0..50 {
            if ctx.hub.connection_count().await == 0 {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("connection still registered after close")
    }
}
