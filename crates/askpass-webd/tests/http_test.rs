//! HTTP integration tests.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; prompt
//! sockets are real unix datagram sockets in a temporary directory.

use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::time::Duration;

use askpass_web_core::{clock::monotonic_now, AnswerRelay};
use askpass_webd::server;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn app(&self) -> Router {
        server::router(AnswerRelay::new(self.path()))
    }

    /// Bind a receiving socket for prompt `id`.
    fn bind_socket(&self, id: &str) -> UnixDatagram {
        let sock = UnixDatagram::bind(self.path().join(format!("sck.{id}"))).unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        sock
    }

    fn write_prompt(&self, id: &str, message: &str, not_after: Option<Duration>) {
        let mut contents = format!(
            "[Ask]\nPID=1\nMessage={message}\nSocket={}\n",
            self.path().join(format!("sck.{id}")).display()
        );
        if let Some(not_after) = not_after {
            contents.push_str(&format!("NotAfter={}\n", not_after.as_micros()));
        }
        std::fs::write(self.path().join(format!("ask.{id}")), contents).unwrap();
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn post_form(app: Router, body: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .uri("/pass")
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

fn recv(sock: &UnixDatagram) -> Vec<u8> {
    let mut buf = [0u8; 256];
    let n = sock.recv(&mut buf).unwrap();
    buf[..n].to_vec()
}

#[tokio::test]
async fn index_lists_pending_prompt() {
    let fx = Fixture::new();
    fx.write_prompt("abc123", "Enter passphrase", None);

    let (status, body) = get(fx.app(), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Enter passphrase"));
    assert!(body.contains(r#"value="ask.abc123""#));
}

#[tokio::test]
async fn index_without_prompts_shows_hint() {
    let fx = Fixture::new();

    let (status, body) = get(fx.app(), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No password prompts found"));
}

#[tokio::test]
async fn index_survives_missing_directory() {
    let fx = Fixture::new();
    let app = server::router(AnswerRelay::new(fx.path().join("missing")));

    let (status, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No password prompts found"));
}

#[tokio::test]
async fn index_reflects_new_prompts_without_restart() {
    let fx = Fixture::new();
    let app = fx.app();

    let (_, before) = get(app.clone(), "/").await;
    fx.write_prompt("late", "Late prompt", None);
    let (_, after) = get(app, "/").await;

    assert!(!before.contains("Late prompt"));
    assert!(after.contains("Late prompt"));
}

#[tokio::test]
async fn answer_is_relayed_and_redirects() {
    let fx = Fixture::new();
    let sock = fx.bind_socket("abc123");
    fx.write_prompt("abc123", "Enter passphrase", None);

    let response = post_form(fx.app(), "ask=ask.abc123&answer=hunter2").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert_eq!(recv(&sock), b"+hunter2");
}

#[tokio::test]
async fn answer_is_url_decoded() {
    let fx = Fixture::new();
    let sock = fx.bind_socket("enc");
    fx.write_prompt("enc", "Enter passphrase", None);

    let response = post_form(fx.app(), "ask=ask.enc&answer=p%40ss+w%C3%B6rd%26").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(recv(&sock), "+p@ss wörd&".as_bytes());
}

#[tokio::test]
async fn cancel_sends_minus() {
    let fx = Fixture::new();
    let sock = fx.bind_socket("abc123");
    fx.write_prompt("abc123", "Enter passphrase", None);

    let response = post_form(fx.app(), "ask=ask.abc123&answer=&cancel=true").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(recv(&sock), b"-");
}

#[tokio::test]
async fn expired_prompt_is_hidden_and_not_found() {
    let fx = Fixture::new();
    let _sock = fx.bind_socket("abc123");
    let one_hour = Duration::from_secs(3600);
    let past = monotonic_now()
        .saturating_sub(one_hour)
        .max(Duration::from_micros(1));
    fx.write_prompt("abc123", "Enter passphrase", Some(past));

    let (_, body) = get(fx.app(), "/").await;
    assert!(!body.contains("Enter passphrase"));
    assert!(body.contains("No password prompts found"));

    let response = post_form(fx.app(), "ask=ask.abc123&answer=hunter2").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn future_expiry_is_still_answerable() {
    let fx = Fixture::new();
    let sock = fx.bind_socket("soon");
    fx.write_prompt(
        "soon",
        "Enter passphrase",
        Some(monotonic_now() + Duration::from_secs(3600)),
    );

    let response = post_form(fx.app(), "ask=ask.soon&answer=x").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(recv(&sock), b"+x");
}

#[tokio::test]
async fn unknown_prompt_is_not_found() {
    let fx = Fixture::new();

    let response = post_form(fx.app(), "ask=ask.nope&answer=x").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn path_traversal_names_are_not_found() {
    let fx = Fixture::new();
    let inner = fx.path().join("ask-password");
    std::fs::create_dir(&inner).unwrap();
    // A well formed prompt one level above the served directory.
    fx.write_prompt("outside", "Outside", None);
    let app = server::router(AnswerRelay::new(&inner));

    for name in ["..%2Fask.outside", "..%2F..%2Fetc%2Fpasswd", "%2Fetc%2Fpasswd"] {
        let response = post_form(app.clone(), &format!("ask={name}&answer=x")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{name}");
    }
}

#[tokio::test]
async fn missing_ask_field_is_bad_request() {
    let fx = Fixture::new();

    let response = post_form(fx.app(), "answer=x").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_content_type_is_bad_request() {
    let fx = Fixture::new();

    let response = fx
        .app()
        .oneshot(
            Request::builder()
                .uri("/pass")
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"ask":"ask.x","answer":"y"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delivery_failure_is_internal_error() {
    let fx = Fixture::new();
    // Prompt file present, but nobody listens on its socket.
    fx.write_prompt("gone", "Enter passphrase", None);

    let response = post_form(fx.app(), "ask=ask.gone&answer=x").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&body).contains("failed to connect"));
}

#[tokio::test]
async fn robots_txt_disallows_everything() {
    let fx = Fixture::new();

    let (status, body) = get(fx.app(), "/robots.txt").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "User-Agent: *\nDisallow: /\n");
}
