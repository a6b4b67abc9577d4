//! Blocking HTTP client for the Conclave debate API.

use crate::allocation::AllocationEntry;
use crate::config::Config;
use crate::error::{ConclaveError, Result};
use crate::retry::{with_backoff, RetryPolicy};
use crate::selector::JoinResponse;
use crate::template::truncate;
use crate::types::{Debate, Status};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use std::time::Duration;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
/// Longest error body kept in errors and notifications.
pub const SNIPPET_LEN: usize = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AllocateRequest<'a> {
    pub debate_id: &'a str,
    pub allocations: &'a [AllocationEntry],
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRequest<'a> {
    pub debate_id: &'a str,
    pub idea_id: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefineRequest<'a> {
    pub debate_id: &'a str,
    pub ticker: &'a str,
    pub body: &'a str,
}

// ---------------------------------------------------------------------------
// DebateApi
// ---------------------------------------------------------------------------

/// The remote operations a tick needs. [`ConclaveClient`] is the HTTP
/// implementation; tests substitute their own.
pub trait DebateApi {
    fn status(&self) -> Result<Status>;
    fn list_debates(&self) -> Result<Vec<Debate>>;
    fn join(&self, debate_id: &str) -> Result<JoinResponse>;
    fn allocate(&self, req: &AllocateRequest<'_>) -> Result<()>;
    fn comment(&self, req: &CommentRequest<'_>) -> Result<()>;
    fn refine(&self, req: &RefineRequest<'_>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ConclaveClient
// ---------------------------------------------------------------------------

pub struct ConclaveClient {
    client: reqwest::blocking::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ConclaveClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.api_url, &config.token, config.retry)
    }

    pub fn with_base_url(base_url: &str, token: &str, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ConclaveError::InvalidConfig {
                key: crate::config::ENV_TOKEN.into(),
                reason: "token contains characters not allowed in a header".into(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path`, returning the status and body of a 2xx reply.
    fn get_text(&self, path: &str) -> Result<(u16, String)> {
        with_backoff(&self.retry, path, || {
            let response = self.client.get(self.url(path)).send()?;
            let status = response.status().as_u16();
            let body = read_success(path, response)?;
            Ok((status, body))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (status, body) = self.get_text(path)?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(path, error = %e, "response body did not decode");
            unexpected_body(path, status, &body)
        })
    }

    /// POST `body`, returning the raw response on any status so callers can
    /// distinguish soft rejections from hard errors.
    fn post_raw<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, String)> {
        let payload = serde_json::to_vec(body)?;
        let key = idempotency_key(path, &payload);
        with_backoff(&self.retry, path, || {
            let response = self
                .client
                .post(self.url(path))
                .header(IDEMPOTENCY_KEY_HEADER, key.as_str())
                .body(payload.clone())
                .send()?;
            let status = response.status().as_u16();
            let text = response.text()?;
            if status >= 500 {
                return Err(api_error(path, status, &text));
            }
            Ok((status, text))
        })
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let (status, text) = self.post_raw(path, body)?;
        if (200..300).contains(&status) {
            tracing::debug!(path, status, "request accepted");
            Ok(())
        } else {
            Err(api_error(path, status, &text))
        }
    }
}

impl DebateApi for ConclaveClient {
    fn status(&self) -> Result<Status> {
        self.get_json("/status")
    }

    fn list_debates(&self) -> Result<Vec<Debate>> {
        let (status, body) = self.get_text("/list")?;
        decode_listing("/list", status, &body)
    }

    fn join(&self, debate_id: &str) -> Result<JoinResponse> {
        let path = format!("/join/{debate_id}");
        let (status, text) = self.post_raw(&path, &serde_json::json!({}))?;
        if (200..300).contains(&status) {
            return Ok(JoinResponse::Joined);
        }
        if is_soft_rejection(status, &text) {
            return Ok(JoinResponse::SoftRejected(truncate(&text, SNIPPET_LEN)));
        }
        Err(api_error(&path, status, &text))
    }

    fn allocate(&self, req: &AllocateRequest<'_>) -> Result<()> {
        self.post_json("/allocate", req)
    }

    fn comment(&self, req: &CommentRequest<'_>) -> Result<()> {
        self.post_json("/comment", req)
    }

    fn refine(&self, req: &RefineRequest<'_>) -> Result<()> {
        self.post_json("/refine", req)
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Keys a wrapped `GET /list` reply has been seen to use, in the order
/// they are tried.
const LISTING_KEYS: &[&str] = &["debates", "items", "data"];

/// Debates from a `GET /list` body, either a bare array or an object
/// wrapping one. Entries that do not decode as a debate are skipped.
fn listing_entries(value: Value) -> Option<Vec<Debate>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => LISTING_KEYS.iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        })?,
        _ => return None,
    };
    let debates = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Debate>(item) {
            Ok(debate) => Some(debate),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable debate entry");
                None
            }
        })
        .collect();
    Some(debates)
}

fn decode_listing(path: &str, status: u16, body: &str) -> Result<Vec<Debate>> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(listing_entries)
        .ok_or_else(|| unexpected_body(path, status, body))
}

/// Parse a `GET /list` body in either of its shapes.
pub fn parse_debate_listing(json: &str) -> Result<Vec<Debate>> {
    decode_listing("/list", 200, json)
}

fn read_success(path: &str, response: reqwest::blocking::Response) -> Result<String> {
    let status = response.status().as_u16();
    let text = response.text()?;
    if (200..300).contains(&status) {
        Ok(text)
    } else {
        Err(api_error(path, status, &text))
    }
}

fn api_error(path: &str, status: u16, body: &str) -> ConclaveError {
    ConclaveError::Api {
        endpoint: path.to_string(),
        status,
        body: truncate(body.trim(), SNIPPET_LEN),
    }
}

fn unexpected_body(path: &str, status: u16, body: &str) -> ConclaveError {
    ConclaveError::UnexpectedBody {
        endpoint: path.to_string(),
        status,
        body: truncate(body.trim(), SNIPPET_LEN),
    }
}

fn soft_rejection_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(full|capacity|not accepting|no (?:open )?slots|closed)\b")
            .expect("static regex")
    })
}

/// A refusal we expect in normal operation: the debate is full or no longer
/// takes entrants.
pub fn is_soft_rejection(status: u16, body: &str) -> bool {
    matches!(status, 400 | 403 | 409 | 422 | 423) && soft_rejection_pattern().is_match(body)
}

fn idempotency_key(path: &str, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(payload);
    hasher
        .finalize()
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> ConclaveClient {
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        ConclaveClient::with_base_url(&server.url(), "tok", retry).unwrap()
    }

    #[test]
    fn status_sends_bearer_token() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/status")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"phase": "debate", "debate_id": 3, "has_commented": true}"#)
            .create();

        let status = client(&server).status().unwrap();
        m.assert();
        assert_eq!(status.debate_id.as_deref(), Some("3"));
        assert!(status.has_commented);
    }

    #[test]
    fn list_accepts_bare_and_wrapped() {
        let mut server = mockito::Server::new();
        let _bare = server
            .mock("GET", "/list")
            .with_status(200)
            .with_body(r#"[{"id": 1, "phase": "propose"}]"#)
            .create();
        assert_eq!(client(&server).list_debates().unwrap().len(), 1);

        let mut server = mockito::Server::new();
        let _wrapped = server
            .mock("GET", "/list")
            .with_status(200)
            .with_body(r#"{"items": [{"id": 1}, {"id": 2}]}"#)
            .create();
        assert_eq!(client(&server).list_debates().unwrap().len(), 2);
    }

    #[test]
    fn join_success_and_soft_rejection() {
        let mut server = mockito::Server::new();
        let _ok = server.mock("POST", "/join/7").with_status(200).create();
        let _full = server
            .mock("POST", "/join/8")
            .with_status(409)
            .with_body(r#"{"error": "Debate is full"}"#)
            .create();

        let c = client(&server);
        assert_eq!(c.join("7").unwrap(), JoinResponse::Joined);
        assert!(matches!(c.join("8").unwrap(), JoinResponse::SoftRejected(_)));
    }

    #[test]
    fn join_unexpected_error_is_hard() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/join/9")
            .with_status(401)
            .with_body("bad token")
            .create();
        let err = client(&server).join("9").unwrap_err();
        assert!(matches!(err, ConclaveError::Api { status: 401, .. }));
    }

    #[test]
    fn server_errors_are_retried() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/status")
            .with_status(503)
            .expect(2)
            .create();
        let err = client(&server).status().unwrap_err();
        m.assert();
        assert!(err.is_transient());
    }

    #[test]
    fn allocate_posts_entries_with_idempotency_key() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/allocate")
            .match_header(IDEMPOTENCY_KEY_HEADER, Matcher::Regex("^[0-9a-f]{32}$".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "debate_id": "d1",
                "allocations": [{"idea_id": "A", "percent": 50}, {"idea_id": "B", "percent": 50}]
            })))
            .with_status(201)
            .create();

        let entries = vec![
            AllocationEntry {
                idea_id: "A".into(),
                percent: 50,
            },
            AllocationEntry {
                idea_id: "B".into(),
                percent: 50,
            },
        ];
        client(&server)
            .allocate(&AllocateRequest {
                debate_id: "d1",
                allocations: &entries,
            })
            .unwrap();
        m.assert();
    }

    #[test]
    fn error_body_is_truncated() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/comment")
            .with_status(400)
            .with_body("x".repeat(1000))
            .create();
        let err = client(&server)
            .comment(&CommentRequest {
                debate_id: "d",
                idea_id: "i",
                body: "b",
            })
            .unwrap_err();
        match err {
            ConclaveError::Api { body, .. } => assert_eq!(body.chars().count(), SNIPPET_LEN),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_listing_shapes() {
        assert_eq!(parse_debate_listing(r#"[{"id": 1}]"#).unwrap().len(), 1);
        assert_eq!(
            parse_debate_listing(r#"{"data": [{"id": 1}, {"id": "x"}]}"#)
                .unwrap()
                .len(),
            2
        );
        assert!(parse_debate_listing(r#"{"nope": 1}"#).is_err());
    }

    #[test]
    fn listing_skips_entries_that_are_not_debates() {
        let debates = parse_debate_listing(r#"{"debates": [{"id": 1}, 5, "x", {"id": 2}]}"#).unwrap();
        let ids: Vec<_> = debates.iter().filter_map(|d| d.id.as_deref()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn non_json_status_is_an_unexpected_body() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .expect(1)
            .create();
        let err = client(&server).status().unwrap_err();
        m.assert();
        assert!(!err.is_transient());
        match err {
            ConclaveError::UnexpectedBody {
                endpoint,
                status,
                body,
            } => {
                assert_eq!(endpoint, "/status");
                assert_eq!(status, 200);
                assert_eq!(body, "<html>maintenance</html>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn list_error_object_is_an_unexpected_body() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/list")
            .with_status(200)
            .with_body(r#"{"error": "rate limited"}"#)
            .create();
        let err = client(&server).list_debates().unwrap_err();
        assert!(matches!(err, ConclaveError::UnexpectedBody { ref endpoint, .. } if endpoint == "/list"));
    }

    #[test]
    fn soft_rejection_needs_status_and_wording() {
        assert!(is_soft_rejection(409, "debate is FULL"));
        assert!(is_soft_rejection(403, "not accepting new agents"));
        assert!(is_soft_rejection(400, "no slots left"));
        assert!(!is_soft_rejection(500, "full"));
        assert!(!is_soft_rejection(409, "already joined"));
        assert!(!is_soft_rejection(401, "capacity"));
    }
}
