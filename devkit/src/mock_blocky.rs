/*!
Mock Blocky server for tests without a real instance

Serves the Blocky HTTP API on an ephemeral local port, records every request
it receives, and answers with configurable replies (status code, body, delay).
*/

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use anyhow::Result;

pub const STATUS_PATH: &str = "/api/blocking/status";
pub const ENABLE_PATH: &str = "/api/blocking/enable";
pub const DISABLE_PATH: &str = "/api/blocking/disable";
pub const LISTS_REFRESH_PATH: &str = "/api/lists/refresh";
pub const CACHE_FLUSH_PATH: &str = "/api/cache/flush";
pub const QUERY_PATH: &str = "/api/query";
pub const METRICS_PATH: &str = "/metrics";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

/// What the mock answers on one route.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub enum ReplyBody {
    Empty,
    Json(Value),
    Text(String),
}

impl Reply {
    pub fn ok() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            body: ReplyBody::Empty,
            delay: Duration::ZERO,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ReplyBody::Json(body),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Text(body.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct Route {
    method: Method,
    reply: Reply,
}

struct MockState {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Handle on a running mock server. Clones share the same server and records.
#[derive(Clone)]
pub struct MockBlocky {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockBlocky {
    /// Bind on `127.0.0.1:0` and serve the default Blocky routes in the background.
    pub async fn start() -> Result<Self> {
        let state = Arc::new(MockState {
            routes: Mutex::new(default_routes()),
            requests: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[MOCK] server stopped: {}", e);
            }
        });

        log::info!("[MOCK] Blocky listening on {}", addr);
        Ok(Self { addr, state })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Replace the reply of a route, keeping its HTTP method.
    pub fn set_reply(&self, path: &str, reply: Reply) {
        let mut routes = self.state.routes.lock().unwrap();
        match routes.get_mut(path) {
            Some(route) => route.reply = reply,
            None => {
                routes.insert(path.to_string(), Route { method: Method::GET, reply });
            }
        }
    }

    pub fn set_status(&self, status: u16, body: Value) {
        self.set_reply(STATUS_PATH, Reply::json(status, body));
    }

    pub fn set_metrics(&self, status: u16, exposition: impl Into<String>) {
        self.set_reply(METRICS_PATH, Reply::text(status, exposition));
    }

    /// All requests received so far, in arrival order.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn find_requests_by_path(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.find_requests_by_path(path).len()
    }

    pub fn last_request(&self, path: &str) -> Option<RecordedRequest> {
        self.find_requests_by_path(path).pop()
    }

    /// Forget recorded requests; replies stay as configured.
    pub fn clear(&self) {
        self.state.requests.lock().unwrap().clear();
    }
}

fn default_routes() -> HashMap<String, Route> {
    let mut routes = HashMap::new();
    let mut add = |method: Method, path: &str, reply: Reply| {
        routes.insert(path.to_string(), Route { method, reply });
    };

    add(
        Method::GET,
        STATUS_PATH,
        Reply::json(200, crate::fixtures::StatusPayload::enabled().build()),
    );
    add(Method::GET, ENABLE_PATH, Reply::ok());
    add(Method::GET, DISABLE_PATH, Reply::ok());
    add(Method::POST, LISTS_REFRESH_PATH, Reply::ok());
    add(Method::POST, CACHE_FLUSH_PATH, Reply::ok());
    add(
        Method::POST,
        QUERY_PATH,
        Reply::json(
            200,
            serde_json::json!({
                "reason": "RESOLVED",
                "response": "A (93.184.216.34)",
                "responseType": "RESOLVED",
                "returnCode": "NOERROR"
            }),
        ),
    );
    add(
        Method::GET,
        METRICS_PATH,
        Reply::text(200, crate::fixtures::ExpositionBuilder::typical().build()),
    );
    routes
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };

    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query,
        body,
    });
    log::info!("[MOCK] {} {}", method, path);

    let reply = {
        let routes = state.routes.lock().unwrap();
        match routes.get(&path) {
            Some(route) if route.method == method => route.reply.clone(),
            Some(_) => Reply::with_status(405),
            None => Reply::with_status(404),
        }
    };

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match reply.body {
        ReplyBody::Empty => status.into_response(),
        ReplyBody::Json(value) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            value.to_string(),
        )
            .into_response(),
        ReplyBody::Text(text) => (
            status,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_requests() {
        let mock = MockBlocky::start().await.unwrap();
        let base = format!("http://{}:{}", mock.host(), mock.port());

        let status: Value = reqwest::get(format!("{}{}", base, STATUS_PATH))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["enabled"], true);

        let response = reqwest::get(format!("{}{}?duration=5m", base, DISABLE_PATH))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        assert_eq!(mock.hits(STATUS_PATH), 1);
        let disable = mock.last_request(DISABLE_PATH).unwrap();
        assert_eq!(disable.query.get("duration").map(String::as_str), Some("5m"));
    }

    #[tokio::test]
    async fn test_wrong_method_and_unknown_path() {
        let mock = MockBlocky::start().await.unwrap();
        let base = format!("http://{}:{}", mock.host(), mock.port());

        let wrong = reqwest::get(format!("{}{}", base, CACHE_FLUSH_PATH)).await.unwrap();
        assert_eq!(wrong.status().as_u16(), 405);

        let missing = reqwest::get(format!("{}/api/nope", base)).await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);
        assert_eq!(mock.get_requests().len(), 2);
    }
}
