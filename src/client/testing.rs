//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use super::config::{ClientConfig, RetryPolicy};
use super::http::MonzoClient;
use super::transport::{
    HttpRequest, HttpResponse, Transport, TransportError, TransportErrorKind,
};

type Scripted = Result<HttpResponse, TransportError>;

/// Replays queued responses. Requests to `/oauth2/token` draw from a separate
/// queue so token traffic can be scripted independently of API traffic.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    api: Mutex<VecDeque<Scripted>>,
    token: Mutex<VecDeque<Scripted>>,
    api_requests: Mutex<Vec<HttpRequest>>,
    token_requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn push_api(&self, response: HttpResponse) {
        self.api.lock().push_back(Ok(response));
    }

    pub(crate) fn push_api_error(&self, kind: TransportErrorKind) {
        self.api
            .lock()
            .push_back(Err(TransportError::new(kind, "scripted failure")));
    }

    pub(crate) fn push_token(&self, response: HttpResponse) {
        self.token.lock().push_back(Ok(response));
    }

    pub(crate) fn api_calls(&self) -> usize {
        self.api_requests.lock().len()
    }

    pub(crate) fn token_calls(&self) -> usize {
        self.token_requests.lock().len()
    }

    pub(crate) fn api_requests(&self) -> Vec<HttpRequest> {
        self.api_requests.lock().clone()
    }

    pub(crate) fn token_requests(&self) -> Vec<HttpRequest> {
        self.token_requests.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let (queue, log) = if request.url.path().ends_with("/oauth2/token") {
            (&self.token, &self.token_requests)
        } else {
            (&self.api, &self.api_requests)
        };
        log.lock().push(request.clone());
        queue.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::new(
                TransportErrorKind::Other,
                format!("nothing scripted for {}", request.url),
            ))
        })
    }
}

pub(crate) fn ok_json(body: Value) -> HttpResponse {
    HttpResponse::new(200, serde_json::to_vec(&body).unwrap())
        .with_header("Content-Type", "application/json")
}

pub(crate) fn status(code: u16) -> HttpResponse {
    HttpResponse::new(code, Vec::new())
}

pub(crate) fn token_response(access: &str, refresh: Option<&str>) -> HttpResponse {
    let mut body = serde_json::json!({
        "access_token": access,
        "client_id": "client",
        "expires_in": 21600,
        "token_type": "Bearer",
        "user_id": "user_00009237aqC8c5umZmrRdh",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = Value::String(refresh.to_string());
    }
    ok_json(body)
}

/// A client with a full OAuth app and tokens `access-1` / `refresh-1`, two
/// 1ms retries and no credential file.
pub(crate) fn scripted_client(transport: Arc<ScriptedTransport>) -> MonzoClient {
    MonzoClient::builder()
        .config(
            ClientConfig::default()
                .without_auth_file()
                .with_retry(RetryPolicy::new(2, Duration::from_millis(1)).unwrap()),
        )
        .client_id("client")
        .client_secret("secret")
        .redirect_uri("https://example.com/callback")
        .access_token("access-1")
        .refresh_token("refresh-1")
        .transport(transport)
        .sleeper(Arc::new(crate::time::testing::RecordingSleeper::default()))
        .build()
        .unwrap()
}
