// API client module: builds authenticated requests for the card endpoints
// and hands them to a `Transport`. The production transport is a blocking
// reqwest client; tests swap in a mock.

use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Ceiling on a whole request/response cycle.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub const REGISTER_PATH: &str = "/api/card/integration/register";
pub const MAIN_IMAGE_PATH: &str = "/api/card/integration/mainimage";
pub const VERIFY_PATH: &str = "/api/card/integration/verify";
pub const CARD_PATH: &str = "/api/card";

/// Header carrying the card id for the main image endpoint.
pub const ID_CARD_HEADER: &str = "idCard";

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Serialized JSON body, if any.
    pub body: Option<Vec<u8>>,
}

/// Status and raw body of a response, whatever the status was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends a request and returns the response without judging its status.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by a blocking reqwest client with a fixed timeout.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub(crate) fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ReqwestTransport { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("{} {}", request.method, request.url);
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let res = builder.send().map_err(transport_error)?;
        let status = res.status().as_u16();
        let body = res.bytes().map_err(transport_error)?;
        debug!("status={} ({} bytes)", status, body.len());
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        warn!("request timed out");
    }
    Error::transport(err)
}

/// Body of the register endpoint. `image` is plain base64.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CreateCardRequest {
    pub id: String,
    pub name: String,
    #[serde(rename = "consentTermSigned")]
    pub consent_term_signed: bool,
    pub image: String,
}

/// Body of the verify endpoint. `image` is a data URI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VerifyCardRequest {
    pub id: String,
    pub name: String,
    pub detail: String,
    pub image: String,
}

/// Response of the verify endpoint. Every field is optional on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct VerifyResponse {
    pub percentage: String,
    pub response: VerifyOutcome,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct VerifyOutcome {
    #[serde(rename = "id_Log")]
    pub id_log: String,
    pub percentage: String,
    pub success: bool,
    pub status: i64,
    pub message: String,
    #[serde(rename = "reference_Id")]
    pub reference_id: String,
}

impl VerifyResponse {
    /// Similarity reported by the inner result, or the outer one if the
    /// inner field is empty.
    pub fn similarity(&self) -> &str {
        if self.response.percentage.is_empty() {
            &self.percentage
        } else {
            &self.response.percentage
        }
    }
}

/// Client for the card API: knows the base URL and token and builds one
/// request per endpoint.
pub struct ApiClient {
    transport: Box<dyn Transport>,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(transport: impl Transport + 'static, config: &Config) -> Self {
        ApiClient {
            transport: Box::new(transport),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    /// Create a client talking HTTP through reqwest.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(ReqwestTransport::new()?, config))
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authorization and content type headers sent with every request,
    /// bodyless ones included.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let val = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            Error::Config("AUTH_TOKEN contains characters not allowed in a header".into())
        })?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Serialize the body, if any, and send the request. The status code is
    /// returned as-is for the caller to judge.
    pub fn execute<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: String,
        headers: HeaderMap,
        body: Option<&T>,
    ) -> Result<HttpResponse> {
        let body = body.map(serde_json::to_vec).transpose()?;
        self.transport.send(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// POST the register endpoint.
    pub fn create_card(&self, req: &CreateCardRequest) -> Result<HttpResponse> {
        let url = self.url(REGISTER_PATH);
        self.execute(Method::POST, url, self.auth_headers()?, Some(req))
    }

    /// GET the stored main image of a card, identified by header.
    pub fn main_image(&self, id_card: &str) -> Result<HttpResponse> {
        let mut headers = self.auth_headers()?;
        let val = HeaderValue::from_str(id_card)
            .map_err(|_| Error::Usage(format!("invalid --idcard value {id_card:?}")))?;
        headers.insert(HeaderName::from_static("idcard"), val);
        self.execute::<()>(Method::GET, self.url(MAIN_IMAGE_PATH), headers, None)
    }

    /// POST a verification request to `endpoint`.
    pub fn verify_card(&self, endpoint: &str, req: &VerifyCardRequest) -> Result<HttpResponse> {
        self.execute(Method::POST, self.url(endpoint), self.auth_headers()?, Some(req))
    }

    /// DELETE a card by id.
    pub fn delete_card(&self, id: &str) -> Result<HttpResponse> {
        let url = self.url(&format!("{CARD_PATH}/{id}"));
        self.execute::<()>(Method::DELETE, url, self.auth_headers()?, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            base_url: "http://api.test/".into(),
            token: "tok".into(),
            default_id: "1".into(),
        }
    }

    fn ok(status: u16, body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        })
    }

    fn assert_auth(req: &HttpRequest) {
        assert_eq!(req.headers[AUTHORIZATION], "Bearer tok");
        assert_eq!(req.headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn create_card_posts_typed_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                assert_auth(req);
                let body: serde_json::Value =
                    serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
                req.method == Method::POST
                    && req.url == "http://api.test/api/card/integration/register"
                    && body
                        == serde_json::json!({
                            "id": "7",
                            "name": "Ana",
                            "consentTermSigned": true,
                            "image": "aGVsbG8=",
                        })
            })
            .times(1)
            .returning(|_| ok(201, "{}"));

        let api = ApiClient::new(transport, &config());
        let res = api
            .create_card(&CreateCardRequest {
                id: "7".into(),
                name: "Ana".into(),
                consent_term_signed: true,
                image: "aGVsbG8=".into(),
            })
            .unwrap();
        assert_eq!(res.status, 201);
    }

    #[test]
    fn main_image_sends_id_card_header_without_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                assert_auth(req);
                req.method == Method::GET
                    && req.url == "http://api.test/api/card/integration/mainimage"
                    && req.headers[ID_CARD_HEADER] == "42"
                    && req.body.is_none()
            })
            .times(1)
            .returning(|_| ok(200, "jpegbytes"));

        let api = ApiClient::new(transport, &config());
        assert_eq!(api.main_image("42").unwrap().body, b"jpegbytes");
    }

    #[test]
    fn delete_card_targets_card_path() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                assert_auth(req);
                req.method == Method::DELETE
                    && req.url == "http://api.test/api/card/7"
                    && req.body.is_none()
            })
            .times(1)
            .returning(|_| ok(204, ""));

        let api = ApiClient::new(transport, &config());
        assert_eq!(api.delete_card("7").unwrap().status, 204);
    }

    #[test]
    fn verify_card_uses_given_endpoint() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url == "http://api.test/custom/verify")
            .times(1)
            .returning(|_| ok(500, "boom"));

        let api = ApiClient::new(transport, &config());
        let req = VerifyCardRequest {
            id: "7".into(),
            name: "Ana".into(),
            detail: String::new(),
            image: "data:image/jpeg;base64,".into(),
        };
        // Non-2xx statuses are returned, not turned into errors.
        let res = api.verify_card("/custom/verify", &req).unwrap();
        assert_eq!(res.status, 500);
        assert!(!res.is_success());
    }

    #[test]
    fn silent_server_times_out_as_transport_error() {
        // Connections complete in the backlog but nobody ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let transport = ReqwestTransport::with_timeout(Duration::from_millis(200)).unwrap();

        let err = transport
            .send(HttpRequest {
                method: Method::GET,
                url: format!("http://{addr}/api/card/integration/mainimage"),
                headers: HeaderMap::new(),
                body: None,
            })
            .unwrap_err();
        match err {
            Error::Transport(source) => {
                let source = source.downcast_ref::<reqwest::Error>().unwrap();
                assert!(source.is_timeout());
            }
            other => panic!("unexpected error {other:?}"),
        }
        drop(listener);
    }

    #[test]
    fn token_with_newline_is_rejected_before_sending() {
        let transport = MockTransport::new();
        let mut cfg = config();
        cfg.token = "bad\ntoken".into();
        let api = ApiClient::new(transport, &cfg);
        let err = api.delete_card("7").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_FAILURE);
    }

    #[test]
    fn verify_response_tolerates_missing_fields() {
        let parsed: VerifyResponse = serde_json::from_str(
            r#"{"response":{"success":true,"percentage":"92.5","status":1,"id_Log":"L1"}}"#,
        )
        .unwrap();
        assert!(parsed.response.success);
        assert_eq!(parsed.similarity(), "92.5");
        assert_eq!(parsed.response.status, 1);
        assert_eq!(parsed.response.id_log, "L1");
        assert_eq!(parsed.response.reference_id, "");

        let outer: VerifyResponse =
            serde_json::from_str(r#"{"percentage":"80","response":{}}"#).unwrap();
        assert_eq!(outer.similarity(), "80");
    }
}
