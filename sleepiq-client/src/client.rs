use reqwest::{RequestBuilder, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::types::{
    BedList, ErrorEnvelope, FoundationStatus, LoginRequest, LoginResponse, Preset, PresetRequest,
    Side,
};

/// Production endpoint of the SleepIQ REST API
pub const DEFAULT_BASE_URL: &str = "https://prod-api.sleepiq.sleepnumber.com/rest";

/// Upper bound for any single HTTP exchange
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Base request configuration shared by every call
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root URL the endpoint paths are appended to
    /// Default: `DEFAULT_BASE_URL`
    pub base_url: String,

    /// Timeout applied to each request
    /// Default: 10 seconds
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Account credentials used for login
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authentication state for one account
///
/// The key is `None` until a login succeeds and goes back to `None` whenever
/// the service rejects it. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub key: Option<String>,
    pub user_id: Option<String>,
    pub bed_id: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.key.is_some() && self.bed_id.is_some()
    }

    fn authorized(&self) -> Option<Authorized> {
        match (&self.key, &self.bed_id) {
            (Some(key), Some(bed_id)) => Some(Authorized {
                key: key.clone(),
                bed_id: bed_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Session key and bed id for a single authorized request
#[derive(Debug, Clone)]
struct Authorized {
    key: String,
    bed_id: String,
}

/// Client for the SleepIQ cloud API with session management
///
/// Every call other than [`SessionClient::login`] needs a session key. A
/// missing key triggers a login first; a rejected key is cleared and the
/// request is retried exactly once after a fresh login.
pub struct SessionClient {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: Credentials,
    session: Mutex<Session>,
}

impl SessionClient {
    /// Create a client for the given account
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;

        Ok(Self {
            http,
            config,
            credentials,
            session: Mutex::new(Session::default()),
        })
    }

    /// Create a client against the production endpoint
    pub fn with_defaults(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::new(Credentials::new(username, password), ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Submit credentials and discover the account's first bed
    pub async fn login(&self) -> Result<Session> {
        debug!(user = %self.credentials.username, "SleepIQ authenticating");

        let response = self
            .http
            .put(self.url("login"))
            .json(&LoginRequest {
                login: &self.credentials.username,
                password: &self.credentials.password,
            })
            .send()
            .await
            .map_err(|e| ClientError::Auth(format!("login request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Auth(format!("login response unreadable: {}", e)))?;

        if !status.is_success() {
            let message = ErrorEnvelope::parse(&body)
                .map(|error| error.describe(&body))
                .unwrap_or(body);
            return Err(ClientError::Auth(format!("HTTP {}: {}", status.as_u16(), message)));
        }

        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::Auth(format!("unexpected login response: {}", e)))?;

        let beds = if login.beds.is_empty() {
            self.fetch_beds(&login.key).await?
        } else {
            login.beds
        };
        let bed_id = beds.into_iter().next().ok_or(ClientError::NoBed)?.bed_id;

        let session = Session {
            key: Some(login.key),
            user_id: login.user_id,
            bed_id: Some(bed_id),
        };
        *self.session.lock().await = session.clone();

        info!(bed_id = ?session.bed_id, "SleepIQ session established");
        Ok(session)
    }

    /// Fetch head/foot positions and the motion flag of the foundation
    pub async fn foundation_status(&self) -> Result<FoundationStatus> {
        let body = self
            .send_authorized(|auth| {
                self.http
                    .get(self.url(&format!("bed/{}/foundation/status", auth.bed_id)))
                    .query(&[("_k", auth.key.as_str())])
            })
            .await?;

        debug!(body = %body, "Foundation status fetched");

        if let Some(error) = ErrorEnvelope::parse(&body) {
            return Err(match error.code {
                Some(404) => ClientError::NoFoundation(error.describe("Not Found")),
                code => ClientError::Remote {
                    status: code.unwrap_or(200),
                    message: error.describe(&body),
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Issue a numbered preset for one side; starts the foundation motors
    pub async fn set_preset(&self, side: Side, preset: Preset) -> Result<()> {
        debug!(%side, preset = preset.number(), "Sending foundation preset");

        self.send_authorized(|auth| {
            self.http
                .put(self.url(&format!("bed/{}/foundation/preset", auth.bed_id)))
                .query(&[("_k", auth.key.as_str())])
                .json(&PresetRequest {
                    speed: 0,
                    side,
                    preset: preset.number(),
                })
        })
        .await?;

        Ok(())
    }

    async fn fetch_beds(&self, key: &str) -> Result<Vec<crate::types::BedRef>> {
        let response = self
            .http
            .get(self.url("bed"))
            .query(&[("_k", key)])
            .send()
            .await
            .map_err(|e| ClientError::from_transport(e, self.config.request_timeout))?;

        let body = self.read_success_body(response).await.map_err(|e| {
            if e.is_no_foundation() {
                ClientError::NoBed
            } else {
                e
            }
        })?;
        let beds: BedList =
            serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(beds.beds)
    }

    /// Send a request built from the current session and return its body,
    /// re-authenticating once if the service rejects the key.
    async fn send_authorized<F>(&self, build: F) -> Result<String>
    where
        F: Fn(&Authorized) -> RequestBuilder,
    {
        let auth = self.ensure_session().await?;
        if let Exchange::Body(body) = self.exchange(build(&auth)).await? {
            return Ok(body);
        }

        warn!("SleepIQ rejected the session key, logging in again");
        self.invalidate().await;

        let auth = self
            .login()
            .await?
            .authorized()
            .ok_or_else(|| ClientError::Auth("login returned no session".to_string()))?;
        match self.exchange(build(&auth)).await? {
            Exchange::Body(body) => Ok(body),
            Exchange::Rejected => {
                self.invalidate().await;
                Err(ClientError::Auth(
                    "session rejected again after re-login".to_string(),
                ))
            }
        }
    }

    /// Run one authorized request; a 401 status or a 401 error code in the
    /// body means the session key was rejected.
    async fn exchange(&self, request: RequestBuilder) -> Result<Exchange> {
        let response = self.dispatch(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(Exchange::Rejected);
        }

        let body = self.read_success_body(response).await?;
        if ErrorEnvelope::parse(&body).and_then(|error| error.code) == Some(401) {
            return Ok(Exchange::Rejected);
        }

        Ok(Exchange::Body(body))
    }

    async fn ensure_session(&self) -> Result<Authorized> {
        if let Some(auth) = self.session.lock().await.authorized() {
            return Ok(auth);
        }

        self.login()
            .await?
            .authorized()
            .ok_or_else(|| ClientError::Auth("login returned no session".to_string()))
    }

    async fn invalidate(&self) {
        self.session.lock().await.key = None;
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| ClientError::from_transport(e, self.config.request_timeout))
    }

    /// Read the body of a response, mapping error statuses to client errors
    async fn read_success_body(&self, response: Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(e, self.config.request_timeout))?;

        if status == StatusCode::NOT_FOUND {
            let message = ErrorEnvelope::parse(&body)
                .map(|error| error.describe("Not Found"))
                .unwrap_or_else(|| "Not Found".to_string());
            return Err(ClientError::NoFoundation(message));
        }

        if !status.is_success() {
            let message = ErrorEnvelope::parse(&body)
                .map(|error| error.describe(&body))
                .unwrap_or(body);
            return Err(ClientError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

enum Exchange {
    Body(String),
    Rejected,
}
