// # OVH Registrar Client
//
// This crate provides the OVH API v1 implementation of `RegistrarClient`.
//
// ## Scope
//
// - ✅ One HTTP request per trait call (plus one `/auth/time` lookup per client)
// - ✅ Full error propagation to the reconciler
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error mapping for HTTP status codes (401/403, 404, 429, 5xx)
// - ✅ Consumer key requests (`POST /auth/credential`)
// - ❌ NO retry or backoff (a failed call aborts the run)
// - ❌ NO record caching beyond a single request
// - ❌ NO background tasks
//
// ## Trust Level: Untrusted (Registrar Client)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the configured OVH endpoint only
// - ✅ Parse OVH-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Decide which records change (owned by the planner)
// - ❌ Refresh the zone on its own (owned by `Reconciler`)
//
// ## Security Requirements
//
// - Application secret and consumer key NEVER appear in logs
// - Client construction fails fast when the application credentials are empty
//
// ## API Reference
//
// - List records: GET `/domain/zone/{zone}/record?subDomain=...`
// - Get/Update/Delete record: GET/PUT/DELETE `/domain/zone/{zone}/record/{id}`
// - Create record: POST `/domain/zone/{zone}/record`
// - Refresh zone: POST `/domain/zone/{zone}/refresh`
// - Server time: GET `/auth/time`
// - Consumer key: POST `/auth/credential`

mod sign;

use async_trait::async_trait;
use chrono::Utc;
use ovhdns_core::config::RegistrarConfig;
use ovhdns_core::mask::mask;
use ovhdns_core::traits::RegistrarClient;
use ovhdns_core::types::{FieldType, NewRecord, Record, RecordId};
use ovhdns_core::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Provider name used in errors and logs
const PROVIDER: &str = "ovh";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Named API endpoints
const ENDPOINTS: &[(&str, &str)] = &[
    ("ovh-eu", "https://eu.api.ovh.com/1.0"),
    ("ovh-ca", "https://ca.api.ovh.com/1.0"),
    ("ovh-us", "https://api.us.ovhcloud.com/1.0"),
    ("kimsufi-eu", "https://eu.api.kimsufi.com/1.0"),
    ("kimsufi-ca", "https://ca.api.kimsufi.com/1.0"),
    ("soyoustart-eu", "https://eu.api.soyoustart.com/1.0"),
    ("soyoustart-ca", "https://ca.api.soyoustart.com/1.0"),
];

/// Resolve an endpoint name (`ovh-eu`, ...) or a raw `http(s)://` base URL
pub fn endpoint_url(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }

    ENDPOINTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(endpoint))
        .map(|(_, url)| url.to_string())
        .ok_or_else(|| {
            let known: Vec<&str> = ENDPOINTS.iter().map(|(name, _)| *name).collect();
            Error::config(format!(
                "Unknown OVH endpoint '{}', expected one of {} or an http(s) URL",
                endpoint,
                known.join(", ")
            ))
        })
}

/// One permission granted to a consumer key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub method: String,
    pub path: String,
}

impl AccessRule {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Rules needed to read and mutate DNS zones
pub fn default_access_rules() -> Vec<AccessRule> {
    ["GET", "PUT", "POST", "DELETE"]
        .into_iter()
        .map(|method| AccessRule::new(method, "/domain/zone/*"))
        .collect()
}

/// Answer to a consumer key request
///
/// The key is usable once the user visited `validation_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub consumer_key: String,
    pub validation_url: String,
    pub state: String,
}

/// Record as returned by `GET /domain/zone/{zone}/record/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OvhRecord {
    id: u64,
    field_type: String,
    #[serde(default)]
    sub_domain: String,
    target: String,
    /// Zero or absent means "zone default"
    #[serde(default)]
    ttl: Option<u32>,
}

impl OvhRecord {
    fn into_record(self) -> Result<Record> {
        Ok(Record {
            id: RecordId::from(self.id),
            field_type: self.field_type.parse::<FieldType>()?,
            sub_domain: self.sub_domain,
            target: self.target,
            ttl: self.ttl.unwrap_or(0),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    field_type: &'a str,
    sub_domain: &'a str,
    target: &'a str,
    ttl: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    sub_domain: &'a str,
    target: &'a str,
    ttl: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialBody<'a> {
    access_rules: &'a [AccessRule],
    #[serde(skip_serializing_if = "Option::is_none")]
    redirection: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// OVH API client
///
/// # Trust Level: Untrusted
///
/// Stateless apart from the server time delta, fetched once on the first
/// signed call and reused for the lifetime of the client.
///
/// # Security
///
/// The Debug implementation does NOT expose the application secret or
/// the consumer key.
pub struct OvhClient {
    /// Resolved API base URL, without trailing slash
    base_url: String,

    application_key: String,

    /// ⚠️ NEVER log this value
    application_secret: String,

    /// Empty when the client is only used to request a consumer key
    consumer_key: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Server time minus local time, in seconds
    time_delta: OnceCell<i64>,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for OvhClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OvhClient")
            .field("base_url", &self.base_url)
            .field("application_key", &mask(&self.application_key))
            .field("application_secret", &"<REDACTED>")
            .field("consumer_key", &"<REDACTED>")
            .finish()
    }
}

impl OvhClient {
    /// Create a client from registrar settings
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an unknown endpoint or empty application credentials
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn new(config: &RegistrarConfig) -> Result<Self> {
        if config.application_key.trim().is_empty() || config.application_secret.trim().is_empty()
        {
            return Err(Error::config(
                "OVH application key and secret cannot be empty",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: endpoint_url(&config.endpoint)?,
            application_key: config.application_key.clone(),
            application_secret: config.application_secret.clone(),
            consumer_key: config.consumer_key.clone(),
            client,
            time_delta: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask OVH for a new consumer key carrying `access_rules`
    ///
    /// Signed with the application key only. The returned key stays
    /// pending until the user opens the validation URL.
    pub async fn request_consumer_key(
        &self,
        access_rules: &[AccessRule],
        redirection: Option<&str>,
    ) -> Result<CredentialRequest> {
        let path = "/auth/credential";
        let body = serde_json::to_string(&CredentialBody {
            access_rules,
            redirection,
        })?;

        let request = self
            .client
            .post(self.url(path, &[])?)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Ovh-Application", &self.application_key)
            .body(body);

        let text = self.dispatch(&Method::POST, path, request).await?;
        let credential: CredentialRequest = parse(&text, "credential")?;
        tracing::info!(
            "Consumer key requested ({}), state: {}",
            mask(&credential.consumer_key),
            credential.state
        );
        Ok(credential)
    }

    /// Server UNIX time, as reported by `GET /auth/time`
    pub async fn server_time(&self) -> Result<i64> {
        let path = "/auth/time";
        let request = self.client.get(self.url(path, &[])?);
        let text = self.dispatch(&Method::GET, path, request).await?;

        text.trim()
            .parse()
            .map_err(|e| Error::provider(PROVIDER, format!("Invalid server time '{}': {}", text.trim(), e)))
    }

    /// Local time shifted by the cached server delta
    async fn timestamp(&self) -> Result<i64> {
        let delta = self
            .time_delta
            .get_or_try_init(|| async {
                let server = self.server_time().await?;
                let delta = server - Utc::now().timestamp();
                tracing::debug!("OVH server time delta: {}s", delta);
                Ok::<i64, Error>(delta)
            })
            .await?;
        Ok(Utc::now().timestamp() + delta)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::config(format!("Invalid OVH URL for {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Issue a signed call and return the response body
    async fn signed(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<String> {
        if self.consumer_key.trim().is_empty() {
            return Err(Error::config(
                "OVH consumer key is required for signed API calls",
            ));
        }

        let url = self.url(path, query)?;
        let body = body.unwrap_or_default();
        let timestamp = self.timestamp().await?;
        let signature = sign::signature(
            &self.application_secret,
            &self.consumer_key,
            method.as_str(),
            url.as_str(),
            &body,
            timestamp,
        );

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Ovh-Application", &self.application_key)
            .header("X-Ovh-Consumer", &self.consumer_key)
            .header("X-Ovh-Timestamp", timestamp.to_string())
            .header("X-Ovh-Signature", signature);
        if !body.is_empty() {
            request = request.body(body);
        }

        self.dispatch(&method, path, request).await
    }

    /// Send a request and map non-2xx statuses to errors
    async fn dispatch(&self, method: &Method, path: &str, request: RequestBuilder) -> Result<String> {
        tracing::debug!("OVH {} {}", method, path);

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{method} {path} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if !status.is_success() {
            return Err(status_error(status.as_u16(), method, path, &text));
        }
        Ok(text)
    }
}

/// Map an OVH error response to a core error
fn status_error(status: u16, method: &Method, path: &str, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        401 | 403 => Error::auth(format!(
            "Invalid OVH credentials or insufficient rights for {method} {path} ({status}): {message}"
        )),
        404 => Error::not_found(format!("{path}: {message}")),
        429 => Error::rate_limited(format!("{method} {path} ({status}): {message}")),
        500..=599 => Error::provider(
            PROVIDER,
            format!("OVH server error (transient) on {method} {path}: {status} - {message}"),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{method} {path} failed: {status} - {message}"),
        ),
    }
}

fn parse<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| Error::provider(PROVIDER, format!("Invalid {what} response: {e}")))
}

fn record_path(zone: &str, record_id: &RecordId) -> String {
    format!("/domain/zone/{zone}/record/{record_id}")
}

#[async_trait]
impl RegistrarClient for OvhClient {
    async fn list_records(&self, zone: &str, sub_domain: &str) -> Result<Vec<RecordId>> {
        let path = format!("/domain/zone/{zone}/record");
        let text = self
            .signed(Method::GET, &path, &[("subDomain", sub_domain)], None)
            .await?;
        let ids: Vec<u64> = parse(&text, "record list")?;
        Ok(ids.into_iter().map(RecordId::from).collect())
    }

    async fn get_record(&self, zone: &str, record_id: &RecordId) -> Result<Record> {
        let text = self
            .signed(Method::GET, &record_path(zone, record_id), &[], None)
            .await?;
        parse::<OvhRecord>(&text, "record")?.into_record()
    }

    async fn create_record(&self, zone: &str, record: &NewRecord) -> Result<RecordId> {
        let path = format!("/domain/zone/{zone}/record");
        let body = serde_json::to_string(&CreateBody {
            field_type: record.field_type.as_str(),
            sub_domain: &record.sub_domain,
            target: &record.target,
            ttl: record.ttl,
        })?;

        let text = self.signed(Method::POST, &path, &[], Some(body)).await?;
        let created: OvhRecord = parse(&text, "created record")?;
        tracing::info!(
            "Created {} record #{} for '{}'",
            record.field_type,
            created.id,
            record.sub_domain
        );
        Ok(RecordId::from(created.id))
    }

    async fn update_record(
        &self,
        zone: &str,
        record_id: &RecordId,
        sub_domain: &str,
        target: &str,
        ttl: u32,
    ) -> Result<()> {
        let body = serde_json::to_string(&UpdateBody {
            sub_domain,
            target,
            ttl,
        })?;
        self.signed(Method::PUT, &record_path(zone, record_id), &[], Some(body))
            .await?;
        Ok(())
    }

    async fn delete_record(&self, zone: &str, record_id: &RecordId) -> Result<()> {
        self.signed(Method::DELETE, &record_path(zone, record_id), &[], None)
            .await?;
        Ok(())
    }

    async fn refresh_zone(&self, zone: &str) -> Result<()> {
        let path = format!("/domain/zone/{zone}/refresh");
        self.signed(Method::POST, &path, &[], None).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
