//! Search indexing API client.
//!
//! Authenticates as a service account through the OAuth2 JWT-bearer grant and
//! publishes `URL_UPDATED` notifications.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::IndexingConfig;
use crate::error::PipelineError;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const NOTIFICATION_TYPE: &str = "URL_UPDATED";

/// Seam between the queue processor and the external indexing service.
#[async_trait]
pub trait IndexingApi: Send + Sync {
    /// Whether credentials are present at all. Checked before any row is leased.
    fn is_configured(&self) -> bool;

    /// Exchanges credentials for a bearer token, once per processor run.
    async fn access_token(&self) -> Result<String, PipelineError>;

    /// Notifies the indexing service that `url` changed.
    async fn publish(&self, access_token: &str, url: &str) -> Result<(), PipelineError>;
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    notification_type: &'a str,
}

struct ServiceAccount {
    email: String,
    private_key_pem: Zeroizing<Vec<u8>>,
}

/// Google Indexing API client backed by a service-account key
pub struct GoogleIndexingClient {
    http: Client,
    config: IndexingConfig,
    account: Option<ServiceAccount>,
}

impl GoogleIndexingClient {
    pub fn new(config: &IndexingConfig) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("http client: {}", e)))?;

        let account = config
            .service_account()
            .map(|(email, pem)| ServiceAccount {
                email: email.to_string(),
                private_key_pem: Zeroizing::new(pem.as_bytes().to_vec()),
            });

        let mut config = config.clone();
        // The key now lives only in the zeroizing buffer
        config.service_account_private_key = None;

        Ok(Self {
            http,
            config,
            account,
        })
    }

    /// Signs the RS256 assertion presented to the token endpoint.
    fn signed_assertion(&self, account: &ServiceAccount) -> Result<String, PipelineError> {
        let key = EncodingKey::from_rsa_pem(&account.private_key_pem).map_err(|e| {
            PipelineError::Configuration(format!("invalid service account key: {}", e))
        })?;

        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &account.email,
            scope: &self.config.scope,
            aud: &self.config.token_endpoint,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECONDS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| PipelineError::Configuration(format!("failed to sign assertion: {}", e)))
    }
}

#[async_trait]
impl IndexingApi for GoogleIndexingClient {
    fn is_configured(&self) -> bool {
        self.account.is_some()
    }

    async fn access_token(&self) -> Result<String, PipelineError> {
        let account = self.account.as_ref().ok_or_else(|| {
            PipelineError::Configuration("service account credentials not configured".to_string())
        })?;

        let assertion = self.signed_assertion(account)?;

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ExternalSubmission {
                status: Some(status.as_u16()),
                message: format!("token exchange rejected: {}", snippet(&body)),
            });
        }

        let token: TokenResponse = response.json().await?;
        debug!(expires_in = ?token.expires_in, "obtained indexing access token");
        Ok(token.access_token)
    }

    async fn publish(&self, access_token: &str, url: &str) -> Result<(), PipelineError> {
        let response = self
            .http
            .post(&self.config.publish_endpoint)
            .bearer_auth(access_token)
            .json(&PublishRequest {
                url,
                notification_type: NOTIFICATION_TYPE,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PipelineError::ExternalSubmission {
            status: Some(status.as_u16()),
            message: format!("publish rejected with {}: {}", status, snippet(&body)),
        })
    }
}

/// Upstream error bodies are truncated before they reach logs.
fn snippet(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    if body.chars().count() > MAX_CHARS {
        let truncated: String = body.chars().take(MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}
