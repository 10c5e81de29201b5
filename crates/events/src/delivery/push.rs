//! Web Push delivery with self-healing subscription pruning.
//!
//! [`PushDispatcher`] delivers notifications to out-of-band push endpoints
//! regardless of whether the recipient holds a live WebSocket connection.
//! Browser endpoints receive a VAPID-authenticated HTTP POST; native mobile
//! pseudo-endpoints (recognized by their scheme prefix) are intentionally
//! skipped here, as native delivery belongs to a different provider.
//!
//! Failure handling is endpoint-specific: a `404`/`410` response means the
//! push service no longer knows the endpoint, so the subscription row is
//! deleted on the spot. Every other failure is logged and otherwise
//! ignored; the next triggered send retries naturally. Nothing in this
//! module ever returns an error to the caller of [`PushDispatcher::send`].

use std::time::Duration;

use fieldline_core::types::DbId;
use fieldline_db::models::push_subscription::PushSubscription;
use fieldline_db::repositories::PushSubscriptionRepo;
use fieldline_db::DbPool;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

/// Scheme prefix marking a synthesized native-device pseudo-endpoint.
pub const NATIVE_SCHEME_PREFIX: &str = "expo-push://";

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// TTL advertised to the push service, in seconds.
const PUSH_TTL_SECS: u32 = 300;

/// VAPID authorization token lifetime (12 hours, the protocol maximum is 24).
const VAPID_TOKEN_TTL_SECS: i64 = 12 * 3600;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// VAPID signing configuration for Web Push authorization.
#[derive(Debug, Clone)]
pub struct VapidConfig {
    /// ES256 private key in PEM form.
    pub private_key_pem: String,
    /// URL-safe base64 public key, sent alongside the signed token.
    pub public_key: String,
    /// Contact URI claim (`mailto:` or `https:`).
    pub contact: String,
}

impl VapidConfig {
    /// Load from `VAPID_PRIVATE_KEY` / `VAPID_PUBLIC_KEY` /
    /// `VAPID_CONTACT`. Returns `None` when either key is absent, which
    /// degrades the whole dispatcher to a no-op rather than an error.
    pub fn from_env() -> Option<Self> {
        let private_key_pem = std::env::var("VAPID_PRIVATE_KEY").ok().filter(|s| !s.is_empty())?;
        let public_key = std::env::var("VAPID_PUBLIC_KEY").ok().filter(|s| !s.is_empty())?;
        let contact = std::env::var("VAPID_CONTACT")
            .unwrap_or_else(|_| "mailto:support@fieldline.app".into());
        Some(Self {
            private_key_pem,
            public_key,
            contact,
        })
    }
}

/// Claims for the VAPID authorization token.
#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for a single push delivery attempt. Internal to the
/// dispatcher; surfaced only through logs.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The push service returned a non-success status other than gone.
    #[error("Push service returned HTTP {0}")]
    HttpStatus(u16),

    /// The endpoint URL could not be parsed into an audience origin.
    #[error("Invalid push endpoint: {0}")]
    InvalidEndpoint(String),

    /// VAPID token signing failed (bad private key).
    #[error("VAPID signing failed: {0}")]
    Vapid(#[from] jsonwebtoken::errors::Error),
}

/// Result of one successful delivery attempt.
enum Outcome {
    /// The push service accepted the notification.
    Delivered,
    /// Native pseudo-endpoint, skipped by design.
    SkippedNative,
    /// The push service reports the endpoint no longer exists.
    Gone,
}

// ---------------------------------------------------------------------------
// PushDispatcher
// ---------------------------------------------------------------------------

/// Delivers notifications to the push subscriptions on file.
pub struct PushDispatcher {
    pool: DbPool,
    client: reqwest::Client,
    vapid: Option<VapidConfig>,
}

impl PushDispatcher {
    /// Create a dispatcher. `vapid: None` yields a dispatcher whose sends
    /// are all no-ops (configuration absence degrades the feature off).
    pub fn new(pool: DbPool, vapid: Option<VapidConfig>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            pool,
            client,
            vapid,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.vapid.is_some()
    }

    /// Deliver a notification to every subscription of one recipient.
    ///
    /// Best-effort: failures are logged, never returned. All endpoint sends
    /// for the batch run concurrently.
    pub async fn send(&self, recipient_id: DbId, title: &str, body: &str, data: serde_json::Value) {
        if self.vapid.is_none() {
            tracing::debug!("Push dispatch disabled, skipping send");
            return;
        }

        let subscriptions =
            match PushSubscriptionRepo::list_for_recipient(&self.pool, recipient_id).await {
                Ok(subs) => subs,
                Err(e) => {
                    tracing::warn!(recipient_id, error = %e, "Failed to load push subscriptions");
                    return;
                }
            };

        let payload = serde_json::json!({ "title": title, "body": body, "data": data });
        self.fan_out(&subscriptions, &payload).await;
    }

    /// Deliver to every subscription on file except those belonging to
    /// `excluded_id` (tenant-wide broadcast minus the sender).
    pub async fn send_to_all_except(
        &self,
        excluded_id: DbId,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) {
        if self.vapid.is_none() {
            tracing::debug!("Push dispatch disabled, skipping broadcast");
            return;
        }

        let subscriptions = match PushSubscriptionRepo::list_all(&self.pool).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load push subscriptions");
                return;
            }
        };
        let targets: Vec<_> = subscriptions
            .into_iter()
            .filter(|s| s.crew_member_id != excluded_id)
            .collect();

        let payload = serde_json::json!({ "title": title, "body": body, "data": data });
        self.fan_out(&targets, &payload).await;
    }

    /// Run all endpoint sends concurrently; one failure never blocks the
    /// rest of the batch.
    async fn fan_out(&self, subscriptions: &[PushSubscription], payload: &serde_json::Value) {
        let sends = subscriptions.iter().map(|sub| self.send_one(sub, payload));
        futures::future::join_all(sends).await;
    }

    /// Deliver to a single endpoint and apply its failure policy.
    async fn send_one(&self, subscription: &PushSubscription, payload: &serde_json::Value) {
        match self.deliver(subscription, payload).await {
            Ok(Outcome::Delivered) | Ok(Outcome::SkippedNative) => {}
            Ok(Outcome::Gone) => self.prune_gone(subscription).await,
            Err(e) => {
                tracing::warn!(
                    endpoint = %subscription.endpoint,
                    error = %e,
                    "Push delivery failed"
                );
            }
        }
    }

    /// Self-healing: the push service no longer knows this endpoint, so
    /// drop exactly that subscription row rather than failing forever.
    async fn prune_gone(&self, subscription: &PushSubscription) {
        match PushSubscriptionRepo::delete_by_id(&self.pool, subscription.id).await {
            Ok(()) => {
                tracing::info!(
                    endpoint = %subscription.endpoint,
                    "Pruned gone push subscription"
                );
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = %subscription.endpoint,
                    error = %e,
                    "Failed to prune gone push subscription"
                );
            }
        }
    }

    /// Execute one POST against the push service.
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &serde_json::Value,
    ) -> Result<Outcome, PushError> {
        if is_native_endpoint(&subscription.endpoint) {
            tracing::trace!(endpoint = %subscription.endpoint, "Skipping native push endpoint");
            return Ok(Outcome::SkippedNative);
        }

        let authorization = self.vapid_authorization(&subscription.endpoint)?;

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("Authorization", authorization)
            .header("TTL", PUSH_TTL_SECS)
            .json(payload)
            .send()
            .await?;

        outcome_for_status(response.status())
    }

    /// Build the `vapid t=<jwt>, k=<pubkey>` authorization header for an
    /// endpoint. The token audience is the endpoint's origin.
    fn vapid_authorization(&self, endpoint: &str) -> Result<String, PushError> {
        // send/send_to_all_except short-circuit when unconfigured.
        let vapid = self
            .vapid
            .as_ref()
            .ok_or_else(|| PushError::InvalidEndpoint("VAPID not configured".into()))?;

        let audience = endpoint_origin(endpoint)
            .ok_or_else(|| PushError::InvalidEndpoint(endpoint.to_string()))?;

        let claims = VapidClaims {
            aud: &audience,
            exp: chrono::Utc::now().timestamp() + VAPID_TOKEN_TTL_SECS,
            sub: &vapid.contact,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::ES256),
            &claims,
            &EncodingKey::from_ec_pem(vapid.private_key_pem.as_bytes())?,
        )?;

        Ok(format!("vapid t={token}, k={}", vapid.public_key))
    }
}

/// Map a push service response status onto a delivery outcome. `410 Gone`
/// and `404 Not Found` both mean the endpoint no longer exists and trigger
/// the subscription prune.
fn outcome_for_status(status: reqwest::StatusCode) -> Result<Outcome, PushError> {
    if status == reqwest::StatusCode::GONE || status == reqwest::StatusCode::NOT_FOUND {
        return Ok(Outcome::Gone);
    }
    if !status.is_success() {
        return Err(PushError::HttpStatus(status.as_u16()));
    }
    Ok(Outcome::Delivered)
}

/// Whether an endpoint is a synthesized native-device pseudo-endpoint.
fn is_native_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with(NATIVE_SCHEME_PREFIX)
}

/// Scheme + authority of a push endpoint URL, the VAPID audience.
fn endpoint_origin(endpoint: &str) -> Option<String> {
    let url = reqwest::Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Some(format!("{}://{}", url.scheme(), host)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
