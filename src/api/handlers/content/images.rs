//! Image URL resolution for facility records.
//!
//! Raw references come in four shapes: absolute URLs, root-relative paths,
//! storage-bucket objects (`bucket/path/file.ext`), and bare relative paths.
//! Every resolution failure yields "no image" rather than an error; a missing
//! image is always a displayable state.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const SIGNED_URL_TTL_SECONDS: u32 = 60 * 60;

pub struct ImageResolver {
    base_url: String,
    site_root: PathBuf,
    public_root: PathBuf,
    buckets: Option<BucketClient>,
}

impl ImageResolver {
    #[must_use]
    pub fn new(
        base_url: String,
        site_root: PathBuf,
        public_root: PathBuf,
        buckets: Option<BucketClient>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_root,
            public_root,
            buckets,
        }
    }

    /// Resolve a raw image reference to a served URL, or `None` for "no image".
    pub async fn resolve(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }

        // Already absolute.
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Some(raw.to_string());
        }

        // Root-relative: only serve paths that exist under one of the roots.
        if raw.starts_with('/') {
            let rel = raw.trim_start_matches('/');
            for root in [&self.site_root, &self.public_root] {
                if tokio::fs::try_exists(root.join(rel)).await.unwrap_or(false) {
                    return Some(format!("{}{raw}", self.base_url));
                }
            }
            warn!(image = raw, "image referenced but not found locally");
            return None;
        }

        // Storage-bucket object: public URL, then signed URL, then the
        // conventional uploads path using only the filename.
        if looks_like_bucket_object(raw) {
            let (bucket, object) = raw.split_once('/')?;
            if let Some(buckets) = &self.buckets {
                if let Some(url) = buckets.public_url(bucket, object).await {
                    return Some(url);
                }
                if let Some(url) = buckets.signed_url(bucket, object).await {
                    return Some(url);
                }
            }
            let filename = object.rsplit('/').next().unwrap_or(object);
            return Some(format!("{}/uploads/facilities/{filename}", self.base_url));
        }

        // Anything else is a relative path under the site root.
        Some(format!("{}/{raw}", self.base_url))
    }
}

fn looks_like_bucket_object(raw: &str) -> bool {
    Regex::new(r"^[^/]+/.+\.[A-Za-z0-9]{2,5}$").is_ok_and(|regex| regex.is_match(raw))
}

/// Minimal client for a storage HTTP API with public and signed object URLs.
pub struct BucketClient {
    client: reqwest::Client,
    base_url: String,
    service_key: Option<SecretString>,
}

impl BucketClient {
    #[must_use]
    pub fn new(base_url: String, service_key: Option<SecretString>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::api::APP_USER_AGENT)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }

    /// Construct from the environment; `None` when no storage API is set up.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("JOLLYSITE_STORAGE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let service_key = env::var("JOLLYSITE_STORAGE_SERVICE_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);
        Some(Self::new(base_url, service_key))
    }

    /// Public object URL, verified with a reachability probe.
    async fn public_url(&self, bucket: &str, object: &str) -> Option<String> {
        let url = format!(
            "{}/storage/v1/object/public/{bucket}/{object}",
            self.base_url
        );
        let response = self.client.head(&url).send().await.ok()?;
        response.status().is_success().then_some(url)
    }

    /// Time-limited signed URL via the service key, for private buckets.
    async fn signed_url(&self, bucket: &str, object: &str) -> Option<String> {
        let key = self.service_key.as_ref()?;
        let url = format!("{}/storage/v1/object/sign/{bucket}/{object}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(key.expose_secret())
            .json(&json!({ "expiresIn": SIGNED_URL_TTL_SECONDS }))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let payload: Value = response.json().await.ok()?;
        let signed = payload.get("signedURL").and_then(Value::as_str)?;
        Some(format!("{}/storage/v1{signed}", self.base_url))
    }
}
