//! Adapter configuration
//!
//! An [`AdapterConfig`] is owned by exactly one adapter instance and never
//! mutated after construction, so adapters are safe for concurrent use by any
//! number of simultaneous calls.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::LlmError;

/// Credential material, opaque per provider.
#[derive(Debug, Clone)]
pub enum Credential {
    /// API key carried in a provider-specific header (e.g. `x-api-key`).
    ApiKey(SecretString),
    /// Bearer token carried in `Authorization: Bearer <token>`.
    Bearer(SecretString),
    /// AWS credential triple; the region also selects the regional endpoint.
    /// Request signing itself is an external concern.
    Aws {
        region: String,
        access_key_id: SecretString,
        secret_access_key: SecretString,
    },
}

impl Credential {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(SecretString::from(key.into()))
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(SecretString::from(token.into()))
    }

    /// Parse the composite `region|access_key_id|secret_access_key` form used
    /// for marketplace deployments.
    pub fn aws_triple(composite: &str) -> Result<Self, LlmError> {
        let mut parts = composite.splitn(3, '|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(region), Some(access), Some(secret))
                if !region.is_empty() && !access.is_empty() && !secret.is_empty() =>
            {
                Ok(Self::Aws {
                    region: region.to_string(),
                    access_key_id: SecretString::from(access.to_string()),
                    secret_access_key: SecretString::from(secret.to_string()),
                })
            }
            _ => Err(LlmError::ConfigurationError(
                "AWS credential must be 'region|access_key_id|secret_access_key'".to_string(),
            )),
        }
    }

    pub(crate) fn expose_api_key(&self) -> Option<&str> {
        match self {
            Self::ApiKey(key) => Some(key.expose_secret()),
            _ => None,
        }
    }

    pub(crate) fn expose_bearer(&self) -> Option<&str> {
        match self {
            Self::Bearer(token) => Some(token.expose_secret()),
            _ => None,
        }
    }
}

/// Immutable configuration for one adapter instance.
///
/// Empty `base_url`/`path` are filled with provider defaults by the adapter
/// constructor, mirroring how callers usually only supply model + credential.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub base_url: String,
    /// Path template. May contain `{project}`, `{location}` and `{model}`
    /// placeholders, substituted at construction time.
    pub path: String,
    /// Default model used when a request leaves `model` empty.
    pub model: String,
    pub credential: Credential,
    /// Bound on the total call duration, including streaming reads.
    pub timeout: Duration,
    pub proxy: Option<String>,
    /// Extra headers merged after provider defaults (e.g. externally signed
    /// authorization headers for marketplace deployments).
    pub extra_headers: HashMap<String, String>,
    /// Cloud project identifier, where the path template requires one.
    pub project: Option<String>,
    /// Cloud region/location, where the path template requires one.
    pub location: Option<String>,
    /// Bound on the gap between consecutive stream frames.
    pub stall_timeout: Duration,
    /// Capacity of the chunk channel between producer and caller.
    pub channel_capacity: usize,
}

impl AdapterConfig {
    pub fn new(model: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: String::new(),
            path: String::new(),
            model: model.into(),
            credential,
            timeout: Duration::from_secs(180),
            proxy: None,
            extra_headers: HashMap::new(),
            project: None,
            location: None,
            stall_timeout: Duration::from_secs(60),
            channel_capacity: 32,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}
