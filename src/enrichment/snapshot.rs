/// Uniform provider-snapshot envelope
///
/// Every third-party result is wrapped the same way regardless of provider,
/// so the orchestrator can merge heterogeneous results into one environment
/// map without knowing provider specifics.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the upstream provider a snapshot came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ProviderInfo {
    pub fn new(name: &str, product: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            product: product.to_string(),
            version: Some(version.to_string()),
        }
    }
}

/// A point-in-time capture of one provider's normalized response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSnapshot<T> {
    pub captured_at: DateTime<Utc>,
    pub provider: ProviderInfo,
    pub summary: T,
}

impl<T> ApiSnapshot<T> {
    /// Wrap a summary captured just now
    pub fn now(provider: ProviderInfo, summary: T) -> Self {
        Self {
            captured_at: Utc::now(),
            provider,
            summary,
        }
    }
}
