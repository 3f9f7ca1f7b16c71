// Webhook subscription records
//
// A subscription is a registered endpoint URL that receives every event
// payload while it is active.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event kind a subscription was registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Read,
    Update,
    Delete,
}

/// Resource a subscription was registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceModel {
    Project,
    Comment,
    User,
}

/// Registered webhook endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Immutable unique ID
    pub id: Uuid,
    /// URL event payloads are POSTed to
    pub endpoint_url: String,
    /// Only active subscriptions receive events
    pub active: bool,
    /// Event kind label (informational)
    pub event_type: Option<EventKind>,
    /// Resource label (informational)
    pub model: Option<ResourceModel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Build a fresh record from a validated registration request
    pub fn from_new(new: NewSubscription) -> Result<Self, String> {
        let endpoint_url = new.endpoint_url.unwrap_or_default().trim().to_string();
        validate_endpoint_url(&endpoint_url)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            endpoint_url,
            active: new.active.unwrap_or(true),
            event_type: new.event_type,
            model: new.model,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merge the supplied fields of a patch into this record.
    ///
    /// The record is left untouched if any supplied field is invalid.
    pub fn apply(&mut self, patch: SubscriptionPatch) -> Result<(), String> {
        if let Some(url) = &patch.endpoint_url {
            validate_endpoint_url(url)?;
        }

        if let Some(url) = patch.endpoint_url {
            self.endpoint_url = url.trim().to_string();
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(event_type) = patch.event_type {
            self.event_type = Some(event_type);
        }
        if let Some(model) = patch.model {
            self.model = Some(model);
        }

        // Clock skew must not move updated_at behind created_at
        self.updated_at = Utc::now().max(self.created_at);
        Ok(())
    }
}

/// Registration request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSubscription {
    /// Optional so that a missing field is reported as a validation error
    pub endpoint_url: Option<String>,
    pub active: Option<bool>,
    pub event_type: Option<EventKind>,
    pub model: Option<ResourceModel>,
}

impl NewSubscription {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: Some(endpoint_url.into()),
            ..Default::default()
        }
    }
}

/// Partial update body; absent fields are left as they are
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionPatch {
    pub endpoint_url: Option<String>,
    pub active: Option<bool>,
    pub event_type: Option<EventKind>,
    pub model: Option<ResourceModel>,
}

/// Check that a value is an absolute http(s) URL with a host
pub fn validate_endpoint_url(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("endpoint_url is required".to_string());
    }

    let url = Url::parse(trimmed).map_err(|e| format!("endpoint_url is not a valid URL: {}", e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "endpoint_url must use http or https, got '{}'",
            url.scheme()
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("endpoint_url must include a host".to_string());
    }

    Ok(())
}
