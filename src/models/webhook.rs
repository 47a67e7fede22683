//! Webhook and feed item models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::primitives::{AccountId, WebhookId};

/// A registered webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    /// Webhook id
    pub id: WebhookId,
    /// Account whose events are delivered
    pub account_id: AccountId,
    /// Delivery URL
    pub url: String,
    /// Event type filter, if any
    #[serde(rename = "type", default)]
    pub webhook_type: Option<String>,
    /// When the webhook was registered
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// A basic feed item to show in the Monzo app.
///
/// ```
/// use monzo_rs::models::NewFeedItem;
///
/// let item = NewFeedItem::new("Budget alert", "You spent £20 on coffee this week")
///     .with_image_url("https://example.com/coffee.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedItem {
    /// Item title
    pub title: String,
    /// Item body text
    pub body: String,
    /// Icon shown next to the item
    pub image_url: Option<String>,
    /// URL opened when the item is tapped
    pub action_url: Option<String>,
}

impl NewFeedItem {
    /// An item with a title and body.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            image_url: None,
            action_url: None,
        }
    }

    /// Set the icon URL.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Set the tap target.
    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

/// A feed item that was accepted by the API.
///
/// The feed endpoint does not return the created item, so `id` is always
/// `None` and the other fields echo what was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Server-side id, not returned by the API
    #[serde(default)]
    pub id: Option<String>,
    /// Account the item was posted to
    pub account_id: AccountId,
    /// Item title
    pub title: String,
    /// Item body text
    pub body: String,
    /// Icon URL
    #[serde(default)]
    pub image_url: Option<String>,
    /// Tap target
    #[serde(default)]
    pub action_url: Option<String>,
}
