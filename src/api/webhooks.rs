//! Webhooks service.

use std::sync::Arc;

use serde::Serialize;

use crate::client::ClientInner;
use crate::models::{AccountId, Webhook, WebhookId};
use crate::Result;

/// Service for registering webhooks.
///
/// Payload signatures are not verified by this crate.
pub struct WebhooksService {
    inner: Arc<ClientInner>,
}

#[derive(Serialize)]
struct AccountQuery<'a> {
    account_id: &'a str,
}

#[derive(Serialize)]
struct CreateForm<'a> {
    account_id: &'a str,
    url: &'a str,
}

impl WebhooksService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Register `url` to receive events for an account.
    pub fn create(&self, account_id: &AccountId, url: &str) -> Result<Webhook> {
        #[derive(serde::Deserialize)]
        struct Response {
            webhook: Webhook,
        }
        let response: Response = self.inner.post_form(
            "/webhooks",
            &CreateForm {
                account_id: account_id.as_str(),
                url,
            },
        )?;
        Ok(response.webhook)
    }

    /// List the webhooks of an account.
    pub fn list(&self, account_id: &AccountId) -> Result<Vec<Webhook>> {
        #[derive(serde::Deserialize)]
        struct Response {
            webhooks: Vec<Webhook>,
        }
        let response: Response = self.inner.get_with_query(
            "/webhooks",
            &AccountQuery {
                account_id: account_id.as_str(),
            },
        )?;
        Ok(response.webhooks)
    }

    /// Delete a webhook.
    pub fn delete(&self, webhook_id: &WebhookId) -> Result<()> {
        self.inner.delete(&format!("/webhooks/{webhook_id}"))
    }
}
