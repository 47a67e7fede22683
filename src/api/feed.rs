//! Feed service.

use std::sync::Arc;

use serde::de::IgnoredAny;
use serde::Serialize;

use crate::client::ClientInner;
use crate::models::{AccountId, FeedItem, NewFeedItem};
use crate::Result;

/// Service for posting items to the user's feed.
pub struct FeedService {
    inner: Arc<ClientInner>,
}

#[derive(Serialize)]
struct FeedForm<'a> {
    account_id: &'a str,
    #[serde(rename = "type")]
    item_type: &'static str,
    #[serde(rename = "params[title]")]
    title: &'a str,
    #[serde(rename = "params[body]")]
    body: &'a str,
    #[serde(rename = "params[image_url]")]
    image_url: Option<&'a str>,
    #[serde(rename = "params[action_url]")]
    action_url: Option<&'a str>,
}

impl FeedService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Post a basic feed item.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use monzo_rs::models::{AccountId, NewFeedItem};
    ///
    /// # fn example(client: monzo_rs::MonzoClient) -> monzo_rs::Result<()> {
    /// let account = AccountId::new("acc_00009237aqC8c5umZmrRdh");
    /// client.feed().create(&account, &NewFeedItem::new("Hello", "From Rust"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create(&self, account_id: &AccountId, item: &NewFeedItem) -> Result<FeedItem> {
        let form = FeedForm {
            account_id: account_id.as_str(),
            item_type: "basic",
            title: &item.title,
            body: &item.body,
            image_url: item.image_url.as_deref(),
            action_url: item.action_url.as_deref(),
        };
        self.inner.post_form::<IgnoredAny, _>("/feed", &form)?;

        Ok(FeedItem {
            id: None,
            account_id: account_id.clone(),
            title: item.title.clone(),
            body: item.body.clone(),
            image_url: item.image_url.clone(),
            action_url: item.action_url.clone(),
        })
    }
}
