//! Attachments service.
//!
//! Attaching a file is three steps: request an upload URL, `PUT` the file
//! there yourself, then register the resulting file URL against a
//! transaction.

use std::sync::Arc;

use serde::Serialize;

use crate::client::ClientInner;
use crate::models::{Attachment, AttachmentId, TransactionId, UploadUrl};
use crate::Result;

/// Service for transaction attachments.
pub struct AttachmentsService {
    inner: Arc<ClientInner>,
}

impl AttachmentsService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Get a pre-signed URL to upload a file of MIME type `file_type`.
    pub fn upload(&self, file_type: &str) -> Result<UploadUrl> {
        #[derive(Serialize)]
        struct Body<'a> {
            file_type: &'a str,
        }
        self.inner
            .post_json("/attachment/upload", &Body { file_type })
    }

    /// Attach an uploaded file to a transaction.
    ///
    /// `external_id` is generated when `None`.
    pub fn register(
        &self,
        transaction_id: &TransactionId,
        file_url: &str,
        file_type: &str,
        external_id: Option<&str>,
    ) -> Result<Attachment> {
        #[derive(Serialize)]
        struct Body<'a> {
            external_id: String,
            file_type: &'a str,
            file_url: &'a str,
            transaction_id: &'a str,
        }
        #[derive(serde::Deserialize)]
        struct Response {
            attachment: Attachment,
        }

        let body = Body {
            external_id: external_id
                .map(String::from)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            file_type,
            file_url,
            transaction_id: transaction_id.as_str(),
        };
        let response: Response = self.inner.post_json("/attachment/register", &body)?;
        Ok(response.attachment)
    }

    /// Remove an attachment from its transaction.
    pub fn detach(&self, attachment_id: &AttachmentId) -> Result<()> {
        #[derive(Serialize)]
        struct Body<'a> {
            id: &'a str,
        }
        self.inner.delete_json(
            "/attachment/detach",
            &Body {
                id: attachment_id.as_str(),
            },
        )
    }
}
