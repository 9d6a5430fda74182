//! Multipart `$batch` request assembly
//!
//! One changeset per mutated entity: a PATCH against the key-addressed
//! entity URL carrying only the dirty properties, tagged with a Content-ID
//! for correlation and an `If-Match` precondition when an ETag was captured
//! at fetch time.

use uuid::Uuid;

/// One changeset of a batch, pre-rendered from a dirty entity.
#[derive(Debug, Clone)]
pub(crate) struct ChangesetItem {
    /// Index of the entity in the slice passed to `update_many`.
    pub entity_index: usize,
    /// 1-based position among the dirty entities, used as Content-ID.
    pub content_id: u32,
    /// Key-addressed resource path below the host.
    pub resource_path: String,
    /// ETag for the `If-Match` precondition.
    pub if_match: Option<String>,
    /// JSON object with exactly the dirty properties.
    pub payload: serde_json::Value,
}

/// A fully assembled multipart batch body.
#[derive(Debug)]
pub(crate) struct BatchRequest {
    pub boundary: String,
    pub body: String,
}

impl BatchRequest {
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }
}

/// Render the multipart body, one changeset per item.
pub(crate) fn build_batch_request(items: &[ChangesetItem]) -> BatchRequest {
    let boundary = format!("batch_{}", Uuid::new_v4());
    let mut body = String::new();

    for item in items {
        let changeset = format!("changeset_{}", Uuid::new_v4());
        let payload = item.payload.to_string();

        body.push_str(&format!("--{boundary}\r\n"));
        body.push_str(&format!(
            "Content-Type: multipart/mixed; boundary={changeset}\r\n\r\n"
        ));

        body.push_str(&format!("--{changeset}\r\n"));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str("Content-Transfer-Encoding: binary\r\n");
        body.push_str(&format!("Content-ID: {}\r\n\r\n", item.content_id));

        body.push_str(&format!("PATCH {} HTTP/1.1\r\n", item.resource_path));
        body.push_str("Content-Type: application/json\r\n");
        if let Some(etag) = &item.if_match {
            body.push_str(&format!("If-Match: {etag}\r\n"));
        }
        body.push_str(&format!("Content-Length: {}\r\n\r\n", payload.len()));
        body.push_str(&payload);
        body.push_str("\r\n");
        body.push_str(&format!("--{changeset}--\r\n"));
    }

    body.push_str(&format!("--{boundary}--\r\n"));
    BatchRequest { boundary, body }
}
