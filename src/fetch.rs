//! Fetch engine
//!
//! Executes a [`Query`] through a [`Session`] and materializes the OData v2
//! JSON envelope into change-tracked [`EntityProxy`] rows.

use std::sync::Arc;

use crate::entity::EntityProxy;
use crate::error::{Error, Result};
use crate::metadata::EntityTypeSchema;
use crate::query::Query;
use crate::session::Session;

impl Query {
    /// Execute the query and return one proxy per matching record, in
    /// server order. Zero matches yield an empty vector, not an error.
    ///
    /// On a 401/403 the session re-authenticates once and the request is
    /// retried once; a second rejection surfaces as
    /// [`Error::Authentication`].
    pub fn fetch(&self, session: &mut Session) -> Result<Vec<EntityProxy>> {
        let path = self.request_path()?;
        log::debug!("GET {}", path);

        let response = session.get(&path)?;
        if !response.is_success() {
            return Err(Error::Transport(format!(
                "fetch of {} failed with HTTP {}",
                self.schema().entity_set,
                response.status
            )));
        }

        let entities = parse_envelope(self.schema_arc(), &response.body)?;
        log::debug!(
            "fetched {} records from {}",
            entities.len(),
            self.schema().entity_set
        );
        Ok(entities)
    }

    /// Entity-set path plus the percent-encoded query string.
    fn request_path(&self) -> Result<String> {
        let params = self.query_params()?;
        let mut path = self.schema().resource_path();
        if !params.is_empty() {
            let encoded: Vec<String> = params
                .iter()
                .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
                .collect();
            path.push('?');
            path.push_str(&encoded.join("&"));
        }
        Ok(path)
    }
}

/// Parse the OData v2 JSON envelope: `{"d":{"results":[…]}}` for
/// collections, `{"d":{…}}` for a single entry.
fn parse_envelope(schema: &Arc<EntityTypeSchema>, body: &str) -> Result<Vec<EntityProxy>> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Transport(format!("malformed response envelope: {e}")))?;
    let d = json.get("d").ok_or_else(|| {
        Error::Transport("response envelope is missing the OData 'd' wrapper".to_string())
    })?;

    let mut entities = Vec::new();
    match d.get("results") {
        Some(results) => {
            let records = results.as_array().ok_or_else(|| {
                Error::Transport("envelope 'results' is not an array".to_string())
            })?;
            for record in records {
                entities.push(proxy_from(schema, record)?);
            }
        }
        None => {
            if d.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
                entities.push(proxy_from(schema, d)?);
            }
        }
    }
    Ok(entities)
}

fn proxy_from(schema: &Arc<EntityTypeSchema>, record: &serde_json::Value) -> Result<EntityProxy> {
    let map = record.as_object().ok_or_else(|| {
        Error::Transport("envelope entry is not a JSON object".to_string())
    })?;
    Ok(EntityProxy::from_record(Arc::clone(schema), map))
}
