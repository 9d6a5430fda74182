//! Batch update engine
//!
//! Diffs a set of change-tracked entities, assembles one multipart `$batch`
//! request for the dirty subset, and correlates the per-part reply statuses
//! back to the submitted entities. Partial failure is a normal outcome
//! reported through [`BatchResult`], not an error: successful changesets
//! are committed, rejected ones keep their dirty state.

pub mod request;
pub mod response;
pub mod result;

pub use result::{BatchOutcome, BatchResult};

use crate::entity::EntityProxy;
use crate::error::{Error, Result};
use crate::session::Session;

/// Send every dirty entity's changes to the service in one round-trip.
///
/// Entities with an empty dirty set are skipped; when nothing is dirty no
/// request is issued at all. All dirty entities must belong to the same
/// service. The call itself fails only when the transport cannot be
/// reached or the reply cannot be parsed, in which case no entity state
/// changes; individual rejections are reported per entity in the returned
/// [`BatchResult`].
pub fn update_many(session: &mut Session, entities: &mut [EntityProxy]) -> Result<BatchResult> {
    let dirty: Vec<usize> = entities
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_dirty())
        .map(|(i, _)| i)
        .collect();
    if dirty.is_empty() {
        log::debug!("update_many: no dirty entities, nothing to send");
        return Ok(BatchResult::empty());
    }

    let endpoint = entities[dirty[0]].service().endpoint.clone();
    for &index in &dirty[1..] {
        if entities[index].service().endpoint != endpoint {
            return Err(Error::Validation(
                "all entities in a batch must belong to the same service".to_string(),
            ));
        }
    }

    let mut items = Vec::with_capacity(dirty.len());
    for (position, &index) in dirty.iter().enumerate() {
        let entity = &entities[index];
        items.push(request::ChangesetItem {
            entity_index: index,
            content_id: (position + 1) as u32,
            resource_path: entity.resource_path()?,
            if_match: entity.etag().map(str::to_string),
            payload: entity.dirty_payload(),
        });
    }

    let batch = request::build_batch_request(&items);
    log::info!(
        "submitting batch with {} changesets to {endpoint}/$batch",
        items.len()
    );
    let response = session.post(
        &format!("{endpoint}/$batch"),
        &format!("{endpoint}/"),
        &batch.content_type(),
        &batch.body,
    )?;
    if !response.is_success() {
        return Err(Error::Transport(format!(
            "batch request failed with HTTP {}",
            response.status
        )));
    }

    let content_type = response.header("content-type").ok_or_else(|| {
        Error::Transport("batch response carries no content type".to_string())
    })?;
    let parts = response::parse_batch_response(content_type, &response.body)?;

    let mut result = BatchResult::empty();
    for (position, part) in parts.iter().enumerate() {
        let item = part
            .content_id
            .and_then(|cid| items.iter().find(|item| item.content_id == cid))
            .or_else(|| items.get(position));
        let Some(item) = item else {
            log::warn!("batch response part {position} matches no submitted changeset");
            continue;
        };

        if (200..300).contains(&part.status) {
            entities[item.entity_index].commit(part.etag.clone());
            result.push(BatchOutcome::success(
                item.entity_index,
                item.content_id,
                part.status,
            ));
        } else {
            log::warn!(
                "changeset {} rejected with HTTP {} ({})",
                item.content_id,
                part.status,
                part.error_code.as_deref().unwrap_or("no error code")
            );
            result.push(BatchOutcome::failure(
                item.entity_index,
                item.content_id,
                part.status,
                part.error_code.clone(),
                part.error_message.clone(),
            ));
        }
    }

    result.sort_by_index();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{account_proxy, mock_session};

    /// Assemble a plausible server reply: one changeset response per entry
    /// of `(content_id, status)`.
    fn batch_reply(parts: &[(u32, u16)]) -> (Vec<(&'static str, String)>, String) {
        let boundary = "batchresponse_test";
        let mut body = String::new();
        for (content_id, status) in parts {
            let inner = format!("changesetresponse_{content_id}");
            body.push_str(&format!("--{boundary}\r\n"));
            body.push_str(&format!(
                "Content-Type: multipart/mixed; boundary={inner}\r\n\r\n"
            ));
            body.push_str(&format!("--{inner}\r\n"));
            body.push_str("Content-Type: application/http\r\n");
            body.push_str(&format!("Content-ID: {content_id}\r\n\r\n"));
            if (200..300).contains(status) {
                body.push_str(&format!("HTTP/1.1 {status} No Content\r\n"));
                body.push_str(&format!("ETag: W/\"{content_id}-v2\"\r\n\r\n\r\n"));
            } else {
                body.push_str(&format!("HTTP/1.1 {status} Rejected\r\n"));
                body.push_str("Content-Type: application/json\r\n\r\n");
                body.push_str(
                    "{\"error\":{\"code\":\"PRECONDITION_FAILED\",\
                     \"message\":{\"lang\":\"en\",\"value\":\"ETag mismatch\"}}}\r\n",
                );
            }
            body.push_str(&format!("--{inner}--\r\n"));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        let headers = vec![(
            "Content-Type",
            format!("multipart/mixed; boundary={boundary}"),
        )];
        (headers, body)
    }

    #[test]
    fn test_all_clean_issues_no_request() {
        let (mut session, mock) = mock_session();
        let mut entities = vec![account_proxy("A1"), account_proxy("A2")];

        let result = update_many(&mut session, &mut entities).unwrap();
        assert!(result.is_empty());
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_one_batch_with_one_changeset_per_dirty_entity() {
        let (mut session, mock) = mock_session();
        let mut entities = vec![
            account_proxy("A1"),
            account_proxy("A2"),
            account_proxy("A3"),
        ];
        for entity in &mut entities {
            entity.set("LifeCycleStatusCode", "2").unwrap();
        }

        mock.push_response(200, &[("x-csrf-token", "tok")], "");
        let (headers, body) = batch_reply(&[(1, 204), (2, 204), (3, 204)]);
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        mock.push_response(202, &header_refs, &body);

        let result = update_many(&mut session, &mut entities).unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.all_succeeded());

        // One token fetch, one batch POST
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let post = &requests[1];
        assert_eq!(post.method, "POST");
        assert!(post.url.ends_with("/sap/c4c/odata/v1/c4codataapi/$batch"));

        let batch_body = post.body.as_deref().unwrap();
        assert_eq!(batch_body.matches("PATCH ").count(), 3);
        assert_eq!(
            batch_body.matches("{\"LifeCycleStatusCode\":\"2\"}").count(),
            3
        );
        // The untouched snapshot fields never travel
        assert!(!batch_body.contains("\"Name\""));
        // Captured ETags become If-Match preconditions
        assert_eq!(batch_body.matches("If-Match: W/\"A1-v1\"").count(), 1);

        for entity in &entities {
            assert!(!entity.is_dirty());
        }
        // Committed entities adopt the ETag the server returned
        assert_eq!(entities[0].etag(), Some("W/\"1-v2\""));
    }

    #[test]
    fn test_partial_failure_keeps_rejected_entity_dirty() {
        let (mut session, mock) = mock_session();
        let mut entities = vec![
            account_proxy("A1"),
            account_proxy("A2"),
            account_proxy("A3"),
        ];
        for entity in &mut entities {
            entity.set("LifeCycleStatusCode", "2").unwrap();
        }

        mock.push_response(200, &[("x-csrf-token", "tok")], "");
        let (headers, body) = batch_reply(&[(1, 204), (2, 412), (3, 204)]);
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        mock.push_response(202, &header_refs, &body);

        let result = update_many(&mut session, &mut entities).unwrap();
        assert_eq!(result.len(), 3);
        assert!(!result.all_succeeded());
        assert_eq!(result.failed().count(), 1);

        assert!(!entities[0].is_dirty());
        assert!(entities[1].is_dirty());
        assert!(!entities[2].is_dirty());

        let failure = result.outcome_for(1).unwrap();
        assert_eq!(failure.status_code, 412);
        assert_eq!(failure.error_code.as_deref(), Some("PRECONDITION_FAILED"));
        assert_eq!(failure.error_message.as_deref(), Some("ETag mismatch"));
        // The rejected entity keeps its fetch-time ETag
        assert_eq!(entities[1].etag(), Some("W/\"A2-v1\""));
    }

    #[test]
    fn test_clean_entities_are_skipped() {
        let (mut session, mock) = mock_session();
        let mut entities = vec![
            account_proxy("A1"),
            account_proxy("A2"),
            account_proxy("A3"),
        ];
        entities[1].set("LifeCycleStatusCode", "2").unwrap();

        mock.push_response(200, &[("x-csrf-token", "tok")], "");
        let (headers, body) = batch_reply(&[(1, 204)]);
        let header_refs: Vec<(&str, &str)> =
            headers.iter().map(|(n, v)| (*n, v.as_str())).collect();
        mock.push_response(202, &header_refs, &body);

        let result = update_many(&mut session, &mut entities).unwrap();
        assert_eq!(result.len(), 1);
        // The single outcome correlates to the dirty entity's index
        assert_eq!(result.outcomes()[0].index, 1);
        assert!(!entities[1].is_dirty());

        let batch_body = mock.requests()[1].body.clone().unwrap();
        assert_eq!(batch_body.matches("PATCH ").count(), 1);
        assert!(batch_body.contains("CorporateAccountCollection('A2')"));
    }

    #[test]
    fn test_transport_failure_changes_nothing() {
        let (mut session, mock) = mock_session();
        let mut entities = vec![account_proxy("A1")];
        entities[0].set("LifeCycleStatusCode", "2").unwrap();

        mock.push_response(200, &[("x-csrf-token", "tok")], "");
        mock.push_transport_error("connection refused");

        let err = update_many(&mut session, &mut entities).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(entities[0].is_dirty());
        assert_eq!(entities[0].etag(), Some("W/\"A1-v1\""));
    }

    #[test]
    fn test_mixed_services_rejected() {
        use crate::metadata::ServiceDescriptor;
        use crate::metadata::models::DEFAULT_MAX_PAGE_SIZE;
        use std::sync::Arc;

        let (mut session, mock) = mock_session();

        let other = Arc::new(ServiceDescriptor {
            name: "other".to_string(),
            endpoint: "/sap/c4c/odata/v1/otherapi".to_string(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        });
        let other_schema = crate::metadata::parser::parse_service_metadata(
            crate::testutil::SAMPLE_EDMX,
            &other,
        )
        .unwrap()
        .into_iter()
        .find(|s| s.entity_set == "CorporateAccountCollection")
        .unwrap();
        let record = serde_json::json!({ "ObjectID": "B1", "LifeCycleStatusCode": "1" });
        let mut foreign =
            crate::entity::EntityProxy::from_record(other_schema, record.as_object().unwrap());
        foreign.set("LifeCycleStatusCode", "2").unwrap();

        let mut local = account_proxy("A1");
        local.set("LifeCycleStatusCode", "2").unwrap();

        let mut entities = vec![local, foreign];
        let err = update_many(&mut session, &mut entities).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(mock.request_count(), 0);
        assert!(entities[0].is_dirty());
        assert!(entities[1].is_dirty());
    }
}
