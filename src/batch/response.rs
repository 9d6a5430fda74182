//! Multipart `$batch` response parsing
//!
//! Splits the reply by its declared boundary, unwraps nested changeset
//! parts, and extracts per-part HTTP status, Content-ID, ETag and the OData
//! error payload of rejected changesets.

use crate::error::{Error, Result};

/// One application/http part of the batch reply.
#[derive(Debug, Clone)]
pub(crate) struct BatchPart {
    pub content_id: Option<u32>,
    pub status: u16,
    pub etag: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Parse the whole multipart reply. The boundary comes from the response's
/// Content-Type header.
pub(crate) fn parse_batch_response(content_type: &str, body: &str) -> Result<Vec<BatchPart>> {
    let boundary = boundary_from(content_type).ok_or_else(|| {
        Error::Transport(format!(
            "batch response content type {content_type:?} declares no boundary"
        ))
    })?;

    let mut parts = Vec::new();
    for segment in split_multipart(body, &boundary) {
        collect_parts(segment, &mut parts)?;
    }
    if parts.is_empty() {
        return Err(Error::Transport(
            "batch response contains no parts".to_string(),
        ));
    }
    Ok(parts)
}

fn boundary_from(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .find_map(|param| param.trim().strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').to_string())
}

/// Split a multipart body into its segments, dropping the preamble and the
/// terminal `--` marker.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}");
    let mut segments = Vec::new();

    let Some(start) = body.find(&delimiter) else {
        return segments;
    };
    let mut rest = &body[start + delimiter.len()..];
    loop {
        if rest.starts_with("--") {
            break;
        }
        let segment = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
        match segment.find(&delimiter) {
            Some(end) => {
                segments.push(&segment[..end]);
                rest = &segment[end + delimiter.len()..];
            }
            None => {
                segments.push(segment);
                break;
            }
        }
    }
    segments
}

/// Recurse into nested changeset multiparts, collecting the leaf
/// application/http parts.
fn collect_parts(segment: &str, out: &mut Vec<BatchPart>) -> Result<()> {
    let (header_block, content) = split_blank(segment);
    let mime_headers = parse_header_lines(header_block.lines());

    if let Some(content_type) = header_get(&mime_headers, "content-type") {
        if content_type.to_ascii_lowercase().contains("multipart/mixed") {
            let inner = boundary_from(content_type).ok_or_else(|| {
                Error::Transport("changeset part declares no boundary".to_string())
            })?;
            for nested in split_multipart(content, &inner) {
                collect_parts(nested, out)?;
            }
            return Ok(());
        }
    }

    out.push(parse_http_part(&mime_headers, content)?);
    Ok(())
}

/// Parse one embedded HTTP response message.
fn parse_http_part(mime_headers: &[(String, String)], content: &str) -> Result<BatchPart> {
    let (head, body) = split_blank(content);
    let mut lines = head.lines();

    let status_line = lines.next().unwrap_or("");
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            Error::Transport(format!(
                "malformed status line in batch part: {status_line:?}"
            ))
        })?;

    let http_headers = parse_header_lines(lines);
    // Content-ID may sit on the MIME part or be echoed in the response
    // headers, depending on the server.
    let content_id = header_get(mime_headers, "content-id")
        .or_else(|| header_get(&http_headers, "content-id"))
        .and_then(|v| v.trim().parse().ok());
    let etag = header_get(&http_headers, "etag").map(str::to_string);

    let (error_code, error_message) = if (200..300).contains(&status) {
        (None, None)
    } else {
        parse_error_body(body)
    };

    Ok(BatchPart {
        content_id,
        status,
        etag,
        error_code,
        error_message,
    })
}

/// OData v2 error payload:
/// `{"error":{"code":"…","message":{"lang":"en","value":"…"}}}`.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body.trim()) else {
        return (None, None);
    };
    let Some(error) = json.get("error") else {
        return (None, None);
    };
    let code = error
        .get("code")
        .and_then(|c| c.as_str())
        .map(str::to_string);
    let message = match error.get("message") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(m) => m.get("value").and_then(|v| v.as_str()).map(str::to_string),
        None => None,
    };
    (code, message)
}

fn split_blank(text: &str) -> (&str, &str) {
    let crlf = text.find("\r\n\r\n");
    let lf = text.find("\n\n");
    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => (&text[..l], &text[l + 2..]),
        (Some(c), _) => (&text[..c], &text[c + 4..]),
        (None, Some(l)) => (&text[..l], &text[l + 2..]),
        (None, None) => (text, ""),
    }
}

fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn header_get<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = "--batchresponse_77a8\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_1f3e\r\n\r\n\
--changesetresponse_1f3e\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: 1\r\n\r\n\
HTTP/1.1 204 No Content\r\n\
ETag: W/\"v2\"\r\n\r\n\
\r\n\
--changesetresponse_1f3e--\r\n\
--batchresponse_77a8\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_9c41\r\n\r\n\
--changesetresponse_9c41\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: 2\r\n\r\n\
HTTP/1.1 412 Precondition Failed\r\n\
Content-Type: application/json\r\n\r\n\
{\"error\":{\"code\":\"PRECONDITION_FAILED\",\"message\":{\"lang\":\"en\",\"value\":\"ETag mismatch\"}}}\r\n\
--changesetresponse_9c41--\r\n\
--batchresponse_77a8--\r\n";

    #[test]
    fn test_parse_mixed_outcome_response() {
        let parts = parse_batch_response(
            "multipart/mixed; boundary=batchresponse_77a8",
            SAMPLE_RESPONSE,
        )
        .unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].content_id, Some(1));
        assert_eq!(parts[0].status, 204);
        assert_eq!(parts[0].etag.as_deref(), Some("W/\"v2\""));
        assert!(parts[0].error_code.is_none());

        assert_eq!(parts[1].content_id, Some(2));
        assert_eq!(parts[1].status, 412);
        assert_eq!(parts[1].error_code.as_deref(), Some("PRECONDITION_FAILED"));
        assert_eq!(parts[1].error_message.as_deref(), Some("ETag mismatch"));
    }

    #[test]
    fn test_missing_boundary_is_transport_error() {
        let err = parse_batch_response("multipart/mixed", SAMPLE_RESPONSE).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_unsplittable_body_is_transport_error() {
        let err =
            parse_batch_response("multipart/mixed; boundary=nope", "garbage").unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_boundary_with_quotes() {
        assert_eq!(
            boundary_from("multipart/mixed; boundary=\"abc\""),
            Some("abc".to_string())
        );
    }
}
