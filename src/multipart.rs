//! Multipart/form-data body parser.
//!
//! A small hand-rolled decoder for `multipart/form-data` request bodies,
//! written as an explicit state machine over byte slices. The whole body is
//! materialized in memory before parsing begins; that keeps the code simple
//! and is acceptable for the payload sizes handled here (one document plus
//! a few small form fields), but it is not a streaming parser and should not
//! be reused where large uploads are expected.

use thiserror::Error;

/// A single decoded part of a multipart body.
///
/// Parts are transient: they live only for the duration of one upload
/// request's parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Value of the `name="…"` attribute in the part's headers.
    pub name: String,
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// Value of the `filename="…"` attribute, if present.
    pub filename: Option<String>,
}

/// Errors produced while decoding a multipart body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// The boundary token could not be extracted from the content-type header.
    #[error("no multipart boundary found in content-type header")]
    MissingBoundary,
    /// The body does not contain the expected boundary delimiters.
    #[error("malformed multipart body: boundary delimiters not found")]
    MalformedBody,
}

/// Extract the boundary token from a `Content-Type` header value.
///
/// The token is the substring following `boundary=`, trimmed of surrounding
/// quotes and any trailing parameters.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let raw = content_type
        .split_once("boundary=")
        .map(|(_, rest)| rest)
        .ok_or(MultipartError::MissingBoundary)?;
    let token = raw
        .split(';')
        .next()
        .unwrap_or(raw)
        .trim()
        .trim_matches('"');
    if token.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }
    Ok(token.to_string())
}

/// Parser states. One part is consumed per
/// `ReadingHeaders` → `ReadingPayload` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingBoundary,
    ReadingHeaders,
    ReadingPayload,
    Done,
}

/// Decode a complete multipart body into its parts.
///
/// The part stream is the content strictly between the first `--{boundary}`
/// and the final `--{boundary}--`; interior parts are delimited by
/// `\r\n--{boundary}\r\n`. Parts are returned in stream order.
///
/// Two kinds of malformed parts are tolerated rather than fatal: a part
/// with no blank-line header/payload separator is skipped, and a part whose
/// headers carry no `name` attribute is dropped.
///
/// # Errors
///
/// `MalformedBody` when either boundary delimiter is missing from the body;
/// `MissingBoundary` when the boundary token itself is empty.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>, MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }

    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");
    let separator = format!("\r\n--{boundary}\r\n");

    let open_at = find(body, open.as_bytes(), 0).ok_or(MultipartError::MalformedBody)?;
    let close_at = rfind(body, close.as_bytes()).ok_or(MultipartError::MalformedBody)?;

    // The part stream sits strictly between the delimiters. A degenerate
    // body whose only delimiter is the closing one yields an empty stream
    // and therefore an empty part list, not an error.
    let start = open_at + open.len();
    let stream = body.get(start..close_at).unwrap_or(&[]);

    let mut parts = Vec::new();
    let mut state = State::SeekingBoundary;
    let mut cursor = 0usize; // scan position within `stream`
    let mut seg_end = 0usize; // end of the current part's raw bytes
    let mut header_end = 0usize; // offset of the current part's blank line
    let mut last = false; // current part is the final segment

    while state != State::Done {
        match state {
            State::SeekingBoundary => {
                if cursor >= stream.len() {
                    state = State::Done;
                } else {
                    (seg_end, last) = match find(stream, separator.as_bytes(), cursor) {
                        Some(at) => (at, false),
                        None => (stream.len(), true),
                    };
                    state = State::ReadingHeaders;
                }
            }
            State::ReadingHeaders => match find(&stream[..seg_end], b"\r\n\r\n", cursor) {
                Some(at) => {
                    header_end = at;
                    state = State::ReadingPayload;
                }
                None => {
                    // No header/payload separator: skip this part entirely.
                    cursor = seg_end.saturating_add(separator.len());
                    state = if last { State::Done } else { State::SeekingBoundary };
                }
            },
            State::ReadingPayload => {
                let headers = String::from_utf8_lossy(&stream[cursor..header_end]);
                let mut payload = &stream[header_end + 4..seg_end];
                if last {
                    // The CRLF before the closing delimiter belongs to the
                    // delimiter line, not to the final part's payload.
                    payload = payload.strip_suffix(b"\r\n").unwrap_or(payload);
                }
                if let Some(name) = header_attr(&headers, "name") {
                    parts.push(Part {
                        name,
                        data: payload.to_vec(),
                        filename: header_attr(&headers, "filename"),
                    });
                }
                cursor = seg_end.saturating_add(separator.len());
                state = if last { State::Done } else { State::SeekingBoundary };
            }
            State::Done => {}
        }
    }

    Ok(parts)
}

/// Extract a quoted attribute value (`key="…"`) from a part's header block.
///
/// First match wins. The preceding-character check keeps a `filename=`
/// attribute from satisfying a lookup for `name=`. No header continuations
/// and no backslash escaping; browsers emit neither for form-data parts.
fn header_attr(headers: &str, key: &str) -> Option<String> {
    let pattern = format!("{key}=\"");
    let mut from = 0;
    while let Some(rel) = headers[from..].find(&pattern) {
        let at = from + rel;
        let value_start = at + pattern.len();
        if at == 0 || !headers.as_bytes()[at - 1].is_ascii_alphanumeric() {
            let rest = &headers[value_start..];
            let end = rest.find('"')?;
            return Some(rest[..end].to_string());
        }
        from = value_start;
    }
    None
}

/// Position of the first occurrence of `needle` in `haystack` at or after `from`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < from + needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Position of the last occurrence of `needle` in `haystack`.
fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----FormBoundaryXyz42";

    /// Encode parts the way a browser would, so parse output can be
    /// compared against the exact input bytes.
    fn encode(parts: &[(&str, Option<&str>, &[u8])], boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, filename, data) in parts {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            let disposition = match filename {
                Some(f) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        out
    }

    #[test]
    fn test_round_trip_preserves_names_bytes_and_order() {
        let binary = [0_u8, 159, 146, 150, 13, 10, 0];
        let input: &[(&str, Option<&str>, &[u8])] = &[
            ("pdf", Some("report.pdf"), &binary),
            ("customPrompt", None, b"Answer tersely."),
            ("note", None, b""),
        ];
        let body = encode(input, BOUNDARY);

        let parts = parse_multipart(&body, BOUNDARY).unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].name, "pdf");
        assert_eq!(parts[0].filename.as_deref(), Some("report.pdf"));
        assert_eq!(parts[0].data, binary);
        assert_eq!(parts[1].name, "customPrompt");
        assert_eq!(parts[1].filename, None);
        assert_eq!(parts[1].data, b"Answer tersely.");
        assert_eq!(parts[2].name, "note");
        assert!(parts[2].data.is_empty());
    }

    #[test]
    fn test_single_part_round_trip() {
        let body = encode(&[("pdf", Some("a.pdf"), b"%PDF-1.4 content")], BOUNDARY);
        let parts = parse_multipart(&body, BOUNDARY).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].data, b"%PDF-1.4 content");
    }

    #[test]
    fn test_missing_delimiter_is_malformed() {
        let err = parse_multipart(b"no delimiters here at all", BOUNDARY).unwrap_err();
        assert_eq!(err, MultipartError::MalformedBody);
    }

    #[test]
    fn test_missing_closing_delimiter_is_malformed() {
        let mut body = encode(&[("pdf", None, b"data")], BOUNDARY);
        let close = format!("--{BOUNDARY}--");
        let at = body
            .windows(close.len())
            .rposition(|w| w == close.as_bytes())
            .unwrap();
        body.truncate(at);
        let err = parse_multipart(&body, BOUNDARY).unwrap_err();
        assert_eq!(err, MultipartError::MalformedBody);
    }

    #[test]
    fn test_part_without_name_is_dropped() {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; filename=\"orphan.bin\"\r\n\
             \r\n\
             payload\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"kept\"\r\n\
             \r\n\
             value\r\n\
             --{BOUNDARY}--\r\n"
        );
        let parts = parse_multipart(body.as_bytes(), BOUNDARY).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "kept");
    }

    #[test]
    fn test_part_without_header_separator_is_skipped() {
        // First part has headers but no blank line before the next boundary.
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"broken\"\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"ok\"\r\n\
             \r\n\
             fine\r\n\
             --{BOUNDARY}--\r\n"
        );
        let parts = parse_multipart(body.as_bytes(), BOUNDARY).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "ok");
        assert_eq!(parts[0].data, b"fine");
    }

    #[test]
    fn test_empty_stream_yields_no_parts() {
        let body = format!("--{BOUNDARY}--\r\n");
        let parts = parse_multipart(body.as_bytes(), BOUNDARY).unwrap();
        assert!(parts.is_empty());
    }

    #[test]
    fn test_boundary_from_content_type() {
        let ct = "multipart/form-data; boundary=----FormBoundaryXyz42";
        assert_eq!(
            boundary_from_content_type(ct).unwrap(),
            "----FormBoundaryXyz42"
        );
    }

    #[test]
    fn test_boundary_quoted_and_with_trailing_params() {
        let ct = "multipart/form-data; boundary=\"abc\"; charset=utf-8";
        assert_eq!(boundary_from_content_type(ct).unwrap(), "abc");
    }

    #[test]
    fn test_boundary_missing_from_content_type() {
        let err = boundary_from_content_type("application/json").unwrap_err();
        assert_eq!(err, MultipartError::MissingBoundary);
    }

    #[test]
    fn test_header_attr_does_not_match_inside_filename() {
        let headers = "Content-Disposition: form-data; filename=\"f.bin\"";
        assert_eq!(header_attr(headers, "name"), None);
        assert_eq!(header_attr(headers, "filename").as_deref(), Some("f.bin"));
    }
}
