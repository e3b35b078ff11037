//! Multipart/form-data body parser.
//!
//! Splits a fully staged body on its boundary delimiter and reads each
//! part's content-disposition headers. Binary payloads pass through
//! untouched; only part headers are required to be UTF-8.

use crate::error::UploadError;

/// One parsed body part. `file_name` present means a file part.
#[derive(Debug)]
pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Parse a complete multipart body against its boundary.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>, UploadError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut parts = Vec::new();

    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| UploadError::Malformed("boundary not found".to_string()))?;

    loop {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            // Closing delimiter.
            break;
        }
        let start = if body[after..].starts_with(b"\r\n") {
            after + 2
        } else if body[after..].starts_with(b"\n") {
            after + 1
        } else {
            return Err(UploadError::Malformed(
                "garbage after boundary delimiter".to_string(),
            ));
        };

        let next = find(body, &delimiter, start)
            .ok_or_else(|| UploadError::Malformed("unterminated part".to_string()))?;

        // The part's trailing CRLF belongs to the delimiter, not the data.
        let mut end = next;
        if end >= start + 2 && &body[end - 2..end] == b"\r\n" {
            end -= 2;
        } else if end >= start + 1 && body[end - 1] == b'\n' {
            end -= 1;
        }

        parts.push(parse_part(&body[start..end])?);
        pos = next;
    }

    Ok(parts)
}

fn parse_part(raw: &[u8]) -> Result<Part, UploadError> {
    let header_end = find(raw, b"\r\n\r\n", 0)
        .map(|i| (i, i + 4))
        .or_else(|| find(raw, b"\n\n", 0).map(|i| (i, i + 2)))
        .ok_or_else(|| UploadError::Malformed("part without header block".to_string()))?;

    let headers = std::str::from_utf8(&raw[..header_end.0])
        .map_err(|_| UploadError::Malformed("part headers are not UTF-8".to_string()))?;
    let data = raw[header_end.1..].to_vec();

    let mut name = None;
    let mut file_name = None;
    let mut content_type = None;

    for line in headers.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("content-disposition:") {
            name = header_param(line, "name");
            file_name = header_param(line, "filename");
        } else if lower.starts_with("content-type:") {
            content_type = line.split_once(':').map(|(_, v)| v.trim().to_string());
        }
    }

    let name = name.ok_or_else(|| {
        UploadError::Malformed("content-disposition missing field name".to_string())
    })?;

    Ok(Part {
        name,
        file_name,
        content_type,
        data,
    })
}

/// Extract a quoted `key="value"` parameter from a header line.
fn header_param(line: &str, key: &str) -> Option<String> {
    let marker = format!("{key}=\"");
    let start = line.find(&marker)? + marker.len();
    let end = line[start..].find('"')? + start;
    Some(line[start..end].to_string())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: &str = "----vestibule";

    fn body(parts: &str) -> Vec<u8> {
        format!("{parts}--{B}--\r\n").into_bytes()
    }

    #[test]
    fn test_single_field() {
        let raw = body(&format!(
            "--{B}\r\nContent-Disposition: form-data; name=\"city\"\r\n\r\nBratislava\r\n"
        ));
        let parts = parse_multipart(&raw, B).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "city");
        assert!(parts[0].file_name.is_none());
        assert_eq!(parts[0].data, b"Bratislava");
    }

    #[test]
    fn test_file_part_keeps_binary_payload() {
        let raw = body(&format!(
            "--{B}\r\nContent-Disposition: form-data; name=\"img\"; filename=\"p.bin\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\x00\x01\x02\r\n"
        ));
        let parts = parse_multipart(&raw, B).unwrap();
        assert_eq!(parts[0].file_name.as_deref(), Some("p.bin"));
        assert_eq!(
            parts[0].content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(parts[0].data, b"\x00\x01\x02");
    }

    #[test]
    fn test_mixed_fields_and_files() {
        let raw = body(&format!(
            "--{B}\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n\
             --{B}\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x\"\r\n\r\nXX\r\n\
             --{B}\r\nContent-Disposition: form-data; name=\"b\"\r\n\r\n2\r\n"
        ));
        let parts = parse_multipart(&raw, B).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].file_name.as_deref(), Some("x"));
    }

    #[test]
    fn test_missing_boundary_is_malformed() {
        let err = parse_multipart(b"no delimiters here", B).unwrap_err();
        assert!(matches!(err, UploadError::Malformed(_)));
    }

    #[test]
    fn test_unterminated_part_is_malformed() {
        let raw = format!("--{B}\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1");
        let err = parse_multipart(raw.as_bytes(), B).unwrap_err();
        assert!(matches!(err, UploadError::Malformed(_)));
    }

    #[test]
    fn test_part_without_name_is_malformed() {
        let raw = body(&format!("--{B}\r\nContent-Type: text/plain\r\n\r\nx\r\n"));
        let err = parse_multipart(&raw, B).unwrap_err();
        assert!(matches!(err, UploadError::Malformed(_)));
    }
}
