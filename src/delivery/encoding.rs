//! Response compression negotiation.
//!
//! # Design Decisions
//! - Deflate is preferred over gzip when the client accepts both; gzip is the
//!   fallback, identity otherwise
//! - Encoders run in memory over the complete body; a failed encode is a
//!   transport fault, not a content fault (the caller tears the connection
//!   down instead of sending a malformed body)

use std::io::{self, Write};

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use hyper::header::ACCEPT_ENCODING;
use hyper::HeaderMap;

/// Negotiated content encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Deflate,
    Gzip,
}

impl Encoding {
    /// Value for the `Content-Encoding` header.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Deflate => "deflate",
            Encoding::Gzip => "gzip",
        }
    }
}

/// Pick an encoding from the request's `Accept-Encoding` header.
pub fn negotiate(headers: &HeaderMap) -> Option<Encoding> {
    let accept = headers
        .get(ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accept.contains("deflate") {
        Some(Encoding::Deflate)
    } else if accept.contains("gzip") {
        Some(Encoding::Gzip)
    } else {
        None
    }
}

/// Compress a complete body with the negotiated encoding.
pub fn compress(data: &[u8], encoding: Encoding) -> io::Result<Vec<u8>> {
    match encoding {
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(accept: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(ACCEPT_ENCODING, HeaderValue::from_str(accept).unwrap());
        map
    }

    #[test]
    fn test_deflate_preferred_over_gzip() {
        assert_eq!(
            negotiate(&headers("gzip, deflate, br")),
            Some(Encoding::Deflate)
        );
        assert_eq!(negotiate(&headers("deflate")), Some(Encoding::Deflate));
    }

    #[test]
    fn test_gzip_fallback() {
        assert_eq!(negotiate(&headers("gzip, br")), Some(Encoding::Gzip));
    }

    #[test]
    fn test_identity_when_nothing_accepted() {
        assert_eq!(negotiate(&headers("br")), None);
        assert_eq!(negotiate(&HeaderMap::new()), None);
    }

    #[test]
    fn test_compress_shrinks_repetitive_body() {
        let body = "abcdef".repeat(200);
        for encoding in [Encoding::Deflate, Encoding::Gzip] {
            let compressed = compress(body.as_bytes(), encoding).unwrap();
            assert!(compressed.len() < body.len());
        }
    }
}
