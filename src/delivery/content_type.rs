//! Content types derived from file extensions.

/// Content type for a file extension (without the dot).
pub fn from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "xml" => "text/xml",
        "rtf" => "application/rtf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Textual types worth compressing.
pub fn is_compressible(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "js" | "css" | "txt" | "xml" | "html" | "htm" | "rtf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(from_extension("html"), "text/html");
        assert_eq!(from_extension("JS"), "text/javascript");
        assert_eq!(from_extension("unknown"), "application/octet-stream");
    }

    #[test]
    fn test_compressible_set() {
        for ext in ["js", "css", "txt", "xml", "html", "htm", "rtf"] {
            assert!(is_compressible(ext), "{ext} should compress");
        }
        for ext in ["png", "zip", "mp4", "json"] {
            assert!(!is_compressible(ext), "{ext} should not compress");
        }
    }
}
