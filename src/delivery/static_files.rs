//! Static asset delivery from the public directory.
//!
//! # Responsibilities
//! - Recognize static paths (last segment carries an extension)
//! - Resolve names inside the public directory, refusing traversal
//! - Run script/stylesheet sources through the configured transform hooks,
//!   with a compiled copy cached in the tmp directory
//!
//! # Design Decisions
//! - The transform cache is keyed by the flattened request path; debug mode
//!   bypasses it so edits show up immediately

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use hyper::HeaderMap;

use crate::dispatch::context::ResponseSlot;
use crate::engine::Engine;

/// True when the request path addresses a file rather than a route: the last
/// segment carries an extension.
pub fn is_static_path(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty(),
        None => false,
    }
}

/// Resolve a request path inside the public directory. Returns None for
/// anything that would escape it.
pub fn resolve_public(public_dir: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name.trim_start_matches('/'));
    for component in relative.components() {
        match component {
            Component::Normal(_) => {}
            _ => return None,
        }
    }
    Some(public_dir.join(relative))
}

/// Serve a static asset, applying js/css transforms when configured.
pub async fn serve(engine: &Arc<Engine>, headers: &HeaderMap, path: &str, slot: &ResponseSlot) {
    let config = engine.config();

    let file = match resolve_public(&config.directories.public, path) {
        Some(f) => f,
        None => {
            tracing::warn!(path, "Static path escapes public directory");
            crate::delivery::respond_content(
                slot,
                headers,
                hyper::StatusCode::NOT_FOUND,
                "File not found (404).".to_string(),
                "text/plain",
                true,
                None,
            );
            return;
        }
    };

    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let transform = match ext.as_str() {
        "js" => engine.hooks().script_transform.clone(),
        "css" => engine.hooks().style_transform.clone(),
        _ => None,
    };

    let file = match transform {
        Some(transform) => match compiled_copy(engine, &file, path, transform.as_ref()).await {
            Ok(compiled) => compiled,
            Err(err) => {
                engine.report_error(&err.to_string(), "asset transform", path);
                file
            }
        },
        None => file,
    };

    crate::delivery::respond_file(slot, headers, &file, None, config).await;
}

/// Transform the source and cache the result in the tmp directory. The cache
/// is reused unless debug mode forces a recompile.
async fn compiled_copy(
    engine: &Arc<Engine>,
    source: &Path,
    request_path: &str,
    transform: &(dyn Fn(&str) -> String + Send + Sync),
) -> std::io::Result<PathBuf> {
    let config = engine.config();
    let key = request_path.trim_start_matches('/').replace('/', "-");
    let cached = config.directories.tmp.join(key);

    if config.debug || !cached.exists() {
        let text = tokio::fs::read_to_string(source).await?;
        let compiled = transform(&text);
        tokio::fs::write(&cached, compiled).await?;
    }

    Ok(cached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http_body_util::BodyExt;

    use crate::config::EngineConfig;
    use crate::dispatch::context::Outcome;

    fn dirs_in(root: &Path) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.directories.public = root.join("public");
        config.directories.tmp = root.join("tmp");
        std::fs::create_dir_all(&config.directories.public).unwrap();
        std::fs::create_dir_all(&config.directories.tmp).unwrap();
        config
    }

    fn counting_engine(config: EngineConfig) -> (Arc<Engine>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&runs);
        let engine = Engine::builder(config)
            .script_transform(move |src| {
                seen.fetch_add(1, Ordering::SeqCst);
                format!("/* compiled */ {src}")
            })
            .build()
            .unwrap();
        (engine, runs)
    }

    async fn serve_text(engine: &Arc<Engine>, path: &str) -> String {
        let slot = ResponseSlot::new();
        serve(engine, &HeaderMap::new(), path, &slot).await;
        match slot.take() {
            Some(Outcome::Respond(resp)) => {
                let body = resp.into_body().collect().await.unwrap().to_bytes();
                String::from_utf8_lossy(&body).into_owned()
            }
            _ => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_script_transform_compiled_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = dirs_in(dir.path());
        std::fs::write(config.directories.public.join("app.js"), "let x = 1").unwrap();

        let (engine, runs) = counting_engine(config);

        assert_eq!(serve_text(&engine, "/app.js").await, "/* compiled */ let x = 1");
        // Second request is served from the tmp-dir compiled copy.
        assert_eq!(serve_text(&engine, "/app.js").await, "/* compiled */ let x = 1");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_debug_mode_recompiles_every_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dirs_in(dir.path());
        config.debug = true;
        std::fs::write(config.directories.public.join("app.js"), "let x = 1").unwrap();

        let (engine, runs) = counting_engine(config);

        serve_text(&engine, "/app.js").await;
        serve_text(&engine, "/app.js").await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_untransformed_extension_skips_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let config = dirs_in(dir.path());
        std::fs::write(config.directories.public.join("notes.txt"), "plain").unwrap();

        let (engine, runs) = counting_engine(config);

        assert_eq!(serve_text(&engine, "/notes.txt").await, "plain");
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_static_path_detection() {
        assert!(is_static_path("/app.js"));
        assert!(is_static_path("/img/logo.png"));
        assert!(!is_static_path("/user/42"));
        assert!(!is_static_path("/"));
        assert!(!is_static_path("/.hidden"));
    }

    #[test]
    fn test_resolve_refuses_traversal() {
        let public = Path::new("/srv/public");
        assert_eq!(
            resolve_public(public, "/css/site.css"),
            Some(PathBuf::from("/srv/public/css/site.css"))
        );
        assert!(resolve_public(public, "/../etc/passwd").is_none());
        assert!(resolve_public(public, "/css/../../secret").is_none());
    }
}
