//! The engine: route table, configuration, and hooks under one explicit
//! value.
//!
//! # Design Decisions
//! - No process-wide singleton: the engine is constructed once at startup and
//!   passed explicitly to the accept loop
//! - Controllers are registered by name with an init closure; there is no
//!   dynamic loading of handler code
//! - The route table compiles (sorts and freezes) inside `build()`, so every
//!   request observes the same ordering

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::EngineConfig;
use crate::dispatch::context::RequestContext;
use crate::dispatch::{Handler, Validator};
use crate::error::EngineError;
use crate::routing::{FlagSet, RouteTable};

/// Async authorization hook: yields true for an authenticated request.
pub type AuthorizeHook = Arc<dyn Fn(&RequestContext) -> BoxFuture<'static, bool> + Send + Sync>;

/// Error reporting hook: `(error, route_name, request_uri)`. Purely
/// observational; never alters control flow.
pub type ErrorHook = Arc<dyn Fn(&str, &str, &str) + Send + Sync>;

/// Prefix hook: derives a custom group tag for the request.
pub type PrefixHook = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

/// Pure source-to-source transform for script/stylesheet assets.
pub type TransformHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Periodic cache recycle hook, invoked with a monotonic tick counter.
pub type RecycleHook = Arc<dyn Fn(u64) + Send + Sync>;

/// External collaborators wired in at startup.
#[derive(Default, Clone)]
pub struct Hooks {
    pub authorize: Option<AuthorizeHook>,
    pub error: Option<ErrorHook>,
    pub prefix: Option<PrefixHook>,
    pub script_transform: Option<TransformHook>,
    pub style_transform: Option<TransformHook>,
    pub recycle: Option<RecycleHook>,
}

/// The dispatch engine. Immutable once built; shared across request tasks
/// via Arc.
pub struct Engine {
    config: EngineConfig,
    table: RouteTable,
    hooks: Hooks,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Report a fault through the error hook, or log it when no hook is
    /// configured.
    pub fn report_error(&self, error: &str, name: &str, uri: &str) {
        match &self.hooks.error {
            Some(hook) => hook(error, name, uri),
            None => {
                tracing::error!(error, name, uri, "Engine fault");
            }
        }
    }

    /// Remove leftover staging files and ensure the tmp directory exists.
    /// Runs once at startup.
    pub async fn clear_tmp(&self) -> std::io::Result<()> {
        let tmp = &self.config.directories.tmp;
        tokio::fs::create_dir_all(tmp).await?;
        let mut entries = tokio::fs::read_dir(tmp).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Err(err) = tokio::fs::remove_file(entry.path()).await {
                    tracing::warn!(path = %entry.path().display(), error = %err, "Tmp file not removed");
                }
            }
        }
        Ok(())
    }
}

struct PendingRoute {
    controller: String,
    pattern: String,
    flags: FlagSet,
    max_body_size: u64,
    handler: Handler,
    validator: Option<Validator>,
}

/// Builder collecting controllers and hooks before the table freezes.
pub struct EngineBuilder {
    config: EngineConfig,
    pending: Vec<PendingRoute>,
    hooks: Hooks,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    /// Register a named controller. The init closure receives a registrar and
    /// adds the controller's routes.
    pub fn controller(mut self, name: &str, init: impl FnOnce(&mut Registrar)) -> Self {
        let mut registrar = Registrar {
            controller: name.to_string(),
            default_max_body: self.config.limits.default_max_body,
            pending: Vec::new(),
        };
        init(&mut registrar);
        tracing::debug!(
            controller = name,
            routes = registrar.pending.len(),
            "Controller registered"
        );
        self.pending.extend(registrar.pending);
        self
    }

    pub fn authorize<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        self.hooks.authorize = Some(Arc::new(move |ctx| Box::pin(hook(ctx))));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str, &str) + Send + Sync + 'static,
    {
        self.hooks.error = Some(Arc::new(hook));
        self
    }

    pub fn prefix<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.hooks.prefix = Some(Arc::new(hook));
        self
    }

    pub fn script_transform<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.hooks.script_transform = Some(Arc::new(hook));
        self
    }

    pub fn style_transform<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.hooks.style_transform = Some(Arc::new(hook));
        self
    }

    pub fn on_recycle<F>(mut self, hook: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.hooks.recycle = Some(Arc::new(hook));
        self
    }

    /// Register every pending route, compile the table, and freeze the
    /// engine.
    pub fn build(self) -> Result<Arc<Engine>, EngineError> {
        let mut table = RouteTable::new();
        for route in self.pending {
            table.register(
                &route.controller,
                &route.pattern,
                route.flags,
                route.max_body_size,
                route.handler,
                route.validator,
            )?;
        }
        table.compile();

        Ok(Arc::new(Engine {
            config: self.config,
            table,
            hooks: self.hooks,
        }))
    }
}

/// Route registration surface handed to a controller's init closure.
pub struct Registrar {
    controller: String,
    default_max_body: u64,
    pending: Vec<PendingRoute>,
}

impl Registrar {
    /// Start registering a route for this controller.
    pub fn route(&mut self, pattern: &str) -> RouteBuilder<'_> {
        RouteBuilder {
            registrar: self,
            pattern: pattern.to_string(),
            flags: FlagSet::new(),
            max_body_size: None,
            validator: None,
        }
    }
}

/// Per-route builder; finished by [`RouteBuilder::to`].
pub struct RouteBuilder<'a> {
    registrar: &'a mut Registrar,
    pattern: String,
    flags: FlagSet,
    max_body_size: Option<u64>,
    validator: Option<Validator>,
}

impl RouteBuilder<'_> {
    /// Required flags by name, e.g. `&["ajax", "logged"]`.
    pub fn flags(mut self, names: &[&str]) -> Self {
        for name in names {
            self.flags.insert(crate::routing::Flag::parse(name));
        }
        self
    }

    pub fn flag(mut self, flag: crate::routing::Flag) -> Self {
        self.flags.insert(flag);
        self
    }

    /// Byte ceiling for this route's request bodies.
    pub fn max_body(mut self, bytes: u64) -> Self {
        self.max_body_size = Some(bytes);
        self
    }

    /// Predicate run after flag matching, before invocation.
    pub fn validate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(predicate));
        self
    }

    /// Attach the handler and finish the route.
    pub fn to(self, handler: Handler) {
        let max_body_size = self
            .max_body_size
            .unwrap_or(self.registrar.default_max_body);
        let controller = self.registrar.controller.clone();
        self.registrar.pending.push(PendingRoute {
            controller,
            pattern: self.pattern,
            flags: self.flags,
            max_body_size,
            handler,
            validator: self.validator,
        });
    }
}
