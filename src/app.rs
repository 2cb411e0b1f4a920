//! Application: route table, frozen templates and the before-render hook,
//! shared by every request.

use std::fmt;
use std::sync::Arc;

use axum::http::request::Parts;

use crate::error::Result;
use crate::http::hook::{BeforeRender, Render};
use crate::http::writer::ResponseWriter;
use crate::http::RequestContext;
use crate::routing::RouteTable;
use crate::template::{TemplateRegistry, Templates};

/// Read-only application state.
pub struct App {
    routes: Arc<RouteTable>,
    templates: Templates,
    hook: Option<Box<dyn BeforeRender>>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes.len())
            .field("templates", &self.templates.names())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Path pattern of a named route.
    pub fn route(&self, name: &str) -> Result<&str> {
        self.routes.route(name)
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub(crate) fn hook(&self) -> Option<&dyn BeforeRender> {
        self.hook.as_deref()
    }

    /// Reply builder for one request.
    pub fn context(self: &Arc<Self>, request: Parts) -> RequestContext {
        RequestContext::new(self.clone(), request)
    }
}

/// Startup-time application configuration.
#[derive(Default)]
pub struct AppBuilder {
    routes: RouteTable,
    registry: TemplateRegistry,
    hook: Option<Box<dyn BeforeRender>>,
}

impl AppBuilder {
    /// Replace the route table.
    pub fn routes(&mut self, routes: RouteTable) -> &mut Self {
        self.routes = routes;
        self
    }

    /// Add one route.
    pub fn route(&mut self, name: impl Into<String>, pattern: impl Into<String>) -> &mut Self {
        self.routes.insert(name, pattern);
        self
    }

    /// Template registry to configure.
    pub fn template(&mut self) -> &mut TemplateRegistry {
        &mut self.registry
    }

    pub fn before_render<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn ResponseWriter, &Parts, Render<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Freeze into the shared, read-only application.
    pub fn build(self) -> Arc<App> {
        let routes = Arc::new(self.routes);
        let mut registry = self.registry;
        registry.routes(routes.clone());
        Arc::new(App {
            routes,
            templates: registry.freeze(),
            hook: self.hook,
        })
    }
}
