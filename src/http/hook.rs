//! Before-render hook: wraps content and view replies right before their
//! headers and body are written.

use axum::http::request::Parts;

use crate::error::Result;
use crate::http::writer::ResponseWriter;

/// The deferred write a hook must call (or deliberately skip).
pub type Render<'a> = Box<dyn FnOnce(&mut dyn ResponseWriter) -> Result<()> + 'a>;

pub trait BeforeRender: Send + Sync {
    fn before_render(&self, w: &mut dyn ResponseWriter, request: &Parts, render: Render<'_>) -> Result<()>;
}

impl<F> BeforeRender for F
where
    F: Fn(&mut dyn ResponseWriter, &Parts, Render<'_>) -> Result<()> + Send + Sync,
{
    fn before_render(&self, w: &mut dyn ResponseWriter, request: &Parts, render: Render<'_>) -> Result<()> {
        self(w, request, render)
    }
}
