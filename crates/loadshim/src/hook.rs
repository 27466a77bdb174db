//! The load-hook capability supplied by the embedder.

use crate::filter::PathFilter;

/// Transformation hook consulted for load-purpose opens.
///
/// The hook receives the canonical path of the file being loaded and either
/// declines (`Ok(None)`, the real content is used) or replaces the loaded
/// bytes verbatim (`Ok(Some(content))`). Errors propagate to the caller of
/// the load operation unmodified.
///
/// The hook runs with the interception layer temporarily unregistered, so it
/// may freely read files — including the one being loaded — without
/// re-entering the layer. It must not call `set_up`/`tear_down` on the
/// active interceptor.
pub trait LoadHook: Send + Sync {
    fn load(&self, path: &str) -> anyhow::Result<Option<String>>;
}

impl<F> LoadHook for F
where
    F: Fn(&str) -> anyhow::Result<Option<String>> + Send + Sync,
{
    fn load(&self, path: &str) -> anyhow::Result<Option<String>> {
        self(path)
    }
}

/// Applies an inner hook only to paths accepted by a [`PathFilter`].
pub struct Filtered<H> {
    filter: PathFilter,
    inner: H,
}

impl<H: LoadHook> Filtered<H> {
    pub fn new(filter: PathFilter, inner: H) -> Self {
        Filtered { filter, inner }
    }
}

impl<H: LoadHook> LoadHook for Filtered<H> {
    fn load(&self, path: &str) -> anyhow::Result<Option<String>> {
        if self.filter.test(path) {
            self.inner.load(path)
        } else {
            Ok(None)
        }
    }
}

/// Tries hooks in order; the first substitution wins.
#[derive(Default)]
pub struct Chain {
    hooks: Vec<Box<dyn LoadHook>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, hook: impl LoadHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }
}

impl LoadHook for Chain {
    fn load(&self, path: &str) -> anyhow::Result<Option<String>> {
        for hook in &self.hooks {
            if let Some(content) = hook.load(path)? {
                return Ok(Some(content));
            }
        }
        Ok(None)
    }
}
