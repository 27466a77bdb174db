//! Process-wide interceptor registry and protocol dispatch.
//!
//! The registry exists because the mechanism this layer hooks into is
//! itself process-global: one handler serves each virtual protocol at a
//! time. It holds the single active-interceptor slot plus a handler stack
//! per protocol name, so that layered interceptors restore in exact
//! reverse order of binding. All state is instance-scoped;
//! [`Registry::global`] hands out the shared process instance.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use tracing::{error, info};

use crate::driver::{FileDriver, NativeDriver};
use crate::error::{Error, Result};
use crate::handle::{DirHandle, FileHandle, VirtualFileHandle};
use crate::interceptor::Interceptor;
use crate::resolve;
use crate::types::{FileStat, MetadataOp, OpenContext, OpenMode};

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// Registry of bound protocol handlers and the active interceptor slot.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    active: Option<Arc<Interceptor>>,
    bindings: HashMap<String, Vec<Arc<Interceptor>>>,
}

impl Registry {
    /// A fresh, empty registry. Embedders normally use [`Registry::global`];
    /// isolated instances exist so tests (and nested hosts) can dispatch
    /// without touching process state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry instance.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Claim the active-interceptor slot.
    ///
    /// Fails with [`Error::AlreadyActive`] when the slot is occupied; the
    /// existing activation is left untouched.
    pub fn activate(&self, interceptor: Arc<Interceptor>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.active.is_some() {
            error!("set_up called while an interceptor is already active");
            return Err(Error::AlreadyActive);
        }
        inner.active = Some(interceptor);
        info!("load interceptor activated");
        Ok(())
    }

    /// Clear the active-interceptor slot unconditionally.
    pub fn deactivate(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.active.take().is_some() {
            info!("load interceptor deactivated");
        }
    }

    /// Whether an interceptor currently owns the active slot.
    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().active.is_some()
    }

    /// The interceptor owning the active slot, if any.
    pub fn active(&self) -> Option<Arc<Interceptor>> {
        self.inner.lock().unwrap().active.clone()
    }

    /// Push `interceptor` as the handler serving `protocol`. Whatever
    /// previously served the protocol stays below it on the stack and is
    /// restored when this binding is removed.
    pub(crate) fn bind(&self, protocol: &str, interceptor: Arc<Interceptor>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .bindings
            .entry(protocol.to_string())
            .or_default()
            .push(interceptor);
    }

    /// Remove `interceptor`'s topmost binding for `protocol`, restoring
    /// whatever it had evicted.
    pub(crate) fn unbind(&self, protocol: &str, interceptor: &Arc<Interceptor>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(stack) = inner.bindings.get_mut(protocol) else {
            return false;
        };
        let Some(index) = stack
            .iter()
            .rposition(|bound| Arc::ptr_eq(bound, interceptor))
        else {
            return false;
        };
        stack.remove(index);
        if stack.is_empty() {
            inner.bindings.remove(protocol);
        }
        true
    }

    /// The handler currently serving `protocol`, if any is bound.
    pub fn handler_for(&self, protocol: &str) -> Option<Arc<Interceptor>> {
        let inner = self.inner.lock().unwrap();
        inner
            .bindings
            .get(protocol)
            .and_then(|stack| stack.last())
            .cloned()
    }

    fn driver_for(&self, url: &str) -> Box<dyn FileDriver> {
        match self.handler_for(resolve::scheme_of(url)) {
            Some(interceptor) => Box::new(VirtualFileHandle::new(interceptor)),
            None => Box::new(NativeDriver::new()),
        }
    }

    /// Open a file through the currently bound handler for the target's
    /// protocol, falling back to the native passthrough.
    pub fn open(&self, url: &str, mode: OpenMode, ctx: &OpenContext) -> Result<FileHandle> {
        let mut driver = self.driver_for(url);
        driver.open(url, mode, ctx)?;
        Ok(FileHandle::new(driver))
    }

    /// Open a directory listing through the bound handler.
    pub fn open_dir(&self, url: &str, ctx: &OpenContext) -> Result<DirHandle> {
        let mut driver = self.driver_for(url);
        driver.open_dir(url, ctx)?;
        Ok(DirHandle::new(driver))
    }

    pub fn mkdir(&self, url: &str, mode: u32, recursive: bool) -> Result<()> {
        self.driver_for(url).mkdir(url, mode, recursive)
    }

    pub fn rmdir(&self, url: &str) -> Result<()> {
        self.driver_for(url).rmdir(url)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.driver_for(from).rename(from, to)
    }

    pub fn unlink(&self, url: &str) -> Result<()> {
        self.driver_for(url).unlink(url)
    }

    /// Stat by path. `quiet` suppresses warning diagnostics, not the error.
    pub fn stat(&self, url: &str, quiet: bool) -> Result<FileStat> {
        self.driver_for(url).url_stat(url, quiet)
    }

    pub fn set_metadata(&self, url: &str, op: MetadataOp) -> Result<()> {
        self.driver_for(url).set_metadata(url, op)
    }
}
