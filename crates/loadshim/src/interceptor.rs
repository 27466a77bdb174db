//! Interceptor lifecycle: protocol binding, activation, and the
//! reentrancy guard used by every passthrough call.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::hook::LoadHook;
use crate::registry::Registry;
use crate::resolve::{FILE_PROTOCOL, ZIP_PROTOCOL};

/// Protocols an interceptor binds by default: the local filesystem and the
/// zip-archive virtual filesystem.
pub const DEFAULT_PROTOCOLS: &[&str] = &[FILE_PROTOCOL, ZIP_PROTOCOL];

/// A load interceptor: a hook plus the protocol names it serves.
///
/// Constructed, then [`set_up`](Interceptor::set_up) to start intercepting,
/// then [`tear_down`](Interceptor::tear_down) to restore whatever handlers
/// the protocols had before. The hook is immutable after construction.
pub struct Interceptor {
    registry: Arc<Registry>,
    protocols: Vec<String>,
    hook: Box<dyn LoadHook>,
}

impl Interceptor {
    /// An interceptor over [`DEFAULT_PROTOCOLS`] on the process registry.
    pub fn new(hook: impl LoadHook + 'static) -> Arc<Self> {
        Self::with_protocols(
            hook,
            DEFAULT_PROTOCOLS.iter().map(|p| p.to_string()).collect(),
        )
    }

    /// An interceptor over the given protocol names on the process registry.
    pub fn with_protocols(hook: impl LoadHook + 'static, protocols: Vec<String>) -> Arc<Self> {
        Self::with_registry(hook, protocols, Registry::global())
    }

    /// An interceptor bound to a specific registry instance.
    pub fn with_registry(
        hook: impl LoadHook + 'static,
        protocols: Vec<String>,
        registry: Arc<Registry>,
    ) -> Arc<Self> {
        Arc::new(Interceptor {
            registry,
            protocols,
            hook: Box::new(hook),
        })
    }

    /// Start intercepting: claim the registry's active slot, then bind this
    /// interceptor to each of its protocols.
    ///
    /// Calling `set_up` while another interceptor is active is a programmer
    /// error, surfaced as [`crate::Error::AlreadyActive`] without touching
    /// the existing activation.
    pub fn set_up(self: &Arc<Self>) -> Result<()> {
        self.registry.activate(Arc::clone(self))?;
        self.wrap();
        info!("intercepting loads on protocols {:?}", self.protocols);
        Ok(())
    }

    /// Stop intercepting: unbind from each protocol (restoring whatever
    /// handler each had before) and release the active slot.
    pub fn tear_down(self: &Arc<Self>) {
        self.unwrap();
        self.registry.deactivate();
    }

    /// Bind this interceptor's handle type to each of its protocols.
    ///
    /// The finer-grained primitive underneath `set_up`; also used by the
    /// reentrancy guard to re-register after a passthrough call.
    pub fn wrap(self: &Arc<Self>) {
        for protocol in &self.protocols {
            self.registry.bind(protocol, Arc::clone(self));
        }
    }

    /// Remove this interceptor's bindings, restoring each protocol's
    /// previous handler (a stack pop, not a reset).
    pub fn unwrap(self: &Arc<Self>) {
        for protocol in &self.protocols {
            self.registry.unbind(protocol, self);
        }
    }

    /// The registry this interceptor dispatches through.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The protocol names this interceptor serves.
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    pub(crate) fn hook(&self) -> &dyn LoadHook {
        self.hook.as_ref()
    }
}

/// Scope guard making passthrough calls safe against self-recursion.
///
/// Creating the guard unregisters the interceptor's protocol bindings;
/// dropping it re-registers them. The drop runs on every exit path,
/// including error propagation and unwinding, so a passthrough call can
/// never leave the layer unregistered or re-enter itself.
pub struct ReentrancyGuard<'a> {
    interceptor: &'a Arc<Interceptor>,
}

impl<'a> ReentrancyGuard<'a> {
    pub fn new(interceptor: &'a Arc<Interceptor>) -> Self {
        debug!("unbinding interceptor for passthrough");
        interceptor.unwrap();
        ReentrancyGuard { interceptor }
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.interceptor.wrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decline(_path: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    #[test]
    fn wrap_and_unwrap_are_stack_operations() {
        let registry = Arc::new(Registry::new());
        let first = Interceptor::with_registry(
            decline,
            vec!["file".to_string()],
            Arc::clone(&registry),
        );
        let second = Interceptor::with_registry(
            decline,
            vec!["file".to_string()],
            Arc::clone(&registry),
        );

        first.wrap();
        second.wrap();
        assert!(Arc::ptr_eq(&registry.handler_for("file").unwrap(), &second));

        // Popping the top restores the handler it evicted.
        second.unwrap();
        assert!(Arc::ptr_eq(&registry.handler_for("file").unwrap(), &first));

        first.unwrap();
        assert!(registry.handler_for("file").is_none());
    }

    #[test]
    fn guard_restores_bindings_on_drop() {
        let registry = Arc::new(Registry::new());
        let interceptor = Interceptor::with_registry(
            decline,
            vec!["file".to_string()],
            Arc::clone(&registry),
        );
        interceptor.wrap();

        {
            let _guard = ReentrancyGuard::new(&interceptor);
            assert!(registry.handler_for("file").is_none());
        }
        assert!(Arc::ptr_eq(
            &registry.handler_for("file").unwrap(),
            &interceptor
        ));
    }
}
