//! Execution context abstraction
//!
//! The sandbox that actually compiles and evaluates code lives outside this
//! crate. [`ExecutionContext`] is the surface the linker and the entry points
//! consume; hosts implement it on top of whatever engine provides isolation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::{ContextError, LinkError};
use crate::transform::SyntheticModule;

/// Resolution callback handed to [`ExecutionContext::link`].
///
/// The context calls this once per static import while it walks the graph.
/// `referrer` is the importing module's own identifier.
#[allow(async_fn_in_trait)]
pub trait ModuleResolver<M> {
    async fn resolve(&self, specifier: &str, referrer: &str) -> Result<M, LinkError>;
}

/// An isolated context able to compile scripts and modules.
#[allow(async_fn_in_trait)]
pub trait ExecutionContext {
    /// Compiled flat script
    type Script;
    /// Module record bound to this context; clones share identity
    type Module: Clone;
    /// Evaluated module namespace
    type Namespace;

    /// Whether this context can build module records at all.
    fn supports_modules(&self) -> bool;

    /// Compile code as a flat script.
    fn compile_script(&self, code: &str, identifier: &str) -> Result<Self::Script, ContextError>;

    /// Run a compiled script synchronously.
    fn run_script(&self, script: &Self::Script) -> Result<(), ContextError>;

    /// Parse code as a source-text module with the given identifier.
    fn compile_module(&self, code: &str, identifier: &str) -> Result<Self::Module, ContextError>;

    /// Wrap an already-initialised synthetic module as a module record.
    fn create_synthetic_module(&self, module: SyntheticModule) -> Result<Self::Module, ContextError>;

    /// Link `module` and everything it imports, calling `resolver` for each
    /// import specifier.
    async fn link<R>(&self, module: &Self::Module, resolver: &R) -> Result<(), LinkError>
    where
        R: ModuleResolver<Self::Module>;

    /// Evaluate a linked module. Implementations should poll `interrupt` at
    /// their safepoints.
    async fn evaluate(
        &self,
        module: &Self::Module,
        interrupt: &InterruptHandle,
    ) -> Result<Self::Namespace, ContextError>;
}

/// Cancellation hook for module evaluation.
///
/// Clones share state, so an operator can keep one handle and pass another to
/// [`crate::ModuleRunner::run`].
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    inner: Arc<InterruptState>,
}

#[derive(Debug, Default)]
struct InterruptState {
    interrupted: AtomicBool,
    notify: Notify,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption and wake anything waiting on [`Self::interrupted`].
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Resolves once [`Self::interrupt`] has been called.
    pub async fn interrupted(&self) {
        loop {
            // Register before checking the flag so a concurrent interrupt is not lost
            let notified = self.inner.notify.notified();
            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }
}
