//! Execution entry points
//!
//! A [`ScriptBlueprint`] pairs code with where it came from. It can be built
//! into a [`ScriptRunner`] (flat script, no exports) or a [`ModuleRunner`]
//! (linked module graph with a namespace of exports).
//!
//! Only module evaluation can be interrupted. Flat scripts run synchronously
//! to completion inside the context and offer no cancellation hook.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::context::{ExecutionContext, InterruptHandle};
use crate::error::{ContextError, LinkError, RunError};
use crate::linker::ModuleLinker;
use crate::loader::SourceLoader;
use crate::resolve::{absolutize, RAW_STRING_IDENTIFIER};

/// Where a blueprint's code came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// Read from a file; relative imports resolve against its directory
    File(PathBuf),
    /// Supplied directly; cannot import anything
    RawString,
}

/// Immutable source code plus origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlueprint {
    code: String,
    origin: ScriptOrigin,
}

impl ScriptBlueprint {
    pub fn new(code: impl Into<String>, origin: ScriptOrigin) -> Self {
        Self {
            code: code.into(),
            origin,
        }
    }

    /// Blueprint for code read from `path`. The path is made absolute so it
    /// can serve as the module's identifier.
    pub fn from_file(path: impl AsRef<Path>, code: impl Into<String>) -> Self {
        Self::new(code, ScriptOrigin::File(absolutize(path.as_ref())))
    }

    pub fn from_string(code: impl Into<String>) -> Self {
        Self::new(code, ScriptOrigin::RawString)
    }

    /// Read `path` from disk.
    pub async fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let code = tokio::fs::read_to_string(path).await?;
        Ok(Self::from_file(path, code))
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn origin(&self) -> &ScriptOrigin {
        &self.origin
    }

    /// File path, or the raw-string sentinel.
    pub fn identifier(&self) -> Cow<'_, str> {
        match &self.origin {
            ScriptOrigin::File(path) => path.to_string_lossy(),
            ScriptOrigin::RawString => Cow::Borrowed(RAW_STRING_IDENTIFIER),
        }
    }

    /// Compile as a flat script bound to `context`.
    pub fn build_script<'a, C: ExecutionContext>(
        &self,
        context: &'a C,
    ) -> Result<ScriptRunner<'a, C>, ContextError> {
        let script = context.compile_script(&self.code, &self.identifier())?;
        Ok(ScriptRunner { context, script })
    }

    /// Compile as a module bound to `context`, resolving imports through
    /// `linker`. Fails straight away if the context has no module support.
    ///
    /// A file entry point is registered in the linker's cache under its own
    /// path, so a dependency importing it back gets this same record.
    pub fn build_module<'a, 'ctx, C, L>(
        &self,
        context: &'a C,
        linker: &'a ModuleLinker<'ctx, C, L>,
    ) -> Result<ModuleRunner<'a, 'ctx, C, L>, LinkError>
    where
        C: ExecutionContext,
        L: SourceLoader,
    {
        if !context.supports_modules() {
            return Err(LinkError::Capability(
                "Execution context does not support module records".to_string(),
            ));
        }
        let entry_path = match &self.origin {
            ScriptOrigin::File(path) => Some(path.as_path()),
            ScriptOrigin::RawString => None,
        };
        if let Some(module) = entry_path.and_then(|path| linker.cached(path)) {
            return Ok(ModuleRunner {
                context,
                linker,
                module,
            });
        }

        let identifier = self.identifier();
        let module = context
            .compile_module(&self.code, &identifier)
            .map_err(|source| LinkError::Context {
                referrer: identifier.to_string(),
                specifier: identifier.to_string(),
                source,
            })?;
        if let Some(path) = entry_path {
            linker.seed(path, module.clone());
        }
        Ok(ModuleRunner {
            context,
            linker,
            module,
        })
    }
}

/// Runs a flat script in its context.
pub struct ScriptRunner<'a, C: ExecutionContext> {
    context: &'a C,
    script: C::Script,
}

impl<C: ExecutionContext> ScriptRunner<'_, C> {
    /// Execute synchronously. Scripts have no export surface.
    pub fn run(&self) -> Result<(), ContextError> {
        self.context.run_script(&self.script)
    }
}

/// Links and evaluates a module graph.
pub struct ModuleRunner<'a, 'ctx, C: ExecutionContext, L> {
    context: &'a C,
    linker: &'a ModuleLinker<'ctx, C, L>,
    module: C::Module,
}

impl<C: ExecutionContext, L: SourceLoader> ModuleRunner<'_, '_, C, L> {
    /// Root module record, before linking.
    pub fn module(&self) -> &C::Module {
        &self.module
    }

    /// Link the graph, then evaluate it.
    ///
    /// The runner is consumed: an interrupted or failed run cannot be
    /// resumed, so the context never sees a half-finished evaluation reused.
    pub async fn run(self, interrupt: &InterruptHandle) -> Result<C::Namespace, RunError> {
        if interrupt.is_interrupted() {
            return Err(RunError::Interrupted);
        }

        self.context.link(&self.module, self.linker).await?;

        tokio::select! {
            biased;
            _ = interrupt.interrupted() => {
                log::info!("Module evaluation interrupted");
                Err(RunError::Interrupted)
            }
            result = self.context.evaluate(&self.module, interrupt) => match result {
                Ok(namespace) => Ok(namespace),
                // The context noticed the interrupt at a safepoint
                Err(_) if interrupt.is_interrupted() => Err(RunError::Interrupted),
                Err(e) => Err(RunError::Evaluation(e)),
            },
        }
    }
}
