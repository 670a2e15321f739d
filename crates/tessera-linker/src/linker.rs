//! Module linker
//!
//! [`ModuleLinker`] is the resolution callback a context calls for every
//! import it meets while linking a graph. It owns all session state: the
//! module cache, the referenced-path accounting, and the source maps of
//! rewritten modules. One linker serves one execution; nothing it records
//! outlives it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::cache::{CacheStats, ModuleCache, ReferenceTracker};
use crate::context::{ExecutionContext, ModuleResolver};
use crate::error::{LinkError, ResolutionFailure};
use crate::loader::{FsLoader, SourceLoader};
use crate::resolve::resolve;
use crate::rules::ModuleRules;
use crate::transform::{self, TransformRequest, WasmCompiler};

/// Resolves, loads, transforms and caches modules for one session.
pub struct ModuleLinker<'ctx, C: ExecutionContext, L = FsLoader> {
    context: &'ctx C,
    rules: ModuleRules,
    loader: L,
    wasm: WasmCompiler,
    cache: RefCell<ModuleCache<C::Module>>,
    references: RefCell<ReferenceTracker>,
}

impl<'ctx, C: ExecutionContext> ModuleLinker<'ctx, C, FsLoader> {
    /// Linker reading modules from the filesystem.
    pub fn new(context: &'ctx C, rules: ModuleRules) -> Self {
        Self::with_loader(context, rules, FsLoader)
    }
}

impl<'ctx, C: ExecutionContext, L: SourceLoader> ModuleLinker<'ctx, C, L> {
    pub fn with_loader(context: &'ctx C, rules: ModuleRules, loader: L) -> Self {
        Self {
            context,
            rules,
            loader,
            wasm: WasmCompiler::new(),
            cache: RefCell::new(ModuleCache::new()),
            references: RefCell::new(ReferenceTracker::new()),
        }
    }

    /// Compile `CompiledWasm` modules with a host-configured engine.
    pub fn with_wasm_compiler(mut self, wasm: WasmCompiler) -> Self {
        self.wasm = wasm;
        self
    }

    /// Resolve `specifier` imported by the module identified by `referrer`
    /// and return its record, loading it on first use.
    pub async fn resolve_and_link(
        &self,
        specifier: &str,
        referrer: &str,
    ) -> Result<C::Module, LinkError> {
        let path = resolve(specifier, referrer)?;

        let slot = self.cache.borrow_mut().slot(&path);
        if let Some(module) = slot.get() {
            log::debug!("Module cache hit: {}", path.display());
            self.cache.borrow_mut().record_hit();
            return Ok(module.clone());
        }

        // Concurrent first resolutions of one path queue on the slot; only
        // the first runs the loader. Queued resolutions fail with it rather
        // than loading the path again.
        let failures_before = self.cache.borrow().failures(&path);
        let loaded_here = Cell::new(false);
        let (path_ref, loaded_ref) = (&path, &loaded_here);
        let module = slot
            .get_or_try_init(move || async move {
                if self.cache.borrow().failures(path_ref) != failures_before {
                    return Err(LinkError::resolution(
                        referrer,
                        specifier,
                        ResolutionFailure::ConcurrentLoadFailed,
                    ));
                }
                loaded_ref.set(true);
                let result = self.load(path_ref, specifier, referrer).await;
                if result.is_err() {
                    self.cache.borrow_mut().record_failure(path_ref);
                }
                result
            })
            .await?;
        if !loaded_here.get() {
            self.cache.borrow_mut().record_hit();
        }
        Ok(module.clone())
    }

    /// Completed record for `path`, if this session has one.
    pub(crate) fn cached(&self, path: &Path) -> Option<C::Module> {
        self.cache.borrow().get(path).cloned()
    }

    /// Register a record compiled outside the linker, such as the entry
    /// module. A record already cached for `path` is kept.
    pub(crate) fn seed(&self, path: &Path, module: C::Module) {
        let slot = self.cache.borrow_mut().slot(path);
        if slot.set(module).is_err() {
            log::debug!("Keeping cached record for {}", path.display());
        }
    }

    async fn load(
        &self,
        path: &Path,
        specifier: &str,
        referrer: &str,
    ) -> Result<C::Module, LinkError> {
        self.cache.borrow_mut().record_miss();

        let rule_type = self
            .rules
            .matching_rule(path)
            .map(|rule| rule.rule_type)
            .ok_or_else(|| {
                LinkError::resolution(referrer, specifier, ResolutionFailure::NoMatchingRules)
            })?;

        self.references.borrow_mut().record_path(path);

        let bytes = self
            .loader
            .load(path)
            .await
            .map_err(|source| LinkError::Io {
                referrer: referrer.to_string(),
                specifier: specifier.to_string(),
                path: path.to_path_buf(),
                source,
            })?;
        self.references.borrow_mut().record_size(path, bytes.len());
        log::debug!(
            "Loaded {} as {} ({} bytes)",
            path.display(),
            rule_type,
            bytes.len()
        );

        let request = TransformRequest {
            path,
            specifier,
            referrer,
        };
        let transformed = transform::transform(self.context, &self.wasm, rule_type, request, bytes)?;
        if let Some(map) = transformed.source_map {
            self.references
                .borrow_mut()
                .record_source_map(path, map.to_json());
        }
        Ok(transformed.module)
    }

    pub fn context(&self) -> &'ctx C {
        self.context
    }

    pub fn rules(&self) -> &ModuleRules {
        &self.rules
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Every resolved path loaded so far.
    pub fn referenced_paths(&self) -> BTreeSet<PathBuf> {
        self.references.borrow().paths().clone()
    }

    /// Total bytes of all referenced content, each path counted once.
    pub fn referenced_paths_total_size(&self) -> usize {
        self.references.borrow().total_size()
    }

    /// Source maps of rewritten (CommonJS) modules, by path.
    pub fn extra_source_maps(&self) -> FxHashMap<PathBuf, String> {
        self.references.borrow().source_maps().clone()
    }

    pub fn source_map(&self, path: &Path) -> Option<String> {
        self.references.borrow().source_maps().get(path).cloned()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    /// End the session, keeping only the accounting.
    pub fn into_references(self) -> ReferenceTracker {
        self.references.into_inner()
    }
}

impl<C: ExecutionContext, L: SourceLoader> ModuleResolver<C::Module> for ModuleLinker<'_, C, L> {
    async fn resolve(&self, specifier: &str, referrer: &str) -> Result<C::Module, LinkError> {
        self.resolve_and_link(specifier, referrer).await
    }
}
