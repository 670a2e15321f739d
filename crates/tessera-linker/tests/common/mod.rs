//! Shared fixtures: an in-memory execution context and a counting loader.
//!
//! `FakeContext` parses static import declarations and links graphs
//! depth-first through the resolver it is given. It does not execute
//! script code; evaluation only reports what was linked.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use regex::Regex;
use rustc_hash::FxHashMap;
use tessera_linker::{
    ContextError, ExecutionContext, InterruptHandle, LinkError, MemoryLoader, ModuleResolver,
    SourceLoader, SyntheticModule,
};

pub type FakeModule = Rc<FakeModuleRecord>;

#[derive(Debug)]
pub struct FakeModuleRecord {
    pub identifier: String,
    pub kind: FakeKind,
    pub linked: RefCell<Vec<FakeModule>>,
}

#[derive(Debug)]
pub enum FakeKind {
    Source { code: String, imports: Vec<String> },
    Synthetic(SyntheticModule),
}

impl FakeModuleRecord {
    pub fn code(&self) -> Option<&str> {
        match &self.kind {
            FakeKind::Source { code, .. } => Some(code),
            FakeKind::Synthetic(_) => None,
        }
    }

    pub fn synthetic(&self) -> Option<&SyntheticModule> {
        match &self.kind {
            FakeKind::Synthetic(module) => Some(module),
            FakeKind::Source { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct FakeScript {
    pub identifier: String,
    pub code: String,
}

#[derive(Debug)]
pub enum FakeNamespace {
    Source {
        identifier: String,
        dependencies: Vec<String>,
    },
    Synthetic(SyntheticModule),
}

pub struct FakeContext {
    modules_supported: bool,
    import_re: Regex,
    pub compiled_modules: RefCell<Vec<String>>,
    pub scripts_run: RefCell<Vec<String>>,
    pub link_log: RefCell<Vec<(String, String)>>,
}

impl FakeContext {
    pub fn new() -> Self {
        Self {
            modules_supported: true,
            import_re: Regex::new(
                r#"\b(?:import|export)\s+(?:[\w*{}\s,$]+?\s+from\s+)?["']([^"']+)["']"#,
            )
            .unwrap(),
            compiled_modules: RefCell::new(Vec::new()),
            scripts_run: RefCell::new(Vec::new()),
            link_log: RefCell::new(Vec::new()),
        }
    }

    pub fn without_modules() -> Self {
        Self {
            modules_supported: false,
            ..Self::new()
        }
    }
}

impl ExecutionContext for FakeContext {
    type Script = FakeScript;
    type Module = FakeModule;
    type Namespace = FakeNamespace;

    fn supports_modules(&self) -> bool {
        self.modules_supported
    }

    fn compile_script(&self, code: &str, identifier: &str) -> Result<FakeScript, ContextError> {
        if code.contains("SYNTAX ERROR") {
            return Err(ContextError::Compile(format!("{}: unexpected token", identifier)));
        }
        Ok(FakeScript {
            identifier: identifier.to_string(),
            code: code.to_string(),
        })
    }

    fn run_script(&self, script: &FakeScript) -> Result<(), ContextError> {
        if script.code.contains("THROW") {
            return Err(ContextError::Evaluate("thrown from script".to_string()));
        }
        self.scripts_run.borrow_mut().push(script.identifier.clone());
        Ok(())
    }

    fn compile_module(&self, code: &str, identifier: &str) -> Result<FakeModule, ContextError> {
        if !self.modules_supported {
            return Err(ContextError::Unsupported("modules".to_string()));
        }
        if code.contains("SYNTAX ERROR") {
            return Err(ContextError::Compile(format!("{}: unexpected token", identifier)));
        }
        let imports = self
            .import_re
            .captures_iter(code)
            .map(|caps| caps[1].to_string())
            .collect();
        self.compiled_modules.borrow_mut().push(identifier.to_string());
        Ok(Rc::new(FakeModuleRecord {
            identifier: identifier.to_string(),
            kind: FakeKind::Source {
                code: code.to_string(),
                imports,
            },
            linked: RefCell::new(Vec::new()),
        }))
    }

    fn create_synthetic_module(&self, module: SyntheticModule) -> Result<FakeModule, ContextError> {
        self.compiled_modules
            .borrow_mut()
            .push(module.identifier().to_string());
        Ok(Rc::new(FakeModuleRecord {
            identifier: module.identifier().to_string(),
            kind: FakeKind::Synthetic(module),
            linked: RefCell::new(Vec::new()),
        }))
    }

    async fn link<R>(&self, module: &FakeModule, resolver: &R) -> Result<(), LinkError>
    where
        R: ModuleResolver<FakeModule>,
    {
        let mut visited: Vec<FakeModule> = vec![module.clone()];
        let mut stack = vec![module.clone()];

        while let Some(current) = stack.pop() {
            let FakeKind::Source { imports, .. } = &current.kind else {
                continue;
            };
            let mut dependencies = Vec::with_capacity(imports.len());
            for specifier in imports {
                self.link_log
                    .borrow_mut()
                    .push((current.identifier.clone(), specifier.clone()));
                dependencies.push(resolver.resolve(specifier, &current.identifier).await?);
            }
            *current.linked.borrow_mut() = dependencies.clone();

            // Reverse so the first import is visited first
            for dependency in dependencies.into_iter().rev() {
                if !visited.iter().any(|seen| Rc::ptr_eq(seen, &dependency)) {
                    visited.push(dependency.clone());
                    stack.push(dependency);
                }
            }
        }
        Ok(())
    }

    async fn evaluate(
        &self,
        module: &FakeModule,
        interrupt: &InterruptHandle,
    ) -> Result<FakeNamespace, ContextError> {
        match &module.kind {
            FakeKind::Synthetic(synthetic) => Ok(FakeNamespace::Synthetic(synthetic.clone())),
            FakeKind::Source { code, .. } => {
                if code.contains("HANG") {
                    // Never finishes on its own; only an interrupt ends it
                    std::future::pending::<()>().await;
                }
                if code.contains("SAFEPOINT") {
                    interrupt.interrupted().await;
                    return Err(ContextError::Evaluate("terminated".to_string()));
                }
                if code.contains("THROW") {
                    return Err(ContextError::Evaluate("thrown from module".to_string()));
                }
                Ok(FakeNamespace::Source {
                    identifier: module.identifier.clone(),
                    dependencies: module
                        .linked
                        .borrow()
                        .iter()
                        .map(|dep| dep.identifier.clone())
                        .collect(),
                })
            }
        }
    }
}

/// Memory loader that counts reads and yields before answering, so
/// concurrent resolutions really interleave.
#[derive(Default)]
pub struct CountingLoader {
    inner: MemoryLoader,
    reads: RefCell<FxHashMap<PathBuf, usize>>,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.inner.insert(path, contents);
        self
    }

    pub fn reads(&self, path: impl AsRef<Path>) -> usize {
        self.reads.borrow().get(path.as_ref()).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.borrow().values().sum()
    }
}

impl SourceLoader for CountingLoader {
    async fn load(&self, path: &Path) -> io::Result<Vec<u8>> {
        *self.reads.borrow_mut().entry(path.to_path_buf()).or_insert(0) += 1;
        tokio::task::yield_now().await;
        self.inner.load(path).await
    }
}

/// `(module (func (export "answer") (result i32) i32.const 42))`
pub const ANSWER_WASM: &[u8] = &[
    0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, 0x01, 0x05, 0x01, 0x60, 0x00, 0x01, 0x7f,
    0x03, 0x02, 0x01, 0x00, 0x07, 0x0a, 0x01, 0x06, b'a', b'n', b's', b'w', b'e', b'r', 0x00,
    0x00, 0x0a, 0x06, 0x01, 0x04, 0x00, 0x41, 0x2a, 0x0b,
];
