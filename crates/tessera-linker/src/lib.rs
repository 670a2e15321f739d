//! Tessera Linker
//!
//! Module resolution and linking for running untrusted script code inside an
//! isolated execution context. Imports may name plain ES modules, CommonJS
//! modules (rewritten to ES modules with a source map), or assets exposed as a
//! single `default` export: text, binary data, or compiled WebAssembly.
//!
//! The context itself is an external collaborator, described by
//! [`ExecutionContext`]. A [`ModuleLinker`] is that context's resolution
//! callback for one session; [`ScriptBlueprint`] builds the runners that
//! drive it.
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_linker::{InterruptHandle, ModuleLinker, RulesConfig, ScriptBlueprint};
//!
//! let rules = RulesConfig::from_toml_str(CONFIG)?.build()?;
//! let linker = ModuleLinker::new(&context, rules);
//! let blueprint = ScriptBlueprint::read("worker/index.mjs").await?;
//! let namespace = blueprint
//!     .build_module(&context, &linker)?
//!     .run(&InterruptHandle::new())
//!     .await?;
//! println!("{} bytes referenced", linker.referenced_paths_total_size());
//! ```

pub mod blueprint;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod linker;
pub mod loader;
pub mod resolve;
pub mod rules;
pub mod transform;

pub use blueprint::{ModuleRunner, ScriptBlueprint, ScriptOrigin, ScriptRunner};
pub use cache::{CacheStats, ModuleCache, ReferenceTracker};
pub use config::{ModuleRuleConfig, RulesConfig};
pub use context::{ExecutionContext, InterruptHandle, ModuleResolver};
pub use error::{ContextError, LinkError, ResolutionFailure, RunError};
pub use linker::ModuleLinker;
pub use loader::{FsLoader, MemoryLoader, SourceLoader};
pub use resolve::{resolve, RAW_STRING_IDENTIFIER};
pub use rules::{ModuleRule, ModuleRuleType, ModuleRules, RulePattern, GLOB_PREFIX};
pub use transform::{ExportValue, SourceMap, SyntheticModule, WasmCompiler};
