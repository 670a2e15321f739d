//! Content transformation
//!
//! Turns the raw bytes of a resolved module into a module record, with one
//! strategy per [`ModuleRuleType`].

pub mod commonjs;
pub mod source_map;
mod synthetic;
mod wasm;

use std::path::Path;
use std::sync::Arc;

pub use commonjs::CommonJsModule;
pub use source_map::{SourceMap, SourceMapBuilder};
pub use synthetic::{
    ExportValue, SyntheticError, SyntheticExports, SyntheticModule, SyntheticModuleBuilder,
};
pub use wasm::WasmCompiler;

use crate::context::ExecutionContext;
use crate::error::LinkError;
use crate::rules::ModuleRuleType;

/// A module record plus the source map of any rewrite applied to it.
#[derive(Debug)]
pub struct Transformed<M> {
    pub module: M,
    pub source_map: Option<SourceMap>,
}

/// The import being served, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    pub path: &'a Path,
    pub specifier: &'a str,
    pub referrer: &'a str,
}

impl TransformRequest<'_> {
    fn identifier(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Convert `bytes` into a record bound to `context`.
pub fn transform<C: ExecutionContext>(
    context: &C,
    wasm: &WasmCompiler,
    rule_type: ModuleRuleType,
    request: TransformRequest<'_>,
    bytes: Vec<u8>,
) -> Result<Transformed<C::Module>, LinkError> {
    let identifier = request.identifier();
    let context_error = |source| LinkError::Context {
        referrer: request.referrer.to_string(),
        specifier: request.specifier.to_string(),
        source,
    };

    match rule_type {
        ModuleRuleType::ESModule => {
            let code = decode_utf8(bytes);
            let module = context
                .compile_module(&code, &identifier)
                .map_err(context_error)?;
            Ok(Transformed {
                module,
                source_map: None,
            })
        }
        ModuleRuleType::CommonJS => {
            let code = decode_utf8(bytes);
            let output = commonjs::transform(&code, request.path);
            if output.source_map.mappings.is_empty() {
                return Err(LinkError::Transform {
                    referrer: request.referrer.to_string(),
                    specifier: request.specifier.to_string(),
                    path: request.path.to_path_buf(),
                    message: "CommonJS rewrite produced no source map".to_string(),
                });
            }
            log::debug!(
                "Rewrote CommonJS module {} ({} require calls)",
                identifier,
                output.requires.len()
            );
            let module = context
                .compile_module(&output.code, &identifier)
                .map_err(context_error)?;
            Ok(Transformed {
                module,
                source_map: Some(output.source_map),
            })
        }
        ModuleRuleType::Text => {
            let text = decode_utf8(bytes);
            synthesize(context, request, identifier, ExportValue::Text(text))
        }
        ModuleRuleType::Data => {
            let data: Arc<[u8]> = Arc::from(bytes);
            synthesize(context, request, identifier, ExportValue::Data(data))
        }
        ModuleRuleType::CompiledWasm => {
            let compiled = wasm
                .compile(&bytes)
                .map_err(|message| LinkError::Compilation {
                    referrer: request.referrer.to_string(),
                    specifier: request.specifier.to_string(),
                    path: request.path.to_path_buf(),
                    message,
                })?;
            synthesize(context, request, identifier, ExportValue::Wasm(compiled))
        }
    }
}

fn synthesize<C: ExecutionContext>(
    context: &C,
    request: TransformRequest<'_>,
    identifier: String,
    value: ExportValue,
) -> Result<Transformed<C::Module>, LinkError> {
    let synthetic =
        SyntheticModule::with_default(identifier, value).map_err(|e| LinkError::Transform {
            referrer: request.referrer.to_string(),
            specifier: request.specifier.to_string(),
            path: request.path.to_path_buf(),
            message: e.to_string(),
        })?;
    let module = context
        .create_synthetic_module(synthetic)
        .map_err(|source| LinkError::Context {
            referrer: request.referrer.to_string(),
            specifier: request.specifier.to_string(),
            source,
        })?;
    Ok(Transformed {
        module,
        source_map: None,
    })
}

/// Decode as UTF-8, replacing invalid sequences with U+FFFD.
fn decode_utf8(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
