//! Synthetic modules
//!
//! A synthetic module's exports are set by the host instead of being parsed
//! from source. Export names are declared up front and a single initializer
//! assigns each of them exactly once; the sealed module cannot be changed.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while initialising a synthetic module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntheticError {
    #[error("export '{0}' declared more than once")]
    DuplicateDeclaration(String),

    #[error("export '{0}' was not declared")]
    Undeclared(String),

    #[error("export '{0}' is already set")]
    AlreadySet(String),

    #[error("export '{0}' was never set")]
    Unset(String),
}

/// Value of a synthetic export.
#[derive(Clone)]
pub enum ExportValue {
    /// Decoded text
    Text(String),
    /// Immutable binary buffer
    Data(Arc<[u8]>),
    /// Compiled, not yet instantiated, WebAssembly module
    Wasm(wasmtime::Module),
}

impl ExportValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExportValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            ExportValue::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_wasm(&self) -> Option<&wasmtime::Module> {
        match self {
            ExportValue::Wasm(module) => Some(module),
            _ => None,
        }
    }
}

impl fmt::Debug for ExportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ExportValue::Data(data) => write!(f, "Data({} bytes)", data.len()),
            ExportValue::Wasm(module) => f
                .debug_struct("Wasm")
                .field("imports", &module.imports().len())
                .field("exports", &module.exports().len())
                .finish(),
        }
    }
}

/// A sealed synthetic module.
#[derive(Debug, Clone)]
pub struct SyntheticModule {
    identifier: String,
    exports: Vec<(String, ExportValue)>,
}

impl SyntheticModule {
    pub fn builder(identifier: impl Into<String>) -> SyntheticModuleBuilder {
        SyntheticModuleBuilder {
            identifier: identifier.into(),
            export_names: Vec::new(),
        }
    }

    /// Module whose only export is `default`.
    pub fn with_default(
        identifier: impl Into<String>,
        value: ExportValue,
    ) -> Result<Self, SyntheticError> {
        Self::builder(identifier)
            .export("default")
            .build(|exports| exports.set("default", value))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Export names, in declaration order.
    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ExportValue> {
        self.exports
            .iter()
            .find(|(export, _)| export == name)
            .map(|(_, value)| value)
    }

    pub fn default_export(&self) -> Option<&ExportValue> {
        self.get("default")
    }
}

/// Declares export names before the one-shot initializer runs.
#[derive(Debug)]
pub struct SyntheticModuleBuilder {
    identifier: String,
    export_names: Vec<String>,
}

impl SyntheticModuleBuilder {
    pub fn export(mut self, name: impl Into<String>) -> Self {
        self.export_names.push(name.into());
        self
    }

    /// Run `init` once and seal the module. Every declared export must be set.
    pub fn build<F>(self, init: F) -> Result<SyntheticModule, SyntheticError>
    where
        F: FnOnce(&mut SyntheticExports) -> Result<(), SyntheticError>,
    {
        for (i, name) in self.export_names.iter().enumerate() {
            if self.export_names[..i].contains(name) {
                return Err(SyntheticError::DuplicateDeclaration(name.clone()));
            }
        }

        let mut slots = SyntheticExports {
            slots: self.export_names.into_iter().map(|name| (name, None)).collect(),
        };
        init(&mut slots)?;

        let exports = slots
            .slots
            .into_iter()
            .map(|(name, value)| match value {
                Some(value) => Ok((name, value)),
                None => Err(SyntheticError::Unset(name)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SyntheticModule {
            identifier: self.identifier,
            exports,
        })
    }
}

/// Export slots handed to a synthetic module initializer.
#[derive(Debug)]
pub struct SyntheticExports {
    slots: Vec<(String, Option<ExportValue>)>,
}

impl SyntheticExports {
    pub fn set(&mut self, name: &str, value: ExportValue) -> Result<(), SyntheticError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|(export, _)| export == name)
            .ok_or_else(|| SyntheticError::Undeclared(name.to_string()))?;
        if slot.1.is_some() {
            return Err(SyntheticError::AlreadySet(name.to_string()));
        }
        slot.1 = Some(value);
        Ok(())
    }
}
