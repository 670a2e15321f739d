//! WebAssembly compilation for `CompiledWasm` modules.

/// Compiles WebAssembly binaries without instantiating them.
///
/// Engines are reference counted internally; clones share compiled code
/// caches.
#[derive(Clone, Default)]
pub struct WasmCompiler {
    engine: wasmtime::Engine,
}

impl WasmCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: wasmtime::Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &wasmtime::Engine {
        &self.engine
    }

    /// Validate and compile `bytes`. The error is the engine's full message.
    pub fn compile(&self, bytes: &[u8]) -> Result<wasmtime::Module, String> {
        wasmtime::Module::from_binary(&self.engine, bytes).map_err(|e| format!("{:#}", e))
    }
}

impl std::fmt::Debug for WasmCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmCompiler").finish_non_exhaustive()
    }
}
