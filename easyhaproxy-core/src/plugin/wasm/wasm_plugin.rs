use anyhow::{Context, Result, anyhow};
use std::path::Path;
use wasmtime::{Engine, Instance, Memory, Module, Store};

use crate::conf::PluginConfig;
use crate::plugin::core::errors::PluginError;
use crate::plugin::core::result::PluginResult;
use crate::plugin::core::{Plugin, PluginContext, PluginKind};

/// WASM-backed plugin (core module, no WASI, one instance per process).
///
/// Exchange is JSON through linear memory: the host asks the guest to
/// `alloc` a buffer, copies the payload in, and reads the reply from the
/// `(ptr << 32) | len` value returned by `process`.
pub struct WasmPlugin {
    name: String,
    kind: PluginKind,
    store: Store<()>,
    instance: Instance,
    memory: Memory,
}

impl WasmPlugin {
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        Self::instantiate(path).map_err(|e| PluginError::load(path, format!("{e:#}")))
    }

    fn instantiate(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("plugin file has no name"))?;

        let engine = Engine::default();
        let module = Module::from_file(&engine, path)?;
        let mut store = Store::new(&engine, ());
        let instance = Instance::new(&mut store, &module, &[])?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| anyhow!("module does not export `memory`"))?;

        let kind = instance
            .get_typed_func::<(), i32>(&mut store, "kind")
            .context("module does not export `kind`")?
            .call(&mut store, ())?;
        let kind = match kind {
            0 => PluginKind::Global,
            1 => PluginKind::Route,
            other => return Err(anyhow!("unknown plugin kind {other}")),
        };

        Ok(Self {
            name,
            kind,
            store,
            instance,
            memory,
        })
    }

    fn write_input(&mut self, bytes: &[u8]) -> Result<(i32, i32)> {
        let alloc = self
            .instance
            .get_typed_func::<i32, i32>(&mut self.store, "alloc")
            .context("module does not export `alloc`")?;

        let len = i32::try_from(bytes.len())?;
        let ptr = alloc.call(&mut self.store, len)?;
        self.memory
            .write(&mut self.store, usize::try_from(ptr)?, bytes)?;

        Ok((ptr, len))
    }

    fn call_configure(&mut self, config: &PluginConfig) -> Result<()> {
        let payload = serde_json::to_vec(config)?;
        let (ptr, len) = self.write_input(&payload)?;

        self.instance
            .get_typed_func::<(i32, i32), ()>(&mut self.store, "configure")
            .context("module does not export `configure`")?
            .call(&mut self.store, (ptr, len))?;

        Ok(())
    }

    fn call_process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult> {
        let payload = serde_json::to_vec(ctx)?;
        let (ptr, len) = self.write_input(&payload)?;

        let packed = self
            .instance
            .get_typed_func::<(i32, i32), i64>(&mut self.store, "process")
            .context("module does not export `process`")?
            .call(&mut self.store, (ptr, len))?;

        let out_ptr = ((packed as u64) >> 32) as usize;
        let out_len = ((packed as u64) & 0xffff_ffff) as usize;

        let mut buf = vec![0u8; out_len];
        self.memory.read(&self.store, out_ptr, &mut buf)?;

        Ok(serde_json::from_slice(&buf)?)
    }
}

impl Plugin for WasmPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PluginKind {
        self.kind
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.call_configure(config)
            .map_err(|e| PluginError::configure(&self.name, format!("{e:#}")))
    }

    fn process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError> {
        self.call_process(ctx)
            .map_err(|e| PluginError::execute(&self.name, ctx.domain, format!("{e:#}")))
    }
}
