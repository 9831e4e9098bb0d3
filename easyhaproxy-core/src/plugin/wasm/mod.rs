pub(crate) mod wasm_plugin;
