pub mod builtin;
pub mod core;
#[cfg(feature = "wasm")]
pub(crate) mod wasm;

#[cfg(test)]
mod tests;

pub use self::core::collector::FragmentCollector;
pub use self::core::errors::PluginError;
pub use self::core::registry::{PluginHost, builtin_builders};
pub use self::core::result::{PluginResult, ResourceRequest};
pub use self::core::{Plugin, PluginContext, PluginKind};
