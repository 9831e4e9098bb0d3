mod autoconfig;
mod discover;
mod error;
mod options;
mod static_config;

#[cfg(test)]
mod tests;

pub use autoconfig::{ZEROSSL_DIRECTORY, apply_autoconfig, apply_autoconfig_with, well_known_directory};
pub use discover::{discover, resolve_glob};
pub use error::ConfigError;
pub use options::{
    CertbotOptions, DEFAULT_DASHBOARD_PORT, DEFAULT_LABEL_PREFIX, DEFAULT_STATS_PORT, DeploymentMode,
    DiscoverMode, KubernetesOptions, Options, PluginConfig, PluginOptions, SslMode, StatsOptions,
    find_binary, split_list,
};
pub use static_config::{StaticConfig, StaticContainer, StaticPlugins, yaml_to_string};
