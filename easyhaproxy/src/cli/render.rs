use super::RunArgs;
use anyhow::{Context, Result};
use easyhaproxy_core::discovery::{Discover, Discovery};
use easyhaproxy_core::plugin::PluginHost;
use easyhaproxy_core::reconcile::{load_static_options, render_snapshot};

/// Runs one discovery and mapping pass and prints the configuration.
///
/// No files are written and no process is started.
pub async fn run(args: RunArgs) -> Result<()> {
    let (options, paths) = args.resolve()?;
    let (options, static_error) = load_static_options(options, &paths);
    if let Some(e) = static_error {
        eprintln!("warning: ignoring static option blocks: {e}");
    }

    let plugins_dir = options.plugins.plugins_dir(&paths.base);
    let mut plugins =
        PluginHost::load(&options.plugins, &plugins_dir).context("failed to load plugins")?;

    let mut discovery = Discovery::connect(&options, &paths)
        .await
        .with_context(|| format!("failed to start {} discovery", options.discover))?;
    let snapshot = discovery.refresh().await.context("discovery failed")?;

    let rendered = render_snapshot(&options, &paths, &snapshot, &mut plugins)
        .context("failed to build configuration")?;
    print!("{}", rendered.config);

    Ok(())
}
