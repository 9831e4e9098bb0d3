use crate::conf::Options;
use crate::discovery::EntityMap;
use crate::mapping::{BuildOutput, RouteBuilder};
use crate::paths::Paths;
use crate::plugin::{PluginError, PluginHost};
use crate::render::ConfigRenderer;

/// Proxy configuration text and the build it came from.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub config: String,
    pub build: BuildOutput,
}

/// Maps one snapshot and renders it. Touches neither disk nor processes.
pub fn render_snapshot(
    options: &Options,
    paths: &Paths,
    snapshot: &EntityMap,
    plugins: &mut PluginHost,
) -> Result<Rendered, PluginError> {
    let build = RouteBuilder::new(options).build(snapshot, plugins)?;
    let config = ConfigRenderer::new(options, paths).render(&build);
    Ok(Rendered { config, build })
}
