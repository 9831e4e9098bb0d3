pub mod certbot;
pub mod conf;
pub mod dashboard;
pub mod discovery;
pub mod labels;
pub mod logging;
pub mod mapping;
pub mod paths;
pub mod plugin;
pub mod reconcile;
pub mod render;
pub mod supervisor;
