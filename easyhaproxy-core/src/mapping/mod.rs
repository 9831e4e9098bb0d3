mod builder;
mod route;


pub use builder::{BuildOutput, RouteBuilder};
pub use route::{Backend, HTTPS_PORT, HostDef, ListenDef, RouteTable};
