//! Launches, validates and replaces the proxy child process.

mod command;
mod error;
mod pidfile;
mod process;
mod snippets;

#[cfg(test)]
mod tests;

pub use command::{Action, Launch, ProxyLayout, STARTUP_GRACE, VALIDATION_TIMEOUT};
pub use error::SupervisorError;
pub use pidfile::{pid_alive, read_pid, remove_pid};
pub use process::Supervisor;
pub use snippets::{SnippetMap, custom_snippets};
