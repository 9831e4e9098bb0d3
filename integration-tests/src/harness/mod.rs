pub mod certs;
pub mod deployment;
pub mod fake;
pub mod tracing;

pub use deployment::Deployment;
pub use fake::FakeBinaries;
pub use self::tracing::{CapturedEvent, events_with, init_test_tracing};
