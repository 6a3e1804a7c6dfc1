pub mod protocol;
pub mod runner;
pub mod tracing_setup;

pub use protocol::{Request, Response};
pub use runner::{RunOptions, Runner};
pub use tracing_setup::init_tracing;
