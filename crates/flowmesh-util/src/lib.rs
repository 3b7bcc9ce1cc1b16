pub mod config;
pub mod logging;

pub use config::FlowmeshConfig;
pub use logging::init_tracing;
