pub mod config;
pub mod error;

pub use config::{load_dotenv, Config, LoggingConfig, RuntimeConfig, SchedulerChoice};
pub use error::*;
