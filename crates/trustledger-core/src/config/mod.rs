pub mod settings;

pub use settings::{DatabaseConfig, NlpConfig, Settings, StateConfig};
