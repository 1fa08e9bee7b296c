pub mod config;
pub mod events;
pub mod extraction;
pub mod screening;

pub use config::{Config, ToolConfig};
pub use events::ScreeningEvent;
pub use screening::*;
