// src/config/mod.rs
pub mod settings;
pub mod state;

pub use settings::{Settings, SettingsHandle};
pub use state::PersistedState;
