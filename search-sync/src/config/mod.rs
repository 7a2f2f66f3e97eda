pub mod dependencies;

pub use dependencies::{settings_from_vars, ConnectionMode, Dependencies};
