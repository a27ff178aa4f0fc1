mod loader;

pub use loader::{Config, PrimaryConfig};
