pub mod config;
pub mod error;

pub use config::{get_config, init, set_config_path, Config};

#[cfg(test)]
pub mod test_utils;
