//! Configuration shared by every service binary.
//!
//! Values come from an optional `configuration` file overlaid with
//! `APP__`-prefixed environment variables; the env side wins. Service-specific
//! settings layer their own structs on top of this one.

use crate::error::AppError;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "Config::default_port")]
    pub port: u16,
}

impl Config {
    fn default_port() -> u16 {
        8080
    }

    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let sources = config::Config::builder()
            .add_source(config::File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let loaded = sources.try_deserialize()?;
        Ok(loaded)
    }
}
