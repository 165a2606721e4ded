//! Environment-driven service configuration.
//!
//! Development gets workable defaults; production refuses to start with a
//! missing value rather than silently running on one. Everything is validated
//! once at startup.

use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub invite: InviteConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Settings for outbound join/verification links.
#[derive(Debug, Clone, Deserialize)]
pub struct InviteConfig {
    /// Public base URL the emailed links point at.
    pub base_url: String,
    pub expiry_hours: i64,
    pub verification_expiry_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub admin_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Authenticated,
    Disabled,
}

impl SwaggerConfig {
    /// Whether the interactive UI should be mounted. Dev always serves it;
    /// prod honours the configured mode.
    pub fn serves_ui(&self, environment: &Environment) -> bool {
        match environment {
            Environment::Dev => true,
            Environment::Prod => self.enabled != SwaggerMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub join_attempts: u32,
    pub join_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

fn config_error(message: String) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message))
}

/// Reads environment variables with dev-default / prod-required semantics.
struct EnvReader {
    is_prod: bool,
}

impl EnvReader {
    /// A value with a development default. Production must set it explicitly.
    fn string(&self, key: &str, default: &str) -> Result<String, AppError> {
        match env::var(key) {
            Ok(value) => Ok(value),
            Err(_) if self.is_prod => Err(config_error(format!(
                "{} is required in production but not set",
                key
            ))),
            Err(_) => Ok(default.to_string()),
        }
    }

    /// A value with no sensible default in any environment.
    fn required(&self, key: &str) -> Result<String, AppError> {
        env::var(key).map_err(|_| config_error(format!("{} is required but not set", key)))
    }

    fn parse<T>(&self, key: &str, default: &str) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(key, default)?
            .parse()
            .map_err(|e| config_error(format!("{} is malformed: {}", key, e)))
    }
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(config_error)?;

        let reader = EnvReader {
            is_prod: environment == Environment::Prod,
        };

        let config = IdentityConfig {
            common,
            service_name: reader.string("SERVICE_NAME", "identity-service")?,
            service_version: reader.string("SERVICE_VERSION", env!("CARGO_PKG_VERSION"))?,
            log_level: reader.string("LOG_LEVEL", "info")?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: reader.required("DATABASE_URL")?,
                max_connections: reader.parse("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: reader.parse("DATABASE_MIN_CONNECTIONS", "1")?,
            },
            redis: RedisConfig {
                url: reader.required("REDIS_URL")?,
            },
            jwt: JwtConfig {
                private_key_path: reader.required("JWT_PRIVATE_KEY_PATH")?,
                public_key_path: reader.required("JWT_PUBLIC_KEY_PATH")?,
                access_token_expiry_minutes: reader
                    .parse("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "15")?,
                refresh_token_expiry_days: reader.parse("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "7")?,
            },
            smtp: SmtpConfig {
                host: reader.string("SMTP_HOST", "smtp.gmail.com")?,
                port: reader.parse("SMTP_PORT", "587")?,
                user: reader.required("SMTP_USER")?,
                password: reader.required("SMTP_PASSWORD")?,
            },
            invite: InviteConfig {
                base_url: reader.string("INVITE_BASE_URL", "http://localhost:3000")?,
                expiry_hours: reader.parse("INVITE_EXPIRY_HOURS", "168")?,
                verification_expiry_hours: reader.parse("VERIFICATION_EXPIRY_HOURS", "24")?,
            },
            security: SecurityConfig {
                allowed_origins: reader
                    .string("ALLOWED_ORIGINS", "http://localhost:3000")?
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .collect(),
                admin_api_key: reader.required("ADMIN_API_KEY")?,
            },
            swagger: SwaggerConfig {
                enabled: reader.parse("ENABLE_SWAGGER", "public")?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: reader.parse("RATE_LIMIT_LOGIN_ATTEMPTS", "5")?,
                login_window_seconds: reader.parse("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900")?,
                join_attempts: reader.parse("RATE_LIMIT_JOIN_ATTEMPTS", "10")?,
                join_window_seconds: reader.parse("RATE_LIMIT_JOIN_WINDOW_SECONDS", "900")?,
                global_ip_limit: reader.parse("RATE_LIMIT_GLOBAL_IP_LIMIT", "100")?,
                global_ip_window_seconds: reader
                    .parse("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", "60")?,
            },
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0".to_string()));
        }
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(config_error(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive".to_string(),
            ));
        }
        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(config_error(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive".to_string(),
            ));
        }
        if self.invite.expiry_hours <= 0 {
            return Err(config_error(
                "INVITE_EXPIRY_HOURS must be positive".to_string(),
            ));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error(
                    "Wildcard CORS origin not allowed in production".to_string(),
                ));
            }
            if self.swagger.enabled == SwaggerMode::Public {
                tracing::error!(
                    "Swagger is publicly accessible in production - consider 'authenticated' or 'disabled'"
                );
            }
        }

        Ok(())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(format!("Invalid environment: {}", other)),
        }
    }
}

impl FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "authenticated" => Ok(SwaggerMode::Authenticated),
            "disabled" => Ok(SwaggerMode::Disabled),
            other => Err(format!("Invalid swagger mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_and_swagger_mode_parse() {
        assert_eq!("DEV".parse::<Environment>(), Ok(Environment::Dev));
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());

        assert_eq!("public".parse::<SwaggerMode>(), Ok(SwaggerMode::Public));
        assert!("yes".parse::<SwaggerMode>().is_err());
    }

    #[test]
    fn dev_serves_swagger_regardless_of_mode() {
        let swagger = SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        };
        assert!(swagger.serves_ui(&Environment::Dev));
        assert!(!swagger.serves_ui(&Environment::Prod));
    }
}
