use jsonwebtoken::Algorithm;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// 12 hours.
pub const ACCESS_TOKEN_EXPIRE_MINUTES_DEFAULT: i64 = 60 * 12;
/// 7 days.
pub const REFRESH_TOKEN_EXPIRE_MINUTES_DEFAULT: i64 = 60 * 24 * 7;
/// Upper bound for either token lifetime: 366 days.
pub const MAX_TOKEN_EXPIRE_MINUTES: i64 = 60 * 24 * 366;

/// Service configuration, built once at startup and passed by value from then on.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub links: LinkConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Token signing and lifetime settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub algorithm: Algorithm,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from: String,
}

/// Where links in outgoing emails point.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub control_panel_url: String,
    pub reset_password_path: String,
}

impl LinkConfig {
    /// Page on the control panel where both invite and reset links land.
    pub fn reset_password_url(&self) -> String {
        format!(
            "{}{}",
            self.control_panel_url.trim_end_matches('/'),
            self.reset_password_path
        )
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("user-auth"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", None, true)?),
                algorithm: parse_algorithm(&get_env("JWT_ALGORITHM", None, true)?)?,
                access_token_expiry_minutes: parse_env(
                    "ACCESS_TOKEN_EXPIRE_MINUTES",
                    &ACCESS_TOKEN_EXPIRE_MINUTES_DEFAULT.to_string(),
                    false,
                )?,
                refresh_token_expiry_minutes: parse_env(
                    "REFRESH_TOKEN_EXPIRE_MINUTES",
                    &REFRESH_TOKEN_EXPIRE_MINUTES_DEFAULT.to_string(),
                    false,
                )?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: parse_env("SMTP_PORT", "587", is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: Secret::new(get_env("SMTP_PASSWORD", Some(""), is_prod)?),
                from: get_env("SMTP_FROM", Some("no-reply@localhost"), is_prod)?,
            },
            links: LinkConfig {
                control_panel_url: get_env(
                    "CONTROL_PANEL_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
                reset_password_path: get_env(
                    "RESET_PASSWORD_PATH",
                    Some("/reset-password"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5", false)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", false)?,
                password_reset_attempts: parse_env(
                    "RATE_LIMIT_PASSWORD_RESET_ATTEMPTS",
                    "3",
                    false,
                )?,
                password_reset_window_seconds: parse_env(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        check_lifetime(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            self.jwt.access_token_expiry_minutes,
        )?;
        check_lifetime(
            "REFRESH_TOKEN_EXPIRE_MINUTES",
            self.jwt.refresh_token_expiry_minutes,
        )?;

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

fn check_lifetime(name: &str, minutes: i64) -> Result<(), AppError> {
    if minutes <= 0 {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be positive",
            name
        )));
    }
    if minutes > MAX_TOKEN_EXPIRE_MINUTES {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must not exceed {} (366 days)",
            name,
            MAX_TOKEN_EXPIRE_MINUTES
        )));
    }
    Ok(())
}

/// Only shared-secret algorithms are accepted; the secret signs and verifies.
pub fn parse_algorithm(value: &str) -> Result<Algorithm, AppError> {
    let algorithm: Algorithm = value
        .trim()
        .to_uppercase()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid JWT_ALGORITHM: {}", e)))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "JWT_ALGORITHM {:?} is not a shared-secret algorithm",
            other
        ))),
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
