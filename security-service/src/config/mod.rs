use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Longest window or block any setting may ask for: ten years.
const MAX_DURATION_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
const MAX_DURATION_MINUTES: i64 = MAX_DURATION_SECONDS / 60;

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub reset: ResetConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// Maximum entries kept in memory; the oldest is evicted first.
    pub capacity: usize,
    pub flood_window_seconds: i64,
    /// Denial events accepted per flood key and window before suppression.
    pub flood_threshold: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            flood_window_seconds: 60,
            flood_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccessConfig {
    pub max_attempts_per_window: usize,
    pub attempt_window_seconds: i64,
    pub block_duration_seconds: i64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_window: 10,
            attempt_window_seconds: 60,
            block_duration_seconds: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResetConfig {
    pub otp_expiry_minutes: i64,
    pub max_requests_per_day: u32,
    pub first_lockout_minutes: i64,
    pub second_lockout_minutes: i64,
    pub final_lockout_minutes: i64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            otp_expiry_minutes: 10,
            max_requests_per_day: 3,
            first_lockout_minutes: 5,
            second_lockout_minutes: 60,
            final_lockout_minutes: 24 * 60,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            audit: AuditConfig::default(),
            access: AccessConfig::default(),
            reset: ResetConfig::default(),
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_prod();

        let audit_defaults = AuditConfig::default();
        let access_defaults = AccessConfig::default();
        let reset_defaults = ResetConfig::default();

        let config = SecurityConfig {
            common,
            audit: AuditConfig {
                capacity: get_parsed(
                    "SECURITY_AUDIT_CAPACITY",
                    audit_defaults.capacity,
                    is_prod,
                )?,
                flood_window_seconds: get_parsed(
                    "SECURITY_AUDIT_FLOOD_WINDOW_SECONDS",
                    audit_defaults.flood_window_seconds,
                    is_prod,
                )?,
                flood_threshold: get_parsed(
                    "SECURITY_AUDIT_FLOOD_THRESHOLD",
                    audit_defaults.flood_threshold,
                    is_prod,
                )?,
            },
            access: AccessConfig {
                max_attempts_per_window: get_parsed(
                    "SECURITY_ACCESS_MAX_ATTEMPTS_PER_WINDOW",
                    access_defaults.max_attempts_per_window,
                    is_prod,
                )?,
                attempt_window_seconds: get_parsed(
                    "SECURITY_ACCESS_ATTEMPT_WINDOW_SECONDS",
                    access_defaults.attempt_window_seconds,
                    is_prod,
                )?,
                block_duration_seconds: get_parsed(
                    "SECURITY_ACCESS_BLOCK_DURATION_SECONDS",
                    access_defaults.block_duration_seconds,
                    is_prod,
                )?,
            },
            reset: ResetConfig {
                otp_expiry_minutes: get_parsed(
                    "SECURITY_RESET_OTP_EXPIRY_MINUTES",
                    reset_defaults.otp_expiry_minutes,
                    is_prod,
                )?,
                max_requests_per_day: get_parsed(
                    "SECURITY_RESET_MAX_REQUESTS_PER_DAY",
                    reset_defaults.max_requests_per_day,
                    is_prod,
                )?,
                first_lockout_minutes: get_parsed(
                    "SECURITY_RESET_FIRST_LOCKOUT_MINUTES",
                    reset_defaults.first_lockout_minutes,
                    is_prod,
                )?,
                second_lockout_minutes: get_parsed(
                    "SECURITY_RESET_SECOND_LOCKOUT_MINUTES",
                    reset_defaults.second_lockout_minutes,
                    is_prod,
                )?,
                final_lockout_minutes: get_parsed(
                    "SECURITY_RESET_FINAL_LOCKOUT_MINUTES",
                    reset_defaults.final_lockout_minutes,
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.audit.capacity == 0 {
            return Err(config_error("SECURITY_AUDIT_CAPACITY must be greater than 0"));
        }

        if self.audit.flood_window_seconds <= 0 {
            return Err(config_error(
                "SECURITY_AUDIT_FLOOD_WINDOW_SECONDS must be positive",
            ));
        }

        if self.audit.flood_threshold == 0 {
            return Err(config_error(
                "SECURITY_AUDIT_FLOOD_THRESHOLD must be greater than 0",
            ));
        }

        if self.access.max_attempts_per_window == 0 {
            return Err(config_error(
                "SECURITY_ACCESS_MAX_ATTEMPTS_PER_WINDOW must be greater than 0",
            ));
        }

        if self.access.attempt_window_seconds <= 0 || self.access.block_duration_seconds <= 0 {
            return Err(config_error(
                "Access attempt window and block duration must be positive",
            ));
        }

        if self.reset.otp_expiry_minutes <= 0 {
            return Err(config_error(
                "SECURITY_RESET_OTP_EXPIRY_MINUTES must be positive",
            ));
        }

        if self.reset.max_requests_per_day == 0 {
            return Err(config_error(
                "SECURITY_RESET_MAX_REQUESTS_PER_DAY must be greater than 0",
            ));
        }

        let ladder = [
            self.reset.first_lockout_minutes,
            self.reset.second_lockout_minutes,
            self.reset.final_lockout_minutes,
        ];
        if ladder[0] <= 0 || ladder.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(config_error(
                "Reset lockout durations must be positive and strictly increasing",
            ));
        }

        let seconds = [
            ("SECURITY_AUDIT_FLOOD_WINDOW_SECONDS", self.audit.flood_window_seconds),
            ("SECURITY_ACCESS_ATTEMPT_WINDOW_SECONDS", self.access.attempt_window_seconds),
            ("SECURITY_ACCESS_BLOCK_DURATION_SECONDS", self.access.block_duration_seconds),
        ];
        let minutes = [
            ("SECURITY_RESET_OTP_EXPIRY_MINUTES", self.reset.otp_expiry_minutes),
            ("SECURITY_RESET_FINAL_LOCKOUT_MINUTES", self.reset.final_lockout_minutes),
        ];
        let too_long = seconds
            .iter()
            .filter(|(_, value)| *value > MAX_DURATION_SECONDS)
            .chain(minutes.iter().filter(|(_, value)| *value > MAX_DURATION_MINUTES))
            .map(|(key, _)| *key)
            .next();
        if let Some(key) = too_long {
            return Err(config_error(&format!("{} must not exceed ten years", key)));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.to_string()))
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

fn get_parsed<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString,
    T::Err: std::fmt::Display,
{
    let default = default.to_string();
    get_env(key, Some(&default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}
