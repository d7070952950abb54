use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Logging settings read from `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub environment: String,
    pub level: LogLevel,
    pub dir: String,
}

impl LoggingConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    fn from_vars(environment: Option<String>, level: Option<String>, dir: Option<String>) -> Self {
        let environment = environment.unwrap_or_else(|| "development".to_string());
        let fallback = if environment == "production" {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        Self {
            level: level.as_deref().and_then(LogLevel::parse).unwrap_or(fallback),
            dir: dir.unwrap_or_else(|| "logs".to_string()),
            environment,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_vars(
            std::env::var("ENVIRONMENT").ok(),
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("LOG_DIR").ok(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_defaults_follow_environment() {
        let dev = LoggingConfig::from_vars(None, None, None);
        assert_eq!(dev.level, LogLevel::Debug);
        assert_eq!(dev.dir, "logs");
        assert!(!dev.is_production());

        let prod = LoggingConfig::from_vars(Some("production".to_string()), None, None);
        assert_eq!(prod.level, LogLevel::Info);
        assert!(prod.is_production());
    }

    #[test]
    fn test_explicit_level_and_dir() {
        let config = LoggingConfig::from_vars(
            None,
            Some("WARNING".to_string()),
            Some("/tmp/cms".to_string()),
        );
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.dir, "/tmp/cms");

        let config = LoggingConfig::from_vars(None, Some("loud".to_string()), None);
        assert_eq!(config.level, LogLevel::Debug);
    }
}
