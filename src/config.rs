use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub scraper: ScraperConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Generative AI provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Hard deadline for a single provider round trip, in seconds.
    pub timeout_secs: u64,
    /// `batch` issues one provider call per set; `per-question` fans out.
    pub batch_mode: bool,
    /// Upper bound on concurrent provider calls in per-question mode.
    pub concurrency: usize,
}

/// Headless-browser scraper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Optional Quizlet session cookie, forwarded to reduce bot challenges.
    pub session_cookie: Option<String>,
    pub user_agent: String,
    /// End-to-end deadline for one scrape, in seconds.
    pub timeout_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Owner assigned to generated quizzes when no session header is present.
    pub default_user_id: String,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            ai: AiConfig::from_env()?,
            scraper: ScraperConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            ai_model = ?self.ai.model,
            ai_batch_mode = self.ai.batch_mode,
            scraper_cookie_configured = self.scraper.session_cookie.is_some(),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.contains("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.ai.concurrency == 0 {
            return Err(anyhow!("GENERATION_CONCURRENCY must be greater than 0"));
        }

        if self.ai.api_key.is_empty() || self.ai.api_key == "your-api-key" {
            warn!("Gemini API key appears to be placeholder or empty - distractor generation will not work");
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.to_lowercase().as_str()) {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:quiz_generator.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .unwrap_or_else(|_| "your-api-key".to_string());

        let base_url = env::var("GEMINI_BASE_URL").ok();
        let model = env::var("GEMINI_MODEL").ok();

        let timeout_secs = env::var("AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let batch_mode = match env::var("GENERATION_MODE")
            .unwrap_or_else(|_| "batch".to_string())
            .to_lowercase()
            .as_str()
        {
            "per-question" | "per_question" => false,
            "batch" => true,
            other => {
                info!("Unknown GENERATION_MODE '{}', defaulting to batch", other);
                true
            }
        };

        let concurrency = env::var("GENERATION_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(4);

        Ok(AiConfig {
            api_key,
            base_url,
            model,
            timeout_secs,
            batch_mode,
            concurrency,
        })
    }
}

impl ScraperConfig {
    fn from_env() -> Result<Self> {
        let session_cookie = env::var("QUIZLET_SESSION_COOKIE").ok().filter(|v| !v.is_empty());

        let user_agent = env::var("SCRAPER_USER_AGENT").unwrap_or_else(|_| {
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string()
        });

        let timeout_secs = env::var("SCRAPER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        Ok(ScraperConfig {
            session_cookie,
            user_agent,
            timeout_secs,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let default_user_id = env::var("DEFAULT_USER_ID")
            .unwrap_or_else(|_| "local-user".to_string());

        Ok(ServerConfig {
            port,
            host,
            default_user_id,
        })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,quiz_generator=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY")
            .unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sqlite:quiz_generator.db"), "sqli***r.db");
    }

    #[test]
    fn test_database_config_defaults() {
        unsafe { env::remove_var("DATABASE_URL"); }

        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.url, "sqlite:quiz_generator.db");
    }

    #[test]
    fn test_ai_config_defaults() {
        unsafe {
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("AI_TIMEOUT_SECS");
            env::remove_var("GENERATION_MODE");
            env::remove_var("GENERATION_CONCURRENCY");
        }

        let config = AiConfig::from_env().unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.batch_mode);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_generation_mode_parsing() {
        unsafe { env::set_var("GENERATION_MODE", "per-question"); }
        let config = AiConfig::from_env().unwrap();
        assert!(!config.batch_mode);

        unsafe { env::set_var("GENERATION_MODE", "nonsense"); }
        let config = AiConfig::from_env().unwrap();
        assert!(config.batch_mode);

        unsafe { env::remove_var("GENERATION_MODE"); }
    }

    #[test]
    fn test_config_validation() {
        let config = Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
            },
            ai: AiConfig {
                api_key: "test-key".to_string(),
                base_url: None,
                model: None,
                timeout_secs: 30,
                batch_mode: true,
                concurrency: 4,
            },
            scraper: ScraperConfig {
                session_cookie: None,
                user_agent: "test-agent".to_string(),
                timeout_secs: 10,
            },
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
                default_user_id: "local-user".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
        };

        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.server.port = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.ai.concurrency = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config;
        invalid_config.database.url = "postgres://nope".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_invalid_port_parsing() {
        unsafe { env::set_var("PORT", "not-a-number"); }
        let result = ServerConfig::from_env();
        assert!(result.is_err());

        unsafe { env::remove_var("PORT"); }
    }
}
