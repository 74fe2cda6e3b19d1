use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed browser origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Identity provider token settings. Tokens are HS256 JWTs signed with the
/// project's JWT secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_audience() -> String {
    "authenticated".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default)]
    pub smart_price_id: Option<String>,
    #[serde(default)]
    pub pro_price_id: Option<String>,
    #[serde(default)]
    pub scale_price_id: Option<String>,
    #[serde(default = "default_success_url")]
    pub success_url: String,
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
}

fn default_success_url() -> String {
    "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:3000/pricing".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    /// Bearer secret for the cron endpoints. Empty disables them.
    pub secret: String,
    pub reset_interval_secs: u64,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            reset_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    pub enable_endpoints: bool,
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)
                .with_context(|| format!("failed to parse config file {config_path}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_defaults()?,
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read config file {config_path}"));
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    /// Builds a configuration purely from environment variables when no
    /// config file exists.
    fn from_env_defaults() -> anyhow::Result<Self> {
        let database_url = get_env("DATABASE_URL")
            .ok_or_else(|| anyhow!("DATABASE_URL is not set and config.toml was not found"))?;

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
                cors_origins: Vec::new(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            auth: AuthConfig {
                jwt_secret: get_env("SUPABASE_JWT_SECRET").unwrap_or_default(),
                audience: get_env("SUPABASE_JWT_AUDIENCE").unwrap_or_else(default_audience),
            },
            stripe: StripeConfig {
                secret_key: get_env("STRIPE_SECRET_KEY").unwrap_or_default(),
                webhook_secret: get_env("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
                smart_price_id: get_env("STRIPE_PRICE_SMART"),
                pro_price_id: get_env("STRIPE_PRICE_PRO"),
                scale_price_id: get_env("STRIPE_PRICE_SCALE"),
                success_url: get_env("STRIPE_SUCCESS_URL").unwrap_or_else(default_success_url),
                cancel_url: get_env("STRIPE_CANCEL_URL").unwrap_or_else(default_cancel_url),
            },
            openai: OpenAiConfig::default(),
            cron: CronConfig::default(),
            debug: DebugConfig::default(),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("SUPABASE_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = env::var("SUPABASE_JWT_AUDIENCE") {
            self.auth.audience = v;
        }
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.stripe.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_PRICE_SMART") {
            self.stripe.smart_price_id = Some(v);
        }
        if let Ok(v) = env::var("STRIPE_PRICE_PRO") {
            self.stripe.pro_price_id = Some(v);
        }
        if let Ok(v) = env::var("STRIPE_PRICE_SCALE") {
            self.stripe.scale_price_id = Some(v);
        }
        if let Ok(v) = env::var("STRIPE_SUCCESS_URL") {
            self.stripe.success_url = v;
        }
        if let Ok(v) = env::var("STRIPE_CANCEL_URL") {
            self.stripe.cancel_url = v;
        }
        if let Ok(v) = env::var("OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Ok(v) = env::var("OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        if let Ok(v) = env::var("OPENAI_MODEL") {
            self.openai.model = v;
        }
        if let Ok(v) = env::var("CRON_SECRET") {
            self.cron.secret = v;
        }
        if let Ok(v) = env::var("CRON_RESET_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            self.cron.reset_interval_secs = n;
        }
        if let Ok(v) = env::var("ENABLE_DEBUG_ENDPOINTS") {
            self.debug.enable_endpoints = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [database]
        url = "postgres://localhost/etsmart"
        max_connections = 5

        [auth]
        jwt_secret = "secret"

        [stripe]
        secret_key = "sk_test_123"
        webhook_secret = "whsec_123"
        smart_price_id = "price_smart"
    "#;

    #[test]
    fn test_parse_minimal_config_fills_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.auth.audience, "authenticated");
        assert_eq!(config.stripe.smart_price_id.as_deref(), Some("price_smart"));
        assert!(config.stripe.pro_price_id.is_none());
        assert!(config.stripe.success_url.contains("{CHECKOUT_SESSION_ID}"));
        assert_eq!(config.cron.reset_interval_secs, 3600);
        assert!(config.cron.secret.is_empty());
        assert!(!config.debug.enable_endpoints);
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_parse_rejects_missing_sections() {
        assert!(Config::parse("[server]\nhost = \"x\"\nport = 1").is_err());
    }
}
