use std::env;

/// How updates arrive from Telegram. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Webhook,
    Poll,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Telegram
    pub bot_token: String,
    pub webhook_secret: String,
    pub alert_chat_id: Option<i64>,
    pub transport: Transport,

    // Channel registry (JSON file; embedded defaults when unset)
    pub channels_file: Option<String>,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Parsing defaults
    pub default_currency: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        let transport = match env::var("TRANSPORT").as_deref() {
            Ok("poll") => Transport::Poll,
            _ => Transport::Webhook,
        };
        Self {
            database_url: required_env("DATABASE_URL"),
            bot_token: required_env("TELEGRAM_BOT_TOKEN"),
            webhook_secret: required_env("WEBHOOK_SECRET"),
            alert_chat_id: env::var("ALERT_CHAT_ID")
                .ok()
                .map(|v| v.parse().expect("ALERT_CHAT_ID must be a chat id")),
            transport,
            channels_file: env::var("CHANNELS_FILE").ok(),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
