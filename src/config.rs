use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// Expiry for offline rosters and mailboxes, refreshed on write.
    pub mailbox_ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("TASKGRID_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            mailbox_ttl_seconds: env::var("MAILBOX_TTL")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(86_400), // 24 hours
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            redis_url: "redis://localhost:6379".to_string(),
            mailbox_ttl_seconds: 86_400,
        }
    }
}
