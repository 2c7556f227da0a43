use std::str::FromStr;

/// Server configuration loaded from environment variables.
///
/// | Env Var                    | Default                 |
/// |----------------------------|-------------------------|
/// | `HOST`                     | `0.0.0.0`               |
/// | `PORT`                     | `3000`                  |
/// | `CORS_ORIGINS`             | `http://localhost:5173` |
/// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
/// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                    |
/// | `DATABASE_MAX_CONNECTIONS` | `20`                    |
///
/// `DATABASE_URL` is read separately by the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated in `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Upper bound for one request, merges included.
    pub request_timeout_secs: u64,
    /// Time allowed for closing the database pool after the server stops
    /// accepting connections.
    pub shutdown_timeout_secs: u64,
    pub database_max_connections: u32,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// Panics on values that do not parse, so a misconfigured server never
    /// starts.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PORT", 3000),
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:5173".into()),
            ),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20),
        }
    }

    /// `host:port` for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
