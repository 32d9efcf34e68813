use std::env;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub run_migrations: bool,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    /// Accept `X-User-Role` / `X-Org-ID` / `X-Driver-ID` from the gateway
    /// when no bearer token is present.
    pub trust_identity_headers: bool,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => database_url_from_parts(&DatabaseParts::from_env())?,
        };
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let run_migrations = env_flag("RUN_MIGRATIONS", true);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "snowops-auth".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "snowops-tickets".to_string());
        let jwt_expiry_minutes = env::var("JWT_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("JWT_EXPIRY_MINUTES must be an integer")?;
        let trust_identity_headers = env_flag("AUTH_TRUST_HEADERS", true);
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();

        Ok(Self {
            database_url,
            database_max_pool_size,
            run_migrations,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_expiry_minutes,
            trust_identity_headers,
            cors_allowed_origin,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Discrete connection settings used when `DATABASE_URL` is absent.
#[derive(Debug, Clone)]
struct DatabaseParts {
    host: String,
    port: String,
    user: String,
    password: String,
    name: String,
    sslmode: String,
}

impl DatabaseParts {
    fn from_env() -> Self {
        let var = |key: &str, default: &str| env::var(key).unwrap_or_else(|_| default.to_string());
        Self {
            host: var("DB_HOST", "localhost"),
            port: var("DB_PORT", "5432"),
            user: var("DB_USER", "postgres"),
            password: var("DB_PASSWORD", ""),
            name: var("DB_NAME", "snowops_tickets"),
            sslmode: var("DB_SSLMODE", "disable"),
        }
    }
}

fn database_url_from_parts(parts: &DatabaseParts) -> Result<String> {
    let mut url = Url::parse("postgres://localhost").context("invalid base database url")?;
    url.set_host(Some(&parts.host))
        .context("DB_HOST must be a valid host")?;
    let port: u16 = parts.port.parse().context("DB_PORT must be a valid u16")?;
    let _ = url.set_port(Some(port));
    let _ = url.set_username(&parts.user);
    if !parts.password.is_empty() {
        let _ = url.set_password(Some(&parts.password));
    }
    url.set_path(&format!("/{}", parts.name));
    url.query_pairs_mut().append_pair("sslmode", &parts.sslmode);
    Ok(url.to_string())
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
