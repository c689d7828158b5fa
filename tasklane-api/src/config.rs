/// Configuration management for the API server
///
/// Loads configuration from environment variables into a type-safe struct.
/// In development a `.env` file is read first (via `dotenvy`).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DATABASE_CA_CERT`: Path to the database CA certificate (optional)
/// - `JWT_ACCESS_SECRET`: Access-token secret, at least 32 characters (required)
/// - `JWT_REFRESH_SECRET`: Refresh-token secret, at least 32 characters and
///   different from the access secret (required)
/// - `FRONTEND_ORIGINS`: Comma-separated allowed origins, `*` for any
///   (default: `http://localhost:5173`)
/// - `LOG_LEVEL`: Filter used when `RUST_LOG` is unset (default: info)
/// - `API_HOST` / `PORT`: Bind address (default: 0.0.0.0:3000)
/// - `APP_ENV`: `development` or `production` (default: development)
///
/// # Example
///
/// ```no_run
/// use tasklane_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use tasklane_shared::auth::jwt::JwtSecrets;
use tasklane_shared::db::pool::DatabaseConfig;

/// Minimum JWT secret length
pub const MIN_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseSettings,
    pub jwt: JwtConfig,
    pub logging: LoggingConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("APP_ENV must be 'development' or 'production', got '{}'", other),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    pub environment: Environment,
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub ca_cert_path: Option<String>,
}

impl DatabaseSettings {
    /// Pool configuration for [`tasklane_shared::db::pool::create_pool`]
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            ca_cert_path: self.ca_cert_path.clone(),
            ..Default::default()
        }
    }
}

/// JWT configuration
///
/// Both secrets must be kept secret and be at least 32 bytes.
/// Generate with: `openssl rand -hex 32`
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
}

impl JwtConfig {
    pub fn secrets(&self) -> JwtSecrets {
        JwtSecrets::new(self.access_secret.clone(), self.refresh_secret.clone())
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig").finish_non_exhaustive()
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    /// - The JWT secrets are too short or identical
    pub fn from_env() -> anyhow::Result<Self> {
        let production = env::var("APP_ENV")
            .ok()
            .and_then(|v| v.parse::<Environment>().ok())
            .map(|e| e.is_production())
            .unwrap_or(false);

        // Load .env file if present (development only)
        if !production {
            dotenvy::dotenv().ok();
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let environment = get("APP_ENV")
            .map(|v| v.parse::<Environment>())
            .transpose()?
            .unwrap_or(Environment::Development);

        let host = get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = get("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("PORT is invalid: {}", e))?;

        let cors_origins = parse_origins(
            &get("FRONTEND_ORIGINS").unwrap_or_else(|| "http://localhost:5173".to_string()),
        );

        let database_url = require("DATABASE_URL")?;
        let max_connections = get("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;
        let ca_cert_path = get("DATABASE_CA_CERT");

        let access_secret = require("JWT_ACCESS_SECRET")?;
        let refresh_secret = require("JWT_REFRESH_SECRET")?;

        if access_secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_ACCESS_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
        }
        if refresh_secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_REFRESH_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
        }
        if access_secret == refresh_secret {
            anyhow::bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
        }

        let level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                environment,
            },
            database: DatabaseSettings {
                url: database_url,
                max_connections,
                ca_cert_path,
            },
            jwt: JwtConfig {
                access_secret,
                refresh_secret,
            },
            logging: LoggingConfig { level },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn is_production(&self) -> bool {
        self.api.environment.is_production()
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
