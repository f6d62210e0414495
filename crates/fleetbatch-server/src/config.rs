//! Configuration management

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/fleetbatch";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default number of concurrent batch workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default queue poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default attempts for an import job.
pub const DEFAULT_IMPORT_MAX_ATTEMPTS: i32 = 3;

/// Default exponential backoff base for import retries, in seconds.
pub const DEFAULT_IMPORT_BACKOFF_BASE_SECS: u64 = 5;

/// Default export artifact time-to-live in seconds (30 minutes).
pub const DEFAULT_EXPORT_ARTIFACT_TTL_SECS: u64 = 1800;

/// Default capacity of the notification broadcast channel.
pub const DEFAULT_NOTIFY_CAPACITY: usize = 64;

/// Default timeout before an abandoned active job is requeued, in seconds.
pub const DEFAULT_STALE_JOB_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub batch: BatchConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Batch pipeline configuration: worker pool, retry policy and artifact TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub worker_count: usize,
    pub poll_interval_secs: u64,
    pub import_max_attempts: i32,
    pub import_backoff_base_secs: u64,
    pub export_artifact_ttl_secs: u64,
    pub notify_capacity: usize,
    pub stale_job_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("FLEETBATCH_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_parse("FLEETBATCH_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_parse(
                    "FLEETBATCH_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_parse(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_parse(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_parse(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_parse(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            batch: BatchConfig {
                worker_count: env_parse("BATCH_WORKER_COUNT", DEFAULT_WORKER_COUNT),
                poll_interval_secs: env_parse("BATCH_POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS),
                import_max_attempts: env_parse(
                    "BATCH_IMPORT_MAX_ATTEMPTS",
                    DEFAULT_IMPORT_MAX_ATTEMPTS,
                ),
                import_backoff_base_secs: env_parse(
                    "BATCH_IMPORT_BACKOFF_BASE",
                    DEFAULT_IMPORT_BACKOFF_BASE_SECS,
                ),
                export_artifact_ttl_secs: env_parse(
                    "BATCH_EXPORT_ARTIFACT_TTL",
                    DEFAULT_EXPORT_ARTIFACT_TTL_SECS,
                ),
                notify_capacity: env_parse("BATCH_NOTIFY_CAPACITY", DEFAULT_NOTIFY_CAPACITY),
                stale_job_timeout_secs: env_parse(
                    "BATCH_STALE_JOB_TIMEOUT",
                    DEFAULT_STALE_JOB_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.batch.worker_count == 0 {
            anyhow::bail!("Batch worker_count must be greater than 0");
        }

        if self.batch.import_max_attempts < 1 {
            anyhow::bail!("Batch import_max_attempts must be at least 1");
        }

        if self.batch.export_artifact_ttl_secs == 0 {
            anyhow::bail!("Batch export_artifact_ttl_secs must be greater than 0");
        }

        if self.batch.notify_capacity == 0 {
            anyhow::bail!("Batch notify_capacity must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            batch: BatchConfig {
                worker_count: DEFAULT_WORKER_COUNT,
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
                import_max_attempts: DEFAULT_IMPORT_MAX_ATTEMPTS,
                import_backoff_base_secs: DEFAULT_IMPORT_BACKOFF_BASE_SECS,
                export_artifact_ttl_secs: DEFAULT_EXPORT_ARTIFACT_TTL_SECS,
                notify_capacity: DEFAULT_NOTIFY_CAPACITY,
                stale_job_timeout_secs: DEFAULT_STALE_JOB_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
