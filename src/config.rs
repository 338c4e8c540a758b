use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_user: String,
    pub db_pass: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub redis_addr: String,
    pub redis_tls: bool,
    pub aws_region: String,
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub aws_bucket_name: String,
    pub object_store_domain: String,
    pub store_timeout: Duration,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Student records API with photo uploads")]
pub struct Args {
    /// Host to bind to (overrides STUDENT_SERVICE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides STUDENT_SERVICE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database user (overrides DB_USER)
    #[arg(long)]
    pub db_user: Option<String>,

    /// Database password (overrides DB_PASS)
    #[arg(long)]
    pub db_pass: Option<String>,

    /// Database host (overrides DB_HOST)
    #[arg(long)]
    pub db_host: Option<String>,

    /// Database port (overrides DB_PORT)
    #[arg(long)]
    pub db_port: Option<u16>,

    /// Database name (overrides DB_NAME)
    #[arg(long)]
    pub db_name: Option<String>,

    /// Cache address as host:port (overrides REDIS_ADDR)
    #[arg(long)]
    pub redis_addr: Option<String>,

    /// Connect to the cache without TLS (overrides REDIS_TLS)
    #[arg(long)]
    pub redis_plaintext: bool,

    /// Object store region (overrides AWS_REGION)
    #[arg(long)]
    pub aws_region: Option<String>,

    /// Photo bucket (overrides AWS_BUCKET_NAME)
    #[arg(long)]
    pub aws_bucket_name: Option<String>,

    /// Domain used in public photo URLs (overrides OBJECT_STORE_DOMAIN)
    #[arg(long)]
    pub object_store_domain: Option<String>,

    /// Timeout for each external call, in seconds (overrides STORE_TIMEOUT_SECS)
    #[arg(long)]
    pub store_timeout_secs: Option<u64>,

    /// Largest accepted request body, in bytes (overrides MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Create the schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values returned by `lookup` (normally the environment).
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("missing required environment variable {}", key))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let redis_tls = match lookup("REDIS_TLS") {
            Some(value) => !matches!(value.to_ascii_lowercase().as_str(), "0" | "false" | "no"),
            None => true,
        };

        let store_timeout_secs = match args.store_timeout_secs {
            Some(v) => v,
            None => parse_or(&lookup, "STORE_TIMEOUT_SECS", 10)?,
        };

        // --- Merge ---
        Ok(Self {
            host: args
                .host
                .unwrap_or_else(|| or_default("STUDENT_SERVICE_HOST", "0.0.0.0")),
            port: match args.port {
                Some(v) => v,
                None => parse_or(&lookup, "STUDENT_SERVICE_PORT", 8080)?,
            },
            db_user: match args.db_user {
                Some(v) => v,
                None => required("DB_USER")?,
            },
            db_pass: args.db_pass.unwrap_or_else(|| or_default("DB_PASS", "")),
            db_host: args.db_host.unwrap_or_else(|| or_default("DB_HOST", "127.0.0.1")),
            db_port: match args.db_port {
                Some(v) => v,
                None => parse_or(&lookup, "DB_PORT", 3306)?,
            },
            db_name: match args.db_name {
                Some(v) => v,
                None => required("DB_NAME")?,
            },
            redis_addr: match args.redis_addr {
                Some(v) => v,
                None => required("REDIS_ADDR")?,
            },
            redis_tls: redis_tls && !args.redis_plaintext,
            aws_region: match args.aws_region {
                Some(v) => v,
                None => required("AWS_REGION")?,
            },
            aws_access_key: required("AWS_ACCESS_KEY")?,
            aws_secret_key: required("AWS_SECRET_KEY")?,
            aws_bucket_name: match args.aws_bucket_name {
                Some(v) => v,
                None => required("AWS_BUCKET_NAME")?,
            },
            object_store_domain: args
                .object_store_domain
                .unwrap_or_else(|| or_default("OBJECT_STORE_DOMAIN", "s3.amazonaws.com")),
            store_timeout: Duration::from_secs(store_timeout_secs),
            max_upload_bytes: match args.max_upload_bytes {
                Some(v) => v,
                None => parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

// Secrets stay out of the startup log.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_user", &self.db_user)
            .field("db_pass", &"<redacted>")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("redis_addr", &self.redis_addr)
            .field("redis_tls", &self.redis_tls)
            .field("aws_region", &self.aws_region)
            .field("aws_access_key", &"<redacted>")
            .field("aws_secret_key", &"<redacted>")
            .field("aws_bucket_name", &self.aws_bucket_name)
            .field("object_store_domain", &self.object_store_domain)
            .field("store_timeout", &self.store_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}
