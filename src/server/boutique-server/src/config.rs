//! Command line and environment configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use boutique_api::{ApiConfig, SignupPolicy};
use boutique_auth::{PublicPath, PublicPaths, TokenConfig};
use boutique_crypto::SigningKey;
use boutique_storage::{MemoryBackend, StorageBackend};
use boutique_storage_sqlite::SqliteBackend;
use clap::Parser;
use tracing::{info, warn};

const DATABASE_NAME: &str = "boutique";

#[derive(Parser, Debug)]
#[command(name = "boutique-server")]
#[command(about = "Boutique - e-commerce backend with bearer-token authentication")]
#[command(version)]
pub struct Cli {
    /// Enable development mode (in-memory storage, random signing key,
    /// privileged self-signup)
    #[arg(long, env = "BOUTIQUE_DEV_MODE")]
    pub dev: bool,

    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8080", env = "BOUTIQUE_BIND_ADDRESS")]
    pub bind: String,

    /// Data directory for the SQLite database
    #[arg(long, default_value = "data", env = "BOUTIQUE_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Token signing key, base64 encoded, at least 32 bytes
    #[arg(long, env = "BOUTIQUE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = 86_400, env = "BOUTIQUE_TOKEN_TTL_SECS")]
    pub token_ttl_secs: u64,

    /// Token issuer claim
    #[arg(long, default_value = "boutique", env = "BOUTIQUE_TOKEN_ISSUER")]
    pub token_issuer: String,

    /// Upper bound on a principal lookup, in milliseconds
    #[arg(long, default_value_t = 5_000, env = "BOUTIQUE_LOOKUP_TIMEOUT_MS")]
    pub lookup_timeout_ms: u64,

    /// Origin allowed by CORS
    #[arg(
        long,
        default_value = "http://localhost:4200",
        env = "BOUTIQUE_CORS_ORIGIN"
    )]
    pub cors_origin: String,

    /// Extra path reachable without a token; a trailing `/` or `*` makes it
    /// a prefix (repeatable)
    #[arg(long = "public-path")]
    pub public_paths: Vec<String>,
}

impl Cli {
    /// Token issuance settings.
    pub fn token_config(&self) -> anyhow::Result<TokenConfig> {
        if self.token_ttl_secs == 0 {
            bail!("--token-ttl-secs must be greater than zero");
        }
        Ok(TokenConfig {
            issuer: self.token_issuer.clone(),
            ttl: Duration::from_secs(self.token_ttl_secs),
        })
    }

    /// API settings: allow-list and lookup bound.
    pub fn api_config(&self) -> ApiConfig {
        let mut public_paths = PublicPaths::default();
        for path in &self.public_paths {
            public_paths.push(PublicPath::parse(path));
        }

        ApiConfig {
            public_paths,
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
        }
    }

    /// Signup rules. Privileged self-signup is a dev mode convenience.
    pub fn signup_policy(&self) -> SignupPolicy {
        SignupPolicy {
            allow_privileged_roles: self.dev,
        }
    }

    /// Loads the signing key.
    ///
    /// Outside dev mode the key must be configured; in dev mode a random key
    /// is generated when none is given, so tokens die with the process.
    pub fn signing_key(&self) -> anyhow::Result<SigningKey> {
        match &self.jwt_secret {
            Some(secret) => {
                let bytes = BASE64
                    .decode(secret.trim())
                    .context("BOUTIQUE_JWT_SECRET is not valid base64")?;
                SigningKey::from_bytes(&bytes).context("invalid signing key")
            },
            None if self.dev => {
                warn!("No signing key configured, using a random one");
                Ok(SigningKey::generate())
            },
            None => bail!("a signing key is required: set --jwt-secret or BOUTIQUE_JWT_SECRET"),
        }
    }

    /// Opens the storage backend.
    pub async fn storage(&self) -> anyhow::Result<Arc<dyn StorageBackend>> {
        if self.dev {
            info!("Using in-memory storage");
            return Ok(Arc::new(MemoryBackend::new()));
        }

        let backend = SqliteBackend::open(&self.data_dir, DATABASE_NAME)
            .await
            .with_context(|| format!("failed to open storage in {}", self.data_dir.display()))?;
        Ok(Arc::new(backend))
    }
}
