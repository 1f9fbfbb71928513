use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use directories::ProjectDirs;
use http::{header, HeaderValue};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    handlers::{
        check_secret, create_secret, generate_from_pattern, generate_password, health,
        unlock_secret,
    },
    store::{crypto, HashParams, Store, StoreOptions},
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub cors_origins: Option<String>,
    pub store: StoreOptions,
}

/// Parse `name` from the environment, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Default for ServerConfig {
    fn default() -> Self {
        let d = StoreOptions::default();
        let h = HashParams::default();

        // 0 disables the backstop for unopened one-time secrets.
        let one_time_max_age = match env_or(
            "EMBER_ONE_TIME_MAX_AGE_SECS",
            d.one_time_max_age.unwrap_or(0),
        ) {
            0 => None,
            secs => Some(secs),
        };

        Self {
            host: std::env::var("EMBER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("EMBER_PORT", 8080),
            data_dir: std::env::var("EMBER_DATA_DIR").ok().map(PathBuf::from),
            sweep_interval: Duration::from_secs(
                env_or("EMBER_SWEEP_INTERVAL_SECS", 300u64).max(1),
            ),
            cors_origins: std::env::var("EMBER_CORS_ORIGINS").ok(),
            store: StoreOptions {
                default_passphrase: std::env::var("EMBER_DEFAULT_PASSPHRASE")
                    .ok()
                    .filter(|p| !p.is_empty())
                    .unwrap_or(d.default_passphrase),
                require_passphrase: env_flag("EMBER_REQUIRE_PASSPHRASE"),
                min_ttl_seconds: env_or("EMBER_MIN_TTL_SECS", d.min_ttl_seconds),
                max_ttl_seconds: env_or("EMBER_MAX_TTL_SECS", d.max_ttl_seconds),
                max_secret_bytes: env_or("EMBER_MAX_SECRET_BYTES", d.max_secret_bytes),
                one_time_max_age,
                hash: HashParams {
                    memory_kib: env_or("EMBER_ARGON2_MEMORY_KIB", h.memory_kib),
                    iterations: env_or("EMBER_ARGON2_ITERATIONS", h.iterations),
                    ..h
                },
                ..d
            },
        }
    }
}

/// Directory holding `ember.db` and `ember.key`, created if missing.
/// Without an explicit path (`EMBER_DATA_DIR`) this is the platform data dir,
/// e.g. `~/.local/share/ember/`.
pub fn resolve_data_dir(data_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(d) => d.clone(),
        None => ProjectDirs::from("", "", "ember")
            .context("could not determine platform data directory")?
            .data_dir()
            .to_owned(),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create data dir {}", dir.display()))?;
    Ok(dir)
}

/// Build the application router with CORS, security headers and request tracing.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/secret", post(create_secret))
        .route("/secret/{id}", get(check_secret))
        .route("/secret/{id}/unlock", post(unlock_secret))
        .route("/generator", get(generate_from_pattern).post(generate_password));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let key = load_or_create_key(&data_dir)?;
    let store = Store::open(&data_dir.join("ember.db"), key, cfg.store).context("open store")?;

    if store.options().require_passphrase {
        info!("passphrase required for every secret");
    }

    store.clone().spawn_sweep(cfg.sweep_interval);

    let state = AppState { store };
    let app = router(state, build_cors(cfg.cors_origins.as_deref()));

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "ember server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

/// Load the server encryption key from `ember.key`, generating it on first start.
fn load_or_create_key(data_dir: &Path) -> Result<crypto::EncryptionKey> {
    let key_path = data_dir.join("ember.key");
    if key_path.exists() {
        let bytes = std::fs::read(&key_path).context("read ember.key")?;
        crypto::load_key(&bytes).ok_or_else(|| {
            anyhow::anyhow!(
                "ember.key is corrupt (expected 32 bytes, got {})",
                bytes.len()
            )
        })
    } else {
        let key = crypto::generate_key();
        write_private(&key_path, key.as_bytes()).context("write ember.key")?;
        info!("generated new encryption key");
        Ok(key)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}
