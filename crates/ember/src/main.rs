use std::io::Read;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ember_server::generator::{self, GeneratorSpec, PassphraseOptions, RandomOptions, Separator};
use rand::rngs::OsRng;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ember", about = "Ember: burn-after-reading secrets and password generator", version)]
struct Cli {
    /// Ember server URL (default: http://localhost:8080 or $EMBER_SERVER)
    #[arg(long, env = "EMBER_SERVER", default_value = "http://localhost:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Ember HTTP server
    Serve {
        /// Port to listen on (default: $EMBER_PORT or 8080)
        #[arg(long, env = "EMBER_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $EMBER_HOST or 0.0.0.0)
        #[arg(long, env = "EMBER_HOST", default_value = "0.0.0.0")]
        host: String,
    },
    /// Generate a password locally
    Generate {
        #[command(subcommand)]
        mode: GenerateMode,
    },
    /// Store a secret and print its link. Reads stdin when no secret is given.
    Share {
        secret: Option<String>,
        /// Passphrase required to open the secret
        #[arg(long, env = "EMBER_PASSPHRASE")]
        passphrase: Option<String>,
        /// Keep the secret readable for this long (e.g. 30m, 1h, 7d) instead of burning it on first view
        #[arg(long)]
        ttl: Option<String>,
    },
    /// Check whether a secret is still available without opening it
    Check {
        /// Secret id or link
        target: String,
    },
    /// Open a secret. One-time secrets are destroyed by this.
    Open {
        /// Secret id or link
        target: String,
        #[arg(long, env = "EMBER_PASSPHRASE")]
        passphrase: Option<String>,
    },
}

#[derive(Subcommand)]
enum GenerateMode {
    /// Expand a pattern such as `W*2n*4s` or `r*16`
    Pattern { pattern: String },
    /// Random characters
    Random(RandomArgs),
    /// Words from the built-in list
    Passphrase(PassphraseArgs),
}

#[derive(Args)]
struct RandomArgs {
    #[arg(long, default_value_t = 16)]
    length: usize,
    #[arg(long)]
    no_uppercase: bool,
    #[arg(long)]
    no_digits: bool,
    #[arg(long)]
    symbols: bool,
}

#[derive(Args)]
struct PassphraseArgs {
    #[arg(long, default_value_t = 4)]
    words: usize,
    #[arg(long)]
    capitalize: bool,
    /// A single character, or `mixed`
    #[arg(long, default_value = "-")]
    separator: String,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("EMBER_LOG_LEVEL")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(host, port).await,

        Commands::Generate { mode } => {
            let spec = generator_spec(mode)?;
            println!("{}", generator::generate(&spec, &mut OsRng)?);
            Ok(())
        }

        Commands::Share {
            secret,
            passphrase,
            ttl,
        } => {
            let secret = match secret {
                Some(s) => s,
                None => read_stdin()?,
            };
            cmd_share(&cli.server, &secret, passphrase.as_deref(), ttl.as_deref()).await
        }

        Commands::Check { target } => cmd_check(&cli.server, &extract_id(&target)?).await,

        Commands::Open { target, passphrase } => {
            cmd_open(&cli.server, &extract_id(&target)?, passphrase.as_deref()).await
        }
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16) -> Result<()> {
    let cfg = ember_server::ServerConfig {
        host,
        port,
        ..Default::default()
    };

    ember_server::run(cfg).await
}

fn generator_spec(mode: GenerateMode) -> Result<GeneratorSpec> {
    Ok(match mode {
        GenerateMode::Pattern { pattern } => GeneratorSpec::Pattern(pattern),
        GenerateMode::Random(a) => GeneratorSpec::Random(RandomOptions {
            length: a.length,
            uppercase: !a.no_uppercase,
            digits: !a.no_digits,
            symbols: a.symbols,
        }),
        GenerateMode::Passphrase(a) => GeneratorSpec::Passphrase(PassphraseOptions {
            word_count: a.words,
            capitalize: a.capitalize,
            separator: a.separator.parse::<Separator>()?,
        }),
    })
}

async fn cmd_share(
    server: &str,
    secret: &str,
    passphrase: Option<&str>,
    ttl: Option<&str>,
) -> Result<()> {
    let ttl_seconds = ttl.map(parse_duration).transpose()?;
    let body = serde_json::json!({
        "secret": secret,
        "passphrase": passphrase,
        "expiration_method": if ttl_seconds.is_some() { "time" } else { "one_time" },
        "ttl_seconds": ttl_seconds,
    });

    let resp = Client::new()
        .post(format!("{}/api/secret", base(server)))
        .json(&body)
        .send()
        .await
        .context("HTTP request failed")?;
    let json = expect_success(resp).await?;

    let id = json["id"].as_str().context("server response has no id")?;
    println!("{}/secret/{id}", base(server));
    match (json["expiration_method"].as_str(), json["expires_in"].as_u64()) {
        (Some("time"), Some(secs)) => eprintln!("readable for {}", format_duration(secs)),
        (_, Some(secs)) => eprintln!("burns on first view, or in {} if never opened", format_duration(secs)),
        _ => eprintln!("burns on first view"),
    }
    Ok(())
}

async fn cmd_check(server: &str, id: &str) -> Result<()> {
    let resp = Client::new()
        .get(format!("{}/api/secret/{id}", base(server)))
        .send()
        .await
        .context("HTTP request failed")?;
    let json = expect_success(resp).await?;

    match json["expiration_method"].as_str() {
        Some("one_time") => println!("available (burns on first view)"),
        Some("time") => println!("available (time-limited)"),
        _ => println!("available"),
    }
    Ok(())
}

async fn cmd_open(server: &str, id: &str, passphrase: Option<&str>) -> Result<()> {
    let resp = Client::new()
        .post(format!("{}/api/secret/{id}/unlock", base(server)))
        .json(&serde_json::json!({ "passphrase": passphrase }))
        .send()
        .await
        .context("HTTP request failed")?;
    let json = expect_success(resp).await?;

    println!("{}", json["secret"].as_str().unwrap_or(""));
    if json["burned"].as_bool() == Some(true) {
        eprintln!("this secret has now been destroyed");
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn base(server: &str) -> &str {
    server.trim_end_matches('/')
}

async fn expect_success(resp: Response) -> Result<Value> {
    let status = resp.status();
    let json: Value = resp.json().await.unwrap_or_default();
    if status.is_success() {
        return Ok(json);
    }
    debug!(%status, "request failed");
    match json["message"].as_str() {
        Some(message) => anyhow::bail!("{message}"),
        None => anyhow::bail!("server returned {status}"),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("read secret from stdin")?;
    // Drop the newline a shell pipe leaves behind, nothing else.
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    if buf.is_empty() {
        anyhow::bail!("no secret given on stdin");
    }
    Ok(buf)
}

/// Accept a bare id or any link ending in `/secret/<id>`.
fn extract_id(target: &str) -> Result<String> {
    let path = target.trim().split(['?', '#']).next().unwrap_or_default();
    let id = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if id.is_empty() {
        anyhow::bail!("no secret id in {target:?}");
    }
    Ok(id.to_owned())
}

/// Parse human duration strings like "1h", "30m", "7d", "5s" into seconds.
fn parse_duration(s: &str) -> Result<u64> {
    let d: humantime::Duration = s
        .parse()
        .with_context(|| format!("invalid duration: {s}"))?;
    Ok(d.as_secs())
}

fn format_duration(secs: u64) -> String {
    if secs >= 86400 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
