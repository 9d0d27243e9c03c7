//! `pcloud`: reconcile declared Privilege Cloud credentials, safes and safe
//! members against the vault.
//!
//! The declared resources live in a JSON plan, the tracked ones in a JSON
//! state file. Every run rewrites the state with whatever succeeded, and
//! exits non-zero when any resource failed.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;
mod engine;
mod files;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pcloud_client::{AuthConfig, HttpVault, MemoryVault, VaultClient};
use pcloud_core::Reconciler;

use crate::config::RuntimeConfig;
use crate::engine::{Engine, Report, Vault};
use crate::files::{Plan, State};

#[derive(Parser)]
#[command(
    name = "pcloud",
    version,
    about = "pcloud: reconcile Privilege Cloud credentials and safes against a plan",
    long_about = None,
    after_help = "Environment variables:\n  \
         CYBERARK_PROVIDER_TENANT         Identity tenant id\n  \
         CYBERARK_PROVIDER_DOMAIN         Privilege Cloud subdomain\n  \
         CYBERARK_PROVIDER_CLIENT_ID      Service user\n  \
         CYBERARK_PROVIDER_CLIENT_SECRET  Service user secret\n  \
         PCLOUD_LOG_LEVEL, PCLOUD_LOG_FORMAT, PCLOUD_DEADLINE_SECS,\n  \
         PCLOUD_MAX_RETRIES, PCLOUD_REQUEST_TIMEOUT_SECS"
)]
struct Cli {
    /// Vault backend to talk to.
    #[arg(long, value_enum, env = "PCLOUD_BACKEND", default_value = "http")]
    backend: Backend,

    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Privilege Cloud REST API.
    Http,
    /// In-process vault that forgets everything on exit.
    Memory,
}

#[derive(clap::Args)]
struct ProviderArgs {
    /// Identity tenant id, e.g. `abc1234`.
    #[arg(long, env = "CYBERARK_PROVIDER_TENANT", global = true)]
    tenant: Option<String>,

    /// Privilege Cloud subdomain, e.g. `acme`.
    #[arg(long, env = "CYBERARK_PROVIDER_DOMAIN", global = true)]
    domain: Option<String>,

    /// Service user name.
    #[arg(long, env = "CYBERARK_PROVIDER_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Service user secret.
    #[arg(
        long,
        env = "CYBERARK_PROVIDER_CLIENT_SECRET",
        global = true,
        hide_env_values = true
    )]
    client_secret: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, refresh and delete resources so the state matches the plan.
    Apply {
        /// Declared resources.
        #[arg(long)]
        plan: PathBuf,
        /// Tracked resources; created if missing.
        #[arg(long, default_value = "pcloud.state.json")]
        state: PathBuf,
    },
    /// Re-read every tracked resource from the vault.
    Refresh {
        #[arg(long, default_value = "pcloud.state.json")]
        state: PathBuf,
    },
    /// Delete every tracked resource.
    Destroy {
        #[arg(long, default_value = "pcloud.state.json")]
        state: PathBuf,
    },
    /// Authenticate and print the bearer token.
    Token,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = RuntimeConfig::from_env();
    init_tracing(&config);

    match run(cli, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &RuntimeConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Returns whether every resource reconciled without failure.
async fn run(cli: Cli, config: &RuntimeConfig) -> Result<bool> {
    match cli.command {
        Commands::Apply { plan, state } => {
            let desired = Plan::load(&plan)?;
            let tracked = State::load(&state)?;
            let engine = build_engine(cli.backend, &cli.provider, config).await?;
            let (next, report) = engine.apply(desired, tracked).await;
            finish(&state, &next, &report)
        }
        Commands::Refresh { state } => {
            let tracked = State::load(&state)?;
            let engine = build_engine(cli.backend, &cli.provider, config).await?;
            let (next, report) = engine.refresh(tracked).await;
            finish(&state, &next, &report)
        }
        Commands::Destroy { state } => {
            let tracked = State::load(&state)?;
            let engine = build_engine(cli.backend, &cli.provider, config).await?;
            let (next, report) = engine.destroy(tracked).await;
            finish(&state, &next, &report)
        }
        Commands::Token => {
            let vault = connect(cli.backend, &cli.provider, config).await?;
            let token = vault
                .auth_token()
                .context("vault client holds no bearer token")?;
            println!("{token}");
            Ok(true)
        }
    }
}

async fn build_engine(
    backend: Backend,
    provider: &ProviderArgs,
    config: &RuntimeConfig,
) -> Result<Engine> {
    let vault = connect(backend, provider, config).await?;
    Ok(Engine::new(Reconciler::new(vault).with_deadline(config.deadline)))
}

async fn connect(
    backend: Backend,
    provider: &ProviderArgs,
    config: &RuntimeConfig,
) -> Result<Vault> {
    match backend {
        Backend::Memory => {
            tracing::info!("using in-memory vault; nothing is persisted");
            Ok(Arc::new(MemoryVault::new()) as Vault)
        }
        Backend::Http => {
            let auth = auth_config(provider, config)?;
            let vault = HttpVault::authenticate(auth)
                .await
                .context("authenticating with the identity service")?;
            Ok(Arc::new(vault) as Vault)
        }
    }
}

fn auth_config(provider: &ProviderArgs, config: &RuntimeConfig) -> Result<AuthConfig> {
    fn required<'a>(value: Option<&'a String>, flag: &str, var: &str) -> Result<&'a str> {
        value
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("missing provider setting: pass --{flag} or set {var}"))
    }

    let tenant = required(provider.tenant.as_ref(), "tenant", "CYBERARK_PROVIDER_TENANT")?;
    let domain = required(provider.domain.as_ref(), "domain", "CYBERARK_PROVIDER_DOMAIN")?;
    let client_id = required(
        provider.client_id.as_ref(),
        "client-id",
        "CYBERARK_PROVIDER_CLIENT_ID",
    )?;
    let client_secret = required(
        provider.client_secret.as_ref(),
        "client-secret",
        "CYBERARK_PROVIDER_CLIENT_SECRET",
    )?;

    let mut auth = AuthConfig::for_tenant(tenant, domain, client_id, client_secret);
    auth.timeout = config.request_timeout;
    auth.max_retries = config.max_retries;
    Ok(auth)
}

fn finish(path: &Path, state: &State, report: &Report) -> Result<bool> {
    state.save(path)?;

    for (address, outcome) in &report.outcomes {
        println!("{address}: {outcome}");
    }
    let failures = report.failures();
    println!(
        "{} resources, {failures} failed, {} tracked",
        report.outcomes.len(),
        state.resources.len()
    );
    Ok(failures == 0)
}
