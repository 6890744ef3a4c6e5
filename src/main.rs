use anyhow::Context;
use clap::Parser;
use iam_provisioner::{AdminClient, AppConfig, Orchestrator};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Provision a realm, user, role and client on an identity provider
#[derive(Debug, Parser)]
#[command(name = "iam-provisioner", version, about)]
struct Cli {
    /// TOML configuration file; built-in defaults apply when omitted
    #[arg(short, long, env = "IAM_PROVISIONER_CONFIG")]
    config: Option<PathBuf>,

    /// Server root URL, including any context path
    #[arg(long)]
    server_url: Option<String>,

    /// Realm the admin account authenticates against
    #[arg(long)]
    realm: Option<String>,

    /// Realm to provision (and scope users, roles and clients to)
    #[arg(long)]
    target_realm: Option<String>,
}

impl Cli {
    /// Apply the command-line overrides, which take precedence over the environment
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(server_url) = &self.server_url {
            config.connection.server_url = server_url.clone();
        }
        if let Some(realm) = &self.realm {
            config.connection.realm = realm.clone();
        }
        if let Some(target_realm) = &self.target_realm {
            config.plan.realm = target_realm.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(
        cli.config.as_deref(),
        |key| std::env::var(key).ok(),
        |config| cli.apply_to(config),
    )
    .context("Failed to load configuration")?;

    let client = AdminClient::connect(&config.connection)
        .await
        .with_context(|| format!("Failed to connect to {}", config.connection.server_url))?;

    let report = Orchestrator::new(&client, &config.plan).run().await;

    let failed = report
        .steps
        .iter()
        .filter(|(_, result)| result.is_failure())
        .count();
    if failed > 0 {
        tracing::warn!(
            "Provisioning finished with {} failed step(s) out of {}",
            failed,
            report.steps.len()
        );
    } else {
        tracing::info!("Provisioning finished without failures");
    }

    Ok(())
}
