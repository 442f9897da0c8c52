use std::{io, process};

use clap::{Args, Parser, Subcommand};
use miette::GraphicalReportHandler;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use client::Credentials;
use commands::{
    check_interval, get_cluster_contact_points, wait_for_pending_compactions, TokioPause,
};
use error::render_error;
use monitoring::{MonitoringClient, NodeSelector};
use provisioning::ProvisioningClient;

mod client;
mod commands;
mod error;
mod monitoring;
mod provisioning;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();
    let args = Cli::parse();

    if let Err(err) = run(args).await {
        eprintln!("{}", render_error(&GraphicalReportHandler::new(), &err));
        process::exit(1);
    }
    Ok(())
}

async fn run(args: Cli) -> error::Result<()> {
    match args.category {
        Category::Monitoring(monitoring) => {
            let api = MonitoringClient::new(
                Credentials::new(args.username, monitoring.monitoring_api_key)?,
                monitoring.monitoring_api_endpoint.as_deref(),
            )?;
            debug!(endpoint = %api.endpoint(), "monitoring API");

            match monitoring.action {
                MonitoringAction::WaitForPendingCompactions(wait) => {
                    let selector = wait.selector.into_selector()?;
                    let interval = check_interval(wait.check_interval)?;
                    wait_for_pending_compactions(&api, &mut TokioPause, &selector, interval)
                        .await?;
                }
            }
        }
        Category::Provisioning(provisioning) => {
            let api = ProvisioningClient::new(
                Credentials::new(args.username, provisioning.provisioning_api_key)?,
                provisioning.provisioning_api_endpoint.as_deref(),
            )?;
            debug!(endpoint = %api.endpoint(), "provisioning API");

            match provisioning.action {
                ProvisioningAction::GetClusterContactPoints(contact) => {
                    get_cluster_contact_points(
                        &api,
                        &mut io::stdout().lock(),
                        &contact.cluster_id,
                        contact.datacenter.as_deref(),
                        contact.private,
                    )
                    .await?;
                }
            }
        }
    }
    Ok(())
}

// Logs go to stderr so stdout stays clean for piping.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

/// Instaclustr CLI utils
#[derive(Parser)]
#[command(name = "instaclustr-cli", version)]
struct Cli {
    /// Instaclustr username
    #[arg(long, env = "INSTACLUSTR_USERNAME")]
    username: String,

    #[command(subcommand)]
    category: Category,
}

#[derive(Subcommand)]
enum Category {
    /// Monitoring commands
    Monitoring(MonitoringArgs),
    /// Provisioning commands
    Provisioning(ProvisioningArgs),
}

#[derive(Args)]
struct MonitoringArgs {
    /// Instaclustr Monitoring API key
    #[arg(long, env = "INSTACLUSTR_MONITORING_API_KEY", hide_env_values = true)]
    monitoring_api_key: String,

    /// Override the Monitoring API base URL
    #[arg(long, env = "INSTACLUSTR_MONITORING_API_ENDPOINT", value_name = "URL")]
    monitoring_api_endpoint: Option<String>,

    #[command(subcommand)]
    action: MonitoringAction,
}

#[derive(Subcommand)]
enum MonitoringAction {
    /// Wait until pending compactions have settled
    WaitForPendingCompactions(WaitForPendingCompactionsArgs),
}

#[derive(Args)]
struct WaitForPendingCompactionsArgs {
    /// How long to wait between metrics checks
    #[arg(long, default_value_t = 60.0, value_name = "SECONDS")]
    check_interval: f64,

    #[command(flatten)]
    selector: SelectorArgs,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SelectorArgs {
    /// Cluster ID to target with commands
    #[arg(long)]
    cluster_id: Option<String>,

    /// Datacenter ID to target with commands
    #[arg(long)]
    datacenter_id: Option<String>,

    /// Node ID to target with commands
    #[arg(long)]
    node_id: Option<String>,
}

impl SelectorArgs {
    fn into_selector(self) -> error::Result<NodeSelector> {
        NodeSelector::from_ids(
            self.cluster_id.as_deref(),
            self.datacenter_id.as_deref(),
            self.node_id.as_deref(),
        )
    }
}

#[derive(Args)]
struct ProvisioningArgs {
    /// Instaclustr Provisioning API key
    #[arg(long, env = "INSTACLUSTR_PROVISIONING_API_KEY", hide_env_values = true)]
    provisioning_api_key: String,

    /// Override the Provisioning API base URL
    #[arg(long, env = "INSTACLUSTR_PROVISIONING_API_ENDPOINT", value_name = "URL")]
    provisioning_api_endpoint: Option<String>,

    #[command(subcommand)]
    action: ProvisioningAction,
}

#[derive(Subcommand)]
enum ProvisioningAction {
    /// Get list of contact points for a cluster
    GetClusterContactPoints(GetClusterContactPointsArgs),
}

#[derive(Args)]
struct GetClusterContactPointsArgs {
    /// Cluster ID to target with commands
    #[arg(long)]
    cluster_id: String,

    /// Restrict contact points to this datacenter
    #[arg(long)]
    datacenter: Option<String>,

    /// Retrieve private node address instead of public
    #[arg(long)]
    private: bool,
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_wait_for_pending_compactions() {
        let cli = Cli::try_parse_from([
            "instaclustr-cli",
            "--username",
            "user",
            "monitoring",
            "--monitoring-api-key",
            "key",
            "wait-for-pending-compactions",
            "--datacenter-id",
            "dc-1",
        ])
        .unwrap();
        assert_eq!(cli.username, "user");
        let Category::Monitoring(monitoring) = cli.category else {
            panic!("expected monitoring");
        };
        assert_eq!(monitoring.monitoring_api_key, "key");
        let MonitoringAction::WaitForPendingCompactions(wait) = monitoring.action;
        assert_eq!(wait.check_interval, 60.0);
        assert_eq!(
            wait.selector.into_selector().unwrap(),
            NodeSelector::Datacenter("dc-1".into())
        );
    }

    #[test]
    fn test_selector_is_required_and_exclusive() {
        let base = [
            "instaclustr-cli",
            "--username",
            "user",
            "monitoring",
            "--monitoring-api-key",
            "key",
            "wait-for-pending-compactions",
        ];
        assert!(Cli::try_parse_from(base).is_err());

        let both = base
            .iter()
            .copied()
            .chain(["--cluster-id", "c", "--node-id", "n"]);
        assert!(Cli::try_parse_from(both).is_err());
    }

    #[test]
    fn test_parse_get_cluster_contact_points() {
        let cli = Cli::try_parse_from([
            "instaclustr-cli",
            "--username",
            "user",
            "provisioning",
            "--provisioning-api-key",
            "key",
            "get-cluster-contact-points",
            "--cluster-id",
            "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9",
            "--datacenter",
            "dc1",
            "--private",
        ])
        .unwrap();
        let Category::Provisioning(provisioning) = cli.category else {
            panic!("expected provisioning");
        };
        let ProvisioningAction::GetClusterContactPoints(contact) = provisioning.action;
        assert_eq!(contact.cluster_id, "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9");
        assert_eq!(contact.datacenter.as_deref(), Some("dc1"));
        assert!(contact.private);
    }
}
