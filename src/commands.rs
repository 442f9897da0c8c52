use std::collections::BTreeSet;
use std::io::Write;

use tokio::time::{sleep, Duration};
use tracing::info;

use crate::error::{Error, Result};
use crate::monitoring::{extract_metric_values, MonitoringClient, NodeMetrics, NodeSelector};
use crate::provisioning::{ClusterTopology, ProvisioningClient};

pub const COMPACTIONS_METRIC: &str = "n::compactions";
const COMPACTIONS_NAME: &str = "compactions";
const COMPACTIONS_TYPE: &str = "pendingtasks";
const COMPACTIONS_PERIOD: &str = "1m";

/// Anything that can answer a monitoring query. NaN reporting is always
/// off: missing readings are left out rather than sent as `NaN`.
pub trait MetricsSource {
    async fn fetch_metrics(
        &self,
        metrics: &[&str],
        period: &str,
        selector: &NodeSelector,
    ) -> Result<Vec<NodeMetrics>>;
}

impl MetricsSource for MonitoringClient {
    async fn fetch_metrics(
        &self,
        metrics: &[&str],
        period: &str,
        selector: &NodeSelector,
    ) -> Result<Vec<NodeMetrics>> {
        self.get_metrics(metrics, period, false, selector).await
    }
}

/// Wait between polls.
pub trait Pause {
    async fn pause(&mut self, duration: Duration);
}

pub struct TokioPause;

impl Pause for TokioPause {
    async fn pause(&mut self, duration: Duration) {
        sleep(duration).await
    }
}

pub fn check_interval(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds).map_err(|_| Error::InvalidInterval(seconds))
}

/// Ids of the nodes whose latest reading shows at least one pending
/// compaction. Every node must report the series.
pub fn nodes_with_pending_compactions(nodes: &[NodeMetrics]) -> Result<BTreeSet<&str>> {
    let all_nodes: BTreeSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    let mut nodes_ok = BTreeSet::new();
    for node in nodes {
        let (_, compactions) = extract_metric_values(node, COMPACTIONS_NAME, COMPACTIONS_TYPE)
            .next()
            .ok_or_else(|| Error::MissingValues {
                node_id: node.id.clone(),
                metric: COMPACTIONS_NAME,
                kind: COMPACTIONS_TYPE,
            })?;
        if compactions < 1.0 {
            nodes_ok.insert(node.id.as_str());
        }
    }
    Ok(all_nodes.difference(&nodes_ok).copied().collect())
}

/// Block until no node under `selector` has pending compactions, checking
/// every `check_interval`.
pub async fn wait_for_pending_compactions<M, P>(
    source: &M,
    pause: &mut P,
    selector: &NodeSelector,
    check_interval: Duration,
) -> Result<()>
where
    M: MetricsSource,
    P: Pause,
{
    loop {
        let metrics_data = source
            .fetch_metrics(&[COMPACTIONS_METRIC], COMPACTIONS_PERIOD, selector)
            .await?;
        let nodes_not_ok = nodes_with_pending_compactions(&metrics_data)?;
        if nodes_not_ok.is_empty() {
            info!(%selector, "Pending compactions settled");
            return Ok(());
        }

        let waiting = nodes_not_ok.into_iter().collect::<Vec<_>>().join(", ");
        info!("Nodes are still doing compactions, waiting: {}", waiting);
        pause.pause(check_interval).await;
    }
}

/// Addresses of the nodes in `datacenter` (every datacenter when `None`).
pub fn contact_points<'a>(
    topology: &'a ClusterTopology,
    datacenter: Option<&str>,
    private: bool,
) -> BTreeSet<&'a str> {
    topology
        .data_centres
        .iter()
        .filter(|dc| datacenter.map_or(true, |name| dc.name == name))
        .flat_map(|dc| dc.nodes.iter())
        .map(|node| {
            if private {
                node.private_address.as_str()
            } else {
                node.public_address.as_str()
            }
        })
        .collect()
}

pub async fn get_cluster_contact_points<W: Write>(
    api: &ProvisioningClient,
    out: &mut W,
    cluster_id: &str,
    datacenter: Option<&str>,
    private: bool,
) -> Result<()> {
    let topology = api.get_cluster(cluster_id).await?;
    for addr in contact_points(&topology, datacenter, private) {
        writeln!(out, "{addr}")?;
    }
    out.flush()?;
    Ok(())
}
