use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::client::{ApiClient, ApiFamily};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Provisioning;

impl ApiFamily for Provisioning {
    const DEFAULT_ENDPOINT: &'static str = "https://api.instaclustr.com/provisioning/v1/";
}

pub type ProvisioningClient = ApiClient<Provisioning>;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTopology {
    pub data_centres: Vec<DataCentre>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DataCentre {
    pub name: String,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub public_address: String,
    pub private_address: String,
}

/// Parse a cluster id in any UUID notation.
pub fn parse_cluster_id(cluster_id: &str) -> Result<Uuid> {
    Uuid::parse_str(cluster_id).map_err(|source| Error::InvalidClusterId {
        id: cluster_id.to_string(),
        source,
    })
}

impl ProvisioningClient {
    /// Fetch the topology of `cluster_id`. The id is validated, and
    /// normalised to its lowercase hyphenated form, before any request goes
    /// out.
    pub async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterTopology> {
        let cluster_uuid = parse_cluster_id(cluster_id)?;
        debug!(cluster = %cluster_uuid, "fetching cluster");

        let response = self
            .get(&cluster_uuid.hyphenated().to_string())?
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
