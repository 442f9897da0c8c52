use std::fmt::Display;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::client::{ApiClient, ApiFamily};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Monitoring;

impl ApiFamily for Monitoring {
    const DEFAULT_ENDPOINT: &'static str = "https://api.instaclustr.com/monitoring/v1/";
}

pub type MonitoringClient = ApiClient<Monitoring>;

/// The entity a metrics query is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSelector {
    Cluster(String),
    Datacenter(String),
    Node(String),
}

impl NodeSelector {
    /// Pick a scope out of three optional ids. When several are given the
    /// most specific one wins: node, then datacenter, then cluster. Empty
    /// ids count as missing.
    pub fn from_ids(
        cluster_id: Option<&str>,
        datacenter_id: Option<&str>,
        node_id: Option<&str>,
    ) -> Result<Self> {
        let present = |id: Option<&str>| id.filter(|id| !id.is_empty()).map(str::to_string);
        if let Some(id) = present(node_id) {
            Ok(Self::Node(id))
        } else if let Some(id) = present(datacenter_id) {
            Ok(Self::Datacenter(id))
        } else if let Some(id) = present(cluster_id) {
            Ok(Self::Cluster(id))
        } else {
            Err(Error::MissingScope)
        }
    }

    fn class(&self) -> &'static str {
        match self {
            Self::Cluster(_) => "clusters",
            Self::Datacenter(_) => "datacenters",
            Self::Node(_) => "nodes",
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Cluster(id) | Self::Datacenter(id) | Self::Node(id) => id,
        }
    }

    fn path(&self) -> String {
        format!("{}/{}", self.class(), self.id())
    }
}

impl Display for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cluster(id) => write!(f, "cluster {id}"),
            Self::Datacenter(id) => write!(f, "datacenter {id}"),
            Self::Node(id) => write!(f, "node {id}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NodeMetrics {
    pub id: String,
    pub payload: Vec<MetricSeries>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricSeries {
    pub metric: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub values: Vec<MetricSample>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricSample {
    #[serde(deserialize_with = "iso8601")]
    pub time: DateTime<FixedOffset>,
    #[serde(deserialize_with = "float_or_string")]
    pub value: f64,
}

// Values arrive as strings ("12.0", "NaN") more often than as numbers.
fn float_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

// Offset formats first; anything without an offset is taken as UTC.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y%m%dT%H%M%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

pub fn parse_iso8601(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time);
    }
    if let Some(time) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
    {
        return Some(time);
    }

    let naive = text.strip_suffix(['Z', 'z']).unwrap_or(text);
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .or_else(|| {
            ["%Y-%m-%d", "%Y%m%d"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(naive, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

fn iso8601<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_iso8601(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 time {text:?}")))
}

impl MonitoringClient {
    /// Fetch `metrics` for every node under `selector`, aggregated over
    /// `period`.
    pub async fn get_metrics<I, S>(
        &self,
        metrics: I,
        period: &str,
        report_nan: bool,
        selector: &NodeSelector,
    ) -> Result<Vec<NodeMetrics>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let metrics = metrics
            .into_iter()
            .map(|metric| metric.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        debug!(%selector, %metrics, period, "fetching metrics");

        let response = self
            .get(&selector.path())?
            .query(&[
                ("metrics", metrics.as_str()),
                ("period", period),
                ("reportNaN", if report_nan { "true" } else { "false" }),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Like [`MonitoringClient::get_metrics`], for callers holding the three
    /// scope ids separately. Nothing is sent unless one of them is set.
    #[allow(dead_code)]
    pub async fn get_metrics_for<I, S>(
        &self,
        metrics: I,
        period: &str,
        report_nan: bool,
        cluster_id: Option<&str>,
        datacenter_id: Option<&str>,
        node_id: Option<&str>,
    ) -> Result<Vec<NodeMetrics>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selector = NodeSelector::from_ids(cluster_id, datacenter_id, node_id)?;
        self.get_metrics(metrics, period, report_nan, &selector).await
    }
}

/// All `(time, value)` pairs of the series in `node` matching both `name` and
/// `kind`, in payload order.
pub fn extract_metric_values<'a>(
    node: &'a NodeMetrics,
    name: &'a str,
    kind: &'a str,
) -> impl Iterator<Item = (DateTime<FixedOffset>, f64)> + 'a {
    node.payload
        .iter()
        .filter(move |series| series.metric == name && series.kind == kind)
        .flat_map(|series| series.values.iter().map(|sample| (sample.time, sample.value)))
}
