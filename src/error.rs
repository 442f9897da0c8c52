use miette::{Diagnostic, GraphicalReportHandler};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    #[error("One of cluster_id, datacenter_id or node_id must be specified")]
    #[diagnostic(code(instaclustr::missing_scope))]
    MissingScope,

    #[error("Invalid cluster id {id:?}")]
    #[diagnostic(
        code(instaclustr::invalid_cluster_id),
        help("cluster ids are UUIDs, e.g. 0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9")
    )]
    InvalidClusterId {
        id: String,
        #[source]
        source: uuid::Error,
    },

    #[error("Empty {0}")]
    #[diagnostic(
        code(instaclustr::empty_credential),
        help("pass it as a flag or set the matching INSTACLUSTR_* environment variable")
    )]
    EmptyCredential(&'static str),

    #[error("Invalid API endpoint {endpoint:?}")]
    #[diagnostic(code(instaclustr::invalid_endpoint))]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid check interval {0}")]
    #[diagnostic(
        code(instaclustr::invalid_interval),
        help("the interval is a non-negative number of seconds")
    )]
    InvalidInterval(f64),

    #[error("Request failed")]
    #[diagnostic(code(instaclustr::http))]
    Http(#[from] reqwest::Error),

    #[error("Node {node_id} reported no {metric}/{kind} values")]
    #[diagnostic(code(instaclustr::missing_values))]
    MissingValues {
        node_id: String,
        metric: &'static str,
        kind: &'static str,
    },

    #[error("Failed to write output")]
    #[diagnostic(code(instaclustr::output))]
    Output(#[from] std::io::Error),
}

/// Render `err` with its diagnostic code and help, the way it is shown on the
/// terminal.
pub fn render_error(handler: &GraphicalReportHandler, err: &Error) -> String {
    let mut report = String::new();
    match handler.render_report(&mut report, err) {
        Ok(()) => report,
        Err(_) => err.to_string(),
    }
}
