//! Query execution events

/// A single observed SQL statement execution.
///
/// Events are produced at the proxy/gateway boundary, handed to
/// [`SqlMonitor::submit`](crate::SqlMonitor::submit) and never retained past
/// aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEvent {
    /// Raw SQL text as observed on the wire.
    pub sql: String,
    /// Whether the statement executed successfully.
    pub success: bool,
    /// Address of the database host that served the statement.
    pub host: String,
    /// Schema that was being queried.
    pub schema: String,
    /// User name of the connecting client.
    pub user: String,
    /// Execution time in milliseconds.
    pub exec_time_ms: f64,
    /// Unix timestamp (seconds) of the moment the statement was observed.
    pub seen_at: i64,
}
