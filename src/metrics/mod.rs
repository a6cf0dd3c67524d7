mod collectors;
mod exporter;

pub use collectors::*;
pub use exporter::*;

use crate::server::ConnectionSummary;
use crate::Result;
use std::collections::BTreeMap;

/// One observation handed to the exporter.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Gauge {
        name: String,
        help: String,
        labels: BTreeMap<String, String>,
        value: f64,
    },

    /// A collector could not query its source
    Invalid { collector: String, error: String },
}

impl Sample {
    pub fn gauge(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Self {
        Sample::Gauge {
            name: name.into(),
            help: help.into(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        }
    }

    pub fn invalid(collector: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Sample::Invalid {
            collector: collector.into(),
            error: error.to_string(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Sample::Invalid { .. })
    }
}

/// Produces samples on demand.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    /// Never fails; source errors come back as a single invalid sample
    fn collect(&self) -> Vec<Sample>;
}

/// Path as reported by the path manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathItem {
    pub source_ready: bool,
}

/// Query surface of whatever owns the publish/play paths
pub trait PathSource: Send + Sync {
    fn list_paths(&self) -> Result<BTreeMap<String, PathItem>>;
}

/// Query surface of whatever owns RTMP connections
pub trait ConnectionSource: Send + Sync {
    fn list_connections(&self) -> Result<Vec<ConnectionSummary>>;
}
