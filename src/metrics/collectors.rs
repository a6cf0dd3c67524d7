use crate::metrics::{Collector, ConnectionSource, PathSource, Sample};
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;

/// `paths{name, state}`, one sample per path
pub struct PathCollector {
    source: Arc<dyn PathSource>,
}

impl PathCollector {
    pub const METRIC: &'static str = "paths";
    const HELP: &'static str = "The name and state of path";

    pub fn new(source: Arc<dyn PathSource>) -> Self {
        PathCollector { source }
    }
}

impl Collector for PathCollector {
    fn name(&self) -> &str {
        Self::METRIC
    }

    fn collect(&self) -> Vec<Sample> {
        match self.source.list_paths() {
            Ok(paths) => paths
                .iter()
                .map(|(name, item)| {
                    let state = if item.source_ready { "ready" } else { "notReady" };
                    Sample::gauge(
                        Self::METRIC,
                        Self::HELP,
                        &[("name", name.as_str()), ("state", state)],
                        1.0,
                    )
                })
                .collect(),
            Err(e) => {
                warn!("failed to list paths: {}", e);
                vec![Sample::invalid(Self::METRIC, e)]
            }
        }
    }
}

/// `rtmp_conns{state}`, number of connections in each state
pub struct RtmpConnCollector {
    source: Arc<dyn ConnectionSource>,
}

impl RtmpConnCollector {
    pub const METRIC: &'static str = "rtmp_conns";
    const HELP: &'static str = "Number of RTMP connections per state";

    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        RtmpConnCollector { source }
    }
}

impl Collector for RtmpConnCollector {
    fn name(&self) -> &str {
        Self::METRIC
    }

    fn collect(&self) -> Vec<Sample> {
        let connections = match self.source.list_connections() {
            Ok(connections) => connections,
            Err(e) => {
                warn!("failed to list RTMP connections: {}", e);
                return vec![Sample::invalid(Self::METRIC, e)];
            }
        };

        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for conn in &connections {
            *counts.entry(conn.state.label()).or_default() += 1;
        }

        counts
            .into_iter()
            .map(|(state, count)| {
                Sample::gauge(Self::METRIC, Self::HELP, &[("state", state)], count as f64)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::metrics::PathItem;
    use crate::server::ConnectionRegistry;
    use crate::{Error, Result};

    struct FixedPaths(Vec<(&'static str, bool)>);

    impl PathSource for FixedPaths {
        fn list_paths(&self) -> Result<BTreeMap<String, PathItem>> {
            Ok(self
                .0
                .iter()
                .map(|(name, ready)| (name.to_string(), PathItem { source_ready: *ready }))
                .collect())
        }
    }

    struct Broken;

    impl PathSource for Broken {
        fn list_paths(&self) -> Result<BTreeMap<String, PathItem>> {
            Err(Error::collector("path manager terminated"))
        }
    }

    impl ConnectionSource for Broken {
        fn list_connections(&self) -> Result<Vec<crate::server::ConnectionSummary>> {
            Err(Error::collector("registry unavailable"))
        }
    }

    fn label<'a>(sample: &'a Sample, key: &str) -> &'a str {
        match sample {
            Sample::Gauge { labels, .. } => labels[key].as_str(),
            Sample::Invalid { .. } => panic!("invalid sample"),
        }
    }

    #[test]
    fn test_paths_ready_and_not_ready() {
        let source = FixedPaths(vec![("cam1", true), ("cam2", true), ("cam3", false)]);
        let samples = PathCollector::new(Arc::new(source)).collect();
        assert_eq!(samples.len(), 3);
        assert_eq!(label(&samples[0], "name"), "cam1");
        assert_eq!(label(&samples[0], "state"), "ready");
        assert_eq!(label(&samples[1], "state"), "ready");
        assert_eq!(label(&samples[2], "name"), "cam3");
        assert_eq!(label(&samples[2], "state"), "notReady");
        assert!(samples.iter().all(|s| matches!(s, Sample::Gauge { value, .. } if *value == 1.0)));
    }

    #[test]
    fn test_list_error_is_one_invalid_sample() {
        let samples = PathCollector::new(Arc::new(Broken)).collect();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].is_invalid());

        let samples = RtmpConnCollector::new(Arc::new(Broken)).collect();
        assert_eq!(samples.len(), 1);
        assert!(matches!(&samples[0], Sample::Invalid { collector, .. } if collector == "rtmp_conns"));
    }

    #[test]
    fn test_connections_counted_per_state() {
        let registry = Arc::new(ConnectionRegistry::new());
        for id in ["a", "b", "c"] {
            registry.register(id, None);
        }
        for id in ["b", "c"] {
            registry.set_state(id, ConnectionState::Idle);
            registry.set_state(id, ConnectionState::Publishing);
        }

        let samples = RtmpConnCollector::new(registry).collect();
        assert_eq!(
            samples,
            vec![
                Sample::gauge("rtmp_conns", "Number of RTMP connections per state", &[("state", "handshake")], 1.0),
                Sample::gauge("rtmp_conns", "Number of RTMP connections per state", &[("state", "publish")], 2.0),
            ]
        );
    }

    #[test]
    fn test_no_paths_no_samples() {
        let samples = PathCollector::new(Arc::new(FixedPaths(vec![]))).collect();
        assert!(samples.is_empty());
    }
}
