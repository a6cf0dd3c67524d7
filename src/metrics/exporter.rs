use crate::metrics::{Collector, Sample};
use crate::{Error, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, error, info, warn};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Polls its collectors on demand.
///
/// Each exporter owns its collectors and builds a fresh prometheus
/// registry per render, so nothing is registered process-wide.
#[derive(Default)]
pub struct MetricsExporter {
    collectors: Vec<Box<dyn Collector>>,
}

impl MetricsExporter {
    pub fn new() -> Self {
        MetricsExporter::default()
    }

    pub fn register(&mut self, collector: Box<dyn Collector>) {
        debug!("registered collector {}", collector.name());
        self.collectors.push(collector);
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Samples from every collector, in registration order
    pub fn gather(&self) -> Vec<Sample> {
        self.collectors
            .iter()
            .flat_map(|collector| collector.collect())
            .collect()
    }

    /// Prometheus text exposition of the current samples.
    ///
    /// Invalid samples are logged and left out.
    pub fn render_text(&self) -> Result<String> {
        let registry = Registry::new();
        let mut families: BTreeMap<String, (GaugeVec, Vec<String>)> = BTreeMap::new();

        for sample in self.gather() {
            let (name, help, labels, value) = match sample {
                Sample::Gauge {
                    name,
                    help,
                    labels,
                    value,
                } => (name, help, labels, value),
                Sample::Invalid { collector, error } => {
                    warn!("collector {} produced an invalid sample: {}", collector, error);
                    continue;
                }
            };

            if !families.contains_key(&name) {
                let label_names: Vec<String> = labels.keys().cloned().collect();
                let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
                let gauge = GaugeVec::new(Opts::new(name.clone(), help), &names)
                    .map_err(|e| Error::collector(format!("metric {}: {}", name, e)))?;
                registry
                    .register(Box::new(gauge.clone()))
                    .map_err(|e| Error::collector(format!("metric {}: {}", name, e)))?;
                families.insert(name.clone(), (gauge, label_names));
            }

            let Some((gauge, label_names)) = families.get(&name) else {
                continue;
            };
            let values: Option<Vec<&str>> = label_names
                .iter()
                .map(|key| labels.get(key).map(String::as_str))
                .collect();
            let metric = values
                .filter(|values| values.len() == labels.len())
                .and_then(|values| gauge.get_metric_with_label_values(&values).ok());
            match metric {
                Some(metric) => metric.set(value),
                None => warn!("dropping {} sample with mismatched labels {:?}", name, labels),
            }
        }

        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buf)
            .map_err(|e| Error::collector(format!("encode failed: {}", e)))?;
        String::from_utf8(buf).map_err(|e| Error::collector(format!("encode failed: {}", e)))
    }
}

impl MetricsExporter {
    /// Router serving `GET /metrics`
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(self)
    }

    /// Open a listener on `addr` and serve `/metrics` until the returned
    /// server is closed.
    pub async fn listen(self, addr: impl ToSocketAddrs) -> Result<MetricsServer> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener)
    }

    /// Serve `/metrics` on an already bound listener
    pub fn serve_listener(self, listener: TcpListener) -> Result<MetricsServer> {
        let local_addr = listener.local_addr()?;
        let (shutdown, mut signal) = watch::channel(false);
        let app = Arc::new(self).router();

        info!("metrics listener opened on {}", local_addr);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    while !*signal.borrow_and_update() {
                        if signal.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await?;
            Ok::<_, Error>(())
        });

        Ok(MetricsServer {
            local_addr,
            shutdown,
            task,
        })
    }
}

/// `GET /metrics`
async fn metrics_handler(State(exporter): State<Arc<MetricsExporter>>) -> Response {
    match exporter.render_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("metrics render failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Running metrics endpoint
pub struct MetricsServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let in-flight scrapes finish, and wait for the server
    pub async fn close(self) -> Result<()> {
        self.shutdown.send_replace(true);
        let result = self
            .task
            .await
            .map_err(|e| Error::connection(format!("metrics server task failed: {}", e)))?;
        info!("metrics listener on {} closed", self.local_addr);
        result
    }
}
