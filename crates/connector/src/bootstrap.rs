//! Wiring from configuration to a running route.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use common::admin_http;
use configs::{AppConfig, StoreConfig};
use service::storage::{Backend, LocalClient, MultiMapClient, ValueCollection};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::endpoint::Endpoint;
use crate::observability;
use crate::producer::MultimapProducer;
use crate::route::{read_json_lines, Route, RouteStats};
use crate::sink::{JsonLinesSink, MessageSink};

/// Load `config.toml` (or `CONFIG_PATH`), falling back to built-in defaults
/// plus environment when the file is missing. Returns the config and, when
/// the fallback was taken, the reason, so it can be logged once logging is up.
pub fn load_config() -> anyhow::Result<(AppConfig, Option<String>)> {
    let path = configs::config_path();
    match configs::load_from_file(&path) {
        Ok(mut cfg) => {
            cfg.normalize_and_validate()?;
            Ok((cfg, None))
        }
        Err(e) if e.downcast_ref::<std::io::Error>().is_some() => {
            let mut cfg = AppConfig::default();
            cfg.normalize_and_validate()
                .with_context(|| format!("{path} unreadable ({e}) and environment incomplete"))?;
            Ok((cfg, Some(format!("{path}: {e}"))))
        }
        Err(e) => Err(e.context(format!("invalid config {path}"))),
    }
}

pub fn build_client(store: &StoreConfig) -> anyhow::Result<Arc<dyn MultiMapClient>> {
    let collection: ValueCollection = store.value_collection.parse()?;
    let backend = if store.uses_files() {
        Backend::File(PathBuf::from(&store.data_dir))
    } else {
        Backend::Memory
    };
    Ok(Arc::new(LocalClient::new(backend, collection)))
}

pub fn build_sink(output: &str) -> anyhow::Result<Option<Arc<dyn MessageSink>>> {
    match output {
        "stdout" => Ok(Some(Arc::new(JsonLinesSink::stdout()))),
        "none" => Ok(None),
        other => Err(anyhow!("unknown output {other}")),
    }
}

/// Build the producer for the configured endpoint.
pub async fn build_producer(cfg: &AppConfig, client: &dyn MultiMapClient) -> anyhow::Result<MultimapProducer> {
    let endpoint: Endpoint = cfg.connector.endpoint.parse()?;
    let mut producer = MultimapProducer::connect(client, &endpoint).await?;
    if let Some(sink) = build_sink(&cfg.connector.output)? {
        producer = producer.with_sink(sink);
    }
    info!(
        endpoint = %endpoint,
        default_operation = ?producer.default_operation(),
        output = %cfg.connector.output,
        "producer ready"
    );
    Ok(producer)
}

/// Run the connector: stdin JSON lines in, responses to the configured sink.
/// Returns when stdin closes and every in-flight message is done.
pub async fn run(cfg: AppConfig) -> anyhow::Result<RouteStats> {
    let data_dir = cfg.store.uses_files().then_some(cfg.store.data_dir.as_str());
    common::env::ensure_env(&configs::config_path(), data_dir).await?;

    if cfg.admin.enabled {
        admin_http::spawn_admin_server(&cfg.admin.addr, observability::encode_metrics);
    }

    let client = build_client(&cfg.store)?;
    let producer = Arc::new(build_producer(&cfg, client.as_ref()).await?);
    let route = Route::new(producer, cfg.connector.workers);

    let (tx, rx) = mpsc::channel(cfg.connector.workers * 2);
    let reader = tokio::spawn(read_json_lines(BufReader::new(tokio::io::stdin()), tx));

    let stats = route.run(rx).await;
    match reader.await {
        Ok(Ok(n)) => info!(read = n, "input closed"),
        Ok(Err(e)) => warn!(error = %e, "input read failed"),
        Err(e) => warn!(error = %e, "input reader task failed"),
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use service::storage::MultiMap;

    fn config(toml: &str) -> AppConfig {
        let mut cfg = configs::load_from_str(toml).expect("parse config");
        cfg.normalize_and_validate().expect("valid config");
        cfg
    }

    #[tokio::test]
    async fn builds_producer_from_config() -> Result<(), anyhow::Error> {
        let cfg = config("[connector]\nendpoint = \"multimap:bar?operation=valueCount\"\noutput = \"none\"\n");
        let client = build_client(&cfg.store)?;
        let producer = build_producer(&cfg, client.as_ref()).await?;
        assert_eq!(producer.multimap_name(), "bar");
        assert_eq!(producer.default_operation(), Some(crate::operation::Operation::ValueCount));

        let map = client.multimap("bar").await?;
        map.put("k".into(), json!(1)).await?;
        let resp = producer
            .handle(common::types::Message::empty().with_header(common::types::headers::OBJECT_ID, "k"))
            .await?;
        assert_eq!(resp.map(|m| m.body), Some(json!(1)));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_endpoint_operation_fails_at_startup() {
        let cfg = config("[connector]\nendpoint = \"multimap:bar?operation=bogus\"\n");
        let client = build_client(&cfg.store).expect("client");
        assert!(build_producer(&cfg, client.as_ref()).await.is_err());
    }

    #[tokio::test]
    async fn sink_selection() {
        assert!(build_sink("stdout").expect("stdout").is_some());
        assert!(build_sink("none").expect("none").is_none());
        assert!(build_sink("kafka").is_err());
    }
}
