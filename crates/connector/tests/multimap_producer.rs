use std::sync::Arc;
use std::time::Duration;

use common::types::{headers, Message};
use connector::endpoint::Endpoint;
use connector::sink::{self, ChannelReceiver, ChannelSink};
use connector::errors::SinkError;
use connector::observability::FAILURES_TOTAL;
use connector::{MultimapProducer, Operation, OperationError};
use serde_json::json;
use service::storage::mock::{Call, MockClient, RecordingMultiMap};

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

struct Fixture {
    map: Arc<RecordingMultiMap>,
    client: MockClient,
    sink: ChannelSink,
    out: ChannelReceiver,
}

impl Fixture {
    fn new() -> Self {
        let map = Arc::new(RecordingMultiMap::new("bar"));
        let client = MockClient::new(map.clone());
        let (sink, out) = sink::channel("out", 16);
        Self { map, client, sink, out }
    }

    /// Producer for `uri` publishing into `self.out`.
    async fn producer(&self, uri: &str) -> MultimapProducer {
        let endpoint: Endpoint = uri.parse().expect("endpoint");
        MultimapProducer::connect(&self.client, &endpoint)
            .await
            .expect("connect")
            .with_sink(Arc::new(self.sink.clone()))
    }

    /// Producer that gets its operation from a header, like a route that sets
    /// the header before calling the endpoint.
    async fn with_operation_header(&self, op: &str) -> (MultimapProducer, Message) {
        let p = self.producer("multimap:bar").await;
        (p, Message::empty().with_header(headers::OPERATION, op))
    }

    fn verify_requested_bar(&self) {
        let requested = self.client.requested();
        assert!(!requested.is_empty());
        assert!(requested.iter().all(|n| n == "bar"));
    }
}

fn body_and_key(msg: Message, body: serde_json::Value, key: serde_json::Value) -> Message {
    let mut msg = msg.with_header(headers::OBJECT_ID, key);
    msg.body = body;
    msg
}

#[tokio::test]
async fn invalid_operation_is_rejected_without_store_calls() {
    let fx = Fixture::new();
    let (p, msg) = fx.with_operation_header("bogus").await;
    let err = p.process(body_and_key(msg, json!("my-foo"), json!("4711"))).await.unwrap_err();
    assert!(matches!(err, OperationError::Unsupported(ref s) if s == "bogus"));
    assert!(fx.map.calls().is_empty());
    fx.verify_requested_bar();
}

#[tokio::test]
async fn put() {
    let fx = Fixture::new();
    let (p, msg) = fx.with_operation_header("PUT").await;
    let resp = p.process(body_and_key(msg, json!("my-foo"), json!("4711"))).await.expect("put");
    assert!(resp.is_none());
    assert_eq!(fx.map.calls(), vec![Call::Put("4711".into(), json!("my-foo"))]);
    assert!(fx.out.drain().await.is_empty());
}

#[tokio::test]
async fn put_with_operation_name() {
    let fx = Fixture::new();
    let p = fx.producer("multimap:bar?operation=PUT").await;
    p.process(body_and_key(Message::empty(), json!("my-foo"), json!("4711"))).await.expect("put");
    assert_eq!(fx.map.calls(), vec![Call::Put("4711".into(), json!("my-foo"))]);
}

#[tokio::test]
async fn put_with_operation_wire_name() {
    let fx = Fixture::new();
    let uri = format!("multimap:bar?operation={}", Operation::Put);
    let p = fx.producer(&uri).await;
    p.process(body_and_key(Message::empty(), json!("my-foo"), json!("4711"))).await.expect("put");
    assert_eq!(fx.map.calls(), vec![Call::Put("4711".into(), json!("my-foo"))]);
}

#[tokio::test]
async fn remove_value() {
    let fx = Fixture::new();
    let (p, msg) = fx.with_operation_header("REMOVE_VALUE").await;
    p.process(body_and_key(msg, json!("my-foo"), json!("4711"))).await.expect("remove value");
    assert_eq!(fx.map.calls(), vec![Call::RemoveValue("4711".into(), json!("my-foo"))]);
}

#[tokio::test]
async fn get() {
    let fx = Fixture::new();
    fx.map.when_get("4711", vec![json!("my-foo")]);
    let (p, msg) = fx.with_operation_header("GET").await;
    p.process(msg.with_header(headers::OBJECT_ID, "4711")).await.expect("get");

    assert_eq!(fx.map.calls(), vec![Call::Get("4711".into())]);
    let body = fx.out.receive_body(RECEIVE_TIMEOUT).await.expect("response");
    let values = body.as_array().expect("collection body");
    assert!(values.contains(&json!("my-foo")));
}

#[tokio::test]
async fn delete_with_numeric_key() {
    let fx = Fixture::new();
    let (p, msg) = fx.with_operation_header("DELETE").await;
    let resp = p.process(msg.with_header(headers::OBJECT_ID, 4711)).await.expect("delete");
    assert!(resp.is_none());
    assert_eq!(fx.map.calls(), vec![Call::Remove(4711i64.into())]);
}

#[tokio::test]
async fn clear_ignores_body() {
    let fx = Fixture::new();
    let (p, mut msg) = fx.with_operation_header("CLEAR").await;
    msg.body = json!("test");
    let resp = p.process(msg).await.expect("clear");
    assert!(resp.is_none());
    assert_eq!(fx.map.calls(), vec![Call::Clear]);
    assert!(fx.out.drain().await.is_empty());
}

#[tokio::test]
async fn value_count() {
    let fx = Fixture::new();
    let (p, msg) = fx.with_operation_header("VALUE_COUNT").await;
    p.process(body_and_key(msg, json!("test"), json!("4711"))).await.expect("value count");
    assert_eq!(fx.map.calls(), vec![Call::ValueCount("4711".into())]);
    assert_eq!(fx.out.receive_body(RECEIVE_TIMEOUT).await, Some(json!(0)));
}

#[tokio::test]
async fn contains_key() {
    let fx = Fixture::new();
    fx.map.when_contains_key("testOk", true);
    fx.map.when_contains_key("testKo", false);
    let (p, msg) = fx.with_operation_header("CONTAINS_KEY").await;

    p.process(msg.clone().with_header(headers::OBJECT_ID, "testOk")).await.expect("contains key");
    assert_eq!(fx.out.receive_body(RECEIVE_TIMEOUT).await, Some(json!(true)));
    assert_eq!(fx.map.calls(), vec![Call::ContainsKey("testOk".into())]);

    p.process(msg.with_header(headers::OBJECT_ID, "testKo")).await.expect("contains key");
    assert_eq!(fx.out.receive_body(RECEIVE_TIMEOUT).await, Some(json!(false)));
    assert_eq!(
        fx.map.calls(),
        vec![Call::ContainsKey("testOk".into()), Call::ContainsKey("testKo".into())]
    );
}

#[tokio::test]
async fn contains_value() {
    let fx = Fixture::new();
    fx.map.when_contains_value("testOk", true);
    fx.map.when_contains_value("testKo", false);
    let (p, msg) = fx.with_operation_header("CONTAINS_VALUE").await;

    let mut ok = msg.clone();
    ok.body = json!("testOk");
    p.process(ok).await.expect("contains value");
    assert_eq!(fx.out.receive_body(RECEIVE_TIMEOUT).await, Some(json!(true)));

    let mut ko = msg;
    ko.body = json!("testKo");
    p.process(ko).await.expect("contains value");
    assert_eq!(fx.out.receive_body(RECEIVE_TIMEOUT).await, Some(json!(false)));

    assert_eq!(
        fx.map.calls(),
        vec![Call::ContainsValue(json!("testOk")), Call::ContainsValue(json!("testKo"))]
    );
}

#[tokio::test]
async fn read_operations_never_mutate() {
    let fx = Fixture::new();
    let p = fx.producer("multimap:bar").await;
    for op in ["get", "valueCount", "containsKey", "containsValue"] {
        let msg = body_and_key(Message::empty().with_header(headers::OPERATION, op), json!("v"), json!("k"));
        p.process(msg).await.expect("read op");
    }
    assert_eq!(fx.map.calls().len(), 4);
    assert!(fx.map.mutating_calls().is_empty());
    assert_eq!(fx.out.drain().await.len(), 4);
}

#[tokio::test]
async fn every_unsupported_operation_leaves_store_untouched() {
    let fx = Fixture::new();
    let p = fx.producer("multimap:bar?operation=put").await;
    for bogus in ["bogus", "getAll", "putIfAbsent", "evict", "query", "", "g_e_t", "_put_"] {
        let msg = body_and_key(Message::empty().with_header(headers::OPERATION, bogus), json!("v"), json!("k"));
        let err = p.process(msg).await.unwrap_err();
        assert!(matches!(err, OperationError::Unsupported(_)), "{bogus:?}");
    }
    assert!(fx.map.calls().is_empty());
}

#[tokio::test]
async fn closed_sink_surfaces_after_the_store_call() {
    let Fixture { map, client, sink, out } = Fixture::new();
    drop(out);
    map.when_contains_key("testOk", true);
    let endpoint: Endpoint = "multimap:bar?operation=containsKey".parse().expect("endpoint");
    let p = MultimapProducer::connect(&client, &endpoint)
        .await
        .expect("connect")
        .with_sink(Arc::new(sink));

    let sink_failures = || FAILURES_TOTAL.with_label_values(&["sink"]).get();
    let before = sink_failures();
    let err = p.process(Message::empty().with_header(headers::OBJECT_ID, "testOk")).await.unwrap_err();

    assert!(matches!(err, OperationError::Sink(SinkError::Closed(ref n)) if n == "out"));
    assert_eq!(map.calls(), vec![Call::ContainsKey("testOk".into())]);
    assert_eq!(sink_failures(), before + 1);
}
