use std::sync::Arc;
use std::time::Duration;

use connector::route::{read_json_lines, Route, RouteStats};
use connector::sink;
use connector::{Endpoint, MultimapProducer};
use serde_json::json;
use service::storage::{LocalClient, MultiMap, MultiMapClient};
use tokio::sync::mpsc;

#[tokio::test]
async fn json_lines_through_memory_multimap() -> Result<(), anyhow::Error> {
    let client = LocalClient::memory();
    let endpoint: Endpoint = "multimap:bar?operation=put".parse()?;
    let (tx_out, out) = sink::channel("out", 16);
    let producer = MultimapProducer::connect(&client, &endpoint)
        .await?
        .with_sink(Arc::new(tx_out));
    // one worker keeps responses in request order
    let route = Route::new(Arc::new(producer), 1);

    let input = concat!(
        r#"{"headers":{"objectId":"4711"},"body":"my-foo"}"#, "\n",
        r#"{"headers":{"objectId":"4711"},"body":"my-bar"}"#, "\n",
        r#"{"headers":{"objectId":4711},"body":"numeric"}"#, "\n",
        r#"{"headers":{"operation":"get","objectId":"4711","trace":"t-1"}}"#, "\n",
        r#"{"headers":{"operation":"valueCount","objectId":4711}}"#, "\n",
        r#"{"headers":{"operation":"removevalue","objectId":"4711"},"body":"my-foo"}"#, "\n",
        r#"{"headers":{"operation":"containsValue"},"body":"my-foo"}"#, "\n",
        r#"{"headers":{"operation":"bogus","objectId":"4711"},"body":"x"}"#, "\n",
        r#"{"headers":{"operation":"delete","objectId":"4711"}}"#, "\n",
        r#"{"headers":{"operation":"containsKey","objectId":"4711"}}"#, "\n",
    );

    let (tx, rx) = mpsc::channel(4);
    let reader = tokio::spawn(read_json_lines(input.as_bytes(), tx));
    let stats = route.run(rx).await;
    assert_eq!(reader.await??, 10);
    assert_eq!(stats, RouteStats { processed: 9, failed: 1, responses: 4 });

    let wait = Duration::from_secs(1);
    let get = out.receive(wait).await.expect("get response");
    assert_eq!(get.body, json!(["my-foo", "my-bar"]));
    assert_eq!(get.header("trace"), Some(&json!("t-1")));
    assert!(get.header("objectId").is_none());

    assert_eq!(out.receive_body(wait).await, Some(json!(1)));
    assert_eq!(out.receive_body(wait).await, Some(json!(false)));
    assert_eq!(out.receive_body(wait).await, Some(json!(false)));
    assert!(out.drain().await.is_empty());

    let map = client.multimap("bar").await?;
    assert!(!map.contains_key(&"4711".into()).await?);
    assert_eq!(map.get(&4711i64.into()).await?, vec![json!("numeric")]);
    Ok(())
}
