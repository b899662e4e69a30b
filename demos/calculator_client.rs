//! Calculator client example
//!
//! Run `calculator_server` first. Set `RUST_LOG=debug` to see the
//! `-->`/`<--` lines.

use guardrpc::client::ClientBuilder;
use guardrpc::core::{Id, Request};
use guardrpc::Error;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8080".to_string());
    let client = ClientBuilder::new(url).with_debug(true).connect().await?;

    let sum: i64 = client.request("sum", [1, 2, 4]).await?;
    println!("sum(1, 2, 4) = {}", sum);

    let difference: i64 = client
        .request("subtract", json!({"minuend": 42, "subtrahend": 23}))
        .await?;
    println!("subtract(42, 23) = {}", difference);

    let quotient: Result<f64, _> = client.request("divide", json!({"a": 1, "b": 0})).await;
    match quotient {
        Err(Error::Rpc(err)) => println!("divide(1, 0) failed: {}", err),
        other => println!("divide(1, 0) = {:?}", other),
    }

    client.notify("log", json!({"msg": "hello"})).await?;

    let responses = client
        .batch(vec![
            Request::new("sum", Some(json!([1, 2])), Id::from(1i64)),
            Request::notification("log", Some(json!(["batched"]))),
            Request::new("subtract", Some(json!([10, 4])), Id::from(2i64)),
            Request::new("missing", None, Id::from("3")),
        ])
        .await?;
    for response in responses {
        println!("{}", response);
    }

    client.close().await?;
    Ok(())
}
