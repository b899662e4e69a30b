//! Calculator server example
//!
//! Configure with `GUARDRPC_BIND`, `GUARDRPC_BATCH_MODE`,
//! `GUARDRPC_MAX_BATCH_SIZE` and `GUARDRPC_DEBUG_HANDLERS`.

use guardrpc::server::{from_fn, from_typed_fn, HandlerOutcome, MethodError, ServerBuilder};
use serde::Deserialize;

const DIVISION_BY_ZERO: i32 = 1;

#[derive(Deserialize)]
#[serde(untagged)]
enum SubtractParams {
    Positional(i64, i64),
    Named { minuend: i64, subtrahend: i64 },
}

#[derive(Deserialize)]
struct DivideParams {
    a: f64,
    b: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut builder = ServerBuilder::from_env()?;
    if std::env::var(guardrpc::server::ENV_BIND).is_err() {
        builder = builder.bind_str("127.0.0.1:8080")?;
    }

    let server = builder
        .handler(
            "sum",
            from_typed_fn(|numbers: Vec<i64>| async move { Ok(numbers.iter().sum::<i64>()) }),
        )
        .handler(
            "subtract",
            from_typed_fn(|params: SubtractParams| async move {
                Ok(match params {
                    SubtractParams::Positional(a, b) => a - b,
                    SubtractParams::Named {
                        minuend,
                        subtrahend,
                    } => minuend - subtrahend,
                })
            }),
        )
        .handler(
            "divide",
            from_typed_fn(|p: DivideParams| async move {
                if p.b == 0.0 {
                    return Err(MethodError::new(DIVISION_BY_ZERO, "Division by zero")
                        .with_data(&p.a));
                }
                Ok(p.a / p.b)
            }),
        )
        .handler(
            "log",
            from_fn(|ctx, params| async move {
                tracing::info!(conn_id = ?ctx.conn_id(), params = ?params, "log");
                HandlerOutcome::Success(serde_json::json!(true))
            }),
        )
        .build()
        .await?;

    println!("Calculator listening on ws://{}", server.local_addr()?);
    println!("Methods: {:?}", server.dispatcher().registry().methods());
    println!("\nPress Ctrl+C to stop");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => println!("Shutting down"),
    }

    Ok(())
}
