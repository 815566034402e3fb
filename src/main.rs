use std::io::Read;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use twdata::{config::Settings, fetch::HttpTransport, Query};

/// Query text from the first argument, else all of stdin.
fn read_query() -> Result<String> {
    if let Some(arg) = std::env::args().nth(1) {
        return Ok(arg);
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading query from stdin")?;
    Ok(text)
}

fn run() -> Result<Value> {
    let text = read_query()?;
    let query: Query = serde_json::from_str(&text).context("parsing query")?;
    let settings = Settings::load()?;
    let transport = HttpTransport::new(&settings)?;
    query.run(&transport, &settings)
}

/// Error kind for the envelope: the parse error variant when there is one.
fn exception_type(err: &anyhow::Error) -> String {
    match err.downcast_ref::<twdata::ParseError>() {
        Some(parse) => parse.kind().to_string(),
        None => "Error".to_string(),
    }
}

fn main() {
    // ─── logging to stderr, stdout carries the answer ─────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,twdata=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    let envelope = match run() {
        Ok(data) => json!({ "status": true, "result": { "data": data } }),
        Err(err) => {
            error!("query failed: {:#}", err);
            json!({
                "status": false,
                "result": {
                    "exception_type": exception_type(&err),
                    "exception_message": format!("{:#}", err),
                },
            })
        }
    };
    println!("{}", envelope);
}
