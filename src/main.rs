use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use pgbridge::bridge::PreparedStatement;
use pgbridge::error::SqlException;
use pgbridge::protocol::{FieldDescription, Oid};
use pgbridge::server::{Server, ServerConfig, SessionId};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Demo server: answers every query with the same generated table.
#[derive(Parser, Debug)]
#[command(name = "pgbridge")]
#[command(about = "PostgreSQL wire protocol demo server")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PGBRIDGE_LISTEN_ADDR")]
    listen: Option<SocketAddr>,

    /// Number of rows returned for every query
    #[arg(long, env = "PGBRIDGE_ROWS", default_value = "1000")]
    rows: i64,

    /// Largest accepted message body, in bytes
    #[arg(long, env = "PGBRIDGE_MAX_MESSAGE_SIZE")]
    max_message_size: Option<usize>,

    /// Close sessions idle for this many seconds
    #[arg(long, env = "PGBRIDGE_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = ServerConfig::from_env();
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(size) = args.max_message_size {
        config.max_message_size = size;
    }
    if let Some(secs) = args.idle_timeout_secs {
        config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    config.log_config();

    let rows = args.rows;
    let server = Server::bind(config, move |session: SessionId| {
        info!(session, rows, "serving demo table");
        move |query: &str| demo_table(query, rows)
    })
    .await?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutting down");
        shutdown.cancel();
    });

    server.serve().await?;
    Ok(())
}

fn demo_table(_query: &str, rows: i64) -> Result<PreparedStatement, SqlException> {
    let fields = vec![
        FieldDescription::new("name", Oid::Text),
        FieldDescription::new("address", Oid::Text),
        FieldDescription::new("age", Oid::Int8),
    ];
    Ok(PreparedStatement::new(fields, move |writer, _| {
        for i in 1..=rows {
            let mut row = writer.add_row();
            row.write_string("euiko");
            row.write_string("indonesia");
            row.write_int8(i);
        }
        Ok(())
    }))
}
