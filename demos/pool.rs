//! # Example: Worker Pool
//!
//! The same binary plays both roles: started normally it supervises a pool of
//! four copies of itself; started with `PROCVISOR_WORKER_ID` set it is a worker.
//!
//! Workers report ready after a short warm-up, heartbeat at the interval the
//! supervisor hands them, and exit when asked to shut down. Worker 4 stops
//! heartbeating after a few seconds so a stall shows up in the log.
//!
//! Run with: `cargo run --example pool`, then Ctrl-C.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use procvisor::{
    ControlMessage, HEARTBEAT_INTERVAL_ENV, LogWriter, PoolOptions, Subscribe, Supervisor,
    WORKER_ID_ENV, WorkerMessage,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match std::env::var(WORKER_ID_ENV) {
        Ok(id) => run_worker(id).await,
        Err(_) => run_supervisor().await,
    }
}

async fn run_supervisor() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procvisor=info".into()),
        )
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder().with_subscribers(subs).build();

    sup.configure(
        PoolOptions::new()
            .with_worker_count(4)
            .with_worker_env(|id| HashMap::from([("DEMO_SHARD".to_string(), format!("shard-{id}"))]))
            .with_heartbeat_worker_interval(Duration::from_millis(500))
            .with_heartbeat_stall_tolerance(Duration::from_secs(3))
            .with_gentle_stop_timeout(Duration::from_secs(3)),
    )?;
    sup.start()?;

    let report = sup.run_until_signal().await?;
    println!("[supervisor] stopped: {report:?}");
    Ok(())
}

async fn run_worker(id: String) -> Result<(), Box<dyn std::error::Error>> {
    let interval = std::env::var(HEARTBEAT_INTERVAL_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(500));
    let goes_silent = id == "4";

    let mut out = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tokio::time::sleep(Duration::from_millis(300)).await;
    out.write_all(WorkerMessage::Ready.to_line()?.as_bytes()).await?;
    out.flush().await?;

    let mut ticker = tokio::time::interval(interval);
    let mut beats = 0u32;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                beats += 1;
                if goes_silent && beats > 6 {
                    continue;
                }
                out.write_all(WorkerMessage::Heartbeat.to_line()?.as_bytes()).await?;
                out.flush().await?;
            }
            line = lines.next_line() => match line? {
                Some(line) => match ControlMessage::from_line(&line) {
                    Some(ControlMessage::Shutdown) => {
                        eprintln!("[worker {id}] shutting down");
                        return Ok(());
                    }
                    Some(health) => eprintln!("[worker {id}] pool is {health:?}"),
                    None => eprintln!("[worker {id}] ignoring {line}"),
                },
                None => return Ok(()),
            },
        }
    }
}
