//! PloGenius Table Sync
//!
//! Terminal client for one PloGenius table. Prints the message log and
//! table summaries as they change, and reads commands from stdin.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use plogenius::{ActionKind, SyncConfig, TableClient, TableSnapshot, TableState, VERSION};

const HELP: &str = "commands: start | check | call | bet | raise | fold | state | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = SyncConfig::from_env().context("invalid PLOGENIUS_* configuration")?;
    info!("PloGenius Table Sync v{}", VERSION);
    info!("Table: {} as {}", config.endpoint(), config.user_id);

    let mut client = TableClient::new(config);
    let watcher = tokio::spawn(print_updates(client.subscribe()));
    client.connect();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !run_command(&client, line.trim()) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
        }
    }

    client.shutdown().await;
    watcher.abort();
    Ok(())
}

/// Handle one stdin command. Returns false to quit.
fn run_command(client: &TableClient, command: &str) -> bool {
    let user_id = client.user_id().to_string();

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "start" => {
            if let Err(e) = client.request_new_hand(&user_id) {
                println!("! {}", e);
            }
        }
        "state" => print_state(&client.state()),
        "help" => println!("{}", HELP),
        other => match other.parse::<ActionKind>() {
            Ok(action) => {
                if let Err(e) = client.submit_action(action, &user_id) {
                    println!("! {}", e);
                }
            }
            Err(e) => {
                warn!("{}", e);
                println!("{}", HELP);
            }
        },
    }
    true
}

/// Print log entries and snapshot changes until the client goes away.
async fn print_updates(mut rx: watch::Receiver<TableState>) {
    let mut seen: u64 = 0;
    let mut last_snapshot: Option<TableSnapshot> = None;

    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update();

        let log = state.log();
        let fresh = (log.appended() - seen).min(log.len() as u64) as usize;
        for entry in log.iter().skip(log.len() - fresh) {
            println!("[{}] {}", entry.at.format("%H:%M:%S"), entry.text);
        }
        seen = log.appended();

        if state.snapshot() != last_snapshot.as_ref() {
            last_snapshot = state.snapshot().cloned();
            if let Some(snapshot) = &last_snapshot {
                println!("  {}", snapshot);
            }
        }
    }
}

fn print_state(state: &TableState) {
    println!("connection: {:?}", state.connection());
    match state.snapshot() {
        Some(snapshot) => println!("table: {}", snapshot),
        None => println!("table: no snapshot yet"),
    }
    if !state.permitted().is_empty() {
        println!("your options: {}", state.permitted());
    }
}
