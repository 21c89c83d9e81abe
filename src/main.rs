use std::sync::Arc;

use ontask::config::Config;
use ontask::console::{ConsoleInput, HELP};
use ontask::driver::Driver;
use ontask::kernel::event::Event;
use ontask::kernel::time::Timestamp;
use ontask::observer::{ReportedTab, TabSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging (stderr; stdout carries status lines)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("OnTask booting...");

    // 2. Config + driver
    let config = Config::load()?;
    let tabs = ReportedTab::new();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let (alert_tx, mut alert_rx) = mpsc::unbounded_channel();
    let driver = Driver::from_config(&config, Arc::new(tabs.clone()))
        .await?
        .with_status_sink(status_tx)
        .with_alert_sink(alert_tx);
    let tx = driver.sender();

    // 3. Status and strike alert printers
    tokio::spawn(async move {
        while let Some(report) = status_rx.recv().await {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("could not render status: {}", e),
            }
        }
    });
    tokio::spawn(async move {
        while let Some(alert) = alert_rx.recv().await {
            println!(
                "Strike {}: {} doesn't look like part of your task.",
                alert.strikes, alert.host
            );
        }
    });

    // 4. Console reader (stdin)
    let console_tabs = tabs.clone();
    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();
        println!("{}", HELP);

        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let event = match line.parse::<ConsoleInput>() {
                Ok(ConsoleInput::Command(command)) => Event::Command(command),
                Ok(ConsoleInput::Tab(tab)) => {
                    match tab {
                        Some((url, title)) => console_tabs.report(url, title, Timestamp::now()),
                        None => console_tabs.clear(),
                    }
                    Event::Poll {
                        tab: console_tabs.active_tab(),
                    }
                }
                Err(e) => {
                    eprintln!("{}\n{}", e, HELP);
                    continue;
                }
            };
            if let Err(e) = tx.send(event).await {
                tracing::error!("failed to send console input: {}", e);
                break;
            }
        }
    });

    // 5. Shutdown on Ctrl+C
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    driver.run(cancel).await;
    Ok(())
}
