use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use ticket_watcher::config::MetricsConfig;
use ticket_watcher::plugins::notifiers::SmtpMailer;
use ticket_watcher::utils::logging;
use ticket_watcher::web::{self, AppState};
use ticket_watcher::{AppConfig, WatcherService};

#[derive(Parser)]
#[command(name = "ticket-watcher", version, about = "Watch a resale page and email subscribers about new listings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP control surface
    Serve {
        /// Start the monitor loop right away
        #[arg(long)]
        autostart: bool,
    },
    /// Run the monitor loop in the foreground until Ctrl-C
    Run,
    /// Look at the page once without touching the known listings
    Check,
    /// Add a subscriber
    Subscribe {
        email: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Remove a subscriber
    Unsubscribe { email: String },
    /// List subscribers
    Subscribers,
    /// Print the persisted monitor status
    Status,
    /// Connect to the SMTP server without sending anything
    TestSmtp,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let _guard = logging::init(&config.logging)?;

    info!("Starting Ticket Watcher for {}", config.monitor.url);
    install_metrics(&config.metrics)?;

    if let Command::TestSmtp = cli.command {
        let mailer = SmtpMailer::new(&config.notifications.smtp)?;
        let ok = mailer.test_connection().await?;
        println!("SMTP connection to {}: {}", config.notifications.smtp.host, if ok { "ok" } else { "failed" });
        return Ok(());
    }

    let service = Arc::new(WatcherService::from_config(&config).await?);
    let mut succeeded = true;

    match cli.command {
        Command::Serve { autostart } => {
            if autostart {
                service.start_monitoring().await;
            }
            let state = AppState {
                service: Arc::clone(&service),
            };
            web::serve(&config.server, state, shutdown_signal()).await?;
        }
        Command::Run => {
            service.start_monitoring().await;
            shutdown_signal().await;
        }
        Command::Check => {
            let report = service.check_now().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Subscribe { email, name } => {
            let (ok, message) = service.subscribe(&email, &name).await;
            println!("{}", message);
            succeeded = ok;
        }
        Command::Unsubscribe { email } => {
            if service.remove_subscriber(&email).await {
                println!("Unsubscribed {}", email.trim());
            } else {
                println!("{} was not subscribed", email.trim());
            }
        }
        Command::Subscribers => {
            for subscriber in service.list_subscribers().await {
                println!("{}\t{}\t{}", subscriber.email, subscriber.name, subscriber.subscribed_at.to_rfc3339());
            }
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&service.get_status().await)?);
        }
        Command::TestSmtp => {}
    }

    // Also waits for the welcome email of a fresh subscriber
    service.shutdown().await;
    info!("Shutting down...");

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn install_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutdown signal received");
}
