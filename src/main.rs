use clap::{Parser, Subcommand};
use std::sync::Arc;
use zapgate::{config, logging};
use zapgate_core::session::Session;
use zapgate_core::traits::{SessionRepository, WebhookRepository};
use zapgate_store::Store;
use zapgate_webhook::WebhookDispatcher;

#[derive(Parser)]
#[command(
    name = "zapgate",
    version,
    about = "Zapgate — multi-session WhatsApp gateway"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the database and apply any pending migrations.
    Migrate,
    /// Inspect and manage sessions.
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Inspect and maintain the webhook delivery queue.
    Webhooks {
        #[command(subcommand)]
        command: WebhookCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List all sessions.
    List,
    /// Create a session.
    Add {
        /// Unique operator-facing name.
        name: String,
    },
    /// Delete a session and everything stored for it.
    Remove {
        /// Session id.
        id: String,
    },
    /// Print the pending pairing QR code in the terminal.
    Qr {
        /// Session id.
        id: String,
    },
}

#[derive(Subcommand)]
enum WebhookCommands {
    /// Delivery statistics over a recent window.
    Stats {
        /// Restrict to one session id.
        #[arg(short, long)]
        session: Option<String>,
        /// Window size in hours.
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Delete delivered and terminally failed events past retention.
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;
    let _log_guard = logging::init(&config.gateway)?;

    // Opening the store applies migrations, so every subcommand runs
    // against a current schema.
    let store = Arc::new(Store::new(&config.database).await?);

    match cli.command {
        Commands::Migrate => {
            println!("Database ready at {}", config.database.path);
        }
        Commands::Sessions { command } => {
            let sessions: &dyn SessionRepository = store.as_ref();
            match command {
                SessionCommands::List => {
                    let all = sessions.list().await?;
                    if all.is_empty() {
                        println!("No sessions.");
                    }
                    for s in all {
                        println!(
                            "{}  {:<20} {:<12} {}",
                            s.id,
                            s.name,
                            s.status.as_str(),
                            if s.is_bound() {
                                s.device_jid.as_str()
                            } else {
                                "unpaired"
                            }
                        );
                    }
                }
                SessionCommands::Add { name } => {
                    if sessions.get_by_name(&name).await?.is_some() {
                        anyhow::bail!("a session named {name:?} already exists");
                    }
                    let session = Session::new(&uuid::Uuid::new_v4().to_string(), &name);
                    sessions.create(&session).await?;
                    println!("Created session {} ({})", session.id, session.name);
                }
                SessionCommands::Remove { id } => {
                    if sessions.get(&id).await?.is_none() {
                        anyhow::bail!("no session with id {id}");
                    }
                    sessions.delete(&id).await?;
                    println!("Removed session {id}");
                }
                SessionCommands::Qr { id } => {
                    let session = sessions
                        .get(&id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("no session with id {id}"))?;
                    match session.qr_code {
                        Some(code) => {
                            println!("{}", zapgate_session::qr::render_terminal(&code)?);
                            println!("Scan with WhatsApp > Linked Devices.");
                        }
                        None => println!("No pairing in progress for {}.", session.name),
                    }
                }
            }
        }
        Commands::Webhooks { command } => match command {
            WebhookCommands::Stats { session, hours } => {
                let webhooks: &dyn WebhookRepository = store.as_ref();
                let since = chrono::Utc::now() - chrono::Duration::hours(hours);
                let stats = webhooks.delivery_stats(session.as_deref(), since).await?;
                println!("Webhook deliveries, last {hours}h:");
                println!("  total:   {}", stats.total);
                println!("  sent:    {}", stats.sent);
                println!("  failed:  {}", stats.failed);
                println!("  pending: {}", stats.pending);
                println!("  success: {:.1}%", stats.success_rate * 100.0);
                println!("  avg latency: {:.0} ms", stats.avg_latency_ms);
            }
            WebhookCommands::Cleanup => {
                let dispatcher = WebhookDispatcher::new(store.clone(), config.webhook.clone())?;
                let removed = dispatcher.cleanup_old_events().await?;
                println!("Removed {removed} old webhook events");
            }
        },
    }

    Ok(())
}
