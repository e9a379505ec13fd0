//! Contract approval workflow server

use clap::Parser;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contract_flow::config::{Cli, Command};
use contract_flow::directory::Directory;
use contract_flow::notify::{BroadcastDispatcher, NotificationDispatcher, WebhookDispatcher};
use contract_flow::{api, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contract_flow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Database connection, migrations included
    let pool = store::open(&cli.database_url, cli.max_connections).await?;

    match cli.command {
        Command::AddUser { name, role } => {
            let user = Directory::new(pool).register(&name, role).await?;
            tracing::info!(user_id = %user.id, role = %user.role, "Registered user");
            println!("{}", user.id);
        }
        Command::Serve { bind, webhook_url } => {
            let notifier: Arc<dyn NotificationDispatcher> = match webhook_url {
                Some(url) => {
                    tracing::info!("Delivering notifications to {}", url);
                    Arc::new(WebhookDispatcher::new(url))
                }
                None => {
                    let dispatcher = BroadcastDispatcher::default();
                    let mut rx = dispatcher.subscribe();
                    tokio::spawn(async move {
                        loop {
                            match rx.recv().await {
                                Ok(n) => tracing::info!(
                                    recipient_id = %n.recipient_id,
                                    contract_id = %n.contract_id,
                                    kind = n.kind.as_str(),
                                    "{}",
                                    n.title
                                ),
                                Err(RecvError::Lagged(skipped)) => {
                                    tracing::warn!("Notification log lagged by {}", skipped)
                                }
                                Err(RecvError::Closed) => break,
                            }
                        }
                    });
                    Arc::new(dispatcher)
                }
            };

            let state = AppState::new(pool, notifier);

            // Make sure a workflow definition exists before the first request
            let workflow = state.engine.workflows().get_active().await?;
            tracing::info!(
                workflow_version = workflow.version,
                "Active workflow: {}",
                workflow.name
            );

            let app = api::router(state);

            // Start server
            let listener = tokio::net::TcpListener::bind(bind).await?;
            tracing::info!("Server listening on {}", listener.local_addr()?);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
