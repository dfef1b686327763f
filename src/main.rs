use clap::Parser;
use donation_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use donation_core::config::Config;
use donation_core::{create_app, db, startup, AppState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
        Commands::Tx(TxCommands::Sync { tx_id, user_id }) => {
            let pool = db::create_pool(&config).await?;
            let state = AppState::from_config(&config, pool);
            cli::handle_tx_sync(&state.settlement, user_id, tx_id).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let report = startup::validate_environment(&config, &pool).await?;
    report.print();
    if !report.database || !report.environment {
        anyhow::bail!("Startup validation failed");
    }
    if !report.is_valid() {
        tracing::warn!(
            "Some remote services are unreachable; requests depending on them will fail \
             until they recover"
        );
    }

    let state = AppState::from_config(&config, pool);
    tracing::info!(
        identity = %config.identity_service_url,
        campaign = %config.campaign_service_url,
        provider = %config.payment_provider_url,
        "Remote clients initialized"
    );

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
