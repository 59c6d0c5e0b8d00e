use anyhow::Context;
use clap::{Parser, Subcommand};
use huddle_backend_api::{build_router, AppState};
use huddle_backend_runtime::{shutdown_signal, telemetry, BackendServices};
use huddle_config::{load as load_config, AppConfig};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "huddle-backend", version, about = "Huddle chat backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Run the HTTP and websocket server (default)
    Serve,
    /// Create a company and print its id
    CreateCompany {
        #[arg(long)]
        name: String,
    },
    /// Create a user with a password login and print its public id
    CreateUser {
        #[arg(long)]
        company_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing()?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateCompany { name } => {
            let services = BackendServices::initialise(&config).await?;
            let company = services
                .authenticator
                .create_company(&name)
                .await
                .context("failed to create company")?;
            println!("{}", company.id);
            Ok(())
        }
        Command::CreateUser {
            company_id,
            name,
            email,
            password,
        } => {
            let services = BackendServices::initialise(&config).await?;
            let user = services
                .authenticator
                .register_with_password(company_id, &name, &email, &password)
                .await
                .context("failed to create user")?;
            println!("{}", user.public_id);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("starting Huddle backend");

    let services = BackendServices::initialise(&config).await?;
    let state = AppState::new(services.db_pool, services.authenticator, &config);
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}
