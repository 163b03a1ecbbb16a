//! authgate CLI binary entry point.

use authgate::cli::{AuthCommands, Cli, Commands};
use authgate::config::GatewayConfig;
use authgate::gateway::Gateway;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;
    let gateway = Gateway::from_config(&config)?;

    match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login(args) => {
                authgate::cli::auth::handle_login(&gateway, &args.email, &args.password).await
            }
            AuthCommands::Register(args) => {
                authgate::cli::auth::handle_register(&gateway, &args.email, &args.password).await
            }
            AuthCommands::Status => authgate::cli::auth::handle_status(&gateway),
            AuthCommands::Refresh => authgate::cli::auth::handle_refresh(&gateway).await,
            AuthCommands::Logout => authgate::cli::auth::handle_logout(&gateway),
        },
        Commands::Base(args) => authgate::cli::request::handle_base(&gateway, args.url.as_deref()),
        Commands::Send(args) => {
            authgate::cli::request::handle_send(
                &gateway,
                &args.path,
                &args.method,
                &args.headers,
                args.data.as_deref(),
            )
            .await
        }
        Commands::Upload(args) => {
            authgate::cli::request::handle_upload(&gateway, &args.path, &args.fields, &args.files)
                .await
        }
    }
}
