use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use tunnelrig::cli::{Cli, Commands};
use tunnelrig::commands;
use tunnelrig::config::{AccountOverrides, Settings};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with env-filter support.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "tunnelrig", &mut std::io::stdout());
        return;
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(
        cli.global.config_file.as_deref(),
        AccountOverrides {
            user: cli.global.user,
            access_key: cli.global.access_key,
            api_url: cli.global.api_url,
        },
    )?;

    match cli.command {
        Commands::Start(args) => commands::start::run(&settings, args).await,
        Commands::List => commands::list::run(&settings).await,
        Commands::Inspect { id } => commands::inspect::run(&settings, &id).await,
        Commands::Jobs { id } => commands::jobs::run(&settings, &id).await,
        Commands::Delete { id } => commands::delete::run(&settings, &id).await,
        Commands::Doctor { dir } => commands::doctor::run(&settings, dir.as_deref()).await,
        Commands::Completions { .. } => Ok(()),
    }
}
