use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "meridian", version, about = "Meridian cluster broker CLI")]
struct Cli {
    /// Broker configuration file.
    #[arg(
        long,
        global = true,
        env = "MERIDIAN_CONFIG",
        default_value = "meridian.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the service catalog as JSON.
    Catalog,

    /// Resolve a plan for an instance and print it (passwords masked).
    Render {
        /// Plan id, e.g. meridian-plan-template-basic
        #[arg(long)]
        plan: String,

        #[arg(long)]
        instance: String,

        /// Caller parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
    },

    /// Look an instance up across all organization partitions.
    Instance { instance_id: String },

    /// Run a full lifecycle against the simulated API and a memory store.
    Smoke {
        /// Plan to provision. Defaults to the first plan in the catalog.
        #[arg(long)]
        plan: Option<String>,

        #[arg(long, default_value = "smoke-instance")]
        instance: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Smoke runs without a configuration file; everything else needs one.
    let config = match &cli.cmd {
        Command::Smoke { .. } => commands::load_config_or_default(&cli.config)?,
        _ => commands::load_config(&cli.config)?,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Catalog => commands::catalog::run(&config)?,
        Command::Render {
            plan,
            instance,
            params,
        } => commands::render::run(&config, &plan, &instance, params.as_deref())?,
        Command::Instance { instance_id } => commands::instance::run(&config, &instance_id).await?,
        Command::Smoke { plan, instance } => {
            commands::smoke::run(config, plan.as_deref(), &instance).await?
        }
    }

    Ok(())
}
