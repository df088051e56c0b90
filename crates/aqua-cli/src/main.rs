//! 🚀 aqua-cli: the front door for humans who'd rather not write JSON by hand.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Loads config, sets up logging, then hands off to the library:
//! serve the console handlers, poke at models, check a forecast YAML,
//! or build the `ads aqua` command line a console form would produce. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use tracing::error;
use tracing_subscriber::EnvFilter;

use aqua::aqua::CliDetails;
use aqua::model::{DownloadOptions, ModelCatalog};
use aqua::operators::ForecastOperatorConfig;

#[derive(Debug, Parser)]
#[command(name = "aqua", version, about = "🌊 OCI Data Science model catalog client")]
struct Cli {
    /// 🔧 TOML config file. `AQUA_*` env vars fill in the rest.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 🌐 Serve the `/aqua` REST handlers.
    Serve,
    /// 📚 Work with catalog models.
    #[command(subcommand)]
    Model(ModelCommand),
    /// 📈 Forecast operator helpers.
    #[command(subcommand)]
    Forecast(ForecastCommand),
    /// ⌨️ Build an `ads aqua` command line.
    #[command(subcommand)]
    Cli(CliCommand),
}

#[derive(Debug, Subcommand)]
enum ModelCommand {
    /// 📋 List models in a compartment.
    List {
        #[arg(long)]
        compartment_id: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// 🔍 Print one model as YAML.
    Get { model_id: String },
    /// 🗑️ Delete a model.
    Delete {
        model_id: String,
        /// Take active deployments down with it.
        #[arg(long)]
        delete_associated_model_deployment: bool,
    },
    /// 📥 Download a model's artifact.
    Download {
        model_id: String,
        target_dir: PathBuf,
        #[arg(long)]
        force_overwrite: bool,
        /// Staging bucket for artifacts over the size threshold.
        #[arg(long)]
        bucket_uri: Option<String>,
    },
    /// 🧊 Restore an archived model artifact.
    Restore {
        model_id: String,
        #[arg(long)]
        hours: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
enum ForecastCommand {
    /// 🧮 Parse a forecast YAML and print it with every default filled in.
    Show { yaml: PathBuf },
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// 🔨 `{"command", "subcommand", "payload"}` JSON in, command line out.
    Build { json: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing: because println! debugging is a lifestyle choice
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(err) = dispatch(cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("Connection refused")
                || cause_str.contains("connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }
        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: the OCI endpoint isn't reachable. Check `oci.region`, any \
                `oci.endpoints.*` overrides, and that your network can see the service. ☕"
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Forecast(ForecastCommand::Show { yaml }) => {
            let config = ForecastOperatorConfig::from_yaml_file(&yaml)
                .with_context(|| format!("💀 Could not read forecast config '{}'", yaml.display()))?;
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Command::Cli(CliCommand::Build { json }) => {
            let details: CliDetails =
                serde_json::from_str(&json).context("💀 Invalid format of input data.")?;
            println!("{}", details.build_cli()?);
            Ok(())
        }
        Command::Serve => {
            let app_config = load(cli.config)?;
            aqua::run(app_config).await
        }
        Command::Model(command) => {
            let app_config = load(cli.config)?;
            let catalog = ModelCatalog::from_config(&app_config).context("💀 Could not build the catalog client")?;
            run_model_command(&catalog, command).await
        }
    }
}

fn load(config: Option<PathBuf>) -> Result<aqua::app_config::AppConfig> {
    if let Some(path) = &config {
        let exists = path
            .try_exists()
            .with_context(|| format!("💀 Couldn't check whether '{}' exists", path.display()))?;
        if !exists {
            anyhow::bail!(
                "💀 Configuration file '{}' does not exist. Relative paths resolve against the current directory.",
                path.display()
            );
        }
    }
    aqua::app_config::load_config(config.as_deref())
        .context("💀 In aqua-cli we couldn't load the config. Check the TOML and the AQUA_* variables.")
}

async fn run_model_command(catalog: &ModelCatalog, command: ModelCommand) -> Result<()> {
    match command {
        ModelCommand::List {
            compartment_id,
            project_id,
            category,
        } => {
            let models = catalog
                .list(compartment_id.as_deref(), project_id.as_deref(), category.as_deref())
                .await?;
            let mut table = Table::new();
            table
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "Display name", "State", "Created"]);
            for model in &models {
                table.add_row(vec![
                    model.id().unwrap_or_default(),
                    model.display_name().unwrap_or_default(),
                    model.lifecycle_state().unwrap_or_default(),
                    model.time_created().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        ModelCommand::Get { model_id } => {
            let model = catalog.from_id(&model_id).await?;
            print!("{}", model.to_yaml()?);
        }
        ModelCommand::Delete {
            model_id,
            delete_associated_model_deployment,
        } => {
            let mut model = catalog.from_id(&model_id).await?;
            catalog
                .delete(&mut model, delete_associated_model_deployment)
                .await?;
            println!("🗑️ {model_id} is {}", model.lifecycle_state().unwrap_or("gone"));
        }
        ModelCommand::Download {
            model_id,
            target_dir,
            force_overwrite,
            bucket_uri,
        } => {
            let model = catalog.from_id(&model_id).await?;
            let options = DownloadOptions {
                force_overwrite,
                bucket_uri,
                ..DownloadOptions::default()
            };
            catalog
                .download_artifact(&model, &target_dir, &options)
                .await
                .with_context(|| format!("💀 Downloading {model_id} into '{}' failed", target_dir.display()))?;
            println!("📥 {model_id} → {}", target_dir.display());
        }
        ModelCommand::Restore { model_id, hours } => {
            let model = catalog.from_id(&model_id).await?;
            catalog.restore_model(&model, hours).await?;
            println!("🧊 {model_id} restored");
        }
    }
    Ok(())
}
