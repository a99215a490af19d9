pub mod data;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::database::PgStore;

#[derive(Parser)]
#[command(name = "tours-data")]
#[command(about = "Load or wipe development data in the tours database")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create every document of a JSON array file (non-UUID ids map to stable UUIDs)")]
    Import {
        #[arg(long, value_enum, help = "Target collection")]
        collection: Collection,
        #[arg(help = "JSON file holding an array of documents")]
        file: PathBuf,
    },

    #[command(about = "Delete every document of a collection")]
    Delete {
        #[arg(long, value_enum, help = "Target collection")]
        collection: Collection,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Tours,
    Users,
    Reviews,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let config = AppConfig::from_env();
    if config.database.url.is_none() {
        anyhow::bail!("DATABASE_URL must point at the Postgres database to load");
    }
    let store = PgStore::connect(&config.database).await?;
    crate::models::register_all(&store).await?;

    let result = match cli.command {
        Commands::Import { collection, file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let docs: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
            let created = data::import(&store, collection, docs, chrono::Utc::now()).await;
            created.and_then(|created| {
                output::output_success(
                    &output_format,
                    &format!("Imported {} documents into {:?}", created, collection),
                    Some(serde_json::json!({ "collection": collection, "created": created })),
                )
            })
        }
        Commands::Delete { collection } => {
            let deleted = data::delete(&store, collection).await;
            deleted.and_then(|deleted| {
                output::output_success(
                    &output_format,
                    &format!("Deleted {} documents from {:?}", deleted, collection),
                    Some(serde_json::json!({ "collection": collection, "deleted": deleted })),
                )
            })
        }
    };

    store.close().await;
    result
}
