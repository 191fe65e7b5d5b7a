//! catmap CLI entry point.
//!
//! Classifies text against the local mapping database and exposes the
//! review workflow for unmapped inputs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use catmap::application::mapping::{MappingEngine, MappingUpdate, NewMapping};
use catmap::domain::{MappingStatus, MappingType};
use catmap::infra::app_config::{load_config, save_config};
use catmap::infra::db::{Database, SqliteMappingStore};
use catmap::infra::seed::seed_default_mappings;

#[derive(Parser, Debug)]
#[command(name = "catmap")]
#[command(version)]
#[command(about = "Adaptive category mapping engine", long_about = None)]
struct Args {
    /// Database file (defaults to CATMAP_DB_PATH or the app data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify free-form text
    Classify {
        text: String,
        #[arg(short, long = "lang", default_value = "en")]
        language: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },

    /// Load the starter mappings into an empty database
    Seed,

    /// Author a mapping
    Create {
        key: String,
        category: String,
        #[arg(short, long = "lang", default_value = "en")]
        language: String,
        #[arg(long = "alias")]
        aliases: Vec<String>,
        #[arg(long = "pattern")]
        patterns: Vec<String>,
        #[arg(long, default_value_t = 0.9)]
        confidence: f64,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long = "type", default_value = "category")]
        mapping_type: MappingType,
        #[arg(long)]
        created_by: Option<String>,
    },

    /// Change an existing mapping
    Update {
        id: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        confidence: Option<f64>,
        #[arg(long)]
        status: Option<MappingStatus>,
        #[arg(long)]
        updated_by: Option<String>,
    },

    /// List candidates awaiting review
    Candidates {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Approve a candidate into a mapping
    Approve {
        id: String,
        category: String,
        #[arg(long)]
        reviewer: Option<String>,
    },

    /// Reject a candidate
    Reject {
        id: String,
        reason: String,
        #[arg(long)]
        reviewer: Option<String>,
    },

    /// Print store and cache statistics
    Stats,

    /// Delete rejected candidates older than the given age
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let config = load_config();
    if let Commands::Config { save } = args.command {
        if save {
            save_config(&config).context("Failed to write config file")?;
        }
        return print_json(&config);
    }

    let db = match args.db {
        Some(path) => Database::open_at(path),
        None => Database::open(),
    }
    .context("Failed to open mapping database")?;
    let store = Arc::new(SqliteMappingStore::new(&db));

    if let Commands::Seed = args.command {
        let seeded = seed_default_mappings(store.as_ref())
            .await
            .context("Failed to seed mappings")?;
        return print_json(&serde_json::json!({ "seeded": seeded }));
    }

    let engine = MappingEngine::new(store, config)?;
    engine.initialize().await?;

    let outcome = run(&engine, args.command).await;
    engine.shutdown().await;
    outcome
}

async fn run(engine: &MappingEngine, command: Commands) -> Result<()> {
    match command {
        Commands::Classify {
            text,
            language,
            user,
            session,
        } => {
            let result = engine
                .map_category(&text, &language, user.as_deref(), session.as_deref())
                .await;
            print_json(&result)
        }
        Commands::Create {
            key,
            category,
            language,
            aliases,
            patterns,
            confidence,
            priority,
            mapping_type,
            created_by,
        } => {
            let mapping = engine
                .create_mapping(NewMapping {
                    key,
                    target_category: category,
                    language,
                    mapping_type,
                    aliases,
                    patterns,
                    confidence,
                    priority,
                    created_by,
                })
                .await?;
            print_json(&mapping)
        }
        Commands::Update {
            id,
            category,
            priority,
            confidence,
            status,
            updated_by,
        } => {
            let update = MappingUpdate {
                target_category: category,
                priority,
                confidence,
                status,
                updated_by,
                ..MappingUpdate::default()
            };
            print_json(&engine.update_mapping(&id, update).await?)
        }
        Commands::Candidates { limit, offset } => {
            print_json(&engine.get_pending_candidates(limit, offset).await?)
        }
        Commands::Approve {
            id,
            category,
            reviewer,
        } => print_json(
            &engine
                .approve_candidate(&id, &category, reviewer.as_deref())
                .await?,
        ),
        Commands::Reject {
            id,
            reason,
            reviewer,
        } => print_json(
            &engine
                .reject_candidate(&id, &reason, reviewer.as_deref())
                .await?,
        ),
        Commands::Stats => print_json(&engine.get_mapping_stats().await?),
        Commands::Cleanup { days } => {
            let deleted = engine.cleanup_candidates(days).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))
        }
        Commands::Seed | Commands::Config { .. } => Ok(()),
    }
}
