//! Factory Production Planner
//!
//! Plans production chains for Satisfactory-style factories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use factory_planner::catalog::RecipeCatalog;
use factory_planner::cost::CostPropagator;
use factory_planner::models::PlanRequest;
use factory_planner::report::{BottleneckReport, CostReport, PlanSummary};
use factory_planner::{Planner, PlannerConfig, SolveProgress, db, import, sample, validate};

#[derive(Parser)]
#[command(name = "factory-planner")]
#[command(about = "Production planner for Satisfactory-style factories")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "factory_data.db")]
    database: PathBuf,

    /// JSON file with solver tunables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Import items, buildings and recipes from game class dumps (Docs.json)
    Import {
        /// Directory containing the dumps
        docs_dir: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Load the built-in sample catalog (without game data)
    LoadSample {
        /// Also write a sample plan request to this file
        #[arg(long)]
        plan: Option<PathBuf>,
    },

    /// List all buildings in the database
    ListBuildings,

    /// List all items, raw resources first
    ListItems,

    /// Show every recipe producing an item
    Recipes {
        /// Item name (e.g., "IronPlate")
        item: String,
    },

    /// Raw resources needed for an item
    Cost {
        item: String,

        /// Quantity per minute
        #[arg(short, long, default_value = "1.0")]
        rate: f64,

        /// Take the recipe selection from this plan file
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// Check a plan request without solving it
    Validate {
        /// Plan request JSON
        plan: PathBuf,
    },

    /// Allocate inputs to goals and print the production plan
    Solve {
        /// Plan request JSON
        plan: PathBuf,

        /// Also list bottlenecks with suggestions
        #[arg(short, long)]
        bottlenecks: bool,
    },
}

fn read_plan(path: &Path) -> Result<PlanRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse plan {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };

    let mut conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Import { docs_dir, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_catalog(&conn)?;
            }

            let stats = import::import_to_database(&mut conn, &docs_dir)?;
            println!("\n{}", stats);
        }

        Commands::LoadSample { plan } => {
            db::clear_catalog(&conn)?;
            let catalog = sample::sample_catalog()?;
            db::save_catalog(&mut conn, &catalog)?;
            println!(
                "Loaded {} sample items and {} recipes",
                catalog.items().count(),
                catalog.recipes().count()
            );

            if let Some(path) = plan {
                let json = serde_json::to_string_pretty(&sample::sample_request())?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Sample plan written to {}", path.display());
            }
        }

        Commands::ListBuildings => {
            let buildings = db::list_buildings(&conn)?;
            if buildings.is_empty() {
                println!("No buildings in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<30} {:>10}", "Building", "Power (MW)");
                println!("{}", "-".repeat(41));
                for b in buildings {
                    println!("{:<30} {:>10.1}", b.name, b.power_mw);
                }
            }
        }

        Commands::ListItems => {
            let items = db::list_items(&conn)?;
            if items.is_empty() {
                println!("No items in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<32} {:<12} {:>8}  {}", "Item", "Category", "Sink", "Form");
                println!("{}", "-".repeat(62));
                for (item, is_raw) in items {
                    let marker = if is_raw { " (raw)" } else { "" };
                    println!(
                        "{:<32} {:<12} {:>8.0}  {}{}",
                        item.name,
                        item.category,
                        item.sink_value,
                        item.form.as_str(),
                        marker
                    );
                }
            }
        }

        Commands::Recipes { item } => {
            let catalog = db::load_catalog(&conn)?;
            for recipe in catalog.producers(&item)? {
                let alt = if recipe.alternate { " (alternate)" } else { "" };
                println!("{} [{}]{}", recipe.name, recipe.id, alt);
                println!(
                    "  {} @ {:.2}/min per machine",
                    recipe.building,
                    recipe.output_per_minute(&item)
                );
                for (ingredient, quantity) in &recipe.ingredients {
                    println!("    needs {} x {}", ingredient, quantity);
                }
                for (product, quantity) in &recipe.products {
                    println!("    makes {} x {}", product, quantity);
                }
            }
        }

        Commands::Cost { item, rate, plan } => {
            let catalog = db::load_catalog(&conn)?;
            let selection = match plan {
                Some(path) => read_plan(&path)?.recipes,
                None => Default::default(),
            };
            let mut costs = CostPropagator::new(&catalog, selection, config.cache_ttl());
            let cost = costs.raw_cost(&item, rate)?;
            println!(
                "{}",
                CostReport {
                    item: &item,
                    quantity: rate,
                    cost: &cost,
                }
            );
        }

        Commands::Validate { plan } => {
            let catalog = db::load_catalog(&conn)?;
            let request = read_plan(&plan)?;
            let report = validate::validate(&catalog, &request, &config);
            if report.is_valid() {
                println!("Plan is valid.");
            } else {
                println!("{}", report);
                std::process::exit(1);
            }
        }

        Commands::Solve { plan, bottlenecks } => {
            let catalog = Arc::new(db::load_catalog(&conn)?);
            let request = read_plan(&plan)?;
            let mut planner = Planner::new(catalog, config).with_request(request);

            let job = planner.spawn_solve();
            for progress in job.progress() {
                match progress {
                    SolveProgress::ValidationStarted => eprintln!("Validating..."),
                    SolveProgress::SolvingStarted => eprintln!("Solving..."),
                    SolveProgress::Percent(p) => tracing::debug!(percent = p, "progress"),
                    SolveProgress::Done => eprintln!("Done."),
                }
            }
            let committed = planner.finish(job)?;

            println!("{}", PlanSummary::new(&committed.plan));
            if bottlenecks {
                println!();
                println!("{}", BottleneckReport::new(&committed.bottlenecks));
            }
        }
    }

    Ok(())
}
