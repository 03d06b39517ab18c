//! `strata`: catalogue listing and recipe-driven export.
//!
//! # Usage
//!
//! ```text
//! strata catalogue csv-values --config-file importers/population.toml
//! strata export recipe.json out.geojson --force csv-values:population
//! strata --config strata.toml export recipe.json out.csv --clear-cache
//! ```
//!
//! Settings come from `strata.toml` (or `--config`) overlaid by `STRATA_*`
//! environment variables: `store_path` (default `strata.db`) and
//! `batch_size` (default 10000).

use std::{
  io::Write,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use strata_core::store::CatalogueStore;
use strata_export::{DataExportRecipe, ExportEngine};
use strata_import::{DEFAULT_BATCH_SIZE, ImporterMatcher, ImporterRegistry};
use strata_store_sqlite::SqliteStore;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata", author, version, about = "Strata data catalogue and exporter")]
struct Cli {
  /// Path to the TOML settings file.
  #[arg(short, long, default_value = "strata.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// List an importer's datasources and their attributes, tab-separated.
  Catalogue {
    /// Registered importer name.
    importer: String,

    /// Importer configuration file (TOML or JSON).
    #[arg(long, value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Only list this datasource.
    #[arg(long)]
    datasource: Option<String>,
  },

  /// Run an export recipe and write the result.
  Export {
    /// Recipe JSON file.
    recipe: PathBuf,

    /// Output file; only written when the export succeeds.
    output: PathBuf,

    /// Re-import these datasources regardless of the journal, as
    /// `importer[:datasource],...`.
    #[arg(long, default_value = "")]
    force: ImporterMatcher,

    /// Remove all stored data before running.
    #[arg(long)]
    clear_cache: bool,
  },
}

#[derive(Debug, Deserialize)]
struct Settings {
  store_path: PathBuf,
  batch_size: usize,
}

fn load_settings(path: &Path) -> anyhow::Result<Settings> {
  config::Config::builder()
    .set_default("store_path", "strata.db")?
    .set_default("batch_size", DEFAULT_BATCH_SIZE as i64)?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("STRATA"))
    .build()
    .context("failed to read settings")?
    .try_deserialize()
    .context("failed to deserialise settings")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let registry = ImporterRegistry::with_defaults();

  match cli.command {
    Command::Catalogue { importer, config_file, datasource } => {
      let mut stdout = std::io::stdout().lock();
      catalogue(&registry, &importer, config_file.as_deref(), datasource.as_deref(), &mut stdout)
        .await
    }
    Command::Export { recipe, output, force, clear_cache } => {
      let settings = load_settings(&cli.config)?;
      export(&registry, &settings, &recipe, &output, &force, clear_cache).await
    }
  }
}

async fn catalogue(
  registry: &ImporterRegistry,
  name: &str,
  config_file: Option<&Path>,
  only: Option<&str>,
  out: &mut dyn Write,
) -> anyhow::Result<()> {
  let importer = registry.create(name, config_file)?;
  let ids = match only {
    Some(id) if importer.datasource_exists(id) => vec![id.to_owned()],
    Some(id) => bail!("importer {name} has no datasource {id}"),
    None => importer.datasource_ids(),
  };

  for id in ids {
    let datasource = importer.datasource(&id).await?;
    writeln!(out, "{}\t{}\t{}", datasource.id, datasource.name, datasource.description)?;
    for attribute in &datasource.attributes {
      writeln!(
        out,
        "\t{}\t{}\t{}\t{}",
        attribute.label, attribute.name, attribute.kind, attribute.description
      )?;
    }
  }
  Ok(())
}

async fn export(
  registry: &ImporterRegistry,
  settings: &Settings,
  recipe_path: &Path,
  output: &Path,
  force: &ImporterMatcher,
  clear_cache: bool,
) -> anyhow::Result<()> {
  let source = std::fs::read_to_string(recipe_path)
    .with_context(|| format!("reading recipe {}", recipe_path.display()))?;
  let recipe = match DataExportRecipe::from_json(&source) {
    Ok(recipe) => recipe,
    Err(strata_export::Error::InvalidRecipe(violations)) => {
      for violation in &violations {
        eprintln!("{}: {violation}", recipe_path.display());
      }
      bail!("recipe {} is invalid ({} violations)", recipe_path.display(), violations.len());
    }
    Err(e) => {
      return Err(e).with_context(|| format!("parsing recipe {}", recipe_path.display()));
    }
  };

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;
  if clear_cache {
    info!(store = %settings.store_path.display(), "clearing stored data");
    store.clear_all().await.context("clearing store")?;
  }

  let mut buffer = Vec::new();
  let summary = ExportEngine::new(&store, registry)
    .with_batch_size(settings.batch_size)
    .run(&recipe, force, &mut buffer)
    .await
    .context("export failed")?;

  std::fs::write(output, &buffer)
    .with_context(|| format!("writing {}", output.display()))?;
  info!(
    output = %output.display(),
    subjects = summary.subjects,
    imported = summary.imported,
    skipped_imports = summary.skipped,
    "wrote export"
  );
  Ok(())
}
