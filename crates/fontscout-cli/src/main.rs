mod commands;
mod logging;
mod progress;

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use fontscout_core::matcher::{resolve_system_fonts, DirectoryCatalog};
use fontscout_core::storage::FontSummaryRow;
use fontscout_core::{
    AppConfig, FontMatcher, IndexStore, ScanEngine, ScanPhase, ScanRequest, ScanStatus,
};
use progress::CliReporter;
use tracing::{debug, error, info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match fontscout_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Scan {
            root,
            jobs,
            include_hidden,
            no_resolve,
        }) => run_scan(&config, root, jobs, include_hidden, no_resolve),
        Some(Commands::Search { query, limit }) => run_search(&config, &query, limit),
        Some(Commands::Fonts { limit }) => run_search(&config, "", limit),
        Some(Commands::Summary { query, json }) => run_summary(&config, &query, json),
        Some(Commands::Count) => open_store(&config).and_then(|store| {
            println!("{} font occurrences indexed", store.total_count()?);
            Ok(())
        }),
        Some(Commands::Resolve) => run_resolve(&config),
        Some(Commands::Missing) => run_missing(&config),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        Some(Commands::TruncateDb) => {
            match prompt_confirm(
                "Are you SURE you want to delete the whole font index?",
                Some(false),
            ) {
                Ok(true) => open_store(&config).and_then(|store| {
                    store.clear()?;
                    println!("Font index cleared");
                    Ok(())
                }),
                _ => process::exit(0),
            }
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {}", err);
        process::exit(1);
    }

    Ok(())
}

fn open_store(config: &AppConfig) -> Result<IndexStore, Box<dyn Error>> {
    Ok(IndexStore::open(&config.db_path)?)
}

fn font_catalog(config: &AppConfig) -> DirectoryCatalog {
    let catalog = if config.font_dirs.is_empty() {
        DirectoryCatalog::system()
    } else {
        DirectoryCatalog::new(config.font_dir_paths())
    };
    if catalog.roots().is_empty() {
        warn!("No font directories found; every font will be reported missing");
    } else {
        debug!("Installed fonts are read from {:?}", catalog.roots());
    }
    catalog
}

fn run_scan(
    config: &AppConfig,
    root: Option<PathBuf>,
    jobs: Option<usize>,
    include_hidden: bool,
    no_resolve: bool,
) -> Result<(), Box<dyn Error>> {
    let root = root
        .or_else(|| config.root_path.as_ref().map(PathBuf::from))
        .ok_or("no folder given and no root_path configured")?;

    let store = Arc::new(open_store(config)?);
    let matcher = Arc::new(FontMatcher::new(Arc::new(font_catalog(config))));
    let engine = ScanEngine::new(store, matcher)
        .with_config(config)
        .with_resolution(config.resolve_after_scan && !no_resolve)
        .with_reporter(Arc::new(CliReporter::new()));

    let mut request = ScanRequest::from_config(&root, config);
    if let Some(jobs) = jobs {
        request = request.with_concurrency_limit(jobs);
    }
    if include_hidden {
        request = request.with_skip_hidden(false);
    }

    engine.scan(request)?;
    let snapshot = engine.wait_for_resolution();

    println!();
    match (snapshot.phase, snapshot.status) {
        (ScanPhase::Completed, ScanStatus::NoTargetFiles) => {
            println!("{}", "No Motion templates found.".yellow());
        }
        (ScanPhase::Completed, ScanStatus::NoFontTags) => {
            println!(
                "{} templates scanned, {}",
                snapshot.files_total,
                "none reference a font.".yellow()
            );
        }
        (ScanPhase::Completed, _) => {
            info!(
                "{} font references to {} fonts in {} templates",
                format!("{}", snapshot.occurrences).green(),
                format!("{}", snapshot.font_counts.len()).green(),
                format!("{}", snapshot.files_total).green(),
            );
            for (kind, count) in &snapshot.file_type_counts {
                println!("  {:<12} {}", kind.label(), count);
            }
            if let Some(summary) = snapshot.resolution {
                info!(
                    "{} installed, {} close variations, {} missing",
                    format!("{}", summary.installed).green(),
                    format!("{}", summary.hinted).yellow(),
                    format!("{}", summary.resolved - summary.installed - summary.hinted).red(),
                );
            }
        }
        (ScanPhase::Cancelled, _) => println!("{}", "Scan cancelled.".yellow()),
        (phase, status) => {
            println!("{} ({:?})", format!("Scan ended: {:?}", phase).red(), status);
        }
    }

    if snapshot.files_failed > 0 {
        warn!("{} files could not be read", snapshot.files_failed);
    }
    if let Some(message) = snapshot.error {
        warn!("{}", message);
    }

    Ok(())
}

fn run_search(config: &AppConfig, query: &str, limit: usize) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let hits = store.search(query, limit)?;
    if hits.is_empty() {
        println!("{}", "No matches.".yellow());
    }
    for hit in hits {
        println!(
            "{:<32} {:<6} {}",
            hit.font_name.bold(),
            hit.file_type.to_string().cyan(),
            hit.file_path
        );
    }
    Ok(())
}

fn run_summary(config: &AppConfig, query: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let rows = store.filtered_summary(query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        println!(
            "{:<32} {:<6} {:>6}  {}",
            row.font_name.bold(),
            row.file_type.to_string().cyan(),
            row.count,
            install_status(row)
        );
    }
    Ok(())
}

fn install_status(row: &FontSummaryRow) -> ColoredString {
    match (row.exists_in_system, row.system_font_name.as_deref()) {
        (None, _) => "unresolved".dimmed(),
        (Some(true), Some(real)) => format!("installed ({})", real).green(),
        (Some(true), None) => "installed".green(),
        (Some(false), Some(hint)) => format!("missing, close to {}", hint).yellow(),
        (Some(false), None) => "missing".red(),
    }
}

fn run_resolve(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let matcher = FontMatcher::new(Arc::new(font_catalog(config)));

    info!("Checking indexed fonts against the installed catalog...");
    let summary = resolve_system_fonts(&store, &matcher, &AtomicBool::new(false))?;
    info!(
        "{} fonts checked: {} installed, {} close variations",
        summary.resolved,
        format!("{}", summary.installed).green(),
        format!("{}", summary.hinted).yellow(),
    );
    Ok(())
}

fn run_missing(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let missing = store.missing_fonts()?;
    if missing.is_empty() {
        println!("{}", "No missing fonts recorded.".green());
    }
    for entry in missing {
        match entry.real_name {
            Some(hint) => println!("{}  {}", entry.font_name.red(), format!("(try {})", hint).dimmed()),
            None => println!("{}", entry.font_name.red()),
        }
    }
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
