//! `feuermig run` / `feuermig validate`: config-driven migration runs.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use feuermig_io::{load_table, read_history, HistoryPerson, RawTable};
use feuermig_recon::emit::write_import;
use feuermig_recon::normalize::parse_date;
use feuermig_recon::reader::parse_delimited;
use feuermig_recon::summary::render_text;
use feuermig_recon::{ExclusionSet, Grid, ImportRow, MigrationConfig, MigrationInput};

use crate::exit_codes::{
    io_exit_code, migrate_exit_code, EXIT_INPUT, EXIT_INVALID_CONFIG, EXIT_OUTPUT, EXIT_SKIPPED,
};
use crate::CliError;

pub struct RunArgs {
    pub config: PathBuf,
    pub output: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    pub json: bool,
    pub strict: bool,
}

fn migrate_err(e: feuermig_recon::MigrateError) -> CliError {
    CliError::new(migrate_exit_code(&e), e.to_string())
}

fn io_err(e: feuermig_io::IoError) -> CliError {
    CliError::new(io_exit_code(&e), e.to_string())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_config(config_path: &Path) -> Result<MigrationConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_INVALID_CONFIG, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    MigrationConfig::from_toml(&config_str).map_err(migrate_err)
}

/// Decode an export into a cell grid.
pub fn load_grid(path: &Path) -> Result<Grid, CliError> {
    match load_table(path).map_err(io_err)? {
        RawTable::Rows(rows) => Ok(Grid::from_rows(rows)),
        RawTable::Text { content, delimiter } => parse_delimited(&content, delimiter)
            .map_err(|e| CliError::new(EXIT_INPUT, format!("{}: {e}", path.display()))),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

/// Everyone with a rank or function in the history export is excluded.
pub fn exclusion_set(persons: &[HistoryPerson]) -> ExclusionSet {
    let mut set = ExclusionSet::new();
    for person in persons.iter().filter(|p| p.has_history()) {
        let reason = format!(
            "{}, {} in Fox112 history",
            plural(person.ranks, "rank", "ranks"),
            plural(person.functions, "function", "functions"),
        );
        let birth = person.birth_date.as_deref().and_then(parse_date);
        set.insert(&person.surname, &person.given_name, birth, reason);
    }
    set
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    // Resolve file paths relative to config file's directory
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));

    let source = load_grid(&base_dir.join(&config.files.source))?;
    let target = load_grid(&base_dir.join(&config.files.target))?;

    let exclusions = match &config.files.exclusions {
        Some(file) => {
            let persons = read_history(&base_dir.join(file)).map_err(io_err)?;
            let set = exclusion_set(&persons);
            tracing::info!(persons = persons.len(), excluded = set.len(), "read Fox112 history");
            Some(set)
        }
        None => None,
    };

    let input = MigrationInput::from_grids(&config, &source, &target, exclusions).map_err(migrate_err)?;
    let result = feuermig_recon::run(&config, &input).map_err(migrate_err)?;

    // Import files
    let output = args.output.clone().unwrap_or_else(|| match &config.files.output {
        Some(file) => base_dir.join(file),
        None => base_dir.join(format!("{}_import.csv", config.report)),
    });
    match &config.files.output_no_fee {
        Some(file) => {
            let (with_fee, without_fee) = result.split_by_fee();
            write_rows(&output, &with_fee)?;
            write_rows(&base_dir.join(file), &without_fee)?;
        }
        None => {
            let rows: Vec<&ImportRow> = result.rows.iter().collect();
            write_rows(&output, &rows)?;
        }
    }

    // Run result as JSON
    if args.summary.is_some() || args.json {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::new(EXIT_OUTPUT, format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = args.summary {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write summary: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if args.json {
            println!("{json_str}");
        }
    }

    // Human summary to stderr
    eprintln!(
        "{} '{}' ({}, {}):",
        config.report,
        result.meta.config_name,
        result.meta.mode,
        if result.meta.complete_payload { "complete payload" } else { "sparse payload" },
    );
    eprint!("{}", render_text(&result.summary));

    let skipped = result.summary.skipped_total();
    if args.strict && skipped > 0 {
        return Err(CliError::new(EXIT_SKIPPED, format!("{skipped} record(s) skipped (--strict)")));
    }
    Ok(())
}

/// Write one import file. An empty row set gives an empty file.
fn write_rows(path: &Path, rows: &[&ImportRow]) -> Result<(), CliError> {
    let file = File::create(path)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display())))?;
    write_import(rows.iter().copied(), BufWriter::new(file)).map_err(migrate_err)?;
    eprintln!("wrote {} ({} rows)", path.display(), rows.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let mut missing: Vec<String> = [Some(&config.files.source), Some(&config.files.target), config.files.exclusions.as_ref()]
        .into_iter()
        .flatten()
        .filter(|file| !base_dir.join(file).is_file())
        .cloned()
        .collect();
    missing.dedup();
    if !missing.is_empty() {
        return Err(CliError::new(EXIT_INPUT, format!("input file(s) not found: {}", missing.join(", ")))
            .with_hint("paths in [files] are relative to the config file"));
    }

    eprintln!(
        "valid: {} migration '{}' ({}, {})",
        config.report,
        config.name,
        config.mode(),
        if config.complete_payload() { "complete payload" } else { "sparse payload" },
    );
    Ok(())
}
