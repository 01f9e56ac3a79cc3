//! `feuermig inspect`: show what the reader makes of a single export.

use std::path::PathBuf;

use feuermig_recon::reader::read_records;
use feuermig_recon::schema::{source_descriptor, target_descriptor};
use feuermig_recon::{MigrationConfig, ReportKind, Side};

use crate::exit_codes::EXIT_OUTPUT;
use crate::migrate::{exclusion_set, load_grid};
use crate::CliError;

fn is_xml(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("JSON serialization error: {e}")))?;
    println!("{json_str}");
    Ok(())
}

pub fn cmd_inspect(file: PathBuf, report: ReportKind, side: Side) -> Result<(), CliError> {
    if is_xml(&file) {
        let persons = feuermig_io::read_history(&file)
            .map_err(|e| CliError::new(crate::exit_codes::io_exit_code(&e), e.to_string()))?;
        print_json(&persons)?;
        eprintln!(
            "{}: {} person(s), {} with rank or function history",
            file.display(),
            persons.len(),
            exclusion_set(&persons).len(),
        );
        return Ok(());
    }

    let config = MigrationConfig::for_report(report, &file.display().to_string());
    let descriptor = match side {
        Side::Source => source_descriptor(&config),
        Side::Target => target_descriptor(&config),
    };

    let grid = load_grid(&file)?;
    let output = read_records(&grid, &descriptor)
        .map_err(|e| CliError::new(crate::exit_codes::migrate_exit_code(&e), e.to_string()))?;
    print_json(&output)?;

    eprintln!(
        "{} ({}): {} record(s), {} skipped, {} filtered",
        file.display(),
        output.report,
        output.records.len(),
        output.skipped.len(),
        output.filtered,
    );
    Ok(())
}
