//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 60-69   | migrate          | Migration run codes                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use feuermig_io::IoError;
use feuermig_recon::MigrateError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments. clap exits with it on parse failures.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Migrate (60-69)
// =============================================================================

/// Config file unreadable, not valid TOML, or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 60;

/// An input export could not be read, or violates its report layout.
pub const EXIT_INPUT: u8 = 61;

/// Import file or summary could not be written.
pub const EXIT_OUTPUT: u8 = 62;

/// Run completed, but records were skipped and `--strict` was given.
pub const EXIT_SKIPPED: u8 = 63;

/// Map a run-level error to its exit code.
pub fn migrate_exit_code(err: &MigrateError) -> u8 {
    match err {
        MigrateError::ConfigParse(_) | MigrateError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        MigrateError::Format { .. } | MigrateError::MissingColumns { .. } => EXIT_INPUT,
        MigrateError::Io(_) => EXIT_OUTPUT,
    }
}

/// Every decoding failure is an input problem.
pub fn io_exit_code(_err: &IoError) -> u8 {
    EXIT_INPUT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_USAGE, EXIT_INVALID_CONFIG, EXIT_INPUT, EXIT_OUTPUT, EXIT_SKIPPED];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn migrate_errors_map_by_kind() {
        assert_eq!(migrate_exit_code(&MigrateError::ConfigParse("x".into())), EXIT_INVALID_CONFIG);
        assert_eq!(migrate_exit_code(&MigrateError::format("Adressenliste", "x")), EXIT_INPUT);
        assert_eq!(
            migrate_exit_code(&MigrateError::MissingColumns { report: "Fox112".into(), columns: vec![] }),
            EXIT_INPUT
        );
        assert_eq!(migrate_exit_code(&MigrateError::Io("disk full".into())), EXIT_OUTPUT);
    }
}
