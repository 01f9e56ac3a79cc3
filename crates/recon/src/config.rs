use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    pub name: String,
    pub report: ReportKind,
    #[serde(default = "default_organisation")]
    pub organisation: String,
    /// Overrides the report kind's default mode.
    #[serde(default)]
    pub mode: Option<MigrationMode>,
    /// Overrides the report kind's default fee-block policy.
    #[serde(default)]
    pub complete_payload: Option<bool>,
    /// Overrides the built-in page-1 column correction of paginated target reports.
    #[serde(default)]
    pub page1_shift: Option<Page1Shift>,
    pub files: FilesConfig,
    #[serde(default)]
    pub passive: PassiveConfig,
}

fn default_organisation() -> String {
    "Bröckel, OF".into()
}

// ---------------------------------------------------------------------------
// Report kind + mode
// ---------------------------------------------------------------------------

/// Which FeuerON report the run reconciles against, and what it updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Adressenliste: street address updates.
    Address,
    /// Erreichbarkeiten: address and contact updates.
    Contact,
    /// Bankverbindungen: bank detail updates.
    Bank,
    /// Erreichbarkeiten: new passive (supporting) members.
    Passive,
}

impl ReportKind {
    pub fn default_mode(&self) -> MigrationMode {
        match self {
            Self::Passive => MigrationMode::CreateOnly,
            Self::Address | Self::Contact | Self::Bank => MigrationMode::UpdateOnly,
        }
    }

    pub fn default_complete_payload(&self) -> bool {
        matches!(self, Self::Passive)
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Contact => write!(f, "contact"),
            Self::Bank => write!(f, "bank"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "address" => Ok(Self::Address),
            "contact" => Ok(Self::Contact),
            "bank" => Ok(Self::Bank),
            "passive" => Ok(Self::Passive),
            other => Err(MigrateError::ConfigValidation(format!(
                "unknown report '{other}' (expected address, contact, bank or passive)"
            ))),
        }
    }
}

/// What happens to matched and unmatched source records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Matched → update row, unmatched → `no_match` skip.
    UpdateOnly,
    /// Matched → `already_present` skip, unmatched → create row.
    CreateOnly,
    /// Matched → update row, unmatched → create row.
    Upsert,
}

impl MigrationMode {
    pub fn updates(&self) -> bool {
        matches!(self, Self::UpdateOnly | Self::Upsert)
    }

    pub fn creates(&self) -> bool {
        matches!(self, Self::CreateOnly | Self::Upsert)
    }
}

impl std::fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateOnly => write!(f, "update_only"),
            Self::CreateOnly => write!(f, "create_only"),
            Self::Upsert => write!(f, "upsert"),
        }
    }
}

/// Page-1 column correction for paginated reports.
///
/// `delta > 0` removes `delta` cells at `at` (they must be blank);
/// `delta < 0` inserts blank cells at `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Page1Shift {
    pub at: usize,
    pub delta: i8,
}

impl Page1Shift {
    pub const NONE: Page1Shift = Page1Shift { at: 0, delta: 0 };
}

// ---------------------------------------------------------------------------
// Files + passive import settings
// ---------------------------------------------------------------------------

/// Input and output paths, relative to the config file's directory.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub exclusions: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    /// Rows without a fee block go here instead of `output` (sparse fee policy only).
    #[serde(default)]
    pub output_no_fee: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassiveConfig {
    #[serde(default = "default_department")]
    pub department: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_fee_type")]
    pub fee_type: String,
    #[serde(default = "default_prefix")]
    pub personal_nr_prefix: String,
    #[serde(default = "default_width")]
    pub personal_nr_width: usize,
}

fn default_department() -> String {
    "Fördernde Mitglieder".into()
}

fn default_state() -> String {
    "Niedersachsen".into()
}

fn default_fee_type() -> String {
    "Mitgliedsbeitrag".into()
}

fn default_prefix() -> String {
    "Broe_F_".into()
}

fn default_width() -> usize {
    3
}

impl Default for PassiveConfig {
    fn default() -> Self {
        Self {
            department: default_department(),
            state: default_state(),
            fee_type: default_fee_type(),
            personal_nr_prefix: default_prefix(),
            personal_nr_width: default_width(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

/// FeuerON `PERS_NR` is limited to 10 characters.
const PERS_NR_MAX: usize = 10;
const ORGANISATION_MAX: usize = 80;

impl MigrationConfig {
    pub fn from_toml(input: &str) -> Result<Self, MigrateError> {
        let config: MigrationConfig =
            toml::from_str(input).map_err(|e| MigrateError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.name.trim().is_empty() {
            return Err(MigrateError::ConfigValidation("name must not be empty".into()));
        }

        let organisation_len = self.organisation.trim().chars().count();
        if organisation_len == 0 || organisation_len > ORGANISATION_MAX {
            return Err(MigrateError::ConfigValidation(format!(
                "organisation must be 1-{ORGANISATION_MAX} characters, got {organisation_len}"
            )));
        }

        if self.files.source.trim().is_empty() || self.files.target.trim().is_empty() {
            return Err(MigrateError::ConfigValidation(
                "files.source and files.target are required".into(),
            ));
        }

        // Passive imports must never re-import people with an active-duty history
        if self.report == ReportKind::Passive && self.files.exclusions.is_none() {
            return Err(MigrateError::ConfigValidation(
                "report 'passive' requires files.exclusions (Fox112 XML export)".into(),
            ));
        }

        if self.files.output_no_fee.is_some() && self.complete_payload() {
            return Err(MigrateError::ConfigValidation(
                "files.output_no_fee cannot be combined with complete_payload = true".into(),
            ));
        }

        let width = self.passive.personal_nr_width;
        if !(1..=6).contains(&width) {
            return Err(MigrateError::ConfigValidation(format!(
                "passive.personal_nr_width must be between 1 and 6, got {width}"
            )));
        }
        let pers_nr_len = self.passive.personal_nr_prefix.chars().count() + width;
        if pers_nr_len > PERS_NR_MAX {
            return Err(MigrateError::ConfigValidation(format!(
                "generated personnel numbers would be {pers_nr_len} characters (max {PERS_NR_MAX})"
            )));
        }

        if let Some(shift) = self.page1_shift {
            if !(-3..=3).contains(&shift.delta) {
                return Err(MigrateError::ConfigValidation(format!(
                    "page1_shift.delta must be between -3 and 3, got {}",
                    shift.delta
                )));
            }
        }

        Ok(())
    }

    /// Built-in defaults for a report kind, for reading a single export
    /// without a run config. Not validated; never passed to `run`.
    pub fn for_report(report: ReportKind, file: &str) -> Self {
        Self {
            name: format!("inspect {report}"),
            report,
            organisation: default_organisation(),
            mode: None,
            complete_payload: None,
            page1_shift: None,
            files: FilesConfig {
                source: file.to_string(),
                target: file.to_string(),
                exclusions: None,
                output: None,
                output_no_fee: None,
            },
            passive: PassiveConfig::default(),
        }
    }

    pub fn mode(&self) -> MigrationMode {
        self.mode.unwrap_or_else(|| self.report.default_mode())
    }

    pub fn complete_payload(&self) -> bool {
        self.complete_payload
            .unwrap_or_else(|| self.report.default_complete_payload())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
