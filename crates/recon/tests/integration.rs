use std::path::PathBuf;

use chrono::NaiveDate;

use feuermig_recon::emit::{render_import, write_import};
use feuermig_recon::model::{ContactKind, Field, FieldDiff, RowKind, Table};
use feuermig_recon::reader::parse_delimited;
use feuermig_recon::{run, ExclusionSet, MigrationConfig, MigrationInput, MigrationResult, SkipReason};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn grid(name: &str) -> feuermig_recon::Grid {
    let path = fixtures_dir().join(name);
    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    parse_delimited(&text, b';').unwrap()
}

fn config(report: &str, source: &str, target: &str) -> MigrationConfig {
    config_with(report, source, target, "")
}

/// `extra` holds top-level keys placed before the `[files]` table.
fn config_with(report: &str, source: &str, target: &str, extra: &str) -> MigrationConfig {
    MigrationConfig::from_toml(&format!(
        r#"
name = "integration"
report = "{report}"
{extra}

[files]
source = "{source}"
target = "{target}"
exclusions = "fox112.xml"
"#
    ))
    .unwrap()
}

fn load_and_run(config: &MigrationConfig, exclusions: Option<ExclusionSet>) -> MigrationResult {
    let source = grid(&config.files.source);
    let target = grid(&config.files.target);
    let input = MigrationInput::from_grids(config, &source, &target, exclusions).unwrap();
    run(config, &input).unwrap()
}

fn history() -> ExclusionSet {
    let mut set = ExclusionSet::new();
    set.insert("Alt", "Otto", NaiveDate::from_ymd_opt(1950, 5, 5), "2 ranks, 1 function in Fox112 history");
    set
}

// -------------------------------------------------------------------------
// Contact updates
// -------------------------------------------------------------------------

#[test]
fn contact_run_emits_single_phone_change() {
    let config = config("contact", "fox112_contact.csv", "erreichbarkeiten.csv");
    let result = load_and_run(&config, None);

    let s = &result.summary;
    assert_eq!(s.source_rows, 3);
    assert_eq!(s.target_rows, 3);
    assert_eq!(s.filtered, 1);
    assert_eq!(s.matched_exact, 2);
    assert_eq!(s.updated, 1);
    assert_eq!(s.unchanged, 1);
    assert_eq!(s.skipped_by_reason[&SkipReason::NoMatch], 1);

    assert_eq!(result.rows.len(), 1);
    let row = &result.rows[0];
    assert_eq!(row.kind, RowKind::Update);
    assert_eq!(row.pers_nr, "Broe_001");
    assert_eq!(
        row.diffs,
        vec![FieldDiff {
            field: Field::Contact(ContactKind::MobilePrivate),
            old: String::new(),
            new: "0171 1234567".into(),
        }]
    );

    let csv = render_import(&result.rows).unwrap();
    assert_eq!(
        csv,
        "\"PV_DB.1.ORGANISATION\";\"PV_DB.1.NACHNAME\";\"PV_DB.1.VORNAME\";\"PV_DB.1.PERS_NR\";\
         \"PV_DB.1.GEBURT\";\"PV_DB.1.GESCHLECHT\";\"PV_TELEP.1.TEL_ART\";\"PV_TELEP.1.TELEPHON\"\r\n\
         \"Bröckel, OF\";\"Muster\";\"Hans\";\"Broe_001\";\"01.01.1970\";\"M\";\"Mobil privat\";\"0171 1234567\"\r\n"
    );
}

#[test]
fn identical_inputs_give_identical_bytes() {
    let config = config("contact", "fox112_contact.csv", "erreichbarkeiten.csv");
    let a = render_import(&load_and_run(&config, None).rows).unwrap();
    let b = render_import(&load_and_run(&config, None).rows).unwrap();
    assert_eq!(a, b);
}

#[test]
fn import_file_matches_rendered_bytes() {
    let config = config("contact", "fox112_contact.csv", "erreichbarkeiten.csv");
    let result = load_and_run(&config, None);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kontakt_import.csv");
    write_import(&result.rows, std::fs::File::create(&path).unwrap()).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, render_import(&result.rows).unwrap().into_bytes());
    assert!(written.ends_with(b"\r\n"));
}

// -------------------------------------------------------------------------
// Address updates from the paginated report
// -------------------------------------------------------------------------

#[test]
fn address_run_reads_both_pages() {
    let config = config("address", "fox112_contact.csv", "adressenliste.csv");
    let result = load_and_run(&config, None);

    assert_eq!(result.summary.target_rows, 3);
    assert!(result.summary.skipped.iter().all(|s| s.reason != SkipReason::Format));
    assert_eq!(result.summary.matched_exact, 3);

    // Adressenliste carries no birth date, so every matched row sends one
    let muster = result.rows.iter().find(|r| r.pers_nr == "Broe_001").unwrap();
    assert_eq!(muster.diffs.iter().map(|d| d.field).collect::<Vec<_>>(), vec![Field::BirthDate]);

    let neu = result.rows.iter().find(|r| r.pers_nr == "Broe_004").unwrap();
    let fields: Vec<Field> = neu.diffs.iter().map(|d| d.field).collect();
    assert!(fields.contains(&Field::Postcode));
    assert!(fields.contains(&Field::City));
    assert!(!fields.contains(&Field::Street));
}

#[test]
fn address_run_with_short_first_page() {
    let config = config_with(
        "address",
        "fox112_contact.csv",
        "adressenliste_short_page1.csv",
        "page1_shift = { at = 0, delta = -1 }",
    );
    let result = load_and_run(&config, None);

    assert_eq!(result.summary.target_rows, 3);
    assert!(result.summary.skipped.iter().all(|s| s.reason != SkipReason::Format));
    assert_eq!(result.summary.matched_exact, 3);

    // Page-1 and page-2 records land on the same columns
    let numbers: Vec<&str> = result.rows.iter().map(|r| r.pers_nr.as_str()).collect();
    assert_eq!(numbers, vec!["Broe_001", "Broe_004", "Broe_003"]);
    let muster = result.rows.iter().find(|r| r.pers_nr == "Broe_001").unwrap();
    assert_eq!(muster.diffs.iter().map(|d| d.field).collect::<Vec<_>>(), vec![Field::BirthDate]);
}

#[test]
fn short_first_page_needs_its_shift() {
    let config = config("address", "fox112_contact.csv", "adressenliste_short_page1.csv");
    let result = load_and_run(&config, None);

    let format: Vec<_> = result.summary.skipped.iter().filter(|s| s.reason == SkipReason::Format).collect();
    assert_eq!(format.len(), 2);
    assert!(format.iter().all(|s| s.detail.contains("expected 8 columns")));
}

// -------------------------------------------------------------------------
// Bank updates from the three-row report
// -------------------------------------------------------------------------

#[test]
fn bank_run_updates_changed_accounts() {
    let config = config("bank", "fox112_bank.csv", "bankverbindungen.csv");
    let result = load_and_run(&config, None);

    let s = &result.summary;
    assert_eq!(s.source_rows, 3);
    assert_eq!(s.target_rows, 3);
    assert_eq!(s.matched_probable, 3);
    assert_eq!(s.updated, 1);
    assert_eq!(s.unchanged, 1);
    assert!(s.skipped.iter().all(|s| s.reason != SkipReason::Format));

    assert_eq!(result.rows.len(), 1);
    let row = &result.rows[0];
    assert_eq!(row.pers_nr, "Broe_001");
    assert_eq!(row.diffs.iter().map(|d| d.field).collect::<Vec<_>>(), vec![Field::Iban, Field::Bic]);
    assert_eq!(row.diffs[0].old, "DE02120300000000202051");

    let bank = row.entries_of(Table::PvBank).next().unwrap();
    assert_eq!(bank.get("IBAN").map(|c| c.as_str()), Some("DE89370400440532013000"));
    assert_eq!(bank.get("BIC").map(|c| c.as_str()), Some("COBADEFFXXX"));
    assert!(bank.get("INHABER").is_none());

    let csv = render_import(&result.rows).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.contains("\"PV_BANK.1.BIC\"") && header.contains("\"PV_BANK.1.IBAN\""), "header: {header}");
    assert!(!header.contains("PV_BANK.1.INHABER"));
}

#[test]
fn bank_run_rejects_account_without_bic() {
    let config = config("bank", "fox112_bank.csv", "bankverbindungen.csv");
    let result = load_and_run(&config, None);

    assert_eq!(result.summary.skipped_by_reason[&SkipReason::Validation], 1);
    let skip = result.summary.skipped.iter().find(|s| s.reason == SkipReason::Validation).unwrap();
    assert_eq!(skip.name, "Prinz, Klaus");
    assert!(result.rows.iter().all(|r| r.pers_nr != "Broe_003"));
}

// -------------------------------------------------------------------------
// Passive member import
// -------------------------------------------------------------------------

#[test]
fn passive_run_creates_and_excludes() {
    let config = config("passive", "fox112_passive.csv", "erreichbarkeiten.csv");
    let result = load_and_run(&config, Some(history()));

    let s = &result.summary;
    assert_eq!(s.filtered, 1);
    assert_eq!(s.created, 3);
    assert_eq!(s.skipped_by_reason[&SkipReason::Excluded], 1);
    assert_eq!(s.skipped_by_reason[&SkipReason::Validation], 1);

    // Excluded identities never produce a row
    assert!(result.rows.iter().all(|r| r.name != "Alt, Otto"));

    let numbers: Vec<&str> = result.rows.iter().map(|r| r.pers_nr.as_str()).collect();
    assert_eq!(numbers, vec!["Broe_F_008", "Broe_F_009", "Broe_F_010"]);

    let gast = &result.rows[0];
    let bank = gast.entries_of(Table::PvBank).next().unwrap();
    assert_eq!(bank.get("IBAN").map(|c| c.as_str()), Some("DE89370400440532013000"));
    let fee = gast.entries_of(Table::PvBeitrag).next().unwrap();
    assert_eq!(fee.get("BETRAG").map(|c| c.as_str()), Some("20.0"));
    assert_eq!(fee.get("ART").map(|c| c.as_str()), Some("1"));

    // No payment data: still a full fee block
    let kamerad = &result.rows[1];
    let fee = kamerad.entries_of(Table::PvBeitrag).next().unwrap();
    for m in 1..=12 {
        assert_eq!(fee.get(&format!("MONAT{m}")).map(|c| c.as_str()), Some("0.0"));
    }

    let csv = render_import(&result.rows).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("\"PV_DB.1.ORGANISATION\";\"PV_DB.1.NACHNAME\""));
    assert!(header.contains("\"PV_BEITRAG.1.MONAT12\""));
    assert!(csv.contains(";20.0;"));
}

#[test]
fn passive_run_skips_already_present() {
    let config = config("passive", "fox112_passive.csv", "erreichbarkeiten.csv");
    let result = load_and_run(&config, Some(ExclusionSet::new()));

    // Without the history, Alt matches the FeuerON record by name and address
    let skip = result
        .summary
        .skipped
        .iter()
        .find(|s| s.name == "Alt, Otto")
        .unwrap();
    assert_eq!(skip.reason, SkipReason::AlreadyPresent);
    assert!(skip.detail.contains("Broe_F_007"));
}
