// End-to-end tests driving the `feuermig` binary.
// Run with: cargo test -p feuermig-cli --test cli -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn feuermig() -> Command {
    Command::new(env!("CARGO_BIN_EXE_feuermig"))
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../recon/tests/fixtures").join(name)
}

const HISTORY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Fox112>
  <Personen>
    <Person>
      <Nachname>#Alt</Nachname>
      <Vorname>Otto</Vorname>
      <Geburtsdatum>05.05.1950</Geburtsdatum>
      <Dienstgrade><Eintrag/><Eintrag/></Dienstgrade>
      <Funktionen><Eintrag/></Funktionen>
    </Person>
    <Person>
      <Nachname>Gast</Nachname>
      <Vorname>Gerd</Vorname>
      <Dienstgrade/>
    </Person>
  </Personen>
</Fox112>
"#;

/// Temp dir holding the fixture exports, the history XML and one config.
fn workspace(config: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    for name in ["fox112_contact.csv", "fox112_passive.csv", "erreichbarkeiten.csv", "adressenliste.csv"] {
        std::fs::copy(fixture(name), dir.path().join(name)).unwrap();
    }
    std::fs::write(dir.path().join("fox112.xml"), HISTORY).unwrap();
    let config_path = dir.path().join("run.toml");
    std::fs::write(&config_path, config).unwrap();
    (dir, config_path)
}

fn run(args: &[&str]) -> Output {
    feuermig().args(args).output().expect("run feuermig")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const CONTACT: &str = r#"
name = "Kontakte"
report = "contact"

[files]
source = "fox112_contact.csv"
target = "erreichbarkeiten.csv"
output = "kontakt_import.csv"
"#;

const PASSIVE: &str = r#"
name = "Fördernde Mitglieder"
report = "passive"

[files]
source = "fox112_passive.csv"
target = "erreichbarkeiten.csv"
exclusions = "fox112.xml"
output = "passive_import.csv"
"#;

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn contact_run_writes_import_file() {
    let (dir, config) = workspace(CONTACT);
    let output = run(&["run", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let csv = std::fs::read_to_string(dir.path().join("kontakt_import.csv")).unwrap();
    assert_eq!(
        csv,
        "\"PV_DB.1.ORGANISATION\";\"PV_DB.1.NACHNAME\";\"PV_DB.1.VORNAME\";\"PV_DB.1.PERS_NR\";\
         \"PV_DB.1.GEBURT\";\"PV_DB.1.GESCHLECHT\";\"PV_TELEP.1.TEL_ART\";\"PV_TELEP.1.TELEPHON\"\r\n\
         \"Bröckel, OF\";\"Muster\";\"Hans\";\"Broe_001\";\"01.01.1970\";\"M\";\"Mobil privat\";\"0171 1234567\"\r\n"
    );

    let err = stderr(&output);
    assert!(err.contains("rows: 1 updated, 0 created, 1 unchanged"), "stderr: {err}");
    assert!(err.contains("[no_match]"), "stderr: {err}");
}

#[test]
fn output_flag_overrides_config() {
    let (dir, config) = workspace(CONTACT);
    let target = dir.path().join("elsewhere.csv");
    let output = run(&["run", config.to_str().unwrap(), "--output", target.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(target.is_file());
    assert!(!dir.path().join("kontakt_import.csv").exists());
}

#[test]
fn strict_run_fails_on_skips() {
    let (dir, config) = workspace(CONTACT);
    let output = run(&["run", config.to_str().unwrap(), "--strict"]);
    assert_eq!(output.status.code(), Some(63));
    // The import file is still written
    assert!(dir.path().join("kontakt_import.csv").is_file());
}

#[test]
fn json_goes_to_stdout_and_summary_file() {
    let (dir, config) = workspace(PASSIVE);
    let summary = dir.path().join("summary.json");
    let output = run(&["run", config.to_str().unwrap(), "--json", "--summary", summary.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON on stdout");
    let file: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).expect("valid JSON summary");
    assert_eq!(stdout["summary"], file["summary"]);

    assert_eq!(stdout["meta"]["report"], "passive");
    assert_eq!(stdout["meta"]["mode"], "create_only");
    assert_eq!(stdout["summary"]["created"], 3);
    assert_eq!(stdout["summary"]["skipped_by_reason"]["excluded"], 1);
    let numbers: Vec<&str> = stdout["rows"].as_array().unwrap().iter().map(|r| r["pers_nr"].as_str().unwrap()).collect();
    assert_eq!(numbers, vec!["Broe_F_008", "Broe_F_009", "Broe_F_010"]);
}

#[test]
fn passive_run_excludes_history() {
    let (dir, config) = workspace(PASSIVE);
    let output = run(&["run", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let csv = std::fs::read_to_string(dir.path().join("passive_import.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(!csv.contains("\"Alt\""));
    assert!(stderr(&output).contains("2 ranks, 1 function in Fox112 history"));
}

#[test]
fn identical_runs_write_identical_bytes() {
    let (dir, config) = workspace(PASSIVE);
    let first = dir.path().join("a.csv");
    let second = dir.path().join("b.csv");
    for path in [&first, &second] {
        let output = run(&["run", config.to_str().unwrap(), "--output", path.to_str().unwrap()]);
        assert!(output.status.success());
    }
    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn missing_input_is_an_input_error() {
    let (_dir, config) = workspace(&CONTACT.replace("fox112_contact.csv", "missing.csv"));
    let output = run(&["run", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(61));
    assert!(stderr(&output).contains("missing.csv"));
}

#[test]
fn unwritable_output_is_an_output_error() {
    let (dir, config) = workspace(CONTACT);
    let target = dir.path().join("no/such/dir/import.csv");
    let output = run(&["run", config.to_str().unwrap(), "--output", target.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(62));
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_complete_config() {
    let (_dir, config) = workspace(PASSIVE);
    let output = run(&["validate", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("valid: passive migration"));
}

#[test]
fn validate_rejects_passive_without_history() {
    let (_dir, config) = workspace(&PASSIVE.replace("exclusions = \"fox112.xml\"\n", ""));
    let output = run(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(60));
    assert!(stderr(&output).contains("files.exclusions"));
}

#[test]
fn validate_reports_missing_files() {
    let (_dir, config) = workspace(&PASSIVE.replace("fox112.xml", "gone.xml"));
    let output = run(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(61));
    assert!(stderr(&output).contains("gone.xml"));
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

#[test]
fn inspect_paginated_target() {
    let path = fixture("adressenliste.csv");
    let output = run(&["inspect", path.to_str().unwrap(), "--report", "address", "--side", "target"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"], "Adressenliste");
    assert_eq!(json["records"].as_array().unwrap().len(), 3);
    assert!(json["skipped"].as_array().unwrap().is_empty());
}

#[test]
fn inspect_history_export() {
    let (dir, _config) = workspace(PASSIVE);
    let output = run(&["inspect", dir.path().join("fox112.xml").to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["surname"], "Alt");
    assert_eq!(json[0]["ranks"], 2);
    assert_eq!(json[1]["functions"], 0);
}

#[test]
fn inspect_rejects_unknown_report() {
    let path = fixture("adressenliste.csv");
    let output = run(&["inspect", path.to_str().unwrap(), "--report", "payroll"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("possible values: address, contact, bank, passive"), "stderr: {}", stderr(&output));
}
