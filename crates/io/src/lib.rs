// File decoding for the migration inputs

pub mod error;
pub mod history;
pub mod sheet;
pub mod text;

use std::path::Path;

pub use error::IoError;
pub use history::{read_history, HistoryPerson};

/// A tabular export as read from disk, before any report layout is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTable {
    /// Delimited text, already decoded to UTF-8.
    Text { content: String, delimiter: u8 },
    /// First worksheet of a spreadsheet, one entry per sheet row.
    Rows(Vec<Vec<String>>),
}

/// Spreadsheet extensions handled by calamine.
const SHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SHEET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load an export by extension: spreadsheets via calamine, anything else as
/// delimited text with a sniffed delimiter.
pub fn load_table(path: &Path) -> Result<RawTable, IoError> {
    if is_spreadsheet(path) {
        return sheet::read_first_sheet(path).map(RawTable::Rows);
    }
    let content = text::read_file_as_utf8(path)?;
    let delimiter = text::sniff_delimiter(&content);
    Ok(RawTable::Text { content, delimiter })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_selects_reader() {
        assert!(is_spreadsheet(Path::new("fox112.XLSX")));
        assert!(is_spreadsheet(Path::new("a/b/export.ods")));
        assert!(!is_spreadsheet(Path::new("erreichbarkeiten.csv")));
        assert!(!is_spreadsheet(Path::new("noext")));
    }

    #[test]
    fn text_export_is_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adressenliste.csv");
        std::fs::write(&path, "Pos.;Name;Adresse\n1;Muster, Hans;Lindenstr. 3\n").unwrap();

        match load_table(&path).unwrap() {
            RawTable::Text { content, delimiter } => {
                assert_eq!(delimiter, b';');
                assert!(content.starts_with("Pos."));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn missing_spreadsheet_is_a_sheet_error() {
        let err = load_table(Path::new("/nonexistent/fox112.xlsx")).unwrap_err();
        assert!(err.to_string().contains("fox112.xlsx"));
    }
}
