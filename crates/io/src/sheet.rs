// Excel exports (Fox112 master data, FeuerON Erreichbarkeiten)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};

use crate::error::IoError;

/// Read the first worksheet as text cells.
///
/// Row `i` of the result is spreadsheet row `i + 1`, column `j` is column `j + 1`,
/// even when the used range does not begin at A1.
pub fn read_first_sheet(path: &Path) -> Result<Vec<Vec<String>>, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::sheet(path, e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IoError::sheet(path, "workbook contains no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| IoError::sheet(path, format!("sheet '{sheet_name}': {e}")))?;

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row.iter().map(cell_text));
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        rows.push(cells);
    }
    Ok(rows)
}

/// Cell value as the exports show it on screen.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => format_serial_date(dt.as_f64()),
        Data::DateTimeIso(s) => format_iso_date(s),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Integers without decimals: postcodes and house numbers stored as numbers.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Excel 1900-system serial → `dd.mm.yyyy`, with `HH:MM` when there is a time part.
pub fn format_serial_date(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return format_number(serial);
    };
    let days = serial.floor();
    let Some(date) = epoch.checked_add_signed(Duration::days(days as i64)) else {
        return format_number(serial);
    };
    let minutes = ((serial - days) * 24.0 * 60.0).round() as i64;
    if minutes == 0 {
        date.format("%d.%m.%Y").to_string()
    } else {
        format!("{} {:02}:{:02}", date.format("%d.%m.%Y"), minutes / 60, minutes % 60)
    }
}

fn format_iso_date(s: &str) -> String {
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook};

    #[test]
    fn serial_dates() {
        assert_eq!(format_serial_date(25569.0), "01.01.1970");
        assert_eq!(format_serial_date(45352.5), "01.03.2024 12:00");
    }

    #[test]
    fn numbers_without_decimals() {
        assert_eq!(cell_text(&Data::Float(31234.0)), "31234");
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_text(&Data::String(" Muster ".into())), "Muster");
        assert_eq!(cell_text(&Data::DateTimeIso("1985-02-01T00:00:00".into())), "01.02.1985");
    }

    #[test]
    fn first_sheet_keeps_row_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fox112.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let date = Format::new().set_num_format("dd.mm.yyyy");
        sheet.write_string(1, 1, "NACHNAME").unwrap();
        sheet.write_string(1, 2, "GEBURTSTAG").unwrap();
        sheet.write_string(1, 3, "PLZ").unwrap();
        sheet.write_string(2, 1, "Muster").unwrap();
        sheet.write_number_with_format(2, 2, 25569.0, &date).unwrap();
        sheet.write_number(2, 3, 31234.0).unwrap();
        workbook.save(&path).unwrap();

        let rows = read_first_sheet(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_empty());
        assert_eq!(rows[1], vec!["", "NACHNAME", "GEBURTSTAG", "PLZ"]);
        assert_eq!(rows[2], vec!["", "Muster", "01.01.1970", "31234"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_first_sheet(Path::new("/nonexistent/fox112.xlsx")).unwrap_err();
        assert!(matches!(err, IoError::Sheet { .. }));
    }
}
