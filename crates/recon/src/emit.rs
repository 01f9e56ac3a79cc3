//! FeuerON import CSV.
//!
//! `;`-delimited, CRLF, header `TABLE.N.COLUMN`. Text cells and the header are
//! double-quoted, numeric cells are written bare because the importer rejects
//! quoted numbers. Missing cells are an empty quoted string.

use std::io::Write;

use crate::error::MigrateError;
use crate::model::{CellValue, ImportRow, Table};

/// One output column: `(table, N, column)`, N 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportColumn {
    pub table: Table,
    pub n: usize,
    pub column: &'static str,
}

impl ImportColumn {
    pub fn header(&self) -> String {
        format!("{}.{}.{}", self.table.name(), self.n, self.column)
    }
}

/// Header columns for a row set.
///
/// Tables in declaration order; per table `N` runs to the highest entry count
/// of any row; within each `N`, the table's columns in declaration order,
/// restricted to those any row populates for any `N` of that table.
pub fn import_columns(rows: &[&ImportRow]) -> Vec<ImportColumn> {
    let mut columns = Vec::new();
    for table in Table::ALL {
        let max_n = rows.iter().map(|r| r.entries_of(table).count()).max().unwrap_or(0);
        if max_n == 0 {
            continue;
        }
        let populated: Vec<&'static str> = table
            .columns()
            .iter()
            .copied()
            .filter(|&col| {
                rows.iter().any(|r| r.entries_of(table).any(|e| e.get(col).is_some()))
            })
            .collect();
        for n in 1..=max_n {
            columns.extend(populated.iter().map(|&column| ImportColumn { table, n, column }));
        }
    }
    columns
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn render_cell(row: &ImportRow, col: &ImportColumn) -> String {
    match row.entries_of(col.table).nth(col.n - 1).and_then(|e| e.get(col.column)) {
        Some(CellValue::Number(n)) => n.clone(),
        Some(CellValue::Text(t)) => quote(t),
        None => quote(""),
    }
}

/// Write rows in the order given. An empty row set writes nothing at all.
pub fn write_import<'a, W: Write>(
    rows: impl IntoIterator<Item = &'a ImportRow>,
    writer: W,
) -> Result<(), MigrateError> {
    let rows: Vec<&ImportRow> = rows.into_iter().collect();
    if rows.is_empty() {
        return Ok(());
    }
    let columns = import_columns(&rows);

    // Quoting is done per cell above; the writer must not add its own
    let mut csv = csv::WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    let header: Vec<String> = columns.iter().map(|c| quote(&c.header())).collect();
    csv.write_record(&header)
        .map_err(|e| MigrateError::Io(format!("CSV write error: {e}")))?;

    for row in &rows {
        let record: Vec<String> = columns.iter().map(|c| render_cell(row, c)).collect();
        csv.write_record(&record)
            .map_err(|e| MigrateError::Io(format!("CSV write error: {e}")))?;
    }

    csv.flush().map_err(|e| MigrateError::Io(format!("CSV flush error: {e}")))?;
    Ok(())
}

/// Render to a string.
pub fn render_import<'a>(rows: impl IntoIterator<Item = &'a ImportRow>) -> Result<String, MigrateError> {
    let mut buf = Vec::new();
    write_import(rows, &mut buf)?;
    String::from_utf8(buf).map_err(|e| MigrateError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RowKind, TableEntry};

    fn row(index: usize, entries: Vec<TableEntry>) -> ImportRow {
        ImportRow {
            kind: RowKind::Create,
            source_index: index,
            name: format!("row {index}"),
            pers_nr: String::new(),
            diffs: Vec::new(),
            entries,
        }
    }

    fn person(surname: &str, street: &str) -> TableEntry {
        TableEntry::new(Table::PvDb).text("NACHNAME", surname).text("STRASSE", street)
    }

    #[test]
    fn empty_row_set_writes_nothing() {
        assert_eq!(render_import(Vec::<&ImportRow>::new()).unwrap(), "");
    }

    #[test]
    fn header_uses_max_entry_count_and_populated_columns() {
        let a = row(
            0,
            vec![
                person("Muster", ""),
                TableEntry::new(Table::PvTelep).text("TEL_ART", "Mobil privat").text("TELEPHON", "0171 1234567"),
                TableEntry::new(Table::PvTelep).text("TEL_ART", "E-Mail privat").text("TELEPHON", "a@b.de"),
            ],
        );
        let b = row(1, vec![person("Beispiel", "Am Markt")]);
        let headers: Vec<String> = import_columns(&[&a, &b]).iter().map(ImportColumn::header).collect();
        assert_eq!(
            headers,
            vec![
                "PV_DB.1.NACHNAME",
                "PV_DB.1.STRASSE",
                "PV_TELEP.1.TEL_ART",
                "PV_TELEP.1.TELEPHON",
                "PV_TELEP.2.TEL_ART",
                "PV_TELEP.2.TELEPHON",
            ]
        );
    }

    #[test]
    fn exact_bytes() {
        let a = row(
            0,
            vec![
                TableEntry::new(Table::PvDb).text("NACHNAME", "Muster \"Hansi\"").text("PLZ", "31234"),
                TableEntry::new(Table::PvBeitrag).number("BETRAG", "20.0").text("TYP", "Mitgliedsbeitrag"),
            ],
        );
        let b = row(1, vec![TableEntry::new(Table::PvDb).text("NACHNAME", "Beispiel")]);
        let out = render_import([&a, &b]).unwrap();
        assert_eq!(
            out,
            "\"PV_DB.1.NACHNAME\";\"PV_DB.1.PLZ\";\"PV_BEITRAG.1.BETRAG\";\"PV_BEITRAG.1.TYP\"\r\n\
             \"Muster \"\"Hansi\"\"\";\"31234\";20.0;\"Mitgliedsbeitrag\"\r\n\
             \"Beispiel\";\"\";\"\";\"\"\r\n"
        );
    }

    #[test]
    fn output_is_deterministic() {
        let rows: Vec<ImportRow> = (0..5)
            .map(|i| {
                row(
                    i,
                    vec![
                        person(&format!("P{i}"), "Weg"),
                        TableEntry::new(Table::PvAbt).text("ABTEILUNG", "Fördernde Mitglieder"),
                    ],
                )
            })
            .collect();
        assert_eq!(render_import(&rows).unwrap(), render_import(&rows).unwrap());
    }
}
