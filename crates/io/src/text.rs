// Delimited text exports

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::IoError;

const UTF8_BOM: &str = "\u{feff}";

/// Read file and convert to UTF-8 if needed.
///
/// FeuerON writes UTF-8 with a BOM; older exports and anything that passed
/// through Excel are Windows-1252.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::read(path, e))?;
    Ok(decode_bytes(bytes))
}

pub fn decode_bytes(bytes: Vec<u8>) -> String {
    // Try UTF-8 first; on failure, recover the buffer from the error
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };
    match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

const DELIMITERS: [u8; 4] = [b';', b'\t', b',', b'|'];
const SAMPLE_LINES: usize = 20;

/// Guess the field delimiter of a text export; `;` when nothing splits.
///
/// Report exports open with a title line and repeat page headers; rows are
/// scored by shared width, the first line carries no extra weight.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(SAMPLE_LINES).collect();
    let sample = sample.join("\n");

    let mut best = (DELIMITERS[0], 0);
    for delimiter in DELIMITERS {
        let score = shared_width_score(&sample, delimiter);
        if score > best.1 {
            best = (delimiter, score);
        }
    }
    best.0
}

/// Largest `width * rows` over the row widths above one field.
fn shared_width_score(sample: &str, delimiter: u8) -> usize {
    let mut widths: BTreeMap<usize, usize> = BTreeMap::new();
    let rows = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes())
        .into_records()
        .filter_map(Result::ok);
    for row in rows.filter(|row| row.len() > 1) {
        *widths.entry(row.len()).or_default() += 1;
    }
    widths.into_iter().map(|(width, rows)| width * rows).max().unwrap_or(0)
}
