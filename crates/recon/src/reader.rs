//! Export reader: cell grids → person records.
//!
//! Decoding files into grids happens upstream (`feuermig-io`); this module only
//! knows report layouts. Row-level problems become skip entries, structural
//! problems abort the run.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::Page1Shift;
use crate::error::MigrateError;
use crate::model::{PersonRecord, RowOrigin, Side, SkipEntry, SkipReason};
use crate::schema::{ColumnBinding, FlatLayout, Layout, PaginatedLayout, ReportDescriptor, RowFilter};

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    /// 1-based line (text) or row (spreadsheet) number.
    pub line: usize,
    pub cells: Vec<String>,
}

impl GridRow {
    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    fn first(&self) -> &str {
        self.cells.first().map(|c| c.trim()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub rows: Vec<GridRow>,
}

impl Grid {
    /// Rows numbered from 1 in the order given (spreadsheets, where blank rows are kept).
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(i, cells)| GridRow { line: i + 1, cells })
                .collect(),
        }
    }
}

/// Split delimited text into a grid, keeping each row's source line number.
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<Grid, MigrateError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| MigrateError::format("delimited text", e.to_string()))?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(rows.len() + 1);
        rows.push(GridRow { line, cells: record.iter().map(str::to_string).collect() });
    }
    Ok(Grid { rows })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Banner information from page 1 of a paginated report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportMeta {
    pub title: String,
    pub lines: Vec<String>,
    pub pages: u32,
}

#[derive(Debug, Clone)]
pub enum ReadItem {
    Record(PersonRecord),
    Skip(SkipEntry),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadOutput {
    pub report: String,
    pub records: Vec<PersonRecord>,
    pub skipped: Vec<SkipEntry>,
    /// Rows dropped by the descriptor's row filter (not an error).
    pub filtered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ReportMeta>,
}

/// Read every record of a grid according to its descriptor.
pub fn read_records(grid: &Grid, descriptor: &ReportDescriptor) -> Result<ReadOutput, MigrateError> {
    let mut out = ReadOutput { report: descriptor.name.to_string(), ..ReadOutput::default() };

    match &descriptor.layout {
        Layout::Paginated(layout) => {
            let mut records = PaginatedRecords::new(grid, layout, descriptor.side, descriptor.name);
            for item in records.by_ref() {
                out.push(item?);
            }
            out.meta = Some(records.into_meta());
        }
        Layout::Flat(layout) => {
            let mut records = FlatRecords::new(grid, layout, descriptor.side, descriptor.name)?;
            for item in records.by_ref() {
                out.push(item);
            }
            out.filtered = records.filtered();
        }
    }

    tracing::debug!(
        report = descriptor.name,
        records = out.records.len(),
        skipped = out.skipped.len(),
        filtered = out.filtered,
        "read export"
    );
    Ok(out)
}

impl ReadOutput {
    fn push(&mut self, item: ReadItem) {
        match item {
            ReadItem::Record(r) => self.records.push(r),
            ReadItem::Skip(s) => self.skipped.push(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Paginated: page state machine
// ---------------------------------------------------------------------------

const FOOTER_MARKER: &str = "Gesamtsumme";
const PAGE_END_MARKER: &str = "Bearbeiter";
const COLUMN_HEADER_MARKER: &str = "Pos.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    /// Before the title banner of page 1.
    Start,
    /// Title, metadata and column header rows.
    Header,
    Data,
    /// Between `Gesamtsumme` and `Bearbeiter`.
    Footer,
}

/// A data-zone row classified by page.
#[derive(Debug, Clone, Copy)]
pub struct PageRow<'a> {
    pub line: usize,
    pub page: u32,
    pub cells: &'a [String],
    /// True for rows whose first cell is a position number.
    pub starts_record: bool,
}

/// Walks a paginated report and yields only data-zone rows.
pub struct PageRows<'a> {
    rows: std::slice::Iter<'a, GridRow>,
    title: &'a str,
    report: &'a str,
    state: PageState,
    page: u32,
    meta: ReportMeta,
    done: bool,
}

impl<'a> PageRows<'a> {
    pub fn new(grid: &'a Grid, title: &'a str, report: &'a str) -> Self {
        Self {
            rows: grid.rows.iter(),
            title,
            report,
            state: PageState::Start,
            page: 1,
            meta: ReportMeta::default(),
            done: false,
        }
    }

    pub fn into_meta(self) -> ReportMeta {
        self.meta
    }

    fn error(&self, line: Option<usize>, message: impl Into<String>) -> MigrateError {
        let context = match line {
            Some(line) => format!("{} line {line}", self.report),
            None => self.report.to_string(),
        };
        MigrateError::format(context, message)
    }

    fn finish(&mut self) -> Option<Result<PageRow<'a>, MigrateError>> {
        self.done = true;
        match self.state {
            PageState::Start => Some(Err(self.error(
                None,
                format!("missing report title '{}'", self.title),
            ))),
            PageState::Data => Some(Err(self.error(
                None,
                format!("data on page {} is not closed by a '{FOOTER_MARKER}' footer", self.page),
            ))),
            PageState::Footer => {
                self.meta.pages = self.page;
                None
            }
            PageState::Header => {
                self.meta.pages = self.page.saturating_sub(1).max(1);
                None
            }
        }
    }
}

fn is_position(cell: &str) -> bool {
    !cell.is_empty() && cell.chars().all(|c| c.is_ascii_digit())
}

fn joined(row: &GridRow) -> String {
    row.cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl<'a> Iterator for PageRows<'a> {
    type Item = Result<PageRow<'a>, MigrateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(row) = self.rows.next() else {
                return self.finish();
            };
            if row.is_blank() {
                continue;
            }
            let first = row.first();

            if self.state == PageState::Start {
                if !row.cells.iter().any(|c| c.contains(self.title)) {
                    self.done = true;
                    return Some(Err(self.error(
                        Some(row.line),
                        format!("expected report title '{}' in the first row", self.title),
                    )));
                }
                self.meta.title = joined(row);
                self.state = PageState::Header;
                continue;
            }

            if first.starts_with(FOOTER_MARKER) {
                self.state = PageState::Footer;
                continue;
            }

            if first.starts_with(PAGE_END_MARKER) {
                if self.state != PageState::Footer {
                    self.done = true;
                    return Some(Err(self.error(
                        Some(row.line),
                        format!("'{PAGE_END_MARKER}' row without a preceding '{FOOTER_MARKER}' footer"),
                    )));
                }
                self.page += 1;
                self.state = PageState::Header;
                continue;
            }

            match self.state {
                PageState::Footer => continue,
                _ if is_position(first) => {
                    self.state = PageState::Data;
                    return Some(Ok(PageRow { line: row.line, page: self.page, cells: &row.cells, starts_record: true }));
                }
                PageState::Header => {
                    if self.page == 1 && first != COLUMN_HEADER_MARKER {
                        self.meta.lines.push(joined(row));
                    }
                    continue;
                }
                _ => {
                    return Some(Ok(PageRow { line: row.line, page: self.page, cells: &row.cells, starts_record: false }));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Paginated: alignment
// ---------------------------------------------------------------------------

/// Bring a row to the page-2+ column layout.
pub fn align_row(cells: &[String], page: u32, shift: Page1Shift) -> Result<Vec<String>, String> {
    let mut cells = cells.to_vec();
    if page != 1 || shift.delta == 0 || shift.at > cells.len() {
        return Ok(cells);
    }
    let count = usize::from(shift.delta.unsigned_abs());
    if shift.delta > 0 {
        let end = (shift.at + count).min(cells.len());
        if let Some(extra) = cells[shift.at..end].iter().find(|c| !c.trim().is_empty()) {
            return Err(format!("page-1 column {} expected empty, found '{}'", shift.at + 1, extra.trim()));
        }
        cells.drain(shift.at..end);
    } else {
        cells.splice(shift.at..shift.at, std::iter::repeat(String::new()).take(count));
    }
    Ok(cells)
}

/// Enforce the schema width; trailing blank cells beyond it are tolerated.
pub fn fit_width(mut cells: Vec<String>, width: usize) -> Result<Vec<String>, String> {
    if cells.len() < width {
        return Err(format!("expected {width} columns, found {}", cells.len()));
    }
    if cells[width..].iter().any(|c| !c.trim().is_empty()) {
        return Err(format!("expected {width} columns, found {} non-empty", cells.len()));
    }
    cells.truncate(width);
    Ok(cells)
}

// ---------------------------------------------------------------------------
// Paginated: records
// ---------------------------------------------------------------------------

/// Groups position rows with their continuation rows into records.
pub struct PaginatedRecords<'a> {
    rows: PageRows<'a>,
    layout: &'a PaginatedLayout,
    side: Side,
    pending: Option<PageRow<'a>>,
    deferred: Option<MigrateError>,
}

impl<'a> PaginatedRecords<'a> {
    pub fn new(grid: &'a Grid, layout: &'a PaginatedLayout, side: Side, report: &'a str) -> Self {
        Self {
            rows: PageRows::new(grid, layout.title, report),
            layout,
            side,
            pending: None,
            deferred: None,
        }
    }

    pub fn into_meta(self) -> ReportMeta {
        self.rows.into_meta()
    }

    fn build(&self, group: &[PageRow<'a>]) -> ReadItem {
        let head = &group[0];
        let origin = RowOrigin { line: head.line, page: Some(head.page) };
        let skip = |detail: String| ReadItem::Skip(SkipEntry::at(self.side, origin, SkipReason::Format, detail));

        if group.len() != self.layout.rows_per_record {
            return skip(format!(
                "record spans {} rows, expected {}",
                group.len(),
                self.layout.rows_per_record
            ));
        }

        let mut aligned = Vec::with_capacity(group.len());
        for row in group {
            let cells = align_row(row.cells, row.page, self.layout.page1_shift)
                .and_then(|cells| fit_width(cells, self.layout.width));
            match cells {
                Ok(cells) => aligned.push(cells),
                Err(msg) => return skip(format!("line {}: {msg}", row.line)),
            }
        }

        let mut record = PersonRecord::new(self.side, origin);
        for binding in &self.layout.cells {
            let value = aligned
                .get(binding.row)
                .and_then(|cells| cells.get(binding.col))
                .map(String::as_str)
                .unwrap_or("");
            record.set(binding.field, value);
            if !value.trim().is_empty() {
                record.raw.insert(binding.field.label(), value.trim().to_string());
            }
        }
        ReadItem::Record(record)
    }
}

impl<'a> Iterator for PaginatedRecords<'a> {
    type Item = Result<ReadItem, MigrateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.deferred.take() {
            return Some(Err(err));
        }
        let head = match self.pending.take() {
            Some(row) => row,
            None => match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            },
        };

        let mut group = vec![head];
        loop {
            match self.rows.next() {
                Some(Ok(row)) if !row.starts_record => group.push(row),
                Some(Ok(row)) => {
                    self.pending = Some(row);
                    break;
                }
                Some(Err(e)) => {
                    self.deferred = Some(e);
                    break;
                }
                None => break,
            }
        }
        Some(Ok(self.build(&group)))
    }
}

// ---------------------------------------------------------------------------
// Flat
// ---------------------------------------------------------------------------

/// One record per row below a header row; columns resolved by header text.
pub struct FlatRecords<'a> {
    rows: std::slice::Iter<'a, GridRow>,
    bindings: Vec<(usize, &'a ColumnBinding)>,
    filter: Option<(usize, &'a RowFilter)>,
    header_len: usize,
    side: Side,
    filtered: usize,
}

impl<'a> FlatRecords<'a> {
    pub fn new(grid: &'a Grid, layout: &'a FlatLayout, side: Side, report: &str) -> Result<Self, MigrateError> {
        let header_pos = grid
            .rows
            .iter()
            .position(|r| r.line == layout.header_row)
            .ok_or_else(|| MigrateError::format(report, format!("header row {} not found", layout.header_row)))?;
        let header = &grid.rows[header_pos];

        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, h) in header.cells.iter().enumerate() {
            index.entry(h.trim()).or_insert(i);
        }

        let mut missing = Vec::new();
        let mut bindings = Vec::new();
        for binding in &layout.columns {
            match index.get(binding.header) {
                Some(&i) => bindings.push((i, binding)),
                None if binding.required => missing.push(binding.header.to_string()),
                None => {}
            }
        }
        let filter = match &layout.filter {
            Some(f) => match index.get(f.column) {
                Some(&i) => Some((i, f)),
                None => {
                    if !missing.iter().any(|m| m == f.column) {
                        missing.push(f.column.to_string());
                    }
                    None
                }
            },
            None => None,
        };
        if !missing.is_empty() {
            missing.sort();
            return Err(MigrateError::MissingColumns { report: report.to_string(), columns: missing });
        }

        let header_len = header
            .cells
            .iter()
            .rposition(|c| !c.trim().is_empty())
            .map(|i| i + 1)
            .unwrap_or(0);

        Ok(Self {
            rows: grid.rows[header_pos + 1..].iter(),
            bindings,
            filter,
            header_len,
            side,
            filtered: 0,
        })
    }

    pub fn filtered(&self) -> usize {
        self.filtered
    }
}

impl<'a> Iterator for FlatRecords<'a> {
    type Item = ReadItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = self.rows.next()?;
            if row.is_blank() {
                continue;
            }
            let origin = RowOrigin { line: row.line, page: None };

            if row.cells.len() > self.header_len && row.cells[self.header_len..].iter().any(|c| !c.trim().is_empty()) {
                return Some(ReadItem::Skip(SkipEntry::at(
                    self.side,
                    origin,
                    SkipReason::Format,
                    format!("row has values beyond the {} header columns", self.header_len),
                )));
            }

            let cell = |i: usize| row.cells.get(i).map(|c| c.trim()).unwrap_or("");

            let mut record = PersonRecord::new(self.side, origin);
            for &(i, binding) in &self.bindings {
                let value = cell(i);
                record.set(binding.field, value);
                if !value.is_empty() {
                    record.raw.insert(binding.header.to_string(), value.to_string());
                }
            }

            // Spacer rows in FeuerON sheets carry no name
            if record.surname.is_empty() {
                continue;
            }

            if let Some((i, filter)) = self.filter {
                if !filter.admits(cell(i)) {
                    self.filtered += 1;
                    continue;
                }
            }

            return Some(ReadItem::Record(record));
        }
    }
}
