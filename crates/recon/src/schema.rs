//! Report descriptors: where each logical field lives in each export.
//!
//! Report types are always chosen by configuration, never sniffed from content.

use crate::config::{MigrationConfig, Page1Shift, ReportKind};
use crate::model::{ContactKind, Field, Side};

#[derive(Debug, Clone)]
pub struct ReportDescriptor {
    pub name: &'static str,
    pub side: Side,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub enum Layout {
    Paginated(PaginatedLayout),
    Flat(FlatLayout),
}

/// FeuerON paginated CSV report (`;`-delimited, title banner, per-page footer).
#[derive(Debug, Clone)]
pub struct PaginatedLayout {
    /// Text the first non-empty row must contain.
    pub title: &'static str,
    /// Logical (page 2+) column count.
    pub width: usize,
    pub rows_per_record: usize,
    pub page1_shift: Page1Shift,
    pub cells: Vec<CellBinding>,
}

/// Field at (row within record, column) after page-1 correction.
#[derive(Debug, Clone, Copy)]
pub struct CellBinding {
    pub row: usize,
    pub col: usize,
    pub field: Field,
}

/// Spreadsheet-like export with one header row and one record per row.
#[derive(Debug, Clone)]
pub struct FlatLayout {
    /// 1-based row number of the header.
    pub header_row: usize,
    pub columns: Vec<ColumnBinding>,
    pub filter: Option<RowFilter>,
}

#[derive(Debug, Clone)]
pub struct ColumnBinding {
    pub header: &'static str,
    pub field: Field,
    pub required: bool,
}

/// Keep or drop rows by the value of one column.
#[derive(Debug, Clone)]
pub struct RowFilter {
    pub column: &'static str,
    /// If non-empty, only these values pass.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl RowFilter {
    pub fn admits(&self, value: &str) -> bool {
        let value = value.trim();
        if !self.include.is_empty() && !self.include.iter().any(|v| v == value) {
            return false;
        }
        !self.exclude.iter().any(|v| v == value)
    }
}

// ---------------------------------------------------------------------------
// Fox112 master export
// ---------------------------------------------------------------------------

const FOX112_CONTACTS: [(&str, ContactKind); 8] = [
    ("TEL_P", ContactKind::PhonePrivate),
    ("TEL_D", ContactKind::PhoneBusiness),
    ("MOBIL_P", ContactKind::MobilePrivate),
    ("MOBIL_D", ContactKind::MobileBusiness),
    ("EMAIL_P", ContactKind::EmailPrivate),
    ("EMAIL_D", ContactKind::EmailBusiness),
    ("FAX_P", ContactKind::FaxPrivate),
    ("FAX_D", ContactKind::FaxBusiness),
];

const FOX112_MONTHS: [&str; 12] = [
    "MONAT1", "MONAT2", "MONAT3", "MONAT4", "MONAT5", "MONAT6", "MONAT7", "MONAT8", "MONAT9",
    "MONAT10", "MONAT11", "MONAT12",
];

/// Department that never takes part in address, contact or bank runs.
pub const EXTERNAL_CONTACTS: &str = "Externe Kontakte";

pub fn source_descriptor(config: &MigrationConfig) -> ReportDescriptor {
    let kind = config.report;
    let needs_address = matches!(kind, ReportKind::Address | ReportKind::Contact | ReportKind::Passive);
    let needs_contacts = matches!(kind, ReportKind::Contact | ReportKind::Passive);
    let needs_bank = matches!(kind, ReportKind::Bank | ReportKind::Passive);
    let needs_membership = kind == ReportKind::Passive;

    let col = |header, field, required| ColumnBinding { header, field, required };
    let mut columns = vec![
        col("NACHNAME", Field::Surname, true),
        col("VORNAME", Field::GivenName, true),
        col("GESCHLECHT", Field::Gender, true),
        col("GEBURTSTAG", Field::BirthDate, true),
        col("ABTEILUNG", Field::Department, true),
        col("PERSONAL_NR", Field::PersonalNr, needs_membership),
        col("STRASSE", Field::Street, needs_address),
        col("HAUSNR", Field::HouseNo, needs_address),
        col("PLZ", Field::Postcode, needs_address),
        col("ORT", Field::City, needs_address),
        col("ORTSTEIL", Field::District, false),
    ];
    columns.extend(
        FOX112_CONTACTS
            .iter()
            .map(|&(header, kind)| col(header, Field::Contact(kind), needs_contacts)),
    );
    columns.extend([
        col("KONTOINHABER", Field::BankHolder, needs_bank),
        col("IBAN", Field::Iban, needs_bank),
        col("BIC", Field::Bic, needs_bank),
        col("MANDATSREFERENZ", Field::MandateRef, needs_bank),
        col("MANDAT_ERTEILT", Field::MandateDate, false),
        col("BANK", Field::BankName, false),
        col("EINTRITT", Field::EntryDate, needs_membership),
        col("MITGLIEDSBEITRAG", Field::Fee, needs_membership),
        col("ZAHLART", Field::PaymentMethod, needs_membership),
    ]);
    columns.extend(
        FOX112_MONTHS
            .iter()
            .zip(1u8..)
            .map(|(&header, m)| col(header, Field::Month(m), false)),
    );

    let filter = if kind == ReportKind::Passive {
        RowFilter {
            column: "ABTEILUNG",
            include: vec![config.passive.department.clone()],
            exclude: Vec::new(),
        }
    } else {
        RowFilter {
            column: "ABTEILUNG",
            include: Vec::new(),
            exclude: vec![EXTERNAL_CONTACTS.to_string()],
        }
    };

    ReportDescriptor {
        name: "Fox112",
        side: Side::Source,
        layout: Layout::Flat(FlatLayout { header_row: 1, columns, filter: Some(filter) }),
    }
}

// ---------------------------------------------------------------------------
// FeuerON reports
// ---------------------------------------------------------------------------

/// Page 1 of FeuerON paginated reports carries one extra blank cell after the name.
pub const FEUERON_PAGE1_SHIFT: Page1Shift = Page1Shift { at: 3, delta: 1 };

const ERREICHBARKEITEN_CONTACTS: [(&str, ContactKind); 8] = [
    ("Telefon privat", ContactKind::PhonePrivate),
    ("Telefon dienstlich", ContactKind::PhoneBusiness),
    ("Telefax privat", ContactKind::FaxPrivate),
    ("Telefax dienstlich", ContactKind::FaxBusiness),
    ("Mobil privat", ContactKind::MobilePrivate),
    ("Mobil dienstlich", ContactKind::MobileBusiness),
    ("E-Mail privat", ContactKind::EmailPrivate),
    ("E-Mail dienstlich", ContactKind::EmailBusiness),
];

pub fn target_descriptor(config: &MigrationConfig) -> ReportDescriptor {
    let shift = config.page1_shift.unwrap_or(FEUERON_PAGE1_SHIFT);
    match config.report {
        ReportKind::Address => adressenliste(shift),
        ReportKind::Bank => bankverbindungen(shift),
        ReportKind::Contact | ReportKind::Passive => erreichbarkeiten(),
    }
}

/// `[pos, '', name, pnr, '', address, '', '']`
fn adressenliste(page1_shift: Page1Shift) -> ReportDescriptor {
    let cell = |row, col, field| CellBinding { row, col, field };
    ReportDescriptor {
        name: "Adressenliste",
        side: Side::Target,
        layout: Layout::Paginated(PaginatedLayout {
            title: "Adressenliste",
            width: 8,
            rows_per_record: 1,
            page1_shift,
            cells: vec![
                cell(0, 2, Field::FullName),
                cell(0, 3, Field::PersonalNr),
                cell(0, 5, Field::AddressLine),
            ],
        }),
    }
}

/// Three rows per person: name/pnr/holder, bank/city/IBAN, mandate/date/BIC.
fn bankverbindungen(page1_shift: Page1Shift) -> ReportDescriptor {
    let cell = |row, col, field| CellBinding { row, col, field };
    ReportDescriptor {
        name: "Bankverbindungen",
        side: Side::Target,
        layout: Layout::Paginated(PaginatedLayout {
            title: "Bankverbindungen",
            width: 8,
            rows_per_record: 3,
            page1_shift,
            cells: vec![
                cell(0, 2, Field::FullName),
                cell(0, 3, Field::PersonalNr),
                cell(0, 6, Field::BankHolder),
                cell(1, 2, Field::BankName),
                cell(1, 6, Field::Iban),
                cell(2, 2, Field::MandateRef),
                cell(2, 3, Field::MandateDate),
                cell(2, 6, Field::Bic),
            ],
        }),
    }
}

fn erreichbarkeiten() -> ReportDescriptor {
    let col = |header, field| ColumnBinding { header, field, required: true };
    let mut columns = vec![
        col("Name", Field::Surname),
        col("Vorname", Field::GivenName),
        col("Personalnummer", Field::PersonalNr),
        col("Geburtsdatum", Field::BirthDate),
        col("Straße", Field::Street),
        col("Hausnr.", Field::HouseNo),
        col("PLZ", Field::Postcode),
        col("Ort", Field::City),
        col("Ortsteil", Field::District),
    ];
    columns.extend(
        ERREICHBARKEITEN_CONTACTS
            .iter()
            .map(|&(header, kind)| col(header, Field::Contact(kind))),
    );
    ReportDescriptor {
        name: "Erreichbarkeiten",
        side: Side::Target,
        layout: Layout::Flat(FlatLayout { header_row: 11, columns, filter: None }),
    }
}

// ---------------------------------------------------------------------------
// Compared fields
// ---------------------------------------------------------------------------

const ADDRESS_FIELDS: [Field; 4] = [Field::Street, Field::HouseNo, Field::Postcode, Field::City];

/// Fields whose differences produce update diffs, in change-log order.
pub fn compared_fields(kind: ReportKind) -> Vec<Field> {
    match kind {
        ReportKind::Address => {
            let mut fields = vec![Field::BirthDate];
            fields.extend(ADDRESS_FIELDS);
            fields
        }
        ReportKind::Contact | ReportKind::Passive => {
            let mut fields = vec![Field::BirthDate];
            fields.extend(ADDRESS_FIELDS);
            fields.extend(ContactKind::ALL.iter().map(|&k| Field::Contact(k)));
            fields
        }
        ReportKind::Bank => vec![Field::BankHolder, Field::Iban, Field::Bic, Field::MandateRef],
    }
}
