use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Which export a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Fox112 master export.
    Source,
    /// FeuerON report export.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Contact channel, in FeuerON `TEL_ART` terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    PhonePrivate,
    PhoneBusiness,
    MobilePrivate,
    MobileBusiness,
    EmailPrivate,
    EmailBusiness,
    FaxPrivate,
    FaxBusiness,
}

impl ContactKind {
    /// Emission order of `PV_TELEP` entries.
    pub const ALL: [ContactKind; 8] = [
        Self::PhonePrivate,
        Self::PhoneBusiness,
        Self::MobilePrivate,
        Self::MobileBusiness,
        Self::EmailPrivate,
        Self::EmailBusiness,
        Self::FaxPrivate,
        Self::FaxBusiness,
    ];

    pub fn tel_art(&self) -> &'static str {
        match self {
            Self::PhonePrivate => "Telefon privat",
            Self::PhoneBusiness => "Telefon dienstlich",
            Self::MobilePrivate => "Mobil privat",
            Self::MobileBusiness => "Mobil dienstlich",
            Self::EmailPrivate => "E-Mail privat",
            Self::EmailBusiness => "E-Mail dienstlich",
            Self::FaxPrivate => "Telefax privat",
            Self::FaxBusiness => "Telefax dienstlich",
        }
    }

    /// Phone, mobile and fax numbers go through the numbering-plan parser.
    pub fn is_phone(&self) -> bool {
        !matches!(self, Self::EmailPrivate | Self::EmailBusiness)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub street: String,
    pub house_no: String,
    pub postcode: String,
    pub city: String,
    pub district: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BankDetails {
    pub holder: String,
    pub iban: String,
    pub bic: String,
    pub mandate_ref: String,
    pub mandate_date: String,
    pub bank_name: String,
}

impl BankDetails {
    pub fn is_empty(&self) -> bool {
        self.holder.is_empty()
            && self.iban.is_empty()
            && self.bic.is_empty()
            && self.mandate_ref.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub department: String,
    pub entry_date: String,
    pub fee: String,
    pub payment_method: String,
    pub monthly: [String; 12],
}

/// Where a record was read from. `line` is 1-based; `page` only for paginated reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowOrigin {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// One person as read from either export, values trimmed but not yet normalized.
#[derive(Debug, Clone, Serialize)]
pub struct PersonRecord {
    pub side: Side,
    pub origin: RowOrigin,
    pub surname: String,
    pub given_name: String,
    pub birth_date: String,
    pub gender: String,
    pub personal_nr: String,
    pub address: Address,
    /// FeuerON `Adressenliste` one-line address, split by the normalizer.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address_line: String,
    pub contacts: BTreeMap<ContactKind, String>,
    pub bank: BankDetails,
    pub membership: Membership,
    /// Column header (or cell coordinate) → original cell text.
    pub raw: BTreeMap<String, String>,
}

impl PersonRecord {
    pub fn new(side: Side, origin: RowOrigin) -> Self {
        Self {
            side,
            origin,
            surname: String::new(),
            given_name: String::new(),
            birth_date: String::new(),
            gender: String::new(),
            personal_nr: String::new(),
            address: Address::default(),
            address_line: String::new(),
            contacts: BTreeMap::new(),
            bank: BankDetails::default(),
            membership: Membership::default(),
            raw: BTreeMap::new(),
        }
    }

    /// Store a trimmed cell value under its logical field.
    ///
    /// `FullName` is split on the first `", "` into surname and given name.
    pub fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        let slot = match field {
            Field::FullName => {
                match value.split_once(", ") {
                    Some((surname, given)) => {
                        self.surname = surname.trim().to_string();
                        self.given_name = given.trim().to_string();
                    }
                    None => {
                        self.surname = value.to_string();
                        self.given_name.clear();
                    }
                }
                return;
            }
            Field::Contact(kind) => {
                if !value.is_empty() {
                    self.contacts.insert(kind, value.to_string());
                }
                return;
            }
            Field::Surname => &mut self.surname,
            Field::GivenName => &mut self.given_name,
            Field::BirthDate => &mut self.birth_date,
            Field::Gender => &mut self.gender,
            Field::PersonalNr => &mut self.personal_nr,
            Field::Street => &mut self.address.street,
            Field::HouseNo => &mut self.address.house_no,
            Field::Postcode => &mut self.address.postcode,
            Field::City => &mut self.address.city,
            Field::District => &mut self.address.district,
            Field::AddressLine => &mut self.address_line,
            Field::BankHolder => &mut self.bank.holder,
            Field::Iban => &mut self.bank.iban,
            Field::Bic => &mut self.bank.bic,
            Field::MandateRef => &mut self.bank.mandate_ref,
            Field::MandateDate => &mut self.bank.mandate_date,
            Field::BankName => &mut self.bank.bank_name,
            Field::Department => &mut self.membership.department,
            Field::EntryDate => &mut self.membership.entry_date,
            Field::Fee => &mut self.membership.fee,
            Field::PaymentMethod => &mut self.membership.payment_method,
            Field::Month(m) => match self.membership.monthly.get_mut(usize::from(m.max(1)) - 1) {
                Some(slot) => slot,
                None => return,
            },
        };
        *slot = value.to_string();
    }

    /// Current value of a field. `FullName` is composed from surname and given name.
    pub fn get(&self, field: Field) -> String {
        let value: &str = match field {
            Field::FullName => return self.display_name(),
            Field::Contact(kind) => self.contacts.get(&kind).map(String::as_str).unwrap_or(""),
            Field::Surname => &self.surname,
            Field::GivenName => &self.given_name,
            Field::BirthDate => &self.birth_date,
            Field::Gender => &self.gender,
            Field::PersonalNr => &self.personal_nr,
            Field::Street => &self.address.street,
            Field::HouseNo => &self.address.house_no,
            Field::Postcode => &self.address.postcode,
            Field::City => &self.address.city,
            Field::District => &self.address.district,
            Field::AddressLine => &self.address_line,
            Field::BankHolder => &self.bank.holder,
            Field::Iban => &self.bank.iban,
            Field::Bic => &self.bank.bic,
            Field::MandateRef => &self.bank.mandate_ref,
            Field::MandateDate => &self.bank.mandate_date,
            Field::BankName => &self.bank.bank_name,
            Field::Department => &self.membership.department,
            Field::EntryDate => &self.membership.entry_date,
            Field::Fee => &self.membership.fee,
            Field::PaymentMethod => &self.membership.payment_method,
            Field::Month(m) => self
                .membership
                .monthly
                .get(usize::from(m.max(1)) - 1)
                .map(String::as_str)
                .unwrap_or(""),
        };
        value.to_string()
    }

    /// `"Nachname, Vorname"`, or just the surname when no given name is known.
    pub fn display_name(&self) -> String {
        if self.given_name.is_empty() {
            self.surname.clone()
        } else {
            format!("{}, {}", self.surname, self.given_name)
        }
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Logical person field, independent of either export's column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Surname,
    GivenName,
    FullName,
    BirthDate,
    Gender,
    PersonalNr,
    Street,
    HouseNo,
    Postcode,
    City,
    District,
    AddressLine,
    Contact(ContactKind),
    BankHolder,
    Iban,
    Bic,
    MandateRef,
    MandateDate,
    BankName,
    Department,
    EntryDate,
    Fee,
    PaymentMethod,
    /// Monthly fee amount, 1..=12.
    Month(u8),
}

impl Field {
    /// German label used in change logs and summaries.
    pub fn label(&self) -> String {
        let label = match self {
            Self::Surname => "Nachname",
            Self::GivenName => "Vorname",
            Self::FullName => "Name",
            Self::BirthDate => "Geburtsdatum",
            Self::Gender => "Geschlecht",
            Self::PersonalNr => "Personalnummer",
            Self::Street => "Straße",
            Self::HouseNo => "Hausnr.",
            Self::Postcode => "PLZ",
            Self::City => "Ort",
            Self::District => "Ortsteil",
            Self::AddressLine => "Adresse",
            Self::Contact(kind) => kind.tel_art(),
            Self::BankHolder => "Inhaber",
            Self::Iban => "IBAN",
            Self::Bic => "BIC",
            Self::MandateRef => "Mandatsreferenz",
            Self::MandateDate => "Mandat erteilt am",
            Self::BankName => "Bank",
            Self::Department => "Abteilung",
            Self::EntryDate => "Eintritt",
            Self::Fee => "Mitgliedsbeitrag",
            Self::PaymentMethod => "Zahlart",
            Self::Month(m) => return format!("Monat {m}"),
        };
        label.to_string()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Skips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Format,
    Validation,
    Excluded,
    Ambiguous,
    NoMatch,
    AlreadyPresent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format => write!(f, "format"),
            Self::Validation => write!(f, "validation"),
            Self::Excluded => write!(f, "excluded"),
            Self::Ambiguous => write!(f, "ambiguous"),
            Self::NoMatch => write!(f, "no_match"),
            Self::AlreadyPresent => write!(f, "already_present"),
        }
    }
}

/// A record that was read (or attempted) but produced no import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEntry {
    pub side: Side,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub personal_nr: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkipEntry {
    pub fn for_record(record: &PersonRecord, reason: SkipReason, detail: impl Into<String>) -> Self {
        Self {
            side: record.side,
            name: record.display_name(),
            personal_nr: record.personal_nr.clone(),
            line: record.origin.line,
            page: record.origin.page,
            reason,
            detail: detail.into(),
        }
    }

    /// Skip for a row that never became a record (e.g. wrong column count).
    pub fn at(side: Side, origin: RowOrigin, reason: SkipReason, detail: impl Into<String>) -> Self {
        Self {
            side,
            name: String::new(),
            personal_nr: String::new(),
            line: origin.line,
            page: origin.page,
            reason,
            detail: detail.into(),
        }
    }
}

/// A field that failed normalization; the record itself continued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedField {
    pub side: Side,
    pub name: String,
    pub line: usize,
    #[serde(flatten)]
    pub error: ValidationError,
}

// ---------------------------------------------------------------------------
// Import rows
// ---------------------------------------------------------------------------

/// Normalized source value differing from the target's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: Field,
    pub old: String,
    pub new: String,
}

/// FeuerON import tables, in header emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Table {
    #[serde(rename = "PV_DB")]
    PvDb,
    #[serde(rename = "PV_ABT")]
    PvAbt,
    #[serde(rename = "PV_TELEP")]
    PvTelep,
    #[serde(rename = "PV_BANK")]
    PvBank,
    #[serde(rename = "PV_BEITRAG")]
    PvBeitrag,
}

impl Table {
    pub const ALL: [Table; 5] = [Self::PvDb, Self::PvAbt, Self::PvTelep, Self::PvBank, Self::PvBeitrag];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PvDb => "PV_DB",
            Self::PvAbt => "PV_ABT",
            Self::PvTelep => "PV_TELEP",
            Self::PvBank => "PV_BANK",
            Self::PvBeitrag => "PV_BEITRAG",
        }
    }

    /// Columns this pipeline writes, in FeuerON declaration order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::PvDb => &[
                "ORGANISATION",
                "NACHNAME",
                "VORNAME",
                "PERS_NR",
                "GEBURT",
                "GESCHLECHT",
                "STRASSE",
                "HAUSNR",
                "PLZ",
                "ORT",
                "ORTSTEIL",
            ],
            Self::PvAbt => &["ABTEILUNG", "VON", "BUNDESLAND"],
            Self::PvTelep => &["TEL_ART", "TELEPHON"],
            Self::PvBank => &[
                "BANKVERB",
                "BIC",
                "INHABER",
                "IBAN",
                "MANDATSREFERENZ",
                "MANDATSREFERENZ_ERTEILT",
            ],
            Self::PvBeitrag => &[
                "BETRAG",
                "TYP",
                "ART",
                "ZAHLUNGSWEISE",
                "GULTIG_AB",
                "ERSTE_FAELLIGKEIT",
                "MONAT1",
                "MONAT2",
                "MONAT3",
                "MONAT4",
                "MONAT5",
                "MONAT6",
                "MONAT7",
                "MONAT8",
                "MONAT9",
                "MONAT10",
                "MONAT11",
                "MONAT12",
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A cell value; FeuerON rejects quoted numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(String),
}

impl CellValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Number(s) => s,
        }
    }
}

/// One `TABLE.N` entry of an import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    pub table: Table,
    pub cells: BTreeMap<&'static str, CellValue>,
}

impl TableEntry {
    pub fn new(table: Table) -> Self {
        Self { table, cells: BTreeMap::new() }
    }

    /// Set a text cell; empty values are not stored.
    pub fn text(mut self, column: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.cells.insert(column, CellValue::Text(value));
        }
        self
    }

    pub fn number(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.cells.insert(column, CellValue::Number(value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Update,
    Create,
}

/// One line of the FeuerON import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRow {
    pub kind: RowKind,
    /// Index into the source records; rows are emitted in this order.
    pub source_index: usize,
    pub name: String,
    pub pers_nr: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diffs: Vec<FieldDiff>,
    pub entries: Vec<TableEntry>,
}

impl ImportRow {
    /// Entries of one table, in `N` order.
    pub fn entries_of(&self, table: Table) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter().filter(move |e| e.table == table)
    }

    pub fn has_fee(&self) -> bool {
        self.entries_of(Table::PvBeitrag).next().is_some()
    }
}
