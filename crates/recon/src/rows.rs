//! Diff and import-row generation.
//!
//! Update rows carry the PV_DB identity block plus only the changed fields.
//! Create rows carry the whole person.

use tracing::info;

use crate::config::MigrationConfig;
use crate::model::{ContactKind, Field, FieldDiff, ImportRow, PersonRecord, RowKind, SkipEntry, SkipReason, Table, TableEntry};
use crate::normalize::{parse_amount_cents, NormalizedRecord};
use crate::schema::compared_fields;

/// Per-record result of the row generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Row(ImportRow),
    /// Matched, nothing to change.
    Unchanged,
    Skip(SkipEntry),
}

/// Compare normalized values field by field.
///
/// Only source values that are present and valid are considered, so an empty
/// or rejected source field never clears or overwrites target data.
pub fn diff_fields(fields: &[Field], source: &NormalizedRecord, target: &NormalizedRecord) -> Vec<FieldDiff> {
    fields
        .iter()
        .filter_map(|&field| {
            let new = source.value(field)?;
            let old = target.value(field).unwrap_or("");
            (new != old).then(|| FieldDiff { field, old: old.to_string(), new: new.to_string() })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Personnel numbers
// ---------------------------------------------------------------------------

/// Hands out `prefix + zero-padded number`, continuing after the highest one seen.
#[derive(Debug, Clone)]
pub struct PersNrAllocator {
    prefix: String,
    width: usize,
    /// `None` once the number range is used up.
    next: Option<u32>,
}

impl PersNrAllocator {
    pub fn new<'a>(prefix: &str, width: usize, existing: impl IntoIterator<Item = &'a str>) -> Self {
        let max = existing
            .into_iter()
            .filter_map(|nr| nr.trim().strip_prefix(prefix))
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|digits| digits.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Self { prefix: prefix.to_string(), width, next: max.checked_add(1) }
    }

    pub fn allocate(&mut self) -> Option<String> {
        let n = self.next?;
        self.next = n.checked_add(1);
        Some(format!("{}{:0width$}", self.prefix, n, width = self.width))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct RowBuilder<'a> {
    config: &'a MigrationConfig,
    compared: Vec<Field>,
    allocator: PersNrAllocator,
    complete_payload: bool,
}

impl<'a> RowBuilder<'a> {
    pub fn new(config: &'a MigrationConfig, allocator: PersNrAllocator) -> Self {
        Self {
            config,
            compared: compared_fields(config.report),
            allocator,
            complete_payload: config.complete_payload(),
        }
    }

    /// Sparse update for a matched pair, or `Unchanged` when nothing differs.
    pub fn update(
        &self,
        source: &PersonRecord,
        src: &NormalizedRecord,
        target: &PersonRecord,
        tgt: &NormalizedRecord,
    ) -> RowOutcome {
        let diffs = diff_fields(&self.compared, src, tgt);
        if diffs.is_empty() {
            return RowOutcome::Unchanged;
        }

        let pers_nr = target.personal_nr.trim();
        if pers_nr.is_empty() {
            return RowOutcome::Skip(SkipEntry::for_record(
                source,
                SkipReason::Validation,
                format!("matched FeuerON record at line {} has no personnel number", target.origin.line),
            ));
        }

        let mut db = match self.identity_block(source, src, pers_nr) {
            Ok(db) => db,
            Err(skip) => return RowOutcome::Skip(skip),
        };
        let mut contacts = Vec::new();
        let mut bank_changed = false;
        for diff in &diffs {
            match diff.field {
                Field::Street => db = db.text("STRASSE", diff.new.as_str()),
                Field::HouseNo => db = db.text("HAUSNR", diff.new.as_str()),
                Field::Postcode => db = db.text("PLZ", diff.new.as_str()),
                Field::City => db = db.text("ORT", diff.new.as_str()),
                Field::Contact(kind) => contacts.push(contact_entry(kind, &diff.new)),
                Field::BankHolder | Field::Iban | Field::Bic | Field::MandateRef => bank_changed = true,
                // GEBURT is part of the identity block already
                _ => {}
            }
        }

        let mut entries = vec![db];
        entries.extend(contacts);
        if bank_changed {
            // The whole block must validate even though only changed columns are sent
            if let Err(skip) = bank_entry(source, src) {
                return RowOutcome::Skip(skip);
            }
            let changed = |field: Field| diffs.iter().any(|d| d.field == field);
            let mut entry = TableEntry::new(Table::PvBank)
                .text("BIC", src.value(Field::Bic).unwrap_or(""))
                .text("IBAN", src.value(Field::Iban).unwrap_or(""));
            if changed(Field::BankHolder) {
                entry = entry.text("INHABER", src.value(Field::BankHolder).unwrap_or(""));
            }
            if changed(Field::MandateRef) {
                entry = entry.text("MANDATSREFERENZ", src.value(Field::MandateRef).unwrap_or(""));
            }
            entries.push(entry);
        }

        let name = source.display_name();
        info!("Updating {name} ({pers_nr}):");
        for diff in &diffs {
            let old = if diff.old.is_empty() { "(empty)" } else { diff.old.as_str() };
            info!("  {}: {} → {}", diff.field, old, diff.new);
        }

        RowOutcome::Row(ImportRow {
            kind: RowKind::Update,
            source_index: src.index,
            name,
            pers_nr: pers_nr.to_string(),
            diffs,
            entries,
        })
    }

    /// Full create row for an unmatched source record.
    pub fn create(&mut self, source: &PersonRecord, src: &NormalizedRecord) -> RowOutcome {
        let entry_date = match required(source, src, &[Field::EntryDate]) {
            Ok(mut values) => values.remove(0),
            Err(skip) => return RowOutcome::Skip(skip),
        };
        let provisional_nr = source.personal_nr.trim();
        let mut db = match self.identity_block(source, src, provisional_nr) {
            Ok(db) => db,
            Err(skip) => return RowOutcome::Skip(skip),
        };

        let bank = if source.bank.is_empty() {
            None
        } else {
            match bank_entry(source, src) {
                Ok(bank) => Some(bank),
                Err(skip) => return RowOutcome::Skip(skip),
            }
        };

        let pers_nr = if provisional_nr.is_empty() {
            let Some(nr) = self.allocator.allocate() else {
                let detail = format!("no personal number left for prefix {}", self.config.passive.personal_nr_prefix);
                return RowOutcome::Skip(SkipEntry::for_record(source, SkipReason::Validation, detail));
            };
            db = db.text("PERS_NR", nr.as_str());
            nr
        } else {
            provisional_nr.to_string()
        };

        for (field, column) in [
            (Field::Street, "STRASSE"),
            (Field::HouseNo, "HAUSNR"),
            (Field::Postcode, "PLZ"),
            (Field::City, "ORT"),
            (Field::District, "ORTSTEIL"),
        ] {
            db = db.text(column, src.value(field).unwrap_or(""));
        }

        let passive = &self.config.passive;
        let department = src.value(Field::Department).unwrap_or(passive.department.as_str());
        let membership = TableEntry::new(Table::PvAbt)
            .text("ABTEILUNG", department)
            .text("VON", entry_date.as_str())
            .text("BUNDESLAND", passive.state.as_str());

        let mut entries = vec![db, membership];
        for kind in ContactKind::ALL {
            let field = Field::Contact(kind);
            // unparseable numbers are passed through as written
            let value = match src.value(field) {
                Some(v) => v.to_string(),
                None => source.get(field).trim().to_string(),
            };
            if !value.is_empty() {
                entries.push(contact_entry(kind, &value));
            }
        }
        entries.extend(bank);
        entries.extend(self.fee_entry(src, &entry_date));

        let name = source.display_name();
        info!(
            "Importing {name} ({pers_nr}, geb. {}, Eintritt {entry_date})",
            src.value(Field::BirthDate).unwrap_or("")
        );

        RowOutcome::Row(ImportRow {
            kind: RowKind::Create,
            source_index: src.index,
            name,
            pers_nr,
            diffs: Vec::new(),
            entries,
        })
    }

    /// `ORGANISATION, NACHNAME, VORNAME, PERS_NR, GEBURT, GESCHLECHT`; FeuerON keys imports on it.
    fn identity_block(&self, source: &PersonRecord, src: &NormalizedRecord, pers_nr: &str) -> Result<TableEntry, SkipEntry> {
        let values = required(source, src, &[Field::BirthDate, Field::Gender])?;
        Ok(TableEntry::new(Table::PvDb)
            .text("ORGANISATION", self.config.organisation.trim())
            .text("NACHNAME", src.value(Field::Surname).unwrap_or(source.surname.as_str()))
            .text("VORNAME", src.value(Field::GivenName).unwrap_or(source.given_name.as_str()))
            .text("PERS_NR", pers_nr)
            .text("GEBURT", values[0].as_str())
            .text("GESCHLECHT", values[1].as_str()))
    }

    fn fee_entry(&self, src: &NormalizedRecord, entry_date: &str) -> Option<TableEntry> {
        let fee = src.value(Field::Fee);
        let cents = fee.and_then(|f| parse_amount_cents(Field::Fee, f).ok()).unwrap_or(0);
        let method = src.value(Field::PaymentMethod);

        if !self.complete_payload && (cents == 0 || method.is_none()) {
            return None;
        }

        let mut entry = TableEntry::new(Table::PvBeitrag)
            .number("BETRAG", fee.unwrap_or("0.0"))
            .text("TYP", self.config.passive.fee_type.as_str())
            .number("ART", method.unwrap_or(FEE_ART_INVOICE))
            .number("ZAHLUNGSWEISE", FEE_FREQUENCY_YEARLY)
            .text("GULTIG_AB", entry_date)
            .text("ERSTE_FAELLIGKEIT", entry_date);
        for (m, &column) in (1..=12).zip(&Table::PvBeitrag.columns()[6..]) {
            match src.value(Field::Month(m)) {
                Some(amount) => entry = entry.number(column, amount),
                None if self.complete_payload => entry = entry.number(column, "0.0"),
                None => {}
            }
        }
        Some(entry)
    }
}

/// `PV_BEITRAG.ART` 0 = Rechnung.
const FEE_ART_INVOICE: &str = "0";
/// `PV_BEITRAG.ZAHLUNGSWEISE` 1 = jährlich.
const FEE_FREQUENCY_YEARLY: &str = "1";

fn contact_entry(kind: ContactKind, value: &str) -> TableEntry {
    TableEntry::new(Table::PvTelep).text("TEL_ART", kind.tel_art()).text("TELEPHON", value)
}

/// Normalized values of the given fields, or a validation skip naming every missing one.
fn required(source: &PersonRecord, src: &NormalizedRecord, fields: &[Field]) -> Result<Vec<String>, SkipEntry> {
    let mut values = Vec::with_capacity(fields.len());
    let mut problems = Vec::new();
    for &field in fields {
        match src.value(field) {
            Some(v) => values.push(v.to_string()),
            None => match src.rejected.iter().find(|e| e.field == field) {
                Some(err) => problems.push(err.to_string()),
                None => problems.push(format!("{field}: missing")),
            },
        }
    }
    if problems.is_empty() {
        Ok(values)
    } else {
        Err(SkipEntry::for_record(source, SkipReason::Validation, problems.join("; ")))
    }
}

/// Full PV_BANK block; IBAN and BIC must both be valid, a mandate reference if given too.
fn bank_entry(source: &PersonRecord, src: &NormalizedRecord) -> Result<TableEntry, SkipEntry> {
    let mut fields = vec![Field::Iban, Field::Bic];
    if !source.bank.mandate_ref.is_empty() {
        fields.push(Field::MandateRef);
    }
    let values = required(source, src, &fields)?;
    Ok(TableEntry::new(Table::PvBank)
        .text("BANKVERB", src.value(Field::BankName).unwrap_or(""))
        .text("BIC", values[1].as_str())
        .text("INHABER", src.value(Field::BankHolder).unwrap_or(""))
        .text("IBAN", values[0].as_str())
        .text("MANDATSREFERENZ", src.value(Field::MandateRef).unwrap_or(""))
        .text("MANDATSREFERENZ_ERTEILT", src.value(Field::MandateDate).unwrap_or("")))
}
