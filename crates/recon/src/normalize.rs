use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ValidationError;
use crate::model::{Address, ContactKind, Field, PersonRecord, Side};

// ---------------------------------------------------------------------------
// Normalized record
// ---------------------------------------------------------------------------

/// Identity used by the matcher and the exclusion filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdentityKey {
    /// Lower-case, whitespace-collapsed `"surname, given name"`.
    pub name: String,
    pub birth: Option<NaiveDate>,
}

/// A record's values in target-schema encoding.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    /// Index of the record in its side's input order.
    pub index: usize,
    pub key: IdentityKey,
    /// Empty when the record has no street.
    pub street_key: String,
    /// Only non-empty, successfully normalized values (target side: raw fallback).
    pub values: BTreeMap<Field, String>,
    pub rejected: Vec<ValidationError>,
}

impl NormalizedRecord {
    pub fn value(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn is_rejected(&self, field: Field) -> bool {
        self.rejected.iter().any(|e| e.field == field)
    }
}

/// Fields carried from a record into its normalized form, in evaluation order.
fn carried_fields() -> Vec<Field> {
    let mut fields = vec![
        Field::Surname,
        Field::GivenName,
        Field::BirthDate,
        Field::Gender,
        Field::PersonalNr,
        Field::Street,
        Field::HouseNo,
        Field::Postcode,
        Field::City,
        Field::District,
    ];
    fields.extend(ContactKind::ALL.iter().map(|&k| Field::Contact(k)));
    fields.extend([
        Field::BankHolder,
        Field::Iban,
        Field::Bic,
        Field::MandateRef,
        Field::MandateDate,
        Field::BankName,
        Field::Department,
        Field::EntryDate,
        Field::Fee,
        Field::PaymentMethod,
    ]);
    fields.extend((1..=12).map(Field::Month));
    fields
}

/// Normalize every field of a record.
///
/// Source-side failures are recorded in `rejected` and the value is dropped,
/// so it can never overwrite target data. Target-side failures keep the
/// whitespace-collapsed raw value so the comparison still sees what FeuerON holds.
pub fn normalize_record(index: usize, record: &PersonRecord) -> NormalizedRecord {
    let mut values = BTreeMap::new();
    let mut rejected = Vec::new();

    let mut address = record.address.clone();
    if address == Address::default() && !record.address_line.is_empty() {
        address = split_address_line(&record.address_line);
    }

    for field in carried_fields() {
        let raw = match field {
            Field::Street => address.street.clone(),
            Field::HouseNo => address.house_no.clone(),
            Field::Postcode => address.postcode.clone(),
            Field::City => address.city.clone(),
            Field::District => address.district.clone(),
            other => record.get(other),
        };
        if raw.trim().is_empty() {
            continue;
        }
        match normalize_field(field, &raw) {
            Ok(value) if value.is_empty() => {}
            Ok(value) => {
                values.insert(field, value);
            }
            Err(err) => match record.side {
                Side::Source => rejected.push(err),
                Side::Target => {
                    values.insert(field, collapse_whitespace(&raw));
                }
            },
        }
    }

    let birth = values.get(&Field::BirthDate).and_then(|v| parse_date(v));
    let street_key = match values.get(&Field::Street) {
        Some(street) => street_key(street, values.get(&Field::HouseNo).map(String::as_str).unwrap_or("")),
        None => String::new(),
    };

    NormalizedRecord {
        index,
        key: IdentityKey { name: name_key(&record.surname, &record.given_name), birth },
        street_key,
        values,
        rejected,
    }
}

/// Normalize one raw value by its field's semantic type.
pub fn normalize_field(field: Field, raw: &str) -> Result<String, ValidationError> {
    match field {
        Field::BirthDate | Field::EntryDate | Field::MandateDate => normalize_date(field, raw),
        Field::Gender => normalize_gender(raw),
        Field::Postcode => normalize_postcode(raw),
        Field::Contact(kind) if kind.is_phone() => normalize_phone(field, raw),
        Field::Contact(_) => normalize_email(field, raw),
        Field::Iban => normalize_iban(raw),
        Field::Bic => normalize_bic(raw),
        Field::MandateRef => normalize_mandate_ref(raw),
        Field::Fee | Field::Month(_) => parse_amount_cents(field, raw).map(render_amount),
        Field::PaymentMethod => normalize_payment_method(raw),
        Field::PersonalNr => Ok(raw.trim().to_string()),
        _ => Ok(collapse_whitespace(raw)),
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn name_key(surname: &str, given_name: &str) -> String {
    let surname = collapse_whitespace(surname).to_lowercase();
    let given = collapse_whitespace(given_name).to_lowercase();
    if given.is_empty() {
        surname
    } else {
        format!("{surname}, {given}")
    }
}

/// Street-matching key: `"Hauptstraße 5a"` and `"Hauptstr. 5 a"` both become `"hauptstr5a"`.
pub fn street_key(street: &str, house_no: &str) -> String {
    let mut street = collapse_whitespace(street).to_lowercase().replace('ß', "ss");
    for suffix in ["strasse", "str."] {
        if let Some(stem) = street.strip_suffix(suffix) {
            street = format!("{stem}str");
            break;
        }
    }
    street
        .chars()
        .chain(house_no.to_lowercase().chars())
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Split a FeuerON one-line address `"Street 12a, 31234 City"`.
pub fn split_address_line(line: &str) -> Address {
    let line = collapse_whitespace(line);
    let (street_part, place_part) = match line.rsplit_once(',') {
        Some((street, place)) => (street.trim(), place.trim()),
        None => (line.as_str(), ""),
    };

    let mut address = Address::default();
    match street_part.rsplit_once(' ') {
        Some((street, no)) if no.starts_with(|c: char| c.is_ascii_digit()) => {
            address.street = street.to_string();
            address.house_no = no.to_string();
        }
        _ => address.street = street_part.to_string(),
    }
    match place_part.split_once(' ') {
        Some((postcode, city)) if postcode.chars().all(|c| c.is_ascii_digit()) => {
            address.postcode = postcode.to_string();
            address.city = city.to_string();
        }
        _ if !place_part.is_empty() && place_part.chars().all(|c| c.is_ascii_digit()) => {
            address.postcode = place_part.to_string();
        }
        _ => address.city = place_part.to_string(),
    }
    address
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// German national format: `"0171/1234567"` → `"0171 1234567"`.
pub fn normalize_phone(field: Field, raw: &str) -> Result<String, ValidationError> {
    let number = phonenumber::parse(Some(phonenumber::country::Id::DE), raw.trim())
        .map_err(|e| ValidationError::new(field, raw.trim(), format!("is not a phone number ({e})")))?;
    Ok(number.format().mode(phonenumber::Mode::National).to_string())
}

pub fn normalize_email(field: Field, raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ValidationError::new(field, raw.trim(), "is not an e-mail address"))
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

pub fn normalize_postcode(raw: &str) -> Result<String, ValidationError> {
    let postcode = raw.trim();
    if postcode.len() == 5 && postcode.chars().all(|c| c.is_ascii_digit()) {
        Ok(postcode.to_string())
    } else {
        Err(ValidationError::new(Field::Postcode, postcode, "must be 5 digits"))
    }
}

// ---------------------------------------------------------------------------
// Bank
// ---------------------------------------------------------------------------

/// ISO 13616: country code, check digits, mod-97 remainder of 1.
pub fn normalize_iban(raw: &str) -> Result<String, ValidationError> {
    let iban: String = raw.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
    let fail = |constraint: &str| ValidationError::new(Field::Iban, iban.clone(), constraint);

    if !(15..=34).contains(&iban.len()) {
        return Err(fail("must be 15-34 characters"));
    }
    let bytes = iban.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_uppercase) || !bytes[2..4].iter().all(u8::is_ascii_digit) {
        return Err(fail("must start with a country code and two check digits"));
    }
    if !bytes.iter().all(u8::is_ascii_alphanumeric) {
        return Err(fail("must be alphanumeric"));
    }

    let rearranged = bytes[4..].iter().chain(&bytes[..4]);
    let mut remainder: u32 = 0;
    for &b in rearranged {
        let value = if b.is_ascii_digit() { u32::from(b - b'0') } else { u32::from(b - b'A') + 10 };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    if remainder != 1 {
        return Err(fail("has an invalid checksum"));
    }
    Ok(iban)
}

/// `AAAA CC LL (BBB)`: bank code, country, location, optional branch.
pub fn normalize_bic(raw: &str) -> Result<String, ValidationError> {
    let bic: String = raw.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
    let bytes = bic.as_bytes();
    let shaped = (bytes.len() == 8 || bytes.len() == 11)
        && bytes[..6].iter().all(u8::is_ascii_uppercase)
        && bytes[6..].iter().all(u8::is_ascii_alphanumeric);
    if shaped {
        Ok(bic)
    } else {
        Err(ValidationError::new(Field::Bic, bic, "must be 8 or 11 characters shaped AAAACCLL(BBB)"))
    }
}

const MANDATE_REF_MAX: usize = 35;

/// SEPA mandate references: ASCII letters, digits and `-`, at most 35 characters.
pub fn normalize_mandate_ref(raw: &str) -> Result<String, ValidationError> {
    let reference = raw.trim();
    if reference.is_empty() || reference.len() > MANDATE_REF_MAX {
        return Err(ValidationError::new(
            Field::MandateRef,
            reference,
            format!("must be 1-{MANDATE_REF_MAX} characters"),
        ));
    }
    if let Some(bad) = reference.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
        return Err(ValidationError::new(
            Field::MandateRef,
            reference,
            format!("contains '{bad}' (only letters, digits and '-' allowed)"),
        ));
    }
    Ok(reference.to_string())
}

// ---------------------------------------------------------------------------
// Dates, gender, money
// ---------------------------------------------------------------------------

/// Accepts `dd.mm.yyyy`, `d.m.yyyy` and ISO `yyyy-mm-dd` (with or without a time part).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d.%m.%Y") {
        return Some(date);
    }
    let iso = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok()
}

pub fn normalize_date(field: Field, raw: &str) -> Result<String, ValidationError> {
    parse_date(raw)
        .map(|d| d.format("%d.%m.%Y").to_string())
        .ok_or_else(|| ValidationError::new(field, raw.trim(), "is not a date (dd.mm.yyyy)"))
}

/// Fox112 `M/W/J` → FeuerON `M/F/J`.
pub fn normalize_gender(raw: &str) -> Result<String, ValidationError> {
    match raw.trim().to_uppercase().as_str() {
        "M" => Ok("M".into()),
        "W" | "F" => Ok("F".into()),
        "J" => Ok("J".into()),
        _ => Err(ValidationError::new(Field::Gender, raw.trim(), "must be M, W or J")),
    }
}

/// Fox112 `ZAHLART` → FeuerON `PV_BEITRAG.ART`.
pub fn normalize_payment_method(raw: &str) -> Result<String, ValidationError> {
    let code = match raw.trim() {
        "Einzug" | "1" => "1",
        "Barzahler" | "2" => "2",
        "Selbstzahler" | "3" => "3",
        "Rechnung" | "0" => "0",
        _ => {
            return Err(ValidationError::new(
                Field::PaymentMethod,
                raw.trim(),
                "must be Einzug, Barzahler or Selbstzahler",
            ))
        }
    };
    Ok(code.into())
}

/// `"20,00 €"`, `"20.00"`, `"1.234,5"` → cents. Empty is zero.
pub fn parse_amount_cents(field: Field, raw: &str) -> Result<i64, ValidationError> {
    let fail = || ValidationError::new(field, raw.trim(), "is not an amount");
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .collect::<String>()
        .replace("EUR", "");
    if cleaned.is_empty() {
        return Ok(0);
    }

    // German notation when a comma is present: dots group thousands
    let decimal = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    let (whole, frac) = decimal.split_once('.').unwrap_or((decimal.as_str(), ""));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits(whole) || !digits(frac) || frac.len() > 2 {
        return Err(fail());
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| fail())? };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| fail())? * 10,
        _ => frac.parse().map_err(|_| fail())?,
    };
    whole.checked_mul(100).and_then(|c| c.checked_add(frac)).ok_or_else(fail)
}

/// Cents → decimal with at least one fractional digit: `2000` → `"20.0"`, `1250` → `"12.5"`.
pub fn render_amount(cents: i64) -> String {
    let whole = cents / 100;
    let frac = cents % 100;
    if frac % 10 == 0 {
        format!("{whole}.{}", frac / 10)
    } else {
        format!("{whole}.{frac:02}")
    }
}
