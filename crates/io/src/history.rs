//! Fox112 XML export: per-person rank and function history.
//!
//! Only what the exclusion filter needs is read: name, birth date and the
//! number of `<Eintrag>` entries under `<Dienstgrade>` and `<Funktionen>`.

use std::path::Path;
use std::sync::OnceLock;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::Serialize;

use crate::error::IoError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryPerson {
    pub surname: String,
    pub given_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    pub ranks: usize,
    pub functions: usize,
}

impl HistoryPerson {
    /// True for anyone who ever held a rank or function.
    pub fn has_history(&self) -> bool {
        self.ranks + self.functions > 0
    }
}

/// Fox112 marks some surnames with `#` or `#N`.
fn name_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\d*\s*").ok()).as_ref()
}

pub fn clean_surname(raw: &str) -> String {
    let raw = raw.trim();
    match name_prefix() {
        Some(re) => re.replace(raw, "").trim().to_string(),
        None => raw.to_string(),
    }
}

pub fn read_history(path: &Path) -> Result<Vec<HistoryPerson>, IoError> {
    let text = crate::text::read_file_as_utf8(path)?;
    parse_history(&text).map_err(|message| IoError::xml(path, message))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Slot {
    Surname,
    GivenName,
    BirthDate,
}

/// Parse every `<Person>` element, at any depth.
pub fn parse_history(xml: &str) -> Result<Vec<HistoryPerson>, String> {
    // No text trimming: spaces next to entity references belong to the value.
    // Values are trimmed when their <Person> closes.
    let mut reader = Reader::from_str(xml);

    let mut persons = Vec::new();
    // Element names from the current <Person> down; empty outside a person
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<HistoryPerson> = None;
    let mut slot: Option<Slot> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.error_position()))?;
        match event {
            Event::Start(ref e) => {
                let name = e.name().as_ref().to_vec();
                if name == b"Person" && current.is_none() {
                    current = Some(HistoryPerson::default());
                    path.clear();
                } else if current.is_some() {
                    count_entry(&mut current, &path, &name);
                    slot = match (path.len(), name.as_slice()) {
                        (0, b"Nachname") => Some(Slot::Surname),
                        (0, b"Vorname") => Some(Slot::GivenName),
                        (0, b"Geburtsdatum") => Some(Slot::BirthDate),
                        _ => None,
                    };
                }
                if current.is_some() && name != b"Person" {
                    path.push(name);
                }
            }
            Event::Empty(ref e) => {
                if current.is_some() {
                    count_entry(&mut current, &path, e.name().as_ref());
                }
            }
            Event::Text(ref e) => {
                if let (Some(person), Some(s)) = (current.as_mut(), slot) {
                    let text = e.decode().map_err(|e| e.to_string())?;
                    slot_text(person, s).push_str(&text);
                }
            }
            Event::GeneralRef(ref e) => {
                if let (Some(person), Some(s)) = (current.as_mut(), slot) {
                    let text = resolve_reference(e)?;
                    slot_text(person, s).push_str(&text);
                }
            }
            Event::End(ref e) => {
                slot = None;
                if e.name().as_ref() == b"Person" && path.is_empty() {
                    if let Some(mut person) = current.take() {
                        person.surname = clean_surname(&person.surname);
                        person.given_name = person.given_name.trim().to_string();
                        person.birth_date = person
                            .birth_date
                            .map(|d| d.trim().to_string())
                            .filter(|d| !d.is_empty());
                        persons.push(person);
                    }
                } else {
                    path.pop();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err("unterminated <Person> element".into());
    }
    Ok(persons)
}

fn slot_text(person: &mut HistoryPerson, slot: Slot) -> &mut String {
    match slot {
        Slot::Surname => &mut person.surname,
        Slot::GivenName => &mut person.given_name,
        Slot::BirthDate => person.birth_date.get_or_insert_with(String::new),
    }
}

/// `&#252;`, `&#xFC;` or one of the five predefined XML entities.
fn resolve_reference(e: &BytesRef<'_>) -> Result<String, String> {
    if let Some(ch) = e.resolve_char_ref().map_err(|err| err.to_string())? {
        return Ok(ch.to_string());
    }
    let name = e.decode().map_err(|err| err.to_string())?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| format!("unknown entity &{name};"))
}

/// `<Eintrag>` directly under `<Dienstgrade>` or `<Funktionen>` of the person.
fn count_entry(current: &mut Option<HistoryPerson>, path: &[Vec<u8>], name: &[u8]) {
    let Some(person) = current.as_mut() else { return };
    if name != b"Eintrag" || path.len() != 1 {
        return;
    }
    match path[0].as_slice() {
        b"Dienstgrade" => person.ranks += 1,
        b"Funktionen" => person.functions += 1,
        _ => {}
    }
}
