//! Phonebook table: dialed number → entry.
//!
//! CSV schema, expected headers:
//! number,name,kind,value,parameter
//!
//! Example:
//! number,name,kind,value,parameter
//! 110,Zeitansage,function,ANNOUNCE_TIME,
//! 42,Antwort,speech,Zweiundvierzig,
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use exchange_traits::{EntryKind, PhonebookEntry, PhonebookLookup};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PhonebookRow {
    number: String,
    name: String,
    kind: String,
    value: String,
    #[serde(default)]
    parameter: String,
}

#[derive(Debug, Clone, Default)]
pub struct Phonebook {
    entries: BTreeMap<String, PhonebookEntry>,
}

fn parse_kind(s: &str) -> Option<EntryKind> {
    match s.trim().to_ascii_lowercase().as_str() {
        "speech" | "tts" => Some(EntryKind::Speech),
        "audio" => Some(EntryKind::Audio),
        "function" => Some(EntryKind::Function),
        _ => None,
    }
}

fn function(name: &str, value: &str, parameter: &str) -> PhonebookEntry {
    PhonebookEntry {
        name: name.to_string(),
        kind: EntryKind::Function,
        value: value.to_string(),
        parameter: parameter.to_string(),
    }
}

impl Phonebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory phonebook: five personas, persona mix, time, voice menu,
    /// alarm system codes and reboot.
    pub fn defaults() -> Self {
        let mut pb = Self::new();
        for n in 1..=5u8 {
            let number = n.to_string();
            pb.entries.insert(
                number.clone(),
                function(&format!("Persona {n}"), "COMPLIMENT_CAT", &number),
            );
        }
        pb.entries
            .insert("11".into(), function("Persona mix", "COMPLIMENT_MIX", ""));
        pb.entries
            .insert("110".into(), function("Zeitansage", "ANNOUNCE_TIME", ""));
        pb.entries
            .insert("0".into(), function("Sprachmenue", "VOICE_MENU", ""));
        pb.entries
            .insert("90".into(), function("Wecker an/aus", "TOGGLE_ALARMS", ""));
        pb.entries
            .insert("91".into(), function("Naechsten Wecker aussetzen", "SKIP_NEXT_ALARM", ""));
        pb.entries.insert("999".into(), function("Neustart", "REBOOT", ""));
        pb
    }

    /// Insert or replace an entry. The number must be non-empty and digits only.
    pub fn insert(&mut self, number: &str, entry: PhonebookEntry) -> eyre::Result<()> {
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            eyre::bail!("phonebook number must be digits only, got {number:?}");
        }
        self.entries.insert(number.to_string(), entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PhonebookLookup for Phonebook {
    fn find(&self, number: &str) -> Option<PhonebookEntry> {
        self.entries.get(number).cloned()
    }

    fn numbers(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Parse a phonebook from any CSV reader. Duplicate numbers are rejected.
pub fn parse_phonebook_csv<R: Read>(reader: R) -> eyre::Result<Phonebook> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read phonebook CSV headers: {e}"))?
        .clone();
    let expected = ["number", "name", "kind", "value", "parameter"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "phonebook CSV must have headers 'number,name,kind,value,parameter', got: {}",
            actual.join(",")
        );
    }

    let mut pb = Phonebook::new();
    for (idx, rec) in rdr.deserialize::<PhonebookRow>().enumerate() {
        let line = idx + 2;
        let row = rec.map_err(|e| eyre::eyre!("invalid phonebook row {line}: {e}"))?;
        let Some(kind) = parse_kind(&row.kind) else {
            eyre::bail!("invalid phonebook row {line}: unknown kind {:?}", row.kind);
        };
        if row.value.is_empty() {
            eyre::bail!("invalid phonebook row {line}: value must not be empty");
        }
        if pb.entries.contains_key(&row.number) {
            eyre::bail!("invalid phonebook row {line}: duplicate number {}", row.number);
        }
        pb.insert(
            &row.number,
            PhonebookEntry {
                name: row.name,
                kind,
                value: row.value,
                parameter: row.parameter,
            },
        )
        .map_err(|e| eyre::eyre!("invalid phonebook row {line}: {e}"))?;
    }
    Ok(pb)
}

pub fn load_phonebook_csv(path: &Path) -> eyre::Result<Phonebook> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open phonebook CSV {:?}: {}", path, e))?;
    let pb = parse_phonebook_csv(file)?;
    tracing::info!(path = %path.display(), entries = pb.len(), "phonebook loaded");
    Ok(pb)
}
