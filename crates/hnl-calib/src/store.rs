//! Calibration store: resolves `(category, era, working point)` to a table.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use hnl_core::{Era, Error, Result};
use serde::{Deserialize, Serialize};

use crate::table::CalibrationTable;

/// Kind of efficiency a table corrects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationCategory {
    ElectronReco,
    ElectronId,
    MuonId,
    MuonIso,
    MuonReco,
    Track,
}

impl fmt::Display for CalibrationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalibrationCategory::ElectronReco => "electron_reco",
            CalibrationCategory::ElectronId => "electron_id",
            CalibrationCategory::MuonId => "muon_id",
            CalibrationCategory::MuonIso => "muon_iso",
            CalibrationCategory::MuonReco => "muon_reco",
            CalibrationCategory::Track => "track",
        };
        f.write_str(s)
    }
}

/// Identifies one table in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalibrationKey {
    pub category: CalibrationCategory,
    #[serde(rename = "year")]
    pub era: Era,
    pub working_point: String,
}

impl CalibrationKey {
    /// Create a new key
    pub fn new(category: CalibrationCategory, era: Era, working_point: impl Into<String>) -> Self {
        Self { category, era, working_point: working_point.into() }
    }
}

impl fmt::Display for CalibrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.era, self.working_point)
    }
}

/// Source of calibration tables.
///
/// Tables are immutable once handed out and may be shared across events
/// (and threads) without synchronization.
pub trait CalibrationStore {
    /// Table for `key`; `Error::Calibration` if absent.
    fn table(&self, key: &CalibrationKey) -> Result<Arc<CalibrationTable>>;

    /// Luminosity-weighted blend of two sub-period tables.
    fn blended(
        &self,
        first: &CalibrationKey,
        second: &CalibrationKey,
        first_weight: f64,
        second_weight: f64,
    ) -> Result<Arc<CalibrationTable>> {
        let a = self.table(first)?;
        let b = self.table(second)?;
        log::debug!("blending {first} ({first_weight:.4}) with {second} ({second_weight:.4})");
        Ok(Arc::new(CalibrationTable::blend(&a, &b, first_weight, second_weight)?))
    }
}

/// One entry of a serialized table set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableEntry {
    #[serde(flatten)]
    key: CalibrationKey,
    table: CalibrationTable,
}

/// Serialized table set: `{"tables": [{category, year, working_point, table}, ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TableDocument {
    tables: Vec<TableEntry>,
}

/// Hash-map backed store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCalibrationStore {
    tables: HashMap<CalibrationKey, Arc<CalibrationTable>>,
}

impl MemoryCalibrationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, replacing any previous one under the same key.
    pub fn insert(&mut self, key: CalibrationKey, table: CalibrationTable) {
        self.tables.insert(key, Arc::new(table));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_table(mut self, key: CalibrationKey, table: CalibrationTable) -> Self {
        self.insert(key, table);
        self
    }

    /// Number of registered tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the store holds no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Parse a JSON table set.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: TableDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    /// Read a JSON table set from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let doc: TableDocument = serde_json::from_slice(&bytes)?;
        let store = Self::from_document(doc)?;
        log::debug!("loaded {} calibration tables from {}", store.len(), path.display());
        Ok(store)
    }

    /// Serialize all tables as a JSON table set (keys sorted for stable output).
    pub fn to_json_string(&self) -> Result<String> {
        let mut tables: Vec<TableEntry> = self
            .tables
            .iter()
            .map(|(k, t)| TableEntry { key: k.clone(), table: (**t).clone() })
            .collect();
        tables.sort_by_key(|e| e.key.to_string());
        Ok(serde_json::to_string_pretty(&TableDocument { tables })?)
    }

    fn from_document(doc: TableDocument) -> Result<Self> {
        let mut store = Self::new();
        for entry in doc.tables {
            if store.tables.contains_key(&entry.key) {
                return Err(Error::Calibration(format!("duplicate table for {}", entry.key)));
            }
            store.insert(entry.key, entry.table);
        }
        Ok(store)
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn table(&self, key: &CalibrationKey) -> Result<Arc<CalibrationTable>> {
        self.tables
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Calibration(format!("no calibration table for {key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: f64) -> CalibrationTable {
        CalibrationTable::one_dimensional("flat", vec![0.0, 1.0], vec![value], vec![0.1]).unwrap()
    }

    #[test]
    fn test_missing_table_is_calibration_error() {
        let store = MemoryCalibrationStore::new();
        let key = CalibrationKey::new(CalibrationCategory::Track, Era::Run2017, "sip2d");
        let err = store.table(&key).unwrap_err();
        assert!(matches!(err, Error::Calibration(_)));
        assert!(err.to_string().contains("track/2017/sip2d"));
    }

    #[test]
    fn test_blended_lookup() {
        let a = CalibrationKey::new(CalibrationCategory::MuonId, Era::Run2016, "tight_id@BCDEF");
        let b = CalibrationKey::new(CalibrationCategory::MuonId, Era::Run2016, "tight_id@GH");
        let store = MemoryCalibrationStore::new()
            .with_table(a.clone(), flat(0.9))
            .with_table(b.clone(), flat(1.0));
        let t = store.blended(&a, &b, 0.5, 0.5).unwrap();
        assert!((t.lookup(0.5, 0.5).value - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_json_round_trip_and_duplicates() {
        let json = r#"{"tables": [
            {"category": "track", "year": 2018, "working_point": "sip2d",
             "table": {"x_edges": [0, 1], "values": [0.9], "errors": [0.05]}}
        ]}"#;
        let store = MemoryCalibrationStore::from_json_str(json).unwrap();
        let key = CalibrationKey::new(CalibrationCategory::Track, Era::Run2018, "sip2d");
        assert_eq!(store.table(&key).unwrap().lookup(0.5, 0.5).value, 0.9);

        let again =
            MemoryCalibrationStore::from_json_str(&store.to_json_string().unwrap()).unwrap();
        assert_eq!(again.len(), 1);

        let dup = format!(
            r#"{{"tables": [{0}, {0}]}}"#,
            r#"{"category": "track", "year": 2018, "working_point": "sip2d",
                "table": {"x_edges": [0, 1], "values": [0.9], "errors": [0.05]}}"#
        );
        assert!(MemoryCalibrationStore::from_json_str(&dup).is_err());
    }

    #[test]
    fn test_unknown_year_rejected() {
        let json = r#"{"tables": [
            {"category": "track", "year": 2015, "working_point": "sip2d",
             "table": {"x_edges": [0, 1], "values": [0.9], "errors": [0.05]}}
        ]}"#;
        assert!(MemoryCalibrationStore::from_json_str(json).is_err());
    }
}
