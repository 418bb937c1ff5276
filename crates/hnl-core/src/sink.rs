//! In-memory output sink.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::Result;
use crate::traits::OutputSink;

/// A single stored output value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    /// Scalar float
    Float(f64),
    /// Integer
    Int(i64),
    /// Variable-length array
    Array(Vec<f64>),
}

impl OutputValue {
    /// Numeric value of a scalar entry.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OutputValue::Float(v) => Some(*v),
            OutputValue::Int(v) => Some(*v as f64),
            OutputValue::Array(_) => None,
        }
    }
}

/// Named values of one event, ordered by name.
pub type EventRecord = BTreeMap<String, OutputValue>;

/// Collects every event's values in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    current: EventRecord,
    events: Vec<EventRecord>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed events
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Consume the sink, returning completed events.
    pub fn into_events(self) -> Vec<EventRecord> {
        self.events
    }

    /// Values filled so far for the open event.
    pub fn current(&self) -> &EventRecord {
        &self.current
    }
}

impl OutputSink for MemorySink {
    fn fill_float(&mut self, name: &str, value: f64) {
        self.current.insert(name.to_string(), OutputValue::Float(value));
    }

    fn fill_int(&mut self, name: &str, value: i64) {
        self.current.insert(name.to_string(), OutputValue::Int(value));
    }

    fn fill_array(&mut self, name: &str, values: &[f64]) {
        self.current.insert(name.to_string(), OutputValue::Array(values.to_vec()));
    }

    fn end_event(&mut self) -> Result<()> {
        self.events.push(std::mem::take(&mut self.current));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_splits_events() {
        let mut sink = MemorySink::new();
        sink.fill_int("nMuons", 2);
        sink.fill_array("muons_pt", &[30.0, 20.0]);
        sink.end_event().unwrap();
        sink.fill_float("w", 0.5);
        sink.end_event().unwrap();

        let events = sink.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["nMuons"], OutputValue::Int(2));
        assert_eq!(events[0]["muons_pt"], OutputValue::Array(vec![30.0, 20.0]));
        assert_eq!(events[1]["w"].as_f64(), Some(0.5));
        assert!(!events[1].contains_key("nMuons"));
    }

    #[test]
    fn test_output_value_serializes_untagged() {
        let json = serde_json::to_string(&OutputValue::Array(vec![1.0])).unwrap();
        assert_eq!(json, "[1.0]");
    }
}
