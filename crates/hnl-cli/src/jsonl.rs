//! JSON-lines event source and output sink.

use std::io::{BufRead, Write};

use hnl_core::{Error, Event, EventSource, OutputSink, Result};
use serde_json::{Map, Value};

/// Reads one JSON [`Event`] per line; blank lines are skipped.
pub struct JsonLinesSource<R> {
    reader: R,
    line: String,
    line_no: usize,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: String::new(), line_no: 0 }
    }
}

impl<R: BufRead> EventSource for JsonLinesSource<R> {
    fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            let mut event: Event = serde_json::from_str(text)
                .map_err(|e| Error::Validation(format!("event on line {}: {e}", self.line_no)))?;
            // tracks refer to jets by position
            for (i, jet) in event.jets.iter_mut().enumerate() {
                jet.index = i;
            }
            return Ok(Some(event));
        }
    }
}

/// Writes one JSON object per event.
pub struct JsonLinesSink<W> {
    writer: W,
    current: Map<String, Value>,
    n_events: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, current: Map::new(), n_events: 0 }
    }

    /// Events written so far
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// Flush and return the writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> OutputSink for JsonLinesSink<W> {
    fn fill_float(&mut self, name: &str, value: f64) {
        self.current.insert(name.to_string(), Value::from(value));
    }

    fn fill_int(&mut self, name: &str, value: i64) {
        self.current.insert(name.to_string(), Value::from(value));
    }

    fn fill_array(&mut self, name: &str, values: &[f64]) {
        self.current.insert(name.to_string(), Value::from(values.to_vec()));
    }

    fn end_event(&mut self) -> Result<()> {
        let record = Value::Object(std::mem::take(&mut self.current));
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.n_events += 1;
        Ok(())
    }
}
