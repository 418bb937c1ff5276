//! Boundary traits for hnlsel
//!
//! Event reading and output writing are owned by the surrounding framework.
//! The selection engine only sees these two seams.

use crate::Result;
use crate::event::Event;

/// Supplies events in order.
pub trait EventSource {
    /// Next event, or `None` at end of input.
    fn next_event(&mut self) -> Result<Option<Event>>;
}

/// Accepts named per-event values.
///
/// All values for one event are filled before `end_event` is called;
/// nothing is written for event N+1 before that.
pub trait OutputSink {
    /// Store a scalar float.
    fn fill_float(&mut self, name: &str, value: f64);

    /// Store an integer (counts, flags).
    fn fill_int(&mut self, name: &str, value: i64);

    /// Store a variable-length array.
    fn fill_array(&mut self, name: &str, values: &[f64]);

    /// Close the current event.
    fn end_event(&mut self) -> Result<()>;
}
