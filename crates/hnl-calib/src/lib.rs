//! # hnl-calib
//!
//! Binned scale-factor tables and the store that hands them out.
//!
//! ```
//! use hnl_calib::{CalibrationTable, ScaleFactor};
//!
//! let t = CalibrationTable::one_dimensional(
//!     "sip",
//!     vec![0.0, 1.0, 5.0],
//!     vec![0.9, 0.8],
//!     vec![0.02, 0.05],
//! )
//! .unwrap();
//! assert_eq!(t.lookup_x_clamped(12.0), ScaleFactor::new(0.8, 0.05));
//! ```

#![warn(clippy::all)]

pub mod store;
pub mod table;

pub use store::{CalibrationCategory, CalibrationKey, CalibrationStore, MemoryCalibrationStore};
pub use table::{CalibrationTable, ScaleFactor};
