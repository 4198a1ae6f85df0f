//! This crate drives a character LCD and reads sensor telemetry over one serial link.
//! # Usage
//! ### Framing
//! ```rust
//! use lcdlink::{frames, FrameMode};
//!
//! let payload = [b'x'; 300];
//! let lens: Vec<u8> = frames(&payload, FrameMode::WriteRaw).map(|f| f.len()).collect();
//! assert_eq!(lens, [255, 45]);
//! ```
//! ### Control loop
//! ```rust,no_run
//! use lcdlink::{Lcd, LinkConfig, Operation};
//!
//! let mut lcd = Lcd::new(LinkConfig::new("/dev/ttyUSB0"));
//! lcd.apply(Operation::UpdatePage { page: 0, data: b"hello".to_vec() }).unwrap();
//! lcd.redraw().unwrap();
//!
//! let report = lcd.poll_sensors().unwrap();
//! for (id, sensor) in lcd.sensors().known() {
//!     println!("{id}: {} {}", sensor.serial(), sensor.value);
//! }
//! # let _ = report;
//! ```

mod buffer;
mod to_array;

mod checksum;
pub use checksum::*;

mod config;
pub use config::*;

mod error;
pub use error::Error;

mod frame;
pub use frame::*;

mod lcd;
pub use lcd::*;

mod page;
pub use page::*;

mod resync;
pub use resync::*;

mod sensor;
pub use sensor::*;

mod transport;
pub use transport::*;

#[cfg(test)]
mod mock;

/// Number of display pages.
pub const PAGE_COUNT: usize = 3;
/// Bytes per page (20 columns by 4 rows).
pub const PAGE_SIZE: usize = 20 * 4;
/// Number of sensor ids tracked.
pub const SENSOR_COUNT: usize = 8;
