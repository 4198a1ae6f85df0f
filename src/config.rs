use std::{path::PathBuf, time::Duration};

/// Default line speed of the display and sensor bridge.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Struct for configuring a `SerialTransport`.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Character device the display is attached to.
    pub device: PathBuf,
    /// Line speed. Default is 9600.
    pub baud_rate: u32,
    /// Upper bound for every single read. Default is 100 ms.
    pub read_timeout: Duration,
    /// Number of resync handshakes tried before giving up. Default is 3.
    pub resync_attempts: u8,
    /// Number of would-block retries tolerated within one write. Default is 1024.
    pub write_retry_limit: usize,
}

impl LinkConfig {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
            resync_attempts: 3,
            write_retry_limit: 1024,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_resync_attempts(mut self, attempts: u8) -> Self {
        self.resync_attempts = attempts;
        self
    }

    pub fn with_write_retry_limit(mut self, limit: usize) -> Self {
        self.write_retry_limit = limit;
        self
    }
}

/// Periods of the callbacks a control loop drives the link with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    pub device_check: Duration,
    pub page_cycle: Duration,
    pub sensor_check: Duration,
}

impl Intervals {
    pub const fn default() -> Self {
        Self {
            device_check: Duration::from_millis(5000),
            page_cycle: Duration::from_millis(5000),
            sensor_check: Duration::from_millis(1000),
        }
    }
}
