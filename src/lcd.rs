use log::{debug, warn};

use crate::{
    Connect, DrainReport, Error, FrameMode, FrameWriter, LinkConfig, PageBuffer, ResyncEngine,
    SensorDecoder, SensorTable, SerialConnector, SerialTransport,
};

/// Prefix of the display's backlight command.
const BACKLIGHT_COMMAND: u8 = 0x7C;
/// Base of the backlight level byte.
const BACKLIGHT_BASE: u8 = 0x80;
/// Highest backlight level the display accepts.
const BACKLIGHT_MAX_LEVEL: u8 = 29;

/// Maps a `0..=255` power to the display's backlight command.
pub fn backlight_command(power: u8) -> [u8; 2] {
    let level = (power as u32 * 30 / 255).min(BACKLIGHT_MAX_LEVEL as u32) as u8;
    [BACKLIGHT_COMMAND, BACKLIGHT_BASE + level]
}

/// Whether the display answered the last presence check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Presence {
    Detected,
    Absent,
}

/// Typed operations a command dispatcher can run against the display.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Replace the content of a page without showing it.
    UpdatePage { page: usize, data: Vec<u8> },
    /// Select the page drawn by the next redraw.
    ShowPage(usize),
    /// Advance to the next page and redraw.
    CyclePage,
    /// Send bytes to the display as a `WriteRaw` payload.
    WriteRaw(Vec<u8>),
    Clear,
    SetBacklight(u8),
    Redraw,
    Resync,
    PollSensors,
}

/// Result of a successful `Operation`.
#[derive(Debug)]
pub enum Outcome {
    Done,
    /// Number of bytes stored into or sent from a buffer.
    Bytes(usize),
    /// Page now selected.
    Page(usize),
    Sensors(DrainReport),
}

/// The display, its pages and the sensor readings behind one serial link.
///
/// This is the context a control loop owns and hands to every callback.
pub struct Lcd<C: Connect = SerialConnector> {
    link: SerialTransport<C>,
    pages: PageBuffer,
    sensors: SensorTable,
}

impl Lcd<SerialConnector> {
    pub fn new(config: LinkConfig) -> Self {
        Self::with_transport(SerialTransport::new(config))
    }
}

impl<C: Connect> Lcd<C> {
    pub fn with_transport(link: SerialTransport<C>) -> Self {
        Self {
            link,
            pages: PageBuffer::new(),
            sensors: SensorTable::new(),
        }
    }

    pub fn link(&self) -> &SerialTransport<C> {
        &self.link
    }

    pub fn pages(&self) -> &PageBuffer {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut PageBuffer {
        &mut self.pages
    }

    pub fn sensors(&self) -> &SensorTable {
        &self.sensors
    }

    pub fn open(&mut self) -> Result<(), Error> {
        self.link.open()
    }

    pub fn close(&mut self) {
        self.link.close()
    }

    /// Opens the link if the device is plugged in, closing it otherwise.
    pub fn check_device(&mut self) -> Presence {
        match self.link.open() {
            Ok(()) => Presence::Detected,
            Err(err) => {
                debug!("display not available: {err}");
                Presence::Absent
            }
        }
    }

    pub fn write_framed(&mut self, payload: &[u8], mode: FrameMode) -> Result<(), Error> {
        FrameWriter::new(&mut self.link).write_framed(payload, mode)
    }

    pub fn write_raw(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.write_framed(payload, FrameMode::WriteRaw)
    }

    pub fn clear(&mut self) -> Result<(), Error> {
        FrameWriter::new(&mut self.link).clear()
    }

    pub fn redraw(&mut self) -> Result<(), Error> {
        self.pages.redraw(&mut FrameWriter::new(&mut self.link))
    }

    pub fn set_backlight(&mut self, power: u8) -> Result<(), Error> {
        self.write_raw(&backlight_command(power))
    }

    pub fn resync(&mut self) -> Result<(), Error> {
        ResyncEngine::new(&mut self.link).resync()
    }

    /// Drains buffered telemetry into the sensor table.
    pub fn poll_sensors(&mut self) -> Result<DrainReport, Error> {
        let report = SensorDecoder::new(&mut self.link).drain(&mut self.sensors)?;
        if let Some(Err(err)) = &report.resync {
            warn!("link alignment not restored: {err}");
        }
        Ok(report)
    }

    pub fn apply(&mut self, operation: Operation) -> Result<Outcome, Error> {
        match operation {
            Operation::UpdatePage { page, data } => {
                self.pages.update_page(page, &data)?;
                Ok(Outcome::Bytes(data.len()))
            }
            Operation::ShowPage(page) => {
                self.pages.show_page(page)?;
                Ok(Outcome::Page(page))
            }
            Operation::CyclePage => {
                let page = self.pages.cycle();
                self.redraw()?;
                Ok(Outcome::Page(page))
            }
            Operation::WriteRaw(data) => {
                self.write_raw(&data)?;
                Ok(Outcome::Bytes(data.len()))
            }
            Operation::Clear => self.clear().map(|()| Outcome::Done),
            Operation::SetBacklight(power) => self.set_backlight(power).map(|()| Outcome::Done),
            Operation::Redraw => self.redraw().map(|()| Outcome::Done),
            Operation::Resync => self.resync().map(|()| Outcome::Done),
            Operation::PollSensors => self.poll_sensors().map(Outcome::Sensors),
        }
    }
}
