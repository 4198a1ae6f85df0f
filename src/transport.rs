use std::{
    fs,
    io::{self, ErrorKind, Read, Write},
    path::Path,
    thread,
    time::Duration,
};

use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use snafu::ResultExt;

use crate::{
    error::{
        DeviceAbsentSnafu, NotCharacterDeviceSnafu, OpenFailedSnafu, ReadFailedSnafu,
        WriteFailedSnafu, WriteStalledSnafu,
    },
    Error, LinkConfig,
};

/// An open serial handle.
pub trait Port: io::Read + io::Write {
    /// Sets the upper bound for the next reads.
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Number of received bytes that can be read without waiting.
    fn bytes_available(&self) -> io::Result<usize>;
}

impl Port for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }

    fn bytes_available(&self) -> io::Result<usize> {
        self.bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::from)
    }
}

/// Opens a `Port` for a link configuration.
pub trait Connect {
    type Port: Port;

    fn connect(&mut self, config: &LinkConfig) -> io::Result<Self::Port>;
}

/// Connects to a real tty: 8 data bits, 1 stop bit, no parity, no flow control.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialConnector;

impl Connect for SerialConnector {
    type Port = Box<dyn SerialPort>;

    fn connect(&mut self, config: &LinkConfig) -> io::Result<Self::Port> {
        serialport::new(config.device.to_string_lossy(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(io::Error::from)
    }
}

fn check_device(path: &Path) -> Result<(), Error> {
    let Ok(metadata) = fs::metadata(path) else {
        return DeviceAbsentSnafu { path }.fail();
    };

    if !is_char_device(&metadata) {
        return NotCharacterDeviceSnafu { path }.fail();
    }

    Ok(())
}

#[cfg(unix)]
fn is_char_device(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;

    metadata.file_type().is_char_device()
}

#[cfg(not(unix))]
fn is_char_device(metadata: &fs::Metadata) -> bool {
    !metadata.is_dir()
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Sole owner of the serial handle.
///
/// The handle is opened lazily by the first read or write, dropped on any
/// unrecoverable I/O error and reopened on the next use.
pub struct SerialTransport<C: Connect = SerialConnector> {
    config: LinkConfig,
    connector: C,
    port: Option<C::Port>,
}

impl SerialTransport<SerialConnector> {
    /// Creates a transport for a real serial device.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_connector(config, SerialConnector)
    }
}

impl<C: Connect> SerialTransport<C> {
    pub fn with_connector(config: LinkConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            port: None,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.device
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Opens the device if necessary.
    ///
    /// The device node is checked on every call, so an unplugged display closes
    /// a stale handle even when the link is already open.
    pub fn open(&mut self) -> Result<(), Error> {
        if let Err(err) = check_device(&self.config.device) {
            self.close();
            return Err(err);
        }

        if self.port.is_some() {
            return Ok(());
        }

        let port = self.connector.connect(&self.config).context(OpenFailedSnafu {
            path: &self.config.device,
        })?;
        debug!(
            "opened {} at {} baud",
            self.config.device.display(),
            self.config.baud_rate
        );
        self.port = Some(port);

        Ok(())
    }

    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("closed {}", self.config.device.display());
        }
    }

    /// Writes all of `bytes`, retrying immediately while the line would block.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.open()?;

        let limit = self.config.write_retry_limit;
        let mut written = 0;
        let mut retries = 0;
        while written < bytes.len() {
            let result = match self.port.as_mut() {
                Some(port) => port.write(&bytes[written..]),
                None => Err(ErrorKind::NotConnected.into()),
            };

            match result {
                Ok(n) if n > 0 => written += n,
                Ok(_) => retries += 1,
                Err(err) if is_transient(&err) => retries += 1,
                Err(err) => {
                    self.close();
                    return Err(err).context(WriteFailedSnafu);
                }
            }

            if retries > limit {
                self.close();
                return WriteStalledSnafu { retries: limit }.fail();
            }
            if retries > 0 && written < bytes.len() {
                thread::yield_now();
            }
        }

        Ok(())
    }

    /// Reads a single byte, waiting at most `timeout`. Returns `None` on timeout.
    pub fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, Error> {
        let mut byte = [0u8; 1];
        match self.read_some(&mut byte, timeout)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Fills `buf` with reads bounded by `timeout` each. Returns the number of
    /// bytes read, which is short of `buf.len()` only if a read timed out.
    pub fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Error> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_some(&mut buf[filled..], timeout)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Number of bytes that can be read right away.
    pub fn bytes_available(&mut self) -> Result<usize, Error> {
        self.open()?;

        let result = match self.port.as_ref() {
            Some(port) => port.bytes_available(),
            None => Err(ErrorKind::NotConnected.into()),
        };

        result.or_else(|err| {
            self.close();
            Err(err).context(ReadFailedSnafu)
        })
    }

    fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Error> {
        self.open()?;

        let result = match self.port.as_mut() {
            Some(port) => port
                .set_read_timeout(timeout)
                .and_then(|()| read_retrying(port, buf)),
            None => Err(ErrorKind::NotConnected.into()),
        };

        match result {
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(err) => {
                self.close();
                Err(err).context(ReadFailedSnafu)
            }
        }
    }
}

fn read_retrying<P: Port>(port: &mut P, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match port.read(buf) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
