//! In-memory serial line for unit tests.

use std::{cell::RefCell, collections::VecDeque, io, rc::Rc, time::Duration};

use crate::{Connect, LinkConfig, Port, SerialTransport};

/// One scripted receive event.
pub(crate) enum Rx {
    Byte(u8),
    Fail(io::ErrorKind),
}

/// Both directions of the fake line. An exhausted `rx` reads as a timeout.
#[derive(Default)]
pub(crate) struct Wire {
    pub rx: VecDeque<Rx>,
    pub tx: Vec<u8>,
    pub write_errors: VecDeque<io::ErrorKind>,
    pub max_chunk: Option<usize>,
    pub connect_error: Option<io::ErrorKind>,
    pub connects: usize,
}

impl Wire {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().map(|&b| Rx::Byte(b)));
    }

    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    pub wire: Rc<RefCell<Wire>>,
}

pub(crate) struct MockPort {
    wire: Rc<RefCell<Wire>>,
}

impl Connect for MockConnector {
    type Port = MockPort;

    fn connect(&mut self, _config: &LinkConfig) -> io::Result<MockPort> {
        let mut wire = self.wire.borrow_mut();
        if let Some(kind) = wire.connect_error.take() {
            return Err(kind.into());
        }
        wire.connects += 1;
        Ok(MockPort {
            wire: self.wire.clone(),
        })
    }
}

impl io::Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.wire.borrow_mut().rx.pop_front() {
            Some(Rx::Byte(byte)) => {
                buf[0] = byte;
                Ok(1)
            }
            Some(Rx::Fail(kind)) => Err(kind.into()),
            None => Err(io::ErrorKind::TimedOut.into()),
        }
    }
}

impl io::Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if let Some(kind) = wire.write_errors.pop_front() {
            return Err(kind.into());
        }
        let n = wire.max_chunk.map_or(buf.len(), |max| max.min(buf.len()));
        wire.tx.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn bytes_available(&self) -> io::Result<usize> {
        Ok(self.wire.borrow().rx.len())
    }
}

/// Transport on `/dev/null` (a character device) backed by a fresh `Wire`.
pub(crate) fn transport() -> (SerialTransport<MockConnector>, Rc<RefCell<Wire>>) {
    transport_with(LinkConfig::new("/dev/null").with_read_timeout(Duration::from_millis(1)))
}

pub(crate) fn transport_with(
    config: LinkConfig,
) -> (SerialTransport<MockConnector>, Rc<RefCell<Wire>>) {
    let connector = MockConnector::default();
    let wire = connector.wire.clone();
    (SerialTransport::with_connector(config, connector), wire)
}
