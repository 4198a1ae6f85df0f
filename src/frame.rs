use log::trace;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{buffer::Buf, Connect, Error, SerialTransport};

/// Maximum payload carried by one frame.
pub const MAX_FRAME_PAYLOAD: usize = u8::MAX as usize;
/// Mode byte, length byte and a full payload.
pub const MAX_FRAME_LEN: usize = MAX_FRAME_PAYLOAD + 2;

/// Operation selector sent as the first byte of every frame.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FrameMode {
    Clear = 0x01,
    WriteRaw = 0x02,
    WritePage = 0x03,
    /// Sent as a lone byte, never followed by a length.
    Resync = 0x04,
}

/// One frame on the wire: `[mode, len, payload...]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub mode: FrameMode,
    pub payload: &'a [u8],
}

impl Frame<'_> {
    pub fn len(&self) -> u8 {
        // Frames are only built by `Frames`, which never exceeds the limit
        self.payload.len() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    fn encode(&self, buf: &mut Buf<MAX_FRAME_LEN>) {
        buf.clear();
        buf.push(self.mode.into());
        buf.push(self.len());
        buf.push_bytes(self.payload);
    }
}

/// Splits a payload into frames of at most `MAX_FRAME_PAYLOAD` bytes.
///
/// An empty payload still yields a single, empty frame.
pub fn frames(payload: &[u8], mode: FrameMode) -> Frames<'_> {
    Frames {
        mode,
        remaining: payload,
        done: false,
    }
}

/// Iterator over the frames of one logical payload, created by `frames`.
pub struct Frames<'a> {
    mode: FrameMode,
    remaining: &'a [u8],
    done: bool,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let take = self.remaining.len().min(MAX_FRAME_PAYLOAD);
        let (chunk, rest) = self.remaining.split_at(take);
        self.remaining = rest;
        self.done = rest.is_empty();

        Some(Frame {
            mode: self.mode,
            payload: chunk,
        })
    }
}

/// Writes frames to the display through a borrowed transport.
pub struct FrameWriter<'l, C: Connect> {
    link: &'l mut SerialTransport<C>,
    buf: Buf<MAX_FRAME_LEN>,
}

impl<'l, C: Connect> FrameWriter<'l, C> {
    pub fn new(link: &'l mut SerialTransport<C>) -> Self {
        Self {
            link,
            buf: Buf::new(),
        }
    }

    /// Sends `payload` under `mode`, chunked into as many frames as needed.
    ///
    /// Stops at the first failing frame; frames already sent are not retracted.
    pub fn write_framed(&mut self, payload: &[u8], mode: FrameMode) -> Result<(), Error> {
        for frame in frames(payload, mode) {
            frame.encode(&mut self.buf);
            trace!("frame {:?} with {} bytes", frame.mode, frame.len());
            self.link.write(self.buf.as_slice())?;
        }
        Ok(())
    }

    /// Sends a `Clear` frame without payload.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.write_framed(&[], FrameMode::Clear)
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::{frames, FrameMode, FrameWriter, MAX_FRAME_PAYLOAD};
    use crate::{mock, Error};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Splits raw wire bytes back into (mode, payload) pairs.
    fn split_wire(mut wire: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut out = Vec::new();
        while let [mode, len, rest @ ..] = wire {
            let len = *len as usize;
            out.push((*mode, rest[..len].to_vec()));
            wire = &rest[len..];
        }
        assert!(wire.is_empty(), "trailing bytes: {wire:?}");
        out
    }

    #[test]
    fn test_single_frame_lengths() {
        for len in [0, 1, 80, 254, 255] {
            let payload = pattern(len);
            let all: Vec<_> = frames(&payload, FrameMode::WriteRaw).collect();

            assert_eq!(all.len(), 1, "len {len}");
            assert_eq!(all[0].len() as usize, len);
            assert_eq!(all[0].payload, payload.as_slice());
        }
    }

    #[test]
    fn test_multi_frame_split() {
        for len in [256, 510, 511, 1000] {
            let payload = pattern(len);
            let all: Vec<_> = frames(&payload, FrameMode::WritePage).collect();

            assert_eq!(all.len(), len.div_ceil(MAX_FRAME_PAYLOAD), "len {len}");
            assert_eq!(all.iter().map(|f| f.len() as usize).sum::<usize>(), len);
            assert!(all.iter().all(|f| f.mode == FrameMode::WritePage));

            let joined: Vec<u8> = all.iter().flat_map(|f| f.payload.iter().copied()).collect();
            assert_eq!(joined, payload);
        }
    }

    #[test]
    fn test_write_framed_wire_format() {
        let (mut link, wire) = mock::transport();

        FrameWriter::new(&mut link)
            .write_framed(b"hi", FrameMode::WriteRaw)
            .unwrap();

        assert_eq!(wire.borrow().tx, [0x02, 2, b'h', b'i']);
    }

    #[test]
    fn test_write_framed_chunks_in_order() {
        let (mut link, wire) = mock::transport();
        let payload = pattern(600);

        FrameWriter::new(&mut link)
            .write_framed(&payload, FrameMode::WriteRaw)
            .unwrap();

        let sent = split_wire(&wire.borrow().tx);
        assert_eq!(
            sent.iter().map(|(_, p)| p.len()).collect::<Vec<_>>(),
            [255, 255, 90]
        );
        assert!(sent.iter().all(|(mode, _)| *mode == FrameMode::WriteRaw as u8));
        let sent: Vec<Vec<u8>> = sent.into_iter().map(|(_, p)| p).collect();
        assert_eq!(sent.concat(), payload);
    }

    #[test]
    fn test_clear_frame() {
        let (mut link, wire) = mock::transport();

        FrameWriter::new(&mut link).clear().unwrap();

        assert_eq!(wire.borrow().tx, [FrameMode::Clear as u8, 0]);
    }

    #[test]
    fn test_write_failure_stops_chunking() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().write_errors.push_back(ErrorKind::BrokenPipe);

        let result = FrameWriter::new(&mut link).write_framed(&pattern(300), FrameMode::WriteRaw);

        assert!(matches!(result, Err(Error::WriteFailed { .. })));
        assert!(wire.borrow().tx.is_empty());
        assert!(!link.is_open());
    }

    #[test]
    fn test_mode_from_byte() {
        assert_eq!(FrameMode::try_from(0x03).ok(), Some(FrameMode::WritePage));
        assert!(FrameMode::try_from(0x7F).is_err());
    }
}
