use std::time::Duration;

use log::{debug, info, warn};

use crate::{Connect, Error, FrameMode, SerialTransport};

/// Marker byte repeated by the display in its resync reply.
pub const RESYNC_MARKER: u8 = 0xFF;
/// Byte terminating the marker run.
pub const RESYNC_SENTINEL: u8 = 0x00;
/// Shortest marker run accepted as a reply. Telemetry never carries this many
/// consecutive `0xFF` bytes.
pub const MIN_MARKER_RUN: usize = 11;

/// State machine for one resync attempt.
///
/// +----------+   +----------+   +----------------------------------------+
/// | Scanning |-->| Counting |-->| Aligned / ShortRun / BadTerminator     |
/// +----------+   +----------+   +----------------------------------------+
///      |              |
///      +--------------+-------> TimedOut
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Scanning,
    Counting { run: usize },
}

/// How a single attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttemptOutcome {
    /// Long enough marker run ended by the sentinel.
    Aligned { run: usize },
    /// A read timed out while scanning or counting.
    TimedOut { run: usize },
    /// The marker run ended before reaching `MIN_MARKER_RUN`.
    ShortRun { run: usize, terminator: u8 },
    /// The marker run was long enough but not followed by the sentinel.
    BadTerminator { run: usize, terminator: u8 },
}

impl AttemptOutcome {
    pub fn is_aligned(&self) -> bool {
        matches!(self, AttemptOutcome::Aligned { .. })
    }
}

/// Re-establishes byte alignment with the display after a framing error.
pub struct ResyncEngine<'l, C: Connect> {
    link: &'l mut SerialTransport<C>,
    attempts: u8,
    timeout: Duration,
}

impl<'l, C: Connect> ResyncEngine<'l, C> {
    /// Creates an engine using the attempt budget and read timeout of the link.
    pub fn new(link: &'l mut SerialTransport<C>) -> Self {
        let attempts = link.config().resync_attempts;
        let timeout = link.config().read_timeout;
        Self {
            link,
            attempts,
            timeout,
        }
    }

    /// Runs up to the configured number of attempts, returning on the first
    /// success.
    ///
    /// A hard read error closes the link and aborts the remaining attempts with
    /// `Error::ResyncRead`. Running out of attempts yields
    /// `Error::ResyncExhausted` with the link left open.
    pub fn resync(&mut self) -> Result<(), Error> {
        for attempt in 1..=self.attempts {
            let outcome = self.attempt()?;
            if outcome.is_aligned() {
                info!("resync succeeded on attempt {attempt}: {outcome:?}");
                return Ok(());
            }
            debug!("resync attempt {attempt} failed: {outcome:?}");
        }

        warn!("resync failed after {} attempts", self.attempts);
        Err(Error::ResyncExhausted {
            attempts: self.attempts,
        })
    }

    /// Sends the resync signal and evaluates the reply once.
    pub fn attempt(&mut self) -> Result<AttemptOutcome, Error> {
        let signal: u8 = FrameMode::Resync.into();
        self.link.write(&[signal])?;

        let mut state = State::Scanning;
        loop {
            let Some(byte) = self.read()? else {
                let run = match state {
                    State::Scanning => 0,
                    State::Counting { run } => run,
                };
                return Ok(AttemptOutcome::TimedOut { run });
            };

            state = match (state, byte) {
                (State::Scanning, RESYNC_MARKER) => State::Counting { run: 1 },
                (State::Scanning, _) => State::Scanning,
                (State::Counting { run }, RESYNC_MARKER) => State::Counting { run: run + 1 },
                (State::Counting { run }, terminator) => {
                    return Ok(evaluate(run, terminator));
                }
            };
        }
    }

    fn read(&mut self) -> Result<Option<u8>, Error> {
        self.link.read_byte(self.timeout).map_err(|err| match err {
            Error::ReadFailed { source } => Error::ResyncRead { source },
            err => err,
        })
    }
}

fn evaluate(run: usize, terminator: u8) -> AttemptOutcome {
    if run < MIN_MARKER_RUN {
        AttemptOutcome::ShortRun { run, terminator }
    } else if terminator != RESYNC_SENTINEL {
        AttemptOutcome::BadTerminator { run, terminator }
    } else {
        AttemptOutcome::Aligned { run }
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::{AttemptOutcome, ResyncEngine, RESYNC_MARKER, RESYNC_SENTINEL};
    use crate::{mock, Error, FrameMode};

    const SIGNAL: u8 = FrameMode::Resync as u8;

    fn reply(run: usize, terminator: u8) -> Vec<u8> {
        let mut bytes = vec![RESYNC_MARKER; run];
        bytes.push(terminator);
        bytes
    }

    #[test]
    fn test_aligned_on_first_attempt() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&reply(11, RESYNC_SENTINEL));

        ResyncEngine::new(&mut link).resync().expect("resync");

        assert_eq!(wire.borrow().tx, [SIGNAL]);
        assert!(wire.borrow().rx.is_empty());
    }

    #[test]
    fn test_stray_bytes_before_marker() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&[0x12, 0x00, 0x34]);
        wire.borrow_mut().feed(&reply(14, RESYNC_SENTINEL));

        let outcome = ResyncEngine::new(&mut link).attempt().unwrap();

        assert_eq!(outcome, AttemptOutcome::Aligned { run: 14 });
    }

    #[test]
    fn test_short_run_is_retried() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&reply(10, RESYNC_SENTINEL));
        wire.borrow_mut().feed(&reply(11, RESYNC_SENTINEL));

        let mut engine = ResyncEngine::new(&mut link);
        assert_eq!(
            engine.attempt().unwrap(),
            AttemptOutcome::ShortRun {
                run: 10,
                terminator: 0
            }
        );
        assert!(engine.attempt().unwrap().is_aligned());
    }

    #[test]
    fn test_short_run_then_success_within_budget() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&reply(10, RESYNC_SENTINEL));
        wire.borrow_mut().feed(&reply(11, RESYNC_SENTINEL));

        ResyncEngine::new(&mut link).resync().expect("second attempt aligns");

        assert_eq!(wire.borrow().tx, [SIGNAL, SIGNAL]);
    }

    #[test]
    fn test_wrong_terminator() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&reply(11, 0x01));

        let outcome = ResyncEngine::new(&mut link).attempt().unwrap();

        assert_eq!(
            outcome,
            AttemptOutcome::BadTerminator {
                run: 11,
                terminator: 0x01
            }
        );
    }

    #[test]
    fn test_timeout_while_counting() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&[RESYNC_MARKER; 5]);

        let outcome = ResyncEngine::new(&mut link).attempt().unwrap();

        assert_eq!(outcome, AttemptOutcome::TimedOut { run: 5 });
    }

    #[test]
    fn test_exhausted_after_three_attempts() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&reply(10, RESYNC_SENTINEL));
        wire.borrow_mut().feed(&reply(11, 0x01));
        // Third attempt times out on an empty line

        let result = ResyncEngine::new(&mut link).resync();

        assert!(matches!(result, Err(Error::ResyncExhausted { attempts: 3 })));
        assert_eq!(wire.borrow().tx, [SIGNAL; 3]);
        assert!(link.is_open());
    }

    #[test]
    fn test_read_error_aborts() {
        let (mut link, wire) = mock::transport();
        wire.borrow_mut().feed(&[RESYNC_MARKER; 3]);
        wire.borrow_mut().rx.push_back(mock::Rx::Fail(ErrorKind::BrokenPipe));
        wire.borrow_mut().feed(&reply(11, RESYNC_SENTINEL));

        let result = ResyncEngine::new(&mut link).resync();

        assert!(matches!(result, Err(Error::ResyncRead { .. })));
        assert_eq!(wire.borrow().tx, [SIGNAL]);
        assert!(!link.is_open());
    }
}
