//! Sensor telemetry records and the decoder draining them from the link.

use log::{debug, warn};

use crate::{
    buffer::BytesReader, checksum::adler8, Connect, Error, ResyncEngine, SerialTransport,
    SENSOR_COUNT,
};

/// Size of one telemetry record on the wire.
pub const RECORD_LEN: usize = 12;
/// Bytes covered by the trailing checksum.
const CHECKED_LEN: usize = RECORD_LEN - 1;

/// A telemetry record as received: `id | address(8) | value(2, LE) | checksum`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawRecord {
    pub id: u8,
    pub address: [u8; 8],
    pub value: i16,
    pub checksum: u8,
}

impl RawRecord {
    /// Checksum computed over the first 11 bytes of an encoded record.
    pub fn expected_checksum(data: &[u8; RECORD_LEN]) -> u8 {
        adler8(&data[..CHECKED_LEN])
    }

    /// Encodes the record with a freshly computed checksum.
    pub fn encode(id: u8, address: [u8; 8], value: i16) -> [u8; RECORD_LEN] {
        let mut data = [0u8; RECORD_LEN];
        raw_encode(
            &RawRecord {
                id,
                address,
                value,
                checksum: 0,
            },
            &mut data,
        );
        data[CHECKED_LEN] = Self::expected_checksum(&data);
        data
    }
}

/// The raw decoder (parser) for a telemetry record. Returns `None` if `data` is
/// shorter than a record; the checksum is not verified.
pub fn raw_decode(data: &[u8]) -> Option<RawRecord> {
    let mut reader = BytesReader::new(data);
    Some(RawRecord {
        id: reader.next()?,
        address: reader.next_array()?,
        value: i16::from_le_bytes(reader.next_array()?),
        checksum: reader.next()?,
    })
}

/// The raw encoder (serializer) for a telemetry record.
pub fn raw_encode(record: &RawRecord, data: &mut [u8; RECORD_LEN]) {
    data[0] = record.id;
    data[1..9].copy_from_slice(&record.address);
    data[9..11].copy_from_slice(&record.value.to_le_bytes());
    data[11] = record.checksum;
}

/// Last known reading of one sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorRecord {
    /// Whether this id has ever been observed.
    pub known: bool,
    pub address: [u8; 8],
    pub value: i16,
}

impl SensorRecord {
    /// Address as 16 lowercase hex digits.
    pub fn serial(&self) -> String {
        hex::encode(self.address)
    }
}

/// Sensor readings indexed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SensorTable {
    sensors: [SensorRecord; SENSOR_COUNT],
}

impl SensorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: usize) -> Option<&SensorRecord> {
        self.sensors.get(id)
    }

    /// Iterates `(id, record)` over the sensors seen so far.
    pub fn known(&self) -> impl Iterator<Item = (usize, &SensorRecord)> + '_ {
        self.sensors
            .iter()
            .enumerate()
            .filter(|(_, sensor)| sensor.known)
    }

    /// Stores a checksum-valid record. Returns `false` for ids outside the table.
    fn apply(&mut self, record: &RawRecord) -> bool {
        let Some(sensor) = self.sensors.get_mut(record.id as usize) else {
            return false;
        };
        sensor.known = true;
        sensor.address = record.address;
        sensor.value = record.value;
        true
    }
}

/// What one drain cycle did.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Records stored in the table.
    pub accepted: usize,
    /// Checksum-valid records with an id outside the table.
    pub foreign: usize,
    /// Records dropped for a checksum mismatch.
    pub mismatches: usize,
    /// The cycle ended on a record cut short by a read timeout.
    pub short_read: bool,
    /// Outcome of the resync triggered by a mismatch, if any.
    pub resync: Option<Result<(), Error>>,
}

/// Drains buffered telemetry records into a `SensorTable`.
pub struct SensorDecoder<'l, C: Connect> {
    link: &'l mut SerialTransport<C>,
}

impl<'l, C: Connect> SensorDecoder<'l, C> {
    pub fn new(link: &'l mut SerialTransport<C>) -> Self {
        Self { link }
    }

    /// Decodes records for as long as input is immediately available.
    ///
    /// A checksum mismatch triggers a resync and ends the cycle. Hard I/O
    /// errors are returned; a failed resync is only recorded in the report,
    /// unless it broke the link.
    pub fn drain(&mut self, table: &mut SensorTable) -> Result<DrainReport, Error> {
        let mut report = DrainReport::default();

        while self.link.bytes_available()? > 0 {
            let mut data = [0u8; RECORD_LEN];
            let timeout = self.link.config().read_timeout;
            let n = self.link.read_exact(&mut data, timeout)?;
            let Some(record) = raw_decode(&data[..n]) else {
                debug!("sensor record cut short after {n} bytes");
                report.short_read = true;
                break;
            };

            let expected = RawRecord::expected_checksum(&data);
            if record.checksum != expected {
                warn!(
                    "sensor checksum mismatch: got {:#04x}, expected {expected:#04x}; resyncing",
                    record.checksum
                );
                report.mismatches += 1;
                match ResyncEngine::new(&mut *self.link).resync() {
                    Err(err) if err.closed_link() => return Err(err),
                    result => report.resync = Some(result),
                }
                break;
            }

            if table.apply(&record) {
                report.accepted += 1;
            } else {
                debug!("ignoring sensor id {} (table holds {SENSOR_COUNT})", record.id);
                report.foreign += 1;
            }
        }

        Ok(report)
    }
}
