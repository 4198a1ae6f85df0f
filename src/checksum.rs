use bitfields::bitfield;

/// Modulus applied to both accumulators before packing.
const MODULUS: u32 = 13;

/// Packed checksum byte: `a` in the high nibble, `b` in the low one.
#[bitfield(u8)]
#[derive(Clone, Copy, PartialEq)]
struct Packed {
    #[bits(4)]
    b: u8,
    #[bits(4)]
    a: u8,
}

/// Running digest for the adler8-like telemetry checksum.
///
/// Both accumulators are reduced modulo 13 only once all bytes are consumed, so
/// the result of feeding a buffer in pieces equals feeding it at once.
#[derive(Clone, Copy, Debug)]
pub struct Adler8 {
    a: u32,
    b: u32,
}

impl Adler8 {
    pub const fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn compute(&mut self, data: &[u8]) {
        for &byte in data {
            self.a = self.a.wrapping_add(byte as u32);
            self.b = self.b.wrapping_add(self.a);
        }
    }

    pub fn get_checksum(&self) -> u8 {
        let mut packed = Packed::new();
        packed.set_a((self.a % MODULUS) as u8);
        packed.set_b((self.b % MODULUS) as u8);
        packed.into_bits()
    }
}

impl Default for Adler8 {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the checksum of `data` in one go.
pub fn adler8(data: &[u8]) -> u8 {
    let mut digest = Adler8::new();
    digest.compute(data);
    digest.get_checksum()
}
