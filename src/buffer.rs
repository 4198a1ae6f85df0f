pub(crate) struct BytesReader<'a> {
    buf: &'a [u8],
    idx: usize,
}

impl<'a> BytesReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, idx: 0 }
    }

    pub fn next(&mut self) -> Option<u8> {
        let val = self.buf.get(self.idx).copied()?;
        self.idx += 1;
        Some(val)
    }

    /// Takes the next `N` bytes, or nothing if fewer are left.
    pub fn next_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let data = crate::to_array::ref_array_start::<N>(&self.buf[self.idx..])?;
        self.idx += N;
        Some(*data)
    }
}

/// Fixed-capacity byte buffer used to assemble one outgoing frame.
pub(crate) struct Buf<const C: usize> {
    buf: [u8; C],
    len: usize,
}

impl<const C: usize> Buf<C> {
    pub const fn new() -> Self {
        Self {
            buf: [0; C],
            len: 0,
        }
    }

    pub fn push(&mut self, c: u8) -> bool {
        if let Some(v) = self.buf.get_mut(self.len) {
            *v = c;
            self.len += 1;
            true
        } else {
            false
        }
    }

    pub fn push_bytes(&mut self, data: &[u8]) -> bool {
        match self.buf.get_mut(self.len..self.len + data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                self.len += data.len();
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}
