#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let value = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(value)
    }

    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|value| value != 0)
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        let bytes = self.read_array::<2>()?;
        Some(u16::from_le_bytes(bytes))
    }

    pub fn read_u32_le(&mut self) -> Option<u32> {
        let bytes = self.read_array::<4>()?;
        Some(u32::from_le_bytes(bytes))
    }

    pub fn read_i32_le(&mut self) -> Option<i32> {
        self.read_u32_le().map(|value| value as i32)
    }

    pub fn read_u64_le(&mut self) -> Option<u64> {
        let low = self.read_u32_le()? as u64;
        let high = self.read_u32_le()? as u64;
        Some(low | (high << 32))
    }

    pub fn read_f64_le(&mut self) -> Option<f64> {
        self.read_u64_le().map(f64::from_bits)
    }

    /// Reads a 128-bit identifier stored most significant byte first.
    pub fn read_u128_be(&mut self) -> Option<u128> {
        let bytes = self.read_array::<16>()?;
        Some(u128::from_be_bytes(bytes))
    }

    pub fn read_len_prefixed(&mut self) -> Option<usize> {
        let len = self.read_u16_le()? as usize;
        if len == 0xffff {
            let long_len = self.read_u32_le()? as usize;
            return Some(long_len);
        }
        Some(len)
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let start = self.pos;
        self.pos += len;
        Some(&self.data[start..start + len])
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }
}

#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    data: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.write_u32_le(value as u32);
    }

    pub fn write_u64_le(&mut self, value: u64) {
        self.write_u32_le((value & 0xffff_ffff) as u32);
        self.write_u32_le((value >> 32) as u32);
    }

    pub fn write_f64_le(&mut self, value: f64) {
        self.write_u64_le(value.to_bits());
    }

    pub fn write_u128_be(&mut self, value: u128) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_len_prefixed(&mut self, len: usize) {
        if len > 0xfffe {
            self.write_u16_le(0xffff);
            self.write_u32_le(len as u32);
        } else {
            self.write_u16_le(len as u16);
        }
    }

    pub fn write_string(&mut self, bytes: &[u8]) {
        self.write_len_prefixed(bytes.len());
        self.write_bytes(bytes);
    }

    pub fn write_string_str(&mut self, value: &str) {
        self.write_string(value.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}
