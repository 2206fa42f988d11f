//! CRC checks used by the XZ container.
//!
//! Both variants are the reflected forms used by XZ:
//! - CRC-32: IEEE polynomial 0xEDB88320 (headers, index, footer, optional block check)
//! - CRC-64: ECMA-182 polynomial 0xC96C5795D7870F42 (default block check)

/// CRC-32 polynomial (reflected).
const CRC32_POLY: u32 = 0xEDB8_8320;

/// CRC-64 polynomial (reflected ECMA-182).
const CRC64_POLY: u64 = 0xC96C_5795_D787_0F42;

const CRC32_TABLE: [u32; 256] = build_crc32_table();
const CRC64_TABLE: [u64; 256] = build_crc64_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn build_crc64_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC64_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental CRC-32 calculator.
#[derive(Debug, Clone)]
pub struct Crc32 {
    value: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { value: 0xFFFF_FFFF }
    }

    /// Feed more data.
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.value;
        for &byte in data {
            crc = CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.value = crc;
    }

    /// Get the final CRC value.
    pub fn finalize(&self) -> u32 {
        self.value ^ 0xFFFF_FFFF
    }

    /// Compute CRC-32 of a byte slice in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental CRC-64 calculator.
#[derive(Debug, Clone)]
pub struct Crc64 {
    value: u64,
}

impl Crc64 {
    /// Create a new CRC-64 calculator.
    pub fn new() -> Self {
        Self { value: u64::MAX }
    }

    /// Feed more data.
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.value;
        for &byte in data {
            crc = CRC64_TABLE[((crc ^ byte as u64) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.value = crc;
    }

    /// Get the final CRC value.
    pub fn finalize(&self) -> u64 {
        self.value ^ u64::MAX
    }

    /// Compute CRC-64 of a byte slice in one call.
    pub fn compute(data: &[u8]) -> u64 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF4_3926);
        assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4A_C3D0);
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(Crc32::compute(b""), 0);
    }

    #[test]
    fn test_crc32_incremental() {
        let mut crc = Crc32::new();
        crc.update(b"Hello, ");
        crc.update(b"World!");
        assert_eq!(crc.finalize(), Crc32::compute(b"Hello, World!"));
    }

    #[test]
    fn test_crc64_check_value() {
        assert_eq!(Crc64::compute(b"123456789"), 0x995D_C9BB_DF19_39FA);
        assert_eq!(Crc64::compute(b""), 0);
    }

    #[test]
    fn test_crc64_incremental() {
        let data = b"Hello, LZMA! This is a compression test.";
        let mut crc = Crc64::new();
        for part in data.chunks(7) {
            crc.update(part);
        }
        assert_eq!(crc.finalize(), Crc64::compute(data));
    }
}
