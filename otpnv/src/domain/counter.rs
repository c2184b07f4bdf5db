//! Counter value encodings.
//!
//! OTP-style counters are thermometer coded: the value is the number of
//! set bits, so advancing a counter only ever sets more bits. The generic
//! flash counters are plain little-endian words.

/// Largest counter field in any layout, in bytes.
pub const COUNTER_FIELD_MAX: usize = 64;

/// How a counter field maps bytes to a numeric value.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEncoding {
    /// Value is the population count of the field.
    Unary,
    /// Value is the first four bytes read as a little-endian `u32`.
    LittleEndianU32,
}

impl CounterEncoding {
    /// Decode a counter from its stored bytes.
    pub fn decode(self, bytes: &[u8]) -> u32 {
        match self {
            Self::Unary => bytes.iter().map(|b| b.count_ones()).sum(),
            Self::LittleEndianU32 => {
                let mut word = [0u8; 4];
                let n = bytes.len().min(4);
                word[..n].copy_from_slice(&bytes[..n]);
                u32::from_le_bytes(word)
            }
        }
    }

    /// Highest value a field of `field_size` bytes can represent.
    pub const fn capacity(self, field_size: usize) -> u32 {
        match self {
            Self::Unary => (field_size * 8) as u32,
            Self::LittleEndianU32 => u32::MAX,
        }
    }

    /// Encode `value` into `out`, which must be the whole field.
    ///
    /// Returns `None` if the value does not fit.
    pub fn encode(self, value: u32, out: &mut [u8]) -> Option<()> {
        if value > self.capacity(out.len()) {
            return None;
        }

        out.fill(0);
        match self {
            Self::Unary => {
                let full = (value / 8) as usize;
                out[..full].fill(0xFF);
                let rem = value % 8;
                if rem != 0 {
                    out[full] = (1u8 << rem) - 1;
                }
            }
            Self::LittleEndianU32 => {
                if out.len() < 4 {
                    return None;
                }
                out[..4].copy_from_slice(&value.to_le_bytes());
            }
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unary_counts_set_bits() {
        assert_eq!(CounterEncoding::Unary.decode(&[0u8; 16]), 0);
        assert_eq!(CounterEncoding::Unary.decode(&[0xFF, 0x07, 0, 0]), 11);
        // Holes still count; only the total matters.
        assert_eq!(CounterEncoding::Unary.decode(&[0b1010_0000]), 2);
    }

    #[test]
    fn test_unary_encode_is_thermometer() {
        let mut field = [0xAAu8; 16];
        CounterEncoding::Unary.encode(11, &mut field).unwrap();
        assert_eq!(field[0], 0xFF);
        assert_eq!(field[1], 0x07);
        assert!(field[2..].iter().all(|&b| b == 0));
        assert_eq!(CounterEncoding::Unary.decode(&field), 11);
    }

    #[test]
    fn test_unary_capacity() {
        let mut field = [0u8; 16];
        assert_eq!(CounterEncoding::Unary.capacity(16), 128);
        assert!(CounterEncoding::Unary.encode(128, &mut field).is_some());
        assert!(field.iter().all(|&b| b == 0xFF));
        assert!(CounterEncoding::Unary.encode(129, &mut field).is_none());
    }

    #[test]
    fn test_le_word() {
        let mut field = [0u8; 4];
        CounterEncoding::LittleEndianU32.encode(0x0102_0304, &mut field).unwrap();
        assert_eq!(field, [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(CounterEncoding::LittleEndianU32.decode(&field), 0x0102_0304);
    }
}
