//! Decoding of the measurement notification.
//!
//! Layout of the notify characteristic value:
//!
//! | offset | meaning                         |
//! |--------|---------------------------------|
//! | 0..6   | header, unused                  |
//! | 6      | pulse rate (bpm)                |
//! | 7      | SpO2 (%)                        |
//! | 8      | perfusion index in tenths       |
//!
//! Trailing bytes are ignored.

use std::fmt;

/// Minimum length of a decodable notification.
pub const PAYLOAD_LEN: usize = 9;

const PULSE_OFFSET: usize = 6;
const SPO2_OFFSET: usize = 7;
const PI_OFFSET: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("notification is {0} bytes long, expected at least 9")]
    TooShort(usize),
}

/// One decoded sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub pulse_rate: u8,
    pub spo2_percent: u8,
    pub perfusion_index_tenths: u8,
}

impl Reading {
    /// The device reports zeros while no finger is inserted. Only a sample
    /// with all three fields set is a measurement.
    pub fn is_valid(&self) -> bool {
        self.pulse_rate != 0 && self.spo2_percent != 0 && self.perfusion_index_tenths != 0
    }

    pub fn perfusion_index(&self) -> PerfusionIndex {
        PerfusionIndex(self.perfusion_index_tenths)
    }
}

/// Perfusion index in tenths, displayed as `integer.tenths`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfusionIndex(pub u8);

impl fmt::Display for PerfusionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// Interpret a notification value. The header is not inspected.
pub fn decode(value: &[u8]) -> Result<Reading, DecodeError> {
    if value.len() < PAYLOAD_LEN {
        return Err(DecodeError::TooShort(value.len()));
    }

    Ok(Reading {
        pulse_rate: value[PULSE_OFFSET],
        spo2_percent: value[SPO2_OFFSET],
        perfusion_index_tenths: value[PI_OFFSET],
    })
}

/// Space separated lowercase hex, for logging raw notifications.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_fields_after_header() {
        let reading = decode(&[0, 0, 0, 0, 0, 0, 0x4B, 0x62, 0x64]).unwrap();
        assert_eq!(reading.pulse_rate, 75);
        assert_eq!(reading.spo2_percent, 98);
        assert_eq!(reading.perfusion_index_tenths, 100);
        assert!(reading.is_valid());
        assert_eq!(reading.perfusion_index().to_string(), "10.0");
    }

    #[test]
    fn header_is_ignored() {
        let a = decode(&[0xAA, 0x55, 0x0F, 0x08, 0x01, 0xFF, 60, 97, 23]).unwrap();
        let b = decode(&[0, 0, 0, 0, 0, 0, 60, 97, 23]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let reading = decode(&[0, 0, 0, 0, 0, 0, 70, 95, 12, 0xde, 0xad]).unwrap();
        assert_eq!(
            reading,
            Reading {
                pulse_rate: 70,
                spo2_percent: 95,
                perfusion_index_tenths: 12,
            }
        );
    }

    #[test]
    fn short_payload_is_rejected() {
        for len in 0..PAYLOAD_LEN {
            let value = vec![0x42; len];
            assert_eq!(decode(&value), Err(DecodeError::TooShort(len)));
        }
    }

    #[test]
    fn any_zero_field_marks_sample_invalid() {
        let cases = [(0, 98, 100), (75, 0, 100), (75, 98, 0), (0, 0, 0)];
        for (pulse, spo2, pi) in cases {
            let reading = decode(&[0, 0, 0, 0, 0, 0, pulse, spo2, pi]).unwrap();
            assert!(!reading.is_valid(), "{:?}", reading);
        }
    }

    #[test]
    fn perfusion_index_formatting() {
        assert_eq!(PerfusionIndex(0).to_string(), "0.0");
        assert_eq!(PerfusionIndex(7).to_string(), "0.7");
        assert_eq!(PerfusionIndex(23).to_string(), "2.3");
        assert_eq!(PerfusionIndex(255).to_string(), "25.5");
    }

    #[test]
    fn hex_dump() {
        assert_eq!(Hex(&[0x00, 0x4b, 0xff]).to_string(), "00 4b ff");
        assert_eq!(Hex(&[]).to_string(), "");
    }
}
