use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A byte count that can be written in configuration as a human readable size,
/// e.g. "100mb", "64 KiB" or "4096".
///
/// Units are binary multiples; "kb" and "kib" both mean 1024 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(u64);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid byte size {0:?}")]
pub struct ByteSizeParseError(String);

const UNITS: [(&str, u64); 5] = [("b", 1), ("k", 1 << 10), ("m", 1 << 20), ("g", 1 << 30), ("t", 1 << 40)];

impl ByteSize {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ByteSizeParseError(s.to_owned());

        let t = s.trim().to_ascii_lowercase();
        let split = t.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(t.len());
        let (number, unit) = t.split_at(split);
        let unit = unit.trim();

        let multiplier = if unit.is_empty() {
            1
        } else {
            let stem = unit.strip_suffix("ib").or_else(|| unit.strip_suffix('b')).unwrap_or(unit);
            let stem = if stem.is_empty() { "b" } else { stem };
            UNITS.iter().find(|(u, _)| *u == stem).map(|(_, m)| *m).ok_or_else(err)?
        };

        if let Ok(n) = number.parse::<u64>() {
            return n.checked_mul(multiplier).map(ByteSize).ok_or_else(err);
        }

        let n: f64 = number.parse().map_err(|_| err())?;
        if !n.is_finite() || n < 0. {
            return Err(err());
        }
        Ok(ByteSize((n * multiplier as f64) as u64))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, size) = UNITS
            .iter()
            .rev()
            .find(|(_, m)| self.0 >= *m && self.0 % *m == 0)
            .copied()
            .unwrap_or(("b", 1));
        if unit == "b" {
            write!(f, "{}b", self.0)
        } else {
            write!(f, "{}{}b", self.0 / size, unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("4096".parse::<ByteSize>().unwrap().as_u64(), 4096);
        assert_eq!("64kb".parse::<ByteSize>().unwrap().as_u64(), 64 * 1024);
        assert_eq!("64 KiB".parse::<ByteSize>().unwrap().as_u64(), 64 * 1024);
        assert_eq!("100mb".parse::<ByteSize>().unwrap().as_u64(), 100 * 1024 * 1024);
        assert_eq!("1.5k".parse::<ByteSize>().unwrap().as_u64(), 1536);
        assert_eq!("12b".parse::<ByteSize>().unwrap().as_u64(), 12);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<ByteSize>().is_err());
        assert!("mb".parse::<ByteSize>().is_err());
        assert!("12 parsecs".parse::<ByteSize>().is_err());
        assert!("-4kb".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteSize::new(100 * 1024 * 1024).to_string(), "100mb");
        assert_eq!(ByteSize::new(1025).to_string(), "1025b");
        assert_eq!(ByteSize::new(0).to_string(), "0b");
    }
}
