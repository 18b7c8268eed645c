use std::fmt;

use itertools::Itertools;
use serde::Serialize;

/// Label alphabet in product order.
pub const ALPHABET: [char; 37] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '-',
];

/// Longest label DNS allows.
pub const MAX_LABEL_LEN: usize = 63;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LengthRange {
    pub min: usize,
    pub max: usize,
}

impl LengthRange {
    pub fn single(len: usize) -> Self {
        Self { min: len, max: len }
    }

    /// A usable range is non-empty and fits inside one DNS label.
    pub fn validate(&self) -> Result<(), String> {
        if self.min == 0 {
            return Err("length must be at least 1".to_string());
        }
        if self.min > self.max {
            return Err("MIN must not be greater than MAX".to_string());
        }
        if self.max > MAX_LABEL_LEN {
            return Err(format!("length must not exceed {MAX_LABEL_LEN}"));
        }
        Ok(())
    }
}

impl Default for LengthRange {
    fn default() -> Self {
        Self { min: 1, max: 3 }
    }
}

impl fmt::Display for LengthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// Parses `N` or `MIN-MAX`.
pub fn parse_length_range(value: &str) -> Result<LengthRange, String> {
    let trimmed = value.trim();
    let parse_one = |raw: &str, what: &str| -> Result<usize, String> {
        raw.trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid {what} value '{}'", raw.trim()))
    };

    let range = match trimmed.split_once('-') {
        Some((min, max)) => LengthRange {
            min: parse_one(min, "MIN")?,
            max: parse_one(max, "MAX")?,
        },
        None => LengthRange::single(parse_one(trimmed, "length")?),
    };

    range.validate()?;
    Ok(range)
}

/// Streams every label over `alphabet` for each length in `range`, shortest
/// first and lexicographic within a length. Labels with a leading or
/// trailing '-' are skipped.
pub fn brute_labels(alphabet: Vec<char>, range: LengthRange) -> impl Iterator<Item = String> {
    (range.min..=range.max).flat_map(move |len| {
        let alphabet = alphabet.clone();
        (0..len)
            .map(move |_| alphabet.clone().into_iter())
            .multi_cartesian_product()
            .map(|chars| chars.into_iter().collect::<String>())
            .filter(|label| !label.starts_with('-') && !label.ends_with('-'))
    })
}
