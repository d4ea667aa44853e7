use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::DocError;

/// Zero-based cell coordinate. Orders row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddr {
    pub row: usize,
    pub col: usize,
}

impl CellAddr {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse an A1 reference such as `J5` or `$X$66`.
    pub fn parse(text: &str) -> Result<Self, DocError> {
        let invalid = || DocError::InvalidAddress(text.to_string());
        let s = text.trim();
        let s = s.strip_prefix('$').unwrap_or(s);
        let split = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .ok_or_else(invalid)?;
        let (letters, rest) = s.split_at(split);
        let digits = rest.strip_prefix('$').unwrap_or(rest);
        if letters.is_empty() || letters.len() > 3 || digits.is_empty() {
            return Err(invalid());
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let col = column_index(letters).ok_or_else(invalid)?;
        let row: usize = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }
        Ok(Self::new(row - 1, col))
    }

    pub fn to_a1(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row + 1)
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

impl FromStr for CellAddr {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CellAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_a1())
    }
}

impl<'de> Deserialize<'de> for CellAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        CellAddr::parse(&text).map_err(de::Error::custom)
    }
}

/// Column letters for a zero-based index: 0 -> `A`, 25 -> `Z`, 26 -> `AA`.
pub fn column_letters(col: usize) -> String {
    let mut out = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Zero-based index for column letters, case-insensitive.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let v = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(v)?;
    }
    Some(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_plain_and_absolute_refs() {
        assert_eq!(CellAddr::parse("A1").unwrap(), CellAddr::new(0, 0));
        assert_eq!(CellAddr::parse("J5").unwrap(), CellAddr::new(4, 9));
        assert_eq!(CellAddr::parse("$X$66").unwrap(), CellAddr::new(65, 23));
        assert_eq!(CellAddr::parse("aa10").unwrap(), CellAddr::new(9, 26));
    }

    #[test]
    fn rejects_malformed_refs() {
        for bad in ["", "5", "A", "A0", "ABCD1", "A1B", "1A"] {
            assert!(CellAddr::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn letters_for_known_columns() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(9), "J");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn serializes_as_a1_text() {
        let json = serde_json::to_string(&CellAddr::new(65, 23)).unwrap();
        assert_eq!(json, r#""X66""#);
        let back: CellAddr = serde_json::from_str(r#""q66""#).unwrap();
        assert_eq!(back, CellAddr::new(65, 16));
        assert!(serde_json::from_str::<CellAddr>(r#""66Q""#).is_err());
    }

    proptest! {
        #[test]
        fn a1_text_parses_back(row in 0usize..100_000, col in 0usize..16_384) {
            let addr = CellAddr::new(row, col);
            prop_assert_eq!(CellAddr::parse(&addr.to_a1()).unwrap(), addr);
        }
    }
}
