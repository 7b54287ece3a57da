use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// One of the four approaches into the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Canonical order. Ties between roads resolve to the earliest entry.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Position in [`Direction::ALL`].
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::East => "E",
            Direction::South => "S",
            Direction::West => "W",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "North",
            Direction::East => "East",
            Direction::South => "South",
            Direction::West => "West",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = SignalError;

    /// Accepts the short label (`N`) or the full name (`north`), any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Direction::ALL
            .into_iter()
            .find(|d| {
                trimmed.eq_ignore_ascii_case(d.label()) || trimmed.eq_ignore_ascii_case(d.name())
            })
            .ok_or_else(|| SignalError::UnknownDirection(trimmed.to_string()))
    }
}

impl TryFrom<String> for Direction {
    type Error = SignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels_and_names() {
        assert_eq!("N".parse::<Direction>().unwrap(), Direction::North);
        assert_eq!("east".parse::<Direction>().unwrap(), Direction::East);
        assert_eq!(" South ".parse::<Direction>().unwrap(), Direction::South);
        assert_eq!("w".parse::<Direction>().unwrap(), Direction::West);
        assert!(matches!(
            "up".parse::<Direction>(),
            Err(SignalError::UnknownDirection(label)) if label == "up"
        ));
    }

    #[test]
    fn test_canonical_order_matches_index() {
        for (i, d) in Direction::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[test]
    fn test_deserialize_from_short_label() {
        let d: Direction = serde_json::from_str("\"E\"").unwrap();
        assert_eq!(d, Direction::East);
        assert_eq!(serde_json::to_string(&Direction::West).unwrap(), "\"West\"");
    }
}
