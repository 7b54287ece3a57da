use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::direction::Direction;
use crate::error::{SignalError, SignalResult};

/// Vehicle count per road for one observation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionCount {
    counts: [u32; 4],
}

impl DirectionCount {
    pub fn new(north: u32, east: u32, south: u32, west: u32) -> Self {
        Self {
            counts: [north, east, south, west],
        }
    }

    pub fn get(&self, direction: Direction) -> u32 {
        self.counts[direction.index()]
    }

    pub fn set(&mut self, direction: Direction, count: u32) {
        self.counts[direction.index()] = count;
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, u32)> + '_ {
        Direction::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    /// Road with the most vehicles. Ties go to the first road in
    /// [`Direction::ALL`] order.
    pub fn busiest(&self) -> (Direction, u32) {
        let mut best = (Direction::North, self.get(Direction::North));
        for (direction, count) in self.iter().skip(1) {
            if count > best.1 {
                best = (direction, count);
            }
        }
        best
    }

    /// Validates a raw detector map keyed by direction label.
    ///
    /// Unknown labels are rejected; otherwise fails on the first road (in
    /// canonical order) that is missing or negative.
    pub fn from_raw(raw: &HashMap<String, i64>) -> SignalResult<Self> {
        let parsed = parse_raw(raw)?;
        let mut counts = Self::default();
        for direction in Direction::ALL {
            let value = parsed
                .get(&direction)
                .copied()
                .ok_or(SignalError::MissingDirection(direction))?;
            counts.set(direction, checked_count(direction, value)?);
        }
        Ok(counts)
    }

    /// Like [`DirectionCount::from_raw`], but malformed roads are zeroed
    /// and returned alongside the counts so the caller can report them.
    pub fn from_raw_lenient(raw: &HashMap<String, i64>) -> (Self, Vec<SignalError>) {
        let mut problems = Vec::new();
        let parsed = match parse_raw(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                problems.push(err);
                // Keep whatever labels do parse.
                raw.iter()
                    .filter_map(|(k, v)| k.parse::<Direction>().ok().map(|d| (d, *v)))
                    .collect()
            }
        };

        let mut counts = Self::default();
        for direction in Direction::ALL {
            match parsed.get(&direction) {
                None => problems.push(SignalError::MissingDirection(direction)),
                Some(&value) => match checked_count(direction, value) {
                    Ok(count) => counts.set(direction, count),
                    Err(err) => problems.push(err),
                },
            }
        }
        (counts, problems)
    }
}

impl Serialize for DirectionCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        for (direction, count) in self.iter() {
            map.serialize_entry(direction.label(), &count)?;
        }
        map.end()
    }
}

fn parse_raw(raw: &HashMap<String, i64>) -> SignalResult<HashMap<Direction, i64>> {
    raw.iter()
        .map(|(label, value)| Ok((label.parse::<Direction>()?, *value)))
        .collect()
}

fn checked_count(direction: Direction, value: i64) -> SignalResult<u32> {
    if value < 0 {
        return Err(SignalError::NegativeCount { direction, value });
    }
    Ok(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_busiest_picks_maximum() {
        let counts = DirectionCount::new(1, 5, 2, 0);
        assert_eq!(counts.busiest(), (Direction::East, 5));
    }

    #[test]
    fn test_busiest_tie_uses_canonical_order() {
        assert_eq!(DirectionCount::new(0, 3, 3, 3).busiest().0, Direction::East);
        assert_eq!(DirectionCount::new(0, 0, 0, 0).busiest().0, Direction::North);
        assert_eq!(DirectionCount::new(2, 1, 4, 4).busiest().0, Direction::South);
    }

    #[test]
    fn test_from_raw_accepts_full_snapshot() {
        let counts =
            DirectionCount::from_raw(&raw(&[("N", 1), ("E", 5), ("south", 2), ("W", 0)])).unwrap();
        assert_eq!(counts, DirectionCount::new(1, 5, 2, 0));
        assert_eq!(counts.total(), 8);
    }

    #[test]
    fn test_from_raw_names_negative_direction() {
        let err = DirectionCount::from_raw(&raw(&[("N", 1), ("E", -2), ("S", 2), ("W", 0)]))
            .unwrap_err();
        assert!(matches!(
            err,
            SignalError::NegativeCount {
                direction: Direction::East,
                value: -2
            }
        ));
    }

    #[test]
    fn test_from_raw_names_missing_direction() {
        let err = DirectionCount::from_raw(&raw(&[("N", 1), ("E", 2), ("S", 2)])).unwrap_err();
        assert!(matches!(err, SignalError::MissingDirection(Direction::West)));
    }

    #[test]
    fn test_lenient_zeroes_malformed_roads() {
        let (counts, problems) =
            DirectionCount::from_raw_lenient(&raw(&[("N", 4), ("E", -1), ("S", 2)]));
        assert_eq!(counts, DirectionCount::new(4, 0, 2, 0));
        assert_eq!(problems.len(), 2);
        assert!(problems
            .iter()
            .any(|p| matches!(p, SignalError::NegativeCount { direction: Direction::East, .. })));
        assert!(problems
            .iter()
            .any(|p| matches!(p, SignalError::MissingDirection(Direction::West))));
    }

    #[test]
    fn test_lenient_reports_unknown_label() {
        let (counts, problems) = DirectionCount::from_raw_lenient(&raw(&[
            ("N", 1),
            ("E", 1),
            ("S", 1),
            ("W", 1),
            ("NE", 7),
        ]));
        assert_eq!(counts, DirectionCount::new(1, 1, 1, 1));
        assert!(matches!(problems.as_slice(), [SignalError::UnknownDirection(l)] if l == "NE"));
    }
}
