//! Stable identities for command sources.

use std::fmt;
use std::str::FromStr;

use crate::error::HeraldError;

/// A stable, unique identifier for whoever issued a command.
///
/// Formatted like a UUID (`8-4-4-4-12` lowercase hex). Not guaranteed to
/// belong to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u128);

impl SourceId {
    /// The identity shared by every console/system source.
    pub const CONSOLE: SourceId = SourceId(0);

    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff,
        )
    }
}

impl FromStr for SourceId {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = s.split('-').collect();
        let lengths = [8, 4, 4, 4, 12];
        if groups.len() != lengths.len()
            || groups.iter().zip(lengths).any(|(g, len)| g.len() != len)
        {
            return Err(HeraldError::parse(0, format!("malformed id: {s}")));
        }
        let hex: String = groups.concat();
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HeraldError::parse(0, format!("malformed id: {s}")));
        }
        u128::from_str_radix(&hex, 16)
            .map(SourceId)
            .map_err(|_| HeraldError::parse(0, format!("malformed id: {s}")))
    }
}
