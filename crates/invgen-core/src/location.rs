//! Program locations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A control-flow point of the analysed program.
///
/// Locations are opaque identifiers handed out by whoever built the
/// control-flow graph. Two locations are the same point iff their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(u32);

impl Location {
    pub const fn new(id: u32) -> Self {
        Location(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

impl From<u32> for Location {
    fn from(id: u32) -> Self {
        Location(id)
    }
}
