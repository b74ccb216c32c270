//! Static schema of the per-frame attributes carried by a [`Trajectory`](super::Trajectory).
//!
//! The averaging stage needs to know which attributes come with an
//! uncertainty slot: only those are averaged (mean into the value slot,
//! standard deviation into the uncertainty slot). The schema is fixed at
//! compile time.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// 2D position, stored as two rows (x, y).
    Coord,
    /// Fluorescence intensity.
    F,
    /// Number of molecules.
    Mol,
    /// Number of samples that contributed to an averaged value.
    N,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [Attribute::Coord, Attribute::F, Attribute::Mol, Attribute::N];

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Coord => "coord",
            Attribute::F => "f",
            Attribute::Mol => "mol",
            Attribute::N => "n",
        }
    }

    /// Number of rows of the attribute (2 for coordinates, 1 otherwise).
    pub fn dims(self) -> usize {
        match self {
            Attribute::Coord => 2,
            _ => 1,
        }
    }

    pub fn has_uncertainty(self) -> bool {
        !matches!(self, Attribute::N)
    }

    /// Attributes that are averaged into a mean ± std pair.
    pub fn averaged() -> impl Iterator<Item = Attribute> {
        Self::ALL.into_iter().filter(|a| a.has_uncertainty())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod attribute_test {
    use super::*;

    #[test]
    fn test_averaged_attributes() {
        let averaged: Vec<Attribute> = Attribute::averaged().collect();
        assert_eq!(averaged, vec![Attribute::Coord, Attribute::F, Attribute::Mol]);
        assert_eq!(Attribute::Coord.dims(), 2);
        assert_eq!(Attribute::N.to_string(), "n");
    }
}
