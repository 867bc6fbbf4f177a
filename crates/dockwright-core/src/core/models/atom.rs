use nalgebra::{Point3, Vector3};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The PDB record type an atom was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordKind {
    /// A standard polymer atom (`ATOM`).
    #[default]
    Atom,
    /// A heteroatom such as a ligand or water (`HETATM`).
    Hetatm,
}

#[derive(Debug, Error)]
#[error("Unknown coordinate record type '{0}'")]
pub struct ParseRecordKindError(String);

impl FromStr for RecordKind {
    type Err = ParseRecordKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ATOM" => Ok(RecordKind::Atom),
            "HETATM" => Ok(RecordKind::Hetatm),
            other => Err(ParseRecordKindError(other.to_string())),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Atom => "ATOM",
            RecordKind::Hetatm => "HETATM",
        })
    }
}

/// A single coordinate record of a structure file.
///
/// Fields keep their file representation wherever the writer must reproduce it exactly:
/// `name` holds the raw four-column atom name field (including its alignment blank), and
/// the alternate location and insertion code are kept as blank characters when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    /// Whether the atom came from an `ATOM` or `HETATM` line.
    pub kind: RecordKind,
    /// Serial number as read; writers renumber from 1.
    pub serial: usize,
    /// The raw, column-aligned atom name (e.g. `" CA "`).
    pub name: String,
    /// Alternate location indicator, blank when absent.
    pub alt_loc: char,
    /// Residue name (e.g. "MET").
    pub residue_name: String,
    /// Chain label; blank when the file does not assign one.
    pub chain_id: char,
    /// Residue sequence number.
    pub residue_number: isize,
    /// Residue insertion code, blank when absent.
    pub insertion_code: char,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    pub occupancy: f64,
    pub temp_factor: f64,
    /// Element symbol, possibly empty for legacy files.
    pub element: String,
    pub charge: String,
}

impl AtomRecord {
    pub fn new(
        name: &str,
        residue_name: &str,
        chain_id: char,
        residue_number: isize,
        position: Point3<f64>,
    ) -> Self {
        Self {
            kind: RecordKind::Atom,
            serial: 0,
            name: format!("{:<4}", format!(" {}", name.trim())),
            alt_loc: ' ',
            residue_name: residue_name.to_string(),
            chain_id,
            residue_number,
            insertion_code: ' ',
            position,
            occupancy: 1.0,
            temp_factor: 0.0,
            element: name.trim().chars().take(1).collect(),
            charge: String::new(),
        }
    }

    /// The key identifying the residue this atom belongs to.
    pub fn residue_key(&self) -> (char, isize, char) {
        (self.chain_id, self.residue_number, self.insertion_code)
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        self.position += shift;
    }
}
