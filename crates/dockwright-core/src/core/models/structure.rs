use super::atom::AtomRecord;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The logical role a structure plays in a docking project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureRole {
    Receptor,
    Binder,
    Other(String),
}

impl StructureRole {
    pub fn as_str(&self) -> &str {
        match self {
            StructureRole::Receptor => "receptor",
            StructureRole::Binder => "binder",
            StructureRole::Other(name) => name,
        }
    }
}

impl FromStr for StructureRole {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "receptor" => StructureRole::Receptor,
            "binder" => StructureRole::Binder,
            other => StructureRole::Other(other.to_string()),
        })
    }
}

impl fmt::Display for StructureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structure file produced by one workflow step.
///
/// Each step writes a new file rather than mutating its input, so a `StructureFile` is
/// never modified after it is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureFile {
    pub role: StructureRole,
    pub path: PathBuf,
}

impl StructureFile {
    pub fn new(role: StructureRole, path: impl Into<PathBuf>) -> Self {
        Self {
            role,
            path: path.into(),
        }
    }

    /// Returns the same role pointing at a newer file.
    pub fn superseded_by(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(self.role.clone(), path)
    }
}

/// An ordered collection of atom records from a single model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    atoms: Vec<AtomRecord>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_atoms(atoms: Vec<AtomRecord>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[AtomRecord] {
        &self.atoms
    }

    pub fn push(&mut self, atom: AtomRecord) {
        self.atoms.push(atom);
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Distinct chain labels in order of first appearance.
    pub fn chain_ids(&self) -> Vec<char> {
        let mut ids = Vec::new();
        for atom in &self.atoms {
            if !ids.contains(&atom.chain_id) {
                ids.push(atom.chain_id);
            }
        }
        ids
    }

    /// Relabels every atom with a single chain label.
    pub fn set_chain_id(&mut self, chain_id: char) {
        for atom in &mut self.atoms {
            atom.chain_id = chain_id;
        }
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for atom in &mut self.atoms {
            atom.translate(shift);
        }
    }

    /// Appends all atoms of `other` after this structure's atoms.
    pub fn extend(&mut self, other: Structure) {
        self.atoms.extend(other.atoms);
    }

    pub fn renumber_serials(&mut self) {
        for (index, atom) in self.atoms.iter_mut().enumerate() {
            atom.serial = index + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(chain: char, x: f64) -> AtomRecord {
        AtomRecord::new("CA", "ALA", chain, 1, Point3::new(x, 0.0, 0.0))
    }

    #[test]
    fn role_parses_known_names_case_insensitively() {
        assert_eq!(
            "Receptor".parse::<StructureRole>().unwrap(),
            StructureRole::Receptor
        );
        assert_eq!(" binder".parse::<StructureRole>().unwrap(), StructureRole::Binder);
        assert_eq!(
            "ligand".parse::<StructureRole>().unwrap(),
            StructureRole::Other("ligand".to_string())
        );
        assert_eq!(StructureRole::Binder.to_string(), "binder");
    }

    #[test]
    fn superseded_file_keeps_role() {
        let raw = StructureFile::new(StructureRole::Receptor, "r.pdb");
        let fixed = raw.superseded_by("r_fixed.pdb");
        assert_eq!(fixed.role, StructureRole::Receptor);
        assert_eq!(raw.path, PathBuf::from("r.pdb"));
    }

    #[test]
    fn chain_ids_are_unique_in_first_appearance_order() {
        let s = Structure::from_atoms(vec![atom('B', 0.0), atom('A', 1.0), atom('B', 2.0)]);
        assert_eq!(s.chain_ids(), vec!['B', 'A']);
    }

    #[test]
    fn extend_then_renumber_gives_contiguous_serials() {
        let mut s = Structure::from_atoms(vec![atom('A', 0.0)]);
        s.extend(Structure::from_atoms(vec![atom('B', 1.0), atom('B', 2.0)]));
        s.renumber_serials();
        let serials: Vec<usize> = s.atoms().iter().map(|a| a.serial).collect();
        assert_eq!(serials, vec![1, 2, 3]);
    }

    #[test]
    fn set_chain_id_and_translate_apply_to_every_atom() {
        let mut s = Structure::from_atoms(vec![atom('X', 0.0), atom('Y', 1.0)]);
        s.set_chain_id('B');
        s.translate(&Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(s.chain_ids(), vec!['B']);
        assert_eq!(s.positions()[1], Point3::new(2.0, 0.0, 0.0));
    }
}
