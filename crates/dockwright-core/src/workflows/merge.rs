use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFormat;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{closest_pair, min_distance, translated};
use crate::engine::config::MergeConfig;
use crate::engine::error::EngineError;
use nalgebra::Vector3;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const RECEPTOR_CHAIN: char = 'A';
pub const BINDER_CHAIN: char = 'B';
const NORM_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub output: PathBuf,
    pub receptor: PathBuf,
    pub binder: PathBuf,
    /// Distance between the closest receptor/binder atoms before the binder was moved.
    pub anchor_distance: f64,
    /// Closest receptor/binder distance in the written complex.
    pub final_min_distance: f64,
    pub atom_count: usize,
}

/// The translation chosen for the binder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub shift: Vector3<f64>,
    pub anchor_distance: f64,
    pub final_min_distance: f64,
}

/// Places a binder next to a receptor so their closest atoms sit `gap` apart.
pub struct StructureMerger {
    gap: f64,
}

impl StructureMerger {
    pub fn new(config: &MergeConfig) -> Self {
        Self { gap: config.gap }
    }

    pub fn with_gap(gap: f64) -> Self {
        Self { gap }
    }

    pub fn gap(&self) -> f64 {
        self.gap
    }

    /// Computes the binder translation without touching any structure.
    ///
    /// The binder is moved along the line through the closest atom pair. Which sign of the
    /// move gives the requested gap depends on how the two structures sit relative to each
    /// other, so both candidates are tried and the one whose resulting minimum distance is
    /// closer to `gap` wins. On a tie the `+needed` candidate is used.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Geometry`] if either structure has no atoms.
    pub fn place(&self, receptor: &Structure, binder: &Structure) -> Result<Placement, EngineError> {
        if receptor.is_empty() {
            return Err(EngineError::Geometry("receptor has no atoms".to_string()));
        }
        if binder.is_empty() {
            return Err(EngineError::Geometry("binder has no atoms".to_string()));
        }

        let receptor_coords = receptor.positions();
        let binder_coords = binder.positions();
        let anchor = closest_pair(&receptor_coords, &binder_coords)
            .ok_or_else(|| EngineError::Geometry("no atom pair to anchor on".to_string()))?;

        let direction = receptor_coords[anchor.first] - binder_coords[anchor.second];
        let (unit, norm) = if direction.norm() < NORM_EPSILON {
            (Vector3::x(), 1.0)
        } else {
            (direction.normalize(), direction.norm())
        };
        let needed = norm - self.gap;

        let toward_negative = unit * -needed;
        let toward_positive = unit * needed;
        let distance_after = |shift: &Vector3<f64>| {
            min_distance(&translated(&binder_coords, shift), &receptor_coords).unwrap_or(f64::INFINITY)
        };
        let negative_distance = distance_after(&toward_negative);
        let positive_distance = distance_after(&toward_positive);

        let (shift, final_min_distance) =
            if (negative_distance - self.gap).abs() < (positive_distance - self.gap).abs() {
                (toward_negative, negative_distance)
            } else {
                (toward_positive, positive_distance)
            };

        debug!(
            anchor_receptor = anchor.first,
            anchor_binder = anchor.second,
            anchor_distance = anchor.distance,
            negative_distance,
            positive_distance,
            "Binder placement candidates evaluated."
        );

        Ok(Placement {
            shift,
            anchor_distance: anchor.distance,
            final_min_distance,
        })
    }

    /// Relabels, places, and concatenates the two structures into one complex.
    pub fn merge_structures(
        &self,
        mut receptor: Structure,
        mut binder: Structure,
    ) -> Result<(Structure, Placement), EngineError> {
        receptor.set_chain_id(RECEPTOR_CHAIN);
        binder.set_chain_id(BINDER_CHAIN);
        let placement = self.place(&receptor, &binder)?;
        binder.translate(&placement.shift);
        receptor.extend(binder);
        receptor.renumber_serials();
        Ok((receptor, placement))
    }

    /// Merges the receptor and binder files into a complex written to `output`.
    #[instrument(skip_all, name = "merge_structures", fields(gap = self.gap))]
    pub fn merge(
        &self,
        receptor: &Path,
        binder: &Path,
        output: &Path,
    ) -> Result<MergeResult, EngineError> {
        let receptor_structure = PdbFile::read_from_path(receptor)?;
        let binder_structure = PdbFile::read_from_path(binder)?;
        let (complex, placement) = self.merge_structures(receptor_structure, binder_structure)?;
        PdbFile::write_to_path(&complex, output)?;

        info!(
            output = %output.display(),
            atoms = complex.len(),
            min_distance = placement.final_min_distance,
            "Complex written."
        );

        Ok(MergeResult {
            output: output.to_path_buf(),
            receptor: receptor.to_path_buf(),
            binder: binder.to_path_buf(),
            anchor_distance: placement.anchor_distance,
            final_min_distance: placement.final_min_distance,
            atom_count: complex.len(),
        })
    }
}
