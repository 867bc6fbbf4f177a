use nalgebra::{Point3, Vector3};
use std::cmp::Ordering;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The closest pair of points between two sets, identified by their indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPair {
    pub first: usize,
    pub second: usize,
    pub distance: f64,
}

fn nearest_in(point: &Point3<f64>, others: &[Point3<f64>]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, other) in others.iter().enumerate() {
        let dist_sq = (point - other).norm_squared();
        match best {
            Some((_, current)) if dist_sq >= current => {}
            _ => best = Some((index, dist_sq)),
        }
    }
    best
}

// Ordering by (distance, first index) makes the reduction independent of how the
// parallel iterator splits the work, so the earliest pair wins every tie.
fn pair_order(a: &(usize, usize, f64), b: &(usize, usize, f64)) -> Ordering {
    a.2.total_cmp(&b.2).then_with(|| a.0.cmp(&b.0))
}

/// Finds the globally closest pair between `first` and `second`.
///
/// Iteration is `first`-major, `second`-minor; ties resolve to the earliest pair in that
/// order. Returns `None` when either set is empty.
pub fn closest_pair(first: &[Point3<f64>], second: &[Point3<f64>]) -> Option<ClosestPair> {
    if first.is_empty() || second.is_empty() {
        return None;
    }

    #[cfg(not(feature = "parallel"))]
    let iterator = first.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = first.par_iter().enumerate();

    iterator
        .filter_map(|(i, point)| nearest_in(point, second).map(|(j, dist_sq)| (i, j, dist_sq)))
        .min_by(pair_order)
        .map(|(first, second, dist_sq)| ClosestPair {
            first,
            second,
            distance: dist_sq.sqrt(),
        })
}

pub fn min_distance(first: &[Point3<f64>], second: &[Point3<f64>]) -> Option<f64> {
    closest_pair(first, second).map(|pair| pair.distance)
}

pub fn translated(points: &[Point3<f64>], shift: &Vector3<f64>) -> Vec<Point3<f64>> {
    points.iter().map(|p| p + shift).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(xs: &[f64]) -> Vec<Point3<f64>> {
        xs.iter().map(|&x| Point3::new(x, 0.0, 0.0)).collect()
    }

    #[test]
    fn closest_pair_finds_global_minimum() {
        let a = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 5.0, 0.0)];
        let b = vec![Point3::new(20.0, 0.0, 0.0), Point3::new(6.0, 5.0, 0.0)];
        let pair = closest_pair(&a, &b).unwrap();
        assert_eq!((pair.first, pair.second), (1, 1));
        assert!((pair.distance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn closest_pair_breaks_ties_by_first_occurrence() {
        let a = line(&[0.0, 4.0]);
        let b = line(&[2.0, 6.0]);
        // (0,0), (1,0) and (1,1) are all 2.0 apart.
        let pair = closest_pair(&a, &b).unwrap();
        assert_eq!((pair.first, pair.second), (0, 0));
    }

    #[test]
    fn closest_pair_is_none_for_empty_sets() {
        assert!(closest_pair(&[], &line(&[1.0])).is_none());
        assert!(closest_pair(&line(&[1.0]), &[]).is_none());
    }

    #[test]
    fn min_distance_after_translation() {
        let a = line(&[0.0, 1.0]);
        let b = translated(&line(&[10.0, 11.0]), &Vector3::new(-7.0, 0.0, 0.0));
        assert_eq!(b[0], Point3::new(3.0, 0.0, 0.0));
        assert!((min_distance(&a, &b).unwrap() - 2.0).abs() < 1e-12);
    }
}
