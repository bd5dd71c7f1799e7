//! Axis-aligned box approximations of counterexample sets.
//!
//! Both approximators work over the data variables only; the location
//! discriminator at index 0 is ignored.

use ahash::AHashSet;
use corral_expr::Expr;
use corral_model::{Model, StateSet};
use tracing::debug;

/// A box summary of a state set: its volume and the predicate
/// describing the box. The volume is relative to the domain volume for
/// the bounding box and an absolute point count for the bounded box.
#[derive(Debug)]
pub struct BoxApproximation {
    pub volume: f64,
    pub predicate: Expr,
}

/// Smallest axis-aligned box containing every state in the set
/// (overapproximation). The input set must be non-empty.
pub fn bounding_box(states: &StateSet, model: &Model) -> BoxApproximation {
    assert!(!states.is_empty(), "bounding box of an empty state set");
    let indices: Vec<usize> = model.data_indices().collect();

    let mut lower = vec![i64::MAX; indices.len()];
    let mut upper = vec![i64::MIN; indices.len()];
    for state in states {
        for (k, &idx) in indices.iter().enumerate() {
            let v = state.get(idx);
            lower[k] = lower[k].min(v);
            upper[k] = upper[k].max(v);
        }
    }

    let mut relative = 1.0;
    for (k, &idx) in indices.iter().enumerate() {
        let var = model.var(idx);
        let box_width = (upper[k] - lower[k] + 1) as f64;
        relative *= box_width / var.width() as f64;
    }
    debug!(
        volume = relative,
        "bounding box covers {:.2}% of the domain",
        relative * 100.0
    );

    BoxApproximation {
        volume: relative,
        predicate: Expr::rectangle(&indices, &lower, &upper),
    }
}

/// Largest axis-aligned box fully contained in the set that greedy
/// seed-and-expand finds (underapproximation). The volume is the box's
/// point count; an empty input yields volume 0 and a `false` predicate.
pub fn bounded_box(states: &StateSet, model: &Model) -> BoxApproximation {
    let indices: Vec<usize> = model.data_indices().collect();
    if states.is_empty() || indices.is_empty() {
        return BoxApproximation {
            volume: 0.0,
            predicate: Expr::falsity(),
        };
    }

    // Index the set as data vectors for containment lookups.
    let points: AHashSet<Vec<i64>> = states.iter().map(|s| s.data_values().to_vec()).collect();

    let mut best_volume: u64 = 0;
    let mut best_lower = Vec::new();
    let mut best_upper = Vec::new();

    for seed in states {
        let center = seed.data_values().to_vec();
        let mut lower = center.clone();
        let mut upper = center;

        // Expand one unit per direction until a full sweep makes no
        // progress.
        let mut fixed_point = false;
        while !fixed_point {
            fixed_point = true;
            for dim in 0..lower.len() {
                lower[dim] -= 1;
                if is_bounded(&lower, &upper, &points, model) {
                    fixed_point = false;
                } else {
                    lower[dim] += 1;
                }

                upper[dim] += 1;
                if is_bounded(&lower, &upper, &points, model) {
                    fixed_point = false;
                } else {
                    upper[dim] -= 1;
                }
            }
        }

        let volume: u64 = lower
            .iter()
            .zip(&upper)
            .map(|(lo, hi)| (hi - lo + 1) as u64)
            .product();
        // Strict improvement only: ties go to the first seed found.
        if volume > best_volume {
            best_volume = volume;
            best_lower = lower;
            best_upper = upper;
        }
    }

    debug!(volume = best_volume, "bounded box computed");
    BoxApproximation {
        volume: best_volume as f64,
        predicate: Expr::rectangle(&indices, &best_lower, &best_upper),
    }
}

/// Whether every lattice point of the box is in the set and inside the
/// model domain. Iterates lexicographically, failing fast on the first
/// missing point.
fn is_bounded(
    lower: &[i64],
    upper: &[i64],
    points: &AHashSet<Vec<i64>>,
    model: &Model,
) -> bool {
    for (dim, (lo, hi)) in lower.iter().zip(upper).enumerate() {
        let var = model.var(dim + 1);
        if *lo < var.lower || *hi > var.upper {
            return false;
        }
    }

    let mut current = lower.to_vec();
    loop {
        if !points.contains(&current) {
            return false;
        }
        // Advance to the next lattice point in lexicographic order.
        let mut dim = current.len();
        loop {
            dim -= 1;
            current[dim] += 1;
            if current[dim] <= upper[dim] {
                break;
            }
            current[dim] = lower[dim];
            if dim == 0 {
                // All points visited.
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_model::{Property, StateValues, VarDecl};

    fn model_with_data_vars(dims: usize, lower: i64, upper: i64) -> Model {
        let mut vars = vec![VarDecl {
            name: "loc".into(),
            lower: 0,
            upper: 0,
        }];
        for i in 0..dims {
            vars.push(VarDecl {
                name: format!("x{}", i),
                lower,
                upper,
            });
        }
        Model::new(
            "box".into(),
            vars,
            vec![],
            Property {
                start: Expr::truth(),
                unsafety: Expr::falsity(),
            },
        )
        .unwrap()
    }

    fn set_of(points: &[&[i64]]) -> StateSet {
        points
            .iter()
            .map(|p| {
                let mut values = vec![0];
                values.extend_from_slice(p);
                StateValues::new(values)
            })
            .collect()
    }

    #[test]
    fn test_bounding_box_of_unit_cube() {
        // The 2x2x2 cube of corner points in a [0,3]^3 domain.
        let model = model_with_data_vars(3, 0, 3);
        let states = set_of(&[
            &[0, 0, 0],
            &[0, 0, 1],
            &[0, 1, 0],
            &[0, 1, 1],
            &[1, 0, 0],
            &[1, 0, 1],
            &[1, 1, 0],
            &[1, 1, 1],
        ]);
        let approx = bounding_box(&states, &model);
        assert!((approx.volume - 8.0 / 64.0).abs() < 1e-9);
        // Every input state satisfies the box predicate.
        for state in &states {
            assert!(approx.predicate.holds(state.as_slice()));
        }
        // A point outside the box does not.
        assert!(!approx.predicate.holds(&[0, 2, 0, 0]));
    }

    #[test]
    fn test_bounded_box_of_unit_cube() {
        let model = model_with_data_vars(3, 0, 3);
        let states = set_of(&[
            &[0, 0, 0],
            &[0, 0, 1],
            &[0, 1, 0],
            &[0, 1, 1],
            &[1, 0, 0],
            &[1, 0, 1],
            &[1, 1, 0],
            &[1, 1, 1],
        ]);
        let approx = bounded_box(&states, &model);
        assert_eq!(approx.volume, 8.0);
        for state in &states {
            assert!(approx.predicate.holds(state.as_slice()));
        }
    }

    #[test]
    fn test_bounded_box_with_missing_corner() {
        // (1,1) missing: the greedy expansion cannot claim the full
        // 2x2 square. Every point of the found box must be in the set.
        let model = model_with_data_vars(2, 0, 3);
        let states = set_of(&[&[0, 0], &[0, 1], &[1, 0]]);
        let approx = bounded_box(&states, &model);
        assert!(approx.volume < 4.0);
        // The box predicate implies set membership on the whole grid.
        for a in 0..=3i64 {
            for b in 0..=3i64 {
                if approx.predicate.holds(&[0, a, b]) {
                    assert!(states.contains(&StateValues::new(vec![0, a, b])));
                }
            }
        }
    }

    #[test]
    fn test_bounded_box_respects_domain() {
        // The full domain row: the box may not expand past the bounds.
        let model = model_with_data_vars(1, 2, 4);
        let states = set_of(&[&[2], &[3], &[4]]);
        let approx = bounded_box(&states, &model);
        assert_eq!(approx.volume, 3.0);
        assert!(approx.predicate.holds(&[0, 2]));
        assert!(approx.predicate.holds(&[0, 4]));
        assert!(!approx.predicate.holds(&[0, 5]));
    }

    #[test]
    fn test_bounded_box_of_empty_set() {
        let model = model_with_data_vars(2, 0, 3);
        let approx = bounded_box(&StateSet::new(), &model);
        assert_eq!(approx.volume, 0.0);
        assert!(!approx.predicate.holds(&[0, 0, 0]));
    }
}
