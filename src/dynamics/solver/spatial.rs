//! Small dense linear algebra on spatial matrices.

use crate::math::{Matrix, Real, SpatialMatrix, SPATIAL_DIM};

/// The spatial mass matrix `diag(m, m, m, I)` of a body.
pub(crate) fn body_mass_matrix(mass: Real, inertia: &Matrix<Real>) -> SpatialMatrix<Real> {
    let mut result = SpatialMatrix::zeros();
    result[(0, 0)] = mass;
    result[(1, 1)] = mass;
    result[(2, 2)] = mass;
    result.fixed_view_mut::<3, 3>(3, 3).copy_from(inertia);
    result
}

/// Inverts the leading `dim × dim` block of `m` with a Gauss-Jordan elimination.
///
/// The entries of the result outside of that block are zero. Returns `None` if a pivot is
/// smaller than `tolerance` times the largest entry of the block.
pub(crate) fn inverse(
    m: &SpatialMatrix<Real>,
    dim: usize,
    tolerance: Real,
) -> Option<SpatialMatrix<Real>> {
    let dim = dim.min(SPATIAL_DIM);
    let mut a = SpatialMatrix::zeros();
    let mut inv = SpatialMatrix::zeros();
    let mut scale: Real = 0.0;

    for i in 0..dim {
        inv[(i, i)] = 1.0;
        for j in 0..dim {
            a[(i, j)] = m[(i, j)];
            scale = scale.max(m[(i, j)].abs());
        }
    }

    if dim == 0 {
        return Some(inv);
    }

    if scale == 0.0 || !scale.is_finite() {
        return None;
    }

    let threshold = scale * tolerance;

    for k in 0..dim {
        let mut pivot_row = k;
        for i in k + 1..dim {
            if a[(i, k)].abs() > a[(pivot_row, k)].abs() {
                pivot_row = i;
            }
        }

        if a[(pivot_row, k)].abs() <= threshold {
            return None;
        }

        if pivot_row != k {
            a.swap_rows(pivot_row, k);
            inv.swap_rows(pivot_row, k);
        }

        let inv_pivot = 1.0 / a[(k, k)];
        for j in 0..dim {
            a[(k, j)] *= inv_pivot;
            inv[(k, j)] *= inv_pivot;
        }

        for i in 0..dim {
            let factor = a[(i, k)];
            if i != k && factor != 0.0 {
                for j in 0..dim {
                    a[(i, j)] -= factor * a[(k, j)];
                    inv[(i, j)] -= factor * inv[(k, j)];
                }
            }
        }
    }

    Some(inv)
}
