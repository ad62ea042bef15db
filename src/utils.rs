//! Miscellaneous utilities.

use crate::math::{Real, Vector};

/// Trait to compute the orthonormal basis of a vector.
pub trait OrthonormalBasis: Sized {
    /// The type of the array of orthonormal vectors.
    type Basis;
    /// Computes the vectors which, when combined with `self`, form an orthonormal basis.
    fn orthonormal_basis(self) -> Self::Basis;
}

impl OrthonormalBasis for Vector<Real> {
    type Basis = [Vector<Real>; 2];

    // Branchless construction from "Building an Orthonormal Basis, Revisited" (Duff et al.).
    fn orthonormal_basis(self) -> [Vector<Real>; 2] {
        let sign = (1.0 as Real).copysign(self.z);
        let a = -1.0 / (sign + self.z);
        let b = self.x * self.y * a;

        [
            Vector::new(1.0 + sign * self.x * self.x * a, sign * b, -sign * self.x),
            Vector::new(b, sign + self.y * self.y * a, -self.y),
        ]
    }
}

/// Computes the inverse of `val`, or zero if `val` is zero.
#[inline]
pub fn inv(val: Real) -> Real {
    if val == 0.0 {
        0.0
    } else {
        1.0 / val
    }
}

/// Clamps `val` into `[low, high]` without panicking when the interval is empty.
#[inline]
pub(crate) fn clamp(val: Real, low: Real, high: Real) -> Real {
    val.max(low).min(high)
}

#[cfg(test)]
mod test {
    use super::OrthonormalBasis;
    use crate::math::Vector;
    use approx::assert_relative_eq;

    #[test]
    fn orthonormal_basis_is_orthonormal() {
        for dir in [Vector::x(), Vector::y(), -Vector::z(), Vector::new(1.0, 2.0, -3.0)] {
            let n = dir.normalize();
            let [a, b] = n.orthonormal_basis();
            assert_relative_eq!(a.norm(), 1.0, epsilon = 1.0e-5);
            assert_relative_eq!(b.norm(), 1.0, epsilon = 1.0e-5);
            assert_relative_eq!(a.dot(&b), 0.0, epsilon = 1.0e-5);
            assert_relative_eq!(a.dot(&n), 0.0, epsilon = 1.0e-5);
            assert_relative_eq!(b.dot(&n), 0.0, epsilon = 1.0e-5);
        }
    }
}
