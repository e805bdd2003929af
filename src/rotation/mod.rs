//! Plane rotations
//!
//! This module provides the unitary 2-by-2 plane rotations the pencil
//! transformations are built from: the pole-targeting rotation that maps a
//! local generalized eigenvalue ratio to a prescribed value, the standard
//! zeroing (Givens) rotation, and in-place row/column appliers that operate
//! over explicit index ranges so no full-matrix temporaries are created.
//!
//! Throughout the crate a rotation is a pair `(c, s)` with `c` real and
//! nonnegative and `c^2 + |s|^2 = 1`, representing the unitary matrix
//!
//! ```text
//!     G = [ c        -s ]
//!         [ conj(s)   c ]
//! ```
//!
//! applied to a pair of rows from the left or to a pair of columns from the
//! right.

use ndarray::Array2;
use num_complex::Complex64;

use crate::pencil::Pole;

/// Default relative tolerance for deciding that a requested pole already
/// equals the pole present at the working position (see [`pole_rotation`]).
///
/// The comparison is `|h1 - xi*k1| <= tol * (|h1| + |xi*k1|)`; the default
/// of 1e-12 (about 1e4 times machine epsilon) leaves headroom for the
/// rounding accumulated by earlier rotations. Exact floating-point equality
/// is never required.
pub const DEFAULT_MATCH_TOL: f64 = 1e-12;

/// Computes the plane rotation that realizes a requested pole.
///
/// Given the leading entries h = (h1, h2) and k = (k1, k2) of the first
/// column of the working H and K matrices, finds `(c, s)` such that the
/// rotation G above satisfies
///
/// ```text
///     (G*h)[1] / (G*k)[1] = xi
/// ```
///
/// i.e. after applying G to the top two rows, the pencil's leading
/// subdiagonal ratio equals the requested pole.
///
/// # Arguments
///
/// * `h` - First two entries of column 1 of the working H
/// * `k` - First two entries of column 1 of the working K
/// * `xi` - Requested pole, finite or infinite
/// * `tol` - Relative tolerance of the already-equal test; see
///   [`DEFAULT_MATCH_TOL`]
///
/// # Returns
///
/// * `Some((c, s))` - Rotation coefficients, `c` real and nonnegative,
///   `c^2 + |s|^2 = 1`
/// * `None` - The local pencil is degenerate (h1 and k1 both vanish), so no
///   rotation can realize the request
///
/// # Algorithm
///
/// An infinite target swaps the roles of h and k and recurses with target
/// zero: driving the K component to zero is exactly a pole at infinity.
/// When the ratio h1/k1 already equals the target within `tol`, the fixed
/// swap rotation `(c, s) = (0, 1)` is returned, which moves the matching
/// ratio into the subdiagonal slot without blending. Otherwise the unique
/// blending rotation (up to global phase) is
///
/// ```text
///     t = (xi*k2 - h2) / (h1 - xi*k1),   c = 1/sqrt(1 + |t|^2),   s = conj(t)*c
/// ```
///
/// # Examples
///
/// ```
/// use num_complex::Complex64;
/// use rkpencil_rs::pencil::Pole;
/// use rkpencil_rs::rotation::{pole_rotation, DEFAULT_MATCH_TOL};
///
/// let h = (Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0));
/// let k = (Complex64::new(3.0, 0.0), Complex64::new(1.0, 0.0));
/// let xi = Pole::from(-0.5);
///
/// let (c, s) = pole_rotation(h, k, xi, DEFAULT_MATCH_TOL).unwrap();
///
/// // Second component of G*h over second component of G*k equals xi.
/// let gh2 = s.conj() * h.0 + c * h.1;
/// let gk2 = s.conj() * k.0 + c * k.1;
/// assert!((gh2 / gk2 - Complex64::new(-0.5, 0.0)).norm() < 1e-14);
/// assert!((c * c + s.norm_sqr() - 1.0).abs() < 1e-14);
/// ```
pub fn pole_rotation(
    h: (Complex64, Complex64),
    k: (Complex64, Complex64),
    xi: Pole,
    tol: f64,
) -> Option<(f64, Complex64)> {
    let target = match xi {
        // A pole at infinity is a zero of the K component: swap roles and
        // aim for zero.
        Pole::Infinite => return pole_rotation(k, h, Pole::from(0.0), tol),
        Pole::Finite(x) => x,
    };
    let (h1, h2) = h;
    let (k1, k2) = k;

    let denom = h1 - target * k1;
    let scale = h1.norm() + (target * k1).norm();
    if denom.norm() <= tol * scale {
        if h1.norm() + k1.norm() == 0.0 {
            // 0/0 at the working position: structurally undefined.
            return None;
        }
        // The requested pole is already present; a pure swap suffices.
        return Some((0.0, Complex64::new(1.0, 0.0)));
    }

    let t = (target * k2 - h2) / denom;
    let c = 1.0 / (1.0 + t.norm_sqr()).sqrt();
    let s = t.conj() * c;
    Some((c, s))
}

/// Computes the Givens rotation annihilating the second entry of a pair.
///
/// Returns `(c, s)` such that the rotation G above maps the column pair
/// `(f, g)` to `(r, 0)`: `conj(s)*f + c*g = 0`. The same coefficients, fed
/// to [`rotate_cols`] with `g` in the first column of the pair and `f` in
/// the second, annihilate the `g` entry from the right.
///
/// The zero cases follow the usual conventions: `g = 0` yields the identity
/// rotation and `f = 0` yields a pure swap with unit modulus `s`.
pub fn zeroing_rotation(f: Complex64, g: Complex64) -> (f64, Complex64) {
    let ga = g.norm();
    if ga == 0.0 {
        return (1.0, Complex64::new(0.0, 0.0));
    }
    let fa = f.norm();
    if fa == 0.0 {
        return (0.0, -g.conj() / ga);
    }
    let d = fa.hypot(ga);
    let c = fa / d;
    let s = -(f * g.conj()) / (d * fa);
    (c, s)
}

/// Applies a rotation to two rows of a matrix, in place.
///
/// Rows `i1` and `i2` over the column range `lo..hi` are overwritten with
///
/// ```text
///     row_i1 <- c*row_i1 - s*row_i2
///     row_i2 <- conj(s)*row_i1 + c*row_i2
/// ```
///
/// which is left multiplication by the rotation G extended as the identity
/// elsewhere.
pub fn rotate_rows(
    m: &mut Array2<Complex64>,
    i1: usize,
    i2: usize,
    lo: usize,
    hi: usize,
    c: f64,
    s: Complex64,
) {
    for j in lo..hi {
        let a = m[[i1, j]];
        let b = m[[i2, j]];
        m[[i1, j]] = c * a - s * b;
        m[[i2, j]] = s.conj() * a + c * b;
    }
}

/// Applies a rotation to two columns of a matrix, in place.
///
/// Columns `j1` and `j2` over the row range `lo..hi` are overwritten with
///
/// ```text
///     col_j1 <- c*col_j1 + conj(s)*col_j2
///     col_j2 <- -s*col_j1 + c*col_j2
/// ```
///
/// which is right multiplication by the same rotation G.
pub fn rotate_cols(
    m: &mut Array2<Complex64>,
    j1: usize,
    j2: usize,
    lo: usize,
    hi: usize,
    c: f64,
    s: Complex64,
) {
    for i in lo..hi {
        let a = m[[i, j1]];
        let b = m[[i, j2]];
        m[[i, j1]] = c * a + s.conj() * b;
        m[[i, j2]] = -s * a + c * b;
    }
}
