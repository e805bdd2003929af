//! Pencil data model
//!
//! This module defines the data model shared by every routine in the crate:
//! the [`Pole`] of a matrix pencil (a generalized eigenvalue, possibly
//! infinite), structural predicates for upper-Hessenberg pencils, pole
//! read-out, and the crate-wide error type [`PencilError`].
//!
//! A rational Krylov pencil is a pair (K, H) of (n+1)-by-n complex matrices
//! that are jointly upper Hessenberg: every entry strictly below the first
//! subdiagonal is zero, which for this shape is the same as saying the
//! trailing n-by-n blocks are upper triangular. Pole j of such a pencil is
//! the ratio H(j+1, j)/K(j+1, j) of the subdiagonal entries, with a vanishing
//! K entry encoding a pole at infinity.

use ndarray::Array2;
use num_complex::Complex64;

/// Tolerance used when classifying a pole read from a pencil as infinite:
/// the K subdiagonal entry is considered zero when its magnitude is below
/// this fraction of the combined magnitude of the H and K entries.
const INFINITE_POLE_TOLERANCE: f64 = 1e-12;

/// A pole of a matrix pencil: a generalized eigenvalue, possibly infinite.
///
/// Poles at infinity arise naturally in rational Krylov decompositions
/// (a polynomial Krylov space is the special case where every pole is
/// infinite), so the point at infinity is a first-class value rather than a
/// floating-point sentinel.
///
/// # Examples
///
/// ```
/// use num_complex::Complex64;
/// use rkpencil_rs::pencil::Pole;
///
/// let a = Pole::from(2.0);
/// let b = Pole::from(Complex64::new(1.0, -3.0));
/// assert!(a.is_finite());
/// assert_eq!(a, Pole::Finite(Complex64::new(2.0, 0.0)));
/// assert!(Pole::Infinite.is_infinite());
/// assert_eq!(b.value(), Some(Complex64::new(1.0, -3.0)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pole {
    /// A finite pole.
    Finite(Complex64),
    /// The pole at infinity.
    Infinite,
}

impl Pole {
    /// Returns true if the pole is finite.
    pub fn is_finite(&self) -> bool {
        matches!(self, Pole::Finite(_))
    }

    /// Returns true if the pole is the point at infinity.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Pole::Infinite)
    }

    /// The finite value of the pole, or `None` for the pole at infinity.
    pub fn value(&self) -> Option<Complex64> {
        match self {
            Pole::Finite(v) => Some(*v),
            Pole::Infinite => None,
        }
    }
}

impl From<f64> for Pole {
    fn from(v: f64) -> Self {
        Pole::Finite(Complex64::new(v, 0.0))
    }
}

impl From<Complex64> for Pole {
    fn from(v: Complex64) -> Self {
        Pole::Finite(v)
    }
}

impl std::fmt::Display for Pole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pole::Finite(v) => write!(f, "{}", v),
            Pole::Infinite => write!(f, "inf"),
        }
    }
}

/// Error type for pencil transformations.
///
/// Every routine in the crate reports failures through this enum. Shape and
/// precondition violations are detected before any computation; numerical
/// failures carry the location (iteration or diagonal position) at which the
/// computation had to be abandoned. No routine returns a partially
/// transformed pencil: a failed call leaves nothing usable behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PencilError {
    /// K and H do not form a conformant (n+1)-by-n pencil
    NotConformant {
        /// Shape of the K matrix as supplied
        k_shape: (usize, usize),
        /// Shape of the H matrix as supplied
        h_shape: (usize, usize),
    },
    /// More target poles were requested than the pencil can hold (k >= n+1)
    TooManyPoles {
        /// Number of poles requested
        requested: usize,
        /// Number of columns (poles) of the pencil
        order: usize,
    },
    /// A matrix passed to the generalized Schur interface is not square
    NotSquare {
        /// Shape of the offending matrix
        shape: (usize, usize),
    },
    /// The two matrices of a square pencil differ in dimension
    DimensionMismatch {
        /// Shape of the A matrix
        a_shape: (usize, usize),
        /// Shape of the B matrix
        b_shape: (usize, usize),
    },
    /// The selection vector does not match the pencil dimension
    SelectionMismatch {
        /// Dimension of the pencil
        expected: usize,
        /// Length of the selection vector
        found: usize,
    },
    /// A matrix passed to reordering is not upper triangular
    NotTriangular {
        /// Row of the first offending entry
        row: usize,
        /// Column of the first offending entry
        col: usize,
    },
    /// The 2-by-2 rotation for a requested pole is undefined at this position
    DegenerateRotation {
        /// Pole-move iteration (0-based) at which the rotation degenerated
        iteration: usize,
    },
    /// The QZ iteration failed to converge
    ConvergenceFailure {
        /// Iteration budget that was exhausted
        iterations: usize,
    },
    /// An eigenvalue swap could not separate numerically coincident poles
    ReorderFailure {
        /// Diagonal position (0-based) of the failed swap
        position: usize,
    },
}

impl std::fmt::Display for PencilError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PencilError::NotConformant { k_shape, h_shape } => write!(
                f,
                "K ({}x{}) and H ({}x{}) do not form an (n+1)-by-n pencil",
                k_shape.0, k_shape.1, h_shape.0, h_shape.1
            ),
            PencilError::TooManyPoles { requested, order } => write!(
                f,
                "{} poles requested for a pencil of order {} (at most {} can be placed)",
                requested, order, order
            ),
            PencilError::NotSquare { shape } => {
                write!(f, "matrix of shape {}x{} is not square", shape.0, shape.1)
            }
            PencilError::DimensionMismatch { a_shape, b_shape } => write!(
                f,
                "pencil matrices have mismatched shapes {}x{} and {}x{}",
                a_shape.0, a_shape.1, b_shape.0, b_shape.1
            ),
            PencilError::SelectionMismatch { expected, found } => write!(
                f,
                "selection vector has length {} but the pencil has dimension {}",
                found, expected
            ),
            PencilError::NotTriangular { row, col } => write!(
                f,
                "matrix is not upper triangular: nonzero entry at ({}, {})",
                row, col
            ),
            PencilError::DegenerateRotation { iteration } => write!(
                f,
                "degenerate local pencil: no rotation achieves the pole requested at iteration {}",
                iteration
            ),
            PencilError::ConvergenceFailure { iterations } => write!(
                f,
                "QZ iteration did not converge within {} iterations",
                iterations
            ),
            PencilError::ReorderFailure { position } => write!(
                f,
                "eigenvalue swap at diagonal position {} failed: poles are numerically coincident",
                position
            ),
        }
    }
}

impl std::error::Error for PencilError {}

/// Validates that (K, H) is a conformant (n+1)-by-n pencil and returns n.
///
/// # Arguments
///
/// * `k` - The K matrix of the pencil
/// * `h` - The H matrix of the pencil
///
/// # Returns
///
/// * `Ok(n)` - The order (column count) of the pencil, n >= 1
/// * `Err(PencilError::NotConformant)` - If the shapes differ or are not
///   (n+1)-by-n
pub fn pencil_order(k: &Array2<Complex64>, h: &Array2<Complex64>) -> Result<usize, PencilError> {
    let kd = k.dim();
    let hd = h.dim();
    if kd != hd || kd.1 == 0 || kd.0 != kd.1 + 1 {
        return Err(PencilError::NotConformant {
            k_shape: kd,
            h_shape: hd,
        });
    }
    Ok(kd.1)
}

/// Tests whether a matrix is upper Hessenberg within a tolerance.
///
/// A matrix is upper Hessenberg when every entry strictly below the first
/// subdiagonal vanishes. Entries of magnitude at most `tol` count as zero;
/// pass `tol = 0.0` for an exact structural test.
///
/// # Examples
///
/// ```
/// use ndarray::arr2;
/// use num_complex::Complex64;
/// use rkpencil_rs::pencil::is_upper_hessenberg;
///
/// let m = arr2(&[[1.0, 2.0], [3.0, 4.0], [0.0, 5.0]]).mapv(|x| Complex64::new(x, 0.0));
/// assert!(is_upper_hessenberg(&m, 0.0));
///
/// let m = arr2(&[[1.0, 2.0], [3.0, 4.0], [6.0, 5.0]]).mapv(|x| Complex64::new(x, 0.0));
/// assert!(!is_upper_hessenberg(&m, 0.0));
/// ```
pub fn is_upper_hessenberg(m: &Array2<Complex64>, tol: f64) -> bool {
    let (rows, cols) = m.dim();
    for i in 0..rows {
        for j in 0..cols {
            if i > j + 1 && m[[i, j]].norm() > tol {
                return false;
            }
        }
    }
    true
}

/// Reads the current poles of an upper-Hessenberg pencil.
///
/// Pole j (0-based) of the pencil is the ratio `H[j+1, j] / K[j+1, j]` of
/// the subdiagonal entries. A pole whose K entry is negligible relative to
/// the pair of entries is reported as [`Pole::Infinite`].
///
/// # Arguments
///
/// * `k` - The K matrix, (n+1)-by-n
/// * `h` - The H matrix, (n+1)-by-n
///
/// # Returns
///
/// * `Ok(poles)` - The n poles read top to bottom
/// * `Err(PencilError::NotConformant)` - If the shapes are invalid
///
/// # Examples
///
/// ```
/// use ndarray::arr2;
/// use num_complex::Complex64;
/// use rkpencil_rs::pencil::{pencil_poles, Pole};
///
/// let h = arr2(&[[1.0, 2.0], [4.0, 1.0], [0.0, 6.0]]).mapv(|x| Complex64::new(x, 0.0));
/// let k = arr2(&[[1.0, 0.0], [2.0, 1.0], [0.0, 0.0]]).mapv(|x| Complex64::new(x, 0.0));
///
/// let poles = pencil_poles(&k, &h).unwrap();
/// assert_eq!(poles[0], Pole::from(2.0));
/// assert_eq!(poles[1], Pole::Infinite);
/// ```
pub fn pencil_poles(k: &Array2<Complex64>, h: &Array2<Complex64>) -> Result<Vec<Pole>, PencilError> {
    let n = pencil_order(k, h)?;
    let mut poles = Vec::with_capacity(n);
    for j in 0..n {
        let hv = h[[j + 1, j]];
        let kv = k[[j + 1, j]];
        if kv.norm() <= INFINITE_POLE_TOLERANCE * (hv.norm() + kv.norm()) {
            poles.push(Pole::Infinite);
        } else {
            poles.push(Pole::Finite(hv / kv));
        }
    }
    Ok(poles)
}
