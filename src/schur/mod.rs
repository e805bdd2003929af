//! Generalized Schur decomposition and eigenvalue reordering
//!
//! The pole-moving algorithm consumes a generalized Schur primitive in two
//! modes: a one-shot joint triangularization of a square pencil
//! (*decomposition*) and a rearrangement of the diagonal of an already
//! triangular pencil (*reordering*). Both are expressed through the
//! [`GeneralizedSchur`] trait so the transformation core stays independent
//! of any particular backend; a LAPACK-backed implementation can be dropped
//! in without touching the callers.
//!
//! The crate ships [`GivensQz`], a self-contained reference engine built
//! from the plane rotations in [`crate::rotation`]: Givens QR of the B
//! matrix, Hessenberg-triangular reduction, a single-shift complex QZ
//! iteration with deflation of both converged and infinite eigenvalues, and
//! a direct adjacent-swap reordering scheme.
//!
//! Conventions: for both modes the returned factors satisfy
//! `A' = Q * A * Z` and `B' = Q * B * Z` with Q and Z unitary, so factors
//! compose by plain multiplication when accumulated across calls.

use ndarray::Array2;
use num_complex::Complex64;
use num_traits::Zero;

use crate::pencil::{PencilError, Pole};
use crate::rotation::{rotate_cols, rotate_rows, zeroing_rotation};

/// Iteration budget factor for the QZ loop: at most `30 * n` shifted sweeps.
const MAX_ITER_FACTOR: usize = 30;

/// Result of a generalized Schur decomposition or reordering.
///
/// The factors satisfy `a = q * a_in * z` and `b = q * b_in * z` with `q`
/// and `z` unitary; `a` and `b` are upper triangular.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneralizedSchurResult {
    /// Left unitary factor
    pub q: Array2<Complex64>,
    /// Right unitary factor
    pub z: Array2<Complex64>,
    /// Transformed A matrix, upper triangular
    pub a: Array2<Complex64>,
    /// Transformed B matrix, upper triangular
    pub b: Array2<Complex64>,
}

/// The generalized Schur primitive consumed by the pole mover.
///
/// Implementations must use the convention `A' = Q·A·Z` (the left factor is
/// applied directly, not conjugate-transposed), must keep relative order
/// among unselected eigenvalues in [`reorder`](GeneralizedSchur::reorder),
/// and must fail rather than return partially transformed matrices.
pub trait GeneralizedSchur {
    /// Jointly triangularizes a square pencil (A, B).
    ///
    /// # Arguments
    ///
    /// * `a` - Square complex matrix
    /// * `b` - Square complex matrix of the same dimension
    ///
    /// # Returns
    ///
    /// * `Ok(result)` - Unitary Q, Z and upper triangular A' = Q·A·Z,
    ///   B' = Q·B·Z; the generalized eigenvalues of (A, B) are the diagonal
    ///   ratios A'(j,j)/B'(j,j)
    /// * `Err(_)` - Shape violation or convergence failure
    fn decompose(
        &self,
        a: &Array2<Complex64>,
        b: &Array2<Complex64>,
    ) -> Result<GeneralizedSchurResult, PencilError>;

    /// Reorders the diagonal of an upper triangular pencil.
    ///
    /// Moves the generalized eigenvalues flagged in `select` to the leading
    /// diagonal positions while preserving the relative order within both
    /// the selected and the unselected group.
    ///
    /// # Arguments
    ///
    /// * `a` - Upper triangular complex matrix
    /// * `b` - Upper triangular complex matrix of the same dimension
    /// * `select` - One flag per diagonal position; `true` marks an
    ///   eigenvalue to move to the front
    ///
    /// # Returns
    ///
    /// * `Ok(result)` - Reordered triangular pencil and the unitary factors
    ///   that produced it
    /// * `Err(PencilError::ReorderFailure)` - A required swap involves
    ///   numerically indistinguishable eigenvalues
    /// * `Err(_)` - Shape or triangularity violation
    fn reorder(
        &self,
        a: &Array2<Complex64>,
        b: &Array2<Complex64>,
        select: &[bool],
    ) -> Result<GeneralizedSchurResult, PencilError>;
}

/// Reads the generalized eigenvalues off the diagonal of a triangular pencil.
///
/// Position j carries the eigenvalue `a[j,j] / b[j,j]`, reported as
/// [`Pole::Infinite`] when the `b` entry is negligible relative to the pair.
/// Only the diagonals are inspected; the caller is responsible for the
/// matrices actually being triangular.
pub fn generalized_eigenvalues(
    a: &Array2<Complex64>,
    b: &Array2<Complex64>,
) -> Result<Vec<Pole>, PencilError> {
    let n = pair_order(a, b)?;
    let mut eigs = Vec::with_capacity(n);
    for j in 0..n {
        let av = a[[j, j]];
        let bv = b[[j, j]];
        if bv.norm() <= 1e-12 * (av.norm() + bv.norm()) {
            eigs.push(Pole::Infinite);
        } else {
            eigs.push(Pole::Finite(av / bv));
        }
    }
    Ok(eigs)
}

/// Reference generalized Schur engine built from Givens rotations.
///
/// Decomposition runs the Moler-Stewart style pipeline: reduce B to
/// triangular form, reduce A to upper Hessenberg while keeping B triangular,
/// then drive the A subdiagonal to zero with single-shift QZ sweeps, using
/// the eigenvalue of the trailing 2-by-2 pencil closer to the bottom
/// diagonal ratio as shift. A vanishing diagonal of B (an infinite
/// eigenvalue) is chased to the bottom of the active window and deflated
/// there. Reordering performs direct swaps of adjacent diagonal pairs, each
/// validated by a residual test before it is committed.
///
/// # References
///
/// - [1] Moler, C.B. and Stewart, G.W. "An Algorithm for Generalized Matrix
///   Eigenvalue Problems", SIAM J. Numer. Anal. 10 (1973)
/// - [2] Van Dooren, P. "A Generalized Eigenvalue Approach for Solving
///   Riccati Equations", SIAM J. Sci. Stat. Comput. 2 (1981)
#[derive(Clone, Copy, Debug, Default)]
pub struct GivensQz;

impl GeneralizedSchur for GivensQz {
    fn decompose(
        &self,
        a: &Array2<Complex64>,
        b: &Array2<Complex64>,
    ) -> Result<GeneralizedSchurResult, PencilError> {
        let n = pair_order(a, b)?;
        let mut s = a.clone();
        let mut t = b.clone();
        let mut q = Array2::<Complex64>::eye(n);
        let mut z = Array2::<Complex64>::eye(n);

        if n > 1 {
            triangularize_b(&mut s, &mut t, &mut q);
            hessenberg_triangular(&mut s, &mut t, &mut q, &mut z);
            qz_iterate(&mut s, &mut t, &mut q, &mut z)?;
        }

        Ok(GeneralizedSchurResult { q, z, a: s, b: t })
    }

    fn reorder(
        &self,
        a: &Array2<Complex64>,
        b: &Array2<Complex64>,
        select: &[bool],
    ) -> Result<GeneralizedSchurResult, PencilError> {
        let n = pair_order(a, b)?;
        if select.len() != n {
            return Err(PencilError::SelectionMismatch {
                expected: n,
                found: select.len(),
            });
        }
        ensure_upper_triangular(a)?;
        ensure_upper_triangular(b)?;

        let mut s = a.clone();
        let mut t = b.clone();
        let mut q = Array2::<Complex64>::eye(n);
        let mut z = Array2::<Complex64>::eye(n);

        // Bubble every selected eigenvalue up to the first free leading
        // position; relative order inside both groups is preserved because
        // only adjacent transpositions are used.
        let mut target = 0usize;
        for j in 0..n {
            if select[j] {
                for i in (target..j).rev() {
                    swap_adjacent(&mut s, &mut t, &mut q, &mut z, i)?;
                }
                target += 1;
            }
        }

        Ok(GeneralizedSchurResult { q, z, a: s, b: t })
    }
}

/// Validates a square pencil pair and returns its dimension.
fn pair_order(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Result<usize, PencilError> {
    let ad = a.dim();
    let bd = b.dim();
    if ad.0 != ad.1 {
        return Err(PencilError::NotSquare { shape: ad });
    }
    if bd.0 != bd.1 {
        return Err(PencilError::NotSquare { shape: bd });
    }
    if ad != bd {
        return Err(PencilError::DimensionMismatch {
            a_shape: ad,
            b_shape: bd,
        });
    }
    Ok(ad.0)
}

/// Rejects matrices with below-diagonal entries beyond rounding level.
fn ensure_upper_triangular(m: &Array2<Complex64>) -> Result<(), PencilError> {
    let n = m.nrows();
    let scale = m.iter().map(|x| x.norm()).fold(0.0, f64::max);
    let tol = scale * (n as f64) * f64::EPSILON;
    for j in 0..n {
        for i in (j + 1)..n {
            if m[[i, j]].norm() > tol {
                return Err(PencilError::NotTriangular { row: i, col: j });
            }
        }
    }
    Ok(())
}

/// Givens QR from the left: makes T upper triangular, carries A and Q along.
fn triangularize_b(s: &mut Array2<Complex64>, t: &mut Array2<Complex64>, q: &mut Array2<Complex64>) {
    let n = t.nrows();
    for j in 0..n {
        for i in ((j + 1)..n).rev() {
            let (c, r) = zeroing_rotation(t[[i - 1, j]], t[[i, j]]);
            rotate_rows(t, i - 1, i, j, n, c, r);
            rotate_rows(s, i - 1, i, 0, n, c, r);
            rotate_rows(q, i - 1, i, 0, n, c, r);
            t[[i, j]] = Complex64::zero();
        }
    }
}

/// Reduces A to upper Hessenberg form while keeping T upper triangular.
///
/// Each entry of A below the first subdiagonal is annihilated by a row
/// rotation; the fill this creates on T's subdiagonal is immediately removed
/// by a column rotation, which cannot disturb the zeros already produced
/// in A.
fn hessenberg_triangular(
    s: &mut Array2<Complex64>,
    t: &mut Array2<Complex64>,
    q: &mut Array2<Complex64>,
    z: &mut Array2<Complex64>,
) {
    let n = s.nrows();
    if n < 3 {
        return;
    }
    for j in 0..(n - 2) {
        for i in ((j + 2)..n).rev() {
            let (c, r) = zeroing_rotation(s[[i - 1, j]], s[[i, j]]);
            rotate_rows(s, i - 1, i, j, n, c, r);
            rotate_rows(t, i - 1, i, i - 1, n, c, r);
            rotate_rows(q, i - 1, i, 0, n, c, r);
            s[[i, j]] = Complex64::zero();

            let (c2, r2) = zeroing_rotation(t[[i, i]], t[[i, i - 1]]);
            rotate_cols(t, i - 1, i, 0, i + 1, c2, r2);
            rotate_cols(s, i - 1, i, 0, n, c2, r2);
            rotate_cols(z, i - 1, i, 0, n, c2, r2);
            t[[i, i - 1]] = Complex64::zero();
        }
    }
}

/// Single-shift QZ iteration on a Hessenberg/triangular pencil.
///
/// The active window `[ilo, ihi)` is rediscovered every pass from the zero
/// pattern of the A subdiagonal. Converged eigenvalues deflate at the
/// bottom; a vanished T diagonal is chased to the bottom of the window and
/// deflated there as an infinite eigenvalue.
fn qz_iterate(
    s: &mut Array2<Complex64>,
    t: &mut Array2<Complex64>,
    q: &mut Array2<Complex64>,
    z: &mut Array2<Complex64>,
) -> Result<(), PencilError> {
    let n = s.nrows();
    let eps = f64::EPSILON;
    let budget = MAX_ITER_FACTOR * n;
    let mut iters = 0usize;
    let mut ihi = n;

    while ihi > 1 {
        // Negligible subdiagonal entries become exact zeros.
        for i in 1..ihi {
            let tol = eps * (s[[i - 1, i - 1]].norm() + s[[i, i]].norm());
            if s[[i, i - 1]].norm() <= tol {
                s[[i, i - 1]] = Complex64::zero();
            }
        }
        if s[[ihi - 1, ihi - 2]] == Complex64::zero() {
            ihi -= 1;
            continue;
        }

        let mut ilo = ihi - 1;
        while ilo > 0 && s[[ilo, ilo - 1]] != Complex64::zero() {
            ilo -= 1;
        }

        // Infinite eigenvalue: a vanished T diagonal inside the window.
        let tnorm = t.iter().map(|x| x.norm()).fold(0.0, f64::max);
        let zero_diag = (ilo..ihi).find(|&j| t[[j, j]].norm() <= eps * tnorm);
        if let Some(jz) = zero_diag {
            deflate_infinite(s, t, q, z, ilo, ihi, jz);
            ihi -= 1;
            continue;
        }

        iters += 1;
        if iters > budget {
            return Err(PencilError::ConvergenceFailure { iterations: budget });
        }

        let shift = if iters % 10 == 0 {
            exceptional_shift(s, t, ihi)
        } else {
            wilkinson_shift(s, t, ihi)
        };
        qz_sweep(s, t, q, z, ilo, ihi, shift);
    }
    Ok(())
}

/// Chases a zero T diagonal from position `jz` to the bottom of the window
/// and deflates the infinite eigenvalue at `ihi - 1`.
///
/// Each chase step uses three rotations: a row rotation that annihilates
/// the next T diagonal entry, a column rotation that removes the stray
/// entry this leaves below A's subdiagonal, and a column rotation that
/// annihilates A's subdiagonal entry itself. The last one refills the
/// vacated T diagonal from the superdiagonal, so the zero genuinely moves
/// down instead of leaving singular positions behind, and on the final
/// step it splits the window just above the infinite eigenvalue.
fn deflate_infinite(
    s: &mut Array2<Complex64>,
    t: &mut Array2<Complex64>,
    q: &mut Array2<Complex64>,
    z: &mut Array2<Complex64>,
    ilo: usize,
    ihi: usize,
    jz: usize,
) {
    let n = s.nrows();
    t[[jz, jz]] = Complex64::zero();

    for j in jz..(ihi - 1) {
        let (c, r) = zeroing_rotation(t[[j, j + 1]], t[[j + 1, j + 1]]);
        rotate_rows(t, j, j + 1, j + 1, n, c, r);
        t[[j + 1, j + 1]] = Complex64::zero();
        let slo = if j > ilo { j - 1 } else { j };
        rotate_rows(s, j, j + 1, slo, n, c, r);
        rotate_rows(q, j, j + 1, 0, n, c, r);

        if j > ilo {
            // Stray entry below A's subdiagonal; T rows j and below are
            // zero in both touched columns, so T is unaffected.
            let (c2, r2) = zeroing_rotation(s[[j + 1, j]], s[[j + 1, j - 1]]);
            rotate_cols(s, j - 1, j, 0, j + 2, c2, r2);
            rotate_cols(t, j - 1, j, 0, j + 1, c2, r2);
            rotate_cols(z, j - 1, j, 0, n, c2, r2);
            s[[j + 1, j - 1]] = Complex64::zero();
        }

        let (c3, r3) = zeroing_rotation(s[[j + 1, j + 1]], s[[j + 1, j]]);
        rotate_cols(s, j, j + 1, 0, (j + 3).min(n), c3, r3);
        rotate_cols(t, j, j + 1, 0, j + 2, c3, r3);
        rotate_cols(z, j, j + 1, 0, n, c3, r3);
        s[[j + 1, j]] = Complex64::zero();
    }

    if jz == ihi - 1 {
        // Zero already at the bottom: split it off directly.
        let (c, r) = zeroing_rotation(s[[ihi - 1, ihi - 1]], s[[ihi - 1, ihi - 2]]);
        rotate_cols(s, ihi - 2, ihi - 1, 0, ihi, c, r);
        rotate_cols(t, ihi - 2, ihi - 1, 0, ihi, c, r);
        rotate_cols(z, ihi - 2, ihi - 1, 0, n, c, r);
        s[[ihi - 1, ihi - 2]] = Complex64::zero();
    }
}

/// Shift from the trailing 2-by-2 pencil: the generalized eigenvalue closer
/// to the bottom diagonal ratio.
fn wilkinson_shift(s: &Array2<Complex64>, t: &Array2<Complex64>, ihi: usize) -> Complex64 {
    let p = ihi - 2;
    let w = ihi - 1;
    let a11 = s[[p, p]];
    let a12 = s[[p, w]];
    let a21 = s[[w, p]];
    let a22 = s[[w, w]];
    let b11 = t[[p, p]];
    let b12 = t[[p, w]];
    let b22 = t[[w, w]];

    // det(A2 - lambda*B2) = alpha*lambda^2 - beta*lambda + gamma
    let alpha = b11 * b22;
    let beta = a11 * b22 + a22 * b11 - a21 * b12;
    let gamma = a11 * a22 - a12 * a21;

    let disc = (beta * beta - 4.0 * alpha * gamma).sqrt();
    let d1 = beta + disc;
    let d2 = beta - disc;
    let dd = if d1.norm() >= d2.norm() { d1 } else { d2 };

    let target = a22 / b22;
    if dd.norm() == 0.0 || alpha.norm() == 0.0 {
        return target;
    }
    let lam1 = dd / (2.0 * alpha);
    let lam2 = 2.0 * gamma / dd;
    if (lam1 - target).norm() <= (lam2 - target).norm() {
        lam1
    } else {
        lam2
    }
}

/// Ad hoc shift used every tenth sweep to break symmetric stagnation.
fn exceptional_shift(s: &Array2<Complex64>, t: &Array2<Complex64>, ihi: usize) -> Complex64 {
    let mut w = s[[ihi - 1, ihi - 2]].norm();
    if ihi >= 3 {
        w += s[[ihi - 2, ihi - 3]].norm();
    }
    Complex64::new(w, 0.0) / t[[ihi - 1, ihi - 1]]
}

/// One implicit shifted sweep: create the bulge at the top of the window and
/// chase it off the bottom.
fn qz_sweep(
    s: &mut Array2<Complex64>,
    t: &mut Array2<Complex64>,
    q: &mut Array2<Complex64>,
    z: &mut Array2<Complex64>,
    ilo: usize,
    ihi: usize,
    shift: Complex64,
) {
    let n = s.nrows();

    let f = s[[ilo, ilo]] - shift * t[[ilo, ilo]];
    let g = s[[ilo + 1, ilo]];
    let (c, r) = zeroing_rotation(f, g);
    rotate_rows(s, ilo, ilo + 1, ilo, n, c, r);
    rotate_rows(t, ilo, ilo + 1, ilo, n, c, r);
    rotate_rows(q, ilo, ilo + 1, 0, n, c, r);

    for k in ilo..(ihi - 1) {
        // Remove the T subdiagonal fill at (k+1, k) from the right; this
        // pushes the bulge in A down to (k+2, k).
        let (c2, r2) = zeroing_rotation(t[[k + 1, k + 1]], t[[k + 1, k]]);
        rotate_cols(t, k, k + 1, 0, k + 2, c2, r2);
        rotate_cols(s, k, k + 1, 0, (k + 3).min(n), c2, r2);
        rotate_cols(z, k, k + 1, 0, n, c2, r2);
        t[[k + 1, k]] = Complex64::zero();

        if k + 2 < ihi {
            let (c3, r3) = zeroing_rotation(s[[k + 1, k]], s[[k + 2, k]]);
            rotate_rows(s, k + 1, k + 2, k, n, c3, r3);
            rotate_rows(t, k + 1, k + 2, k + 1, n, c3, r3);
            rotate_rows(q, k + 1, k + 2, 0, n, c3, r3);
            s[[k + 2, k]] = Complex64::zero();
        }
    }
}

/// Swaps the generalized eigenvalues at diagonal positions `i` and `i+1` of
/// an upper triangular pencil by one column and one row rotation.
///
/// The column rotation maps the generalized eigenvector of the trailing
/// eigenvalue onto the first coordinate; the images of that vector under
/// both matrices are then parallel, so a single row rotation restores
/// triangularity. The swap is committed only if both subdiagonal residuals
/// collapse to rounding level; otherwise the eigenvalues are numerically
/// indistinguishable and the swap is rejected.
fn swap_adjacent(
    s: &mut Array2<Complex64>,
    t: &mut Array2<Complex64>,
    q: &mut Array2<Complex64>,
    z: &mut Array2<Complex64>,
    i: usize,
) -> Result<(), PencilError> {
    let n = s.nrows();
    let s11 = s[[i, i]];
    let s12 = s[[i, i + 1]];
    let s22 = s[[i + 1, i + 1]];
    let t11 = t[[i, i]];
    let t12 = t[[i, i + 1]];
    let t22 = t[[i + 1, i + 1]];
    let scale = s11.norm() + s12.norm() + s22.norm() + t11.norm() + t12.norm() + t22.norm();

    // Kernel direction of s22*T2 - t22*S2: the eigenvector belonging to the
    // trailing eigenvalue of the 2-by-2 block pair.
    let ac = s22 * t11 - t22 * s11;
    let bc = s22 * t12 - t22 * s12;
    let x1 = -bc;
    let x2 = ac;
    let xn = x1.norm().hypot(x2.norm());
    if xn <= 4.0 * f64::EPSILON * scale * scale {
        return Err(PencilError::ReorderFailure { position: i });
    }

    let (c, r) = if x1.norm() == 0.0 {
        (0.0, x2.conj() / x2.norm())
    } else {
        let ph = x1 / x1.norm();
        (x1.norm() / xn, x2.conj() * ph / xn)
    };
    rotate_cols(s, i, i + 1, 0, i + 2, c, r);
    rotate_cols(t, i, i + 1, 0, i + 2, c, r);
    rotate_cols(z, i, i + 1, 0, n, c, r);

    // The first columns of both blocks are now parallel; eliminate the
    // subdiagonal with whichever carries more weight.
    let (fs, gs) = (s[[i, i]], s[[i + 1, i]]);
    let (ft, gt) = (t[[i, i]], t[[i + 1, i]]);
    let (c2, r2) = if fs.norm().hypot(gs.norm()) >= ft.norm().hypot(gt.norm()) {
        zeroing_rotation(fs, gs)
    } else {
        zeroing_rotation(ft, gt)
    };
    rotate_rows(s, i, i + 1, i, n, c2, r2);
    rotate_rows(t, i, i + 1, i, n, c2, r2);
    rotate_rows(q, i, i + 1, 0, n, c2, r2);

    let residual = s[[i + 1, i]].norm().max(t[[i + 1, i]].norm());
    if residual > 1e3 * f64::EPSILON * scale {
        return Err(PencilError::ReorderFailure { position: i });
    }
    s[[i + 1, i]] = Complex64::zero();
    t[[i + 1, i]] = Complex64::zero();
    Ok(())
}
