//! Pole relocation
//!
//! This module implements the pencil transformation this crate exists for:
//! given a rational Krylov pencil (K, H) and a list of target poles, produce
//! an equivalent pencil whose leading poles are the requested ones, together
//! with the unitary transformations that connect the two.
//!
//! The entry points are [`move_poles`] (default engine) and
//! [`move_poles_with`] (caller-supplied [`GeneralizedSchur`] engine). The
//! one-shot initial reduction is exposed separately as [`normalize_pencil`]
//! because it is useful and testable on its own.

use ndarray::{s, Array2};
use num_complex::Complex64;
use num_traits::One;

use crate::pencil::{is_upper_hessenberg, pencil_order, PencilError, Pole};
use crate::rotation::{pole_rotation, rotate_rows, DEFAULT_MATCH_TOL};
use crate::schur::{GeneralizedSchur, GivensQz};

/// Transformed pencil and accumulated unitary factors.
///
/// The fields satisfy `kt = qt * K * zt` and `ht = qt * H * zt` for the
/// input pencil (K, H), with `qt` of dimension (n+1) and `zt` of dimension
/// n, both unitary; `kt` and `ht` are upper Hessenberg.
#[derive(Clone, Debug, PartialEq)]
pub struct PoleMoveResult {
    /// Transformed K matrix, (n+1)-by-n upper Hessenberg
    pub kt: Array2<Complex64>,
    /// Transformed H matrix, (n+1)-by-n upper Hessenberg
    pub ht: Array2<Complex64>,
    /// Accumulated left unitary factor, (n+1)-by-(n+1)
    pub qt: Array2<Complex64>,
    /// Accumulated right unitary factor, n-by-n
    pub zt: Array2<Complex64>,
}

/// Reduces a raw pencil to upper-Hessenberg form with the default engine.
///
/// See [`normalize_pencil_with`].
pub fn normalize_pencil(
    k: &Array2<Complex64>,
    h: &Array2<Complex64>,
) -> Result<PoleMoveResult, PencilError> {
    normalize_pencil_with(&GivensQz, k, h)
}

/// Reduces a raw (n+1)-by-n pencil to upper-Hessenberg form.
///
/// The trailing n-by-n blocks of H and K are jointly triangularized by the
/// engine's generalized Schur decomposition; the left factor is folded into
/// QT as blkdiag(1, Q') so the first row of the pencil is only affected by
/// the right factor Z, which is applied to it directly. The result carries
/// the same poles as the input.
///
/// When both input matrices are already upper Hessenberg (equivalently,
/// their trailing blocks are already upper triangular) the reduction is
/// skipped and the returned factors are exact identities, so a no-op request
/// really is a no-op.
///
/// # Arguments
///
/// * `engine` - Generalized Schur backend
/// * `k` - The K matrix, (n+1)-by-n
/// * `h` - The H matrix, (n+1)-by-n
///
/// # Returns
///
/// * `Ok(PoleMoveResult)` - Hessenberg pencil and the factors producing it
/// * `Err(_)` - Shape violation, or a decomposition failure from the engine
pub fn normalize_pencil_with<S: GeneralizedSchur + ?Sized>(
    engine: &S,
    k: &Array2<Complex64>,
    h: &Array2<Complex64>,
) -> Result<PoleMoveResult, PencilError> {
    let n = pencil_order(k, h)?;

    if is_upper_hessenberg(k, 0.0) && is_upper_hessenberg(h, 0.0) {
        return Ok(PoleMoveResult {
            kt: k.clone(),
            ht: h.clone(),
            qt: Array2::eye(n + 1),
            zt: Array2::eye(n),
        });
    }

    let dec = engine.decompose(
        &h.slice(s![1.., ..]).to_owned(),
        &k.slice(s![1.., ..]).to_owned(),
    )?;

    let mut ht = Array2::<Complex64>::zeros((n + 1, n));
    let mut kt = Array2::<Complex64>::zeros((n + 1, n));
    ht.slice_mut(s![0..1, ..])
        .assign(&h.slice(s![0..1, ..]).dot(&dec.z));
    kt.slice_mut(s![0..1, ..])
        .assign(&k.slice(s![0..1, ..]).dot(&dec.z));
    ht.slice_mut(s![1.., ..]).assign(&dec.a);
    kt.slice_mut(s![1.., ..]).assign(&dec.b);

    let mut qt = Array2::<Complex64>::zeros((n + 1, n + 1));
    qt[[0, 0]] = Complex64::one();
    qt.slice_mut(s![1.., 1..]).assign(&dec.q);

    Ok(PoleMoveResult {
        kt,
        ht,
        qt,
        zt: dec.z,
    })
}

/// Moves the leading poles of a pencil to requested locations.
///
/// Given an (n+1)-by-n pencil (K, H) and k < n+1 target poles, returns an
/// equivalent upper-Hessenberg pencil (KT, HT) whose poles at positions
/// 1..k, read top to bottom, are `xi[0]`, ..., `xi[k-1]`, together with the
/// accumulated unitary QT, ZT satisfying KT = QT·K·ZT and HT = QT·H·ZT.
/// Poles beyond position k are left where the initial reduction put them.
///
/// # Arguments
///
/// * `k` - The K matrix, (n+1)-by-n
/// * `h` - The H matrix, (n+1)-by-n
/// * `xi` - Requested poles, finite or infinite, at most n of them
/// * `tol` - Optional relative tolerance of the already-equal pole test
///   (None uses [`DEFAULT_MATCH_TOL`])
///
/// # Returns
///
/// * `Ok(PoleMoveResult)` - Transformed pencil and unitary factors
/// * `Err(PencilError)` - Precondition violation, a degenerate rotation at
///   some iteration, or a decomposition/reordering failure; no partial
///   result is ever returned
///
/// # Algorithm
///
/// After the one-time reduction of [`normalize_pencil`], each target pole is
/// injected by a 2-by-2 plane rotation and parked by an eigenvalue
/// reordering:
///
/// 1. The rotation from [`pole_rotation`](crate::rotation::pole_rotation) is
///    applied to the top two rows of K, H and QT, which makes the leading
///    subdiagonal ratio equal to the target.
/// 2. The top-left window of the trailing triangular blocks (all positions
///    the remaining targets will occupy) is handed to the engine's
///    `reorder` with every pole except the fresh one selected: the fresh
///    pole sinks to the window's last position, the rest keep their order.
/// 3. The reordering factors are folded back into K, H, QT, ZT over the
///    window's rows and columns only; everything outside is untouched.
///
/// Targets are processed in reverse caller order with a window that shrinks
/// by one each iteration, so the final top-to-bottom order at positions
/// 1..k is the caller's order.
///
/// # Examples
///
/// ```
/// use ndarray::arr2;
/// use num_complex::Complex64;
/// use rkpencil_rs::pencil::Pole;
/// use rkpencil_rs::relocate::move_poles;
///
/// let h = arr2(&[
///     [2.0, 1.0, 0.0],
///     [1.0, 2.0, 1.0],
///     [0.0, 1.0, 2.0],
///     [0.0, 0.0, 1.0],
/// ])
/// .mapv(|x| Complex64::new(x, 0.0));
/// let k = arr2(&[
///     [1.0, 0.0, 0.0],
///     [1.0, 1.0, 0.0],
///     [0.0, 1.0, 1.0],
///     [0.0, 0.0, 1.0],
/// ])
/// .mapv(|x| Complex64::new(x, 0.0));
///
/// let result = move_poles(&k, &h, &[Pole::from(2.0)], None).unwrap();
///
/// // The leading pole of the transformed pencil is the requested one.
/// let ratio = result.ht[[1, 0]] / result.kt[[1, 0]];
/// assert!((ratio - Complex64::new(2.0, 0.0)).norm() < 1e-10);
/// ```
pub fn move_poles(
    k: &Array2<Complex64>,
    h: &Array2<Complex64>,
    xi: &[Pole],
    tol: Option<f64>,
) -> Result<PoleMoveResult, PencilError> {
    move_poles_with(&GivensQz, k, h, xi, tol)
}

/// [`move_poles`] with a caller-supplied generalized Schur engine.
///
/// The engine is consulted once for the initial reduction (skipped for
/// already-Hessenberg input) and once per target pole for the reordering
/// that parks the freshly injected pole.
pub fn move_poles_with<S: GeneralizedSchur + ?Sized>(
    engine: &S,
    k: &Array2<Complex64>,
    h: &Array2<Complex64>,
    xi: &[Pole],
    tol: Option<f64>,
) -> Result<PoleMoveResult, PencilError> {
    let n = pencil_order(k, h)?;
    let nreq = xi.len();
    if nreq >= n + 1 {
        return Err(PencilError::TooManyPoles {
            requested: nreq,
            order: n,
        });
    }
    let match_tol = tol.unwrap_or(DEFAULT_MATCH_TOL);

    let mut w = normalize_pencil_with(engine, k, h)?;

    for it in 0..nreq {
        // Last-requested pole first: each later (earlier-requested) pole is
        // parked higher, so the final order reads as requested.
        let target = xi[nreq - 1 - it];

        let hv = (w.ht[[0, 0]], w.ht[[1, 0]]);
        let kv = (w.kt[[0, 0]], w.kt[[1, 0]]);
        let (c, sr) = pole_rotation(hv, kv, target, match_tol)
            .ok_or(PencilError::DegenerateRotation { iteration: it })?;
        rotate_rows(&mut w.ht, 0, 1, 0, n, c, sr);
        rotate_rows(&mut w.kt, 0, 1, 0, n, c, sr);
        rotate_rows(&mut w.qt, 0, 1, 0, n + 1, c, sr);

        // Park the fresh pole at the last position every remaining target
        // can still claim.
        let m = nreq - it;
        if m > 1 {
            let a_win = w.ht.slice(s![1..=m, 0..m]).to_owned();
            let b_win = w.kt.slice(s![1..=m, 0..m]).to_owned();
            let mut select = vec![true; m];
            select[0] = false;
            let dec = engine.reorder(&a_win, &b_win, &select)?;

            w.ht.slice_mut(s![1..=m, 0..m]).assign(&dec.a);
            w.kt.slice_mut(s![1..=m, 0..m]).assign(&dec.b);

            let hrow = w.ht.slice(s![0..1, 0..m]).dot(&dec.z);
            w.ht.slice_mut(s![0..1, 0..m]).assign(&hrow);
            let krow = w.kt.slice(s![0..1, 0..m]).dot(&dec.z);
            w.kt.slice_mut(s![0..1, 0..m]).assign(&krow);

            if m < n {
                let hblk = dec.q.dot(&w.ht.slice(s![1..=m, m..]));
                w.ht.slice_mut(s![1..=m, m..]).assign(&hblk);
                let kblk = dec.q.dot(&w.kt.slice(s![1..=m, m..]));
                w.kt.slice_mut(s![1..=m, m..]).assign(&kblk);
            }

            let qblk = dec.q.dot(&w.qt.slice(s![1..=m, ..]));
            w.qt.slice_mut(s![1..=m, ..]).assign(&qblk);
            let zblk = w.zt.slice(s![.., 0..m]).dot(&dec.z);
            w.zt.slice_mut(s![.., 0..m]).assign(&zblk);
        }
    }

    Ok(w)
}
