//! rkpencil-rs: rational Krylov pencil transformations
//!
//! A rational Krylov decomposition A·V·K = V·H carries its poles in the
//! pencil (K, H), a pair of (n+1)-by-n upper-Hessenberg complex matrices:
//! pole j is the ratio H(j+1, j)/K(j+1, j), possibly infinite. Relocating
//! those poles — replacing the leading k of them with prescribed values
//! while staying unitarily equivalent to the original pencil — is the core
//! operation behind rational approximation and model order reduction
//! workflows built on rational Krylov spaces.
//!
//! This crate implements that relocation. Each requested pole is injected
//! at the top of the pencil by a numerically careful 2-by-2 plane rotation
//! and then parked out of the way by a generalized Schur eigenvalue
//! reordering, keeping both matrices upper Hessenberg and accumulating
//! every transformation into a unitary pair (QT, ZT).
//!
//! # Organization
//!
//! - [`pencil`]: the data model — poles, structural predicates, pole
//!   read-out, and the crate error type
//! - [`rotation`]: unitary plane rotations, including the pole-targeting
//!   rotation at the heart of the algorithm
//! - [`schur`]: the generalized Schur decomposition/reordering interface
//!   and the crate's self-contained Givens-based engine
//! - [`relocate`]: the pole-moving driver and public entry points
//!
//! # Example
//!
//! ```
//! use ndarray::arr2;
//! use num_complex::Complex64;
//! use rkpencil_rs::pencil::{pencil_poles, Pole};
//! use rkpencil_rs::relocate::move_poles;
//!
//! // A small pencil whose poles all sit at 1.
//! let h = arr2(&[
//!     [2.0, 1.0, 0.0],
//!     [1.0, 2.0, 1.0],
//!     [0.0, 1.0, 2.0],
//!     [0.0, 0.0, 1.0],
//! ])
//! .mapv(|x| Complex64::new(x, 0.0));
//! let k = arr2(&[
//!     [1.0, 0.0, 0.0],
//!     [1.0, 1.0, 0.0],
//!     [0.0, 1.0, 1.0],
//!     [0.0, 0.0, 1.0],
//! ])
//! .mapv(|x| Complex64::new(x, 0.0));
//!
//! // Move the two leading poles to -2 and infinity.
//! let xi = [Pole::from(-2.0), Pole::Infinite];
//! let result = move_poles(&k, &h, &xi, None).unwrap();
//!
//! let poles = pencil_poles(&result.kt, &result.ht).unwrap();
//! assert!((poles[0].value().unwrap() - Complex64::new(-2.0, 0.0)).norm() < 1e-8);
//! assert!(poles[1].is_infinite());
//! ```

pub mod pencil;
pub mod relocate;
pub mod rotation;
pub mod schur;
