//! Demonstration of rational Krylov pole relocation
//!
//! This example builds a small upper-Hessenberg pencil, moves its two
//! leading poles to new locations (one finite, one at infinity), and
//! verifies the invariants of the transformation: pole placement,
//! unitarity of the accumulated factors, and congruence with the
//! original pencil.

use ndarray::{arr2, Array2};
use num_complex::Complex64;
use rkpencil_rs::pencil::{pencil_poles, Pole};
use rkpencil_rs::relocate::move_poles;

fn main() {
    println!("=== Pole Relocation Demonstration ===\n");

    // A tridiagonal-compatible pencil of order 3; every pole sits at 1.
    let h = arr2(&[
        [2.0, 1.0, 0.0],
        [1.0, 2.0, 1.0],
        [0.0, 1.0, 2.0],
        [0.0, 0.0, 1.0],
    ])
    .mapv(|x| Complex64::new(x, 0.0));
    let k = arr2(&[
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 1.0],
        [0.0, 0.0, 1.0],
    ])
    .mapv(|x| Complex64::new(x, 0.0));

    println!("Poles of the input pencil:");
    for (j, pole) in pencil_poles(&k, &h).unwrap().iter().enumerate() {
        println!("  pole {} = {}", j + 1, pole);
    }

    // Move the leading poles to -0.5 + i and infinity.
    let xi = [Pole::from(Complex64::new(-0.5, 1.0)), Pole::Infinite];
    println!("\nRequested poles: {}, {}", xi[0], xi[1]);

    match move_poles(&k, &h, &xi, None) {
        Ok(result) => {
            println!("\n=== Transformed pencil ===");
            println!("Poles after relocation:");
            for (j, pole) in pencil_poles(&result.kt, &result.ht).unwrap().iter().enumerate() {
                println!("  pole {} = {}", j + 1, pole);
            }

            // Verify QT and ZT are unitary.
            let qt_residual = unitary_residual(&result.qt);
            let zt_residual = unitary_residual(&result.zt);
            println!("\nUnitarity residuals:");
            println!("  ||QT*QT^H - I|| = {:.3e}", qt_residual);
            println!("  ||ZT*ZT^H - I|| = {:.3e}", zt_residual);

            // Verify KT = QT*K*ZT and HT = QT*H*ZT.
            let rk = &result.qt.dot(&k).dot(&result.zt) - &result.kt;
            let rh = &result.qt.dot(&h).dot(&result.zt) - &result.ht;
            println!("Congruence residuals:");
            println!("  ||QT*K*ZT - KT|| = {:.3e}", max_abs(&rk));
            println!("  ||QT*H*ZT - HT|| = {:.3e}", max_abs(&rh));

            if qt_residual < 1e-10 && zt_residual < 1e-10 {
                println!("\n✓ Pole relocation successful!");
            }
        }
        Err(e) => {
            println!("Error: {}", e);
        }
    }
}

fn max_abs(m: &Array2<Complex64>) -> f64 {
    m.iter().map(|x| x.norm()).fold(0.0, f64::max)
}

fn unitary_residual(m: &Array2<Complex64>) -> f64 {
    let mh = m.t().mapv(|x| x.conj());
    let eye = Array2::<Complex64>::eye(m.nrows());
    max_abs(&(&m.dot(&mh) - &eye))
}
