//! Jacobi-preconditioned conjugate gradient (spec.md §4.3).

use super::b2b::LinearSystem;

/// Solves `system` starting from `x0`, in place, returning the final
/// iteration count. Terminates when `||r||^2 / n` falls below
/// `precision * (||r0||^2 / n)`, or after `max_iters` iterations.
pub fn solve(system: &LinearSystem, x0: &mut [f64], precision: f64, max_iters: usize) -> usize {
    let n = system.n;
    if n == 0 {
        return 0;
    }
    let inv_diag: Vec<f64> = system.diag.iter().map(|d| 1.0 / d).collect();

    let ax0 = system.matvec(x0);
    let mut r: Vec<f64> = system
        .rhs
        .iter()
        .zip(ax0.iter())
        .map(|(b, a)| b - a)
        .collect();
    let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, m)| ri * m).collect();
    let mut p = z.clone();
    let mut rz_old: f64 = r.iter().zip(&z).map(|(a, b)| a * b).sum();

    let r0_sq: f64 = r.iter().map(|v| v * v).sum();
    let target = precision * (r0_sq / n as f64);
    if r0_sq / (n as f64) <= target {
        return 0;
    }

    let mut iters = 0;
    while iters < max_iters {
        let ap = system.matvec(&p);
        let pap: f64 = p.iter().zip(&ap).map(|(a, b)| a * b).sum();
        if pap.abs() < 1e-300 {
            break;
        }
        let alpha = rz_old / pap;
        for i in 0..n {
            x0[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }
        let r_sq: f64 = r.iter().map(|v| v * v).sum();
        iters += 1;
        if r_sq / (n as f64) <= target {
            break;
        }
        for i in 0..n {
            z[i] = r[i] * inv_diag[i];
        }
        let rz_new: f64 = r.iter().zip(&z).map(|(a, b)| a * b).sum();
        let beta = rz_new / rz_old;
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
        rz_old = rz_new;
    }
    iters
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn diag_system(diag: Vec<f64>, rhs: Vec<f64>) -> LinearSystem {
        LinearSystem {
            n: diag.len(),
            diag,
            off: HashMap::new(),
            rhs,
        }
    }

    #[test]
    fn solves_diagonal_system_exactly() {
        let sys = diag_system(vec![2.0, 4.0], vec![4.0, 8.0]);
        let mut x = vec![0.0, 0.0];
        solve(&sys, &mut x, 1e-6, 100);
        assert!((x[0] - 2.0).abs() < 1e-6);
        assert!((x[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn solves_coupled_system() {
        let mut sys = diag_system(vec![3.0, 3.0], vec![1.0, 1.0]);
        sys.off.insert((0, 1), -1.0);
        let mut x = vec![0.0, 0.0];
        solve(&sys, &mut x, 1e-8, 200);
        let y = sys.matvec(&x);
        assert!((y[0] - sys.rhs[0]).abs() < 1e-4);
        assert!((y[1] - sys.rhs[1]).abs() < 1e-4);
    }

    #[test]
    fn zero_system_returns_immediately() {
        let sys = diag_system(vec![], vec![]);
        let mut x: Vec<f64> = vec![];
        let iters = solve(&sys, &mut x, 0.05, 100);
        assert_eq!(iters, 0);
    }

    #[test]
    fn already_converged_does_nothing() {
        let sys = diag_system(vec![1.0], vec![0.0]);
        let mut x = vec![0.0];
        let iters = solve(&sys, &mut x, 0.05, 100);
        assert_eq!(iters, 0);
        assert_eq!(x[0], 0.0);
    }
}
