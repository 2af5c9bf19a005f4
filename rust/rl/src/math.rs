use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, Zip};

/// Numerically stable `log(sum(exp(x)))`.
pub fn logsumexp(x: ArrayView1<f64>) -> f64 {
    let max = x.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    if max == f64::NEG_INFINITY || max == f64::INFINITY {
        return max;
    }

    max + x.fold(0., |acc, &v| acc + (v - max).exp()).ln()
}

pub fn sup_norm(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    Zip::from(a)
        .and(b)
        .fold(0., |m: f64, x, y| m.max((x - y).abs()))
}

pub fn l2_norm(a: &Array1<f64>) -> f64 {
    a.dot(a).sqrt()
}

/// Solves `a x = b` by Gaussian elimination with partial pivoting.
pub fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return Err(Error::Dimension(format!(
            "{:?} system with {n} right hand sides",
            a.dim()
        )));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-300 {
            return Err(Error::Singular);
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0. {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use ndarray::array;

    #[test]
    fn logsumexp_is_stable() {
        assert_float_eq!(logsumexp(array![1000., 1000.].view()), 1000. + 2f64.ln(), abs <= 1e-9);
        assert_float_eq!(logsumexp(array![-1000., 0.].view()), 0., abs <= 1e-12);
        assert_eq!(logsumexp(array![f64::NEG_INFINITY].view()), f64::NEG_INFINITY);
    }

    #[test]
    fn solve_needs_pivoting() {
        let a = array![[0., 2., 1.], [1., 1., 0.], [2., 0., 3.]];
        let x = solve(a, array![3., 2., 5.]).unwrap();
        assert_float_eq!(x.to_vec(), vec![1., 1., 1.], abs_all <= 1e-12);
    }

    #[test]
    fn solve_reports_singular() {
        let a = array![[1., 2.], [2., 4.]];
        assert!(matches!(solve(a, array![1., 2.]), Err(Error::Singular)));
    }
}
