/// Dense linear algebra for the small normal-equation systems used by
/// [`super::AdditiveModel`]; systems stay well under a hundred unknowns.

/// Row-major square matrix
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.n + col] += value;
    }

    /// Accumulate `x xᵀ`
    pub fn add_outer(&mut self, x: &[f64]) {
        for (i, xi) in x.iter().enumerate() {
            for (j, xj) in x.iter().enumerate() {
                self.add(i, j, xi * xj);
            }
        }
    }
}

/// Lower-triangular factor `L` with `A = L Lᵀ`
#[derive(Debug, Clone)]
pub struct Cholesky {
    n: usize,
    l: Vec<f64>,
}

impl Cholesky {
    /// `None` when `a` is not symmetric positive definite
    pub fn decompose(a: &SquareMatrix) -> Option<Self> {
        let n = a.dim();
        let mut l = vec![0.0; n * n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = a.get(i, j);
                for k in 0..j {
                    sum -= l[i * n + k] * l[j * n + k];
                }

                if i == j {
                    if sum <= 0.0 || !sum.is_finite() {
                        return None;
                    }
                    l[i * n + i] = sum.sqrt();
                } else {
                    l[i * n + j] = sum / l[j * n + j];
                }
            }
        }

        Some(Self { n, l })
    }

    /// Solve `L y = b`
    fn forward(&self, b: &[f64]) -> Vec<f64> {
        let n = self.n;
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[i];
            for k in 0..i {
                sum -= self.l[i * n + k] * y[k];
            }
            y[i] = sum / self.l[i * n + i];
        }
        y
    }

    /// Solve `A x = b`
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.n;
        let y = self.forward(b);
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for k in (i + 1)..n {
                sum -= self.l[k * n + i] * x[k];
            }
            x[i] = sum / self.l[i * n + i];
        }
        x
    }

    /// `xᵀ A⁻¹ x`, computed as `|L⁻¹ x|²` so it is never negative
    pub fn inverse_quadratic_form(&self, x: &[f64]) -> f64 {
        self.forward(x).iter().map(|v| v * v).sum()
    }
}
