//! Quadrature rules over `[0, 1]` for the path integral.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    #[default]
    GaussLegendre,
    RiemannLeft,
    RiemannRight,
    RiemannMiddle,
    RiemannTrapezoid,
}

impl IntegrationMethod {
    /// Interpolation coefficients `alpha_k` and their weights for `n_steps`
    /// evaluations. Weights sum to one.
    pub fn alphas_and_weights(&self, n_steps: usize) -> Result<(Vec<f64>, Vec<f64>), String> {
        if n_steps == 0 {
            return Err("integration needs at least one step".to_string());
        }
        let n = n_steps as f64;

        let nodes = match self {
            IntegrationMethod::GaussLegendre => {
                let (points, weights) = gauss_legendre(n_steps);
                (
                    points.iter().map(|x| 0.5 * (x + 1.0)).collect(),
                    weights.iter().map(|w| 0.5 * w).collect(),
                )
            }
            IntegrationMethod::RiemannLeft => (
                (0..n_steps).map(|i| i as f64 / n).collect(),
                vec![1.0 / n; n_steps],
            ),
            IntegrationMethod::RiemannRight => (
                (1..=n_steps).map(|i| i as f64 / n).collect(),
                vec![1.0 / n; n_steps],
            ),
            IntegrationMethod::RiemannMiddle => (
                (0..n_steps).map(|i| (i as f64 + 0.5) / n).collect(),
                vec![1.0 / n; n_steps],
            ),
            IntegrationMethod::RiemannTrapezoid => {
                if n_steps < 2 {
                    return Err("trapezoid rule needs at least two steps".to_string());
                }
                let intervals = n - 1.0;
                let mut weights = vec![1.0 / intervals; n_steps];
                weights[0] = 0.5 / intervals;
                weights[n_steps - 1] = 0.5 / intervals;
                ((0..n_steps).map(|i| i as f64 / intervals).collect(), weights)
            }
        };

        Ok(nodes)
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntegrationMethod::GaussLegendre => "gausslegendre",
            IntegrationMethod::RiemannLeft => "riemann_left",
            IntegrationMethod::RiemannRight => "riemann_right",
            IntegrationMethod::RiemannMiddle => "riemann_middle",
            IntegrationMethod::RiemannTrapezoid => "riemann_trapezoid",
        }
    }
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IntegrationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "gausslegendre" | "gauss_legendre" => Ok(IntegrationMethod::GaussLegendre),
            "riemann_left" => Ok(IntegrationMethod::RiemannLeft),
            "riemann_right" => Ok(IntegrationMethod::RiemannRight),
            "riemann_middle" => Ok(IntegrationMethod::RiemannMiddle),
            "riemann_trapezoid" => Ok(IntegrationMethod::RiemannTrapezoid),
            other => Err(format!("unknown integration method '{}'", other)),
        }
    }
}

/// Gauss-Legendre nodes (ascending) and weights on `[-1, 1]`.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];

    for i in 0..n {
        // Tricomi's initial guess for the i-th largest root, refined by Newton.
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(n, x);
            let step = p / dp;
            x -= step;
            if step.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre(n, x);
        nodes[n - 1 - i] = x;
        weights[n - 1 - i] = 2.0 / ((1.0 - x * x) * dp * dp);
    }

    (nodes, weights)
}

/// `P_n(x)` and `P_n'(x)` by the three-term recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut prev = 1.0;
    let mut current = x;
    for k in 2..=n {
        let k = k as f64;
        let next = ((2.0 * k - 1.0) * x * current - (k - 1.0) * prev) / k;
        prev = current;
        current = next;
    }
    let derivative = n as f64 * (x * current - prev) / (x * x - 1.0);
    (current, derivative)
}
