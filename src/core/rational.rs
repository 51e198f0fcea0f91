//! Rational function model `g(u, v) ≈ P(u, v) / Q(u, v)` fitted by linear least squares.
//!
//! The denominator's constant term is fixed to 1, which linearises the fit:
//!
//! ```text
//! P(u, v) - g · (Q(u, v) - 1) = g
//! ```
//!
//! Inputs and the fitted value are centered and scaled to [-1, 1] before the
//! system is built, so degree-4 monomials of pixel coordinates stay well
//! conditioned. The system is solved with a truncated SVD.

use nalgebra::{DMatrix, DVector};

/// Highest numerator degree tried by the degree search
pub const MAX_DEGREE: usize = 4;

/// Relative cut-off below which singular values are treated as zero
const SINGULAR_VALUE_CUTOFF: f64 = 1e-12;

/// Monomial exponents (u, v) ordered by total degree: 1, u, v, u², uv, v², u³, ...
const TERMS: [(i32, i32); 15] = [
    (0, 0),
    (1, 0),
    (0, 1),
    (2, 0),
    (1, 1),
    (0, 2),
    (3, 0),
    (2, 1),
    (1, 2),
    (0, 3),
    (4, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 4),
];

/// Linear rescaling of one variable into roughly [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scaling {
    offset: f64,
    scale: f64,
}

impl Scaling {
    fn from_values(values: &[f64]) -> Self {
        let offset = values.iter().sum::<f64>() / values.len() as f64;
        let spread = values
            .iter()
            .map(|value| (value - offset).abs())
            .fold(0.0, f64::max);
        let scale = if spread > 0.0 && spread.is_finite() {
            spread
        } else {
            1.0
        };
        Self { offset, scale }
    }

    fn apply(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }

    fn revert(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

/// Fitted rational function of two variables
#[derive(Debug, Clone, PartialEq)]
pub struct RationalFunctionModel {
    degree_p: usize,
    degree_q: usize,
    /// Numerator coefficients followed by the non-constant denominator coefficients
    coefficients: Vec<f64>,
    u_scaling: Scaling,
    v_scaling: Scaling,
    g_scaling: Scaling,
    rmse: f64,
}

impl RationalFunctionModel {
    /// Number of numerator terms for a given degree
    pub fn term_count_p(degree: usize) -> usize {
        (degree + 1) * (degree + 2) / 2
    }

    /// Number of free denominator terms for a given degree (constant term excluded)
    pub fn term_count_q(degree: usize) -> usize {
        (degree + 1) * (degree + 2) / 2 - 1
    }

    /// Fit `g ≈ P(u, v) / Q(u, v)` with the given degrees.
    ///
    /// Returns `None` when the system is under-determined, degenerate, or the fit
    /// does not produce finite values at the sample points.
    pub fn fit(degree_p: usize, degree_q: usize, u: &[f64], v: &[f64], g: &[f64]) -> Option<Self> {
        if degree_p > MAX_DEGREE || degree_q > degree_p {
            return None;
        }
        let point_count = g.len();
        if u.len() != point_count || v.len() != point_count {
            return None;
        }
        let term_count_p = Self::term_count_p(degree_p);
        let term_count_q = Self::term_count_q(degree_q);
        let term_count = term_count_p + term_count_q;
        if point_count == 0 || point_count < term_count {
            return None;
        }

        let u_scaling = Scaling::from_values(u);
        let v_scaling = Scaling::from_values(v);
        let g_scaling = Scaling::from_values(g);

        let mut a = DMatrix::<f64>::zeros(point_count, term_count);
        let mut b = DVector::<f64>::zeros(point_count);
        for i in 0..point_count {
            let un = u_scaling.apply(u[i]);
            let vn = v_scaling.apply(v[i]);
            let gn = g_scaling.apply(g[i]);
            for j in 0..term_count_p {
                a[(i, j)] = term(j, un, vn);
            }
            for j in 0..term_count_q {
                a[(i, term_count_p + j)] = -gn * term(j + 1, un, vn);
            }
            b[i] = gn;
        }

        let svd = a.svd(true, true);
        let max_singular_value = svd.singular_values.iter().cloned().fold(0.0, f64::max);
        if max_singular_value <= 0.0 || !max_singular_value.is_finite() {
            return None;
        }
        let solution = svd
            .solve(&b, max_singular_value * SINGULAR_VALUE_CUTOFF)
            .ok()?;
        if solution.iter().any(|c| !c.is_finite()) {
            return None;
        }

        let mut model = Self {
            degree_p,
            degree_q,
            coefficients: solution.iter().cloned().collect(),
            u_scaling,
            v_scaling,
            g_scaling,
            rmse: 0.0,
        };

        let sum_sq: f64 = (0..point_count)
            .map(|i| {
                let residual = model.value(u[i], v[i]) - g[i];
                residual * residual
            })
            .sum();
        let rmse = (sum_sq / point_count as f64).sqrt();
        if !rmse.is_finite() {
            return None;
        }
        model.rmse = rmse;

        Some(model)
    }

    /// Evaluate the model at (u, v)
    pub fn value(&self, u: f64, v: f64) -> f64 {
        let un = self.u_scaling.apply(u);
        let vn = self.v_scaling.apply(v);
        let term_count_p = Self::term_count_p(self.degree_p);
        let term_count_q = Self::term_count_q(self.degree_q);

        let mut p = 0.0;
        for j in 0..term_count_p {
            p += self.coefficients[j] * term(j, un, vn);
        }
        let mut q = 1.0;
        for j in 0..term_count_q {
            q += self.coefficients[term_count_p + j] * term(j + 1, un, vn);
        }

        self.g_scaling.revert(p / q)
    }

    pub fn degree_p(&self) -> usize {
        self.degree_p
    }

    pub fn degree_q(&self) -> usize {
        self.degree_q
    }

    /// Root mean square error of the fit at the sample points, in units of g
    pub fn rmse(&self) -> f64 {
        self.rmse
    }
}

fn term(index: usize, u: f64, v: f64) -> f64 {
    let (pu, pv) = TERMS[index];
    u.powi(pu) * v.powi(pv)
}

/// Find the lowest-degree model meeting `rmse < accuracy`.
///
/// Candidates are tried in order P = 0..=4, Q = 0..=P and skipped when there are
/// fewer points than coefficients or the solve fails. The first candidate meeting
/// the accuracy ends the search; otherwise the lowest-RMSE candidate is returned.
/// `None` means no candidate could be fitted at all.
pub fn find_best_model(u: &[f64], v: &[f64], g: &[f64], accuracy: f64) -> Option<RationalFunctionModel> {
    let point_count = g.len();
    let mut best: Option<RationalFunctionModel> = None;

    'search: for degree_p in 0..=MAX_DEGREE {
        for degree_q in 0..=degree_p {
            let term_count = RationalFunctionModel::term_count_p(degree_p)
                + RationalFunctionModel::term_count_q(degree_q);
            if point_count < term_count {
                continue;
            }
            if let Some(model) = RationalFunctionModel::fit(degree_p, degree_q, u, v, g) {
                log::trace!(
                    "Candidate P={} Q={}: rmse={:.3e}",
                    degree_p,
                    degree_q,
                    model.rmse()
                );
                if best.as_ref().map_or(true, |b| model.rmse() < b.rmse()) {
                    best = Some(model);
                }
            }
            if best.as_ref().map_or(false, |b| b.rmse() < accuracy) {
                break 'search;
            }
        }
    }

    best
}
