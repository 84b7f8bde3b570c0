//! Multistep coefficient computation for arbitrary non-uniform sample times.
//!
//! Given `n` distinct past sample times, the weights produced here integrate
//! (or evaluate) the degree-`n-1` Lagrange interpolant through those samples
//! in closed form. This generalizes the classic fixed-step Adams-Bashforth
//! coefficients to irregular histories, which both local time stepping and
//! dense output require; for the uniform one-step case the classic tabulated
//! coefficients are used directly.
//!
//! All weights are computed in `f64` from differences of sample times, with
//! every polynomial expressed relative to the start of the target interval.

/// Classic Adams-Bashforth weights for a unit uniform step, oldest sample
/// first, for orders 1 through 8.
const UNIFORM_STEP_WEIGHTS: [&[f64]; 8] = [
    &[1.0],
    &[-1.0 / 2.0, 3.0 / 2.0],
    &[5.0 / 12.0, -16.0 / 12.0, 23.0 / 12.0],
    &[-9.0 / 24.0, 37.0 / 24.0, -59.0 / 24.0, 55.0 / 24.0],
    &[
        251.0 / 720.0,
        -1274.0 / 720.0,
        2616.0 / 720.0,
        -2774.0 / 720.0,
        1901.0 / 720.0,
    ],
    &[
        -475.0 / 1440.0,
        2877.0 / 1440.0,
        -7298.0 / 1440.0,
        9982.0 / 1440.0,
        -7923.0 / 1440.0,
        4277.0 / 1440.0,
    ],
    &[
        19087.0 / 60480.0,
        -134472.0 / 60480.0,
        407139.0 / 60480.0,
        -688256.0 / 60480.0,
        705549.0 / 60480.0,
        -447288.0 / 60480.0,
        198721.0 / 60480.0,
    ],
    &[
        -36799.0 / 120960.0,
        295767.0 / 120960.0,
        -1041723.0 / 120960.0,
        2102243.0 / 120960.0,
        -2664477.0 / 120960.0,
        2183877.0 / 120960.0,
        -1152169.0 / 120960.0,
        434241.0 / 120960.0,
    ],
];

/// Weights `wᵢ` such that `Σ wᵢ · f(sᵢ)` equals `∫_{t0}^{t1} f dt` exactly
/// for every polynomial `f` of degree below `sample_times.len()`.
///
/// Sample times may be in any order but must be distinct; histories seeded by
/// a start-up procedure are not necessarily time-sorted.
///
/// # Panics
///
/// Panics if `sample_times` is empty or contains a duplicated time. Both are
/// caller errors: the history window handed to the engine must already be
/// valid and deduplicated.
#[must_use]
pub fn integration_coefficients(sample_times: &[f64], t0: f64, t1: f64) -> Vec<f64> {
    check_samples(sample_times);
    if let Some(h) = uniform_step(sample_times, t0, t1) {
        return UNIFORM_STEP_WEIGHTS[sample_times.len() - 1]
            .iter()
            .map(|w| w * h)
            .collect();
    }
    let shifted: Vec<f64> = sample_times.iter().map(|s| s - t0).collect();
    let width = t1 - t0;
    (0..shifted.len())
        .map(|i| definite_integral(&lagrange_basis(&shifted, i), 0.0, width))
        .collect()
}

/// Weights `wᵢ` such that `Σ wᵢ · f(sᵢ)` equals `p(t)` for the interpolating
/// polynomial `p` through the samples — the point-evaluation form, used to
/// extrapolate a derivative to an off-grid time.
///
/// # Panics
///
/// As [`integration_coefficients`].
#[must_use]
pub fn interpolation_coefficients(sample_times: &[f64], t: f64) -> Vec<f64> {
    check_samples(sample_times);
    let shifted: Vec<f64> = sample_times.iter().map(|s| s - t).collect();
    // The basis value at the (shifted) origin is the constant term.
    (0..shifted.len())
        .map(|i| lagrange_basis(&shifted, i)[0])
        .collect()
}

fn check_samples(sample_times: &[f64]) {
    assert!(
        !sample_times.is_empty(),
        "coefficient computation requires at least one sample time"
    );
    for (i, a) in sample_times.iter().enumerate() {
        for b in &sample_times[i + 1..] {
            assert!(
                a != b,
                "coefficient computation requires distinct sample times, got {a} twice"
            );
        }
    }
}

/// The uniform spacing `h`, when the samples are evenly spaced and the target
/// interval is the single step following the newest sample. Spacing is
/// compared bitwise: rational step times that share a representable spacing
/// take the tabulated path, and anything else falls through to the general
/// construction.
fn uniform_step(sample_times: &[f64], t0: f64, t1: f64) -> Option<f64> {
    let n = sample_times.len();
    if sample_times[n - 1] != t0 {
        return None;
    }
    let h = t1 - t0;
    if h == 0.0 {
        return None;
    }
    for pair in sample_times.windows(2) {
        if pair[1] - pair[0] != h {
            return None;
        }
    }
    Some(h)
}

/// Monomial coefficients, constant term first, of the `i`-th Lagrange basis
/// polynomial through the given nodes: `ℓᵢ(nodeᵢ) = 1`, zero at every other
/// node.
pub(crate) fn lagrange_basis(nodes: &[f64], i: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for (j, &node) in nodes.iter().enumerate() {
        if j == i {
            continue;
        }
        let denom = nodes[i] - node;
        poly = poly_mul(&poly, &[-node / denom, 1.0 / denom]);
    }
    poly
}

pub(crate) fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut product = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            product[i + j] += ai * bj;
        }
    }
    product
}

/// `∫_a^b p(t) dt` for monomial coefficients `p`, constant term first.
pub(crate) fn definite_integral(poly: &[f64], a: f64, b: f64) -> f64 {
    let mut total = 0.0;
    let mut power_a = a;
    let mut power_b = b;
    for (k, &c) in poly.iter().enumerate() {
        total += c * (power_b - power_a) / (k + 1) as f64;
        power_a *= a;
        power_b *= b;
    }
    total
}
