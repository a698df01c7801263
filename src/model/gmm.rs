use std::cmp::Ordering;

use super::{Color3, ColorModel, ModelFitter};
use crate::error::{Result, SegmentationError};

/// Added to the mixture log-likelihood before clamping at zero. Both
/// classes share the shift, so it adds the same constant to every cut and
/// cannot change which cut is minimal.
const SCORE_SHIFT: f64 = 64.0;

/// Diagonal loading applied when a component's covariance is near-singular
/// (e.g. a component fed identical samples).
const VARIANCE_FLOOR: f64 = 0.01;

/// Reassignment/refit sweeps after the initial chunked seeding
const ASSIGN_SWEEPS: usize = 3;

const LN_TWO_PI: f64 = 1.8378770664093453;

/// Gaussian-mixture fitter: seeds components from channel-sorted sample
/// chunks, then alternates nearest-component reassignment with
/// moment-matched refits.
pub struct GmmFitter {
    components: usize,
}

impl GmmFitter {
    pub fn new(components: usize) -> Self {
        Self {
            components: components.max(1),
        }
    }
}

impl ModelFitter for GmmFitter {
    fn fit(&self, samples: &[Color3]) -> Result<Box<dyn ColorModel>> {
        if samples.is_empty() {
            return Err(SegmentationError::NoSamples);
        }
        let k = self.components.min(samples.len());

        // Seed assignment: sort samples by channel value and cut the order
        // into k equal chunks.
        let mut order: Vec<usize> = (0..samples.len()).collect();
        order.sort_by(|&a, &b| samples[a].partial_cmp(&samples[b]).unwrap_or(Ordering::Equal));

        let chunk = samples.len().div_ceil(k);
        let mut assignment = vec![0usize; samples.len()];
        for (pos, &index) in order.iter().enumerate() {
            assignment[index] = (pos / chunk).min(k - 1);
        }

        let mut mixture = GaussianMixture::from_assignment(samples, &assignment, k);
        for _ in 0..ASSIGN_SWEEPS {
            let mut changed = false;
            for (i, &sample) in samples.iter().enumerate() {
                let best = mixture.most_likely_component(sample);
                if best != assignment[i] {
                    assignment[i] = best;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            mixture = GaussianMixture::from_assignment(samples, &assignment, k);
        }

        Ok(Box::new(mixture))
    }
}

struct Component {
    /// Mixing proportion; 0 marks a component that received no samples
    weight: f64,
    mean: Color3,
    inv_cov: [[f64; 3]; 3],
    log_det: f64,
}

impl Component {
    fn empty() -> Self {
        Self {
            weight: 0.0,
            mean: [0.0; 3],
            inv_cov: [[0.0; 3]; 3],
            log_det: 0.0,
        }
    }

    /// Unweighted log density of the component's Gaussian
    fn log_density(&self, color: Color3) -> f64 {
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let mut mahalanobis = 0.0;
        for row in 0..3 {
            for col in 0..3 {
                mahalanobis += d[row] * self.inv_cov[row][col] * d[col];
            }
        }
        -0.5 * (3.0 * LN_TWO_PI + self.log_det + mahalanobis)
    }
}

/// Full-covariance Gaussian mixture over 3-channel color samples
pub struct GaussianMixture {
    components: Vec<Component>,
}

impl GaussianMixture {
    /// Moment-match each component from the samples currently assigned to it.
    fn from_assignment(samples: &[Color3], assignment: &[usize], k: usize) -> Self {
        let mut components = Vec::with_capacity(k);
        let total = samples.len() as f64;

        for ci in 0..k {
            let mut count = 0.0;
            let mut sums = [0.0f64; 3];
            let mut prods = [[0.0f64; 3]; 3];
            for (sample, &owner) in samples.iter().zip(assignment) {
                if owner != ci {
                    continue;
                }
                count += 1.0;
                for row in 0..3 {
                    sums[row] += sample[row];
                    for col in 0..3 {
                        prods[row][col] += sample[row] * sample[col];
                    }
                }
            }
            if count == 0.0 {
                components.push(Component::empty());
                continue;
            }

            let mean = [sums[0] / count, sums[1] / count, sums[2] / count];
            let mut cov = [[0.0f64; 3]; 3];
            for row in 0..3 {
                for col in 0..3 {
                    cov[row][col] = prods[row][col] / count - mean[row] * mean[col];
                }
            }

            let mut det = det3(&cov);
            if det <= 1e-6 {
                for d in 0..3 {
                    cov[d][d] += VARIANCE_FLOOR;
                }
                det = det3(&cov);
            }

            components.push(Component {
                weight: count / total,
                mean,
                inv_cov: inv3(&cov, det),
                log_det: det.ln(),
            });
        }

        Self { components }
    }

    fn most_likely_component(&self, color: Color3) -> usize {
        let mut best = 0;
        let mut best_density = f64::NEG_INFINITY;
        for (ci, component) in self.components.iter().enumerate() {
            if component.weight <= 0.0 {
                continue;
            }
            let density = component.log_density(color);
            if density > best_density {
                best = ci;
                best_density = density;
            }
        }
        best
    }
}

impl ColorModel for GaussianMixture {
    fn score(&self, color: Color3) -> f64 {
        // log-sum-exp over the weighted component densities
        let terms: Vec<f64> = self
            .components
            .iter()
            .filter(|c| c.weight > 0.0)
            .map(|c| c.weight.ln() + c.log_density(color))
            .collect();

        let max = terms.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return 0.0;
        }
        let log_likelihood = max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln();
        (SCORE_SHIFT + log_likelihood).max(0.0)
    }
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn inv3(m: &[[f64; 3]; 3], det: f64) -> [[f64; 3]; 3] {
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}
