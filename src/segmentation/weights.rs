use image::RgbImage;
use ndarray::Array2;

/// Contrast-sensitive smoothness weights between neighboring pixels.
///
/// One grid per supported direction; the value at (y, x) is the undirected
/// weight between that pixel and the named neighbor, zero where the grid
/// boundary removes the neighbor. Computed once per image and immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct NeighborWeights {
    pub beta: f64,
    pub left: Array2<f64>,
    pub up_left: Array2<f64>,
    pub up: Array2<f64>,
    pub up_right: Array2<f64>,
}

impl NeighborWeights {
    pub fn compute(image: &RgbImage, gamma: f64) -> Self {
        let _span = tracing::debug_span!("neighbor_weights").entered();

        let beta = calc_beta(image);
        tracing::debug!("contrast parameter beta = {beta}");

        let (width, height) = image.dimensions();
        let shape = (height as usize, width as usize);
        let mut left = Array2::zeros(shape);
        let mut up_left = Array2::zeros(shape);
        let mut up = Array2::zeros(shape);
        let mut up_right = Array2::zeros(shape);

        let gamma_diag = gamma / 2.0_f64.sqrt();

        for y in 0..height {
            for x in 0..width {
                let color = color_at(image, x, y);
                let cell = (y as usize, x as usize);

                if x > 0 {
                    let diff = sq_diff(color, color_at(image, x - 1, y));
                    left[cell] = gamma * (-beta * diff).exp();
                }
                if x > 0 && y > 0 {
                    let diff = sq_diff(color, color_at(image, x - 1, y - 1));
                    up_left[cell] = gamma_diag * (-beta * diff).exp();
                }
                if y > 0 {
                    let diff = sq_diff(color, color_at(image, x, y - 1));
                    up[cell] = gamma * (-beta * diff).exp();
                }
                if x + 1 < width && y > 0 {
                    let diff = sq_diff(color, color_at(image, x + 1, y - 1));
                    up_right[cell] = gamma_diag * (-beta * diff).exp();
                }
            }
        }

        Self {
            beta,
            left,
            up_left,
            up,
            up_right,
        }
    }
}

/// Contrast parameter from the mean squared color difference over all four
/// directional neighbor pairs: `beta = 1 / (2 * meanSqDiff)`, or 0 for a
/// perfectly flat image.
fn calc_beta(image: &RgbImage) -> f64 {
    let (width, height) = image.dimensions();
    let mut sum = 0.0;

    for y in 0..height {
        for x in 0..width {
            let color = color_at(image, x, y);
            if x > 0 {
                sum += sq_diff(color, color_at(image, x - 1, y));
            }
            if x > 0 && y > 0 {
                sum += sq_diff(color, color_at(image, x - 1, y - 1));
            }
            if y > 0 {
                sum += sq_diff(color, color_at(image, x, y - 1));
            }
            if x + 1 < width && y > 0 {
                sum += sq_diff(color, color_at(image, x + 1, y - 1));
            }
        }
    }

    if sum <= f64::EPSILON {
        return 0.0;
    }
    // Exact count of valid neighbor pairs across all four directions.
    let (width, height) = (width as i64, height as i64);
    let norm = 4 * width * height - 3 * width - 3 * height + 2;
    1.0 / (2.0 * sum / norm as f64)
}

pub(crate) fn color_at(image: &RgbImage, x: u32, y: u32) -> [f64; 3] {
    let pixel = image.get_pixel(x, y);
    [pixel[0] as f64, pixel[1] as f64, pixel[2] as f64]
}

fn sq_diff(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}
