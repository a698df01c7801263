mod gmm;

pub use gmm::GmmFitter;

use crate::error::Result;

/// One color sample, channel order matching the image
pub type Color3 = [f64; 3];

/// Fitted color appearance model.
///
/// Scores are non-negative affinities, monotonically larger for samples
/// more likely under the model. A class that has never been fit is
/// represented by the absence of a model and scores 0 everywhere.
pub trait ColorModel {
    fn score(&self, color: Color3) -> f64;
}

/// Trait for density-model fitters.
///
/// Allows swapping the statistical backend without touching the
/// segmentation core; the core never assumes a component count or
/// covariance structure. Fitting an empty sample set is an error the
/// caller absorbs by keeping its previous model.
pub trait ModelFitter {
    fn fit(&self, samples: &[Color3]) -> Result<Box<dyn ColorModel>>;
}

/// Create the default fitter (full-covariance Gaussian mixture)
pub fn default_fitter(components: usize) -> Box<dyn ModelFitter> {
    Box::new(GmmFitter::new(components))
}

/// Score against an optional model; a never-fit class is neutral.
pub fn score_or_neutral(model: Option<&dyn ColorModel>, color: Color3) -> f64 {
    model.map_or(0.0, |m| m.score(color))
}
