use image::RgbImage;

use super::energy::{apply_cut, build_graph};
use super::types::{Label, Mask, Params};
use super::weights::{color_at, NeighborWeights};
use crate::error::{Result, SegmentationError};
use crate::graph::CancelToken;
use crate::model::{score_or_neutral, Color3, ColorModel, ModelFitter};

/// What the refinement loop did, for logging and tests
#[derive(Debug, Clone)]
pub struct Summary {
    pub rounds: u32,
    /// Max-flow total of each round's cut
    pub flows: Vec<i64>,
}

/// Run the full refinement loop over a seeded mask.
///
/// Each round retags the provisional pixels from the current models,
/// re-fits both models from the samples under their class labels, rebuilds
/// the energy graph, solves it, and writes the cut back into the mask.
/// With zero iterations the mask is returned untouched.
pub fn segment(
    image: &RgbImage,
    mask: &mut Mask,
    fitter: &dyn ModelFitter,
    params: &Params,
) -> Result<Summary> {
    segment_with_cancel(image, mask, fitter, params, None)
}

/// `segment` with a cancellation token polled between solver phases.
pub fn segment_with_cancel(
    image: &RgbImage,
    mask: &mut Mask,
    fitter: &dyn ModelFitter,
    params: &Params,
    cancel: Option<&CancelToken>,
) -> Result<Summary> {
    let (width, height) = image.dimensions();
    if (width, height) != (mask.width(), mask.height()) {
        return Err(SegmentationError::DimensionMismatch {
            image_width: width,
            image_height: height,
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }

    // The contrast term depends only on the image; one computation serves
    // every round.
    let weights = NeighborWeights::compute(image, params.gamma);

    let mut foreground = fit_class(fitter, &class_samples(image, mask, true), None)?;
    let mut background = fit_class(fitter, &class_samples(image, mask, false), None)?;

    let mut flows = Vec::with_capacity(params.iterations as usize);
    for round in 0..params.iterations {
        let _span = tracing::debug_span!("round", round).entered();

        retag(image, mask, foreground.as_deref(), background.as_deref());
        foreground = fit_class(fitter, &class_samples(image, mask, true), foreground)?;
        background = fit_class(fitter, &class_samples(image, mask, false), background)?;

        let mut network = build_graph(
            image,
            mask,
            foreground.as_deref(),
            background.as_deref(),
            &weights,
            params.gamma,
        );
        let flow = network.max_flow(cancel)?;
        debug_assert_eq!(network.cut_capacity(&network.source_side()), flow);

        apply_cut(&network, mask);

        let (fg_count, bg_count) = mask.class_counts();
        tracing::info!(
            "round {}: max flow {}, {} foreground / {} background",
            round,
            flow,
            fg_count,
            bg_count
        );
        flows.push(flow);
    }

    Ok(Summary {
        rounds: params.iterations,
        flows,
    })
}

/// Collect the color samples currently labelled into one class.
fn class_samples(image: &RgbImage, mask: &Mask, foreground: bool) -> Vec<Color3> {
    let mut samples = Vec::new();
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if mask.get(x, y).is_foreground() == foreground {
                samples.push(color_at(image, x, y));
            }
        }
    }
    samples
}

/// Re-fit one class, keeping the previous model when the class currently
/// has no samples.
fn fit_class(
    fitter: &dyn ModelFitter,
    samples: &[Color3],
    previous: Option<Box<dyn ColorModel>>,
) -> Result<Option<Box<dyn ColorModel>>> {
    match fitter.fit(samples) {
        Ok(model) => Ok(Some(model)),
        Err(SegmentationError::NoSamples) => {
            tracing::debug!("class has no samples; keeping previous model");
            Ok(previous)
        }
        Err(other) => Err(other),
    }
}

/// Tag each provisional pixel with the class whose model scores it higher.
/// Only feeds the re-fit; the cut decides the labels that stick.
fn retag(
    image: &RgbImage,
    mask: &mut Mask,
    foreground: Option<&dyn ColorModel>,
    background: Option<&dyn ColorModel>,
) {
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if !mask.get(x, y).is_provisional() {
                continue;
            }
            let color = color_at(image, x, y);
            let label = if score_or_neutral(foreground, color) > score_or_neutral(background, color)
            {
                Label::ProbableForeground
            } else {
                Label::ProbableBackground
            };
            mask.set(x, y, label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_fitter;
    use crate::segmentation::types::SeedRect;
    use image::Rgb;

    #[test]
    fn zero_rounds_leaves_the_mask_untouched() {
        let image = RgbImage::from_pixel(4, 4, Rgb([100, 150, 200]));
        let rect = SeedRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        };
        let mut mask = Mask::from_rect(4, 4, &rect).unwrap();
        let before = mask.clone();

        let params = Params {
            gamma: 50.0,
            iterations: 0,
        };
        let summary = segment(&image, &mut mask, default_fitter(4).as_ref(), &params).unwrap();

        assert_eq!(summary.rounds, 0);
        assert!(summary.flows.is_empty());
        assert_eq!(mask, before);
    }

    #[test]
    fn dimension_mismatch_is_rejected_before_any_work() {
        let image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let mut mask = Mask::new(3, 4, Label::ProbableForeground);

        let result = segment(
            &image,
            &mut mask,
            default_fitter(4).as_ref(),
            &Params::default(),
        );
        assert!(matches!(
            result,
            Err(SegmentationError::DimensionMismatch { .. })
        ));
    }

    /// The 2x2 white-over-black scenario with the seed rectangle covering
    /// the whole image: the background class never gets a sample, its
    /// model stays absent, all sink capacities are zero and the minimum
    /// cut keeps every pixel on the source side.
    #[test]
    fn full_rect_seed_keeps_everything_foreground() {
        let image = RgbImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let rect = SeedRect {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        let mut mask = Mask::from_rect(2, 2, &rect).unwrap();

        let params = Params {
            gamma: 50.0,
            iterations: 1,
        };
        let summary = segment(&image, &mut mask, default_fitter(4).as_ref(), &params).unwrap();

        assert_eq!(summary.flows, vec![0]);
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(mask.get(x, y), Label::ProbableForeground);
            }
        }
    }

    /// Two well-separated color regions with a seed rectangle that leaks
    /// one background column into the foreground class: refinement pushes
    /// the leaked column back out.
    #[test]
    fn refinement_separates_color_regions() {
        let image = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        // Columns 0..=2 seeded probable foreground; column 3 background.
        let rect = SeedRect {
            x: 0,
            y: 0,
            width: 3,
            height: 4,
        };
        let mut mask = Mask::from_rect(4, 4, &rect).unwrap();

        let params = Params {
            gamma: 50.0,
            iterations: 2,
        };
        segment(&image, &mut mask, default_fitter(4).as_ref(), &params).unwrap();

        for y in 0..4 {
            for x in 0..4 {
                let expected = if x < 2 {
                    Label::ProbableForeground
                } else {
                    Label::ProbableBackground
                };
                assert_eq!(mask.get(x, y), expected, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn hard_background_survives_refinement() {
        let image = RgbImage::from_pixel(3, 3, Rgb([200, 200, 200]));
        let mut mask = Mask::new(3, 3, Label::ProbableForeground);
        mask.set(1, 1, Label::Background);

        let params = Params {
            gamma: 50.0,
            iterations: 2,
        };
        segment(&image, &mut mask, default_fitter(4).as_ref(), &params).unwrap();

        assert_eq!(mask.get(1, 1), Label::Background);
    }

    #[test]
    fn tripped_token_cancels_the_run() {
        let image = RgbImage::from_pixel(3, 3, Rgb([10, 20, 30]));
        let rect = SeedRect {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        let mut mask = Mask::from_rect(3, 3, &rect).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let result = segment_with_cancel(
            &image,
            &mut mask,
            default_fitter(4).as_ref(),
            &Params::default(),
            Some(&token),
        );
        assert!(matches!(result, Err(SegmentationError::Cancelled)));
    }
}
