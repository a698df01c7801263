use image::RgbImage;

use super::types::{Label, Mask};
use super::weights::{color_at, NeighborWeights};
use crate::graph::FlowNetwork;
use crate::model::{score_or_neutral, ColorModel};

/// Shared scale applied to scores and smoothness weights alike before the
/// truncation to integer capacities. This is the single place continuous
/// values lose precision.
const CAPACITY_SCALE: f64 = 100.0;

/// Terminal capacity pinning a hard-labeled pixel to its side of the cut
fn hard_capacity(gamma: f64) -> i64 {
    (9.0 * gamma * CAPACITY_SCALE) as i64
}

/// Clamp to non-negative, scale, truncate toward zero.
fn capacity(value: f64) -> i64 {
    (value * CAPACITY_SCALE).max(0.0) as i64
}

pub(crate) fn node_id(x: u32, y: u32, width: u32) -> usize {
    (y * width + x) as usize
}

/// Build the energy graph for one refinement round: every pixel plus the
/// two terminals, appearance-driven t-links and smoothness-driven n-links.
///
/// Provisional pixels get terminal capacities from the model scores; hard
/// pixels are pinned with a capacity the cut cannot afford to sever. Each
/// neighbor pair carries two directed arcs of identical capacity.
pub fn build_graph(
    image: &RgbImage,
    mask: &Mask,
    foreground: Option<&dyn ColorModel>,
    background: Option<&dyn ColorModel>,
    weights: &NeighborWeights,
    gamma: f64,
) -> FlowNetwork {
    let _span = tracing::debug_span!("build_graph").entered();

    let (width, height) = image.dimensions();
    let pixel_count = (width * height) as usize;
    let source = pixel_count;
    let sink = pixel_count + 1;
    let mut network = FlowNetwork::new(pixel_count + 2, source, sink);
    let lambda = hard_capacity(gamma);

    for y in 0..height {
        for x in 0..width {
            let id = node_id(x, y, width);
            match mask.get(x, y) {
                Label::Foreground => {
                    network.add_edge(source, id, lambda);
                    network.add_edge(id, sink, 0);
                }
                Label::Background => {
                    network.add_edge(source, id, 0);
                    network.add_edge(id, sink, lambda);
                }
                _ => {
                    let color = color_at(image, x, y);
                    network.add_edge(source, id, capacity(score_or_neutral(foreground, color)));
                    network.add_edge(id, sink, capacity(score_or_neutral(background, color)));
                }
            }

            let cell = (y as usize, x as usize);
            if x > 0 {
                let w = capacity(weights.left[cell]);
                let neighbor = node_id(x - 1, y, width);
                network.add_edge(id, neighbor, w);
                network.add_edge(neighbor, id, w);
            }
            if x > 0 && y > 0 {
                let w = capacity(weights.up_left[cell]);
                let neighbor = node_id(x - 1, y - 1, width);
                network.add_edge(id, neighbor, w);
                network.add_edge(neighbor, id, w);
            }
            if y > 0 {
                let w = capacity(weights.up[cell]);
                let neighbor = node_id(x, y - 1, width);
                network.add_edge(id, neighbor, w);
                network.add_edge(neighbor, id, w);
            }
            if x + 1 < width && y > 0 {
                let w = capacity(weights.up_right[cell]);
                let neighbor = node_id(x + 1, y - 1, width);
                network.add_edge(id, neighbor, w);
                network.add_edge(neighbor, id, w);
            }
        }
    }

    network
}

/// Read the minimum cut off a solved network into the mask: provisional
/// pixels reachable from the source become probable foreground, the rest
/// probable background. Hard labels are left untouched.
pub fn apply_cut(network: &FlowNetwork, mask: &mut Mask) {
    let reachable = network.source_side();

    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if !mask.get(x, y).is_provisional() {
                continue;
            }
            let label = if reachable[node_id(x, y, mask.width())] {
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
    use image::Rgb;

    /// Scores by brightness of the first channel only
    struct BrightnessModel {
        bright: f64,
        dark: f64,
    }

    impl ColorModel for BrightnessModel {
        fn score(&self, color: [f64; 3]) -> f64 {
            if color[0] > 127.0 {
                self.bright
            } else {
                self.dark
            }
        }
    }

    struct NegativeModel;

    impl ColorModel for NegativeModel {
        fn score(&self, _color: [f64; 3]) -> f64 {
            -5.0
        }
    }

    fn white_over_black() -> RgbImage {
        RgbImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn arc_capacity(network: &FlowNetwork, from: usize, to: usize) -> i64 {
        network
            .edges(from)
            .iter()
            .filter(|e| e.to == to)
            .map(|e| e.capacity)
            .sum()
    }

    fn build_white_black(
        fg: &dyn ColorModel,
        bg: &dyn ColorModel,
    ) -> (RgbImage, Mask, FlowNetwork) {
        let image = white_over_black();
        let mask = Mask::new(2, 2, Label::ProbableForeground);
        let weights = NeighborWeights::compute(&image, 50.0);
        let network = build_graph(&image, &mask, Some(fg), Some(bg), &weights, 50.0);
        (image, mask, network)
    }

    #[test]
    fn graph_has_pixel_nodes_plus_terminals() {
        let fg = BrightnessModel {
            bright: 10.0,
            dark: 1.0,
        };
        let bg = BrightnessModel {
            bright: 1.0,
            dark: 10.0,
        };
        let (_, _, network) = build_white_black(&fg, &bg);

        assert_eq!(network.node_count(), 6);
        assert_eq!(network.source(), 4);
        assert_eq!(network.sink(), 5);

        // Every pixel has both terminal links.
        for id in 0..4 {
            assert!(network.edges(network.source()).iter().any(|e| e.to == id));
            assert!(network.edges(id).iter().any(|e| e.to == network.sink()));
        }
    }

    #[test]
    fn terminal_capacities_truncate_toward_zero() {
        let fg = BrightnessModel {
            bright: 1.119,
            dark: 0.0,
        };
        let bg = BrightnessModel {
            bright: 0.999,
            dark: 0.0,
        };
        let (_, _, network) = build_white_black(&fg, &bg);

        // White pixel 0: 1.119 * 100 -> 111, 0.999 * 100 -> 99.
        assert_eq!(arc_capacity(&network, network.source(), 0), 111);
        assert_eq!(arc_capacity(&network, 0, network.sink()), 99);
    }

    #[test]
    fn negative_scores_are_clamped_to_zero() {
        let (_, _, network) = build_white_black(&NegativeModel, &NegativeModel);

        for id in 0..4 {
            assert_eq!(arc_capacity(&network, network.source(), id), 0);
            assert_eq!(arc_capacity(&network, id, network.sink()), 0);
        }
    }

    #[test]
    fn missing_models_give_neutral_terminals() {
        let image = white_over_black();
        let mask = Mask::new(2, 2, Label::ProbableForeground);
        let weights = NeighborWeights::compute(&image, 50.0);
        let network = build_graph(&image, &mask, None, None, &weights, 50.0);

        assert_eq!(arc_capacity(&network, network.source(), 0), 0);
        assert_eq!(arc_capacity(&network, 3, network.sink()), 0);
    }

    #[test]
    fn smoothness_arcs_are_symmetric() {
        let fg = BrightnessModel {
            bright: 10.0,
            dark: 1.0,
        };
        let bg = BrightnessModel {
            bright: 1.0,
            dark: 10.0,
        };
        let (image, _, network) = build_white_black(&fg, &bg);
        let width = image.width();

        let pairs = [
            (node_id(0, 0, width), node_id(1, 0, width)), // left
            (node_id(0, 0, width), node_id(0, 1, width)), // up
            (node_id(0, 0, width), node_id(1, 1, width)), // up-left diagonal
            (node_id(1, 0, width), node_id(0, 1, width)), // up-right diagonal
        ];
        for (p, q) in pairs {
            let forward = arc_capacity(&network, p, q);
            let backward = arc_capacity(&network, q, p);
            assert_eq!(forward, backward);
            assert!(forward > 0);
        }
    }

    #[test]
    fn hard_labels_are_pinned() {
        let image = white_over_black();
        let mut mask = Mask::new(2, 2, Label::ProbableForeground);
        mask.set(0, 0, Label::Foreground);
        mask.set(1, 1, Label::Background);
        let weights = NeighborWeights::compute(&image, 50.0);
        let network = build_graph(&image, &mask, None, None, &weights, 50.0);

        let lambda = 45_000;
        assert_eq!(arc_capacity(&network, network.source(), 0), lambda);
        assert_eq!(arc_capacity(&network, 0, network.sink()), 0);
        assert_eq!(arc_capacity(&network, network.source(), 3), 0);
        assert_eq!(arc_capacity(&network, 3, network.sink()), lambda);
    }

    #[test]
    fn cut_skips_hard_labels_and_is_idempotent() {
        let image = white_over_black();
        let mut mask = Mask::new(2, 2, Label::ProbableForeground);
        mask.set(1, 0, Label::Background);

        let fg = BrightnessModel {
            bright: 50.0,
            dark: 0.0,
        };
        let bg = BrightnessModel {
            bright: 0.0,
            dark: 50.0,
        };
        let weights = NeighborWeights::compute(&image, 50.0);
        let mut network = build_graph(&image, &mask, Some(&fg), Some(&bg), &weights, 50.0);
        network.max_flow(None).unwrap();

        apply_cut(&network, &mut mask);
        let first = mask.clone();
        apply_cut(&network, &mut mask);

        assert_eq!(mask, first);
        assert_eq!(mask.get(1, 0), Label::Background);
    }

    /// Exhaustively check max-flow/min-cut duality on the 2x2 scenario:
    /// the solver's total equals the cheapest of all pixel bipartitions,
    /// and the extracted source side achieves it.
    #[test]
    fn solver_cut_matches_exhaustive_minimum() {
        let fg = BrightnessModel {
            bright: 60.0,
            dark: 5.0,
        };
        let bg = BrightnessModel {
            bright: 5.0,
            dark: 60.0,
        };
        let (_, mut mask, mut network) = build_white_black(&fg, &bg);
        let flow = network.max_flow(None).unwrap();

        let mut best = i64::MAX;
        for subset in 0u32..16 {
            let mut side = vec![false; network.node_count()];
            side[network.source()] = true;
            for pixel in 0..4 {
                side[pixel] = subset & (1 << pixel) != 0;
            }
            best = best.min(network.cut_capacity(&side));
        }

        assert_eq!(flow, best);
        assert_eq!(network.cut_capacity(&network.source_side()), flow);

        // Labels agree with the extracted side of the cut.
        let reachable = network.source_side();
        apply_cut(&network, &mut mask);
        for y in 0..2 {
            for x in 0..2 {
                let expected = if reachable[node_id(x, y, 2)] {
                    Label::ProbableForeground
                } else {
                    Label::ProbableBackground
                };
                assert_eq!(mask.get(x, y), expected);
            }
        }
    }
}
