mod error;
mod graph;
mod model;
mod segmentation;

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::{Rgb, RgbImage};
use segmentation::{Mask, Params, SeedRect};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image path
    image: PathBuf,

    /// Seed rectangle as x,y,w,h; its interior starts as probable foreground
    #[arg(short, long)]
    rect: Option<SeedRect>,

    /// Four-level seed mask image (0=background, 1=foreground,
    /// 2=probable background, 3=probable foreground)
    #[arg(short, long)]
    mask: Option<PathBuf>,

    /// Refinement rounds
    #[arg(long, default_value_t = 2)]
    iterations: u32,

    /// Smoothness scale between neighboring pixels
    #[arg(long, default_value_t = 50.0)]
    gamma: f64,

    /// Mixture components per color model
    #[arg(long, default_value_t = 4)]
    components: usize,

    /// Output path for the extracted foreground (over white)
    #[arg(short, long, default_value = "cutout.png")]
    output: PathBuf,

    /// Write a label visualization (foreground white, background gray)
    #[arg(long)]
    mask_output: Option<PathBuf>,

    /// Write the raw label bytes, reusable later via --mask
    #[arg(long)]
    labels_output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Cutout starting");

    let image = image::open(&args.image)
        .with_context(|| format!("Failed to load image from {}", args.image.display()))?
        .to_rgb8();
    tracing::info!(
        "Loaded {} ({}x{})",
        args.image.display(),
        image.width(),
        image.height()
    );

    let mut mask = build_seed(&args, &image)?;

    let params = Params {
        gamma: args.gamma,
        iterations: args.iterations,
    };
    let fitter = model::default_fitter(args.components);

    let summary = segmentation::segment(&image, &mut mask, fitter.as_ref(), &params)
        .context("Segmentation failed")?;
    let (fg_count, bg_count) = mask.class_counts();
    tracing::info!(
        "Finished after {} rounds: {} foreground / {} background pixels",
        summary.rounds,
        fg_count,
        bg_count
    );

    let cutout = render_cutout(&image, &mask);
    cutout
        .save(&args.output)
        .with_context(|| format!("Failed to write cutout to {}", args.output.display()))?;
    tracing::info!("Wrote cutout to {}", args.output.display());

    if let Some(path) = &args.mask_output {
        render_labels(&mask)
            .save(path)
            .with_context(|| format!("Failed to write mask visualization to {}", path.display()))?;
        tracing::info!("Wrote mask visualization to {}", path.display());
    }

    if let Some(path) = &args.labels_output {
        mask.to_gray()
            .save(path)
            .with_context(|| format!("Failed to write labels to {}", path.display()))?;
        tracing::info!("Wrote raw labels to {}", path.display());
    }

    Ok(())
}

/// Build the initial mask from whichever seed the user provided.
fn build_seed(args: &Args, image: &RgbImage) -> Result<Mask> {
    if let Some(path) = &args.mask {
        let seed = image::open(path)
            .with_context(|| format!("Failed to load seed mask from {}", path.display()))?
            .to_luma8();
        let mask = Mask::from_gray(&seed).context("Seed mask is not a valid label image")?;
        if (mask.width(), mask.height()) != image.dimensions() {
            bail!(
                "seed mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            );
        }
        return Ok(mask);
    }
    if let Some(rect) = &args.rect {
        tracing::info!(
            "Seeding from rectangle {},{} {}x{}",
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        return Mask::from_rect(image.width(), image.height(), rect)
            .context("Invalid seed rectangle");
    }
    bail!("either --rect or --mask is required to seed the segmentation");
}

/// Foreground pixels over a white backdrop
fn render_cutout(image: &RgbImage, mask: &Mask) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if mask.get(x, y).is_foreground() {
            *image.get_pixel(x, y)
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// Foreground white, background dark gray
fn render_labels(mask: &Mask) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get(x, y).is_foreground() {
            Rgb([255, 255, 255])
        } else {
            Rgb([64, 64, 64])
        }
    })
}
