use std::str::FromStr;

use image::GrayImage;

use crate::error::{Result, SegmentationError};

/// Per-pixel segmentation label.
///
/// The numeric values are the on-disk mask encoding (shared with the
/// OpenCV-style grabcut tools), so seed masks round-trip through ordinary
/// grayscale images. `Background`/`Foreground` are hard user constraints;
/// the provisional pair is what inference rewrites each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Label {
    Background = 0,
    Foreground = 1,
    ProbableBackground = 2,
    ProbableForeground = 3,
}

impl Label {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Label::Background),
            1 => Some(Label::Foreground),
            2 => Some(Label::ProbableBackground),
            3 => Some(Label::ProbableForeground),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Counts toward the foreground class (hard or probable)
    pub fn is_foreground(self) -> bool {
        matches!(self, Label::Foreground | Label::ProbableForeground)
    }

    /// Subject to revision by inference; hard labels are not
    pub fn is_provisional(self) -> bool {
        matches!(self, Label::ProbableBackground | Label::ProbableForeground)
    }
}

/// Dense row-major label grid, co-indexed with the image pixels.
///
/// This is the only state carried across refinement rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    labels: Vec<Label>,
}

impl Mask {
    pub fn new(width: u32, height: u32, fill: Label) -> Self {
        Self {
            width,
            height,
            labels: vec![fill; (width * height) as usize],
        }
    }

    /// Seed a mask from a rectangle: everything probable background, the
    /// rectangle interior probable foreground.
    pub fn from_rect(width: u32, height: u32, rect: &SeedRect) -> Result<Self> {
        rect.validate(width, height)?;
        let mut mask = Mask::new(width, height, Label::ProbableBackground);
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                mask.set(x, y, Label::ProbableForeground);
            }
        }
        Ok(mask)
    }

    /// Read a four-level seed mask from a grayscale image.
    pub fn from_gray(image: &GrayImage) -> Result<Self> {
        let mut labels = Vec::with_capacity((image.width() * image.height()) as usize);
        for (x, y, pixel) in image.enumerate_pixels() {
            let label = Label::from_byte(pixel[0]).ok_or(SegmentationError::InvalidMaskValue {
                value: pixel[0],
                x,
                y,
            })?;
            labels.push(label);
        }
        Ok(Self {
            width: image.width(),
            height: image.height(),
            labels,
        })
    }

    /// Write the raw label bytes, reusable later as a seed via `from_gray`.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([self.get(x, y).as_byte()])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Label {
        self.labels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, label: Label) {
        self.labels[(y * self.width + x) as usize] = label;
    }

    /// (foreground, background) pixel counts over both hard and probable
    pub fn class_counts(&self) -> (usize, usize) {
        let foreground = self.labels.iter().filter(|l| l.is_foreground()).count();
        (foreground, self.labels.len() - foreground)
    }
}

/// Seed rectangle marking the probable-foreground region
#[derive(Debug, Clone, Copy)]
pub struct SeedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SeedRect {
    pub fn validate(&self, image_width: u32, image_height: u32) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SegmentationError::EmptyRect {
                width: self.width,
                height: self.height,
            });
        }
        if self.x as u64 + self.width as u64 > image_width as u64
            || self.y as u64 + self.height as u64 > image_height as u64
        {
            return Err(SegmentationError::RectOutOfBounds {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                image_width,
                image_height,
            });
        }
        Ok(())
    }
}

impl FromStr for SeedRect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected x,y,w,h but got '{s}'"));
        }
        let mut values = [0u32; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| format!("'{part}' is not a valid integer"))?;
        }
        Ok(SeedRect {
            x: values[0],
            y: values[1],
            width: values[2],
            height: values[3],
        })
    }
}

/// Tunables for the refinement loop
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// Smoothness scale for neighbor coherence
    pub gamma: f64,
    /// Number of refit/recut rounds
    pub iterations: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            gamma: 50.0,
            iterations: 2,
        }
    }
}
