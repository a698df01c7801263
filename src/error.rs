use thiserror::Error;

/// Result type for segmentation operations
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Errors surfaced by the segmentation pipeline
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// Image and mask dimensions disagree
    #[error("mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    DimensionMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    /// Seed rectangle has zero area
    #[error("seed rectangle {width}x{height} has no area")]
    EmptyRect { width: u32, height: u32 },

    /// Seed rectangle does not fit inside the image
    #[error("seed rectangle at ({x},{y}) size {width}x{height} exceeds image {image_width}x{image_height}")]
    RectOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Mask pixel holds a byte outside the four label values
    #[error("invalid mask value {value} at ({x},{y}); expected 0..=3")]
    InvalidMaskValue { value: u8, x: u32, y: u32 },

    /// A model was asked to fit an empty sample set
    #[error("cannot fit a color model to zero samples")]
    NoSamples,

    /// The solve was cancelled between phases
    #[error("segmentation cancelled")]
    Cancelled,
}
