//! Single-channel binary bitmaps.
//!
//! Both the target and every rendered candidate are coverage masks holding only
//! 0 and 255. The comparator tests samples for exact equality, which is only
//! meaningful under that precondition, so it is enforced on construction.

use std::path::Path;

use image::{GrayImage, ImageReader, Luma};

/// Value of a covered pixel.
pub const COVERED: u8 = 255;

/// Bitmap loading or validation errors.
#[derive(Debug, thiserror::Error)]
pub enum BitmapError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Pixel ({x}, {y}) has value {value}; expected 0 or 255")]
    NotBinary { x: u32, y: u32, value: u8 },
    #[error("Expected {expected} bytes for {width}x{height}, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Row-major binary mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// All-zero bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Bitmap with every pixel set to `value` (0 or 255).
    pub fn filled(width: u32, height: u32, covered: bool) -> Self {
        let value = if covered { COVERED } else { 0 };
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap raw row-major bytes, rejecting anything but 0/255.
    pub fn from_mask(width: u32, height: u32, data: Vec<u8>) -> Result<Self, BitmapError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(BitmapError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        if let Some(i) = data.iter().position(|&v| v != 0 && v != COVERED) {
            return Err(BitmapError::NotBinary {
                x: (i % width as usize) as u32,
                y: (i / width as usize) as u32,
                value: data[i],
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Threshold an image into a mask: luma `>= threshold` is covered.
    pub fn from_image(image: &GrayImage, threshold: u8) -> Self {
        let data = image
            .pixels()
            .map(|Luma([v])| if *v >= threshold { COVERED } else { 0 })
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    /// Load an image file and threshold its luma channel.
    pub fn load(path: impl AsRef<Path>, threshold: u8) -> Result<Self, BitmapError> {
        let image = ImageReader::open(path)?.decode()?.into_luma8();
        Ok(Self::from_image(&image, threshold))
    }

    /// Load an image that must already be a strict 0/255 mask.
    pub fn load_mask(path: impl AsRef<Path>) -> Result<Self, BitmapError> {
        let image = ImageReader::open(path)?.decode()?.into_luma8();
        let (width, height) = image.dimensions();
        Self::from_mask(width, height, image.into_raw())
    }

    /// Write as a grayscale PNG.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BitmapError> {
        self.to_image().save(path)?;
        Ok(())
    }

    pub fn to_image(&self) -> GrayImage {
        // Dimensions always match the buffer.
        GrayImage::from_fn(self.width, self.height, |x, y| Luma([self.get(x, y)]))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Set pixel `(x, y)` covered.
    #[inline]
    pub fn cover(&mut self, x: u32, y: u32) {
        let w = self.width as usize;
        self.data[y as usize * w + x as usize] = COVERED;
    }

    /// Set the pixel at a flat row-major index covered.
    #[inline]
    pub(crate) fn cover_index(&mut self, index: usize) {
        self.data[index] = COVERED;
    }

    /// Nearest-pixel sample at normalized coordinates in `[0, 1)`.
    #[inline]
    pub fn sample(&self, u: f32, v: f32) -> u8 {
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.get(x, y)
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Number of covered pixels.
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|&&v| v == COVERED).count()
    }

    /// Pixels as 0/255 words, the layout the GPU comparator reads.
    pub fn to_words(&self) -> Vec<u32> {
        self.data.iter().map(|&v| v as u32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mask_rejects_gray() {
        let err = Bitmap::from_mask(2, 2, vec![0, 255, 128, 0]).unwrap_err();
        assert!(matches!(
            err,
            BitmapError::NotBinary {
                x: 0,
                y: 1,
                value: 128
            }
        ));

        let err = Bitmap::from_mask(2, 2, vec![0; 3]).unwrap_err();
        assert!(matches!(err, BitmapError::SizeMismatch { .. }));
    }

    #[test]
    fn test_sample_cell_centers() {
        let mut bitmap = Bitmap::new(4, 4);
        bitmap.cover(3, 0);
        assert_eq!(bitmap.sample(0.875, 0.125), COVERED);
        assert_eq!(bitmap.sample(0.125, 0.125), 0);
        // Clamped at the far edge.
        assert_eq!(bitmap.sample(1.0, 0.0), COVERED);
    }

    #[test]
    fn test_png_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");

        let mut bitmap = Bitmap::new(8, 4);
        bitmap.cover(1, 2);
        bitmap.cover(7, 3);
        bitmap.save(&path).unwrap();

        let loaded = Bitmap::load_mask(&path).unwrap();
        assert_eq!(loaded, bitmap);
        assert_eq!(loaded.coverage(), 2);
    }

    #[test]
    fn test_threshold_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        let image = GrayImage::from_fn(4, 1, |x, _| Luma([(x * 80) as u8]));
        image.save(&path).unwrap();

        let bitmap = Bitmap::load(&path, 128).unwrap();
        assert_eq!(bitmap.data(), &[0, 0, COVERED, COVERED]);
    }
}
