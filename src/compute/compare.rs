//! Per-cell comparison of target and rendered bitmaps.

use rayon::prelude::*;

use super::bitmap::Bitmap;
use super::pipeline::PipelineError;

/// Normalized center of cell `i` on a `grid`-wide axis.
#[inline]
pub fn cell_center(i: u32, grid: u32) -> f32 {
    (i as f32 + 0.5) / grid as f32
}

/// Write one match flag per grid cell into `flags`.
///
/// Both bitmaps are sampled at each cell center; the flag is 1 when the two
/// samples are exactly equal. Flags are laid out `index = x * grid + y`.
/// Exact equality is only meaningful because both inputs are binary masks.
pub fn compare(
    source: &Bitmap,
    rendered: &Bitmap,
    grid: u32,
    flags: &mut [u32],
) -> Result<(), PipelineError> {
    if source.width() != rendered.width() || source.height() != rendered.height() {
        return Err(PipelineError::ResolutionMismatch {
            expected: (source.width(), source.height()),
            actual: (rendered.width(), rendered.height()),
        });
    }
    let cells = grid as usize * grid as usize;
    if grid == 0 || flags.len() < cells {
        return Err(PipelineError::ResultBuffer {
            required: cells,
            actual: flags.len(),
        });
    }

    flags[..cells]
        .par_chunks_mut(grid as usize)
        .enumerate()
        .for_each(|(x, column)| {
            let u = cell_center(x as u32, grid);
            for (y, flag) in column.iter_mut().enumerate() {
                let v = cell_center(y as u32, grid);
                *flag = (source.sample(u, v) == rendered.sample(u, v)) as u32;
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(size: u32) -> Bitmap {
        let mut bitmap = Bitmap::new(size, size);
        for y in 0..size {
            for x in 0..size {
                if (x + y) % 2 == 0 {
                    bitmap.cover(x, y);
                }
            }
        }
        bitmap
    }

    #[test]
    fn test_identical_images_match_everywhere() {
        let image = checker(256);
        let mut flags = vec![0u32; 256 * 256];
        compare(&image, &image.clone(), 256, &mut flags).unwrap();

        assert!(flags.iter().all(|&f| f == 1));
        assert_eq!(flags.iter().sum::<u32>(), 65536);
    }

    #[test]
    fn test_opposite_images_match_nowhere() {
        let empty = Bitmap::filled(64, 64, false);
        let full = Bitmap::filled(64, 64, true);
        let mut flags = vec![1u32; 32 * 32];

        compare(&full, &empty, 32, &mut flags).unwrap();
        assert!(flags.iter().all(|&f| f == 0));

        flags.fill(1);
        compare(&empty, &full, 32, &mut flags).unwrap();
        assert!(flags.iter().all(|&f| f == 0));
    }

    #[test]
    fn test_index_convention() {
        let source = Bitmap::new(4, 4);
        let mut rendered = Bitmap::new(4, 4);
        rendered.cover(1, 2);
        let mut flags = vec![0u32; 16];

        compare(&source, &rendered, 4, &mut flags).unwrap();
        assert_eq!(flags[4 + 2], 0);
        assert_eq!(flags.iter().filter(|&&f| f == 0).count(), 1);
    }

    #[test]
    fn test_resolution_mismatch() {
        let mut flags = vec![0u32; 16];
        let err = compare(&Bitmap::new(4, 4), &Bitmap::new(8, 8), 4, &mut flags);
        assert!(matches!(err, Err(PipelineError::ResolutionMismatch { .. })));
    }
}
