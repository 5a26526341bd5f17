//! Pixel-wise averaging of 16-bit frames.
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Result};
use image::{io::Reader, DynamicImage};
use ndarray::{Array2, Zip};

/// Decode a 16-bit single channel image as a
/// `(height, width)` array.
///
/// Other pixel formats are rejected rather than rescaled:
/// an 8-bit or colour frame in a radiometric sequence is
/// not comparable to the raw counts around it.
pub fn load_gray16(path: &Path) -> Result<Array2<u16>> {
    let image = Reader::open(path)?.with_guessed_format()?.decode()?;
    let buffer = match image {
        DynamicImage::ImageLuma16(buffer) => buffer,
        other => bail!(
            "unsupported pixel format {:?}: expected 16-bit grayscale",
            other.color()
        ),
    };
    let (width, height) = buffer.dimensions();
    Ok(Array2::from_shape_vec(
        (height as usize, width as usize),
        buffer.into_raw(),
    )?)
}

/// Running `f64` sum of equally-shaped frames.
#[derive(Debug, Default)]
pub struct StackAccumulator {
    sum: Option<Array2<f64>>,
    count: usize,
}

impl StackAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame. Fails if its shape differs from the
    /// frames added before.
    pub fn add(&mut self, frame: &Array2<u16>) -> Result<()> {
        match self.sum {
            Some(ref mut sum) => {
                ensure!(
                    sum.dim() == frame.dim(),
                    "frame is {}x{} but the stack is {}x{}",
                    frame.ncols(),
                    frame.nrows(),
                    sum.ncols(),
                    sum.nrows()
                );
                Zip::from(sum)
                    .and(frame)
                    .for_each(|acc, &val| *acc += f64::from(val));
            }
            None => self.sum = Some(frame.mapv(f64::from)),
        }
        self.count += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> Result<Array2<f64>> {
        let sum = self
            .sum
            .as_ref()
            .ok_or_else(|| anyhow!("cannot average an empty stack"))?;
        Ok(sum / self.count as f64)
    }
}

/// Pixel-wise mean of `frames`.
pub fn average<'a, I>(frames: I) -> Result<Array2<f64>>
where
    I: IntoIterator<Item = &'a Array2<u16>>,
{
    let mut stack = StackAccumulator::new();
    for frame in frames {
        stack.add(frame)?;
    }
    stack.mean()
}

/// Round to the nearest count and clamp into `u16`.
pub fn to_u16(mean: &Array2<f64>) -> Array2<u16> {
    mean.mapv(|val| val.round().max(0.).min(u16::MAX as f64) as u16)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use image::{GrayImage, ImageBuffer, Luma};
    use ndarray::{arr2, Array2};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn identical_frames_average_to_themselves() -> Result<()> {
        let frame = arr2(&[[0u16, 1, 65535], [1200, 30000, 7]]);
        let frames = vec![frame.clone(); 5];
        assert_eq!(to_u16(&average(&frames)?), frame);
        Ok(())
    }

    #[test]
    fn averages_pixel_wise() -> Result<()> {
        let a = arr2(&[[100u16, 200], [300, 400]]);
        let b = arr2(&[[300u16, 200], [100, 0]]);
        let mean = average(vec![&a, &b])?;
        assert_eq!(mean, arr2(&[[200., 200.], [200., 200.]]));
        Ok(())
    }

    #[test]
    fn mismatched_dimensions_fail() {
        let a = Array2::<u16>::zeros((4, 3));
        let b = Array2::<u16>::zeros((3, 4));
        let err = average(vec![&a, &b]).unwrap_err();
        assert!(err.to_string().contains("3x4"));
    }

    #[test]
    fn empty_stack_fails() {
        let stack = StackAccumulator::new();
        assert!(stack.is_empty());
        assert!(stack.mean().is_err());
        assert!(average(Vec::<&Array2<u16>>::new()).is_err());
    }

    #[test]
    fn rounds_and_clamps() {
        let mean = arr2(&[[-3.0, 1.4], [1.6, 70000.0]]);
        assert_eq!(to_u16(&mean), arr2(&[[0u16, 1], [2, 65535]]));
    }

    #[test]
    fn loads_16_bit_and_rejects_8_bit() -> Result<()> {
        let dir = tempdir()?;

        let wide: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(3, 2, vec![1, 2, 3, 4, 5, 60000]).unwrap();
        let wide_path = dir.path().join("wide.png");
        wide.save(&wide_path)?;
        assert_eq!(
            load_gray16(&wide_path)?,
            arr2(&[[1u16, 2, 3], [4, 5, 60000]])
        );

        let narrow_path = dir.path().join("narrow.png");
        GrayImage::new(3, 2).save(&narrow_path)?;
        assert!(load_gray16(&narrow_path).is_err());
        Ok(())
    }
}
