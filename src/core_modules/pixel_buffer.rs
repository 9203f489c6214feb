// THEORY:
// The `PixelBuffer` module represents one sampled video frame. It is the unit the
// external frame sampler hands to the pipeline once per tick, and the unit the
// motion estimator compares against its predecessor.
//
// Key architectural principles:
// 1.  **Immutable Snapshot**: A buffer is built once, validated once, and never
//     mutated afterwards. The pipeline retains at most the previous buffer per
//     source for differencing, then drops it.
// 2.  **Flat Storage**: Pixels are stored as a flat, row-major `Vec<u8>` of RGB
//     triples. This keeps frame hand-off a single allocation and lets the
//     estimator walk two frames in lockstep with `chunks_exact`.
// 3.  **Data Container**: Like `Pixel`, `PixelBuffer` is a "dumb" data container.
//     It knows its shape and how to hand out pixels. It does not know how to
//     compare itself with other frames; that belongs to the estimator.

pub mod pixel_buffer {
    use crate::core_modules::pixel::pixel::{Byte, CHANNELS, Pixel};
    use thiserror::Error;

    const RGBA_CHANNELS: usize = 4;

    /// Errors raised while constructing a frame.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum FrameError {
        #[error("Frame data length {actual} does not match {width}x{height} with {channels} channels (expected {expected})")]
        LengthMismatch {
            width: u32,
            height: u32,
            channels: usize,
            expected: usize,
            actual: usize,
        },
    }

    /// An immutable RGB frame of `width * height` pixels.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PixelBuffer {
        width: u32,
        height: u32,
        data: Vec<Byte>,
    }

    impl PixelBuffer {
        /// Builds a buffer from row-major RGB bytes.
        pub fn new(width: u32, height: u32, data: Vec<Byte>) -> Result<Self, FrameError> {
            let expected = Self::expected_len(width, height, CHANNELS);
            if data.len() != expected {
                return Err(FrameError::LengthMismatch {
                    width,
                    height,
                    channels: CHANNELS,
                    expected,
                    actual: data.len(),
                });
            }
            Ok(Self {
                width,
                height,
                data,
            })
        }

        /// Builds a buffer from row-major RGBA bytes, discarding alpha.
        pub fn from_rgba(width: u32, height: u32, rgba: &[Byte]) -> Result<Self, FrameError> {
            let expected = Self::expected_len(width, height, RGBA_CHANNELS);
            if rgba.len() != expected {
                return Err(FrameError::LengthMismatch {
                    width,
                    height,
                    channels: RGBA_CHANNELS,
                    expected,
                    actual: rgba.len(),
                });
            }
            let mut data = Vec::with_capacity(Self::expected_len(width, height, CHANNELS));
            for rgba_pixel in rgba.chunks_exact(RGBA_CHANNELS) {
                data.extend_from_slice(&rgba_pixel[..CHANNELS]);
            }
            Ok(Self {
                width,
                height,
                data,
            })
        }

        /// A frame where every pixel has the same colour.
        pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
            let count = width as usize * height as usize;
            let mut data = Vec::with_capacity(count * CHANNELS);
            for _ in 0..count {
                data.extend_from_slice(&[pixel.red, pixel.green, pixel.blue]);
            }
            Self {
                width,
                height,
                data,
            }
        }

        /// A frame whose pixels are produced by `f(x, y)`, row by row.
        pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
        where
            F: FnMut(u32, u32) -> Pixel,
        {
            let mut data = Vec::with_capacity(Self::expected_len(width, height, CHANNELS));
            for y in 0..height {
                for x in 0..width {
                    let pixel = f(x, y);
                    data.extend_from_slice(&[pixel.red, pixel.green, pixel.blue]);
                }
            }
            Self {
                width,
                height,
                data,
            }
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        pub fn pixel_count(&self) -> usize {
            self.width as usize * self.height as usize
        }

        pub fn is_empty(&self) -> bool {
            self.pixel_count() == 0
        }

        /// True when both frames have identical dimensions.
        pub fn same_shape(&self, other: &PixelBuffer) -> bool {
            self.width == other.width && self.height == other.height
        }

        /// The raw row-major RGB bytes.
        pub fn as_bytes(&self) -> &[Byte] {
            &self.data
        }

        /// Iterates over every pixel in row-major order.
        pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
            self.data
                .chunks_exact(CHANNELS)
                .map(|rgb| Pixel::new(rgb[0], rgb[1], rgb[2]))
        }

        /// The pixel at `(x, y)`, or `None` when out of bounds.
        pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
            if x >= self.width || y >= self.height {
                return None;
            }
            let index = (y as usize * self.width as usize + x as usize) * CHANNELS;
            Some(Pixel::new(
                self.data[index],
                self.data[index + 1],
                self.data[index + 2],
            ))
        }

        pub fn into_bytes(self) -> Vec<Byte> {
            self.data
        }

        fn expected_len(width: u32, height: u32, channels: usize) -> usize {
            width as usize * height as usize * channels
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel_buffer::*;
    use crate::core_modules::pixel::pixel::Pixel;

    #[test]
    fn new_rejects_wrong_length() {
        let result = PixelBuffer::new(2, 2, vec![0u8; 11]);
        assert!(matches!(
            result,
            Err(FrameError::LengthMismatch {
                expected: 12,
                actual: 11,
                ..
            })
        ));
    }

    #[test]
    fn rgba_input_drops_alpha() {
        let rgba = [1u8, 2, 3, 255, 4, 5, 6, 0];
        let buffer = PixelBuffer::from_rgba(2, 1, &rgba).unwrap();
        assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(buffer.pixel(1, 0), Some(Pixel::new(4, 5, 6)));
    }

    #[test]
    fn rgba_input_length_is_checked() {
        assert!(PixelBuffer::from_rgba(2, 1, &[0u8; 6]).is_err());
    }

    #[test]
    fn filled_and_from_fn_agree() {
        let filled = PixelBuffer::filled(3, 2, Pixel::grey(9));
        let generated = PixelBuffer::from_fn(3, 2, |_, _| Pixel::grey(9));
        assert_eq!(filled, generated);
        assert_eq!(filled.pixel_count(), 6);
        assert_eq!(filled.pixels().count(), 6);
    }

    #[test]
    fn pixel_lookup_is_row_major_and_bounded() {
        let buffer = PixelBuffer::from_fn(4, 3, |x, y| Pixel::new(x as u8, y as u8, 0));
        assert_eq!(buffer.pixel(3, 2), Some(Pixel::new(3, 2, 0)));
        assert_eq!(buffer.pixel(4, 0), None);
        assert_eq!(buffer.pixel(0, 3), None);
    }

    #[test]
    fn shape_comparison() {
        let a = PixelBuffer::filled(4, 4, Pixel::default());
        let b = PixelBuffer::filled(4, 4, Pixel::grey(200));
        let c = PixelBuffer::filled(4, 2, Pixel::default());
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }
}
