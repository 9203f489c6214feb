pub mod image_helper {
    use crate::core_modules::pixel_buffer::pixel_buffer::{FrameError, PixelBuffer};
    use image::{DynamicImage, ImageEncoder, RgbImage, RgbaImage};
    use std::path::Path;

    impl From<&RgbImage> for PixelBuffer {
        fn from(image: &RgbImage) -> Self {
            let (width, height) = image.dimensions();
            PixelBuffer::from_fn(width, height, |x, y| {
                let [red, green, blue] = image.get_pixel(x, y).0;
                crate::core_modules::pixel::pixel::Pixel::new(red, green, blue)
            })
        }
    }

    impl From<&RgbaImage> for PixelBuffer {
        fn from(image: &RgbaImage) -> Self {
            let (width, height) = image.dimensions();
            PixelBuffer::from_fn(width, height, |x, y| {
                let [red, green, blue, _alpha] = image.get_pixel(x, y).0;
                crate::core_modules::pixel::pixel::Pixel::new(red, green, blue)
            })
        }
    }

    impl From<&DynamicImage> for PixelBuffer {
        fn from(image: &DynamicImage) -> Self {
            PixelBuffer::from(&image.to_rgb8())
        }
    }

    /// Decodes a still image from disk into a frame.
    pub fn load(path: impl AsRef<Path>) -> Result<PixelBuffer, image::ImageError> {
        let image = image::open(path)?;
        Ok(PixelBuffer::from(&image))
    }

    /// Writes a frame to disk as PNG. Handy when tuning thresholds against real footage.
    pub fn save(path: impl AsRef<Path>, buffer: &PixelBuffer) -> Result<(), image::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            buffer.as_bytes(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        Ok(())
    }

    /// Re-wraps a frame as an `image` buffer.
    pub fn to_rgb_image(buffer: &PixelBuffer) -> Result<RgbImage, FrameError> {
        RgbImage::from_raw(buffer.width(), buffer.height(), buffer.as_bytes().to_vec()).ok_or(
            FrameError::LengthMismatch {
                width: buffer.width(),
                height: buffer.height(),
                channels: 3,
                expected: buffer.pixel_count() * 3,
                actual: buffer.as_bytes().len(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn rgb_image_converts_pixel_for_pixel() {
        let image = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8, y as u8, 200]));
        let buffer = PixelBuffer::from(&image);
        assert_eq!(buffer.width(), 4);
        assert_eq!(buffer.height(), 3);
        assert_eq!(buffer.pixel(2, 1), Some(Pixel::new(2, 1, 200)));
    }

    #[test]
    fn rgba_image_drops_alpha() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0]));
        let buffer = PixelBuffer::from(&image);
        assert!(buffer.pixels().all(|p| p == Pixel::new(10, 20, 30)));
    }

    #[test]
    fn save_then_load_gradient_file() {
        let buffer = PixelBuffer::from_fn(32, 16, |x, y| Pixel::new((x * 8) as u8, (y * 16) as u8, 64));
        let path = std::env::temp_dir().join(format!("motion_sentry_gradient_{}.png", std::process::id()));

        save(&path, &buffer).expect("Error Saving File.");
        let loaded = load(&path).expect("Error Loading File.");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, buffer);
    }

    #[test]
    fn round_trips_through_image_buffer() {
        let buffer = PixelBuffer::filled(5, 5, Pixel::new(1, 2, 3));
        let image = to_rgb_image(&buffer).unwrap();
        assert_eq!(PixelBuffer::from(&image), buffer);
    }
}
