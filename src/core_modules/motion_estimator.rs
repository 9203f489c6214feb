// THEORY:
// The `MotionEstimator` is the measurement layer of the pipeline. It turns two
// consecutive frames from the same source into a single scalar "intensity" on a
// [0, 100] scale, plus a couple of auxiliary counts that are useful for tuning.
//
// The algorithm is the simplest one that works for a dashboard:
// 1.  **Per-pixel difference**: For every pixel, sum the absolute differences of
//     the three channels between the previous and the current frame.
// 2.  **Mean channel delta**: Average those sums over every channel of every
//     pixel. Identical frames produce exactly 0.
// 3.  **Changed pixels**: A pixel whose summed difference exceeds the noise floor
//     counts as "changed". This count is informational; it does not feed the
//     intensity.
// 4.  **Intensity**: `min(mean_delta * sensitivity_multiplier, 100)`. A monotonic,
//     saturating map from raw delta onto the reportable range.
//
// There is no optical flow and no background model. Frames of different shapes
// (the camera changed resolution mid-stream) are not motion: they produce a zero
// reading instead of an error.

use crate::core_modules::clock::Timestamp;
use crate::core_modules::pixel::pixel::{CHANNELS, ChannelDelta};
use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_NOISE_FLOOR: ChannelDelta = 30;
pub const DEFAULT_SENSITIVITY_MULTIPLIER: f64 = 1.0;
pub const MAX_INTENSITY: f64 = 100.0;

/// The result of comparing two consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    /// Reportable change on a [0, 100] scale.
    pub intensity: f64,
    /// Pixels whose summed channel difference exceeded the noise floor.
    pub pixel_change_count: u64,
    /// Mean absolute difference per channel per pixel (0..=255).
    pub mean_channel_delta: f64,
    pub captured_at: Timestamp,
}

impl MotionReading {
    /// A reading that reports no motion at all.
    pub fn still(captured_at: Timestamp) -> Self {
        Self {
            intensity: 0.0,
            pixel_change_count: 0,
            mean_channel_delta: 0.0,
            captured_at,
        }
    }
}

/// Tunables for the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// Scales the raw mean delta into the reportable range.
    pub sensitivity_multiplier: f64,
    /// Summed per-pixel difference a pixel must exceed to count as changed.
    pub noise_floor: ChannelDelta,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            sensitivity_multiplier: DEFAULT_SENSITIVITY_MULTIPLIER,
            noise_floor: DEFAULT_NOISE_FLOOR,
        }
    }
}

/// A stateless frame-difference estimator.
#[derive(Debug, Clone, Default)]
pub struct MotionEstimator {
    settings: EstimatorSettings,
}

impl MotionEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Compares `previous` against `current`.
    ///
    /// Never fails: a shape mismatch or an empty frame yields a still reading.
    pub fn estimate(
        &self,
        previous: &PixelBuffer,
        current: &PixelBuffer,
        captured_at: Timestamp,
    ) -> MotionReading {
        if !previous.same_shape(current) {
            debug!(
                previous = format!("{}x{}", previous.width(), previous.height()),
                current = format!("{}x{}", current.width(), current.height()),
                "Frame shape changed, treating as no motion"
            );
            return MotionReading::still(captured_at);
        }

        let pixel_count = current.pixel_count();
        if pixel_count == 0 {
            return MotionReading::still(captured_at);
        }

        let mut total_delta: u64 = 0;
        let mut pixel_change_count: u64 = 0;

        for (before, after) in previous.pixels().zip(current.pixels()) {
            let delta = before.abs_delta(&after);
            total_delta += delta as u64;
            if delta > self.settings.noise_floor {
                pixel_change_count += 1;
            }
        }

        let mean_channel_delta = total_delta as f64 / (pixel_count * CHANNELS) as f64;
        let intensity = (mean_channel_delta * self.settings.sensitivity_multiplier).min(MAX_INTENSITY);

        MotionReading {
            intensity,
            pixel_change_count,
            mean_channel_delta,
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::clock::timestamp_from_millis;
    use crate::core_modules::pixel::pixel::Pixel;

    fn frame(value: u8) -> PixelBuffer {
        PixelBuffer::filled(8, 6, Pixel::grey(value))
    }

    fn at() -> Timestamp {
        timestamp_from_millis(1_000)
    }

    #[test]
    fn identical_frames_read_zero() {
        let estimator = MotionEstimator::default();
        let buffer = PixelBuffer::from_fn(8, 6, |x, y| Pixel::new(x as u8 * 20, y as u8 * 30, 7));
        let reading = estimator.estimate(&buffer, &buffer, at());
        assert_eq!(reading.intensity, 0.0);
        assert_eq!(reading.pixel_change_count, 0);
        assert_eq!(reading.mean_channel_delta, 0.0);
    }

    #[test]
    fn repeated_estimates_are_bit_identical() {
        let estimator = MotionEstimator::new(EstimatorSettings {
            sensitivity_multiplier: 0.7,
            noise_floor: 30,
        });
        let a = PixelBuffer::from_fn(16, 9, |x, y| Pixel::new((x * 13) as u8, (y * 29) as u8, 90));
        let b = PixelBuffer::from_fn(16, 9, |x, y| Pixel::new((y * 7) as u8, (x * 3) as u8, 11));
        let first = estimator.estimate(&a, &b, at());
        let second = estimator.estimate(&a, &b, at());
        assert_eq!(first.intensity.to_bits(), second.intensity.to_bits());
        assert_eq!(first.mean_channel_delta.to_bits(), second.mean_channel_delta.to_bits());
        assert_eq!(first, second);
    }

    #[test]
    fn uniform_shift_maps_directly_to_intensity() {
        let estimator = MotionEstimator::default();
        let reading = estimator.estimate(&frame(10), &frame(105), at());
        assert_eq!(reading.mean_channel_delta, 95.0);
        assert_eq!(reading.intensity, 95.0);
        assert_eq!(reading.pixel_change_count, 48);
    }

    #[test]
    fn intensity_saturates_at_one_hundred() {
        let estimator = MotionEstimator::default();
        let reading = estimator.estimate(&frame(0), &frame(255), at());
        assert_eq!(reading.mean_channel_delta, 255.0);
        assert_eq!(reading.intensity, MAX_INTENSITY);
    }

    #[test]
    fn intensity_never_decreases_as_delta_grows() {
        let estimator = MotionEstimator::new(EstimatorSettings {
            sensitivity_multiplier: 0.8,
            noise_floor: 30,
        });
        let base = frame(0);
        let mut last = -1.0;
        for step in 0..=255u8 {
            let reading = estimator.estimate(&base, &frame(step), at());
            assert!(reading.intensity >= last, "intensity dropped at delta {step}");
            last = reading.intensity;
        }
    }

    #[test]
    fn noise_floor_filters_small_pixel_changes() {
        let estimator = MotionEstimator::default();
        // 10 per channel sums to 30, which does not exceed the floor.
        let quiet = estimator.estimate(&frame(100), &frame(110), at());
        assert_eq!(quiet.pixel_change_count, 0);
        assert_eq!(quiet.intensity, 10.0);

        // 11 per channel sums to 33.
        let loud = estimator.estimate(&frame(100), &frame(111), at());
        assert_eq!(loud.pixel_change_count, 48);
    }

    #[test]
    fn partial_change_counts_only_changed_pixels() {
        let estimator = MotionEstimator::default();
        let before = PixelBuffer::filled(10, 10, Pixel::grey(0));
        let after = PixelBuffer::from_fn(10, 10, |x, _| if x < 5 { Pixel::grey(200) } else { Pixel::grey(0) });
        let reading = estimator.estimate(&before, &after, at());
        assert_eq!(reading.pixel_change_count, 50);
        assert_eq!(reading.mean_channel_delta, 100.0);
    }

    #[test]
    fn shape_mismatch_is_not_motion() {
        let estimator = MotionEstimator::default();
        let small = PixelBuffer::filled(4, 4, Pixel::grey(0));
        let large = PixelBuffer::filled(8, 8, Pixel::grey(255));
        let reading = estimator.estimate(&small, &large, at());
        assert_eq!(reading, MotionReading::still(at()));
    }

    #[test]
    fn empty_frames_are_still() {
        let estimator = MotionEstimator::default();
        let empty = PixelBuffer::filled(0, 0, Pixel::default());
        assert_eq!(estimator.estimate(&empty, &empty, at()).intensity, 0.0);
    }

    #[test]
    fn sensitivity_scales_intensity() {
        let estimator = MotionEstimator::new(EstimatorSettings {
            sensitivity_multiplier: 0.5,
            noise_floor: DEFAULT_NOISE_FLOOR,
        });
        let reading = estimator.estimate(&frame(0), &frame(60), at());
        assert_eq!(reading.intensity, 30.0);
    }
}
