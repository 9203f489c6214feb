// THEORY:
// The `Pixel` module is the most fundamental unit of the motion pipeline. It is a
// "dumb" data container for a single RGB sample plus the one comparison the
// estimator needs: the summed absolute channel difference against another pixel.
//
// Key principles:
// 1) Single-pixel scope: nothing here knows about neighbours, frames or time.
// 2) Three channels only. Camera frames that arrive as RGBA have their alpha
//    dropped before they ever become a `Pixel`; transparency is never motion.
// 3) Integer math. Channel deltas are exact so that two estimates over the same
//    pair of frames are bit-identical.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type ChannelDelta = u32;

    /// Number of colour channels carried by every pixel.
    pub const CHANNELS: usize = 3;

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        /// A grey pixel with every channel set to `value`.
        pub fn grey(value: Channel) -> Self {
            Pixel::new(value, value, value)
        }

        /// Sum of the absolute per-channel differences between two pixels.
        ///
        /// Ranges from 0 (identical) to 765 (black against white).
        pub fn abs_delta(&self, other: &Pixel) -> ChannelDelta {
            self.red.abs_diff(other.red) as ChannelDelta
                + self.green.abs_diff(other.green) as ChannelDelta
                + self.blue.abs_diff(other.blue) as ChannelDelta
        }
    }

    impl From<[Byte; CHANNELS]> for Pixel {
        fn from(bytes: [Byte; CHANNELS]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2])
        }
    }

    impl From<Pixel> for [Byte; CHANNELS] {
        fn from(pixel: Pixel) -> Self {
            [pixel.red, pixel.green, pixel.blue]
        }
    }
}
