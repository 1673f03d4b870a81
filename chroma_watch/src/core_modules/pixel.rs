// THEORY (Single-Pixel Color Space):
// The `pixel` module is the most fundamental unit of the alarm engine. A `Pixel` is
// a "dumb" data container for the three color channels of one sample, plus the
// single-pixel transform every higher layer leans on: RGB → HSV.
//
// Key principles:
// 1) Single-pixel scope: nothing here reads neighbors or history.
// 2) HSV is derived, never stored. The classifier asks for it only when a rule
//    actually has an HSV bound, so the hot loop stays on raw channel compares.
// 3) Determinism: the hue sector is picked by the maximal channel, with ties
//    resolved red, then green, then blue.
//
// Channels are normalized to f64 before the conversion.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Channel = u8;
pub type NormalizedChannel = f64;
pub type Hue = f64;
pub type Saturation = f64;
pub type Value = f64;

/// Bytes per pixel in the RGBA buffers delivered by frame sources.
pub const RGBA_STRIDE: usize = 4;

/// The three color channels a predicate may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelName {
    Red,
    Green,
    Blue,
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelName::Red => "red",
            ChannelName::Green => "green",
            ChannelName::Blue => "blue",
        };
        f.write_str(name)
    }
}

/// A single RGB sample. Alpha never reaches this type; it is skipped while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    /// The red channel value (0-255).
    pub red: Channel,
    /// The green channel value (0-255).
    pub green: Channel,
    /// The blue channel value (0-255).
    pub blue: Channel,
}

impl Pixel {
    pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
        Pixel { red, green, blue }
    }

    /// Reads the leading RGB bytes of one interleaved channel tuple.
    /// Anything past the third byte (alpha, padding) is ignored.
    #[inline]
    pub fn from_tuple(tuple: &[u8]) -> Self {
        Pixel::new(tuple[0], tuple[1], tuple[2])
    }

    #[inline]
    pub fn channel(&self, name: ChannelName) -> Channel {
        match name {
            ChannelName::Red => self.red,
            ChannelName::Green => self.green,
            ChannelName::Blue => self.blue,
        }
    }

    /// The two channels that are not `name`, in red/green/blue order.
    #[inline]
    pub fn other_channels(&self, name: ChannelName) -> (Channel, Channel) {
        match name {
            ChannelName::Red => (self.green, self.blue),
            ChannelName::Green => (self.red, self.blue),
            ChannelName::Blue => (self.red, self.green),
        }
    }

    #[inline]
    pub fn hsv(&self) -> Hsv {
        rgb_to_hsv(self.red, self.green, self.blue)
    }
}

/// Checked construction for sources that hand over wider integers than `u8`.
impl TryFrom<[i32; 3]> for Pixel {
    type Error = CoreError;

    fn try_from(channels: [i32; 3]) -> Result<Self, Self::Error> {
        let [red, green, blue] = channels;
        Ok(Pixel::new(
            checked_channel(ChannelName::Red, red)?,
            checked_channel(ChannelName::Green, green)?,
            checked_channel(ChannelName::Blue, blue)?,
        ))
    }
}

fn checked_channel(channel: ChannelName, value: i32) -> Result<Channel, CoreError> {
    Channel::try_from(value).map_err(|_| CoreError::InvalidChannelValue { channel, value })
}

/// Cylindrical coordinates of a pixel.
///
/// - `hue` in degrees, [0, 360).
/// - `saturation` and `value` as percentages, [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub hue: Hue,
    pub saturation: Saturation,
    pub value: Value,
}

impl Hsv {
    /// Integer-rounded coordinates, as some threshold sets are tuned against.
    /// A hue that rounds up to 360 wraps back to 0.
    pub fn rounded(self) -> Self {
        let hue = self.hue.round();
        Hsv {
            hue: if hue >= 360.0 { hue - 360.0 } else { hue },
            saturation: self.saturation.round(),
            value: self.value.round(),
        }
    }
}

/// Converts an RGB triple to HSV.
///
/// Achromatic input (all channels equal) has hue 0. Saturation is 0 for black.
pub fn rgb_to_hsv(red: Channel, green: Channel, blue: Channel) -> Hsv {
    let red_normalized = red as NormalizedChannel / 255.0;
    let green_normalized = green as NormalizedChannel / 255.0;
    let blue_normalized = blue as NormalizedChannel / 255.0;

    let maximum_channel = red_normalized.max(green_normalized.max(blue_normalized));
    let minimum_channel = red_normalized.min(green_normalized.min(blue_normalized));
    let chroma = maximum_channel - minimum_channel;

    let saturation = if maximum_channel > 0.0 {
        chroma / maximum_channel
    } else {
        0.0
    };

    let hue = if chroma == 0.0 {
        0.0
    } else {
        // Sector ties resolve red, then green, then blue.
        let (base_difference, sector_offset) = if maximum_channel == red_normalized {
            (green_normalized - blue_normalized, 0.0)
        } else if maximum_channel == green_normalized {
            (blue_normalized - red_normalized, 2.0)
        } else {
            (red_normalized - green_normalized, 4.0)
        };

        let mut hue_degrees = (base_difference / chroma + sector_offset) * 60.0;
        if hue_degrees < 0.0 {
            hue_degrees += 360.0;
        }
        hue_degrees
    };

    Hsv {
        hue,
        saturation: saturation * 100.0,
        value: maximum_channel * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn primaries_land_on_sector_starts() {
        let red = rgb_to_hsv(255, 0, 0);
        assert!(close(red.hue, 0.0) && close(red.saturation, 100.0) && close(red.value, 100.0));

        let green = rgb_to_hsv(0, 255, 0);
        assert!(close(green.hue, 120.0));

        let blue = rgb_to_hsv(0, 0, 255);
        assert!(close(blue.hue, 240.0));
    }

    #[test]
    fn negative_red_sector_wraps() {
        // Magenta-leaning red: blue above green puts the raw hue below zero.
        let hsv = rgb_to_hsv(255, 0, 51);
        assert!(close(hsv.hue, 348.0));
    }

    #[test]
    fn ties_prefer_red_then_green() {
        // Yellow: red and green tie for the maximum, red's sector wins.
        assert!(close(rgb_to_hsv(255, 255, 0).hue, 60.0));
        // Cyan: green and blue tie, green's sector wins.
        assert!(close(rgb_to_hsv(0, 255, 255).hue, 180.0));
        // Magenta: red and blue tie, red's sector wins and wraps.
        assert!(close(rgb_to_hsv(255, 0, 255).hue, 300.0));
    }

    #[test]
    fn black_has_zero_saturation() {
        let hsv = rgb_to_hsv(0, 0, 0);
        assert_eq!(hsv, Hsv { hue: 0.0, saturation: 0.0, value: 0.0 });
    }

    #[test]
    fn rounding_wraps_full_turn() {
        let hsv = Hsv { hue: 359.7, saturation: 84.5, value: 99.2 }.rounded();
        assert_eq!(hsv, Hsv { hue: 0.0, saturation: 85.0, value: 99.0 });
    }

    #[test]
    fn wide_channels_are_checked() {
        assert_eq!(Pixel::try_from([1, 2, 3]), Ok(Pixel::new(1, 2, 3)));
        assert_eq!(
            Pixel::try_from([0, 256, 0]),
            Err(CoreError::InvalidChannelValue { channel: ChannelName::Green, value: 256 })
        );
        assert_eq!(
            Pixel::try_from([-1, 0, 0]),
            Err(CoreError::InvalidChannelValue { channel: ChannelName::Red, value: -1 })
        );
    }

    #[test]
    fn tuple_ignores_alpha() {
        assert_eq!(Pixel::from_tuple(&[9, 8, 7, 0]), Pixel::new(9, 8, 7));
    }
}
