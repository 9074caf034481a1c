//! Colours: parsing user colour names and building distinguishable palettes.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An opaque RGB colour. Transparency is applied at draw time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a colour from hue (degrees), saturation and value (0-1).
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        let (r, g, b) = hsv_to_rgb(h, s, v);
        Self { r, g, b }
    }

    /// Hue in degrees, `None` for greys.
    pub fn hue(&self) -> Option<f32> {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        if delta == 0.0 {
            return None;
        }

        let h = if max == r {
            60.0 * (((g - b) / delta).rem_euclid(6.0))
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        Some(h)
    }
}

/// Convert HSV to RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let h = h.rem_euclid(360.0);
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);

    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

/// `n` fully saturated colours with evenly spaced hues, starting at red.
///
/// The wheel is divided into `n` steps so the last colour never wraps back
/// onto the first.
pub fn hue_wheel(n: usize) -> Vec<Color> {
    (0..n)
        .map(|i| Color::from_hsv(360.0 * i as f32 / n as f32, 1.0, 1.0))
        .collect()
}

/// Colours for `n` region files.
///
/// The wheel is shuffled so neighbouring files in priority order do not get
/// neighbouring hues. Pass a seeded generator for reproducible output.
pub fn assign_colors<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<Color> {
    let mut colors = hue_wheel(n);
    colors.shuffle(rng);
    colors
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColor(pub String);

impl fmt::Display for UnknownColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown colour {:?} (use a name, a single letter or #rrggbb)", self.0)
    }
}

impl std::error::Error for UnknownColor {}

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if let Some(hex) = name.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| UnknownColor(s.to_string()));
        }

        let c = match name.as_str() {
            // matplotlib single-letter shorthands
            "b" => Color::rgb(0, 0, 255),
            "g" => Color::rgb(0, 128, 0),
            "r" => Color::rgb(255, 0, 0),
            "c" => Color::rgb(0, 191, 191),
            "m" => Color::rgb(191, 0, 191),
            "y" => Color::rgb(191, 191, 0),
            "k" | "black" => Color::BLACK,
            "w" | "white" => Color::WHITE,
            "silver" => Color::rgb(192, 192, 192),
            "lightgray" | "lightgrey" => Color::rgb(211, 211, 211),
            "gray" | "grey" => Color::rgb(128, 128, 128),
            "dimgray" | "dimgrey" => Color::rgb(105, 105, 105),
            "darkgray" | "darkgrey" => Color::rgb(169, 169, 169),
            "blue" => Color::rgb(0, 0, 255),
            "navy" => Color::rgb(0, 0, 128),
            "red" => Color::rgb(255, 0, 0),
            "green" => Color::rgb(0, 128, 0),
            "yellow" => Color::rgb(255, 255, 0),
            "orange" => Color::rgb(255, 165, 0),
            "purple" => Color::rgb(128, 0, 128),
            "brown" => Color::rgb(165, 42, 42),
            "tan" => Color::rgb(210, 180, 140),
            "beige" => Color::rgb(245, 245, 220),
            "lightblue" => Color::rgb(173, 216, 230),
            _ => return Err(UnknownColor(s.to_string())),
        };
        Ok(c)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Parse a colour that may be switched off with `none`.
pub fn parse_optional_color(s: &str) -> Result<Option<Color>, UnknownColor> {
    if s.trim().eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        s.parse().map(Some)
    }
}

/// Serde adapter for `Option<Color>` fields: `"none"` or `null` mean no colour.
pub mod optional_color {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_optional_color, Color};

    pub fn serialize<S: Serializer>(color: &Option<Color>, serializer: S) -> Result<S::Ok, S::Error> {
        match color {
            Some(c) => serializer.serialize_str(&c.to_string()),
            None => serializer.serialize_str("none"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Color>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_optional_color(&raw).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = UnknownColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn test_assign_len_matches() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for n in [0, 1, 2, 5, 17, 64] {
            assert_eq!(assign_colors(n, &mut rng).len(), n);
        }
    }

    #[test]
    fn test_zero_is_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(assign_colors(0, &mut rng).is_empty());
    }

    #[test]
    fn test_colors_pairwise_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let colors = assign_colors(40, &mut rng);
        let unique: HashSet<_> = colors.iter().collect();
        assert_eq!(unique.len(), 40);

        // Distinct by hue too, not just by channel rounding.
        let mut hues: Vec<f32> = colors.iter().map(|c| c.hue().unwrap()).collect();
        hues.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for pair in hues.windows(2) {
            assert!(pair[1] - pair[0] > 1.0, "hues too close: {:?}", pair);
        }
    }

    #[test]
    fn test_shuffle_keeps_palette() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut shuffled = assign_colors(12, &mut rng);
        let mut wheel = hue_wheel(12);
        let key = |c: &Color| (c.r, c.g, c.b);
        shuffled.sort_by_key(key);
        wheel.sort_by_key(key);
        assert_eq!(shuffled, wheel);
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let a = assign_colors(9, &mut ChaCha8Rng::seed_from_u64(99));
        let b = assign_colors(9, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_wheel_does_not_wrap() {
        let wheel = hue_wheel(4);
        assert_eq!(wheel[0], Color::rgb(255, 0, 0));
        assert_eq!(wheel[2], Color::rgb(0, 255, 255));
        assert_ne!(wheel[0], wheel[3]);
    }

    #[test]
    fn test_parse_names_and_hex() {
        assert_eq!("silver".parse::<Color>().unwrap(), Color::rgb(192, 192, 192));
        assert_eq!("b".parse::<Color>().unwrap(), Color::rgb(0, 0, 255));
        assert_eq!("#1A2b3C".parse::<Color>().unwrap(), Color::rgb(0x1a, 0x2b, 0x3c));
        assert!("#12345".parse::<Color>().is_err());
        assert!("chartreuse-ish".parse::<Color>().is_err());
        assert_eq!(parse_optional_color("None").unwrap(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Color::rgb(255, 0, 16)).unwrap();
        assert_eq!(json, "\"#ff0010\"");
        let back: Color = serde_json::from_str("\"dimgray\"").unwrap();
        assert_eq!(back, Color::rgb(105, 105, 105));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Outline {
        #[serde(with = "optional_color")]
        edge: Option<Color>,
    }

    #[test]
    fn test_optional_color_accepts_none() {
        let off: Outline = serde_json::from_str(r#"{"edge": "none"}"#).unwrap();
        assert_eq!(off.edge, None);
        let null: Outline = serde_json::from_str(r#"{"edge": null}"#).unwrap();
        assert_eq!(null.edge, None);
        let on: Outline = serde_json::from_str(r#"{"edge": "k"}"#).unwrap();
        assert_eq!(on.edge, Some(Color::BLACK));
        assert!(serde_json::from_str::<Outline>(r#"{"edge": "nope"}"#).is_err());

        assert_eq!(serde_json::to_string(&off).unwrap(), r#"{"edge":"none"}"#);
        let back: Outline = serde_json::from_str(&serde_json::to_string(&on).unwrap()).unwrap();
        assert_eq!(back, on);
    }
}
