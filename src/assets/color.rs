use crate::foundation::core::Rgba8Premul;
use serde::{Deserialize, Serialize};

/// Straight-alpha sRGB color as authored in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque color from RGB channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color from RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiplied form used by the compositor.
    pub fn to_premul(self) -> Rgba8Premul {
        Rgba8Premul::from_straight_rgba(self.r, self.g, self.b, self.a)
    }

    /// `#RRGGBBAA` form.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }

    /// Parse a CSS-like color string.
    ///
    /// Accepts `#RGB`, `#RRGGBB`, `#RRGGBBAA`, `rgb(r,g,b)`, `rgba(r,g,b,a)` (alpha in 0..1),
    /// and the keywords `black`, `white`, `transparent`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "black" => return Ok(Self::BLACK),
            "white" => return Ok(Self::WHITE),
            "transparent" => return Ok(Self::rgba(0, 0, 0, 0)),
            _ => {}
        }
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(body) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|b| b.strip_suffix(')'))
        {
            return parse_rgb_fn(body);
        }
        parse_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            RgbaObj {
                r: u8,
                g: u8,
                b: u8,
                #[serde(default = "one")]
                a: f64,
            },
            Arr(Vec<f64>),
        }

        fn one() -> f64 {
            1.0
        }

        fn channel(v: f64) -> u8 {
            v.clamp(0.0, 255.0).round() as u8
        }

        fn alpha(a: f64) -> u8 {
            (a.clamp(0.0, 1.0) * 255.0).round() as u8
        }

        match Repr::deserialize(deserializer)? {
            Repr::Str(s) => Self::parse(&s).map_err(serde::de::Error::custom),
            Repr::RgbaObj { r, g, b, a } => Ok(Self::rgba(r, g, b, alpha(a))),
            Repr::Arr(v) => match v.as_slice() {
                [r, g, b] => Ok(Self::rgb(channel(*r), channel(*g), channel(*b))),
                [r, g, b, a] => Ok(Self::rgba(channel(*r), channel(*g), channel(*b), alpha(*a))),
                _ => Err(serde::de::Error::custom(
                    "color array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}

fn parse_hex(s: &str) -> Result<Color, String> {
    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    if !s.is_ascii() {
        return Err("hex color must be ascii".to_owned());
    }

    match s.len() {
        3 => {
            let mut c = [0u8; 3];
            for (i, ch) in s.chars().enumerate() {
                let v = hex_byte(&ch.to_string())?;
                c[i] = v * 17;
            }
            Ok(Color::rgb(c[0], c[1], c[2]))
        }
        6 => Ok(Color::rgb(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
        )),
        8 => Ok(Color::rgba(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        )),
        _ => Err("hex color must be #RGB, #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned()),
    }
}

fn parse_rgb_fn(body: &str) -> Result<Color, String> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let num = |p: &str| -> Result<f64, String> {
        p.parse::<f64>()
            .map_err(|_| format!("invalid color component \"{p}\""))
    };
    let ch = |p: &str| -> Result<u8, String> { Ok(num(p)?.clamp(0.0, 255.0).round() as u8) };
    match parts.as_slice() {
        &[r, g, b] => Ok(Color::rgb(ch(r)?, ch(g)?, ch(b)?)),
        &[r, g, b, a] => Ok(Color::rgba(
            ch(r)?,
            ch(g)?,
            ch(b)?,
            (num(a)?.clamp(0.0, 1.0) * 255.0).round() as u8,
        )),
        _ => Err("rgb()/rgba() needs 3 or 4 components".to_owned()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/color.rs"]
mod tests;
