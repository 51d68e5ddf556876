use serde::{Deserialize, Serialize};

use crate::assets::color::Color;

/// Field anchor in percent of the canvas (`0..=100`), measured at the field center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    /// Horizontal percent of canvas width.
    pub x: f64,
    /// Vertical percent of canvas height.
    pub y: f64,
}

impl Position {
    /// Construct a position from percentages.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Arr([f64; 2]),
            Obj { x: f64, y: f64 },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Arr([x, y]) => Ok(Self { x, y }),
            Repr::Obj { x, y } => Ok(Self { x, y }),
        }
    }
}

/// One placeable unit on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Optional stable identifier from the template store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Key into the request value map.
    pub name: String,
    /// Anchor position in percent.
    pub position: Position,
    /// Layer index; higher draws on top.
    #[serde(default = "default_depth", alias = "zIndex")]
    pub depth: i32,
    /// Invisible fields are dropped before layout.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Rotation about the anchor, in degrees.
    #[serde(default, alias = "rotation")]
    pub rotation_deg: f64,
    /// Tie-break among equal depths.
    #[serde(default, alias = "displayOrder")]
    pub display_order: u32,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: FieldKind,
}

fn default_depth() -> i32 {
    1
}

fn default_visible() -> bool {
    true
}

impl Field {
    /// Build a visible value-backed text field at depth 1.
    pub fn text(name: impl Into<String>, position: Position, style: TextStyle) -> Self {
        Self::with_kind(name, position, FieldKind::Text { style })
    }

    /// Build a visible value-backed image field at depth 1.
    pub fn image(name: impl Into<String>, position: Position, style: ImageStyle) -> Self {
        Self::with_kind(name, position, FieldKind::Image { style })
    }

    /// Build a field with an explicit kind and default placement attributes.
    pub fn with_kind(name: impl Into<String>, position: Position, kind: FieldKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            position,
            depth: default_depth(),
            visible: true,
            rotation_deg: 0.0,
            display_order: 0,
            kind,
        }
    }

    /// Builder-style depth setter.
    pub fn at_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    /// Stable kind tag, as used on the wire and in fingerprints.
    pub fn kind_tag(&self) -> &'static str {
        match self.kind {
            FieldKind::Text { .. } => "text",
            FieldKind::Image { .. } => "image",
            FieldKind::StaticText { .. } => "static_text",
            FieldKind::StaticImage { .. } => "static_image",
        }
    }

    /// Return `true` for kinds that carry their own content.
    pub fn is_static(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::StaticText { .. } | FieldKind::StaticImage { .. }
        )
    }
}

/// Closed set of field kinds. Each variant carries only the style that applies to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Text looked up in the value map.
    Text {
        /// Text style.
        #[serde(default)]
        style: TextStyle,
    },
    /// Image reference looked up in the value map.
    Image {
        /// Image style.
        #[serde(default)]
        style: ImageStyle,
    },
    /// Literal text.
    StaticText {
        /// Literal text content.
        #[serde(alias = "staticContent")]
        content: String,
        /// Text style.
        #[serde(default)]
        style: TextStyle,
    },
    /// Literal image reference.
    StaticImage {
        /// Image reference resolved through the image source.
        #[serde(alias = "staticContent")]
        content: String,
        /// Image style.
        #[serde(default)]
        style: ImageStyle,
    },
}

/// Horizontal text alignment relative to the anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    /// Text starts at the anchor.
    Left,
    /// Text is centered on the anchor.
    #[default]
    Center,
    /// Text ends at the anchor.
    Right,
}

/// Vertical placement of the wrapped block relative to the anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    /// Block starts at the anchor.
    Top,
    /// Block is centered on the anchor.
    #[default]
    Middle,
    /// Block ends at the anchor.
    Bottom,
}

/// CSS-style numeric font weight (`100..=900`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontWeight(pub u16);

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl FontWeight {
    /// `normal`.
    pub const NORMAL: Self = Self(400);
    /// `bold`.
    pub const BOLD: Self = Self(700);

    /// Clamp a numeric weight into `1..=1000`.
    fn from_number(n: f64) -> Self {
        Self(n.clamp(1.0, 1000.0).round() as u16)
    }
}

impl<'de> Deserialize<'de> for FontWeight {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(Self::from_number(n)),
            Repr::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "normal" | "regular" => Ok(Self::NORMAL),
                "bold" => Ok(Self::BOLD),
                "lighter" | "light" => Ok(Self(300)),
                "bolder" => Ok(Self(800)),
                other => other
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(Self::from_number)
                    .ok_or_else(|| {
                        serde::de::Error::custom(format!("unknown font weight '{s}'"))
                    }),
            },
        }
    }
}

/// Drop shadow, in reference pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shadow {
    /// Whether the shadow is drawn.
    pub enabled: bool,
    /// Shadow color.
    pub color: Color,
    /// Blur amount.
    pub blur: f64,
    /// Horizontal offset.
    #[serde(alias = "offsetX")]
    pub offset_x: f64,
    /// Vertical offset.
    #[serde(alias = "offsetY")]
    pub offset_y: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Color::rgba(0, 0, 0, 128),
            blur: 4.0,
            offset_x: 2.0,
            offset_y: 2.0,
        }
    }
}

/// Style of text and static text fields. Sizes are in reference pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font family name.
    #[serde(alias = "fontFamily")]
    pub font_family: String,
    /// Font size before clamping and scaling.
    #[serde(alias = "fontSize")]
    pub font_size: f64,
    /// Font weight.
    #[serde(alias = "fontWeight")]
    pub font_weight: FontWeight,
    /// Fill color.
    pub color: Color,
    /// Horizontal alignment.
    #[serde(alias = "textAlign")]
    pub align: HAlign,
    /// Vertical alignment of the wrapped block.
    #[serde(alias = "verticalAlign")]
    pub vertical_align: VAlign,
    /// Wrap width in percent of canvas width.
    #[serde(alias = "maxWidth")]
    pub max_width: f64,
    /// Line height as a multiple of the font size.
    #[serde(alias = "lineHeight")]
    pub line_height: f64,
    /// Drop shadow.
    pub shadow: Shadow,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_owned(),
            font_size: 24.0,
            font_weight: FontWeight::NORMAL,
            color: Color::BLACK,
            align: HAlign::Center,
            vertical_align: VAlign::Middle,
            max_width: 80.0,
            line_height: 1.2,
            shadow: Shadow::default(),
        }
    }
}

/// Style of image and static image fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStyle {
    /// Maximum box width in percent of canvas width.
    #[serde(alias = "imageMaxWidth")]
    pub max_width: f64,
    /// Maximum box height in percent of canvas height.
    #[serde(alias = "imageMaxHeight")]
    pub max_height: f64,
    /// Stroke a border around the image.
    pub border: bool,
    /// Border width in reference pixels.
    #[serde(alias = "borderWidth")]
    pub border_width: f64,
    /// Border color.
    #[serde(alias = "borderColor")]
    pub border_color: Color,
    /// Clip the image to a circle.
    pub rounded: bool,
    /// Drop shadow.
    pub shadow: Shadow,
}

impl Default for ImageStyle {
    fn default() -> Self {
        Self {
            max_width: 25.0,
            max_height: 25.0,
            border: false,
            border_width: 2.0,
            border_color: Color::WHITE,
            rounded: false,
            shadow: Shadow::default(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/field.rs"]
mod tests;
