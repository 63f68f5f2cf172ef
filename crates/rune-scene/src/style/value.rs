use std::fmt;

use engine_core::ColorLinPremul;

use crate::error::StyleError;
use crate::style::property::{StyleProperty, ValueKind};

/// Axis anchors accepted by position properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    Left,
    Center,
    Right,
    Top,
    Bottom,
}

impl Anchor {
    /// Position along the free space of the axis: 0 = start, 1 = end.
    pub fn fraction(self) -> f32 {
        match self {
            Anchor::Left | Anchor::Top => 0.0,
            Anchor::Center => 0.5,
            Anchor::Right | Anchor::Bottom => 1.0,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Anchor::Left | Anchor::Center | Anchor::Right)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Anchor::Top | Anchor::Center | Anchor::Bottom)
    }

    fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "left" => Anchor::Left,
            "center" => Anchor::Center,
            "right" => Anchor::Right,
            "top" => Anchor::Top,
            "bottom" => Anchor::Bottom,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleUnit {
    /// Unitless number (flex factors, opacity).
    Undefined,
    Point,
    Percent,
    ViewportWidth,
    ViewportHeight,
    ViewportMin,
    ViewportMax,
    RootEm,
    Auto,
    Anchor(Anchor),
}

impl StyleUnit {
    pub fn is_viewport_relative(self) -> bool {
        matches!(
            self,
            StyleUnit::ViewportWidth
                | StyleUnit::ViewportHeight
                | StyleUnit::ViewportMin
                | StyleUnit::ViewportMax
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleNumber {
    pub value: f32,
    pub unit: StyleUnit,
}

impl StyleNumber {
    pub const AUTO: Self = Self {
        value: 0.0,
        unit: StyleUnit::Auto,
    };

    pub const fn new(value: f32, unit: StyleUnit) -> Self {
        Self { value, unit }
    }

    pub const fn point(value: f32) -> Self {
        Self::new(value, StyleUnit::Point)
    }

    pub const fn percent(value: f32) -> Self {
        Self::new(value, StyleUnit::Percent)
    }

    pub const fn number(value: f32) -> Self {
        Self::new(value, StyleUnit::Undefined)
    }

    pub const fn anchor(anchor: Anchor) -> Self {
        Self::new(0.0, StyleUnit::Anchor(anchor))
    }

    /// Parse `12px`, `50%`, `10vw`, `2rem`, `auto`, `center`, or a bare number.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Some(Self::AUTO);
        }
        if let Some(anchor) = Anchor::from_name(&s.to_ascii_lowercase()) {
            return Some(Self::anchor(anchor));
        }
        const SUFFIXES: [(&str, StyleUnit); 7] = [
            ("vmin", StyleUnit::ViewportMin),
            ("vmax", StyleUnit::ViewportMax),
            ("rem", StyleUnit::RootEm),
            ("px", StyleUnit::Point),
            ("vw", StyleUnit::ViewportWidth),
            ("vh", StyleUnit::ViewportHeight),
            ("%", StyleUnit::Percent),
        ];
        let (digits, unit) = SUFFIXES
            .iter()
            .find_map(|(suffix, unit)| s.strip_suffix(suffix).map(|d| (d, *unit)))
            .unwrap_or((s, StyleUnit::Undefined));
        let value: f32 = digits.trim().parse().ok()?;
        value.is_finite().then_some(Self { value, unit })
    }
}

impl fmt::Display for StyleNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.value;
        match self.unit {
            StyleUnit::Undefined => write!(f, "{v}"),
            StyleUnit::Point => write!(f, "{v}px"),
            StyleUnit::Percent => write!(f, "{v}%"),
            StyleUnit::ViewportWidth => write!(f, "{v}vw"),
            StyleUnit::ViewportHeight => write!(f, "{v}vh"),
            StyleUnit::ViewportMin => write!(f, "{v}vmin"),
            StyleUnit::ViewportMax => write!(f, "{v}vmax"),
            StyleUnit::RootEm => write!(f, "{v}rem"),
            StyleUnit::Auto => write!(f, "auto"),
            StyleUnit::Anchor(a) => write!(f, "{a:?}"),
        }
    }
}

macro_rules! keywords {
    ($($variant:ident => $name:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant),*
        }

        impl Keyword {
            pub fn name(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $name),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Keyword::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

keywords! {
    Flex => "flex",
    None => "none",
    Relative => "relative",
    Absolute => "absolute",
    Row => "row",
    RowReverse => "row-reverse",
    Column => "column",
    ColumnReverse => "column-reverse",
    NoWrap => "nowrap",
    Wrap => "wrap",
    WrapReverse => "wrap-reverse",
    FlexStart => "flex-start",
    FlexEnd => "flex-end",
    Center => "center",
    Stretch => "stretch",
    Baseline => "baseline",
    SpaceBetween => "space-between",
    SpaceAround => "space-around",
    SpaceEvenly => "space-evenly",
    Auto => "auto",
    Visible => "visible",
    Hidden => "hidden",
    Fill => "fill",
    Contain => "contain",
    Cover => "cover",
    ScaleDown => "scale-down",
    Normal => "normal",
    Italic => "italic",
    Left => "left",
    Right => "right",
    Uppercase => "uppercase",
    Lowercase => "lowercase",
    Capitalize => "capitalize",
    Clip => "clip",
    Ellipsis => "ellipsis",
    BreakAll => "break-all",
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    /// Percent offsets are relative to the node's own box.
    Translate(StyleNumber, StyleNumber),
    Scale(f32, f32),
    /// Clockwise, in radians.
    Rotate(f32),
}

/// Ordered transform list, applied left to right like CSS `transform`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleTransform {
    pub ops: Vec<TransformOp>,
}

impl StyleTransform {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Parse `translate(10px, 5%) scale(2) rotate(45deg)` or `none`.
    pub fn parse(input: &str) -> Option<Self> {
        let mut rest = input.trim();
        let mut ops = Vec::new();
        if rest.eq_ignore_ascii_case("none") || rest.is_empty() {
            return Some(Self { ops });
        }
        while !rest.is_empty() {
            let open = rest.find('(')?;
            let close = rest.find(')')?;
            if close < open {
                return None;
            }
            let name = rest[..open].trim();
            let args: Vec<&str> = rest[open + 1..close]
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();
            let op = match (name, args.as_slice()) {
                ("translate", [x]) => TransformOp::Translate(length(x)?, StyleNumber::point(0.0)),
                ("translate", [x, y]) => TransformOp::Translate(length(x)?, length(y)?),
                ("translateX", [x]) => TransformOp::Translate(length(x)?, StyleNumber::point(0.0)),
                ("translateY", [y]) => TransformOp::Translate(StyleNumber::point(0.0), length(y)?),
                ("scale", [s]) => {
                    let s = s.parse().ok()?;
                    TransformOp::Scale(s, s)
                }
                ("scale", [x, y]) => TransformOp::Scale(x.parse().ok()?, y.parse().ok()?),
                ("scaleX", [x]) => TransformOp::Scale(x.parse().ok()?, 1.0),
                ("scaleY", [y]) => TransformOp::Scale(1.0, y.parse().ok()?),
                ("rotate", [a]) => TransformOp::Rotate(angle(a)?),
                _ => return None,
            };
            ops.push(op);
            rest = rest[close + 1..].trim_start();
        }
        Some(Self { ops })
    }
}

fn length(s: &str) -> Option<StyleNumber> {
    let n = StyleNumber::parse(s)?;
    match n.unit {
        StyleUnit::Undefined if n.value == 0.0 => Some(StyleNumber::point(0.0)),
        StyleUnit::Auto | StyleUnit::Anchor(_) | StyleUnit::Undefined => None,
        _ => Some(n),
    }
}

fn angle(s: &str) -> Option<f32> {
    let s = s.trim();
    if let Some(v) = s.strip_suffix("deg") {
        return v.trim().parse::<f32>().ok().map(f32::to_radians);
    }
    if let Some(v) = s.strip_suffix("rad") {
        return v.trim().parse().ok();
    }
    if let Some(v) = s.strip_suffix("turn") {
        return v.trim().parse::<f32>().ok().map(|t| t * std::f32::consts::TAU);
    }
    s.parse::<f32>().ok().filter(|v| *v == 0.0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Keyword(Keyword),
    Integer(i32),
    Color(ColorLinPremul),
    String(String),
    Number(StyleNumber),
    Transform(StyleTransform),
}

impl StyleValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            StyleValue::Keyword(_) => ValueKind::Keyword,
            StyleValue::Integer(_) => ValueKind::Integer,
            StyleValue::Color(_) => ValueKind::Color,
            StyleValue::String(_) => ValueKind::String,
            StyleValue::Number(_) => ValueKind::Number,
            StyleValue::Transform(_) => ValueKind::Transform,
        }
    }

    /// Parse the textual form of a value for `property`.
    ///
    /// Only the syntax is checked here; range and unit rules are applied
    /// when the value is assigned.
    pub fn parse(property: StyleProperty, input: &str) -> Result<Self, StyleError> {
        let s = input.trim();
        let err = || StyleError::Parse {
            property,
            input: input.to_string(),
        };
        Ok(match property.meta().kind {
            ValueKind::Keyword => {
                StyleValue::Keyword(Keyword::from_name(&s.to_ascii_lowercase()).ok_or_else(err)?)
            }
            ValueKind::Integer => StyleValue::Integer(s.parse().map_err(|_| err())?),
            ValueKind::Color => StyleValue::Color(ColorLinPremul::parse_css(s).ok_or_else(err)?),
            ValueKind::String => {
                let unquoted = s
                    .strip_prefix("url(")
                    .and_then(|v| v.strip_suffix(')'))
                    .unwrap_or(s)
                    .trim()
                    .trim_matches(|c| c == '"' || c == '\'');
                StyleValue::String(unquoted.to_string())
            }
            ValueKind::Number => StyleValue::Number(StyleNumber::parse(s).ok_or_else(err)?),
            ValueKind::Transform => StyleValue::Transform(StyleTransform::parse(s).ok_or_else(err)?),
        })
    }

    pub fn as_keyword(&self) -> Option<Keyword> {
        match self {
            StyleValue::Keyword(k) => Some(*k),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            StyleValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<ColorLinPremul> {
        match self {
            StyleValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StyleValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<StyleNumber> {
        match self {
            StyleValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<&StyleTransform> {
        match self {
            StyleValue::Transform(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Keyword> for StyleValue {
    fn from(k: Keyword) -> Self {
        StyleValue::Keyword(k)
    }
}

impl From<StyleNumber> for StyleValue {
    fn from(n: StyleNumber) -> Self {
        StyleValue::Number(n)
    }
}

impl From<ColorLinPremul> for StyleValue {
    fn from(c: ColorLinPremul) -> Self {
        StyleValue::Color(c)
    }
}

impl From<i32> for StyleValue {
    fn from(v: i32) -> Self {
        StyleValue::Integer(v)
    }
}

impl From<&str> for StyleValue {
    fn from(s: &str) -> Self {
        StyleValue::String(s.to_string())
    }
}

impl From<StyleTransform> for StyleValue {
    fn from(t: StyleTransform) -> Self {
        StyleValue::Transform(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_with_units() {
        assert_eq!(StyleNumber::parse("12px"), Some(StyleNumber::point(12.0)));
        assert_eq!(StyleNumber::parse("50%"), Some(StyleNumber::percent(50.0)));
        assert_eq!(
            StyleNumber::parse("10vmin"),
            Some(StyleNumber::new(10.0, StyleUnit::ViewportMin))
        );
        assert_eq!(StyleNumber::parse("1.5rem").map(|n| n.unit), Some(StyleUnit::RootEm));
        assert_eq!(StyleNumber::parse("auto"), Some(StyleNumber::AUTO));
        assert_eq!(StyleNumber::parse("center"), Some(StyleNumber::anchor(Anchor::Center)));
        assert_eq!(StyleNumber::parse("0.5"), Some(StyleNumber::number(0.5)));
        assert_eq!(StyleNumber::parse("px"), None);
        assert_eq!(StyleNumber::parse("12em"), None);
    }

    #[test]
    fn parses_transform_lists() {
        let t = StyleTransform::parse("translate(10px, 50%) scale(2) rotate(90deg)").unwrap();
        assert_eq!(t.ops.len(), 3);
        assert_eq!(
            t.ops[0],
            TransformOp::Translate(StyleNumber::point(10.0), StyleNumber::percent(50.0))
        );
        assert_eq!(t.ops[1], TransformOp::Scale(2.0, 2.0));
        match t.ops[2] {
            TransformOp::Rotate(r) => assert!((r - std::f32::consts::FRAC_PI_2).abs() < 1e-6),
            other => panic!("unexpected {other:?}"),
        }
        assert!(StyleTransform::parse("none").unwrap().is_empty());
        assert!(StyleTransform::parse("skew(10deg)").is_none());
        assert!(StyleTransform::parse("rotate(45)").is_none());
    }

    #[test]
    fn parses_values_by_property_kind() {
        assert_eq!(
            StyleValue::parse(StyleProperty::Display, "none"),
            Ok(StyleValue::Keyword(Keyword::None))
        );
        assert_eq!(StyleValue::parse(StyleProperty::ZIndex, "3"), Ok(StyleValue::Integer(3)));
        assert_eq!(
            StyleValue::parse(StyleProperty::BackgroundImage, "url(\"a.png\")"),
            Ok(StyleValue::String("a.png".into()))
        );
        assert!(matches!(
            StyleValue::parse(StyleProperty::BackgroundColor, "#00ff00"),
            Ok(StyleValue::Color(_))
        ));
        assert!(matches!(
            StyleValue::parse(StyleProperty::Width, "wide"),
            Err(StyleError::Parse { .. })
        ));
    }
}
