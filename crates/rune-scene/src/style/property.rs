//! Property table: value kind, layout flag, default and validation rule for
//! every style property.

use bitflags::bitflags;
use engine_core::ColorLinPremul;

use crate::error::StyleError;
use crate::style::value::{Anchor, Keyword, StyleNumber, StyleTransform, StyleUnit, StyleValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Keyword,
    Integer,
    Color,
    String,
    Number,
    Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMeta {
    /// camelCase name; kebab-case is accepted by [`StyleProperty::from_name`].
    pub name: &'static str,
    pub kind: ValueKind,
    /// Forwarded into the layout solver instead of a node hook.
    pub layout: bool,
    /// Read through node-owned ancestor styles, like CSS inherited properties.
    pub inherited: bool,
    pub default: StyleValue,
}

macro_rules! properties {
    ($($variant:ident => $name:literal, $kind:ident, $layout:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum StyleProperty {
            $($variant),*
        }

        impl StyleProperty {
            pub const ALL: &'static [StyleProperty] = &[$(StyleProperty::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(StyleProperty::$variant => $name),*
                }
            }

            pub fn kind(self) -> ValueKind {
                match self {
                    $(StyleProperty::$variant => ValueKind::$kind),*
                }
            }

            pub fn is_layout(self) -> bool {
                match self {
                    $(StyleProperty::$variant => $layout),*
                }
            }
        }
    };
}

properties! {
    Display => "display", Keyword, true;
    Position => "position", Keyword, true;
    FlexDirection => "flexDirection", Keyword, true;
    FlexWrap => "flexWrap", Keyword, true;
    JustifyContent => "justifyContent", Keyword, true;
    AlignItems => "alignItems", Keyword, true;
    AlignSelf => "alignSelf", Keyword, true;
    AlignContent => "alignContent", Keyword, true;
    FlexGrow => "flexGrow", Number, true;
    FlexShrink => "flexShrink", Number, true;
    FlexBasis => "flexBasis", Number, true;
    Width => "width", Number, true;
    Height => "height", Number, true;
    MinWidth => "minWidth", Number, true;
    MinHeight => "minHeight", Number, true;
    MaxWidth => "maxWidth", Number, true;
    MaxHeight => "maxHeight", Number, true;
    Top => "top", Number, true;
    Right => "right", Number, true;
    Bottom => "bottom", Number, true;
    Left => "left", Number, true;
    MarginTop => "marginTop", Number, true;
    MarginRight => "marginRight", Number, true;
    MarginBottom => "marginBottom", Number, true;
    MarginLeft => "marginLeft", Number, true;
    PaddingTop => "paddingTop", Number, true;
    PaddingRight => "paddingRight", Number, true;
    PaddingBottom => "paddingBottom", Number, true;
    PaddingLeft => "paddingLeft", Number, true;
    BorderWidth => "borderWidth", Number, true;
    Gap => "gap", Number, true;

    Opacity => "opacity", Number, false;
    ZIndex => "zIndex", Integer, false;
    Visibility => "visibility", Keyword, false;
    Overflow => "overflow", Keyword, false;
    BackgroundColor => "backgroundColor", Color, false;
    BackgroundImage => "backgroundImage", String, false;
    BackgroundFit => "backgroundFit", Keyword, false;
    BackgroundPositionX => "backgroundPositionX", Number, false;
    BackgroundPositionY => "backgroundPositionY", Number, false;
    BorderColor => "borderColor", Color, false;
    Transform => "transform", Transform, false;
    TransformOriginX => "transformOriginX", Number, false;
    TransformOriginY => "transformOriginY", Number, false;
    ObjectFit => "objectFit", Keyword, false;
    ObjectPositionX => "objectPositionX", Number, false;
    ObjectPositionY => "objectPositionY", Number, false;

    Color => "color", Color, false;
    FontFamily => "fontFamily", String, false;
    FontStyle => "fontStyle", Keyword, false;
    FontWeight => "fontWeight", Integer, false;
    FontSize => "fontSize", Number, false;
    LineHeight => "lineHeight", Number, false;
    LetterSpacing => "letterSpacing", Number, false;
    TextAlign => "textAlign", Keyword, false;
    TextTransform => "textTransform", Keyword, false;
    TextOverflow => "textOverflow", Keyword, false;
    MaxLines => "maxLines", Integer, false;
    WhiteSpace => "whiteSpace", Keyword, false;
    WordBreak => "wordBreak", Keyword, false;
}

bitflags! {
    /// Units a number property accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Units: u16 {
        const UNITLESS = 1 << 0;
        const POINT = 1 << 1;
        const PERCENT = 1 << 2;
        const VIEWPORT = 1 << 3;
        const REM = 1 << 4;
        const AUTO = 1 << 5;
        const ANCHOR_X = 1 << 6;
        const ANCHOR_Y = 1 << 7;

        const LENGTH = Self::POINT.bits() | Self::VIEWPORT.bits() | Self::REM.bits();
        const LENGTH_PERCENT = Self::LENGTH.bits() | Self::PERCENT.bits();
        const LENGTH_PERCENT_AUTO = Self::LENGTH_PERCENT.bits() | Self::AUTO.bits();
    }
}

impl Units {
    fn of(unit: StyleUnit) -> Units {
        match unit {
            StyleUnit::Undefined => Units::UNITLESS,
            StyleUnit::Point => Units::POINT,
            StyleUnit::Percent => Units::PERCENT,
            StyleUnit::ViewportWidth
            | StyleUnit::ViewportHeight
            | StyleUnit::ViewportMin
            | StyleUnit::ViewportMax => Units::VIEWPORT,
            StyleUnit::RootEm => Units::REM,
            StyleUnit::Auto => Units::AUTO,
            StyleUnit::Anchor(Anchor::Center) => Units::ANCHOR_X | Units::ANCHOR_Y,
            StyleUnit::Anchor(a) if a.is_horizontal() => Units::ANCHOR_X,
            StyleUnit::Anchor(_) => Units::ANCHOR_Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Any,
    NonNegative,
    Positive,
    /// 0..=1 unitless/px, 0..=100 percent.
    Fraction,
}

struct NumberRule {
    units: Units,
    bound: Bound,
}

const fn rule(units: Units, bound: Bound) -> NumberRule {
    NumberRule { units, bound }
}

impl StyleProperty {
    pub fn meta(self) -> PropertyMeta {
        PropertyMeta {
            name: self.name(),
            kind: self.kind(),
            layout: self.is_layout(),
            inherited: self.is_inherited(),
            default: self.default_value(),
        }
    }

    /// Look up a property by camelCase or kebab-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        let camel = kebab_to_camel(name.trim());
        Self::ALL.iter().copied().find(|p| p.name() == camel)
    }

    /// kebab-case name, as used in style sheets.
    pub fn css_name(self) -> String {
        let mut out = String::new();
        for ch in self.name().chars() {
            if ch.is_ascii_uppercase() {
                out.push('-');
                out.push(ch.to_ascii_lowercase());
            } else {
                out.push(ch);
            }
        }
        out
    }

    pub fn default_value(self) -> StyleValue {
        use StyleProperty as P;
        match self {
            P::Display => Keyword::Flex.into(),
            P::Position => Keyword::Relative.into(),
            P::FlexDirection => Keyword::Column.into(),
            P::FlexWrap => Keyword::NoWrap.into(),
            P::JustifyContent => Keyword::FlexStart.into(),
            P::AlignItems | P::AlignContent => Keyword::Stretch.into(),
            P::AlignSelf => Keyword::Auto.into(),
            P::FlexGrow => StyleNumber::number(0.0).into(),
            P::FlexShrink => StyleNumber::number(1.0).into(),
            P::FlexBasis
            | P::Width
            | P::Height
            | P::MinWidth
            | P::MinHeight
            | P::MaxWidth
            | P::MaxHeight
            | P::Top
            | P::Right
            | P::Bottom
            | P::Left => StyleNumber::AUTO.into(),
            P::MarginTop
            | P::MarginRight
            | P::MarginBottom
            | P::MarginLeft
            | P::PaddingTop
            | P::PaddingRight
            | P::PaddingBottom
            | P::PaddingLeft
            | P::BorderWidth
            | P::Gap
            | P::LetterSpacing => StyleNumber::point(0.0).into(),

            P::Opacity => StyleNumber::number(1.0).into(),
            P::ZIndex | P::MaxLines => 0.into(),
            P::Visibility | P::Overflow => Keyword::Visible.into(),
            P::BackgroundColor | P::BorderColor => ColorLinPremul::TRANSPARENT.into(),
            P::BackgroundImage | P::FontFamily => StyleValue::String(String::new()),
            P::BackgroundFit | P::ObjectFit => Keyword::Fill.into(),
            P::BackgroundPositionX => StyleNumber::anchor(Anchor::Left).into(),
            P::BackgroundPositionY => StyleNumber::anchor(Anchor::Top).into(),
            P::Transform => StyleTransform::default().into(),
            P::TransformOriginX | P::TransformOriginY => StyleNumber::percent(50.0).into(),
            P::ObjectPositionX | P::ObjectPositionY => StyleNumber::anchor(Anchor::Center).into(),

            P::Color => ColorLinPremul::rgba(0, 0, 0, 255).into(),
            P::FontStyle | P::WhiteSpace | P::WordBreak => Keyword::Normal.into(),
            P::FontWeight => 400.into(),
            P::FontSize => StyleNumber::point(16.0).into(),
            P::LineHeight => StyleNumber::AUTO.into(),
            P::TextAlign => Keyword::Left.into(),
            P::TextTransform => Keyword::None.into(),
            P::TextOverflow => Keyword::Clip.into(),
        }
    }

    fn keywords(self) -> &'static [Keyword] {
        use Keyword as K;
        use StyleProperty as P;
        match self {
            P::Display => &[K::Flex, K::None],
            P::Position => &[K::Relative, K::Absolute],
            P::FlexDirection => &[K::Row, K::RowReverse, K::Column, K::ColumnReverse],
            P::FlexWrap => &[K::NoWrap, K::Wrap, K::WrapReverse],
            P::JustifyContent => &[
                K::FlexStart,
                K::FlexEnd,
                K::Center,
                K::SpaceBetween,
                K::SpaceAround,
                K::SpaceEvenly,
            ],
            P::AlignItems => &[K::FlexStart, K::FlexEnd, K::Center, K::Stretch, K::Baseline],
            P::AlignSelf => &[
                K::Auto,
                K::FlexStart,
                K::FlexEnd,
                K::Center,
                K::Stretch,
                K::Baseline,
            ],
            P::AlignContent => &[
                K::FlexStart,
                K::FlexEnd,
                K::Center,
                K::Stretch,
                K::SpaceBetween,
                K::SpaceAround,
                K::SpaceEvenly,
            ],
            P::Visibility | P::Overflow => &[K::Visible, K::Hidden],
            P::BackgroundFit | P::ObjectFit => {
                &[K::Fill, K::Contain, K::Cover, K::None, K::ScaleDown]
            }
            P::FontStyle => &[K::Normal, K::Italic],
            P::TextAlign => &[K::Left, K::Center, K::Right],
            P::TextTransform => &[K::None, K::Uppercase, K::Lowercase, K::Capitalize],
            P::TextOverflow => &[K::Clip, K::Ellipsis],
            P::WhiteSpace => &[K::Normal, K::NoWrap],
            P::WordBreak => &[K::Normal, K::BreakAll],
            _ => &[],
        }
    }

    fn number_rule(self) -> NumberRule {
        use Bound::*;
        use StyleProperty as P;
        match self {
            P::FlexGrow | P::FlexShrink => rule(Units::UNITLESS, NonNegative),
            P::FlexBasis
            | P::Width
            | P::Height
            | P::MinWidth
            | P::MinHeight
            | P::MaxWidth
            | P::MaxHeight => rule(Units::LENGTH_PERCENT_AUTO, NonNegative),
            P::Top
            | P::Right
            | P::Bottom
            | P::Left
            | P::MarginTop
            | P::MarginRight
            | P::MarginBottom
            | P::MarginLeft => rule(Units::LENGTH_PERCENT_AUTO, Any),
            P::PaddingTop | P::PaddingRight | P::PaddingBottom | P::PaddingLeft | P::Gap => {
                rule(Units::LENGTH_PERCENT, NonNegative)
            }
            P::BorderWidth => rule(Units::LENGTH, NonNegative),
            P::Opacity => rule(Units::UNITLESS | Units::POINT | Units::PERCENT, Fraction),
            P::BackgroundPositionX | P::ObjectPositionX | P::TransformOriginX => {
                rule(Units::LENGTH_PERCENT | Units::ANCHOR_X, Any)
            }
            P::BackgroundPositionY | P::ObjectPositionY | P::TransformOriginY => {
                rule(Units::LENGTH_PERCENT | Units::ANCHOR_Y, Any)
            }
            P::FontSize => rule(Units::LENGTH, Positive),
            P::LineHeight => rule(Units::UNITLESS | Units::LENGTH | Units::AUTO, Positive),
            P::LetterSpacing => rule(Units::LENGTH, Any),
            _ => rule(Units::empty(), Any),
        }
    }

    /// Check `value` against this property's kind and rule table.
    pub fn validate(self, value: &StyleValue) -> Result<(), StyleError> {
        let expected = self.kind();
        if value.kind() != expected {
            return Err(StyleError::KindMismatch {
                property: self,
                expected,
                actual: value.kind(),
            });
        }
        let invalid = |reason: String| -> Result<(), StyleError> {
            Err(StyleError::Validation {
                property: self,
                reason,
            })
        };
        match value {
            StyleValue::Keyword(k) if !self.keywords().contains(k) => {
                invalid(format!("keyword `{k}` is not allowed"))
            }
            StyleValue::Integer(v) => match self {
                StyleProperty::FontWeight if !(1..=1000).contains(v) => {
                    invalid(format!("font weight {v} is outside 1..=1000"))
                }
                StyleProperty::MaxLines if *v < 0 => invalid(format!("{v} is negative")),
                _ => Ok(()),
            },
            StyleValue::Number(n) => self.validate_number(*n).or_else(invalid),
            _ => Ok(()),
        }
    }

    fn validate_number(self, n: StyleNumber) -> Result<(), String> {
        let rule = self.number_rule();
        if !rule.units.intersects(Units::of(n.unit)) {
            return Err(format!("unit of `{n}` is not allowed"));
        }
        if matches!(n.unit, StyleUnit::Auto | StyleUnit::Anchor(_)) {
            return Ok(());
        }
        if !n.value.is_finite() {
            return Err("value is not finite".into());
        }
        let ok = match rule.bound {
            Bound::Any => true,
            Bound::NonNegative => n.value >= 0.0,
            Bound::Positive => n.value > 0.0,
            Bound::Fraction if n.unit == StyleUnit::Percent => (0.0..=100.0).contains(&n.value),
            Bound::Fraction => (0.0..=1.0).contains(&n.value),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("`{n}` is out of range"))
        }
    }

    /// Text properties a node picks up from the styles of its ancestors.
    /// Everything else is read only from the node's own style and any shared
    /// styles it names.
    pub fn is_inherited(self) -> bool {
        use StyleProperty as P;
        matches!(
            self,
            P::Color
                | P::FontFamily
                | P::FontStyle
                | P::FontWeight
                | P::FontSize
                | P::LineHeight
                | P::LetterSpacing
                | P::TextAlign
                | P::TextTransform
                | P::WhiteSpace
                | P::WordBreak
        )
    }

    /// Properties whose effect depends on the text shaper.
    pub fn affects_text(self) -> bool {
        use StyleProperty as P;
        matches!(
            self,
            P::Color
                | P::FontFamily
                | P::FontStyle
                | P::FontWeight
                | P::FontSize
                | P::LineHeight
                | P::LetterSpacing
                | P::TextAlign
                | P::TextTransform
                | P::TextOverflow
                | P::MaxLines
                | P::WhiteSpace
                | P::WordBreak
        )
    }
}

fn kebab_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_in_both_cases() {
        assert_eq!(
            StyleProperty::from_name("backgroundColor"),
            Some(StyleProperty::BackgroundColor)
        );
        assert_eq!(
            StyleProperty::from_name("background-color"),
            Some(StyleProperty::BackgroundColor)
        );
        assert_eq!(StyleProperty::from_name("z-index"), Some(StyleProperty::ZIndex));
        assert_eq!(StyleProperty::from_name("colour"), None);
        assert_eq!(StyleProperty::MarginTop.css_name(), "margin-top");
    }

    #[test]
    fn defaults_match_their_kind() {
        for &p in StyleProperty::ALL {
            let meta = p.meta();
            assert_eq!(meta.default.kind(), meta.kind, "{p:?}");
            assert!(p.validate(&meta.default).is_ok(), "{p:?} default rejected");
        }
    }

    #[test]
    fn rejects_wrong_units_and_ranges() {
        assert!(StyleProperty::Width.validate(&StyleNumber::percent(50.0).into()).is_ok());
        assert!(matches!(
            StyleProperty::Width.validate(&StyleNumber::point(-1.0).into()),
            Err(StyleError::Validation { .. })
        ));
        assert!(StyleProperty::BorderWidth.validate(&StyleNumber::percent(5.0).into()).is_err());
        assert!(StyleProperty::Opacity.validate(&StyleNumber::number(0.5).into()).is_ok());
        assert!(StyleProperty::Opacity.validate(&StyleNumber::percent(50.0).into()).is_ok());
        assert!(StyleProperty::Opacity.validate(&StyleNumber::number(1.5).into()).is_err());
        assert!(
            StyleProperty::ObjectPositionX
                .validate(&StyleNumber::anchor(Anchor::Top).into())
                .is_err()
        );
        assert!(StyleProperty::FontWeight.validate(&StyleValue::Integer(0)).is_err());
    }

    #[test]
    fn rejects_foreign_keywords_and_kinds() {
        assert!(StyleProperty::Display.validate(&Keyword::Row.into()).is_err());
        assert!(matches!(
            StyleProperty::Display.validate(&StyleValue::Integer(1)),
            Err(StyleError::KindMismatch { .. })
        ));
    }
}
