//! Unit resolution and translation of style values into the layout solver's
//! style type.

use engine_core::Transform2D;
use taffy::prelude::*;
use taffy::{AlignContent, AlignItems, FlexDirection, FlexWrap, Position};

use crate::style::property::StyleProperty;
use crate::style::value::{Keyword, StyleNumber, StyleTransform, StyleUnit, StyleValue, TransformOp};

/// Environment that unit-relative values resolve against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleContext {
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub root_font_size: f32,
}

impl Default for StyleContext {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            viewport_height: 600.0,
            root_font_size: 16.0,
        }
    }
}

impl StyleContext {
    /// Absolute length in pixels. Percentages resolve against `base`;
    /// `auto` and anchors have no length and yield `None`.
    pub fn resolve(&self, n: StyleNumber, base: f32) -> Option<f32> {
        let v = n.value;
        Some(match n.unit {
            StyleUnit::Point | StyleUnit::Undefined => v,
            StyleUnit::Percent => v / 100.0 * base,
            StyleUnit::ViewportWidth => v / 100.0 * self.viewport_width,
            StyleUnit::ViewportHeight => v / 100.0 * self.viewport_height,
            StyleUnit::ViewportMin => v / 100.0 * self.viewport_width.min(self.viewport_height),
            StyleUnit::ViewportMax => v / 100.0 * self.viewport_width.max(self.viewport_height),
            StyleUnit::RootEm => v * self.root_font_size,
            StyleUnit::Auto | StyleUnit::Anchor(_) => return None,
        })
    }

    /// Length that does not depend on a containing box (percent resolves to 0).
    pub fn length(&self, n: StyleNumber) -> f32 {
        self.resolve(n, 0.0).unwrap_or(0.0)
    }

    /// Offset of content of size `content` inside `container` along one axis.
    ///
    /// Anchors and percentages place the content within the free space, so
    /// `100%` aligns the far edges; lengths are plain offsets.
    pub fn position(&self, n: StyleNumber, container: f32, content: f32) -> f32 {
        let free = container - content;
        match n.unit {
            StyleUnit::Anchor(a) => free * a.fraction(),
            StyleUnit::Percent => free * n.value / 100.0,
            _ => self.length(n),
        }
    }

    pub fn dimension(&self, n: StyleNumber) -> Dimension {
        match n.unit {
            StyleUnit::Percent => Dimension::Percent(n.value / 100.0),
            StyleUnit::Auto | StyleUnit::Anchor(_) => Dimension::Auto,
            _ => Dimension::Length(self.length(n)),
        }
    }

    pub fn length_percentage(&self, n: StyleNumber) -> LengthPercentage {
        match n.unit {
            StyleUnit::Percent => LengthPercentage::Percent(n.value / 100.0),
            _ => LengthPercentage::Length(self.length(n)),
        }
    }

    pub fn length_percentage_auto(&self, n: StyleNumber) -> LengthPercentageAuto {
        match n.unit {
            StyleUnit::Percent => LengthPercentageAuto::Percent(n.value / 100.0),
            StyleUnit::Auto | StyleUnit::Anchor(_) => LengthPercentageAuto::Auto,
            _ => LengthPercentageAuto::Length(self.length(n)),
        }
    }

    /// Matrix of `transform` for a `width`×`height` box, pivoting around
    /// the origin given by `origin_x`/`origin_y`. Percent translations
    /// resolve against the box.
    pub fn transform_matrix(
        &self,
        transform: &StyleTransform,
        (width, height): (f32, f32),
        origin_x: StyleNumber,
        origin_y: StyleNumber,
    ) -> Transform2D {
        if transform.is_empty() {
            return Transform2D::identity();
        }
        let mut m = Transform2D::identity();
        for op in &transform.ops {
            let step = match *op {
                TransformOp::Translate(x, y) => Transform2D::translate(
                    self.resolve(x, width).unwrap_or(0.0),
                    self.resolve(y, height).unwrap_or(0.0),
                ),
                TransformOp::Scale(sx, sy) => Transform2D::scale(sx, sy),
                TransformOp::Rotate(radians) => Transform2D::rotate(radians),
            };
            m = m.concat(step);
        }
        let ox = self.position(origin_x, width, 0.0);
        let oy = self.position(origin_y, height, 0.0);
        Transform2D::translate(ox, oy)
            .concat(m)
            .concat(Transform2D::translate(-ox, -oy))
    }

    /// Whether the resolved value of `n` changes between `self` and `other`.
    pub fn differs_for(&self, other: &StyleContext, n: StyleNumber) -> bool {
        match n.unit {
            StyleUnit::ViewportWidth => self.viewport_width != other.viewport_width,
            StyleUnit::ViewportHeight => self.viewport_height != other.viewport_height,
            StyleUnit::ViewportMin | StyleUnit::ViewportMax => {
                self.viewport_width != other.viewport_width
                    || self.viewport_height != other.viewport_height
            }
            StyleUnit::RootEm => self.root_font_size != other.root_font_size,
            _ => false,
        }
    }

    /// Write the effective `value` of a layout property into `style`.
    ///
    /// Non-layout properties and mismatched value kinds are ignored.
    pub fn apply(&self, style: &mut Style, property: StyleProperty, value: &StyleValue) {
        use StyleProperty as P;
        if let Some(k) = value.as_keyword() {
            match property {
                P::Display => {
                    style.display = if k == Keyword::None {
                        Display::None
                    } else {
                        Display::Flex
                    }
                }
                P::Position => {
                    style.position = if k == Keyword::Absolute {
                        Position::Absolute
                    } else {
                        Position::Relative
                    }
                }
                P::FlexDirection => {
                    style.flex_direction = match k {
                        Keyword::Row => FlexDirection::Row,
                        Keyword::RowReverse => FlexDirection::RowReverse,
                        Keyword::ColumnReverse => FlexDirection::ColumnReverse,
                        _ => FlexDirection::Column,
                    }
                }
                P::FlexWrap => {
                    style.flex_wrap = match k {
                        Keyword::Wrap => FlexWrap::Wrap,
                        Keyword::WrapReverse => FlexWrap::WrapReverse,
                        _ => FlexWrap::NoWrap,
                    }
                }
                P::JustifyContent => style.justify_content = align_content(k),
                P::AlignContent => style.align_content = align_content(k),
                P::AlignItems => style.align_items = align_items(k),
                P::AlignSelf => style.align_self = align_items(k),
                _ => {}
            }
            return;
        }
        let Some(n) = value.as_number() else {
            return;
        };
        match property {
            P::FlexGrow => style.flex_grow = n.value,
            P::FlexShrink => style.flex_shrink = n.value,
            P::FlexBasis => style.flex_basis = self.dimension(n),
            P::Width => style.size.width = self.dimension(n),
            P::Height => style.size.height = self.dimension(n),
            P::MinWidth => style.min_size.width = self.dimension(n),
            P::MinHeight => style.min_size.height = self.dimension(n),
            P::MaxWidth => style.max_size.width = self.dimension(n),
            P::MaxHeight => style.max_size.height = self.dimension(n),
            P::Top => style.inset.top = self.length_percentage_auto(n),
            P::Right => style.inset.right = self.length_percentage_auto(n),
            P::Bottom => style.inset.bottom = self.length_percentage_auto(n),
            P::Left => style.inset.left = self.length_percentage_auto(n),
            P::MarginTop => style.margin.top = self.length_percentage_auto(n),
            P::MarginRight => style.margin.right = self.length_percentage_auto(n),
            P::MarginBottom => style.margin.bottom = self.length_percentage_auto(n),
            P::MarginLeft => style.margin.left = self.length_percentage_auto(n),
            P::PaddingTop => style.padding.top = self.length_percentage(n),
            P::PaddingRight => style.padding.right = self.length_percentage(n),
            P::PaddingBottom => style.padding.bottom = self.length_percentage(n),
            P::PaddingLeft => style.padding.left = self.length_percentage(n),
            P::BorderWidth => {
                let w = self.length_percentage(n);
                style.border = taffy::Rect {
                    left: w,
                    right: w,
                    top: w,
                    bottom: w,
                };
            }
            P::Gap => {
                let g = self.length_percentage(n);
                style.gap = Size {
                    width: g,
                    height: g,
                };
            }
            _ => {}
        }
    }
}

fn align_items(k: Keyword) -> Option<AlignItems> {
    Some(match k {
        Keyword::FlexStart => AlignItems::FlexStart,
        Keyword::FlexEnd => AlignItems::FlexEnd,
        Keyword::Center => AlignItems::Center,
        Keyword::Baseline => AlignItems::Baseline,
        Keyword::Stretch => AlignItems::Stretch,
        _ => return None,
    })
}

fn align_content(k: Keyword) -> Option<AlignContent> {
    Some(match k {
        Keyword::FlexStart => AlignContent::FlexStart,
        Keyword::FlexEnd => AlignContent::FlexEnd,
        Keyword::Center => AlignContent::Center,
        Keyword::Stretch => AlignContent::Stretch,
        Keyword::SpaceBetween => AlignContent::SpaceBetween,
        Keyword::SpaceAround => AlignContent::SpaceAround,
        Keyword::SpaceEvenly => AlignContent::SpaceEvenly,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::value::Anchor;

    #[test]
    fn transforms_pivot_around_the_origin() {
        let ctx = StyleContext::default();
        let t = StyleTransform::parse("scale(2)").unwrap();
        let center = StyleNumber::percent(50.0);
        let m = ctx.transform_matrix(&t, (10.0, 10.0), center, center);
        assert_eq!(m.apply([5.0, 5.0]), [5.0, 5.0]);
        assert_eq!(m.apply([10.0, 10.0]), [15.0, 15.0]);

        let t = StyleTransform::parse("translate(50%, 10px)").unwrap();
        let m = ctx.transform_matrix(&t, (40.0, 10.0), center, center);
        assert_eq!(m.apply([0.0, 0.0]), [20.0, 10.0]);
    }

    #[test]
    fn resolves_units_against_context() {
        let ctx = StyleContext {
            viewport_width: 800.0,
            viewport_height: 600.0,
            root_font_size: 20.0,
        };
        assert_eq!(ctx.resolve(StyleNumber::point(12.0), 0.0), Some(12.0));
        assert_eq!(ctx.resolve(StyleNumber::percent(50.0), 300.0), Some(150.0));
        assert_eq!(
            ctx.resolve(StyleNumber::new(10.0, StyleUnit::ViewportWidth), 0.0),
            Some(80.0)
        );
        assert_eq!(
            ctx.resolve(StyleNumber::new(10.0, StyleUnit::ViewportMin), 0.0),
            Some(60.0)
        );
        assert_eq!(ctx.resolve(StyleNumber::new(2.0, StyleUnit::RootEm), 0.0), Some(40.0));
        assert_eq!(ctx.resolve(StyleNumber::AUTO, 100.0), None);
    }

    #[test]
    fn percent_stays_relative_for_the_solver() {
        let ctx = StyleContext::default();
        assert_eq!(ctx.dimension(StyleNumber::percent(50.0)), Dimension::Percent(0.5));
        let mut style = Style::default();
        ctx.apply(&mut style, StyleProperty::Width, &StyleNumber::percent(50.0).into());
        assert_eq!(style.size.width, Dimension::Percent(0.5));
        ctx.apply(
            &mut style,
            StyleProperty::Height,
            &StyleNumber::new(50.0, StyleUnit::ViewportHeight).into(),
        );
        assert_eq!(style.size.height, Dimension::Length(300.0));
    }

    #[test]
    fn anchors_place_content_in_free_space() {
        let ctx = StyleContext::default();
        assert_eq!(ctx.position(StyleNumber::anchor(Anchor::Center), 100.0, 40.0), 30.0);
        assert_eq!(ctx.position(StyleNumber::anchor(Anchor::Right), 100.0, 40.0), 60.0);
        assert_eq!(ctx.position(StyleNumber::percent(100.0), 100.0, 40.0), 60.0);
        assert_eq!(ctx.position(StyleNumber::point(5.0), 100.0, 40.0), 5.0);
    }

    #[test]
    fn keywords_map_to_solver_enums() {
        let ctx = StyleContext::default();
        let mut style = Style::default();
        ctx.apply(&mut style, StyleProperty::Display, &Keyword::None.into());
        ctx.apply(&mut style, StyleProperty::FlexDirection, &Keyword::Row.into());
        ctx.apply(&mut style, StyleProperty::AlignSelf, &Keyword::Auto.into());
        assert_eq!(style.display, Display::None);
        assert_eq!(style.flex_direction, FlexDirection::Row);
        assert_eq!(style.align_self, None);
    }
}
