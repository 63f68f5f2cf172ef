use palette::{FromColor, LinSrgba, Srgba};

use crate::scene::ColorLinPremul;

// Conversions between style-sheet sRGB bytes and the linear premultiplied form sinks consume.
impl ColorLinPremul {
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Parse any CSS color syntax (`#rgb`, `#rrggbbaa`, `rgb()`, `hsl()`, named colors).
    pub fn parse_css(input: &str) -> Option<Self> {
        let parsed = csscolorparser::parse(input.trim()).ok()?;
        Some(Self::from_srgba_u8(parsed.to_rgba8()))
    }

    /// Scale all premultiplied channels by `opacity` (clamped to 0..=1).
    #[inline]
    pub fn with_opacity(self, opacity: f32) -> Self {
        let o = opacity.clamp(0.0, 1.0);
        Self {
            r: self.r * o,
            g: self.g * o,
            b: self.b * o,
            a: self.a * o,
        }
    }

    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Straight sRGB bytes, as written in style sheets.
    #[inline]
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::from_srgba_u8([r, g, b, a])
    }

    /// Linearize and premultiply straight sRGB bytes.
    pub fn from_srgba_u8(c: [u8; 4]) -> Self {
        let [r, g, b, a] = c.map(|v| f32::from(v) / 255.0);
        let lin: LinSrgba = LinSrgba::from_color(Srgba::new(r, g, b, a));
        Self {
            r: lin.red * lin.alpha,
            g: lin.green * lin.alpha,
            b: lin.blue * lin.alpha,
            a: lin.alpha,
        }
    }

    /// Back to straight sRGB bytes; fully transparent colors come out as zero.
    pub fn to_srgba_u8(&self) -> [u8; 4] {
        let unpremul = |c: f32| if self.a > 1e-4 { c / self.a } else { 0.0 };
        let srgb: Srgba = Srgba::from_color(LinSrgba::new(
            unpremul(self.r),
            unpremul(self.g),
            unpremul(self.b),
            self.a,
        ));
        let byte = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        [byte(srgb.red), byte(srgb.green), byte(srgb.blue), byte(srgb.alpha)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_hex_round_trips_through_linear_space() {
        let c = ColorLinPremul::parse_css("#ff0000").unwrap();
        assert_eq!(c.to_srgba_u8(), [255, 0, 0, 255]);
        assert_eq!(ColorLinPremul::parse_css("red"), Some(c));
    }

    #[test]
    fn css_parse_rejects_garbage() {
        assert!(ColorLinPremul::parse_css("not-a-color").is_none());
    }

    #[test]
    fn opacity_scales_alpha() {
        let c = ColorLinPremul::rgba(0, 0, 255, 255).with_opacity(0.5);
        assert!((c.a - 0.5).abs() < 1e-6);
        assert!(ColorLinPremul::TRANSPARENT.is_transparent());
    }
}
