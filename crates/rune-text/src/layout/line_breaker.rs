//! Greedy line breaking over per-codepoint advances.
//!
//! All widths are accumulated in 26.6 fixed point; conversion to pixels only
//! happens in [`ShapedText::measured_size`] and the rasterizer.

use core::ops::Range;

use crate::fixed::F26Dot6;
use crate::font::FontBackend;
use crate::layout::{TextOverflow, WrapMode};
use crate::unicode::TextTransform;

const ELLIPSIS: char = '\u{2026}';
const ELLIPSIS_FALLBACK: &str = "...";

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeParams {
    /// Font size in px per em.
    pub font_size: f32,
    /// Line box width; `None` only breaks at newlines.
    pub max_width: Option<f32>,
    pub max_height: Option<f32>,
    pub max_lines: Option<usize>,
    /// Overrides the font's natural line height.
    pub line_height: Option<f32>,
    pub letter_spacing: f32,
    pub transform: TextTransform,
    pub overflow: TextOverflow,
    pub wrap: WrapMode,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            max_width: None,
            max_height: None,
            max_lines: None,
            line_height: None,
            letter_spacing: 0.0,
            transform: TextTransform::None,
            overflow: TextOverflow::Clip,
            wrap: WrapMode::BreakWord,
        }
    }
}

/// One output line: a codepoint range into [`ShapedText::chars`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpan {
    pub range: Range<usize>,
    /// Width including the ellipsis run, if any.
    pub width: F26Dot6,
    pub ellipsis: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapedText {
    /// Codepoints after the case transform.
    pub chars: Vec<char>,
    pub lines: Vec<LineSpan>,
    pub line_height: F26Dot6,
    pub ascent: F26Dot6,
    pub font_size: f32,
    pub letter_spacing: F26Dot6,
    /// Ellipsis run appended to lines flagged with `ellipsis`.
    pub ellipsis: String,
    /// Some content did not fit the vertical limits.
    pub truncated: bool,
}

impl ShapedText {
    pub fn width(&self) -> F26Dot6 {
        self.lines.iter().map(|l| l.width).max().unwrap_or(F26Dot6::ZERO)
    }

    pub fn height(&self) -> F26Dot6 {
        self.line_height * i32::try_from(self.lines.len()).unwrap_or(i32::MAX)
    }

    /// Size in whole pixels, rounded up so glyphs are never clipped.
    pub fn measured_size(&self) -> (f32, f32) {
        (self.width().ceil_px() as f32, self.height().ceil_px() as f32)
    }

    /// Visible text of line `index`, including its ellipsis.
    pub fn line_text(&self, index: usize) -> Option<String> {
        let line = self.lines.get(index)?;
        let mut s: String = self.chars[line.range.clone()].iter().collect();
        if line.ellipsis {
            s.push_str(&self.ellipsis);
        }
        Some(s)
    }

    pub fn line_texts(&self) -> Vec<String> {
        (0..self.lines.len()).filter_map(|i| self.line_text(i)).collect()
    }
}

/// Pen advance for `ch` following `prev` on the same line.
pub(crate) fn advance_of(
    font: &dyn FontBackend,
    prev: Option<char>,
    ch: char,
    px: f32,
    letter_spacing: F26Dot6,
) -> F26Dot6 {
    let kern = prev.map(|p| font.kerning(p, ch, px)).unwrap_or(0.0);
    F26Dot6::from_f32(font.advance(ch, px)) + F26Dot6::from_f32(kern) + letter_spacing
}

fn run_width(font: &dyn FontBackend, chars: &[char], px: f32, spacing: F26Dot6) -> F26Dot6 {
    let mut prev = None;
    let mut w = F26Dot6::ZERO;
    for &c in chars {
        w += advance_of(font, prev, c, px, spacing);
        prev = Some(c);
    }
    w
}

struct Breaker<'a> {
    font: &'a dyn FontBackend,
    chars: &'a [char],
    px: f32,
    spacing: F26Dot6,
    limit: Option<F26Dot6>,
    wrap: WrapMode,
}

impl Breaker<'_> {
    fn finalize(&self, start: usize, mut end: usize, out: &mut Vec<LineSpan>) {
        while end > start && self.chars[end - 1] == ' ' {
            end -= 1;
        }
        let width = run_width(self.font, &self.chars[start..end], self.px, self.spacing);
        out.push(LineSpan {
            range: start..end,
            width,
            ellipsis: false,
        });
    }

    fn run(&self) -> Vec<LineSpan> {
        let chars = self.chars;
        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut width = F26Dot6::ZERO;
        let mut last_space: Option<usize> = None;
        let mut prev: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '\n' {
                self.finalize(line_start, i, &mut lines);
                line_start = i + 1;
                i = line_start;
                width = F26Dot6::ZERO;
                last_space = None;
                prev = None;
                continue;
            }
            if i == line_start && c == ' ' {
                line_start += 1;
                i += 1;
                continue;
            }
            let adv = advance_of(self.font, prev, c, self.px, self.spacing);
            let overflows = match (self.limit, self.wrap) {
                (Some(limit), WrapMode::BreakWord | WrapMode::BreakAll) => width + adv > limit,
                _ => false,
            };
            // The first codepoint of a line is always placed, even if it alone overflows.
            if overflows && i > line_start {
                match last_space.filter(|_| self.wrap == WrapMode::BreakWord) {
                    Some(sp) => {
                        self.finalize(line_start, sp, &mut lines);
                        line_start = sp + 1;
                    }
                    None => {
                        self.finalize(line_start, i, &mut lines);
                        line_start = i;
                    }
                }
                i = line_start;
                width = F26Dot6::ZERO;
                last_space = None;
                prev = None;
                continue;
            }
            width += adv;
            if c == ' ' {
                last_space = Some(i);
            }
            prev = Some(c);
            i += 1;
        }
        if line_start < chars.len() || chars.last() == Some(&'\n') {
            self.finalize(line_start.min(chars.len()), chars.len(), &mut lines);
        }
        lines
    }
}

/// Shape `text` into lines that fit `params`.
///
/// A `max_width` narrower than a single glyph places one codepoint per line.
pub fn shape(text: &str, font: &dyn FontBackend, params: &ShapeParams) -> ShapedText {
    let px = params.font_size.max(0.0);
    let chars: Vec<char> = params.transform.apply(text).chars().collect();
    let spacing = F26Dot6::from_f32(params.letter_spacing);
    let metrics = font.line_metrics(px);
    let line_height = F26Dot6::from_f32(params.line_height.unwrap_or_else(|| metrics.line_height()));
    // Center the glyph ascent/descent inside an overridden line height.
    let half_leading =
        F26Dot6::from_f32((line_height.to_f32() - metrics.ascent - metrics.descent) / 2.0);
    let ascent = F26Dot6::from_f32(metrics.ascent) + half_leading;
    let limit = params.max_width.map(|w| F26Dot6::from_f32(w.max(0.0)));

    let breaker = Breaker {
        font,
        chars: &chars,
        px,
        spacing,
        limit,
        wrap: params.wrap,
    };
    let mut lines = breaker.run();

    let mut allowed = params.max_lines.unwrap_or(usize::MAX);
    if let Some(max_h) = params.max_height {
        let max_h = F26Dot6::from_f32(max_h);
        let mut fit = 0usize;
        while fit < lines.len() && line_height * (fit as i32).saturating_add(1) <= max_h {
            fit += 1;
        }
        // The first line survives a budget shorter than one line so content stays visible.
        allowed = allowed.min(fit.max(1));
    }
    let truncated = lines.len() > allowed;
    lines.truncate(allowed);

    let ellipsis = if font.has_glyph(ELLIPSIS) {
        ELLIPSIS.to_string()
    } else {
        ELLIPSIS_FALLBACK.to_string()
    };
    if truncated && params.overflow == TextOverflow::Ellipsis {
        if let Some(last) = lines.last_mut() {
            let ell: Vec<char> = ellipsis.chars().collect();
            let ell_w = run_width(font, &ell, px, spacing);
            let mut end = last.range.end;
            loop {
                while end > last.range.start && chars[end - 1] == ' ' {
                    end -= 1;
                }
                let w = run_width(font, &chars[last.range.start..end], px, spacing);
                let fits = limit.is_none_or(|l| w + ell_w <= l);
                if fits || end == last.range.start {
                    last.range.end = end;
                    last.width = w + ell_w;
                    last.ellipsis = true;
                    break;
                }
                end -= 1;
            }
        }
    }

    ShapedText {
        chars,
        lines,
        line_height,
        ascent,
        font_size: px,
        letter_spacing: spacing,
        ellipsis,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::BoxFont;

    fn params(width: f32) -> ShapeParams {
        ShapeParams {
            font_size: 20.0,
            max_width: Some(width),
            ..ShapeParams::default()
        }
    }

    #[test]
    fn breaks_at_last_space_and_trims() {
        // Each codepoint is 10px: "a bb" = 40px fits, "a bb ccc" = 80px does not.
        let font = BoxFont::new(0.5);
        let shaped = shape("a bb ccc", &font, &params(50.0));
        assert_eq!(shaped.line_texts(), vec!["a bb", "ccc"]);
        assert_eq!(shaped.lines[0].width, F26Dot6::from_int(40));
        assert_eq!(shaped.measured_size(), (40.0, 40.0));
    }

    #[test]
    fn huge_line_heights_and_font_sizes_saturate() {
        let font = BoxFont::new(0.5);
        let shaped = shape(
            "a\nb",
            &font,
            &ShapeParams {
                font_size: 1e9,
                line_height: Some(1e9),
                max_width: Some(1e9),
                max_height: Some(1e10),
                ..ShapeParams::default()
            },
        );
        assert_eq!(shaped.lines.len(), 2);
        assert_eq!(shaped.height(), F26Dot6(i32::MAX));
        let (w, h) = shaped.measured_size();
        assert!(w > 0.0 && h > 0.0);
    }

    #[test]
    fn hard_breaks_long_words() {
        let font = BoxFont::new(0.5);
        let shaped = shape("abcdefg", &font, &params(30.0));
        assert_eq!(shaped.line_texts(), vec!["abc", "def", "g"]);
    }

    #[test]
    fn width_narrower_than_a_glyph_places_one_per_line() {
        let font = BoxFont::new(0.5);
        let shaped = shape("ab c", &font, &params(3.0));
        assert_eq!(shaped.line_texts(), vec!["a", "b", "c"]);
        let zero = shape("xy", &font, &params(0.0));
        assert_eq!(zero.lines.len(), 2);
    }

    #[test]
    fn newlines_are_mandatory_and_leading_spaces_trimmed() {
        let font = BoxFont::new(0.5);
        let shaped = shape("one\n  two  \n", &font, &ShapeParams::default());
        assert_eq!(shaped.line_texts(), vec!["one", "two", ""]);
    }

    #[test]
    fn shape_is_idempotent() {
        let font = BoxFont::new(0.5);
        let p = params(45.0);
        assert_eq!(shape("the quick brown fox", &font, &p), shape("the quick brown fox", &font, &p));
    }

    #[test]
    fn ellipsis_on_last_accepted_line() {
        let font = BoxFont::new(0.5);
        let p = ShapeParams {
            max_lines: Some(1),
            overflow: TextOverflow::Ellipsis,
            ..params(50.0)
        };
        let shaped = shape("a bb ccc", &font, &p);
        assert!(shaped.truncated);
        // "a bb" + "…" = 50px fits exactly.
        assert_eq!(shaped.line_texts(), vec!["a bb…"]);
        assert_eq!(shaped.lines[0].width, F26Dot6::from_int(50));
    }

    #[test]
    fn ellipsis_falls_back_to_dots_and_pops_codepoints() {
        let font = BoxFont::new(0.5).without_glyphs(['\u{2026}']);
        let p = ShapeParams {
            max_lines: Some(1),
            overflow: TextOverflow::Ellipsis,
            ..params(50.0)
        };
        let shaped = shape("a bb ccc", &font, &p);
        // "..." is 30px, so only "a" fits beside it.
        assert_eq!(shaped.line_texts(), vec!["a..."]);
    }

    #[test]
    fn max_height_limits_lines_and_clip_keeps_text() {
        let font = BoxFont::new(0.5);
        let p = ShapeParams {
            max_height: Some(45.0),
            ..params(30.0)
        };
        let shaped = shape("abcdefghi", &font, &p);
        assert_eq!(shaped.line_texts(), vec!["abc", "def"]);
        assert!(shaped.truncated);
    }

    #[test]
    fn case_transform_applies_before_breaking() {
        let font = BoxFont::new(0.5);
        let p = ShapeParams {
            transform: TextTransform::Uppercase,
            ..params(100.0)
        };
        assert_eq!(shape("hi there", &font, &p).line_texts(), vec!["HI THERE"]);
    }

    #[test]
    fn break_all_ignores_spaces() {
        let font = BoxFont::new(0.5);
        let p = ShapeParams {
            wrap: WrapMode::BreakAll,
            ..params(50.0)
        };
        assert_eq!(shape("a bb ccc", &font, &p).line_texts(), vec!["a bb", "ccc"]);
        let p = ShapeParams {
            wrap: WrapMode::NoWrap,
            ..params(10.0)
        };
        assert_eq!(shape("a bb ccc", &font, &p).line_texts(), vec!["a bb ccc"]);
    }
}
