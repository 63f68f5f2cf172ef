use unicode_segmentation::UnicodeSegmentation;

/// Case transform applied before shaping (`text-transform`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
    /// Uppercase the first letter of every word.
    Capitalize,
}

impl TextTransform {
    pub fn apply(self, text: &str) -> String {
        match self {
            TextTransform::None => text.to_owned(),
            TextTransform::Uppercase => text.to_uppercase(),
            TextTransform::Lowercase => text.to_lowercase(),
            TextTransform::Capitalize => {
                let mut out = String::with_capacity(text.len());
                for word in text.split_word_bounds() {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) if first.is_alphabetic() => {
                            out.extend(first.to_uppercase());
                            out.push_str(chars.as_str());
                        }
                        _ => out.push_str(word),
                    }
                }
                out
            }
        }
    }
}
