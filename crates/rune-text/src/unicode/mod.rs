//! Unicode utilities for rune-text.

pub mod case;

pub use case::TextTransform;
