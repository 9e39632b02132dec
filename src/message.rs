//! Inbound message decoding
//!
//! A message may start with a `[n]` token selecting VOICEVOX style `n` for
//! that utterance: `"[2] こんにちは"` speaks "こんにちは" with style 2. Without
//! the token the configured default style is used and the text is taken as is.

use crate::{Result, VvspeakError};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// `.` stops at a line break, so a selector only applies to single-line text.
/// One trailing newline is tolerated and not part of the text.
static STYLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[(\d+)\]\s*(.*)\n?$").expect("valid style prefix regex"));

/// First code point of every block of ten Unicode decimal digits (`Nd`)
const DIGIT_ZEROS: [u32; 68] = [
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66, 0x0CE6,
    0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946, 0x19D0, 0x1A80,
    0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0, 0xA9F0, 0xAA50, 0xABF0,
    0xFF10, 0x104A0, 0x10D30, 0x11066, 0x110F0, 0x11136, 0x111D0, 0x112F0, 0x11450, 0x114D0,
    0x11650, 0x116C0, 0x11730, 0x118E0, 0x11950, 0x11C50, 0x11D50, 0x11DA0, 0x11F50, 0x16A60,
    0x16AC0, 0x16B50, 0x1D7CE, 0x1D7D8, 0x1D7E2, 0x1D7EC, 0x1D7F6, 0x1E140, 0x1E2F0, 0x1E4F0,
    0x1E950, 0x1FBF0,
];

/// VOICEVOX style identifier
pub type StyleId = u32;

/// Text to speak together with the style to speak it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledText {
    pub style_id: StyleId,
    pub text: String,
}

/// Value of a decimal digit from any script, e.g. `'２'` or `'٣'`
fn digit_value(c: char) -> Option<u32> {
    let code = u32::from(c);
    let zero = DIGIT_ZEROS.iter().rev().find(|&&zero| zero <= code)?;
    let value = code - zero;
    (value < 10).then_some(value)
}

/// Parse a run of decimal digits; `None` if a digit is unknown or it overflows
fn parse_style_id(digits: &str) -> Option<StyleId> {
    digits.chars().try_fold(0u32, |acc, c| {
        acc.checked_mul(10)?.checked_add(digit_value(c)?)
    })
}

/// Split `raw` into a style id and the text to speak
///
/// Only a leading token counts; anything after it, including further
/// `[n]` tokens, is kept in the text. Digits of any script are accepted.
/// A number too large for a style id is not a selector, and neither is a
/// token followed by more than one line. Fails with `EmptyText` when
/// nothing but whitespace would be spoken.
pub fn decode(raw: &str, default_style_id: StyleId) -> Result<StyledText> {
    let (style_id, text) = match STYLE_PREFIX.captures(raw) {
        Some(caps) => match parse_style_id(&caps[1]) {
            Some(id) => (id, caps.get(2).map_or("", |m| m.as_str())),
            None => {
                debug!("Style selector {} out of range, using default", &caps[1]);
                (default_style_id, raw)
            }
        },
        None => (default_style_id, raw),
    };

    if text.trim().is_empty() {
        return Err(VvspeakError::EmptyText { style_id });
    }

    Ok(StyledText {
        style_id,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(raw: &str, default: StyleId) -> (StyleId, String) {
        let styled = decode(raw, default).unwrap();
        (styled.style_id, styled.text)
    }

    #[test]
    fn test_prefix_selects_style() {
        assert_eq!(ok("[2] こんにちは", 0), (2, "こんにちは".to_string()));
        assert_eq!(ok("[0]hello", 7), (0, "hello".to_string()));
        assert_eq!(ok("  [13]   hi", 0), (13, "hi".to_string()));
    }

    #[test]
    fn test_no_prefix_uses_default_verbatim() {
        assert_eq!(ok("こんにちは", 0), (0, "こんにちは".to_string()));
        assert_eq!(ok(" hello ", 3), (3, " hello ".to_string()));
    }

    #[test]
    fn test_mid_string_token_is_text() {
        assert_eq!(ok("say [1] now", 4), (4, "say [1] now".to_string()));
    }

    #[test]
    fn test_only_first_token_honoured() {
        assert_eq!(ok("[1] [2] text", 0), (1, "[2] text".to_string()));
    }

    #[test]
    fn test_trailing_whitespace_kept() {
        assert_eq!(ok("[1] text  ", 0), (1, "text  ".to_string()));
    }

    #[test]
    fn test_multiline_text_is_not_selected() {
        assert_eq!(ok("[3] one\ntwo", 0), (0, "[3] one\ntwo".to_string()));
    }

    #[test]
    fn test_single_trailing_newline_dropped() {
        assert_eq!(ok("[3] hi\n", 0), (3, "hi".to_string()));
        assert_eq!(ok("[3]\nhi", 0), (3, "hi".to_string()));
        assert_eq!(ok("[3] hi\n\n", 0), (0, "[3] hi\n\n".to_string()));
    }

    #[test]
    fn test_selector_without_text_is_empty() {
        assert!(matches!(
            decode("[5]", 0),
            Err(VvspeakError::EmptyText { style_id: 5 })
        ));
        assert!(matches!(
            decode("[5]   ", 0),
            Err(VvspeakError::EmptyText { style_id: 5 })
        ));
    }

    #[test]
    fn test_empty_and_whitespace_are_empty() {
        assert!(matches!(decode("", 1), Err(VvspeakError::EmptyText { style_id: 1 })));
        assert!(matches!(decode("   ", 1), Err(VvspeakError::EmptyText { .. })));
        assert!(matches!(decode("\u{3000}", 1), Err(VvspeakError::EmptyText { .. })));
    }

    #[test]
    fn test_non_ascii_digits_select_style() {
        assert_eq!(ok("[２] text", 0), (2, "text".to_string()));
        assert_eq!(ok("[１２] text", 0), (12, "text".to_string()));
        assert_eq!(ok("[٣] نص", 0), (3, "نص".to_string()));
    }

    #[test]
    fn test_digit_value() {
        assert_eq!(digit_value('7'), Some(7));
        assert_eq!(digit_value('９'), Some(9));
        assert_eq!(digit_value('\u{0E59}'), Some(9));
        assert_eq!(digit_value('a'), None);
        assert_eq!(digit_value('\u{0669}'), Some(9));
        assert_eq!(parse_style_id("4294967296"), None);
        assert_eq!(parse_style_id("4294967295"), Some(u32::MAX));
    }

    #[test]
    fn test_out_of_range_style_falls_back() {
        assert_eq!(
            ok("[99999999999] text", 1),
            (1, "[99999999999] text".to_string())
        );
    }

    #[test]
    fn test_prefix_property_over_range() {
        for n in [0u32, 1, 9, 10, 255, 65_536, u32::MAX] {
            for t in ["a", "こんにちは", "two words"] {
                assert_eq!(ok(&format!("[{}] {}", n, t), 42), (n, t.to_string()));
            }
        }
    }
}
