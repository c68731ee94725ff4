//! Outbound line framing

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminator appended to each line the operator sends
///
/// When both are on, LF goes out before CR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEnding {
    pub lf: bool,
    pub cr: bool,
}

impl Default for LineEnding {
    fn default() -> Self {
        Self { lf: true, cr: true }
    }
}

impl LineEnding {
    pub fn suffix(self) -> &'static [u8] {
        match (self.lf, self.cr) {
            (true, true) => b"\n\r",
            (true, false) => b"\n",
            (false, true) => b"\r",
            (false, false) => b"",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lf, self.cr) {
            (true, true) => f.write_str("LF+CR"),
            (true, false) => f.write_str("LF"),
            (false, true) => f.write_str("CR"),
            (false, false) => f.write_str("none"),
        }
    }
}

/// Encode `text` as ASCII (anything else becomes `?`) and append the terminator
pub fn frame(text: &str, ending: LineEnding) -> Vec<u8> {
    let suffix = ending.suffix();
    let mut bytes = Vec::with_capacity(text.len() + suffix.len());
    bytes.extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
    bytes.extend_from_slice(suffix);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frame_each_terminator() {
        let cases = [
            (true, true, &b"hi\n\r"[..]),
            (true, false, &b"hi\n"[..]),
            (false, true, &b"hi\r"[..]),
            (false, false, &b"hi"[..]),
        ];
        for (lf, cr, expected) in cases {
            assert_eq!(frame("hi", LineEnding { lf, cr }), expected, "lf={lf} cr={cr}");
        }
    }

    #[test]
    fn test_non_ascii_becomes_question_mark() {
        assert_eq!(
            frame("t°C→ok", LineEnding { lf: false, cr: false }),
            b"t?C?ok"
        );
    }

    #[test]
    fn test_default_sends_lf_then_cr() {
        assert_eq!(LineEnding::default().to_string(), "LF+CR");
        assert_eq!(frame("", LineEnding::default()), b"\n\r");
    }

    proptest! {
        #[test]
        fn framed_line_is_ascii_and_one_byte_per_char(text in "\\PC{0,40}") {
            let framed = frame(&text, LineEnding::default());
            prop_assert!(framed.is_ascii());
            prop_assert_eq!(framed.len(), text.chars().count() + 2);
        }
    }
}
