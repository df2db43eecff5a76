// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises one corpus example before tokenisation.
//
// Corpus lines copied out of web pages or editors often carry:
//   - Non-breaking spaces (U+00A0) and zero-width spaces (U+200B)
//   - Byte order marks at the start of the file
//   - Stray control characters and carriage returns
//   - Runs of spaces
//
// The tokenizer would otherwise spend vocabulary on them.
//
// clean()      : whitespace variants / control chars → ' ',
//                runs collapsed, ends trimmed
// split_pair() : "source\ttarget" → both halves cleaned
//                (the conditional-generation corpus format)

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a single example into one line of plain text.
    pub fn clean(&self, text: &str) -> String {
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;

        for c in text.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() || c.is_whitespace() => ' ',
                c => c,
            };

            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }

    /// Split a `source<TAB>target` line. Lines without a tab, or with an
    /// empty side after cleaning, yield None.
    pub fn split_pair(&self, line: &str) -> Option<(String, String)> {
        let (source, target) = line.split_once('\t')?;
        let source = self.clean(source);
        let target = self.clean(target);
        (!source.is_empty() && !target.is_empty()).then_some((source, target))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hello world  "), "hello world");
    }

    #[test]
    fn test_unicode_spaces_and_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("\u{FEFF}hello\u{00A0}\x01world\r"), "hello world");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }

    #[test]
    fn test_split_pair() {
        let p = Preprocessor::new();
        assert_eq!(
            p.split_pair("CCO  \t ethanol"),
            Some(("CCO".to_string(), "ethanol".to_string()))
        );
        assert_eq!(p.split_pair("no separator"), None);
        assert_eq!(p.split_pair("source only\t   "), None);
    }
}
