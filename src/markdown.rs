//! MarkdownV2 escaping for model output.
//!
//! Telegram's MarkdownV2 mode rejects any message with an unescaped reserved
//! character, so text coming back from Gemini has to be escaped before it can
//! be sent. Fenced code blocks are the exception: their contents are opaque to
//! the renderer and must pass through untouched.

/// Marker that opens and closes a fenced code block.
const FENCE: &str = "```";

/// Characters escaped outside fences. `*` is handled separately (stripped).
pub const DEFAULT_RESERVED: &str = r"_{}[]()~`>#+-=|.!\";

/// Single-pass escaper with a configurable reserved set.
///
/// Outside fences every `*` is dropped and every reserved character gets a
/// backslash in front of it. Inside fences nothing is changed. An
/// unterminated fence keeps the rest of the input verbatim.
#[derive(Debug, Clone)]
pub struct MarkdownEscaper {
    reserved: Vec<char>,
}

impl MarkdownEscaper {
    pub fn new() -> Self {
        Self::with_reserved(DEFAULT_RESERVED)
    }

    /// Build an escaper for a custom reserved set.
    ///
    /// `*` is always stripped outside fences, so it is ignored here.
    pub fn with_reserved(reserved: &str) -> Self {
        let mut chars: Vec<char> = reserved.chars().filter(|&c| c != '*').collect();
        chars.sort_unstable();
        chars.dedup();
        Self { reserved: chars }
    }

    pub fn sanitize(&self, text: &str) -> String {
        let mut output = String::with_capacity(text.len() + text.len() / 8);
        let mut pending = String::new();
        let mut in_fence = false;
        let mut rest = text;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix(FENCE) {
                if !in_fence {
                    self.flush(&mut pending, &mut output);
                }
                in_fence = !in_fence;
                output.push_str(FENCE);
                rest = after;
                continue;
            }

            let Some(ch) = rest.chars().next() else { break };
            if in_fence {
                output.push(ch);
            } else {
                pending.push(ch);
            }
            rest = &rest[ch.len_utf8()..];
        }

        self.flush(&mut pending, &mut output);
        output
    }

    /// Apply the outside-fence policy to `pending` and move it into `output`.
    fn flush(&self, pending: &mut String, output: &mut String) {
        for ch in pending.chars().filter(|&c| c != '*') {
            if self.reserved.binary_search(&ch).is_ok() {
                output.push('\\');
            }
            output.push(ch);
        }
        pending.clear();
    }
}

impl Default for MarkdownEscaper {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape `text` with the default reserved set.
pub fn sanitize(text: &str) -> String {
    MarkdownEscaper::new().sanitize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_reserved(c: char) -> bool {
        DEFAULT_RESERVED.contains(c)
    }

    /// Every reserved char must be preceded by exactly one escaping backslash.
    fn assert_fully_escaped(input: &str, output: &str) {
        let expected: String = input
            .chars()
            .filter(|&c| c != '*')
            .flat_map(|c| {
                if is_reserved(c) {
                    vec!['\\', c]
                } else {
                    vec![c]
                }
            })
            .collect();
        assert_eq!(output, expected, "input: {input:?}");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_strips_asterisks() {
        assert_eq!(sanitize("a*b*c"), "abc");
        assert_eq!(sanitize("**bold**"), "bold");
    }

    #[test]
    fn test_escapes_hyphen() {
        assert_eq!(sanitize("1-2"), "1\\-2");
    }

    #[test]
    fn test_escapes_every_reserved_char() {
        for c in DEFAULT_RESERVED.chars() {
            let input = format!("x{c}y");
            assert_eq!(sanitize(&input), format!("x\\{c}y"), "char {c:?}");
        }
    }

    #[test]
    fn test_backslash_is_escaped_as_itself() {
        assert_eq!(sanitize(r"C:\dir"), r"C:\\dir");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(sanitize("hello world 123"), "hello world 123");
        assert_eq!(sanitize("привет, мир 🌍"), "привет, мир 🌍");
    }

    #[test]
    fn test_caret_and_other_punctuation_not_reserved() {
        assert_eq!(sanitize("2^3 costs $5, ok? @me %"), "2^3 costs $5, ok? @me %");
    }

    #[test]
    fn test_unfenced_text_fully_escaped() {
        let samples = [
            "# Title\n\n- item one.\n- item (two)!",
            "a_b [link](http://x.y) ~strike~ > quote | pipe {brace} = +1",
            "**Note:** use `code` here.",
            "single ` and double `` backticks",
            "mixed *stars* and_underscores_ ✨.",
        ];
        for s in samples {
            assert_fully_escaped(s, &sanitize(s));
        }
    }

    #[test]
    fn test_fenced_block_passes_verbatim() {
        let input = "before ```*x*-y``` after-text";
        assert_eq!(sanitize(input), "before ```*x*-y``` after\\-text");
    }

    #[test]
    fn test_fence_contents_byte_for_byte() {
        let a = "Here is code:\n";
        let b = "rust\nfn main() { let v = vec![1, 2]; println!(\"{:?}\", *v.first().unwrap()); }\n";
        let c = "\nThat's it.";
        let input = format!("{a}```{b}```{c}");
        let output = sanitize(&input);

        let expected = format!("{}```{b}```{}", sanitize(a), sanitize(c));
        assert_eq!(output, expected);
        assert!(output.contains(b));
    }

    #[test]
    fn test_multiple_fences() {
        let input = "a.```x.```b.```y.```c.";
        assert_eq!(sanitize(input), "a\\.```x.```b\\.```y.```c\\.");
    }

    #[test]
    fn test_fence_not_required_on_own_line() {
        assert_eq!(sanitize("run ```ls -la``` now."), "run ```ls -la``` now\\.");
    }

    #[test]
    fn test_unterminated_fence_keeps_tail() {
        let input = "pre-fence ```tail *with* [stuff]. and more";
        assert_eq!(sanitize(input), "pre\\-fence ```tail *with* [stuff]. and more");
    }

    #[test]
    fn test_stray_fence_at_end() {
        assert_eq!(sanitize("done.```"), "done\\.```");
    }

    #[test]
    fn test_asterisks_kept_inside_fence() {
        assert_eq!(sanitize("```a*b```*c"), "```a*b```c");
    }

    #[test]
    fn test_four_backticks() {
        // Fence is matched greedily from the left; the fourth backtick is fenced content.
        assert_eq!(sanitize("````x```"), "````x```");
    }

    #[test]
    fn test_not_idempotent() {
        let once = sanitize("1.5");
        assert_eq!(once, "1\\.5");
        assert_eq!(sanitize(&once), "1\\\\\\.5");
        assert_ne!(sanitize(&once), once);
    }

    #[test]
    fn test_custom_reserved_set() {
        let escaper = MarkdownEscaper::with_reserved(".!");
        assert_eq!(escaper.sanitize("a-b. c!"), "a-b\\. c\\!");
    }

    #[test]
    fn test_custom_reserved_set_still_strips_asterisks() {
        let escaper = MarkdownEscaper::with_reserved("*.");
        assert_eq!(escaper.sanitize("*a*."), "a\\.");
    }

    #[test]
    fn test_escaper_is_reusable() {
        let escaper = MarkdownEscaper::default();
        assert_eq!(escaper.sanitize("```open"), "```open");
        // No state leaks between calls.
        assert_eq!(escaper.sanitize("a.b"), "a\\.b");
    }
}
