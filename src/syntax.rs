use lazy_static::lazy_static;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

lazy_static! {
    static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref THEME_SET: ThemeSet = ThemeSet::load_defaults();
}

/// Highlight a rendered Rust signature with terminal escapes.
/// Falls back to the plain text if highlighting fails.
pub fn highlight_rust_code(code: &str) -> String {
    let syntax = SYNTAX_SET
        .find_syntax_by_extension("rs")
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
    let Some(theme) = THEME_SET.themes.get("base16-ocean.dark") else {
        return code.to_string();
    };
    let mut h = HighlightLines::new(syntax, theme);

    let mut highlighted = String::new();
    for line in LinesWithEndings::from(code) {
        match h.highlight_line(line, &SYNTAX_SET) {
            Ok(ranges) => {
                highlighted.push_str(&syntect::util::as_24_bit_terminal_escaped(&ranges, false))
            }
            Err(_) => return code.to_string(),
        }
    }
    highlighted.push_str("\x1b[0m");
    highlighted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_keeps_text() {
        let highlighted = highlight_rust_code("fn main() -> Result<()>");
        assert!(highlighted.contains("main"));
        assert!(highlighted.contains("\x1b["));
        assert!(highlighted.ends_with("\x1b[0m"));
    }
}
