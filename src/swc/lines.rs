//! Line splitting for text formats with `#` comments.

/// Iterate over the lines of `content`, accepting `\n` and `\r\n`.
pub fn for_each_line(content: &str) -> impl Iterator<Item = &str> {
    content.lines()
}

/// Drop everything from the first `#` on.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim(),
        None => line,
    }
}

/// Non-empty whitespace separated tokens of a comment-stripped line.
pub fn tokens(line: &str) -> impl Iterator<Item = &str> {
    strip_comment(line).split_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_comment() {
        assert_eq!(strip_comment("1 2 3 # soma"), "1 2 3");
        assert_eq!(strip_comment("# header only"), "");
        assert_eq!(strip_comment("no comment"), "no comment");
    }

    #[test]
    fn splits_crlf_lines() {
        let lines: Vec<&str> = for_each_line("a\r\nb\nc").collect();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn tokens_ignore_repeated_whitespace() {
        let t: Vec<&str> = tokens("  1\t 2   3 # x y").collect();
        assert_eq!(t, vec!["1", "2", "3"]);
    }
}
