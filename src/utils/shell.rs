//! Shell quoting for remote statements and log output.

/// Characters that force a word into single quotes.
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}', '<',
    '>', '|', '&', ';', '#', '~', '=', '%', '^',
];

/// Quote a word for a POSIX shell, leaving plain words untouched.
///
/// Embedded single quotes become `'\''` (close, escaped quote, reopen).
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if !word.contains(SHELL_META) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

/// Render a program and its arguments as one copy-pasteable command line.
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(quote(program))
        .chain(args.iter().map(|a| quote(a.as_ref())))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_pass_through() {
        assert_eq!(quote("yume.service"), "yume.service");
        assert_eq!(quote("/opt/yume"), "/opt/yume");
    }

    #[test]
    fn metacharacters_are_quoted() {
        assert_eq!(quote("fix typo"), "'fix typo'");
        assert_eq!(quote("a;rm -rf /"), "'a;rm -rf /'");
        assert_eq!(quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn single_quote_is_escaped() {
        assert_eq!(quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn empty_word_is_explicit() {
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn command_line_quotes_each_word() {
        assert_eq!(
            command_line("git", &["commit", "-m", "auto deploy 2026-01-02 03:04:05"]),
            "git commit -m 'auto deploy 2026-01-02 03:04:05'"
        );
    }
}
