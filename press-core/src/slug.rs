//! Title to URL slug conversion.

use deunicode::deunicode;

/// Convert a post title into a URL-safe, lowercase, hyphen-separated slug.
///
/// Non-ASCII text is transliterated first, so `"Crème Brûlée"` becomes
/// `"creme-brulee"`. Underscores are word characters and survive unless they
/// sit at either end.
pub fn slugify(title: &str) -> String {
    let ascii = deunicode(title).to_lowercase();

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_separator = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_separator = true;
        }
        // anything else is dropped without splitting the word
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_title() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn punctuation_is_dropped() {
        assert_eq!(slugify("What's new in v2.0?"), "whats-new-in-v20");
    }

    #[test]
    fn runs_of_separators_collapse() {
        assert_eq!(slugify("  a -- b\t\tc  "), "a-b-c");
    }

    #[test]
    fn unicode_is_transliterated() {
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
    }

    #[test]
    fn edge_underscores_are_trimmed() {
        assert_eq!(slugify("_private_notes_"), "private_notes");
    }

    #[test]
    fn empty_title() {
        assert_eq!(slugify("?!"), "");
    }
}
