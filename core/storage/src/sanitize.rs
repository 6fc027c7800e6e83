//! Client filename sanitization.

use unicode_normalization::UnicodeNormalization;

/// Name used when nothing of the original filename survives sanitization.
pub const FALLBACK_NAME: &str = "unnamed";

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turn an arbitrary client-supplied filename into one safe to use as a
/// single path component.
///
/// The name is NFKD-decomposed so accented letters keep their base letter,
/// then non-ASCII characters are dropped, separators become whitespace,
/// whitespace runs collapse into `_`, and anything outside
/// `[A-Za-z0-9_.-]` is removed. Leading and trailing `.`/`_` are stripped,
/// so the result can never be `.`, `..`, or a hidden file. Reserved device
/// names get a `_` prefix.
///
/// # Postconditions
/// - Never empty
/// - Contains no separator, control character, or traversal segment
/// - `sanitize_filename(sanitize_filename(x)) == sanitize_filename(x)`
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(|c| c.is_ascii())
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let stem = trimmed.split('.').next().unwrap_or_default();
    if RESERVED_DEVICE_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        return format!("_{}", trimmed);
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_names_unchanged() {
        assert_eq!(sanitize_filename("report.csv"), "report.csv");
        assert_eq!(sanitize_filename("data-2024_v2.json"), "data-2024_v2.json");
    }

    #[test]
    fn test_traversal_stripped() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename("../../x"), "x");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(sanitize_filename("my  cool\tfile.txt"), "my_cool_file.txt");
    }

    #[test]
    fn test_unsafe_characters_removed() {
        assert_eq!(sanitize_filename("a<b>c:d\"e|f?g*.txt"), "abcdefg.txt");
        assert_eq!(sanitize_filename("tab\u{7}bell.txt"), "tabbell.txt");
    }

    #[test]
    fn test_accents_folded_to_ascii() {
        assert_eq!(sanitize_filename("naïve résumé.pdf"), "naive_resume.pdf");
        assert_eq!(sanitize_filename("Ångström.txt"), "Angstrom.txt");
        assert_eq!(sanitize_filename("ＡＢＣ.csv"), "ABC.csv");
    }

    #[test]
    fn test_never_empty() {
        assert_eq!(sanitize_filename(""), FALLBACK_NAME);
        assert_eq!(sanitize_filename(".."), FALLBACK_NAME);
        assert_eq!(sanitize_filename("../../"), FALLBACK_NAME);
        assert_eq!(sanitize_filename("日本語"), FALLBACK_NAME);
    }

    #[test]
    fn test_hidden_file_dot_stripped() {
        assert_eq!(sanitize_filename(".bashrc"), "bashrc");
    }

    #[test]
    fn test_reserved_device_names_prefixed() {
        assert_eq!(sanitize_filename("CON"), "_CON");
        assert_eq!(sanitize_filename("nul.txt"), "_nul.txt");
        assert_eq!(sanitize_filename("console.txt"), "console.txt");
    }

    proptest! {
        #[test]
        fn prop_idempotent(name in ".*") {
            let once = sanitize_filename(&name);
            prop_assert_eq!(sanitize_filename(&once), once);
        }

        #[test]
        fn prop_safe_component(name in ".*") {
            let out = sanitize_filename(&name);
            prop_assert!(!out.is_empty());
            prop_assert!(out != "." && out != "..");
            prop_assert!(!out.contains('/') && !out.contains('\\'));
            prop_assert!(!out.chars().any(|c| c.is_control()));
            prop_assert!(!out.starts_with('.'));
        }
    }
}
