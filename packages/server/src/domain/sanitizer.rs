//! Content rules for chat text and viewer display names.
//!
//! Pure functions: no I/O, deterministic.

/// Maximum number of characters kept from a chat message.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Inclusive bounds on the trimmed length of a viewer name.
pub const MIN_VIEWER_NAME_CHARS: usize = 2;
pub const MAX_VIEWER_NAME_CHARS: usize = 50;

/// Message kinds accepted on the wire.
pub const MESSAGE_KINDS: [&str; 3] = ["regular", "system", "moderator"];

/// Trim, strip `<...>` tags and truncate to [`MAX_MESSAGE_CHARS`] characters.
///
/// An empty result means the content must be rejected by the caller.
pub fn sanitize_message(text: &str) -> String {
    let stripped = strip_tags(text.trim());
    stripped
        .trim()
        .chars()
        .take(MAX_MESSAGE_CHARS)
        .collect()
}

/// Whether `name` is an acceptable viewer display name.
pub fn validate_viewer_name(name: &str) -> bool {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(MIN_VIEWER_NAME_CHARS..=MAX_VIEWER_NAME_CHARS).contains(&len) {
        return false;
    }
    trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ')
}

/// Whether `kind` names a known message kind.
pub fn is_valid_message_type(kind: &str) -> bool {
    MESSAGE_KINDS.contains(&kind)
}

/// Remove every `<...>` span. An unterminated `<` is kept as literal text.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_script_tags_and_whitespace() {
        // テスト項目: タグと前後の空白が除去される
        // given (前提条件):
        let input = "<script>hi</script>  ";

        // when (操作):
        let result = sanitize_message(input);

        // then (期待する結果):
        assert_eq!(result, "hi");
    }

    #[test]
    fn test_sanitize_truncates_to_500_chars() {
        // テスト項目: 600 文字の入力が 500 文字に切り詰められる
        // given (前提条件):
        let input = "a".repeat(600);

        // when (操作):
        let result = sanitize_message(&input);

        // then (期待する結果):
        assert_eq!(result.chars().count(), 500);
    }

    #[test]
    fn test_sanitize_counts_characters_not_bytes() {
        // テスト項目: マルチバイト文字も文字数で切り詰められる
        // given (前提条件):
        let input = "あ".repeat(501);

        // when (操作):
        let result = sanitize_message(&input);

        // then (期待する結果):
        assert_eq!(result.chars().count(), 500);
    }

    #[test]
    fn test_sanitize_all_tags_yields_empty() {
        // テスト項目: タグのみの入力は空文字列になる
        // given (前提条件):
        let input = "<b></b>";

        // when (操作):
        let result = sanitize_message(input);

        // then (期待する結果):
        assert!(result.is_empty());
    }

    #[test]
    fn test_sanitize_keeps_unterminated_angle_bracket() {
        // テスト項目: 閉じられていない '<' はそのまま残る
        // given (前提条件):
        let input = "1 < 2 is true";

        // when (操作):
        let result = sanitize_message(input);

        // then (期待する結果):
        assert_eq!(result, "1 < 2 is true");
    }

    #[test]
    fn test_sanitize_trims_whitespace_left_by_tags() {
        let result = sanitize_message("<p> hello world </p>");
        assert_eq!(result, "hello world");
    }

    #[test]
    fn test_validate_viewer_name_accepts_allowed_charset() {
        // テスト項目: 英数字・アンダースコア・ハイフン・内部空白は許可される
        assert!(validate_viewer_name("alice"));
        assert!(validate_viewer_name("Bob_the-Builder 2"));
        assert!(validate_viewer_name("  xy  "));
    }

    #[test]
    fn test_validate_viewer_name_rejects_bad_length() {
        // テスト項目: 2 文字未満・50 文字超は拒否される
        assert!(!validate_viewer_name("a"));
        assert!(!validate_viewer_name("   a   "));
        assert!(!validate_viewer_name(&"a".repeat(51)));
        assert!(validate_viewer_name(&"a".repeat(50)));
    }

    #[test]
    fn test_validate_viewer_name_rejects_exotic_characters() {
        // テスト項目: 絵文字や記号は拒否される
        assert!(!validate_viewer_name("alice🎉"));
        assert!(!validate_viewer_name("<alice>"));
        assert!(!validate_viewer_name("ålice"));
        assert!(!validate_viewer_name("al\tice"));
    }

    #[test]
    fn test_is_valid_message_type() {
        assert!(is_valid_message_type("regular"));
        assert!(is_valid_message_type("system"));
        assert!(is_valid_message_type("moderator"));
        assert!(!is_valid_message_type("admin"));
        assert!(!is_valid_message_type(""));
    }
}
