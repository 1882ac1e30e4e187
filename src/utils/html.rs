/// Clean HTML content using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive,
/// dangerous tags (like <script>, <iframe>) and attributes (like onclick)
/// are stripped. Applied to every piece of user-supplied rich content
/// before it is stored (posts, comments, messages, event descriptions).
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("hello <script>alert(1)</script>world");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("hello"));
    }

    #[test]
    fn keeps_basic_formatting() {
        let cleaned = clean_html("<b>bold</b> and <i>italic</i>");
        assert!(cleaned.contains("<b>bold</b>"));
    }
}
