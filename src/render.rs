use crate::error::Result;

/// The markup collaborators the feed consumes.
///
/// `sanitize` is total and is applied unconditionally to every piece of
/// rendered content. `linkify` is a best-effort display enhancement and is
/// allowed to fail; callers fall back to the untransformed input.
pub trait Markup: Send + Sync {
    /// Strips or neutralizes unsafe markup. Never fails.
    fn sanitize(&self, html: &str) -> String;

    /// Turns bare URLs in `html` into anchors.
    fn linkify(&self, html: &str) -> Result<String>;
}

/// A deliberately conservative stand-in: escapes everything rather than
/// allow-listing tags, and linkifies nothing. Deployments wire a real
/// sanitizer/linkifier behind the same trait.
pub struct EscapingMarkup;

impl Markup for EscapingMarkup {
    fn sanitize(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        for c in html.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }

    fn linkify(&self, html: &str) -> Result<String> {
        Ok(html.to_string())
    }
}

/// The display-name fallback chain: a set HTML display name is sanitized and
/// preferred; otherwise the plain-text name is used. An empty outcome counts
/// as absent, so callers can apply their own final default.
pub fn display_name(markup: &dyn Markup, plain: Option<&str>, html: Option<&str>) -> Option<String> {
    let shown = match html {
        Some(h) if !h.is_empty() => Some(markup.sanitize(h)),
        _ => plain.map(str::to_owned),
    };
    shown.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_markup_neutralizes_script_tags() {
        let out = EscapingMarkup.sanitize("<script>alert(1)</script>Hi");
        assert!(!out.contains("<script>"));
        assert!(out.contains("Hi"));
    }

    #[test]
    fn html_name_is_preferred_and_sanitized() {
        let name = display_name(
            &EscapingMarkup,
            Some("Bee"),
            Some("Bee<script>document.write(\" with an F\")</script>"),
        )
        .unwrap();
        assert!(name.starts_with("Bee"));
        assert!(!name.contains("<script>"));
    }

    #[test]
    fn plain_name_is_used_when_no_html_name_is_set() {
        assert_eq!(
            display_name(&EscapingMarkup, Some("Abe"), None),
            Some("Abe".to_string())
        );
        assert_eq!(display_name(&EscapingMarkup, Some("Abe"), Some("")), Some("Abe".to_string()));
    }

    #[test]
    fn absent_names_stay_absent() {
        assert_eq!(display_name(&EscapingMarkup, None, None), None);
        assert_eq!(display_name(&EscapingMarkup, Some(""), None), None);
    }
}
