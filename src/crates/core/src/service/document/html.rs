//! HTML to plain text for model input.

use crate::util::text::{collapse_whitespace, decode_html_entities};

/// Remove every `<tag ...> ... </tag>` block, case-insensitive.
fn remove_blocks(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}", tag);
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        // `<scripts>` or `<styleguide>` are not the tag we want.
        let after = lower[start + open.len()..].chars().next();
        if !matches!(after, Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r') | Some('/')) {
            out.push_str(&html[pos..start + open.len()]);
            pos = start + open.len();
            continue;
        }
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(close_rel) => {
                let close_start = start + close_rel;
                pos = match lower[close_start..].find('>') {
                    Some(gt) => close_start + gt + 1,
                    None => html.len(),
                };
            }
            None => {
                pos = html.len();
            }
        }
        out.push(' ');
    }
    out.push_str(&html[pos..]);
    out
}

/// A `<` opens markup only when followed by a tag name, end tag, comment,
/// doctype or processing instruction. Anything else is literal text.
fn starts_markup(next: char) -> bool {
    next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?')
}

/// Strip scripts, styles and tags; decode entities; collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = remove_blocks(&remove_blocks(html, "script"), "style");

    let mut result = String::with_capacity(without_blocks.len());
    let mut in_tag = false;
    let mut chars = without_blocks.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' if !in_tag && chars.peek().is_some_and(|&next| starts_markup(next)) => {
                in_tag = true;
            }
            '>' if in_tag => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    collapse_whitespace(&decode_html_entities(&result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let html = r#"<html><head><STYLE type="text/css">p { color: red; }</STYLE>
<script>var q = "<b>not a question</b>";</script></head>
<body><h1>RFI</h1><p>1. Do you&nbsp;support <b>SSO</b>?</p><p>2. R&amp;D budget?</p></body></html>"#;
        assert_eq!(
            html_to_text(html),
            "RFI 1. Do you support SSO ? 2. R&D budget?"
        );
    }

    #[test]
    fn keeps_similarly_named_tags() {
        assert_eq!(html_to_text("<scripts>kept</scripts>"), "kept");
    }

    #[test]
    fn literal_angle_brackets_and_entities_survive() {
        let html = "<p>R&#38;D budget &ndash; vendor&rsquo;s SLA &#8217; Is latency < 10ms? Yes</p>";
        assert_eq!(
            html_to_text(html),
            "R&D budget \u{2013} vendor\u{2019}s SLA \u{2019} Is latency < 10ms? Yes"
        );
        assert_eq!(html_to_text("<p>1 <2 and 3 > 2</p><!-- note -->"), "1 <2 and 3 > 2");
    }

    #[test]
    fn unterminated_script_drops_rest() {
        assert_eq!(html_to_text("before<script>alert(1)"), "before");
    }
}
