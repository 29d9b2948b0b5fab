//! Placeholder rendering for phishing email templates.
//!
//! Templates use `{{ name }}` placeholders. Values are HTML-escaped in bodies
//! and inserted verbatim in plain-text headers; unknown placeholders render
//! as an empty string.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
});

/// Values available to a template.
pub type RenderContext = BTreeMap<&'static str, String>;

/// Escape text for inclusion in HTML.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn substitute(template: &str, ctx: &RenderContext, encode: fn(&str) -> String) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            ctx.get(&caps[1]).map(|v| encode(v)).unwrap_or_default()
        })
        .into_owned()
}

/// Substitute every placeholder in `html`.
pub fn render(html: &str, ctx: &RenderContext) -> String {
    substitute(html, ctx, escape_html)
}

/// Substitute placeholders in plain text such as an email subject.
pub fn render_text(text: &str, ctx: &RenderContext) -> String {
    substitute(text, ctx, str::to_string)
}

/// Context used by the template preview endpoint.
pub fn sample_context() -> RenderContext {
    RenderContext::from([
        ("first_name", "John".to_string()),
        ("last_name", "Doe".to_string()),
        ("email", "john.doe@contoso.example".to_string()),
        ("company", "@ContosoCorp".to_string()),
        ("invoice_id", "10492".to_string()),
        ("decision_date", "Mon Dec 22 2025 09:17:41".to_string()),
        ("tracking_url", "#".to_string()),
        ("open_pixel_url", "#".to_string()),
    ])
}

/// Per-recipient links derived from the public base URL and token.
pub struct TrackingLinks {
    pub open_pixel_url: String,
    pub click_url: String,
}

impl TrackingLinks {
    pub fn new(base_url: &str, token: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            open_pixel_url: format!("{base}/t/open/{token}.png"),
            click_url: format!("{base}/t/click/{token}"),
        }
    }
}

/// Render a campaign email for one recipient. An open-tracking pixel is
/// appended when the template does not place one itself.
pub fn render_campaign_email(
    html: &str,
    mut ctx: RenderContext,
    links: &TrackingLinks,
) -> String {
    ctx.insert("tracking_url", links.click_url.clone());
    ctx.insert("open_pixel_url", links.open_pixel_url.clone());
    let mut body = render(html, &ctx);
    if !html.contains("open_pixel_url") {
        body.push_str(&format!(
            r#"<img src="{}" width="1" height="1" alt="" style="display:none">"#,
            escape_html(&links.open_pixel_url)
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted_and_escaped() {
        let ctx = RenderContext::from([("first_name", "<Ann>".to_string())]);
        assert_eq!(
            render("Hi {{ first_name }}, {{first_name}}!", &ctx),
            "Hi &lt;Ann&gt;, &lt;Ann&gt;!"
        );
    }

    #[test]
    fn subjects_keep_values_verbatim() {
        let ctx = RenderContext::from([
            ("last_name", "O'Brien".to_string()),
            ("company", "AT&T".to_string()),
        ]);
        assert_eq!(
            render_text("{{ company }} notice for {{last_name}}", &ctx),
            "AT&T notice for O'Brien"
        );
        assert_eq!(render("{{ company }}", &ctx), "AT&amp;T");
    }

    #[test]
    fn unknown_placeholders_render_empty() {
        let ctx = RenderContext::new();
        assert_eq!(render("a{{ missing }}b", &ctx), "ab");
        assert_eq!(render("{ not a placeholder }", &ctx), "{ not a placeholder }");
    }

    #[test]
    fn campaign_email_gets_tracking_links() {
        let links = TrackingLinks::new("https://aware.example/", "tok");
        assert_eq!(links.click_url, "https://aware.example/t/click/tok");
        let html = render_campaign_email(
            r#"<a href="{{ tracking_url }}">Invoice</a>"#,
            RenderContext::new(),
            &links,
        );
        assert!(html.starts_with(r#"<a href="https://aware.example/t/click/tok">"#));
        assert!(html.contains("https://aware.example/t/open/tok.png"));
    }

    #[test]
    fn template_placed_pixel_is_not_duplicated() {
        let links = TrackingLinks::new("http://x", "t");
        let html = render_campaign_email(
            r#"<img src="{{ open_pixel_url }}">"#,
            RenderContext::new(),
            &links,
        );
        assert_eq!(html.matches("/t/open/t.png").count(), 1);
    }
}
