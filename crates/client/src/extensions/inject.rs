//! Extensions that inject markup into `<head>`.
//!
//! Documents without a `<head>` are returned unchanged.

use crate::html::{HeadSlot, inject_into_head};
use mirage_core::Error;

const SECURITY_META: &str = concat!(
    r#"<meta http-equiv="X-UA-Compatible" content="IE=edge">"#,
    r#"<meta http-equiv="X-Content-Type-Options" content="nosniff">"#,
    r#"<meta http-equiv="X-Frame-Options" content="SAMEORIGIN">"#,
    r#"<meta http-equiv="Referrer-Policy" content="strict-origin-when-cross-origin">"#,
);

const DARK_THEME: &str = r#"<style>
html { background: #1a1a1a !important; color: #e0e0e0 !important; }
body { background: #1a1a1a !important; color: #e0e0e0 !important; }
a { color: #64b5f6 !important; }
button, input, select, textarea { background: #2a2a2a !important; color: #e0e0e0 !important; border-color: #444 !important; }
img { opacity: 0.9; }
.ad, [class*="ad-"], [id*="ad-"] { display: none !important; }
</style>"#;

const READER_THEME: &str = r#"<style>
body { max-width: 800px; margin: 0 auto; padding: 20px; font-size: 18px; line-height: 1.8; }
h1, h2, h3, h4, h5, h6 { margin-top: 30px; margin-bottom: 15px; }
p { margin-bottom: 15px; }
img { max-width: 100%; height: auto; margin: 20px 0; }
code { background: #f5f5f5; padding: 2px 6px; border-radius: 3px; }
pre { background: #f5f5f5; padding: 15px; border-radius: 5px; overflow-x: auto; }
</style>"#;

fn inject(html: &str, snippet: &str, slot: HeadSlot) -> Result<String, Error> {
    let (output, found) = inject_into_head(html, snippet, slot)?;
    if !found {
        tracing::debug!("document has no <head>, nothing injected");
    }
    Ok(output)
}

pub(super) fn security_meta(html: &str) -> Result<String, Error> {
    inject(html, SECURITY_META, HeadSlot::Start)
}

pub(super) fn dark_theme(html: &str) -> Result<String, Error> {
    inject(html, DARK_THEME, HeadSlot::End)
}

pub(super) fn reader_theme(html: &str) -> Result<String, Error> {
    inject(html, READER_THEME, HeadSlot::End)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_meta_first_in_head() {
        let out = security_meta("<html><head><title>t</title></head></html>").unwrap();
        assert!(out.starts_with(r#"<html><head><meta http-equiv="X-UA-Compatible""#));
        assert!(out.contains(r#"content="SAMEORIGIN""#));
        assert!(out.contains(r#"content="strict-origin-when-cross-origin"><title>"#));
    }

    #[test]
    fn test_dark_theme_before_head_close() {
        let out = dark_theme("<head><title>t</title></head><body></body>").unwrap();
        assert!(out.contains("<title>t</title><style>"));
        assert!(out.contains("</style></head><body>"));
    }

    #[test]
    fn test_reader_theme() {
        let out = reader_theme("<head></head>").unwrap();
        assert!(out.contains("line-height: 1.8"));
    }

    #[test]
    fn test_no_head_is_unchanged() {
        assert_eq!(dark_theme("<p>x</p>").unwrap(), "<p>x</p>");
        assert_eq!(security_meta("<p>x</p>").unwrap(), "<p>x</p>");
    }
}
