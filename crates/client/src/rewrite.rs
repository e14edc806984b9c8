//! Link rewriting so that navigation stays inside the proxy.
//!
//! Every resource reference on the page is resolved against the page URL and
//! replaced by a proxy endpoint reference. A `<base>` element pointing at the
//! page's directory is injected so anything left untouched still resolves
//! against the upstream site.

use crate::fetch::{TargetUrl, resolve_relative};
use crate::html::{self, Handlers, attribute, escape_attr};
use lol_html::HandlerResult;
use lol_html::element;
use lol_html::html_content::{ContentType, Element};
use mirage_core::Error;
use regex::Regex;
use std::borrow::Cow;
use std::cell::Cell;
use std::sync::LazyLock;
use url::{Url, form_urlencoded};

/// Path of the proxy endpoint that rewritten references point at.
pub const PROXY_PATH: &str = "/api/proxy";

/// Elements and the attribute on each that carries a reference.
const REFERENCE_ATTRIBUTES: [(&str, &str); 7] = [
    ("a", "href"),
    ("link", "href"),
    ("script", "src"),
    ("img", "src"),
    ("iframe", "src"),
    ("form", "action"),
    ("source", "src"),
];

/// Schemes that must never be proxied.
const OPAQUE_SCHEMES: [&str; 4] = ["data:", "javascript:", "mailto:", "tel:"];

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static REFRESH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*\d+\s*;\s*url\s*=\s*(.+?)\s*$").unwrap());

/// Proxy endpoint reference for an absolute URL.
pub fn proxy_href(target: &Url) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("url", target.as_str())
        .finish();
    format!("{PROXY_PATH}?{query}")
}

/// Recover the target URL from a proxy endpoint reference.
pub fn unproxy(value: &str) -> Option<String> {
    let query = value.trim().strip_prefix(PROXY_PATH)?.strip_prefix('?')?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, target)| target.into_owned())
}

/// The reference an attribute actually points at, seeing through proxy rewriting.
pub fn effective_reference(value: &str) -> Cow<'_, str> {
    match unproxy(value) {
        Some(target) => Cow::Owned(target),
        None => Cow::Borrowed(value),
    }
}

/// Whether a reference uses a scheme that is left as-is.
pub fn is_opaque_reference(value: &str) -> bool {
    let value = value.trim_start();
    OPAQUE_SCHEMES.iter().any(|scheme| {
        value
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Rewrite all references in `html` to go through the proxy and inject a `<base>`.
pub fn rewrite_links(html: &str, page: &TargetUrl) -> Result<String, Error> {
    let base_tag = format!(r#"<base href="{}">"#, escape_attr(&page.base_href()));
    let head_seen = Cell::new(false);

    let mut handlers: Handlers = REFERENCE_ATTRIBUTES
        .iter()
        .map(|&(tag, attr)| element!(format!("{tag}[{attr}]"), move |el| proxy_attribute(el, attr, page)))
        .collect();

    handlers.push(element!("meta[http-equiv]", |el| rewrite_meta(el, page)));
    handlers.push(element!("head", |el| {
        if !head_seen.replace(true) {
            el.prepend(&base_tag, ContentType::Html);
        }
        Ok(())
    }));

    let output = html::rewrite(html, handlers)?;

    if head_seen.get() {
        return Ok(output);
    }

    insert_head(&output, &base_tag)
}

/// Give a head-less document a `<head>` carrying the `<base>` element.
///
/// The head goes inside `<html>` when there is one, otherwise before the
/// first element so a leading doctype stays first.
fn insert_head(html: &str, base_tag: &str) -> Result<String, Error> {
    let head = format!("<head>{base_tag}</head>");
    let placed = Cell::new(false);

    let output = html::rewrite(
        html,
        vec![element!("*", |el| {
            if !placed.replace(true) {
                if el.tag_name().eq_ignore_ascii_case("html") {
                    el.prepend(&head, ContentType::Html);
                } else {
                    el.before(&head, ContentType::Html);
                }
            }
            Ok(())
        })],
    )?;

    if placed.get() { Ok(output) } else { Ok(format!("{head}{output}")) }
}

fn proxy_attribute(el: &mut Element, attr: &str, page: &TargetUrl) -> HandlerResult {
    let Some(value) = attribute(el, attr) else {
        return Ok(());
    };

    let value = value.trim();
    if value.is_empty() || is_opaque_reference(value) {
        return Ok(());
    }

    if let Some(absolute) = resolve_relative(value, page) {
        el.set_attribute(attr, &proxy_href(&absolute))?;
    }

    Ok(())
}

fn rewrite_meta(el: &mut Element, page: &TargetUrl) -> HandlerResult {
    let equiv = el.get_attribute("http-equiv").unwrap_or_default();
    let equiv = equiv.trim();

    if equiv.eq_ignore_ascii_case("content-security-policy") {
        el.remove();
    } else if equiv.eq_ignore_ascii_case("refresh")
        && let Some(content) = attribute(el, "content")
        && let Some(rewritten) = rewrite_refresh(&content, page)
    {
        el.set_attribute("content", &rewritten)?;
    }

    Ok(())
}

/// Rewrite the URL part of a `<meta http-equiv="refresh">` content value.
fn rewrite_refresh(content: &str, page: &TargetUrl) -> Option<String> {
    let target = REFRESH_RE.captures(content)?.get(1)?;
    let reference = target.as_str().trim_matches(|c| c == '\'' || c == '"');

    if reference.is_empty() || is_opaque_reference(reference) {
        return None;
    }

    let absolute = resolve_relative(reference, page)?;
    Some(format!("{}{}", &content[..target.start()], proxy_href(&absolute)))
}
