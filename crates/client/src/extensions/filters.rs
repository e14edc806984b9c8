//! Extensions that remove elements or attributes.

use super::TransformContext;
use crate::html::{self, Handlers, attribute, collect_text};
use crate::rewrite::effective_reference;
use lol_html::{HandlerResult, element};
use lol_html::html_content::Element;
use mirage_core::Error;
use regex::Regex;
use std::cell::Cell;
use std::sync::LazyLock;
use url::{Host, Url};

const AD_SCRIPT_MARKERS: [&str; 4] = ["google", "ads", "doubleclick", "facebook"];
const TRACKING_PIXEL_MARKERS: [&str; 4] = ["analytics", "tracking", "pixel", "beacon"];
const TRACKING_SCRIPT_MARKERS: [&str; 3] = ["analytics", "gtag", "google-analytics"];
const MALICIOUS_SCRIPT_MARKERS: [&str; 3] = ["eval", "miner", "bitcoin"];
const POPUP_MARKERS: [&str; 2] = ["popup", "modal"];
const POPUP_FRAME_MARKERS: [&str; 3] = ["popup", "modal", "ad"];
const BANNER_MARKERS: [&str; 3] = ["notification", "banner", "alert"];
const COOKIE_SCRIPT_MARKERS: [&str; 2] = ["cookie", "tracking"];
const PRIVATE_META_NAMES: [&str; 3] = ["keywords", "description", "author"];

/// `ad`, `ads`, `advert` or `advertisement` as a separate word of an id.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static AD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|[^a-z])(ad|ads|advert|advertisement)([^a-z]|$)").unwrap());

/// A removal rule: elements matching `selector` are dropped when `matches` holds.
struct Rule {
    selector: &'static str,
    matches: fn(&Element, TransformContext<'_>) -> bool,
}

fn remove_where(html: &str, rules: &[Rule], context: TransformContext<'_>) -> Result<String, Error> {
    let handlers: Handlers = rules
        .iter()
        .map(|rule| {
            element!(rule.selector, move |el| {
                if !el.removed() && (rule.matches)(el, context) {
                    el.remove();
                }
                Ok(())
            })
        })
        .collect();

    html::rewrite(html, handlers)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_ascii_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}

/// The reference as the page wrote it: proxy rewriting is undone and targets
/// on the page's own origin are made relative to the page again.
///
/// Link rewriting absolutizes every reference, so without this step the
/// page's host and directory would be matched against the markers.
fn page_reference(value: &str, context: TransformContext<'_>) -> String {
    let reference = effective_reference(value);
    if let Some(page) = context.page
        && let Ok(target) = Url::parse(reference.trim())
        && let Some(relative) = page.as_url().make_relative(&target)
    {
        return relative;
    }
    reference.into_owned()
}

/// Whether the reference in `attr` contains a marker.
fn reference_contains(el: &Element, attr: &str, markers: &[&str], context: TransformContext<'_>) -> bool {
    attribute(el, attr).is_some_and(|value| contains_any(&page_reference(&value, context), markers))
}

fn attribute_contains(el: &Element, attr: &str, markers: &[&str]) -> bool {
    attribute(el, attr).is_some_and(|value| contains_any(&value, markers))
}

/// Drop `<script>` elements: external ones whose reference contains a marker,
/// inline ones whose text contains `inline_marker`.
fn remove_scripts(
    html: &str, src_markers: &[&str], inline_marker: &str, context: TransformContext<'_>,
) -> Result<String, Error> {
    let texts = collect_text(html, "script")?;
    let index = Cell::new(0usize);

    html::rewrite(
        html,
        vec![element!("script", |el| {
            let position = index.get();
            index.set(position + 1);

            let drop = if el.has_attribute("src") {
                reference_contains(el, "src", src_markers, context)
            } else {
                texts.get(position).is_some_and(|text| text.contains(inline_marker))
            };

            if drop {
                el.remove();
            }
            Ok(())
        })],
    )
}

pub(super) fn block_ads(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    remove_where(
        html,
        &[
            Rule {
                selector: "script[src]",
                matches: |el, context| reference_contains(el, "src", &AD_SCRIPT_MARKERS, context),
            },
            Rule { selector: "iframe[src]", matches: |el, context| reference_contains(el, "src", &["ads"], context) },
            Rule { selector: "div[id]", matches: |el, _| attribute(el, "id").is_some_and(|id| AD_ID_RE.is_match(&id)) },
        ],
        context,
    )
}

pub(super) fn strip_tracking(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    remove_where(
        html,
        &[
            Rule {
                selector: "img[src]",
                matches: |el, context| reference_contains(el, "src", &TRACKING_PIXEL_MARKERS, context),
            },
            Rule {
                selector: "script[src]",
                matches: |el, context| reference_contains(el, "src", &TRACKING_SCRIPT_MARKERS, context),
            },
        ],
        context,
    )
}

pub(super) fn strip_privacy_meta(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    remove_where(
        html,
        &[Rule {
            selector: "meta[name]",
            matches: |el, _| {
                attribute(el, "name").is_some_and(|name| {
                    PRIVATE_META_NAMES.iter().any(|private| name.trim().eq_ignore_ascii_case(private))
                })
            },
        }],
        context,
    )
}

pub(super) fn block_malicious(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    remove_scripts(html, &MALICIOUS_SCRIPT_MARKERS, "eval(", context)
}

pub(super) fn remove_popups(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    remove_where(
        html,
        &[
            Rule {
                selector: "script[src]",
                matches: |el, context| reference_contains(el, "src", &POPUP_MARKERS, context),
            },
            Rule {
                selector: "div",
                matches: |el, _| {
                    attribute(el, "role").is_some_and(|role| role.trim().eq_ignore_ascii_case("dialog"))
                        || attribute_contains(el, "class", &POPUP_MARKERS)
                },
            },
            Rule {
                selector: "iframe[src]",
                matches: |el, context| reference_contains(el, "src", &POPUP_FRAME_MARKERS, context),
            },
        ],
        context,
    )
}

pub(super) fn remove_banners(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    remove_where(
        html,
        &[Rule { selector: "div[class]", matches: |el, _| attribute_contains(el, "class", &BANNER_MARKERS) }],
        context,
    )
}

pub(super) fn remove_cookie_scripts(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    remove_scripts(html, &COOKIE_SCRIPT_MARKERS, "document.cookie", context)
}

/// `on*` attribute names (`onclick`, `onload`, ...).
fn is_event_handler(name: &str) -> bool {
    name.len() > 2
        && name.get(..2).is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
        && name.get(2..).is_some_and(|rest| rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

pub(super) fn disable_scripts(html: &str) -> Result<String, Error> {
    html::rewrite(
        html,
        vec![
            element!("script", |el| {
                el.remove();
                Ok(())
            }),
            element!("*", |el| {
                let handlers: Vec<String> = el
                    .attributes()
                    .iter()
                    .map(|attr| attr.name())
                    .filter(|name| is_event_handler(name))
                    .collect();
                for name in handlers {
                    el.remove_attribute(&name);
                }
                Ok(())
            }),
        ],
    )
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Whether `value` loads from a host other than the page's own.
///
/// Relative references and loopback hosts are local. Without a page, every
/// absolute reference counts as third-party.
fn is_third_party(value: &str, context: TransformContext<'_>) -> bool {
    let reference = effective_reference(value);
    let reference = reference.trim();

    let absolute = if reference.starts_with("//") {
        Url::parse(&format!("https:{reference}")).ok()
    } else if reference.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("http://"))
        || reference.get(..8).is_some_and(|p| p.eq_ignore_ascii_case("https://"))
    {
        Url::parse(reference).ok()
    } else {
        None
    };

    let Some(url) = absolute else {
        return false;
    };

    if is_loopback(&url) {
        return false;
    }

    match (url.host_str(), context.page_host()) {
        (Some(host), Some(page_host)) => !host.eq_ignore_ascii_case(page_host),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn drop_if_foreign(el: &mut Element, attr: &str, context: TransformContext<'_>) -> HandlerResult {
    if attribute(el, attr).is_some_and(|value| is_third_party(&value, context)) {
        el.remove();
    }
    Ok(())
}

pub(super) fn block_third_party(html: &str, context: TransformContext<'_>) -> Result<String, Error> {
    html::rewrite(
        html,
        vec![
            element!("script[src]", |el| drop_if_foreign(el, "src", context)),
            element!("link[href]", |el| drop_if_foreign(el, "href", context)),
            element!("iframe[src]", |el| drop_if_foreign(el, "src", context)),
        ],
    )
}
