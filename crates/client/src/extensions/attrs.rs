//! Extensions that add or strip attributes.

use crate::html;
use lol_html::element;
use lol_html::html_content::Element;
use mirage_core::Error;

/// Set `name` only when the element does not carry it yet.
fn set_default(el: &mut Element, name: &str, value: &str) -> lol_html::HandlerResult {
    if !el.has_attribute(name) {
        el.set_attribute(name, value)?;
    }
    Ok(())
}

const RESPONSIVE_IMAGE_STYLE: &str = "max-width:100%;height:auto;";

/// Append the responsive sizing rules to any existing inline style. A style
/// that already sets `max-width` is left alone.
fn add_responsive_style(el: &mut Element) -> lol_html::HandlerResult {
    let style = match el.get_attribute("style") {
        None => RESPONSIVE_IMAGE_STYLE.to_string(),
        Some(existing) if existing.to_ascii_lowercase().contains("max-width") => return Ok(()),
        Some(existing) => {
            let existing = existing.trim_end();
            if existing.is_empty() || existing.ends_with(';') {
                format!("{existing}{RESPONSIVE_IMAGE_STYLE}")
            } else {
                format!("{existing};{RESPONSIVE_IMAGE_STYLE}")
            }
        }
    };
    el.set_attribute("style", &style)?;
    Ok(())
}

pub(super) fn optimize_images(html: &str) -> Result<String, Error> {
    html::rewrite(
        html,
        vec![element!("img", |el| {
            set_default(el, "loading", "lazy")?;
            set_default(el, "decoding", "async")?;
            add_responsive_style(el)
        })],
    )
}

pub(super) fn block_autoplay(html: &str) -> Result<String, Error> {
    html::rewrite(
        html,
        vec![
            element!("video[autoplay], iframe[autoplay]", |el| {
                el.remove_attribute("autoplay");
                Ok(())
            }),
            element!("[autoplay]", |el| {
                if el
                    .get_attribute("autoplay")
                    .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
                {
                    el.remove_attribute("autoplay");
                }
                Ok(())
            }),
        ],
    )
}

pub(super) fn lazy_load(html: &str) -> Result<String, Error> {
    html::rewrite(
        html,
        vec![element!("img, iframe", |el| set_default(el, "loading", "lazy"))],
    )
}
