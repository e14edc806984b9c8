//! Shared helpers for streaming HTML rewrites.

use lol_html::html_content::{ContentType, Element};
use lol_html::{ElementContentHandlers, RewriteStrSettings, Selector, element, rewrite_str, text};
use mirage_core::Error;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};

/// Selector/handler pairs for a single rewrite pass.
pub(crate) type Handlers<'h> = Vec<(Cow<'static, Selector>, ElementContentHandlers<'h>)>;

/// Run one rewrite pass over `html`.
pub(crate) fn rewrite(html: &str, handlers: Handlers<'_>) -> Result<String, Error> {
    rewrite_str(
        html,
        RewriteStrSettings { element_content_handlers: handlers, ..RewriteStrSettings::default() },
    )
    .map_err(|e| Error::Internal(format!("HTML rewrite failed: {}", e)))
}

/// Text content of every element matching `selector`, in document order.
pub(crate) fn collect_text(html: &str, selector: &str) -> Result<Vec<String>, Error> {
    let texts: RefCell<Vec<String>> = RefCell::new(Vec::new());

    rewrite(
        html,
        vec![
            element!(selector, |_el| {
                texts.borrow_mut().push(String::new());
                Ok(())
            }),
            text!(selector, |chunk| {
                if let Some(last) = texts.borrow_mut().last_mut() {
                    last.push_str(chunk.as_str());
                }
                Ok(())
            }),
        ],
    )?;

    Ok(texts.into_inner())
}

/// Where a snippet goes inside `<head>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeadSlot {
    Start,
    End,
}

/// Insert `snippet` into the first `<head>`. Returns the output and whether a head was found.
pub(crate) fn inject_into_head(html: &str, snippet: &str, slot: HeadSlot) -> Result<(String, bool), Error> {
    let seen = Cell::new(false);

    let output = rewrite(
        html,
        vec![element!("head", |el| {
            if !seen.replace(true) {
                match slot {
                    HeadSlot::Start => el.prepend(snippet, ContentType::Html),
                    HeadSlot::End => el.append(snippet, ContentType::Html),
                }
            }
            Ok(())
        })],
    )?;

    Ok((output, seen.get()))
}

/// Attribute value with character references decoded.
pub(crate) fn attribute(el: &Element, name: &str) -> Option<String> {
    el.get_attribute(name).map(|v| html_escape::decode_html_entities(&v).into_owned())
}

/// Escape a value for use inside a double-quoted attribute.
pub(crate) fn escape_attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}
