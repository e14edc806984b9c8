//! Named, composable HTML transforms.
//!
//! Extensions run strictly in the order the caller lists them. Each one is a
//! structural rewrite pass over the document, so nested or malformed markup
//! is matched by element rather than by text pattern.
//!
//! | identifier | effect |
//! |---|---|
//! | `adblock` | drops ad-network scripts/iframes and ad-id divs |
//! | `tracking` | drops analytics pixels and scripts |
//! | `privacy` | drops `keywords`/`description`/`author` meta tags |
//! | `malware` | drops eval/miner/bitcoin scripts and inline `eval(` scripts |
//! | `security` | injects hardening meta tags at the start of `<head>` |
//! | `images` | lazy loading, async decoding, responsive sizing on `<img>` |
//! | `darkmode` | appends a dark theme style block to `<head>` |
//! | `nopopup` | drops popup/modal scripts, dialog divs and popup iframes |
//! | `nobanner` | drops notification/banner/alert divs |
//! | `reader` | appends a readability style block to `<head>` |
//! | `noautoplay` | strips `autoplay` from media |
//! | `nojs` | drops every script and inline event handler |
//! | `lazyload` | `loading="lazy"` on images and iframes lacking it |
//! | `nocookie` | drops cookie scripts and inline `document.cookie` scripts |
//! | `nothirdparty` | drops scripts/links/iframes loaded from other hosts |

mod attrs;
mod filters;
mod inject;

use crate::fetch::TargetUrl;
use mirage_core::Error;
use std::fmt;
use std::str::FromStr;

/// A known extension identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Extension {
    Adblock,
    Tracking,
    Privacy,
    Malware,
    Security,
    Images,
    Darkmode,
    NoPopup,
    NoBanner,
    Reader,
    NoAutoplay,
    NoJs,
    LazyLoad,
    NoCookie,
    NoThirdParty,
}

impl Extension {
    pub const ALL: [Extension; 15] = [
        Extension::Adblock,
        Extension::Tracking,
        Extension::Privacy,
        Extension::Malware,
        Extension::Security,
        Extension::Images,
        Extension::Darkmode,
        Extension::NoPopup,
        Extension::NoBanner,
        Extension::Reader,
        Extension::NoAutoplay,
        Extension::NoJs,
        Extension::LazyLoad,
        Extension::NoCookie,
        Extension::NoThirdParty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Adblock => "adblock",
            Extension::Tracking => "tracking",
            Extension::Privacy => "privacy",
            Extension::Malware => "malware",
            Extension::Security => "security",
            Extension::Images => "images",
            Extension::Darkmode => "darkmode",
            Extension::NoPopup => "nopopup",
            Extension::NoBanner => "nobanner",
            Extension::Reader => "reader",
            Extension::NoAutoplay => "noautoplay",
            Extension::NoJs => "nojs",
            Extension::LazyLoad => "lazyload",
            Extension::NoCookie => "nocookie",
            Extension::NoThirdParty => "nothirdparty",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Extension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Extension::ALL
            .into_iter()
            .find(|ext| ext.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownOption("extension".into()))
    }
}

/// Split a comma-separated `ext` parameter into its non-empty names.
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect()
}

/// Known extensions among `names`, in the given order. Unknown names are skipped.
pub fn parse_names<S: AsRef<str>>(names: &[S]) -> Vec<Extension> {
    names
        .iter()
        .filter_map(|name| match name.as_ref().parse::<Extension>() {
            Ok(ext) => Some(ext),
            Err(_) => {
                tracing::debug!(extension = name.as_ref(), "skipping unknown extension");
                None
            }
        })
        .collect()
}

/// Per-document information some extensions need.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformContext<'a> {
    /// The page being proxied, when there is one.
    pub page: Option<&'a TargetUrl>,
}

impl<'a> TransformContext<'a> {
    pub fn for_page(page: &'a TargetUrl) -> Self {
        Self { page: Some(page) }
    }

    pub(crate) fn page_host(&self) -> Option<&'a str> {
        self.page.and_then(|page| page.as_url().host_str())
    }
}

/// Trait for applying an ordered list of extensions to a document.
pub trait ContentPipeline: Send + Sync {
    fn apply(&self, html: &str, extensions: &[Extension], context: TransformContext<'_>) -> Result<String, Error>;
}

/// Default pipeline: each extension is one rewrite pass, in caller order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionPipeline;

impl ExtensionPipeline {
    pub fn new() -> Self {
        Self
    }

    fn apply_one(&self, html: &str, extension: Extension, context: TransformContext<'_>) -> Result<String, Error> {
        match extension {
            Extension::Adblock => filters::block_ads(html, context),
            Extension::Tracking => filters::strip_tracking(html, context),
            Extension::Privacy => filters::strip_privacy_meta(html, context),
            Extension::Malware => filters::block_malicious(html, context),
            Extension::Security => inject::security_meta(html),
            Extension::Images => attrs::optimize_images(html),
            Extension::Darkmode => inject::dark_theme(html),
            Extension::NoPopup => filters::remove_popups(html, context),
            Extension::NoBanner => filters::remove_banners(html, context),
            Extension::Reader => inject::reader_theme(html),
            Extension::NoAutoplay => attrs::block_autoplay(html),
            Extension::NoJs => filters::disable_scripts(html),
            Extension::LazyLoad => attrs::lazy_load(html),
            Extension::NoCookie => filters::remove_cookie_scripts(html, context),
            Extension::NoThirdParty => filters::block_third_party(html, context),
        }
    }
}

impl ContentPipeline for ExtensionPipeline {
    fn apply(&self, html: &str, extensions: &[Extension], context: TransformContext<'_>) -> Result<String, Error> {
        let mut result = html.to_string();
        for &extension in extensions {
            result = self.apply_one(&result, extension, context)?;
        }
        Ok(result)
    }
}

/// Pipeline that leaves documents untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPipeline;

impl ContentPipeline for NoopPipeline {
    fn apply(&self, html: &str, _extensions: &[Extension], _context: TransformContext<'_>) -> Result<String, Error> {
        Ok(html.to_string())
    }
}
