//! Whitespace and comment stripping for HTML, CSS and JS.
//!
//! These are text-level reductions, not parsers. `minify_html` also runs on
//! every rendered proxy page, and it does not skip `<pre>`, `<textarea>`,
//! `<script>` or `<style>` bodies. Collapsing a newline plus indentation
//! after a JS `//` comment folds the next statement into the comment, so
//! inline scripts that rely on line breaks can stop working. `minify_js` reads
//! `//` inside strings and URLs as a line comment. The proxy path skips
//! minification when `minify_html` is off in the config.

use mirage_core::Error;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        /// SAFETY: Pattern is a compile-time constant that is known to be valid.
        #[allow(clippy::unwrap_used)]
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).unwrap());
    };
}

static_regex!(INTER_TAG_WS_RE, r">\s+<");
static_regex!(WS_RUN_RE, r"\s{2,}");
static_regex!(HTML_COMMENT_RE, r"(?s)<!--.*?-->");
static_regex!(BLOCK_COMMENT_RE, r"(?s)/\*.*?\*/");
static_regex!(LINE_COMMENT_RE, r"(?m)//.*$");
static_regex!(CSS_PUNCT_RE, r"\s*([{}:;,])\s*");

/// What kind of text is being minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Html,
    Css,
    Js,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Html => "html",
            AssetKind::Css => "css",
            AssetKind::Js => "js",
        }
    }
}

impl FromStr for AssetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(AssetKind::Html),
            "css" => Ok(AssetKind::Css),
            "js" => Ok(AssetKind::Js),
            _ => Err(Error::UnknownOption("type".into())),
        }
    }
}

/// Trait for size-reducing text transforms.
pub trait Minifier: Send + Sync {
    fn minify(&self, kind: AssetKind, input: &str) -> String;
}

/// Regex-based minifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMinifier;

impl Minifier for TextMinifier {
    fn minify(&self, kind: AssetKind, input: &str) -> String {
        match kind {
            AssetKind::Html => minify_html(input),
            AssetKind::Css => minify_css(input),
            AssetKind::Js => minify_js(input),
        }
    }
}

/// Minifier that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMinifier;

impl Minifier for NoopMinifier {
    fn minify(&self, _kind: AssetKind, input: &str) -> String {
        input.to_string()
    }
}

/// Collapse inter-tag whitespace and whitespace runs, then drop comments.
pub fn minify_html(html: &str) -> String {
    let out = INTER_TAG_WS_RE.replace_all(html, "><");
    let out = WS_RUN_RE.replace_all(&out, " ");
    HTML_COMMENT_RE.replace_all(&out, "").into_owned()
}

/// Drop comments, collapse whitespace runs and trim around punctuation.
pub fn minify_css(css: &str) -> String {
    let out = BLOCK_COMMENT_RE.replace_all(css, "");
    let out = WS_RUN_RE.replace_all(&out, " ");
    CSS_PUNCT_RE.replace_all(&out, "$1").into_owned()
}

/// Drop block and line comments, collapse whitespace runs and trim.
pub fn minify_js(js: &str) -> String {
    let out = BLOCK_COMMENT_RE.replace_all(js, "");
    let out = LINE_COMMENT_RE.replace_all(&out, "");
    let out = WS_RUN_RE.replace_all(&out, " ");
    out.trim().to_string()
}
