use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Inline tags kept in narrative fields that may carry links or emphasis.
pub const INLINE_WHITELIST: &[&str] = &["a", "em", "strong", "i", "b"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "section", "table", "td", "th",
    "tr", "ul",
];

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "wbr"];

const DROPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextMode {
    /// Whitelisted markup kept, all text escaped.
    Markup,
    /// Plain text, with `<` and `&` escaped only where they would read as markup.
    Plain,
    /// Decoded text, nothing escaped.
    Raw,
}

/// Reduces an HTML fragment to text, keeping only `whitelist` tags (with at most an
/// `href` attribute). Other elements are unwrapped so their text survives.
///
/// With `promo_marker`, whitelisted anchors whose `href` contains the marker are
/// removed together with their text. Scripts and styles are dropped. Output has
/// collapsed whitespace and is trimmed. When `whitelist` is empty the output is
/// plain text in which `<` and `&` stay escaped only where a reparse would
/// otherwise read them as a tag or an entity.
pub fn strip_tags(html: &str, whitelist: &[&str], promo_marker: Option<&str>) -> String {
    let mode = if whitelist.is_empty() {
        TextMode::Plain
    } else {
        TextMode::Markup
    };
    strip_with(html, whitelist, promo_marker, mode)
}

/// Decoded text of a fragment, for values such as URLs and email addresses.
pub fn text_content(html: &str) -> String {
    strip_with(html, &[], None, TextMode::Raw)
}

/// Collapses whitespace runs (non-breaking spaces included) to one space and trims.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_with(
    html: &str,
    whitelist: &[&str],
    promo_marker: Option<&str>,
    mode: TextMode,
) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let stripped = render_fragment(html, whitelist, promo_marker, mode);
    if !stripped.is_empty() {
        return stripped;
    }

    // Hand-edited pages sometimes carry dangling closers that swallow the text.
    let flattened = html.replace(['\n', '\r'], " ");
    if !has_visible_text(&flattened) {
        return stripped;
    }
    let repaired = remove_closing_tags(&flattened, &["p", "div"]);
    render_fragment(&repaired, whitelist, promo_marker, mode)
}

fn render_fragment(
    html: &str,
    whitelist: &[&str],
    promo_marker: Option<&str>,
    mode: TextMode,
) -> String {
    let fragment = Html::parse_fragment(html);
    let renderer = Renderer {
        whitelist,
        promo_marker,
        escape: mode == TextMode::Markup,
    };

    let mut out = String::with_capacity(html.len());
    renderer.children(fragment.root_element(), &mut out);
    let text = collapse_whitespace(&out);
    if mode == TextMode::Plain {
        escape_ambiguous(&text)
    } else {
        text
    }
}

struct Renderer<'a> {
    whitelist: &'a [&'a str],
    promo_marker: Option<&'a str>,
    escape: bool,
}

impl Renderer<'_> {
    fn children(&self, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    if self.escape {
                        push_escaped(out, text, false);
                    } else {
                        out.push_str(text);
                    }
                }
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        self.element(child_element, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&self, element: ElementRef<'_>, out: &mut String) {
        let name = element.value().name();
        if DROPPED_ELEMENTS.contains(&name) {
            return;
        }

        if !self.keeps(name) {
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push(' ');
            }
            self.children(element, out);
            if block {
                out.push(' ');
            }
            return;
        }

        let href = element.value().attr("href");
        if name == "a" && self.is_promotional(href) {
            return;
        }

        out.push('<');
        out.push_str(name);
        if let Some(href) = href {
            out.push_str(" href=\"");
            push_escaped(out, href, true);
            out.push('"');
        }

        if VOID_ELEMENTS.contains(&name) {
            out.push_str("/>");
            return;
        }

        out.push('>');
        self.children(element, out);
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }

    fn keeps(&self, name: &str) -> bool {
        self.whitelist
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(name))
    }

    fn is_promotional(&self, href: Option<&str>) -> bool {
        match (self.promo_marker, href) {
            (Some(marker), Some(href)) if !marker.is_empty() => href.contains(marker),
            _ => false,
        }
    }
}

fn push_escaped(out: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes `<` before a tag-opening character and `&` before an entity-name
/// character; every other `<` and `&` already parses back as itself.
fn escape_ambiguous(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        let next = chars.peek().copied().unwrap_or(' ');
        match ch {
            '<' if next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?') => {
                out.push_str("&lt;");
            }
            '&' if next.is_ascii_alphanumeric() || next == '#' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }

    out
}

pub(super) fn has_visible_text(html: &str) -> bool {
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag && !ch.is_whitespace() => return true,
            _ => {}
        }
    }
    false
}

pub(super) fn remove_closing_tags(html: &str, names: &[&str]) -> String {
    let lowered = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while cursor < html.len() {
        let matched = names.iter().find_map(|name| {
            let token = format!("</{name}>");
            lowered[cursor..].starts_with(&token).then_some(token.len())
        });
        match matched {
            Some(len) => cursor += len,
            None => {
                let ch = html[cursor..].chars().next().unwrap_or_default();
                out.push(ch);
                cursor += ch.len_utf8().max(1);
            }
        }
    }

    out
}
