//! Link extraction from a fetched page: pull `<a href>` targets, strip
//! fragments, resolve relative links against the document's own URL, drop
//! `javascript:` links.
//!
//! Resolution is a plain `rootUrl + "/" + href` join rather than RFC 3986
//! URL-join, carried over from `crawler/data/processor.go`'s
//! `fmt.Sprintf("%s/%s", rootUrl, url)` (so a root-relative href yields a
//! double slash, e.g. `http://h` + `/a` -> `http://h//a`) — this is the
//! extractor's actual, intentional behavior, not a bug to clean up.

use scraper::{Html, Selector};

/// Extracts every usable link from `body`, resolved against `root_url`.
/// Already-absolute hrefs (`http`/`https`) pass through unchanged; anything
/// else is joined with `root_url` by plain string concatenation. Fragment-only
/// targets, empty hrefs, and `javascript:` links are dropped.
pub fn extract_urls(root_url: &str, body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("a[href]").expect("static selector is valid");

    let mut urls = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else { continue };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }

        let resolved = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{root_url}/{href}")
        };
        urls.push(trim_fragment(&resolved));
    }
    urls
}

fn trim_fragment(url: &str) -> String {
    match url.find('#') {
        Some(idx) => url[..idx].to_string(),
        None => url.to_string(),
    }
}

/// Extracts the `<title>` text, if present.
pub fn extract_title(body: &str) -> String {
    let document = Html::parse_document(body);
    let selector = Selector::parse("title").expect("static selector is valid");
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Strips `<script>`, `<style>` and all remaining tags, returning visible
/// text content for body indexing. `ElementRef::text()` walks every
/// descendant text node regardless of ancestry, so script/style contents
/// must be excluded explicitly rather than relying on it.
pub fn extract_body_text(body: &str) -> String {
    let document = Html::parse_document(body);
    let selector = Selector::parse("body").expect("static selector is valid");

    let root = document.select(&selector).next().unwrap_or(document.root_element());
    let mut text = String::new();
    collect_visible_text(*root, &mut text);
    text
}

fn collect_visible_text(node: ego_tree::NodeRef<scraper::Node>, out: &mut String) {
    match node.value() {
        scraper::Node::Text(t) => {
            out.push_str(t);
            out.push(' ');
        }
        scraper::Node::Element(el) if matches!(el.name(), "script" | "style") => {}
        _ => {
            for child in node.children() {
                collect_visible_text(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_a_extracts_resolves_and_filters_links() {
        let html = r#"<html><body><a href="/a">x</a><a href="#frag">y</a><a href="javascript:alert(1)">z</a></body></html>"#;
        let urls = extract_urls("http://h", html);
        assert_eq!(urls, vec!["http://h//a".to_string()]);
    }

    #[test]
    fn already_absolute_links_pass_through_unchanged() {
        let html = r#"<html><body><a href="http://other.example/x">x</a></body></html>"#;
        let urls = extract_urls("http://h", html);
        assert_eq!(urls, vec!["http://other.example/x".to_string()]);
    }

    #[test]
    fn title_extraction_trims_whitespace() {
        let html = "<html><head><title>  Hello World  </title></head><body></body></html>";
        assert_eq!(extract_title(html), "Hello World");
    }
}
