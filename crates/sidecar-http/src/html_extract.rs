use scraper::{Html, Selector};

/// Applies a CSS selector to an HTML document and returns the first
/// matching element's `value` attribute, falling back to its trimmed text
/// content. Returns the empty string if nothing matches or the selector is
/// malformed.
pub fn extract_html_value(document: &str, selector: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };
    let document = Html::parse_document(document);
    let Some(element) = document.select(&selector).next() else {
        return String::new();
    };
    if let Some(value) = element.value().attr("value") {
        return value.trim().to_string();
    }
    element.text().collect::<String>().trim().to_string()
}
