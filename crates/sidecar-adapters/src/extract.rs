use std::sync::LazyLock;

use regex::Regex;
use sidecar_http::get_json_value;

use crate::types::{GalleryDescriptor, UrlPair};

static SCRAPED_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+\.(?:jpg|jpeg|png|gif)"#).expect("valid regex"));

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Recovers `(image_url, thumb_url)` from an upload response body.
/// Tie-break order: a named JSON field first, then a regex scrape of the
/// raw body. Returns `None` if neither recovers anything, matching the
/// typed upload-parse failure the spec calls for on an empty-pair outcome.
pub(crate) fn extract_upload_urls(body: &str, image_path: &str, thumb_path: Option<&str>) -> Option<UrlPair> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(image_url) = non_empty(get_json_value(&json, image_path)) {
            let thumb_url = thumb_path.and_then(|path| non_empty(get_json_value(&json, path)));
            return Some(UrlPair { image_url, thumb_url });
        }
    }

    SCRAPED_URL_RE
        .find(body)
        .map(|found| UrlPair { image_url: found.as_str().to_string(), thumb_url: None })
}

/// Recovers a newly created gallery's id. Tie-break order: a query
/// parameter on the redirect URL, then a "manage gallery" link in the
/// response body, matching §4.8's generic `create_gallery` contract.
pub(crate) fn extract_gallery_id(final_url: &str, body: &str, query_param: &str, manage_link_re: &Regex) -> Option<String> {
    if let Some(id) = query_param_value(final_url, query_param) {
        return Some(id);
    }
    manage_link_re.captures(body).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

fn query_param_value(url: &str, param: &str) -> Option<String> {
    let query = url.split('?').nth(1)?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == param).then(|| value.to_string())
    })
}

/// De-duplicates galleries by id, keeping the first (on-page) occurrence
/// and preserving on-page order.
pub(crate) fn dedup_galleries(galleries: Vec<GalleryDescriptor>) -> Vec<GalleryDescriptor> {
    let mut seen = std::collections::HashSet::new();
    galleries.into_iter().filter(|g| seen.insert(g.id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_named_json_field_over_regex_scrape() {
        let body = r#"{"data": {"image_url": "https://host/a.jpg"}}"#;
        let pair = extract_upload_urls(body, "data.image_url", None).unwrap();
        assert_eq!(pair.image_url, "https://host/a.jpg");
    }

    #[test]
    fn falls_back_to_regex_scrape_when_json_field_is_absent() {
        let body = r#"<p>uploaded to https://host.example/files/x.jpg ok</p>"#;
        let pair = extract_upload_urls(body, "data.image_url", None).unwrap();
        assert_eq!(pair.image_url, "https://host.example/files/x.jpg");
    }

    #[test]
    fn returns_none_when_nothing_recoverable() {
        assert!(extract_upload_urls("no urls here", "data.image_url", None).is_none());
    }

    #[test]
    fn gallery_id_prefers_redirect_query_param() {
        let re = Regex::new(r#"manage/(\d+)"#).unwrap();
        let id = extract_gallery_id("https://host/done?gallery_id=42", "<a href='manage/99'>m</a>", "gallery_id", &re);
        assert_eq!(id.as_deref(), Some("42"));
    }

    #[test]
    fn gallery_id_falls_back_to_manage_link() {
        let re = Regex::new(r#"manage/(\d+)"#).unwrap();
        let id = extract_gallery_id("https://host/done", "<a href='manage/99'>m</a>", "gallery_id", &re);
        assert_eq!(id.as_deref(), Some("99"));
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let galleries = vec![
            GalleryDescriptor { id: "1".into(), name: Some("a".into()), url: None },
            GalleryDescriptor { id: "2".into(), name: Some("b".into()), url: None },
            GalleryDescriptor { id: "1".into(), name: Some("a-dup".into()), url: None },
        ];
        let deduped = dedup_galleries(galleries);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name.as_deref(), Some("a"));
        assert_eq!(deduped[1].id, "2");
    }
}
