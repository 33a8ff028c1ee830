use std::collections::HashMap;
use std::path::Path;

use sidecar_multipart::{build_multipart_form, ProgressCallback, ResolvedField};
use sidecar_types::{FieldKind, HttpRequestSpec};

use crate::error::HttpError;
use crate::method::parse_method;

/// Resolves a data-driven request's fields into concrete values and issues
/// the multipart upload. `file` fields stream the job's file; `text` fields
/// use their literal value; `dynamic` fields are looked up in `extracted`
/// (the pre-request's extraction map) by the field's `value`, or by its
/// `name` if no lookup key was given.
pub async fn send_upload_request(
    spec: &HttpRequestSpec,
    file_path: &Path,
    client: &reqwest::Client,
    extracted: &HashMap<String, String>,
    progress: Option<ProgressCallback>,
) -> Result<reqwest::Response, HttpError> {
    let fields = resolve_fields(spec, file_path, extracted);
    let form = build_multipart_form(fields, progress).await?;

    let method = parse_method(&spec.method)?;
    let mut request = client.request(method, &spec.url);
    for (name, value) in &spec.headers {
        request = request.header(name, value);
    }
    let response = request.multipart(form).send().await?;
    Ok(response)
}

fn resolve_fields(
    spec: &HttpRequestSpec,
    file_path: &Path,
    extracted: &HashMap<String, String>,
) -> Vec<ResolvedField> {
    spec.fields
        .iter()
        .map(|field| match field.kind {
            FieldKind::File => ResolvedField::File {
                name: field.name.clone(),
                path: file_path.to_path_buf(),
                filename: field
                    .filename
                    .clone()
                    .or_else(|| file_path.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .unwrap_or_default(),
                content_type: field.content_type.clone(),
            },
            FieldKind::Text => {
                ResolvedField::Text { name: field.name.clone(), value: field.value.clone().unwrap_or_default() }
            }
            FieldKind::Dynamic => {
                let lookup_key = field.value.clone().unwrap_or_else(|| field.name.clone());
                let value = extracted.get(&lookup_key).cloned().unwrap_or_default();
                ResolvedField::Text { name: field.name.clone(), value }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_types::{MultipartFieldSpec, ResponseParserKind, ResponseParserSpec};
    use std::path::PathBuf;

    fn base_spec() -> HttpRequestSpec {
        HttpRequestSpec {
            url: "https://example.com/upload".into(),
            method: "POST".into(),
            headers: HashMap::new(),
            fields: Vec::new(),
            form_fields: HashMap::new(),
            pre_request: None,
            response: ResponseParserSpec {
                kind: ResponseParserKind::Json,
                url_path: Some("data.image_url".into()),
                thumb_path: None,
                status_path: None,
                success_value: None,
                url_template: None,
                thumb_template: None,
            },
        }
    }

    #[test]
    fn dynamic_field_looks_up_its_value_as_the_extraction_key() {
        let mut spec = base_spec();
        spec.fields.push(MultipartFieldSpec {
            name: "token".into(),
            kind: FieldKind::Dynamic,
            value: Some("csrf_token".into()),
            filename: None,
            content_type: None,
        });
        let mut extracted = HashMap::new();
        extracted.insert("csrf_token".into(), "abc".into());

        let resolved = resolve_fields(&spec, &PathBuf::from("/tmp/a.jpg"), &extracted);
        match &resolved[0] {
            ResolvedField::Text { name, value } => {
                assert_eq!(name, "token");
                assert_eq!(value, "abc");
            }
            _ => panic!("expected a text field"),
        }
    }

    #[test]
    fn dynamic_field_falls_back_to_its_own_name_as_the_lookup_key() {
        let mut spec = base_spec();
        spec.fields.push(MultipartFieldSpec {
            name: "csrf_token".into(),
            kind: FieldKind::Dynamic,
            value: None,
            filename: None,
            content_type: None,
        });
        let mut extracted = HashMap::new();
        extracted.insert("csrf_token".into(), "xyz".into());

        let resolved = resolve_fields(&spec, &PathBuf::from("/tmp/a.jpg"), &extracted);
        match &resolved[0] {
            ResolvedField::Text { value, .. } => assert_eq!(value, "xyz"),
            _ => panic!("expected a text field"),
        }
    }

    #[test]
    fn file_field_defaults_filename_to_the_path_basename() {
        let mut spec = base_spec();
        spec.fields.push(MultipartFieldSpec {
            name: "file".into(),
            kind: FieldKind::File,
            value: None,
            filename: None,
            content_type: None,
        });
        let resolved = resolve_fields(&spec, &PathBuf::from("/tmp/photo.jpg"), &HashMap::new());
        match &resolved[0] {
            ResolvedField::File { filename, .. } => assert_eq!(filename, "photo.jpg"),
            _ => panic!("expected a file field"),
        }
    }
}
