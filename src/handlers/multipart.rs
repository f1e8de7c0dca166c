use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::services::Attachments;
use crate::storage::UploadFile;

/// Name of the form part carrying the JSON body
pub const PAYLOAD_PART: &str = "payload";

/// Split a multipart form into its JSON body and file parts.
///
/// The `payload` part is parsed as a JSON object. Other text parts become
/// top-level keys; repeating a key collects its values into an array, and a
/// single text value under one of `list_fields` is read as a comma-separated
/// list. Parts with a file name are files, grouped by part name.
pub async fn read_form(mut multipart: Multipart, list_fields: &[&str]) -> Result<(Value, Attachments), ApiError> {
    let mut body = Map::new();
    let mut files = Attachments::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string).filter(|n| !n.is_empty()) else {
            continue;
        };

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let content = field.bytes().await.map_err(multipart_error)?;
            // Browsers send an empty, nameless part for an untouched file input
            if file_name.is_empty() && content.is_empty() {
                continue;
            }
            files
                .entry(name)
                .or_default()
                .push(UploadFile::new(file_name, content_type, content));
            continue;
        }

        let text = field.text().await.map_err(multipart_error)?;
        if name == PAYLOAD_PART {
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(object)) => body.extend(object),
                Ok(_) => return Err(ApiError::invalid_json("payload part must be a JSON object")),
                Err(e) => return Err(ApiError::invalid_json(format!("Invalid payload part: {}", e))),
            }
        } else {
            let value = text_value(&text);
            match body.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    body.insert(name, value);
                }
            }
        }
    }

    for field in list_fields {
        if let Some(value) = body.get_mut(*field) {
            listify(value);
        }
    }

    Ok((Value::Object(body), files))
}

/// A plain string becomes the list of its comma-separated items
fn listify(value: &mut Value) {
    if let Value::String(text) = value {
        let items = text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect();
        *value = Value::Array(items);
    }
}

/// Form text stays a string unless it is clearly JSON: an object, an array,
/// a boolean or null
fn text_value(text: &str) -> Value {
    let trimmed = text.trim();
    let looks_like_json = trimmed.starts_with('{')
        || trimmed.starts_with('[')
        || matches!(trimmed, "true" | "false" | "null");
    if looks_like_json {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return value;
        }
    }
    Value::String(text.to_string())
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_list_field_becomes_array() {
        let mut one = json!("7f1c0a52-3c4e-4f8e-9a59-0f6a3f3e2b11");
        listify(&mut one);
        assert_eq!(one, json!(["7f1c0a52-3c4e-4f8e-9a59-0f6a3f3e2b11"]));

        let mut many = json!("a, b,,c");
        listify(&mut many);
        assert_eq!(many, json!(["a", "b", "c"]));

        let mut already = json!(["a"]);
        listify(&mut already);
        assert_eq!(already, json!(["a"]));
    }

    #[test]
    fn text_values() {
        assert_eq!(text_value("true"), json!(true));
        assert_eq!(text_value("[\"a\"]"), json!(["a"]));
        assert_eq!(text_value("2024"), json!("2024"));
        assert_eq!(text_value("{not json"), json!("{not json"));
        assert_eq!(text_value("null"), Value::Null);
    }
}
