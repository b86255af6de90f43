/// Locating a JSON payload inside free-form model output.
///
/// Models wrap their JSON in prose and markdown fences often enough that the raw
/// text cannot be handed to `serde_json` directly. The extraction here is a span
/// heuristic, not a balanced parser: it takes the outermost `{...}` or `[...]`,
/// whichever opens first. Responses carrying several independent JSON blobs are
/// not disambiguated.
use serde::de::DeserializeOwned;

/// Outcome of pulling a typed value out of model text.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonParse<T> {
    Parsed(T),
    /// No `{...}` or `[...]` span in the text.
    NotFound,
    /// A span was found but did not deserialize; carries the serde message.
    ParseError(String),
}

/// Return the outermost JSON object or array span in `text`, if any.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let object = bracket_span(text, '{', '}');
    let array = bracket_span(text, '[', ']');

    let (start, end) = match (object, array) {
        (Some(obj), Some(arr)) => {
            if obj.0 <= arr.0 {
                obj
            } else {
                arr
            }
        }
        (Some(obj), None) => obj,
        (None, Some(arr)) => arr,
        (None, None) => return None,
    };
    Some(&text[start..=end])
}

/// Extract the JSON span from `text` and deserialize it as `T`.
pub fn parse_embedded<T: DeserializeOwned>(text: &str) -> JsonParse<T> {
    let Some(span) = extract_json_span(text) else {
        return JsonParse::NotFound;
    };
    match serde_json::from_str::<T>(span) {
        Ok(value) => JsonParse::Parsed(value),
        Err(e) => JsonParse::ParseError(e.to_string()),
    }
}

/// First `open` to last `close`, when the close comes after the open.
fn bracket_span(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then_some((start, end))
}
