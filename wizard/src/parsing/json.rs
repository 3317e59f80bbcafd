use serde::de::DeserializeOwned;

const OPEN_FENCE: &str = "```json";

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Could not find JSON block in the output.")]
    NoJsonBlock,
    #[error("Malformed JSON in model output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Locate the JSON text in a model reply without parsing it.
///
/// Looks for a ```` ```json ```` fenced block first. Models sometimes cut the closing
/// fence short, so a reply ending in ```` `` ```` is also accepted. Failing that, a reply
/// that is itself a bare object is returned whole.
pub fn find_json_block(text: &str) -> Result<&str, ExtractError> {
    let text = text.trim();
    if let Some(start) = text.find(OPEN_FENCE) {
        let body_start = start + OPEN_FENCE.len();
        if let Some(len) = text[body_start..].find("```") {
            return Ok(text[body_start..body_start + len].trim());
        }
        if text.ends_with("``") {
            if let Some(len) = text[body_start..].find("``") {
                return Ok(text[body_start..body_start + len].trim());
            }
        }
    }
    if text.starts_with('{') {
        return Ok(text);
    }
    Err(ExtractError::NoJsonBlock)
}

/// Extract and parse the JSON object in a model reply.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ExtractError> {
    extract_json_as(text)
}

/// Extract the JSON in a model reply and deserialize it straight into `T`.
pub fn extract_json_as<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let block = find_json_block(text)?;
    Ok(serde_json::from_str(block)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use serde_json::json;

    #[test]
    fn bare_object() {
        assert_eq!(extract_json("{\"a\":1}").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fenced_block_matches_direct_parse() {
        let reply = indoc! {r#"
            Here is your recipe:

            ```json
            {"name": "Pancakes", "instructions": ["Mix", "Fry"]}
            ```

            Enjoy!
        "#};
        let direct: serde_json::Value =
            serde_json::from_str(r#"{"name": "Pancakes", "instructions": ["Mix", "Fry"]}"#)
                .unwrap();
        assert_eq!(extract_json(reply).unwrap(), direct);
    }

    #[test]
    fn truncated_closing_fence() {
        let reply = "```json\n{\"a\": [1, 2]}\n``";
        assert_eq!(extract_json(reply).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(extract_json("\n\n  {\"a\": true}  \n").unwrap(), json!({"a": true}));
    }

    #[test]
    fn prose_without_json_fails() {
        let err = extract_json("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, ExtractError::NoJsonBlock));
    }

    #[test]
    fn unlabeled_fence_is_not_json() {
        let err = extract_json("```\n{\"a\": 1}\n```").unwrap_err();
        assert!(matches!(err, ExtractError::NoJsonBlock));
    }

    #[test]
    fn malformed_json_surfaces_parse_error() {
        let err = extract_json("```json\n{\"a\": 1,,}\n```").unwrap_err();
        assert!(matches!(err, ExtractError::Json(_)));
    }

    #[test]
    fn typed_extraction() {
        #[derive(serde::Deserialize)]
        struct Dish {
            name: String,
        }
        let dish: Dish = extract_json_as("```json\n{\"name\": \"Stew\"}\n```").unwrap();
        assert_eq!(dish.name, "Stew");
    }
}
