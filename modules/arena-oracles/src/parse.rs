use serde::de::DeserializeOwned;
use tracing::warn;

use arena_common::OracleError;

/// Strip a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line ("json", "JSON", ...).
    let rest = match rest.find('\n') {
        Some(newline) if !rest[..newline].trim().contains(['{', '[']) => &rest[newline + 1..],
        _ => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model response as JSON, tolerating code fences and leading prose.
pub fn parse_json<T: DeserializeOwned>(what: &str, response: &str) -> Result<T, OracleError> {
    let body = strip_code_fence(response);
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first) => {
            // Models sometimes wrap the JSON in a sentence; retry on the
            // outermost object or array.
            if let Some(inner) = outermost_json(body) {
                if let Ok(value) = serde_json::from_str(inner) {
                    return Ok(value);
                }
            }
            warn!(what, error = %first, "Failed to parse oracle response");
            Err(OracleError::Malformed(format!("{what}: {first}")))
        }
    }
}

fn outermost_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        a: u32,
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  {}  "), "{}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn parses_json_inside_prose() {
        let thing: Thing = parse_json("thing", "Here you go: {\"a\": 3} hope it helps").unwrap();
        assert_eq!(thing, Thing { a: 3 });
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_json::<Thing>("thing", "no json here").unwrap_err();
        assert!(matches!(err, OracleError::Malformed(ref msg) if msg.starts_with("thing")));
    }
}
