use crate::error::AgentError;

/// Extract the first JSON object from a model reply.
///
/// Models wrap their JSON in different ways:
/// - Clean JSON: `{"key": "value"}`
/// - Fenced: ```json\n{"key": "value"}\n``` (any or no language tag)
/// - Prose around it: `Here is the analysis:\n{"key": "value"}\nHope this helps.`
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    let candidates = std::iter::once(trimmed.to_string())
        .chain(fenced_blocks(trimmed))
        .chain(balanced_objects(trimmed));

    for candidate in candidates {
        if candidate.starts_with('{') && is_json(&candidate) {
            return Ok(candidate);
        }
    }

    Err(AgentError::Parse(format!(
        "No valid JSON object found in response (length={})",
        text.len()
    )))
}

fn is_json(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}

/// Bodies of ``` fenced blocks, in order. The language tag line is skipped.
fn fenced_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let Some(line_end) = after_open.find('\n') else {
            break;
        };
        let body = &after_open[line_end + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(body[..close].trim().to_string());
        rest = &body[close + 3..];
    }

    blocks
}

/// Every top-level balanced `{ ... }` span, skipping braces inside strings.
fn balanced_objects(text: &str) -> Vec<String> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    objects.push(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }

    objects
}

/// Extract the reply's JSON object as a map.
///
/// Anything other than a top-level object (array, scalar) is a parse error.
pub fn parse_object(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>, AgentError> {
    let json_str = extract_json(raw)?;
    match serde_json::from_str::<serde_json::Value>(&json_str)
        .map_err(|e| AgentError::Parse(format!("Invalid JSON: {e}")))?
    {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AgentError::Parse(format!(
            "Expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
