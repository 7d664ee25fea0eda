use serde_json::Value;

use crate::llm::RepairService;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug)]
pub(crate) enum SanitizeOutcome {
    Parsed { value: Value, repaired: bool },
    Failed { error: String, raw_text_excerpt: String },
}

// Parse, then at most one repair round trip, then give up. The repair call is
// the only external effect here and never happens twice for the same block.
pub(crate) fn sanitize_block_response(raw: &str, repair: &dyn RepairService) -> SanitizeOutcome {
    let first_error = match extract_and_parse(raw) {
        Ok(value) => {
            return SanitizeOutcome::Parsed {
                value,
                repaired: false,
            };
        }
        Err(error) => error,
    };

    let repaired_text = match repair.repair_json(raw) {
        Ok(text) => text,
        Err(error) => {
            return failed(raw, format!("{first_error}; repair call failed: {error:#}"));
        }
    };

    match extract_and_parse(&repaired_text) {
        Ok(value) => SanitizeOutcome::Parsed {
            value,
            repaired: true,
        },
        Err(second_error) => failed(
            raw,
            format!("{first_error}; after repair: {second_error}"),
        ),
    }
}

pub(crate) fn extract_and_parse(raw: &str) -> Result<Value, String> {
    let cleaned = strip_control_characters(raw);

    let span = locate_json_span(&cleaned)
        .ok_or_else(|| "no JSON object or array found in response".to_string())?;

    serde_json::from_str::<Value>(span).map_err(|error| error.to_string())
}

fn strip_control_characters(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !matches!(ch, '\u{00}'..='\u{09}' | '\u{0B}'..='\u{1F}' | '\u{7F}'))
        .collect()
}

fn locate_json_span(cleaned: &str) -> Option<&str> {
    let start_object = cleaned.find('{');
    let start_array = cleaned.find('[');
    let start = match (start_object, start_array) {
        (Some(object), Some(array)) => object.min(array),
        (Some(object), None) => object,
        (None, Some(array)) => array,
        (None, None) => return None,
    };

    let end_object = cleaned.rfind('}');
    let end_array = cleaned.rfind(']');
    let end = end_object.into_iter().chain(end_array).max()?;

    if end <= start {
        return None;
    }

    Some(cleaned[start..=end].trim())
}

fn failed(raw: &str, error: String) -> SanitizeOutcome {
    SanitizeOutcome::Failed {
        error,
        raw_text_excerpt: raw.chars().take(EXCERPT_CHARS).collect(),
    }
}
