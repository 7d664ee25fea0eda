use serde_json::Value;

#[derive(Debug, Default)]
pub(crate) struct DraftQuestion {
    pub question: String,
    pub options: serde_json::Map<String, Value>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub sub_topic: Option<String>,
    pub keywords: Vec<String>,
    pub correct_answer: Option<String>,
    pub is_multi_correct: bool,
}

impl DraftQuestion {
    // Tolerant by construction: missing fields default, wrong-typed fields
    // degrade to their defaults, and a top-level array yields its first
    // object element. Any `format` field in the payload is ignored here; the
    // classifier owns that decision.
    pub(crate) fn from_value(value: &Value) -> Self {
        let object = match value {
            Value::Object(_) => Some(value),
            Value::Array(items) => items.iter().find(|item| item.is_object()),
            _ => None,
        };

        let Some(object) = object else {
            return Self::default();
        };

        Self {
            question: object
                .get("question")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            options: object
                .get("options")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            subject: string_field(object, "subject"),
            topic: string_field(object, "topic"),
            sub_topic: string_field(object, "sub_topic"),
            keywords: object
                .get("keywords")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|keyword| keyword.trim().to_string())
                        .filter(|keyword| !keyword.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            correct_answer: string_field(object, "correct_answer"),
            is_multi_correct: object
                .get("is_multi_correct")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}
