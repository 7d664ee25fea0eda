use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;

// Unambiguous leading-character drops seen in OCR output. Longest prefix
// first; at most one fix is ever applied, and only at the start of the value.
const PREFIX_FIXES: [(&str, &str); 3] = [
    ("ll the ", "All the "),
    ("ll ", "All "),
    ("oth ", "Both "),
];

pub(crate) struct OptionNormalizer {
    key_label: Regex,
    value_label: Regex,
}

impl OptionNormalizer {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            key_label: Regex::new(r"^[\(\[]?\s*([a-eA-E])[\)\.\]]?\s*")
                .context("failed to compile option key pattern")?,
            value_label: Regex::new(r"^(?:[\(\[]\s*[a-eA-E]\s*[\)\.\]]|[a-eA-E][\)\.\]])\s*")
                .context("failed to compile option value pattern")?,
        })
    }

    pub(crate) fn normalize(
        &self,
        raw_options: &serde_json::Map<String, Value>,
    ) -> (BTreeMap<String, String>, usize) {
        let mut normalized = BTreeMap::<String, String>::new();
        let mut dropped = 0usize;

        for (raw_key, raw_value) in raw_options {
            let Some(caps) = self.key_label.captures(raw_key.trim()) else {
                dropped += 1;
                continue;
            };
            let Some(letter) = caps.get(1) else {
                dropped += 1;
                continue;
            };

            let value = raw_value.as_str().unwrap_or_default();
            let cleaned = self.strip_value_label(value.trim());

            normalized.insert(letter.as_str().to_uppercase(), cleaned);
        }

        (normalized, dropped)
    }

    fn strip_value_label(&self, value: &str) -> String {
        self.value_label.replace(value, "").trim().to_string()
    }
}

pub(crate) fn fix_ocr_prefix(value: &str) -> (String, bool) {
    for (broken, fixed) in PREFIX_FIXES {
        if let Some(rest) = value.strip_prefix(broken) {
            return (format!("{fixed}{rest}"), true);
        }
    }

    (value.to_string(), false)
}
