use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

// The syllabus is collaborator-owned configuration; a missing or unreadable
// file is a fatal precondition failure, not something to paper over.
pub(crate) fn load_syllabus(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("syllabus file not found: {}", path.display()))?;

    let syllabus: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse syllabus: {}", path.display()))?;

    let mut lines = Vec::<String>::new();
    for (subject, topics) in &syllabus {
        lines.push(format!("{subject}:"));
        for topic in topics {
            lines.push(format!("- {topic}"));
        }
        lines.push(String::new());
    }

    Ok(lines.join("\n").trim().to_string())
}
