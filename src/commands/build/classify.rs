use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::QuestionFormat;

pub(crate) struct FormatClassifier {
    column_gap: Regex,
    roman_pairing: Regex,
    numeric_pairing: Regex,
    numeric_bullet: Regex,
    roman_bullet: Regex,
}

struct BlockView<'a> {
    text: &'a str,
    lowered: String,
    lines: Vec<&'a str>,
}

impl<'a> BlockView<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            lowered: text.to_lowercase(),
            lines: text.lines().map(str::trim).collect(),
        }
    }
}

impl FormatClassifier {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            column_gap: Regex::new(r"\s{2,}").context("failed to compile column-gap pattern")?,
            roman_pairing: Regex::new(
                r"(?i)^(?:viii|vii|iii|vi|iv|ix|ii|x|v|i)[\.\)]?\s+[^:]+\s*:\s*\S",
            )
            .context("failed to compile roman pairing pattern")?,
            numeric_pairing: Regex::new(r"^\d{1,2}[\.\)]?\s+.+\s[\-–—]\s+.+$")
                .context("failed to compile numeric pairing pattern")?,
            numeric_bullet: Regex::new(r"^(\d{1,2})[\.\)]\s")
                .context("failed to compile numeric bullet pattern")?,
            roman_bullet: Regex::new(r"(?i)^((?:viii|vii|iii|vi|iv|ix|ii|x|v|i))[\.\)\:]")
                .context("failed to compile roman bullet pattern")?,
        })
    }

    // First matching rule wins; later rules are never consulted. The order is
    // part of the contract: tabular and pairing shapes contain the same
    // numeric/roman markers the statement rule counts, so they go first.
    pub(crate) fn classify(&self, text: &str) -> QuestionFormat {
        let view = BlockView::new(text);

        let rules: [(fn(&Self, &BlockView) -> bool, QuestionFormat); 5] = [
            (Self::matches_table, QuestionFormat::Table),
            (Self::matches_match, QuestionFormat::Match),
            (Self::matches_statement, QuestionFormat::Statement),
            (Self::matches_assertion, QuestionFormat::Assertion),
            (Self::matches_paragraph, QuestionFormat::Paragraph),
        ];

        for (predicate, format) in rules {
            if predicate(self, &view) {
                return format;
            }
        }

        QuestionFormat::Single
    }

    fn matches_table(&self, view: &BlockView) -> bool {
        if view.text.contains('|') {
            return true;
        }

        // Aligned columns whose delimiter OCR lost entirely show up as runs of
        // spaces; pair questions are excluded so they can reach the match rule.
        if view.lowered.contains("matched") {
            return false;
        }

        let column_lines = view
            .lines
            .iter()
            .filter(|line| {
                self.column_gap
                    .split(line)
                    .filter(|cell| !cell.trim().is_empty())
                    .count()
                    >= 3
            })
            .count();

        column_lines >= 2
    }

    fn matches_match(&self, view: &BlockView) -> bool {
        if view.lowered.contains("correctly matched")
            || view.lowered.contains("sequence is correct")
            || view.lowered.contains("match the following")
        {
            return true;
        }

        let roman_pairs = view
            .lines
            .iter()
            .filter(|line| self.roman_pairing.is_match(line))
            .count();
        if roman_pairs >= 2 {
            return true;
        }

        let numeric_pairs = view
            .lines
            .iter()
            .filter(|line| self.numeric_pairing.is_match(line))
            .count();
        numeric_pairs >= 2
    }

    fn matches_statement(&self, view: &BlockView) -> bool {
        if view.lowered.contains("consider the following statements")
            || view.lowered.contains("statement i")
        {
            return true;
        }

        let numeric_markers = view
            .lines
            .iter()
            .filter_map(|line| self.numeric_bullet.captures(line))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect::<BTreeSet<String>>();
        if numeric_markers.len() >= 2 {
            return true;
        }

        let roman_markers = view
            .lines
            .iter()
            .filter_map(|line| self.roman_bullet.captures(line))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_lowercase()))
            .collect::<BTreeSet<String>>();
        roman_markers.len() >= 2
    }

    fn matches_assertion(&self, view: &BlockView) -> bool {
        view.lowered.contains("assertion") && view.lowered.contains("reason")
    }

    fn matches_paragraph(&self, view: &BlockView) -> bool {
        view.lowered.contains("read the following")
            || view.lowered.contains("paragraph")
            || view.lowered.contains("passage")
            || view.text.matches('.').count() >= 5
    }
}
