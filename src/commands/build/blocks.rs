use anyhow::{Context, Result};
use regex::Regex;

const MIN_BLOCK_WORDS: usize = 5;
const MAX_FRAGMENT_WORDS: usize = 3;
const MIN_START_CHARS: usize = 15;

pub(crate) struct BlockDetector {
    table_row: Regex,
    numeric_item: Regex,
    roman_marker: Regex,
    option_line: Regex,
    wh_start: Regex,
    known_stem: Regex,
}

impl BlockDetector {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            table_row: Regex::new(r"[A-Za-z0-9]+\s*\|\s*[A-Za-z0-9]+")
                .context("failed to compile table continuation pattern")?,
            numeric_item: Regex::new(r"^\d+\s*[\.\)]\s+")
                .context("failed to compile numeric continuation pattern")?,
            roman_marker: Regex::new(r"(?i)^(?:viii|vii|iii|vi|iv|ix|ii|x|v|i)[\.\:]")
                .context("failed to compile roman continuation pattern")?,
            option_line: Regex::new(r"^[\(\[]?\s*[a-eA-E][\)\.\]]?\s")
                .context("failed to compile option continuation pattern")?,
            wh_start: Regex::new(r"(?i)^(?:which|what|when|where|who|identify)\b")
                .context("failed to compile wh-start pattern")?,
            known_stem: Regex::new(
                r"(?i)^(?:with reference|consider the following|which of the following|which one of the following|assertion|read the following|regarding|in the context|who among the following|identify the correct|identify which)",
            )
            .context("failed to compile question-stem pattern")?,
        })
    }

    pub(crate) fn detect(&self, text: &str) -> Vec<String> {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<&str>>();

        let mut blocks = Vec::<String>::new();
        let mut current = Vec::<&str>::new();

        for line in lines {
            if self.table_row.is_match(line)
                || self.numeric_item.is_match(line)
                || self.roman_marker.is_match(line)
                || self.option_line.is_match(line)
            {
                current.push(line);
                continue;
            }

            let first_is_lowercase = line
                .chars()
                .next()
                .map(char::is_lowercase)
                .unwrap_or(false);
            if !current.is_empty() && first_is_lowercase {
                current.push(line);
                continue;
            }

            if !current.is_empty() && line.split_whitespace().count() <= MAX_FRAGMENT_WORDS {
                current.push(line);
                continue;
            }

            if self.is_probable_question_start(line) {
                let accumulated_words = current
                    .iter()
                    .map(|entry| entry.split_whitespace().count())
                    .sum::<usize>();

                if !current.is_empty() && accumulated_words < MIN_BLOCK_WORDS {
                    current.push(line);
                    continue;
                }

                if !current.is_empty() {
                    blocks.push(current.join("\n"));
                    current.clear();
                }
                current.push(line);
                continue;
            }

            current.push(line);
        }

        if !current.is_empty() {
            blocks.push(current.join("\n"));
        }

        blocks
    }

    pub(crate) fn is_probable_question_start(&self, line: &str) -> bool {
        let lowered = line.trim().to_lowercase();
        if lowered.len() < MIN_START_CHARS {
            return false;
        }

        let word_count = lowered.split_whitespace().count();

        if self.wh_start.is_match(&lowered) && word_count > 3 {
            return true;
        }

        if self.known_stem.is_match(line) {
            return true;
        }

        if lowered.starts_with("how many") && word_count > 3 {
            return true;
        }

        lowered.ends_with('?') && word_count > 4
    }
}
