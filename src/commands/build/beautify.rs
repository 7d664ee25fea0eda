use anyhow::{Context, Result};
use regex::Regex;

pub(crate) fn format_table_block(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.contains('|') {
                line.split('|')
                    .map(str::trim)
                    .collect::<Vec<&str>>()
                    .join(" | ")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<String>>()
        .join("\n")
}

pub(crate) struct StatementLineBreaker {
    intro: Regex,
    roman_bullet: Regex,
    numeric_bullet: Regex,
    blank_runs: Regex,
}

impl StatementLineBreaker {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            intro: Regex::new(r"(?i)consider the following statements\:?")
                .context("failed to compile statement intro pattern")?,
            roman_bullet: Regex::new(
                r"(?i)(?P<statement>statement[\s\-]+)?\b(?P<marker>(?:viii|vii|iii|vi|iv|ix|ii|x|v|i)[\.\)]\s)",
            )
            .context("failed to compile roman bullet pattern")?,
            numeric_bullet: Regex::new(r"(?P<digits>\d+)[\.\)]\s")
                .context("failed to compile numeric bullet pattern")?,
            blank_runs: Regex::new(r"\n{3,}").context("failed to compile blank-run pattern")?,
        })
    }

    pub(crate) fn break_statements(&self, text: &str) -> String {
        let broken = self.break_after_intro(text);
        let broken = self.break_before_roman_bullets(&broken);
        let broken = self.break_before_numeric_bullets(&broken);

        self.blank_runs
            .replace_all(&broken, "\n\n")
            .trim()
            .to_string()
    }

    fn break_after_intro(&self, text: &str) -> String {
        let Some(found) = self.intro.find(text) else {
            return text.to_string();
        };

        let rest = text[found.end()..].trim_start_matches(' ');
        if rest.starts_with('\n') || rest.is_empty() {
            return text.to_string();
        }

        format!("{}\n{}", &text[..found.end()], rest)
    }

    fn break_before_roman_bullets(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 16);
        let mut last = 0usize;

        for caps in self.roman_bullet.captures_iter(text) {
            if caps.name("statement").is_some() {
                continue;
            }
            let Some(marker) = caps.name("marker") else {
                continue;
            };

            if let Some(cut) = break_point(text, marker.start()) {
                if cut >= last {
                    out.push_str(&text[last..cut]);
                    out.push('\n');
                    last = marker.start();
                }
            }
        }

        out.push_str(&text[last..]);
        out
    }

    fn break_before_numeric_bullets(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 16);
        let mut last = 0usize;

        for caps in self.numeric_bullet.captures_iter(text) {
            let Some(digits) = caps.name("digits") else {
                continue;
            };

            // 1-2 digit markers are statement bullets; longer digit runs are
            // ordinary text such as years and must never be split.
            if digits.as_str().len() > 2 {
                continue;
            }

            let preceded_by_digit = text[..digits.start()]
                .chars()
                .next_back()
                .map(|ch| ch.is_ascii_digit())
                .unwrap_or(false);
            if preceded_by_digit {
                continue;
            }

            if let Some(cut) = break_point(text, digits.start()) {
                if cut >= last {
                    out.push_str(&text[last..cut]);
                    out.push('\n');
                    last = digits.start();
                }
            }
        }

        out.push_str(&text[last..]);
        out
    }
}

fn break_point(text: &str, marker_start: usize) -> Option<usize> {
    if marker_start == 0 {
        return None;
    }

    let preceding = &text[..marker_start];
    if preceding.ends_with('\n') {
        return None;
    }

    let cut = preceding.trim_end_matches(' ').len();
    if cut == 0 || text[..cut].ends_with('\n') {
        return None;
    }

    Some(cut)
}
