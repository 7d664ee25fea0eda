use anyhow::{Context, Result};
use regex::Regex;

const ROMAN_NUMERALS: [&str; 10] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X"];

// A pair span holding this many tokens usually carries two pairs whose second
// marker the OCR dropped.
const GLUED_PAIR_TOKENS: usize = 4;

pub(crate) struct MatchFormatter {
    option_tail: Regex,
    roman_marker: Regex,
    question_trigger: Regex,
    dotted_colon: Regex,
    spaced_colon: Regex,
    space_runs: Regex,
}

#[derive(Debug)]
struct PairEntry {
    numeral: usize,
    text: String,
}

impl MatchFormatter {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            option_tail: Regex::new(r"(?:^|\s)\(?[a-eA-E]\)\s")
                .context("failed to compile option-tail pattern")?,
            roman_marker: Regex::new(
                r"(?i)(?P<statement>statement[\s\-]+)?\b(?P<numeral>viii|vii|iii|vi|iv|ix|ii|x|v|i)\.?\s+",
            )
            .context("failed to compile roman marker pattern")?,
            question_trigger: Regex::new(
                r"(?i)\b(?:in\s+how\s+many|how\s+many\s+of\s+the|which\s+of\s+the\s+above|in\s+which\s+of\s+the)\b",
            )
            .context("failed to compile question trigger pattern")?,
            dotted_colon: Regex::new(r"\s*\.+\s*:\s*")
                .context("failed to compile dotted colon pattern")?,
            spaced_colon: Regex::new(r"\s+:\s+").context("failed to compile colon pattern")?,
            space_runs: Regex::new(r" {2,}").context("failed to compile space-run pattern")?,
        })
    }

    pub(crate) fn format(&self, text: &str) -> String {
        let text = self.strip_trailing_options(text.trim());

        let markers = self
            .roman_marker
            .captures_iter(&text)
            .filter(|caps| caps.name("statement").is_none())
            .filter_map(|caps| {
                let numeral = caps.name("numeral")?;
                let value = roman_value(numeral.as_str())?;
                Some((numeral.start(), caps.get(0)?.end(), value))
            })
            .collect::<Vec<(usize, usize, usize)>>();

        if markers.is_empty() {
            return text;
        }

        let header = text[..markers[0].0].trim().to_string();
        let mut pairs = Vec::<PairEntry>::new();
        let mut question = None;

        for (index, (_, span_start, numeral)) in markers.iter().enumerate() {
            let span_end = markers
                .get(index + 1)
                .map(|next| next.0)
                .unwrap_or(text.len());
            let span = text[*span_start..span_end].trim();

            if span.is_empty() {
                continue;
            }

            if let Some(trigger) = self.question_trigger.find(span) {
                let pair_part = span[..trigger.start()].trim();
                if !pair_part.is_empty() {
                    self.push_pair(&mut pairs, *numeral, pair_part);
                }
                question = Some(span[trigger.start()..].trim().to_string());
                break;
            }

            self.push_pair(&mut pairs, *numeral, span);
        }

        pairs.sort_by_key(|pair| pair.numeral);

        let mut sections = Vec::<String>::new();
        if !header.is_empty() {
            sections.push(header);
        }
        if !pairs.is_empty() {
            sections.push(
                pairs
                    .iter()
                    .map(|pair| pair.text.clone())
                    .collect::<Vec<String>>()
                    .join("\n"),
            );
        }
        if let Some(question) = question {
            if !question.is_empty() {
                sections.push(question);
            }
        }

        let joined = sections.join("\n");
        self.space_runs.replace_all(&joined, " ").trim().to_string()
    }

    fn strip_trailing_options(&self, text: &str) -> String {
        match self.option_tail.find(text) {
            Some(found) if found.start() > 0 => text[..found.start()].trim().to_string(),
            _ => text.to_string(),
        }
    }

    fn push_pair(&self, pairs: &mut Vec<PairEntry>, numeral: usize, span: &str) {
        let cleaned = self.dotted_colon.replace_all(span, " : ");
        let cleaned = cleaned.trim_start_matches(':').trim();
        let cleaned = self.spaced_colon.replace_all(cleaned, " : ").to_string();

        if let Some((left, right)) = cleaned.split_once(':') {
            let left = left.trim();
            let right = right.trim();
            if left.is_empty() {
                self.push_colonless_pair(pairs, numeral, right);
            } else {
                pairs.push(PairEntry {
                    numeral,
                    text: format!("{}. {} : {}", roman_numeral(numeral), left, right),
                });
            }
            return;
        }

        self.push_colonless_pair(pairs, numeral, &cleaned);
    }

    fn push_colonless_pair(&self, pairs: &mut Vec<PairEntry>, numeral: usize, span: &str) {
        let words = span.split_whitespace().collect::<Vec<&str>>();

        match words.len() {
            0 => {}
            1 => pairs.push(PairEntry {
                numeral,
                text: format!("{}. {}", roman_numeral(numeral), words[0]),
            }),
            n if n >= GLUED_PAIR_TOKENS => {
                pairs.push(PairEntry {
                    numeral,
                    text: format!("{}. {} : {}", roman_numeral(numeral), words[0], words[1]),
                });

                let overflow_numeral = next_unused_numeral(pairs, numeral);
                let overflow = &words[2..];
                let text = if overflow.len() >= 2 {
                    format!(
                        "{}. {} : {}",
                        roman_numeral(overflow_numeral),
                        overflow[0],
                        overflow[1..].join(" ")
                    )
                } else {
                    format!("{}. {}", roman_numeral(overflow_numeral), overflow.join(" "))
                };
                pairs.push(PairEntry {
                    numeral: overflow_numeral,
                    text,
                });
            }
            _ => pairs.push(PairEntry {
                numeral,
                text: format!(
                    "{}. {} : {}",
                    roman_numeral(numeral),
                    words[0],
                    words[1..].join(" ")
                ),
            }),
        }
    }
}

fn next_unused_numeral(pairs: &[PairEntry], current: usize) -> usize {
    let highest = pairs
        .iter()
        .map(|pair| pair.numeral)
        .max()
        .unwrap_or(current);
    (highest + 1).min(ROMAN_NUMERALS.len())
}

fn roman_numeral(value: usize) -> &'static str {
    ROMAN_NUMERALS[value.clamp(1, ROMAN_NUMERALS.len()) - 1]
}

pub(crate) fn roman_value(numeral: &str) -> Option<usize> {
    ROMAN_NUMERALS
        .iter()
        .position(|entry| entry.eq_ignore_ascii_case(numeral))
        .map(|index| index + 1)
}
