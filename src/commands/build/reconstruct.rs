use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    TableRow,
    OptionLine,
    StatementHeader,
    RomanHeader,
    RomanItem,
    NumericHeader,
    NumericItem,
    Plain,
}

pub(crate) struct TextReconstructor {
    table_row: Regex,
    option_line: Regex,
    statement_header: Regex,
    roman_header: Regex,
    roman_item: Regex,
    numeric_header: Regex,
    numeric_item: Regex,
}

pub(crate) fn normalize_lines(text: &str) -> Vec<String> {
    let cleaned = text.replace('\u{00A0}', " ").replace('\u{200B}', "");

    cleaned
        .lines()
        .map(|line| {
            line.chars()
                .filter(|ch| !matches!(ch, '•' | '●' | '■' | '▪' | '▫'))
                .collect::<String>()
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

impl TextReconstructor {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            table_row: Regex::new(r"\|").context("failed to compile table-row pattern")?,
            option_line: Regex::new(r"^[\(\[]?\s*[a-eA-E][\)\.\]]")
                .context("failed to compile option-line pattern")?,
            statement_header: Regex::new(r"(?i)^statement[\s\-]*(?:[ivx]+|\d{1,2})[\.\:]*$")
                .context("failed to compile statement-header pattern")?,
            roman_header: Regex::new(r"(?i)^(?:viii|vii|iii|vi|iv|ix|ii|x|v|i)[\.\:]?$")
                .context("failed to compile roman-header pattern")?,
            roman_item: Regex::new(r"(?i)^(?:viii|vii|iii|vi|iv|ix|ii|x|v|i)[\.\)\:]\s+\S")
                .context("failed to compile roman-item pattern")?,
            numeric_header: Regex::new(r"^\d+\.$")
                .context("failed to compile numeric-header pattern")?,
            numeric_item: Regex::new(r"^\d+\s*[\.\)]\s+\S")
                .context("failed to compile numeric-item pattern")?,
        })
    }

    pub(crate) fn classify_line(&self, line: &str) -> LineKind {
        if self.table_row.is_match(line) {
            LineKind::TableRow
        } else if self.option_line.is_match(line) {
            LineKind::OptionLine
        } else if self.statement_header.is_match(line) {
            LineKind::StatementHeader
        } else if self.roman_header.is_match(line) {
            LineKind::RomanHeader
        } else if self.roman_item.is_match(line) {
            LineKind::RomanItem
        } else if self.numeric_header.is_match(line) {
            LineKind::NumericHeader
        } else if self.numeric_item.is_match(line) {
            LineKind::NumericItem
        } else {
            LineKind::Plain
        }
    }

    pub(crate) fn reconstruct(&self, text: &str) -> String {
        let lines = normalize_lines(text);

        let mut units = Vec::<String>::new();
        let mut buffer = String::new();
        let mut pending_rows = Vec::<String>::new();
        let mut index = 0usize;

        while index < lines.len() {
            let line = &lines[index];
            let kind = self.classify_line(line);

            if kind == LineKind::TableRow {
                pending_rows.push(line.clone());
                index += 1;
                continue;
            }

            // A run of table rows ends here; it must land in output before the
            // line that terminated it, and after any earlier open paragraph.
            if !pending_rows.is_empty() {
                flush_buffer(&mut buffer, &mut units);
                units.extend(flatten_table_rows(&pending_rows));
                pending_rows.clear();
            }

            match kind {
                LineKind::TableRow => {}
                LineKind::OptionLine => {
                    flush_buffer(&mut buffer, &mut units);
                    units.push(line.clone());
                }
                LineKind::StatementHeader => {
                    flush_buffer(&mut buffer, &mut units);
                    units.push(format!("{}:", line.trim_end_matches(['.', ':'])));
                }
                LineKind::RomanHeader => {
                    flush_buffer(&mut buffer, &mut units);
                    let numeral = format!("{}.", line.trim_end_matches(['.', ':']));
                    if let Some(next) = lines.get(index + 1) {
                        if self.classify_line(next) == LineKind::Plain {
                            // Lone marker glued back onto its wrapped content;
                            // buffering lets further wrapped lines join too.
                            buffer.push_str(&format!("{numeral} {next}"));
                            index += 2;
                            continue;
                        }
                    }
                    units.push(numeral);
                }
                LineKind::NumericHeader => {
                    flush_buffer(&mut buffer, &mut units);
                    if let Some(next) = lines.get(index + 1) {
                        if self.classify_line(next) == LineKind::Plain {
                            buffer.push_str(&format!("{line} {next}"));
                            index += 2;
                            continue;
                        }
                    }
                    units.push(line.clone());
                }
                LineKind::RomanItem | LineKind::NumericItem => {
                    flush_buffer(&mut buffer, &mut units);
                    units.push(line.clone());
                }
                LineKind::Plain => {
                    if buffer.is_empty() {
                        buffer.push_str(line);
                    } else if ends_with_terminal_punctuation(&buffer) {
                        units.push(std::mem::take(&mut buffer));
                        buffer.push_str(line);
                    } else {
                        buffer.push(' ');
                        buffer.push_str(line);
                    }
                }
            }

            index += 1;
        }

        flush_buffer(&mut buffer, &mut units);
        if !pending_rows.is_empty() {
            units.extend(flatten_table_rows(&pending_rows));
        }

        units.join("\n")
    }
}

pub(crate) fn flatten_table_rows(rows: &[String]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| {
            let cells = row
                .split('|')
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<&str>>();

            if cells.is_empty() {
                None
            } else {
                Some(cells.join(" | "))
            }
        })
        .collect()
}

fn ends_with_terminal_punctuation(buffer: &str) -> bool {
    buffer.ends_with(['.', '?', '!', ':'])
}

fn flush_buffer(buffer: &mut String, units: &mut Vec<String>) {
    if !buffer.is_empty() {
        units.push(std::mem::take(buffer));
    }
}
