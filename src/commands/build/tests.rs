use anyhow::Result;
use serde_json::json;

use super::beautify::{StatementLineBreaker, format_table_block};
use super::blocks::BlockDetector;
use super::classify::FormatClassifier;
use super::match_format::MatchFormatter;
use super::options::{OptionNormalizer, fix_ocr_prefix};
use super::reconstruct::{LineKind, TextReconstructor, flatten_table_rows, normalize_lines};
use super::sanitize::{SanitizeOutcome, sanitize_block_response};
use super::types::DraftQuestion;
use crate::llm::RepairService;
use crate::model::QuestionFormat;

struct FixedRepair(&'static str);

impl RepairService for FixedRepair {
    fn repair_json(&self, _malformed: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct FailingRepair;

impl RepairService for FailingRepair {
    fn repair_json(&self, _malformed: &str) -> Result<String> {
        anyhow::bail!("repair service unavailable")
    }
}

struct PanickingRepair;

impl RepairService for PanickingRepair {
    fn repair_json(&self, _malformed: &str) -> Result<String> {
        panic!("repair must not be called when the first parse succeeds");
    }
}

#[test]
fn normalize_lines_strips_noise_glyphs_and_blank_lines() {
    let raw = "  What is\u{00A0}the capital  \n\n\u{200B}\n• of France?\n   \n";
    let lines = normalize_lines(raw);

    assert_eq!(lines, vec!["What is the capital", "of France?"]);
}

#[test]
fn normalize_lines_returns_empty_for_empty_input() {
    assert!(normalize_lines("").is_empty());
    assert!(normalize_lines("\n  \n\u{200B}\n").is_empty());
}

#[test]
fn classify_line_recognizes_structural_kinds() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");

    assert_eq!(
        reconstructor.classify_line("Directorate | Enforcement"),
        LineKind::TableRow
    );
    assert_eq!(reconstructor.classify_line("a) Paris"), LineKind::OptionLine);
    assert_eq!(reconstructor.classify_line("(A. Paris"), LineKind::OptionLine);
    assert_eq!(
        reconstructor.classify_line("Statement II."),
        LineKind::StatementHeader
    );
    assert_eq!(reconstructor.classify_line("IV."), LineKind::RomanHeader);
    assert_eq!(
        reconstructor.classify_line("II. Chile Lithium"),
        LineKind::RomanItem
    );
    assert_eq!(reconstructor.classify_line("3."), LineKind::NumericHeader);
    assert_eq!(
        reconstructor.classify_line("3. Pyroclastic debris"),
        LineKind::NumericItem
    );
    assert_eq!(
        reconstructor.classify_line("The capital of France"),
        LineKind::Plain
    );
}

#[test]
fn reconstruct_merges_lone_numeric_header_with_wrapped_content() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "1.\nWhat is the capital\nof France?\na) Paris\nb) Lyon";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(
        reconstructed,
        "1. What is the capital of France?\na) Paris\nb) Lyon"
    );
}

#[test]
fn reconstruct_merges_lone_roman_header_with_following_line() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "I.\nBonds\nII.\nEquity shares";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(reconstructed, "I. Bonds\nII. Equity shares");
}

#[test]
fn reconstruct_keeps_bare_roman_header_before_another_marker() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "IX.\nX. Bonds";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(reconstructed, "IX.\nX. Bonds");
}

#[test]
fn reconstruct_respects_sentence_boundaries_when_joining() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "The empire declined rapidly.\nIts provinces broke\naway one by one.";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(
        reconstructed,
        "The empire declined rapidly.\nIts provinces broke away one by one."
    );
}

#[test]
fn reconstruct_normalizes_statement_headers() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "Statement I\nGrowth has slowed.\nStatement-II.\nInflation is rising.";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(
        reconstructed,
        "Statement I:\nGrowth has slowed.\nStatement-II:\nInflation is rising."
    );
}

#[test]
fn reconstruct_flushes_open_paragraph_before_option_lines() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "The capital of France\nis which of these\na) Paris\nb) Lyon";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(
        reconstructed,
        "The capital of France is which of these\na) Paris\nb) Lyon"
    );
}

#[test]
fn reconstruct_flattens_table_rows_in_place() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "Directorate|Enforcement |MHA\nDRI |Customs Act|MoF\nWhich row is correct?";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(
        reconstructed,
        "Directorate | Enforcement | MHA\nDRI | Customs Act | MoF\nWhich row is correct?"
    );
}

#[test]
fn reconstruct_flushes_buffer_before_trailing_table_rows() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "The table below lists agencies\nDirectorate | Enforcement\nDRI | Customs Act";

    let reconstructed = reconstructor.reconstruct(raw);

    assert_eq!(
        reconstructed,
        "The table below lists agencies\nDirectorate | Enforcement\nDRI | Customs Act"
    );
}

#[test]
fn reconstruct_is_idempotent_on_its_own_output() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let raw = "Consider the following\nstatements:\nStatement I\nGrowth has slowed.\nStatement II\nInflation is rising.\nDirectorate | Enforcement | MHA\nDRI | Customs Act | MoF\n1.\nPyroclastic debris\n2. Ash clouds\nI.\nBonds\nWhich of the following is\ncorrect?\na) Only one\nb) Only two";

    let once = reconstructor.reconstruct(raw);
    let twice = reconstructor.reconstruct(&once);

    assert_eq!(once, twice);
}

#[test]
fn flatten_table_rows_drops_empty_cells_and_rows() {
    let rows = vec![
        "Directorate | Enforcement | MHA".to_string(),
        "| |".to_string(),
        " DRI |Customs Act ".to_string(),
    ];

    let flattened = flatten_table_rows(&rows);

    assert_eq!(
        flattened,
        vec!["Directorate | Enforcement | MHA", "DRI | Customs Act"]
    );
}

#[test]
fn detect_returns_empty_list_for_empty_input() {
    let detector = BlockDetector::new().expect("patterns compile");

    assert!(detector.detect("").is_empty());
    assert!(detector.detect("\n\n").is_empty());
}

#[test]
fn detect_returns_single_block_when_no_question_start_present() {
    let detector = BlockDetector::new().expect("patterns compile");
    let text = "The Mughal empire declined.\nIts provinces broke away.\nTrade routes shifted.";

    let blocks = detector.detect(text);

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0], text);
}

#[test]
fn detect_splits_blocks_on_probable_question_starts() {
    let detector = BlockDetector::new().expect("patterns compile");
    let text = "With reference to the Indian economy, consider the statements below.\n1. Growth is rising.\n2. Inflation is falling.\na) 1 only\nb) 2 only\nWhich one of the following rivers flows through a rift valley in India?\nc) Narmada\nd) Ganga";

    let blocks = detector.detect(text);

    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].starts_with("With reference to the Indian economy"));
    assert!(blocks[0].contains("b) 2 only"));
    assert!(blocks[1].starts_with("Which one of the following rivers"));
    assert!(blocks[1].contains("d) Ganga"));
}

#[test]
fn detect_treats_lowercase_and_short_fragments_as_continuations() {
    let detector = BlockDetector::new().expect("patterns compile");
    let text = "Which of the following is the largest alternative investment\nfund category in India?\nSmall note\na) Category I\nb) Category II";

    let blocks = detector.detect(text);

    assert_eq!(blocks.len(), 1);
}

#[test]
fn detect_merges_question_start_into_undersized_block() {
    let detector = BlockDetector::new().expect("patterns compile");
    let text = "Stray mark\nWhich of the following is the capital of France today?";

    let blocks = detector.detect(text);

    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].starts_with("Stray mark"));
}

#[test]
fn classify_is_total_and_defaults_to_single() {
    let classifier = FormatClassifier::new().expect("patterns compile");

    assert_eq!(classifier.classify(""), QuestionFormat::Single);
    assert_eq!(
        classifier.classify("What is the capital of France?"),
        QuestionFormat::Single
    );
}

#[test]
fn classify_prefers_table_over_statement_when_delimiter_present() {
    let classifier = FormatClassifier::new().expect("patterns compile");
    let text = "Agency | Ministry\nI. Enforcement Directorate | MoF\nII. NIA | MHA\nWhich of the above rows is correct?";

    assert_eq!(classifier.classify(text), QuestionFormat::Table);
}

#[test]
fn classify_detects_column_gap_tables_without_delimiters() {
    let classifier = FormatClassifier::new().expect("patterns compile");
    let text = "Crop    Season    Region\nWheat    Rabi    Punjab\nWhich entry is wrong?";

    assert_eq!(classifier.classify(text), QuestionFormat::Table);
}

#[test]
fn classify_detects_match_blocks_before_statement_counting() {
    let classifier = FormatClassifier::new().expect("patterns compile");
    let text = "Consider the following pairs:\nI. Botswana : Diamond\nII. Chile : Lithium\nWhich of the pairs given above are correctly matched?";

    assert_eq!(classifier.classify(text), QuestionFormat::Match);
}

#[test]
fn classify_detects_match_from_intro_phrase() {
    let classifier = FormatClassifier::new().expect("patterns compile");

    assert_eq!(
        classifier.classify("Match the following lists and select the right code."),
        QuestionFormat::Match
    );
}

#[test]
fn classify_detects_statement_blocks_from_bullet_markers() {
    let classifier = FormatClassifier::new().expect("patterns compile");
    let text = "Consider the following statements:\n1. Growth has slowed.\n2. Inflation is rising.\nWhich of the statements given above is/are correct?";

    assert_eq!(classifier.classify(text), QuestionFormat::Statement);

    let roman = "Read these claims carefully\nI. Growth has slowed\nII. Inflation is rising\nSelect the right answer";
    assert_eq!(classifier.classify(roman), QuestionFormat::Statement);
}

#[test]
fn classify_detects_assertion_reason_blocks() {
    let classifier = FormatClassifier::new().expect("patterns compile");
    let text = "Assertion (A): The monsoon arrives in June.\nReason (R): The ITCZ shifts northwards.";

    assert_eq!(classifier.classify(text), QuestionFormat::Assertion);
}

#[test]
fn classify_detects_paragraph_blocks() {
    let classifier = FormatClassifier::new().expect("patterns compile");

    assert_eq!(
        classifier.classify("Read the following passage and answer the question."),
        QuestionFormat::Paragraph
    );
    assert_eq!(
        classifier.classify(
            "The first event happened. Then the second. Then a third. A fourth followed. Finally a fifth. What came next"
        ),
        QuestionFormat::Paragraph
    );
}

#[test]
fn format_table_block_normalizes_delimiter_spacing() {
    let text = "Directorate|Enforcement |MHA\nPlain line stays untouched";

    assert_eq!(
        format_table_block(text),
        "Directorate | Enforcement | MHA\nPlain line stays untouched"
    );
}

#[test]
fn statement_breaker_inserts_breaks_for_bullets() {
    let breaker = StatementLineBreaker::new().expect("patterns compile");
    let text = "Consider the following statements: 1. The first claim holds. 2. The second claim fails. Which of the above is correct?";

    let broken = breaker.break_statements(text);

    assert!(broken.contains("statements:\n1. The first claim holds."));
    assert!(broken.contains("\n2. The second claim fails."));
}

#[test]
fn statement_breaker_breaks_before_roman_bullets_but_not_statement_labels() {
    let breaker = StatementLineBreaker::new().expect("patterns compile");
    let text = "Consider the following statements: Statement I. Growth slowed. II. Inflation rose.";

    let broken = breaker.break_statements(text);

    assert!(broken.contains("Statement I. Growth slowed."));
    assert!(!broken.contains("\nI. Growth"));
    assert!(broken.contains("\nII. Inflation rose."));
}

#[test]
fn statement_breaker_never_splits_year_numbers() {
    let breaker = StatementLineBreaker::new().expect("patterns compile");
    let text = "Consider the following statements: 1. The revolt began in 1857. 2. It ended in 1858. Pick the right option";

    let broken = breaker.break_statements(text);

    assert!(broken.contains("in 1857."));
    assert!(!broken.contains("\n1857."));
    assert!(broken.contains("\n2. It ended in 1858."));
}

#[test]
fn statement_breaker_collapses_blank_line_runs() {
    let breaker = StatementLineBreaker::new().expect("patterns compile");
    let text = "First line\n\n\n\nSecond line";

    assert_eq!(breaker.break_statements(text), "First line\n\nSecond line");
}

#[test]
fn match_formatter_splits_header_pairs_and_question() {
    let formatter = MatchFormatter::new().expect("patterns compile");
    let text = "Consider the following Country Resource I. Botswana Diamond II. Chile Lithium III. Indonesia Gold In how many of the above rows is the mapping correct?";

    let formatted = formatter.format(text);
    let lines = formatted.lines().collect::<Vec<&str>>();

    assert_eq!(lines[0], "Consider the following Country Resource");
    assert_eq!(lines[1], "I. Botswana : Diamond");
    assert_eq!(lines[2], "II. Chile : Lithium");
    assert_eq!(lines[3], "III. Indonesia : Gold");
    assert!(lines[4].starts_with("In how many of the above"));
}

#[test]
fn match_formatter_splits_glued_pair_spans() {
    let formatter = MatchFormatter::new().expect("patterns compile");
    let text = "Consider the following pairs I. Botswana Diamond Chile Lithium Which of the above pairs is correct?";

    let formatted = formatter.format(text);

    assert!(formatted.contains("I. Botswana : Diamond"));
    assert!(formatted.contains("II. Chile : Lithium"));
    assert!(formatted.contains("Which of the above pairs is correct?"));
}

#[test]
fn match_formatter_keeps_existing_colon_pairs_intact() {
    let formatter = MatchFormatter::new().expect("patterns compile");
    let text = "Consider the following pairs I. Mallorca : Mediterranean Sea II. Normandy : English Channel Which of the above is right?";

    let formatted = formatter.format(text);

    assert!(formatted.contains("I. Mallorca : Mediterranean Sea"));
    assert!(formatted.contains("II. Normandy : English Channel"));
}

#[test]
fn match_formatter_strips_glued_option_tails() {
    let formatter = MatchFormatter::new().expect("patterns compile");
    let text = "Consider the pairs I. Botswana Diamond II. Chile Lithium Which of the above is right? (a) one only (b) both";

    let formatted = formatter.format(text);

    assert!(!formatted.contains("(a) one only"));
    assert!(!formatted.contains("(b) both"));
}

#[test]
fn match_formatter_passes_through_text_without_roman_markers() {
    let formatter = MatchFormatter::new().expect("patterns compile");
    let text = "Match the following lists and select the right code.";

    assert_eq!(formatter.format(text), text);
}

#[test]
fn option_normalizer_canonicalizes_keys_and_strips_value_labels() {
    let normalizer = OptionNormalizer::new().expect("patterns compile");
    let raw = json!({"a)": "(a) Delhi", "C.": "Mumbai"});

    let (options, dropped) = normalizer.normalize(raw.as_object().expect("object"));

    assert_eq!(dropped, 0);
    assert_eq!(options.len(), 2);
    assert_eq!(options["A"], "Delhi");
    assert_eq!(options["C"], "Mumbai");
    assert!(!options.contains_key("B"));
    assert!(!options.contains_key("D"));
    assert!(!options.contains_key("E"));
}

#[test]
fn option_normalizer_drops_keys_that_are_not_labels() {
    let normalizer = OptionNormalizer::new().expect("patterns compile");
    let raw = json!({"(d)": "d) All of the above", "note": "ignore me", "x1": "noise"});

    let (options, dropped) = normalizer.normalize(raw.as_object().expect("object"));

    assert_eq!(dropped, 2);
    assert_eq!(options.len(), 1);
    assert_eq!(options["D"], "All of the above");
}

#[test]
fn option_normalizer_preserves_values_that_merely_start_with_a_letter() {
    let normalizer = OptionNormalizer::new().expect("patterns compile");
    let raw = json!({"b)": "All of the above", "e.": "Either of these"});

    let (options, _) = normalizer.normalize(raw.as_object().expect("object"));

    assert_eq!(options["B"], "All of the above");
    assert_eq!(options["E"], "Either of these");
}

#[test]
fn fix_ocr_prefix_repairs_known_character_drops() {
    assert_eq!(
        fix_ocr_prefix("ll of the above"),
        ("All of the above".to_string(), true)
    );
    assert_eq!(
        fix_ocr_prefix("ll the above statements"),
        ("All the above statements".to_string(), true)
    );
    assert_eq!(
        fix_ocr_prefix("oth A and B"),
        ("Both A and B".to_string(), true)
    );
}

#[test]
fn fix_ocr_prefix_applies_at_most_one_fix_and_only_at_the_prefix() {
    assert_eq!(fix_ocr_prefix("ll ll "), ("All ll ".to_string(), true));
    assert_eq!(fix_ocr_prefix("Paris"), ("Paris".to_string(), false));
    assert_eq!(
        fix_ocr_prefix("Small oth words"),
        ("Small oth words".to_string(), false)
    );
}

#[test]
fn sanitize_extracts_json_object_from_noisy_wrapper() {
    let raw = "blah {\"question\":\"X\",\"options\":{}} trailing";

    match sanitize_block_response(raw, &PanickingRepair) {
        SanitizeOutcome::Parsed { value, repaired } => {
            assert!(!repaired);
            assert_eq!(value["question"], "X");
            assert!(value["options"].as_object().expect("object").is_empty());
        }
        SanitizeOutcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
    }
}

#[test]
fn sanitize_strips_control_characters_before_parsing() {
    let raw = "\u{0000}\u{0001}{\"question\":\"X\"}\u{0007}";

    match sanitize_block_response(raw, &PanickingRepair) {
        SanitizeOutcome::Parsed { value, .. } => assert_eq!(value["question"], "X"),
        SanitizeOutcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
    }
}

#[test]
fn sanitize_uses_one_repair_round_trip_on_parse_failure() {
    let raw = "{\"question\": \"X\",}";
    let repair = FixedRepair("{\"question\": \"X\"}");

    match sanitize_block_response(raw, &repair) {
        SanitizeOutcome::Parsed { value, repaired } => {
            assert!(repaired);
            assert_eq!(value["question"], "X");
        }
        SanitizeOutcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
    }
}

#[test]
fn sanitize_degrades_to_sentinel_when_repair_also_fails() {
    let raw = "still { not json at all";

    match sanitize_block_response(raw, &FixedRepair("also { not json")) {
        SanitizeOutcome::Parsed { .. } => panic!("parse should fail twice"),
        SanitizeOutcome::Failed {
            error,
            raw_text_excerpt,
        } => {
            assert!(!error.is_empty());
            assert!(raw_text_excerpt.starts_with("still {"));
        }
    }
}

#[test]
fn sanitize_degrades_to_sentinel_when_repair_call_errors() {
    let raw = "no json here";

    match sanitize_block_response(raw, &FailingRepair) {
        SanitizeOutcome::Parsed { .. } => panic!("parse should fail"),
        SanitizeOutcome::Failed { error, .. } => {
            assert!(error.contains("repair call failed"));
        }
    }
}

#[test]
fn sanitize_excerpt_is_bounded_to_two_hundred_characters() {
    let raw = "x".repeat(500);

    match sanitize_block_response(&raw, &FailingRepair) {
        SanitizeOutcome::Parsed { .. } => panic!("parse should fail"),
        SanitizeOutcome::Failed {
            raw_text_excerpt, ..
        } => assert_eq!(raw_text_excerpt.chars().count(), 200),
    }
}

#[test]
fn draft_question_tolerates_missing_and_extra_fields() {
    let value = json!({
        "question": "  What is X?  ",
        "options": {"a)": "one"},
        "format": "table",
        "keywords": ["economy", 7, "growth"],
        "is_multi_correct": true,
        "unexpected": {"nested": true}
    });

    let draft = DraftQuestion::from_value(&value);

    assert_eq!(draft.question, "What is X?");
    assert_eq!(draft.options.len(), 1);
    assert_eq!(draft.keywords, vec!["economy", "growth"]);
    assert!(draft.is_multi_correct);
    assert!(draft.subject.is_none());
    assert!(draft.correct_answer.is_none());
}

#[test]
fn draft_question_uses_first_object_of_array_responses() {
    let value = json!([{"question": "From array"}, {"question": "ignored"}]);

    let draft = DraftQuestion::from_value(&value);

    assert_eq!(draft.question, "From array");
}

#[test]
fn raw_lines_flow_through_reconstruction_detection_and_classification() {
    let reconstructor = TextReconstructor::new().expect("patterns compile");
    let detector = BlockDetector::new().expect("patterns compile");
    let classifier = FormatClassifier::new().expect("patterns compile");

    let raw = "1.\nWhat is the capital\nof France?\na) Paris\nb) Lyon";
    let reconstructed = reconstructor.reconstruct(raw);
    let blocks = detector.detect(&reconstructed);

    assert_eq!(blocks.len(), 1);
    assert_eq!(
        blocks[0],
        "1. What is the capital of France?\na) Paris\nb) Lyon"
    );
    assert_eq!(classifier.classify(&blocks[0]), QuestionFormat::Single);
}
