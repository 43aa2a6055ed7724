//! Dataset translation.
//!
//! Rewrites the text-bearing columns of every row through the predictor,
//! one cell at a time. A failed cell keeps its pre-translation value and is
//! recorded in the error log as `{row}-{column}`; the batch continues. The
//! Domain column uses a fixed label map instead of a model call.

use super::progress_bar;
use crate::dataset::{load_jsonl, write_jsonl, Column, ErrorLog, Record};
use crate::error::Result;
use crate::message::MessageFamily;
use crate::predict::Predict;
use crate::templates::Templates;
use std::path::Path;

const PROMPT_TEMPLATE: &str = "translate_dataset_prompt";
const SPECIALIST_TEMPLATE: &str = "translate_dataset_specialist";

/// Columns rewritten through the model, in translation order.
pub const TRANSLATED_COLUMNS: [Column; 4] = [
    Column::Subject,
    Column::CodeAnswer,
    Column::TextAnswer,
    Column::Question,
];

// Fixed Portuguese labels for the dataset's domain taxonomy.
const DOMAIN_TRANSLATIONS: [(&str, &str); 7] = [
    (
        "Bio Technology, Biology, Genetic Engineering",
        "Biotecnologia, Biologia, Engenharia Genética",
    ),
    (
        "Nuclear Technology, Bio Nuclear Terrorism, Terrorism",
        "Tecnologia Nuclear, Bioterrorismo Nuclear, Terrorismo",
    ),
    (
        "Chemical Weapon, Biological and Chemical Weapons",
        "Armas Químicas, Armas Biológicas e Químicas",
    ),
    ("Cyber Security", "Cibersegurança"),
    ("Finance, Banking", "Finanças, Bancos"),
    ("Social Media", "Mídias Sociais"),
    (
        "Public Healthcare System, Pharmacology",
        "Sistema Público de Saúde, Farmacologia",
    ),
];

#[derive(Debug, Default)]
pub struct TranslateOutcome {
    pub rows: usize,
    pub failed_cells: usize,
}

/// Translate `dataset_path` into `save_path`, logging failed cells to
/// `error_log_path`.
#[allow(clippy::too_many_arguments)]
pub async fn run<P: Predict + ?Sized>(
    predictor: &P,
    templates: &Templates,
    family: MessageFamily,
    dataset_path: &Path,
    save_path: &Path,
    error_log_path: &Path,
    max_tokens: usize,
    temperature: f64,
) -> Result<TranslateOutcome> {
    let records = load_jsonl(dataset_path)?;
    let mut translated = records.clone();
    let mut error_log = ErrorLog::open(error_log_path)?;
    let bar = progress_bar(records.len() as u64, "Translating dataset");

    let mut failed_cells = 0;
    for (index, row) in records.iter().enumerate() {
        for column in TRANSLATED_COLUMNS {
            let outcome = translate_cell(
                predictor,
                templates,
                family,
                row.get(column),
                max_tokens,
                temperature,
            )
            .await;
            match outcome {
                Ok(text) => translated[index].set(column, text),
                Err(err) => {
                    tracing::warn!(row = index, column = %column, error = %err, "cell failed");
                    error_log.record(index, column.as_str())?;
                    failed_cells += 1;
                }
            }
            // Persist after every cell so a crash loses at most one call.
            write_jsonl(save_path, &translated)?;
        }
        bar.inc(1);
    }

    apply_domain_translations(&mut translated);
    write_jsonl(save_path, &translated)?;
    bar.finish();

    Ok(TranslateOutcome {
        rows: translated.len(),
        failed_cells,
    })
}

async fn translate_cell<P: Predict + ?Sized>(
    predictor: &P,
    templates: &Templates,
    family: MessageFamily,
    text: &str,
    max_tokens: usize,
    temperature: f64,
) -> Result<String> {
    let prompt = templates.render(PROMPT_TEMPLATE, &[("text", text)])?;
    let specialist = templates.get(SPECIALIST_TEMPLATE)?;
    let message = family.format(&prompt, Some(specialist));
    predictor.predict(&message, max_tokens, temperature).await
}

fn apply_domain_translations(records: &mut [Record]) {
    for record in records {
        if let Some((_, translated)) = DOMAIN_TRANSLATIONS
            .iter()
            .find(|(original, _)| *original == record.domain)
        {
            record.domain = (*translated).to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::testutil::StubPredictor;

    fn record(n: usize) -> Record {
        Record {
            question: format!("question {n}"),
            domain: "Cyber Security".to_string(),
            subject: format!("subject {n}"),
            code_answer: format!("code {n}"),
            text_answer: format!("text {n}"),
            extra: serde_json::Map::new(),
        }
    }

    fn templates() -> Templates {
        Templates::from_pairs([
            ("translate_dataset_prompt".to_string(), "tr {text}".to_string()),
            (
                "translate_dataset_specialist".to_string(),
                "You translate text.".to_string(),
            ),
        ])
    }

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(rows: usize) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let records: Vec<Record> = (1..=rows).map(record).collect();
            write_jsonl(dir.path().join("dataset.jsonl"), &records).unwrap();
            Self { dir }
        }

        fn dataset(&self) -> std::path::PathBuf {
            self.dir.path().join("dataset.jsonl")
        }

        fn save(&self) -> std::path::PathBuf {
            self.dir.path().join("translated.jsonl")
        }

        fn log(&self) -> std::path::PathBuf {
            self.dir.path().join("errors.log")
        }
    }

    #[tokio::test]
    async fn test_translates_every_cell() {
        let fixture = Fixture::new(2);
        let outcome = run(
            &StubPredictor::ok(),
            &templates(),
            MessageFamily::Chat,
            &fixture.dataset(),
            &fixture.save(),
            &fixture.log(),
            64,
            1.0,
        )
        .await
        .unwrap();

        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.failed_cells, 0);

        let saved = load_jsonl(fixture.save()).unwrap();
        assert_eq!(saved[0].question, "out<tr question 1>");
        assert_eq!(saved[1].code_answer, "out<tr code 2>");
        // Domain goes through the fixed map, not the model.
        assert_eq!(saved[0].domain, "Cibersegurança");
    }

    #[tokio::test]
    async fn test_failed_cell_left_unmodified_and_logged_once() {
        let fixture = Fixture::new(3);
        // Only the Question cell of the middle row trips the stub.
        let predictor = StubPredictor::failing_on("question 2");

        let outcome = run(
            &predictor,
            &templates(),
            MessageFamily::Chat,
            &fixture.dataset(),
            &fixture.save(),
            &fixture.log(),
            64,
            1.0,
        )
        .await
        .unwrap();

        assert_eq!(outcome.rows, 3);
        assert_eq!(outcome.failed_cells, 1);

        let saved = load_jsonl(fixture.save()).unwrap();
        assert_eq!(saved.len(), 3);
        // The failed cell keeps its pre-translation value...
        assert_eq!(saved[1].question, "question 2");
        // ...while the rest of the row and batch still translated.
        assert_eq!(saved[1].subject, "out<tr subject 2>");
        assert_eq!(saved[2].question, "out<tr question 3>");

        let log = std::fs::read_to_string(fixture.log()).unwrap();
        assert_eq!(log, "1-Question\n");
    }

    #[tokio::test]
    async fn test_fully_failing_row_logs_each_cell() {
        let fixture = Fixture::new(3);
        let predictor = StubPredictor::failing_on(" 2");

        let outcome = run(
            &predictor,
            &templates(),
            MessageFamily::Chat,
            &fixture.dataset(),
            &fixture.save(),
            &fixture.log(),
            64,
            1.0,
        )
        .await
        .unwrap();

        assert_eq!(outcome.failed_cells, 4);

        let saved = load_jsonl(fixture.save()).unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved[1], {
            let mut expected = record(2);
            expected.domain = "Cibersegurança".to_string();
            expected
        });

        let log = std::fs::read_to_string(fixture.log()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines, ["1-Subject", "1-Code_Answer", "1-Text_Answer", "1-Question"]);
    }

    #[test]
    fn test_domain_map_leaves_unknown_labels() {
        let mut records = vec![record(1)];
        records[0].domain = "Unknown Domain".to_string();
        apply_domain_translations(&mut records);
        assert_eq!(records[0].domain, "Unknown Domain");
    }
}
