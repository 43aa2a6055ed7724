//! Few-shot evaluation run.
//!
//! Like zero-shot, but each row first retrieves the k most similar prior
//! questions from the vector index and renders them into the prompt's
//! `{questions_answers}` block.

use super::progress_bar;
use crate::dataset::{load_jsonl, write_jsonl, ScoredRecord};
use crate::error::Result;
use crate::evaluate::Evaluator;
use crate::message::MessageFamily;
use crate::predict::Predict;
use crate::rag::{Retrieve, SimilarExample};
use crate::templates::Templates;
use std::fmt::Write;
use std::path::Path;

const PROMPT_TEMPLATE: &str = "few_shot_prompt";
const SPECIALIST_TEMPLATE: &str = "few_shot_specialist";

#[allow(clippy::too_many_arguments)]
pub async fn run<P: Predict + ?Sized, E: Predict, R: Retrieve>(
    predictor: &P,
    evaluator: &Evaluator<E>,
    templates: &Templates,
    family: MessageFamily,
    retriever: &R,
    k: usize,
    dataset_path: &Path,
    save_path: &Path,
    max_tokens: usize,
    temperature: f64,
) -> Result<usize> {
    let records = load_jsonl(dataset_path)?;
    let bar = progress_bar(records.len() as u64, "Few shot");

    let mut scored: Vec<ScoredRecord> = Vec::with_capacity(records.len());
    for row in records {
        let examples = retriever.retrieve(&row.question, k)?;
        let questions_answers = format_examples(&examples);

        let prompt = templates.render(
            PROMPT_TEMPLATE,
            &[
                ("questions_answers", &questions_answers),
                ("question", &row.question),
            ],
        )?;
        let specialist = templates.render(
            SPECIALIST_TEMPLATE,
            &[("domain", &row.domain), ("subject", &row.subject)],
        )?;
        let message = family.format(&prompt, Some(&specialist));

        let results = predictor.predict(&message, max_tokens, temperature).await?;
        let evaluation = evaluator.evaluate(&results).await?;

        scored.push(ScoredRecord {
            record: row,
            results,
            evaluation,
        });
        write_jsonl(save_path, &scored)?;
        bar.inc(1);
    }

    bar.finish();
    Ok(scored.len())
}

/// Render retrieved examples as a numbered question/answer block.
pub fn format_examples(examples: &[SimilarExample]) -> String {
    let mut text = String::new();
    for (number, example) in examples.iter().enumerate() {
        let _ = writeln!(text, "Example {}:", number + 1);
        let _ = writeln!(text, "Question: {}", example.question);
        let _ = writeln!(text, "Code answer: {}", example.code_answer);
        let _ = writeln!(text, "Text answer: {}", example.text_answer);
        text.push('\n');
    }
    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use crate::experiment::testutil::StubPredictor;

    struct StubRetriever;

    impl Retrieve for StubRetriever {
        fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SimilarExample>> {
            Ok((0..k)
                .map(|n| SimilarExample {
                    question: format!("like {query} #{n}"),
                    code_answer: format!("code #{n}"),
                    text_answer: format!("text #{n}"),
                    score: 1.0 - n as f32 * 0.1,
                })
                .collect())
        }
    }

    fn record() -> Record {
        Record {
            question: "q1".to_string(),
            domain: "Social Media".to_string(),
            subject: "s1".to_string(),
            code_answer: String::new(),
            text_answer: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    fn templates() -> Templates {
        Templates::from_pairs([
            (
                "few_shot_prompt".to_string(),
                "Given:\n{questions_answers}\nAnswer: {question}".to_string(),
            ),
            (
                "few_shot_specialist".to_string(),
                "Expert in {domain} / {subject}.".to_string(),
            ),
            (
                "evaluate_response_prompt".to_string(),
                "judge {text}".to_string(),
            ),
            (
                "evaluate_response_specialist".to_string(),
                "You are a judge.".to_string(),
            ),
        ])
    }

    #[test]
    fn test_format_examples_numbers_entries() {
        let examples = vec![
            SimilarExample {
                question: "qa".to_string(),
                code_answer: "ca".to_string(),
                text_answer: "ta".to_string(),
                score: 0.9,
            },
            SimilarExample {
                question: "qb".to_string(),
                code_answer: "cb".to_string(),
                text_answer: "tb".to_string(),
                score: 0.8,
            },
        ];
        let text = format_examples(&examples);
        assert!(text.starts_with("Example 1:\nQuestion: qa\n"));
        assert!(text.contains("Example 2:\nQuestion: qb\n"));
        assert!(text.ends_with("Text answer: tb"));
    }

    #[test]
    fn test_format_examples_empty() {
        assert_eq!(format_examples(&[]), "");
    }

    #[tokio::test]
    async fn test_retrieved_examples_reach_the_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("dataset.jsonl");
        let save = dir.path().join("results.jsonl");
        write_jsonl(&dataset, &[record()]).unwrap();

        let evaluator = Evaluator::with_predictor(StubPredictor::ok(), templates());
        let rows = run(
            &StubPredictor::ok(),
            &evaluator,
            &templates(),
            MessageFamily::Chat,
            &StubRetriever,
            2,
            &dataset,
            &save,
            64,
            1.0,
        )
        .await
        .unwrap();
        assert_eq!(rows, 1);

        let scored: ScoredRecord =
            serde_json::from_str(std::fs::read_to_string(&save).unwrap().lines().next().unwrap())
                .unwrap();
        assert!(scored.results.contains("like q1 #0"));
        assert!(scored.results.contains("like q1 #1"));
        assert!(scored.results.contains("Answer: q1"));
    }
}
