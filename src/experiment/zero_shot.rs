//! Zero-shot evaluation run.
//!
//! Each question goes straight to the predictor with a caller-named prompt
//! and specialist template pair, and the generated result is scored by the
//! evaluator. Errors fail the run; output is persisted after every row.

use super::progress_bar;
use crate::dataset::{load_jsonl, write_jsonl, ScoredRecord};
use crate::error::Result;
use crate::evaluate::Evaluator;
use crate::message::MessageFamily;
use crate::predict::Predict;
use crate::templates::Templates;
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub async fn run<P: Predict + ?Sized, E: Predict>(
    predictor: &P,
    evaluator: &Evaluator<E>,
    templates: &Templates,
    family: MessageFamily,
    prompt_template: &str,
    specialist_template: &str,
    dataset_path: &Path,
    save_path: &Path,
    max_tokens: usize,
    temperature: f64,
) -> Result<usize> {
    let records = load_jsonl(dataset_path)?;
    let bar = progress_bar(records.len() as u64, "Zero shot");

    let mut scored: Vec<ScoredRecord> = Vec::with_capacity(records.len());
    for row in records {
        let prompt = templates.render(prompt_template, &[("question", &row.question)])?;
        let specialist = templates.render(
            specialist_template,
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
