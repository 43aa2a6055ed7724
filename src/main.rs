//! hazbench CLI
//!
//! Commands:
//!   translate   - Translate the dataset's text columns through a model
//!   zero-shot   - Answer every question, then score each answer
//!   few-shot    - Same, with similar prior questions retrieved as context
//!   build-index - Embed the dataset's questions into the vector index
//!   predict     - Run a single prediction and print it

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use hazbench::experiment::{self, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use hazbench::{
    load_jsonl, Backend, ClientOptions, Device, Embedder, EmbeddingRetriever, Error, Evaluator,
    MessageFamily, PredictionManager, RagIndex, Templates,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hazbench")]
#[command(about = "Evaluate LLM responses to a question dataset across hosted and local backends")]
#[command(version)]
struct Cli {
    /// Message template document
    #[arg(short, long, default_value = "configs/messages.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BackendArgs {
    /// Backend: openai, maritaca, gemini, candle, gguf
    #[arg(long, default_value = "openai")]
    backend: String,

    /// Model name: hosted model id, Hugging Face repo id, or GGUF file path
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Message family: chat, plain, llama
    #[arg(long, default_value = "chat")]
    family: String,

    /// API key for hosted backends; defaults to the backend's environment
    /// variable (OPENAI_API_KEY, MARITACA_AI_API_KEY, GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Device for local backends: cpu or gpu
    #[arg(long, default_value = "gpu")]
    device: String,

    /// Maximum tokens to generate per call
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: usize,

    /// Sampling temperature
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f64,
}

impl BackendArgs {
    fn family(&self) -> Result<MessageFamily, Error> {
        self.family.parse()
    }

    async fn build_manager(&self) -> Result<PredictionManager, Error> {
        let backend: Backend = self.backend.parse()?;
        let device: Device = self.device.parse()?;
        let api_key = resolve_api_key(backend, self.api_key.clone());
        PredictionManager::new(backend, &self.model, ClientOptions { api_key, device }).await
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Translate the dataset's text columns through a model
    Translate {
        #[command(flatten)]
        backend: BackendArgs,

        /// Input dataset (JSONL)
        #[arg(long)]
        dataset: PathBuf,

        /// Output dataset (JSONL), rewritten after every cell
        #[arg(long)]
        save: PathBuf,

        /// Append-only log of failed cells
        #[arg(long, default_value = "errors_log_translation.txt")]
        error_log: PathBuf,
    },

    /// Answer every question zero-shot, then score each answer
    ZeroShot {
        #[command(flatten)]
        backend: BackendArgs,

        #[arg(long)]
        dataset: PathBuf,

        #[arg(long)]
        save: PathBuf,

        /// Template name for the question prompt
        #[arg(long)]
        prompt_template: String,

        /// Template name for the specialist persona
        #[arg(long)]
        specialist_template: String,

        /// API key for the evaluation model (defaults to OPENAI_API_KEY)
        #[arg(long)]
        eval_api_key: Option<String>,
    },

    /// Answer with retrieved similar questions as few-shot context
    FewShot {
        #[command(flatten)]
        backend: BackendArgs,

        #[arg(long)]
        dataset: PathBuf,

        #[arg(long)]
        save: PathBuf,

        /// Vector index built with build-index
        #[arg(long)]
        index: PathBuf,

        /// Similar questions to retrieve per row
        #[arg(long, default_value_t = 5)]
        k: usize,

        /// API key for the evaluation model (defaults to OPENAI_API_KEY)
        #[arg(long)]
        eval_api_key: Option<String>,
    },

    /// Embed the dataset's questions into the vector index
    BuildIndex {
        #[arg(long)]
        dataset: PathBuf,

        #[arg(long)]
        index: PathBuf,
    },

    /// Run a single prediction and print the result
    Predict {
        #[command(flatten)]
        backend: BackendArgs,

        /// User prompt
        #[arg(long)]
        prompt: String,

        /// Optional specialist persona
        #[arg(long)]
        specialist: Option<String>,
    },
}

/// Explicit flag wins; otherwise the backend's environment variable.
fn resolve_api_key(backend: Backend, flag: Option<String>) -> Option<String> {
    flag.or_else(|| {
        let var = match backend {
            Backend::OpenAi => "OPENAI_API_KEY",
            Backend::Maritaca => "MARITACA_AI_API_KEY",
            Backend::Gemini => "GEMINI_API_KEY",
            Backend::Candle | Backend::Gguf => return None,
        };
        std::env::var(var).ok()
    })
}

fn resolve_eval_api_key(flag: Option<String>) -> Result<String, Error> {
    flag.or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or(Error::MissingApiKey { backend: "openai" })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Translate {
            backend,
            dataset,
            save,
            error_log,
        } => {
            let templates = Templates::load(&cli.config)?;
            let family = backend.family()?;
            let manager = backend.build_manager().await?;

            let outcome = experiment::translate::run(
                &manager,
                &templates,
                family,
                &dataset,
                &save,
                &error_log,
                backend.max_tokens,
                backend.temperature,
            )
            .await?;

            println!(
                "{} translated {} rows ({} failed cells) -> {}",
                "✓".green(),
                outcome.rows,
                outcome.failed_cells,
                save.display()
            );
        }

        Commands::ZeroShot {
            backend,
            dataset,
            save,
            prompt_template,
            specialist_template,
            eval_api_key,
        } => {
            let templates = Templates::load(&cli.config)?;
            let family = backend.family()?;
            let manager = backend.build_manager().await?;
            let evaluator =
                Evaluator::new(templates.clone(), resolve_eval_api_key(eval_api_key)?).await?;

            let rows = experiment::zero_shot::run(
                &manager,
                &evaluator,
                &templates,
                family,
                &prompt_template,
                &specialist_template,
                &dataset,
                &save,
                backend.max_tokens,
                backend.temperature,
            )
            .await?;

            println!("{} scored {} rows -> {}", "✓".green(), rows, save.display());
        }

        Commands::FewShot {
            backend,
            dataset,
            save,
            index,
            k,
            eval_api_key,
        } => {
            let templates = Templates::load(&cli.config)?;
            let family = backend.family()?;
            let manager = backend.build_manager().await?;
            let evaluator =
                Evaluator::new(templates.clone(), resolve_eval_api_key(eval_api_key)?).await?;
            let retriever = EmbeddingRetriever::new(RagIndex::load(&index)?, Embedder::new()?);

            let rows = experiment::few_shot::run(
                &manager,
                &evaluator,
                &templates,
                family,
                &retriever,
                k,
                &dataset,
                &save,
                backend.max_tokens,
                backend.temperature,
            )
            .await?;

            println!("{} scored {} rows -> {}", "✓".green(), rows, save.display());
        }

        Commands::BuildIndex { dataset, index } => {
            let records = load_jsonl(&dataset)?;
            let embedder = Embedder::new()?;
            let built = RagIndex::build(&records, &embedder)?;
            built.save(&index)?;

            println!(
                "{} indexed {} questions -> {}",
                "✓".green(),
                built.len(),
                index.display()
            );
        }

        Commands::Predict {
            backend,
            prompt,
            specialist,
        } => {
            let family = backend.family()?;
            let manager = backend.build_manager().await?;

            let message = family.format(&prompt, specialist.as_deref());
            let result = manager
                .predict(&message, backend.max_tokens, backend.temperature)
                .await?;

            println!("{result}");
        }
    }

    Ok(())
}
