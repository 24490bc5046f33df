//! SQuAD evaluation CLI

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use squad_eval::{
    analysis::{evaluate_file, AccuracySummary},
    batch::{read_jsonl, write_jsonl, BatchResultLine, BatchRun},
    config::Config,
    dataset::{extract_questions, load_dataset, Extraction, QuestionRecord},
    grading::{pair_with_questions, run_grading},
    providers::{create_openai, create_provider},
    reporting::{print_accuracy_report, print_grading_report, JsonSummary},
    runner::{answers_from_batch, run_batch_answers, AnswerPrompt, AnswerRecord, SerialAnswerer},
};

/// Where the answers being graded came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum AnswerSource {
    /// Batch API output file, correlated by custom_id
    Batch,
    /// Serial JSONL file, one record per line in question order
    Serial,
}

#[derive(Parser)]
#[command(name = "squad-eval")]
#[command(about = "Question-answering evaluation pipeline for SQuAD style datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Dataset selection shared by every stage that extracts questions
#[derive(clap::Args, Debug, Clone)]
struct DatasetArgs {
    /// SQuAD dataset file (default: from config)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Number of answerable questions to extract (default: from config)
    #[arg(short, long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract answerable questions from the dataset
    Extract {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Write questions as JSONL instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate answers through the Batch API
    AnswerBatch {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Model to answer with (default: from config)
        #[arg(short, long)]
        model: Option<String>,

        /// Batch request file to write
        #[arg(long)]
        input: Option<PathBuf>,

        /// Batch output file to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate answers with one chat call per question
    AnswerSerial {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Chat provider to use
        #[arg(short, long, default_value = "azure")]
        provider: String,

        /// JSONL file answers are appended to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Grade generated answers against reference answers
    Grade {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Format of the answers file
        #[arg(long, value_enum, default_value = "batch")]
        answers_format: AnswerSource,

        /// Answers file (default: the configured output for the format)
        #[arg(short, long)]
        answers: Option<PathBuf>,

        /// Grading model (default: from config)
        #[arg(short, long)]
        model: Option<String>,

        /// Grading request file to write
        #[arg(long)]
        input: Option<PathBuf>,

        /// Grading output file to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute accuracy for one or more graded files
    Accuracy {
        /// Graded batch output files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also write a JSON summary to this path
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/squad-eval.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("squad_eval=debug,info")
    } else {
        EnvFilter::new("squad_eval=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    if let Commands::InitConfig { output } = &cli.command {
        return init_config(output);
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { dataset, output } => {
            extract(&config, &dataset, output)?;
        }

        Commands::AnswerBatch {
            dataset,
            model,
            input,
            output,
        } => {
            answer_batch(&config, &dataset, model, input, output).await?;
        }

        Commands::AnswerSerial {
            dataset,
            provider,
            output,
        } => {
            answer_serial(&config, &dataset, &provider, output).await?;
        }

        Commands::Grade {
            dataset,
            answers_format,
            answers,
            model,
            input,
            output,
        } => {
            grade(&config, &dataset, answers_format, answers, model, input, output).await?;
        }

        Commands::Accuracy { files, summary } => {
            accuracy(&files, summary)?;
        }

        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Load the dataset and run the shared extraction
fn load_questions(
    config: &Config,
    args: &DatasetArgs,
) -> Result<Vec<QuestionRecord>, Box<dyn std::error::Error>> {
    let path = args
        .dataset
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.dataset.path));
    let limit = args.limit.unwrap_or(config.dataset.question_limit);

    let dataset = load_dataset(&path)?;
    let questions = extract_questions(&dataset, limit, Extraction::QuestionsOnly);
    tracing::info!("Extracted {} questions from {}", questions.len(), path.display());
    Ok(questions)
}

fn extract(
    config: &Config,
    args: &DatasetArgs,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions = load_questions(config, args)?;

    match output {
        Some(path) => {
            write_jsonl(&path, &questions)?;
            println!("{} questions written to: {}", questions.len(), path.display());
        }
        None => {
            for q in &questions {
                println!("{}. {}", q.index + 1, q.question);
            }
        }
    }
    Ok(())
}

fn batch_run(config: &Config, input: PathBuf, output: PathBuf) -> BatchRun {
    BatchRun::new(input, output)
        .with_completion_window(&config.batch.completion_window)
        .with_poll_policy(config.batch.poll_policy())
}

async fn answer_batch(
    config: &Config,
    args: &DatasetArgs,
    model: Option<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions = load_questions(config, args)?;
    if questions.is_empty() {
        eprintln!("Error: No questions to answer");
        std::process::exit(1);
    }

    let client = create_openai(config)?;
    let model = model.unwrap_or_else(|| config.answers.batch_model.clone());
    let run = batch_run(
        config,
        input.unwrap_or_else(|| PathBuf::from(&config.answers.batch_input_file)),
        output.unwrap_or_else(|| PathBuf::from(&config.answers.batch_output_file)),
    );

    println!("=== Batch Answers ===");
    println!("Model:     {}", model);
    println!("Questions: {}", questions.len());
    println!();

    let prompt = AnswerPrompt::from_config(&config.answers);
    let answers = run_batch_answers(
        &client,
        &questions,
        &prompt,
        &model,
        config.answers.temperature,
        &run,
    )
    .await?;

    for answer in &answers {
        println!("Question: {}", answer.question.question);
        match answer.content() {
            Some(content) => println!("Response: {}\n", content),
            None => println!("Response: <missing>\n"),
        }
    }

    println!("Batch output written to: {}", run.output_path.display());
    Ok(())
}

async fn answer_serial(
    config: &Config,
    args: &DatasetArgs,
    provider_name: &str,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions = load_questions(config, args)?;
    let provider = create_provider(provider_name, config)?;
    let output = output.unwrap_or_else(|| PathBuf::from(&config.answers.serial_output_file));

    println!("=== Serial Answers ===");
    println!("Provider:  {} ({})", provider.name(), provider.default_model());
    println!("Questions: {}", questions.len());
    println!("Output:    {}", output.display());
    println!();

    let mut answerer = SerialAnswerer::new(provider, config.answers.system_prompt.clone());
    if let Some(limit) = config.answers.max_tokens {
        answerer = answerer.with_max_tokens(limit);
    }
    let summary = answerer.run(&questions, &output).await?;

    if let Some(last) = &summary.last {
        println!("\nLast response: {}", last.response);
    }
    println!("Input tokens:  {}", summary.input_tokens);
    println!("Output tokens: {}", summary.output_tokens);

    if let Some(pc) = config.get_provider(provider_name) {
        println!(
            "Estimated cost: ${:.4}",
            summary.cost(pc.input_cost_per_1k, pc.output_cost_per_1k)
        );
    }
    Ok(())
}

/// Read answers in extraction order from either answer file format
fn read_answers(
    questions: &[QuestionRecord],
    format: AnswerSource,
    path: &Path,
) -> Result<Vec<AnswerRecord>, Box<dyn std::error::Error>> {
    let answers = match format {
        AnswerSource::Batch => {
            let lines: Vec<BatchResultLine> = read_jsonl(path)?;
            answers_from_batch(questions, lines)
                .iter()
                .map(AnswerRecord::from)
                .collect()
        }
        AnswerSource::Serial => read_jsonl(path)?,
    };
    Ok(answers)
}

async fn grade(
    config: &Config,
    args: &DatasetArgs,
    format: AnswerSource,
    answers_path: Option<PathBuf>,
    model: Option<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions = load_questions(config, args)?;
    let answers_path = answers_path.unwrap_or_else(|| match format {
        AnswerSource::Batch => PathBuf::from(&config.answers.batch_output_file),
        AnswerSource::Serial => PathBuf::from(&config.answers.serial_output_file),
    });

    let answers = read_answers(&questions, format, &answers_path)?;
    let pairs = pair_with_questions(&questions, &answers)?;
    if pairs.is_empty() {
        eprintln!("Error: No answers to grade");
        std::process::exit(1);
    }

    let client = create_openai(config)?;
    let model = model.unwrap_or_else(|| config.grading.model.clone());
    let run = batch_run(
        config,
        input.unwrap_or_else(|| PathBuf::from(&config.grading.input_file)),
        output.unwrap_or_else(|| PathBuf::from(&config.grading.output_file)),
    );

    println!("=== Grading ===");
    println!("Model:   {}", model);
    println!("Answers: {} ({} pairs)", answers_path.display(), pairs.len());

    let report = run_grading(&client, &pairs, &model, config.grading.temperature, &run).await?;
    print_grading_report(&report, &run.output_path);
    Ok(())
}

fn accuracy(files: &[PathBuf], summary_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let summaries = files
        .iter()
        .map(evaluate_file)
        .collect::<Result<Vec<AccuracySummary>, _>>()?;

    print_accuracy_report(&summaries);

    if let Some(path) = summary_path {
        let run_id = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
        JsonSummary::from_summaries(run_id, &summaries).write_to_file(&path)?;
        println!("JSON summary written to: {}", path.display());
    }
    Ok(())
}

fn init_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
