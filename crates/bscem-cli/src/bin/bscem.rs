//! bscem - Run expectation-maximization to infer document preferences and
//! worker noise from crowd judgments.
//!
//! Usage:
//!   bscem <prefs> <qrel> <research_task> <topic>              # Single-layer model
//!   bscem <prefs> <qrel> <research_task> <topic> --pair       # Question x worker model
//!   bscem <prefs> <qrel> <research_task> <topic> --baseline   # Non-EM baselines
//!   bscem <prefs> <qrel> <research_task> <topic> -o json      # Final state as JSON

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use bscem_cli::{
    diagnostics_json, read_file, report_line, score_json, score_warning, Accuracy, Baselines,
    CliError, Judgments, PrefsTable, Qrel,
};
use bscem_core::engine::em::{EmConfig, EmDiagnostics, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
}

#[derive(Parser)]
#[command(name = "bscem")]
#[command(version)]
#[command(about = "Infer truth and channel noise for a binary symmetric channel by EM")]
struct Cli {
    /// A CSV file containing channel output
    #[arg(value_name = "PREFS")]
    prefs: PathBuf,

    /// The QREL containing gold standard assessments
    #[arg(value_name = "QREL")]
    qrel: PathBuf,

    /// The research task to assess
    research_task: String,

    /// The topic to assess
    topic: String,

    /// Use the majority vote and constant-response models
    #[arg(long)]
    baseline: bool,

    /// Use the question x worker channel pair model
    #[arg(long)]
    pair: bool,

    /// Use soft assignments during inference
    #[arg(long)]
    soft: bool,

    /// Place an empirical-Bayes Beta prior on noise rates, refit every round
    #[arg(long)]
    prior: bool,

    /// Maximum EM rounds (0 for no limit)
    #[arg(long, default_value_t = 0, value_name = "N")]
    max_rounds: usize,

    /// Stop once a round improves the score by at most this much
    #[arg(long, default_value_t = 1e-3, value_name = "T")]
    tolerance: f64,

    /// Seed for the random baseline
    #[arg(long, default_value_t = 0, value_name = "S")]
    seed: u64,

    /// Output format: summary or json
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    output: OutputFormat,
}

/// One callback report.
struct StageReport {
    round: usize,
    stage: Stage,
    score: f64,
    accuracy: Accuracy,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let summary = cli.output == OutputFormat::Summary;
    if summary {
        println!(
            "Training {} with baselines? {} with pair? {} with soft? {}",
            cli.topic, cli.baseline, cli.pair, cli.soft
        );
        println!("Loading {}", cli.prefs.display());
    }
    let table = PrefsTable::parse(&read_file(&cli.prefs)?)?;
    let found = Judgments::collect(&table, &cli.research_task, &cli.topic)?;

    if summary {
        println!("Loading {}", cli.qrel.display());
    }
    let qrel = Qrel::parse(&read_file(&cli.qrel)?, found.topic_id.as_deref())?;
    let (num_pos, num_neg) = found.polarity();
    if summary {
        println!("Found assessments for {} documents", qrel.len());
        println!("{} Pos {} Neg", num_pos, num_neg);
    }

    if cli.baseline {
        let mut rng = StdRng::seed_from_u64(cli.seed);
        let baselines = Baselines::evaluate(&found.majority(), &qrel, &mut rng);
        if summary {
            println!("Majority vote accuracy: {}", baselines.majority);
            println!("All-true vote accuracy: {}", baselines.all_true);
            println!("All-false vote accuracy: {}", baselines.all_false);
            println!("Random vote accuracy: {}", baselines.random);
        } else {
            print_json(&json!({
                "majority": accuracy_json(&baselines.majority),
                "all_true": accuracy_json(&baselines.all_true),
                "all_false": accuracy_json(&baselines.all_false),
                "random": accuracy_json(&baselines.random),
            }));
        }
        return Ok(());
    }

    let config = EmConfig::new(cli.max_rounds, cli.tolerance);
    let mut reports = Vec::new();
    let mut observe = |round: usize, stage: Stage, score: f64, inputs: BTreeMap<String, bool>| {
        let accuracy = Accuracy::of_inputs(&qrel, &inputs);
        if summary {
            println!("{}", report_line(round, stage.as_str(), score, &accuracy));
        }
        reports.push(StageReport {
            round,
            stage,
            score,
            accuracy,
        });
    };

    if summary {
        println!("Building model...");
    }
    if cli.pair {
        let mut model = found.pair_model(cli.soft, cli.prior)?;
        let diagnostics = model.em(&config, |m, round, stage| {
            observe(round, stage, m.score(), m.inputs())
        })?;
        warn_on_score(&diagnostics);
        if !summary {
            print_json(&json!({
                "noise1_rates": model.noise1_rates(),
                "noise2_rates": model.noise2_rates(),
                "input_scores": model.input_scores(),
                "accuracy": accuracy_json(&Accuracy::of_inputs(&qrel, &model.inputs())),
                "stages": stages_json(&reports),
                "diagnostics": diagnostics_value(&diagnostics),
            }));
        }
    } else {
        let mut model = found.single_model(cli.soft, cli.prior)?;
        let diagnostics = model.em(&config, |m, round, stage| {
            observe(round, stage, m.score(), m.inputs())
        })?;
        warn_on_score(&diagnostics);
        if !summary {
            print_json(&json!({
                "noise_rates": model.noise_rates(),
                "input_scores": model.input_scores(),
                "accuracy": accuracy_json(&Accuracy::of_inputs(&qrel, &model.inputs())),
                "stages": stages_json(&reports),
                "diagnostics": diagnostics_value(&diagnostics),
            }));
        }
    }
    Ok(())
}

fn accuracy_json(acc: &Accuracy) -> serde_json::Value {
    json!({
        "correct": acc.correct,
        "total": acc.total,
        "rate": acc.rate(),
    })
}

fn stages_json(reports: &[StageReport]) -> serde_json::Value {
    reports
        .iter()
        .map(|r| {
            json!({
                "round": r.round,
                "stage": r.stage.as_str(),
                "score": score_json(r.score),
                "accuracy": accuracy_json(&r.accuracy),
            })
        })
        .collect()
}

fn warn_on_score(diagnostics: &EmDiagnostics) {
    if let Some(warning) = score_warning(diagnostics) {
        eprintln!("Warning: {}", warning);
    }
}

fn diagnostics_value(diagnostics: &EmDiagnostics) -> serde_json::Value {
    match diagnostics_json(diagnostics) {
        Ok(value) => value,
        Err(e) => json!({ "error": e.to_string() }),
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}
