//! # bscem CLI support
//!
//! Loads pairwise document preferences from crowd workers, builds a truth
//! model over them and scores its answers against a relevance QREL.
//!
//! A preference row says a worker judged `left_doc` better than `right_doc`
//! (`result == "win"`). Each unordered document pair becomes one question
//! named `"small big"` (lexicographic order); the observation is `true` when
//! the smaller document won.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::Rng;
use rustc_hash::FxHashMap;
use serde_json::json;
use thiserror::Error;

use bscem_core::engine::em::EmDiagnostics;
use bscem_core::engine::errors::ModelError;
use bscem_core::model::multiple_bsc::MultipleBscModel;
use bscem_core::model::multiple_bsc_pair::MultipleBscPairModel;

pub const FIELD_TASK: &str = "research_task";
pub const FIELD_TOPIC: &str = "topic";
pub const FIELD_TOPIC_ID: &str = "topic_id";
pub const FIELD_STATUS: &str = "assn_status";
pub const FIELD_WORKER: &str = "worker_id";
pub const FIELD_LEFT_DOC: &str = "left_doc";
pub const FIELD_RIGHT_DOC: &str = "right_doc";
pub const FIELD_RESULT: &str = "result";

pub const STATUS_APPROVED: &str = "Approved";
pub const RESULT_WIN: &str = "win";

/// Starting noise rate of every channel.
pub const INITIAL_NOISE: f64 = 1e-3;

/// Starting hyperparameters of the empirical-Bayes noise prior.
pub const PRIOR_ALPHA: f64 = 2.0;
pub const PRIOR_BETA: f64 = 10.0;

/// Errors raised while loading inputs or training.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CliError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("preference file has no header row")]
    MissingHeader,

    #[error("preference file has no `{0}` column")]
    MissingField(&'static str),

    #[error("preference file line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("qrel line {line}: {message}")]
    Qrel { line: usize, message: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub fn read_file(path: &std::path::Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Splits one comma-separated record. Fields may be double-quoted; a doubled
/// quote inside a quoted field is a literal quote.
pub fn split_csv_record(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;
    let mut at_field_start = true;

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if at_field_start => {
                quoted = true;
                at_field_start = false;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                at_field_start = true;
            }
            _ => {
                field.push(c);
                at_field_start = false;
            }
        }
    }
    if quoted {
        return Err("unterminated quoted field".into());
    }
    fields.push(field);
    Ok(fields)
}

/// A preference file: header plus rows.
#[derive(Debug, Clone, Default)]
pub struct PrefsTable {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PrefsTable {
    /// Parses CSV text. Blank lines are skipped; every row must have as many
    /// fields as the header.
    pub fn parse(text: &str) -> Result<Self, CliError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.is_empty());

        let (header_line, header) = lines.next().ok_or(CliError::MissingHeader)?;
        let fields = split_csv_record(header).map_err(|message| CliError::Csv {
            line: header_line,
            message,
        })?;

        let mut rows = Vec::new();
        for (line, text) in lines {
            let row =
                split_csv_record(text).map_err(|message| CliError::Csv { line, message })?;
            if row.len() != fields.len() {
                return Err(CliError::Csv {
                    line,
                    message: format!("expected {} fields, found {}", fields.len(), row.len()),
                });
            }
            rows.push(row);
        }
        Ok(Self { fields, rows })
    }

    fn column(&self, name: &'static str) -> Result<usize, CliError> {
        self.fields
            .iter()
            .position(|f| f == name)
            .ok_or(CliError::MissingField(name))
    }
}

/// Column positions of the fields a preference row needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub task: usize,
    pub topic: usize,
    pub topic_id: usize,
    pub status: usize,
    pub worker: usize,
    pub left_doc: usize,
    pub right_doc: usize,
    pub result: usize,
}

impl Columns {
    pub fn resolve(table: &PrefsTable) -> Result<Self, CliError> {
        Ok(Self {
            task: table.column(FIELD_TASK)?,
            topic: table.column(FIELD_TOPIC)?,
            topic_id: table.column(FIELD_TOPIC_ID)?,
            status: table.column(FIELD_STATUS)?,
            worker: table.column(FIELD_WORKER)?,
            left_doc: table.column(FIELD_LEFT_DOC)?,
            right_doc: table.column(FIELD_RIGHT_DOC)?,
            result: table.column(FIELD_RESULT)?,
        })
    }
}

/// One accepted preference judgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub small: String,
    pub big: String,
    pub worker: String,
    /// Whether the lexicographically smaller document won.
    pub small_won: bool,
}

impl Judgment {
    /// The question name shared by every judgment of this document pair.
    pub fn question(&self) -> String {
        format!("{} {}", self.small, self.big)
    }
}

/// Judgments for one research task and topic.
#[derive(Debug, Clone, Default)]
pub struct Judgments {
    /// QREL topic id of the first row naming the topic.
    pub topic_id: Option<String>,
    pub judgments: Vec<Judgment>,
}

impl Judgments {
    /// Keeps approved winning rows of the given task and topic.
    pub fn collect(table: &PrefsTable, task: &str, topic: &str) -> Result<Self, CliError> {
        let cols = Columns::resolve(table)?;
        let topic_id = table
            .rows
            .iter()
            .find(|row| row[cols.topic] == topic)
            .map(|row| row[cols.topic_id].clone());

        let judgments = table
            .rows
            .iter()
            .filter(|row| {
                row[cols.task] == task
                    && row[cols.topic] == topic
                    && row[cols.status] == STATUS_APPROVED
                    && row[cols.result] == RESULT_WIN
            })
            .map(|row| {
                let winner = &row[cols.left_doc];
                let loser = &row[cols.right_doc];
                let (small, big) = if loser < winner {
                    (loser, winner)
                } else {
                    (winner, loser)
                };
                Judgment {
                    small: small.clone(),
                    big: big.clone(),
                    worker: row[cols.worker].clone(),
                    small_won: small == winner,
                }
            })
            .collect();
        Ok(Self {
            topic_id,
            judgments,
        })
    }

    /// Counts of judgments where the smaller and the bigger document won.
    pub fn polarity(&self) -> (usize, usize) {
        let pos = self.judgments.iter().filter(|j| j.small_won).count();
        (pos, self.judgments.len() - pos)
    }

    /// Net votes for the smaller document, per document pair.
    pub fn majority(&self) -> BTreeMap<(String, String), i64> {
        let mut votes = BTreeMap::new();
        for j in &self.judgments {
            let entry = votes
                .entry((j.small.clone(), j.big.clone()))
                .or_insert(0_i64);
            *entry += if j.small_won { 1 } else { -1 };
        }
        votes
    }

    /// One channel per worker.
    pub fn single_model(&self, soft: bool, prior: bool) -> Result<MultipleBscModel, CliError> {
        let mut model = MultipleBscModel::new();
        model.set_soft_inputs(soft);
        if prior {
            model.enable_noise_prior(PRIOR_ALPHA, PRIOR_BETA, true)?;
        }
        for j in &self.judgments {
            if !model.has_channel(&j.worker) {
                model.add_channel(&j.worker, INITIAL_NOISE)?;
            }
            model.add_observation(&j.question(), &j.worker, j.small_won)?;
        }
        Ok(model)
    }

    /// Layer-1 channel per question, layer-2 channel per worker.
    pub fn pair_model(&self, soft: bool, prior: bool) -> Result<MultipleBscPairModel, CliError> {
        let mut model = MultipleBscPairModel::new();
        model.set_soft_inputs(soft);
        if prior {
            model.enable_noise_prior(PRIOR_ALPHA, PRIOR_BETA, true)?;
        }
        for j in &self.judgments {
            let question = j.question();
            if !model.has_channel(&question, &j.worker) {
                model.add_channel(&question, INITIAL_NOISE, &j.worker, INITIAL_NOISE)?;
            }
            model.add_observation(&question, &question, &j.worker, j.small_won)?;
        }
        Ok(model)
    }
}

/// Document relevance for one topic. Unlisted documents count as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qrel {
    relevance: FxHashMap<String, i64>,
}

impl Qrel {
    /// Parses `topic_id iteration doc relevance` lines, keeping those of
    /// `topic_id`. Lines must have exactly four space-separated fields.
    pub fn parse(text: &str, topic_id: Option<&str>) -> Result<Self, CliError> {
        let mut relevance = FxHashMap::default();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let record: Vec<&str> = line.split(' ').collect();
            if record.len() != 4 {
                return Err(CliError::Qrel {
                    line: i + 1,
                    message: format!("expected 4 fields, found {}", record.len()),
                });
            }
            if Some(record[0]) != topic_id {
                continue;
            }
            let rel = record[3].parse::<i64>().map_err(|e| CliError::Qrel {
                line: i + 1,
                message: format!("bad relevance `{}`: {}", record[3], e),
            })?;
            relevance.insert(record[2].to_string(), rel);
        }
        Ok(Self { relevance })
    }

    pub fn len(&self) -> usize {
        self.relevance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relevance.is_empty()
    }

    pub fn relevance(&self, doc: &str) -> i64 {
        self.relevance.get(doc).copied().unwrap_or(0)
    }

    /// Scores one prediction about the pair `(small, big)`. `None` when the
    /// pair carries no information (equal relevance).
    pub fn judge(&self, small: &str, big: &str, small_preferred: bool) -> Option<bool> {
        let rel_small = self.relevance(small);
        if rel_small == self.relevance(big) {
            return None;
        }
        Some(small_preferred && rel_small == 1)
    }
}

/// Correct predictions out of informative pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
}

impl Accuracy {
    pub fn record(&mut self, verdict: Option<bool>) {
        if let Some(correct) = verdict {
            self.total += 1;
            if correct {
                self.correct += 1;
            }
        }
    }

    /// NaN when no pair was informative.
    pub fn rate(&self) -> f64 {
        self.correct as f64 / self.total as f64
    }

    /// Accuracy of hard assignments keyed by `"small big"` question name.
    pub fn of_inputs(qrel: &Qrel, inputs: &BTreeMap<String, bool>) -> Self {
        let mut acc = Accuracy::default();
        for (question, &small_preferred) in inputs {
            if let Some((small, big)) = question.split_once(' ') {
                acc.record(qrel.judge(small, big, small_preferred));
            }
        }
        acc
    }
}

impl std::fmt::Display for Accuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} = {:.6}", self.correct, self.total, self.rate())
    }
}

/// Accuracies of the non-EM baselines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Baselines {
    pub majority: Accuracy,
    pub all_true: Accuracy,
    pub all_false: Accuracy,
    pub random: Accuracy,
}

impl Baselines {
    /// Majority vote (ties favour the bigger document), constant answers
    /// and a fair coin.
    pub fn evaluate<R: Rng + ?Sized>(
        majority: &BTreeMap<(String, String), i64>,
        qrel: &Qrel,
        rng: &mut R,
    ) -> Self {
        let mut out = Baselines::default();
        for ((small, big), &votes) in majority {
            out.majority.record(qrel.judge(small, big, votes > 0));
            out.all_true.record(qrel.judge(small, big, true));
            out.all_false.record(qrel.judge(small, big, false));
            let coin = rng.gen::<f64>() > 0.5;
            out.random.record(qrel.judge(small, big, coin));
        }
        out
    }
}

/// The per-stage progress line printed during training.
pub fn report_line(round: usize, stage: &str, score: f64, accuracy: &Accuracy) -> String {
    if round == 0 {
        format!("{} score: {:.6} accuracy: {}", stage, score, accuracy)
    } else {
        format!("Round {} {} score: {:.6} accuracy: {}", round, stage, score, accuracy)
    }
}

/// A score as JSON. JSON has no infinities or NaN, so those are written as
/// the strings `"inf"`, `"-inf"` and `"NaN"` instead of `null`.
pub fn score_json(score: f64) -> serde_json::Value {
    if score.is_finite() {
        json!(score)
    } else {
        json!(score.to_string())
    }
}

/// Training diagnostics as JSON, with scores written by [`score_json`].
pub fn diagnostics_json(
    diagnostics: &EmDiagnostics,
) -> Result<serde_json::Value, serde_json::Error> {
    let mut value = serde_json::to_value(diagnostics)?;
    if let Some(fields) = value.as_object_mut() {
        for (key, score) in [
            ("initial_score", diagnostics.initial_score),
            ("final_score", diagnostics.final_score),
            ("final_delta", diagnostics.final_delta),
        ] {
            fields.insert(key.to_string(), score_json(score));
        }
    }
    Ok(value)
}

/// A warning when training ended on a score that is not a number.
pub fn score_warning(diagnostics: &EmDiagnostics) -> Option<String> {
    if diagnostics.final_score.is_finite() {
        None
    } else {
        Some(format!(
            "training ended with non-finite score {} after {} round(s)",
            diagnostics.final_score, diagnostics.rounds_run
        ))
    }
}
