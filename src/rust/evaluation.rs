//! Offline scoring of the classifier against a labelled test split.
//!
//! The dataset is JSON Lines, one `{"text": ..., "label": ...}` object per
//! line, where `label` is either the class index or the emotion name.

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::classifier::{ClassifierError, EmotionPredictor};
use crate::labels::Emotion;

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: {message}")]
    InvalidRecord { line: usize, message: String },
    #[error("Prediction failed for sample {index}: {source}")]
    Prediction {
        index: usize,
        #[source]
        source: ClassifierError,
    },
    #[error("Dataset is empty")]
    Empty,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Index(usize),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct RawSample {
    text: String,
    label: RawLabel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub text: String,
    pub label: Emotion,
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>, EvaluationError> {
    let file = File::open(path.as_ref())?;
    parse_dataset(BufReader::new(file))
}

/// Parses JSON Lines; blank lines are skipped, line numbers in errors are 1-based.
pub fn parse_dataset<R: BufRead>(reader: R) -> Result<Vec<Sample>, EvaluationError> {
    let mut samples = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let invalid = |message: String| EvaluationError::InvalidRecord { line: line_no, message };

        let raw: RawSample = serde_json::from_str(&line).map_err(|e| invalid(e.to_string()))?;
        let label = match raw.label {
            RawLabel::Index(index) => Emotion::from_index(index)
                .ok_or_else(|| invalid(format!("label index {} out of range", index)))?,
            RawLabel::Name(name) => name.parse::<Emotion>().map_err(invalid)?,
        };
        samples.push(Sample { text: raw.text, label });
    }
    Ok(samples)
}

/// Rows are true labels, columns are predicted labels, both in logit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: [[u64; Emotion::COUNT]; Emotion::COUNT],
}

impl ConfusionMatrix {
    pub fn record(&mut self, truth: Emotion, predicted: Emotion) {
        self.counts[truth.index()][predicted.index()] += 1;
    }

    pub fn count(&self, truth: Emotion, predicted: Emotion) -> u64 {
        self.counts[truth.index()][predicted.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..Emotion::COUNT).map(|i| self.counts[i][i]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Number of samples whose true label is `label`.
    pub fn support(&self, label: Emotion) -> u64 {
        self.counts[label.index()].iter().sum()
    }

    fn predicted(&self, label: Emotion) -> u64 {
        self.counts.iter().map(|row| row[label.index()]).sum()
    }

    pub fn precision(&self, label: Emotion) -> f64 {
        ratio(self.count(label, label), self.predicted(label))
    }

    pub fn recall(&self, label: Emotion) -> f64 {
        ratio(self.count(label, label), self.support(label))
    }

    pub fn f1(&self, label: Emotion) -> f64 {
        let (p, r) = (self.precision(label), self.recall(label));
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub label: Emotion,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub matrix: ConfusionMatrix,
}

impl EvaluationReport {
    pub fn accuracy(&self) -> f64 {
        self.matrix.accuracy()
    }

    pub fn per_class(&self) -> Vec<ClassMetrics> {
        Emotion::ALL
            .iter()
            .map(|&label| ClassMetrics {
                label,
                precision: self.matrix.precision(label),
                recall: self.matrix.recall(label),
                f1: self.matrix.f1(label),
                support: self.matrix.support(label),
            })
            .collect()
    }

    /// Unweighted mean of (precision, recall, f1) across classes.
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        let rows = self.per_class();
        let n = rows.len() as f64;
        (
            rows.iter().map(|m| m.precision).sum::<f64>() / n,
            rows.iter().map(|m| m.recall).sum::<f64>() / n,
            rows.iter().map(|m| m.f1).sum::<f64>() / n,
        )
    }

    /// Support-weighted mean of (precision, recall, f1).
    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        let total = self.matrix.total();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }
        let rows = self.per_class();
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            rows.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total as f64
        };
        (weighted(|m| m.precision), weighted(|m| m.recall), weighted(|m| m.f1))
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy on test set: {:.4}", self.accuracy())?;
        writeln!(f)?;
        writeln!(f, "Classification Report:")?;
        writeln!(f, "{:>12} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for m in self.per_class() {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label.as_str(), m.precision, m.recall, m.f1, m.support
            )?;
        }
        let total = self.matrix.total();
        let (p, r, f1) = self.macro_avg();
        writeln!(f, "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}", "macro avg", p, r, f1, total)?;
        let (p, r, f1) = self.weighted_avg();
        writeln!(f, "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}", "weighted avg", p, r, f1, total)?;

        writeln!(f)?;
        writeln!(f, "Confusion Matrix (rows: true, columns: predicted):")?;
        write!(f, "{:>12}", "")?;
        for label in Emotion::ALL {
            write!(f, " {:>8}", label.as_str())?;
        }
        writeln!(f)?;
        for truth in Emotion::ALL {
            write!(f, "{:>12}", truth.as_str())?;
            for predicted in Emotion::ALL {
                write!(f, " {:>8}", self.matrix.count(truth, predicted))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Classifies every sample and tallies the outcome.
pub fn evaluate(predictor: &dyn EmotionPredictor, samples: &[Sample]) -> Result<EvaluationReport, EvaluationError> {
    if samples.is_empty() {
        return Err(EvaluationError::Empty);
    }

    let mut matrix = ConfusionMatrix::default();
    for (index, sample) in samples.iter().enumerate() {
        let prediction = predictor
            .predict(&sample.text)
            .map_err(|source| EvaluationError::Prediction { index, source })?;
        matrix.record(sample.label, prediction.label);
        if (index + 1) % 500 == 0 {
            log::info!("Evaluated {}/{} samples", index + 1, samples.len());
        }
    }

    Ok(EvaluationReport { matrix })
}
