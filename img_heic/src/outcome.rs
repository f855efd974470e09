//! Per-file conversion outcomes and the report returned by a run.

use crate::formats::OutputFormat;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct Success {
    pub input_name: String,
    pub input_index: usize,
    pub output_name: String,
    pub format: OutputFormat,
    pub size: u64,
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
}

impl Success {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "cause", rename_all = "snake_case")]
pub enum FailureReason {
    Decode(String),
    Encode(String),
    /// Never started because the batch was aborted.
    NotAttempted(String),
}

impl FailureReason {
    pub fn cause(&self) -> &str {
        match self {
            FailureReason::Decode(c) | FailureReason::Encode(c) | FailureReason::NotAttempted(c) => c,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Decode(c) => write!(f, "decode failed: {}", c),
            FailureReason::Encode(c) => write!(f, "encode failed: {}", c),
            FailureReason::NotAttempted(c) => write!(f, "not attempted: {}", c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub input_name: String,
    pub input_index: usize,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConversionOutcome {
    Success(Success),
    Failure(Failure),
}

impl ConversionOutcome {
    pub fn input_name(&self) -> &str {
        match self {
            ConversionOutcome::Success(s) => &s.input_name,
            ConversionOutcome::Failure(f) => &f.input_name,
        }
    }

    pub fn input_index(&self) -> usize {
        match self {
            ConversionOutcome::Success(s) => s.input_index,
            ConversionOutcome::Failure(f) => f.input_index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success(_))
    }

    pub fn as_success(&self) -> Option<&Success> {
        match self {
            ConversionOutcome::Success(s) => Some(s),
            ConversionOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            ConversionOutcome::Success(_) => None,
            ConversionOutcome::Failure(f) => Some(f),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub output_bytes: u64,
}

impl OutcomeSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a ConversionOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.total += 1;
            match outcome {
                ConversionOutcome::Success(s) => {
                    summary.succeeded += 1;
                    summary.output_bytes += s.size;
                }
                ConversionOutcome::Failure(f) => {
                    summary.failed += 1;
                    if matches!(f.reason, FailureReason::NotAttempted(_)) {
                        summary.not_attempted += 1;
                    }
                }
            }
        }
        summary
    }
}

/// Outcomes of one run, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generation: u64,
    pub outcomes: Vec<ConversionOutcome>,
    /// Set when the decoder could not be loaded and the rest of the batch was skipped.
    pub aborted: Option<String>,
    /// Set when a newer batch was staged while this one was running.
    pub abandoned: bool,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = &Success> {
        self.outcomes.iter().filter_map(ConversionOutcome::as_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.outcomes.iter().filter_map(ConversionOutcome::as_failure)
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary::from_outcomes(&self.outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(name: &str, index: usize, size: u64) -> ConversionOutcome {
        ConversionOutcome::Success(Success {
            input_name: format!("{}.heic", name),
            input_index: index,
            output_name: format!("{}.jpg", name),
            format: OutputFormat::Jpeg,
            size,
            bytes: Arc::from(vec![0u8; size as usize]),
        })
    }

    fn failed(name: &str, index: usize, reason: FailureReason) -> ConversionOutcome {
        ConversionOutcome::Failure(Failure {
            input_name: name.to_string(),
            input_index: index,
            reason,
        })
    }

    #[test]
    fn test_summary_counts() {
        let report = BatchReport {
            generation: 1,
            outcomes: vec![
                ok("a", 0, 10),
                failed("b.heic", 1, FailureReason::Decode("bad".into())),
                ok("c", 2, 5),
                failed("d.heic", 3, FailureReason::NotAttempted("aborted".into())),
            ],
            aborted: Some("aborted".into()),
            abandoned: false,
        };

        let summary = report.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.not_attempted, 1);
        assert_eq!(summary.output_bytes, 15);
        assert_eq!(report.successes().count(), 2);
        assert_eq!(report.failures().map(|f| f.input_index).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(ok("IMG_1", 0, 3)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["output_name"], "IMG_1.jpg");
        assert!(json.get("bytes").is_none(), "bytes are never serialized");

        let json = serde_json::to_value(failed("x.heic", 2, FailureReason::Encode("oops".into()))).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"]["kind"], "encode");
        assert_eq!(json["reason"]["cause"], "oops");
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            FailureReason::Decode("truncated".into()).to_string(),
            "decode failed: truncated"
        );
        assert_eq!(FailureReason::NotAttempted("x".into()).cause(), "x");
    }
}
