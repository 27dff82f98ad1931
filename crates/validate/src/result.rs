use analyze::Verdict;
use ingest::{Chunk, Scope};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Valid,
    IssuesFound,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Valid => "valid",
            OverallStatus::IssuesFound => "issues_found",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_chunks: usize,
    pub validated_chunks: usize,
    pub issues_found: usize,
}

/// One analyzed chunk: its text and position plus the verdict fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkVerdict {
    pub index: usize,
    pub chunk_id: String,
    pub content: String,
    pub offset: (usize, usize),
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// Identity of a validation run, fixed before any chunk is analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub file_path: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub run_id: Uuid,
    pub file_path: String,
    pub scope: Scope,
    pub overall_status: OverallStatus,
    pub summary: Summary,
    /// Set when the run was cancelled before every chunk had a verdict.
    #[serde(default)]
    pub partial: bool,
    pub chunks: Vec<ChunkVerdict>,
}

impl ValidationResult {
    /// Recompute summary and overall status from the stored chunk verdicts.
    pub fn reaggregate(mut self) -> Self {
        let (summary, overall_status) = summarize(self.summary.total_chunks, &self.chunks);
        self.summary = summary;
        self.overall_status = overall_status;
        self
    }

    /// Overall status for headers; a partial run says how much was analyzed.
    pub fn status_label(&self) -> String {
        if self.partial {
            format!(
                "{} (partial: {} of {} chunks analyzed)",
                self.overall_status, self.summary.validated_chunks, self.summary.total_chunks
            )
        } else {
            self.overall_status.to_string()
        }
    }

    pub fn issues(&self) -> impl Iterator<Item = &ChunkVerdict> {
        self.chunks.iter().filter(|c| !c.verdict.is_valid())
    }
}

fn summarize(total_chunks: usize, chunks: &[ChunkVerdict]) -> (Summary, OverallStatus) {
    let issues_found = chunks.iter().filter(|c| !c.verdict.is_valid()).count();

    let summary = Summary {
        total_chunks,
        validated_chunks: chunks.len(),
        issues_found,
    };

    let overall_status = if issues_found == 0 {
        OverallStatus::Valid
    } else {
        OverallStatus::IssuesFound
    };

    (summary, overall_status)
}

/// Fold per-chunk verdicts into a document-level result.
///
/// `verdicts[i]` belongs to `chunks[i]`; `None` marks a chunk that was never
/// analyzed (cancelled run) and makes the result partial.
pub fn aggregate(run: RunInfo, chunks: Vec<Chunk>, verdicts: Vec<Option<Verdict>>) -> ValidationResult {
    let total_chunks = chunks.len();
    let mut partial = verdicts.len() < total_chunks;

    let mut analyzed = Vec::with_capacity(total_chunks);
    for (chunk, verdict) in chunks.into_iter().zip(verdicts) {
        match verdict {
            Some(verdict) => analyzed.push(ChunkVerdict {
                index: chunk.index,
                chunk_id: chunk.chunk_id,
                content: chunk.text,
                offset: chunk.offset,
                verdict,
            }),
            None => partial = true,
        }
    }

    let (summary, overall_status) = summarize(total_chunks, &analyzed);

    ValidationResult {
        run_id: run.run_id,
        file_path: run.file_path,
        scope: run.scope,
        overall_status,
        summary,
        partial,
        chunks: analyzed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyze::VerdictStatus;

    fn run() -> RunInfo {
        RunInfo {
            run_id: Uuid::nil(),
            file_path: "guide.md".to_string(),
            scope: Scope::Paragraph,
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk::new(i, "doc".to_string(), format!("Paragraph {i}."), (i * 20, i * 20 + 12)))
            .collect()
    }

    /// Every status combination of length `n`.
    fn status_combinations(n: usize) -> Vec<Vec<VerdictStatus>> {
        const ALL: [VerdictStatus; 5] = [
            VerdictStatus::Valid,
            VerdictStatus::MinorIssues,
            VerdictStatus::MajorIssues,
            VerdictStatus::Unknown,
            VerdictStatus::Error,
        ];
        let mut combos = vec![Vec::new()];
        for _ in 0..n {
            combos = combos
                .into_iter()
                .flat_map(|prefix: Vec<VerdictStatus>| {
                    ALL.iter().map(move |s| {
                        let mut next = prefix.clone();
                        next.push(*s);
                        next
                    })
                })
                .collect();
        }
        combos
    }

    #[test]
    fn test_overall_valid_iff_every_verdict_valid() {
        for combo in (0..=3).flat_map(status_combinations) {
            let verdicts = combo.iter().map(|s| Some(Verdict::new(*s, ""))).collect();
            let result = aggregate(run(), chunks(combo.len()), verdicts);

            let non_valid = combo.iter().filter(|s| **s != VerdictStatus::Valid).count();
            assert_eq!(result.summary.issues_found, non_valid);
            assert_eq!(result.summary.validated_chunks, combo.len());
            assert_eq!(
                result.overall_status == OverallStatus::Valid,
                combo.iter().all(|s| *s == VerdictStatus::Valid)
            );
            assert!(!result.partial);
        }
    }

    #[test]
    fn test_missing_verdicts_make_result_partial() {
        let verdicts = vec![Some(Verdict::new(VerdictStatus::Valid, "ok")), None, None];
        let result = aggregate(run(), chunks(3), verdicts);

        assert!(result.partial);
        assert_eq!(result.summary.total_chunks, 3);
        assert_eq!(result.summary.validated_chunks, 1);
        assert_eq!(result.overall_status, OverallStatus::Valid);
        assert_eq!(result.chunks[0].content, "Paragraph 0.");
    }

    #[test]
    fn test_status_label_shows_partial_coverage() {
        let complete = aggregate(run(), chunks(2), vec![Some(Verdict::new(VerdictStatus::Valid, "")); 2]);
        assert_eq!(complete.status_label(), "valid");

        let cancelled = aggregate(run(), chunks(3), vec![None, None, None]);
        assert_eq!(cancelled.overall_status, OverallStatus::Valid);
        assert_eq!(cancelled.status_label(), "valid (partial: 0 of 3 chunks analyzed)");
    }

    #[test]
    fn test_reaggregate_is_stable_and_recomputes() {
        let verdicts = vec![
            Some(Verdict::new(VerdictStatus::Valid, "")),
            Some(Verdict::error("Model invocation failed")),
        ];
        let result = aggregate(run(), chunks(2), verdicts);
        assert_eq!(result.clone().reaggregate(), result);

        let mut edited = result.clone();
        edited.chunks[1].verdict = Verdict::new(VerdictStatus::Valid, "fixed by reviewer");
        let edited = edited.reaggregate();
        assert_eq!(edited.summary.issues_found, 0);
        assert_eq!(edited.overall_status, OverallStatus::Valid);
    }

    #[test]
    fn test_json_shape_flattens_verdict() {
        let result = aggregate(run(), chunks(1), vec![Some(Verdict::unknown("No context"))]);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["overall_status"], "issues_found");
        assert_eq!(value["scope"], "paragraph");
        assert_eq!(value["summary"]["issues_found"], 1);
        assert_eq!(value["chunks"][0]["status"], "unknown");
        assert_eq!(value["chunks"][0]["content"], "Paragraph 0.");

        let back: ValidationResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
