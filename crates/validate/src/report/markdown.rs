use std::fmt::Write;

use crate::result::{ChunkVerdict, ValidationResult};

pub(super) fn render(result: &ValidationResult) -> String {
    let mut out = String::new();

    out.push_str("# Content Validation Report\n\n");
    let _ = writeln!(out, "**File:** {}", result.file_path);
    let _ = writeln!(out, "**Scope:** {}", result.scope);
    let _ = writeln!(out, "**Status:** {}", result.status_label());
    let _ = writeln!(out, "**Total Chunks:** {}", result.summary.total_chunks);
    let _ = writeln!(out, "**Chunks Validated:** {}", result.summary.validated_chunks);
    let _ = writeln!(out, "**Issues Found:** {}", result.summary.issues_found);
    if result.partial {
        out.push_str("\n> Validation was cancelled before every chunk was analyzed.\n");
    }

    if result.summary.issues_found > 0 {
        out.push_str("\n## Issues\n");
        for chunk in result.issues() {
            write_issue(&mut out, chunk);
        }
    }

    out
}

fn write_issue(out: &mut String, chunk: &ChunkVerdict) {
    let verdict = &chunk.verdict;
    let fence = fence_for(&chunk.content);

    let _ = writeln!(out, "\n### Issue {}\n", chunk.index + 1);
    out.push_str("**Content:**\n");
    let _ = writeln!(out, "{fence}\n{}\n{fence}\n", chunk.content);
    let _ = writeln!(out, "**Status:** {}\n", verdict.status);
    let _ = writeln!(out, "**Message:** {}", verdict.message);

    if !verdict.suggestions.is_empty() {
        out.push_str("\n**Suggestions:**\n");
        for suggestion in &verdict.suggestions {
            let _ = writeln!(out, "- {suggestion}");
        }
    }

    if !verdict.references.is_empty() {
        out.push_str("\n**References:**\n");
        for reference in &verdict.references {
            let _ = writeln!(out, "- ({}) {}", reference.issue_type.as_str(), reference.text);
        }
    }
}

/// A backtick fence longer than any backtick run inside `content`.
fn fence_for(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_result;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_and_single_issue() {
        let md = render(&sample_result());

        assert!(md.starts_with("# Content Validation Report\n"));
        assert!(md.contains("**File:** docs/guide.md\n"));
        assert!(md.contains("**Scope:** paragraph\n"));
        assert!(md.contains("**Status:** issues_found\n"));
        assert!(md.contains("**Total Chunks:** 3\n"));
        assert!(md.contains("**Issues Found:** 2\n"));

        // unknown counts as an issue, valid chunks are omitted
        assert_eq!(md.matches("### Issue").count(), 2);
        assert!(md.contains("### Issue 2\n"));
        assert!(md.contains("### Issue 3\n"));
        assert!(!md.contains("S3 buckets are regional."));
        assert!(md.contains("```\nLambda runs for <b>an hour</b>.\n```"));
        assert!(md.contains("- Say \"15 minutes\"\n"));
        assert!(md.contains("- (inaccuracy) Functions time out after 15 minutes.\n"));
    }

    #[test]
    fn test_clean_result_has_no_issues_section() {
        let mut result = sample_result();
        result.chunks.retain(|c| c.verdict.is_valid());
        let md = render(&result.reaggregate());

        assert!(md.contains("**Status:** valid\n"));
        assert!(!md.contains("## Issues"));
    }

    #[test]
    fn test_fence_outgrows_backticks_in_content() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("uses ```rust``` blocks"), "````");
    }

    #[test]
    fn test_partial_note() {
        let mut result = sample_result();
        result.partial = true;
        assert!(render(&result).contains("cancelled"));
    }

    #[test]
    fn test_run_cancelled_before_analysis_is_not_reported_valid() {
        let mut result = sample_result();
        result.chunks.clear();
        result.partial = true;
        let md = render(&result.reaggregate());

        assert!(md.contains("**Status:** valid (partial: 0 of 3 chunks analyzed)\n"));
        assert!(!md.contains("**Status:** valid\n"));
    }
}
