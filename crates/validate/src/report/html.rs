use std::fmt::Write;

use analyze::VerdictStatus;

use crate::result::{ChunkVerdict, OverallStatus, ValidationResult};

const STYLE: &str = "body { font-family: sans-serif; max-width: 960px; margin: 2em auto; color: #222; }
.summary { background: #f5f5f5; padding: 1em; border-radius: 4px; }
.issue { border-left: 4px solid #ccc; padding: 0.5em 1em; margin: 1.5em 0; }
.issue.issues { border-color: #e6a700; }
.issue.error { border-color: #c62828; }
.status.valid { color: #2e7d32; }
.status.issues { color: #e6a700; }
.status.error { color: #c62828; }
pre { background: #fafafa; padding: 0.75em; white-space: pre-wrap; }
.note { font-style: italic; }";

pub(super) fn render(result: &ValidationResult) -> String {
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Content Validation Report</title>\n");
    let _ = writeln!(out, "<style>\n{STYLE}\n</style>");
    out.push_str("</head>\n<body>\n<h1>Content Validation Report</h1>\n");

    let overall_class = match result.overall_status {
        OverallStatus::Valid if !result.partial => "valid",
        _ => "issues",
    };
    out.push_str("<div class=\"summary\">\n");
    let _ = writeln!(out, "<p><strong>File:</strong> {}</p>", escape_html(&result.file_path));
    let _ = writeln!(out, "<p><strong>Scope:</strong> {}</p>", result.scope);
    let _ = writeln!(
        out,
        "<p><strong>Status:</strong> <span class=\"status {overall_class}\">{}</span></p>",
        escape_html(&result.status_label())
    );
    let _ = writeln!(out, "<p><strong>Total Chunks:</strong> {}</p>", result.summary.total_chunks);
    let _ = writeln!(
        out,
        "<p><strong>Chunks Validated:</strong> {}</p>",
        result.summary.validated_chunks
    );
    let _ = writeln!(out, "<p><strong>Issues Found:</strong> {}</p>", result.summary.issues_found);
    if result.partial {
        out.push_str("<p class=\"note\">Validation was cancelled before every chunk was analyzed.</p>\n");
    }
    out.push_str("</div>\n");

    if result.summary.issues_found > 0 {
        out.push_str("<h2>Issues</h2>\n");
        for chunk in result.issues() {
            write_issue(&mut out, chunk);
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn write_issue(out: &mut String, chunk: &ChunkVerdict) {
    let verdict = &chunk.verdict;
    let class = status_class(verdict.status);

    let _ = writeln!(out, "<div class=\"issue {class}\">");
    let _ = writeln!(out, "<h3>Issue {}</h3>", chunk.index + 1);
    let _ = writeln!(out, "<pre>{}</pre>", escape_html(&chunk.content));
    let _ = writeln!(
        out,
        "<p><strong>Status:</strong> <span class=\"status {class}\">{}</span></p>",
        verdict.status
    );
    let _ = writeln!(out, "<p><strong>Message:</strong> {}</p>", escape_html(&verdict.message));

    if !verdict.suggestions.is_empty() {
        out.push_str("<p><strong>Suggestions:</strong></p>\n<ul>\n");
        for suggestion in &verdict.suggestions {
            let _ = writeln!(out, "<li>{}</li>", escape_html(suggestion));
        }
        out.push_str("</ul>\n");
    }

    if !verdict.references.is_empty() {
        out.push_str("<p><strong>References:</strong></p>\n<ul>\n");
        for reference in &verdict.references {
            let _ = writeln!(
                out,
                "<li>({}) {}</li>",
                reference.issue_type.as_str(),
                escape_html(&reference.text)
            );
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</div>\n");
}

fn status_class(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Valid => "valid",
        VerdictStatus::MinorIssues | VerdictStatus::Unknown => "issues",
        VerdictStatus::MajorIssues | VerdictStatus::Error => "error",
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
