use retrieve::Passage;

pub fn build_validation_prompt(chunk_text: &str, passages: &[Passage]) -> String {
    let mut context = String::new();
    for (i, passage) in passages.iter().enumerate() {
        match &passage.source {
            Some(source) => context.push_str(&format!("[{}] (source: {})\n", i + 1, source)),
            None => context.push_str(&format!("[{}]\n", i + 1)),
        }
        context.push_str(passage.content.trim());
        context.push_str("\n\n");
    }

    format!(
        r#"Validate documentation content against passages from a knowledge base.

CONTENT TO VALIDATE:
{}

KNOWLEDGE BASE CONTEXT:
{}
TASK:
Analyze the content against the knowledge base context and determine if there are any:
1. Factual inaccuracies
2. Missing important information
3. Outdated information
4. Inconsistencies with the knowledge base

SCHEMA:
{{
  "status": "valid" | "minor_issues" | "major_issues",
  "message": "Brief explanation of the validation result",
  "references": [
    {{"text": "Relevant text from knowledge base", "issue_type": "inaccuracy" | "missing" | "outdated" | "inconsistency" | "supporting"}}
  ],
  "suggestions": ["Suggestion 1", "Suggestion 2"]
}}

RULES:
- Use "valid" if the content is fully supported by the knowledge base
- Use "minor_issues" for problems that don't affect overall accuracy
- Use "major_issues" for significant problems that need to be addressed
- Reference text must be quoted from the knowledge base context
- Use an empty list when there are no references or suggestions
- Output ONLY the JSON object, no markdown, no explanations

JSON OUTPUT:"#,
        chunk_text, context
    )
}

pub fn build_repair_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON so it has the keys "status", "message", "references" and "suggestions". Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
