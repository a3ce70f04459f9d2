//! Prompt templates for answer generation.
//!
//! Every prompt the library sends is built here so tests can inspect the
//! exact text without a live endpoint. The label and the context document
//! are always embedded verbatim; callers downstream rely on finding both as
//! substrings of the request.

use crate::error::FormFillError;

/// Placeholder replaced by the OCR'd field label.
pub const LABEL_PLACEHOLDER: &str = "{label}";

/// Placeholder replaced by the full context document.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Default template used when `FillConfig::prompt_template` is `None`.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are filling in a paper form on behalf of a person.
Use ONLY the background information below to answer.

BACKGROUND INFORMATION:
"""
{context}
"""

FORM FIELD LABEL:
"""
{label}
"""

Rules:
- Reply with the value to write in the field and nothing else
- Keep it short enough to fit on a single line of a form
- Do NOT repeat the label, add quotes, or explain your answer
- If the background information does not contain the answer, reply with N/A"#;

/// Extra line inserted when OCR recovered no label at all.
pub const UNLABELLED_HINT: &str =
    "The field label could not be read; infer the most likely field from the background information.";

/// Ensure a custom template keeps both placeholders.
pub fn validate_template(template: &str) -> Result<(), FormFillError> {
    for placeholder in [LABEL_PLACEHOLDER, CONTEXT_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(FormFillError::InvalidConfig(format!(
                "prompt template must contain {placeholder}"
            )));
        }
    }
    Ok(())
}

/// Build the prompt for one field.
///
/// Placeholders are expanded in a single pass over the template, so braces
/// inside the label or the context document are copied through untouched.
pub fn build_prompt(template: Option<&str>, label: &str, context: &str) -> String {
    let template = template.unwrap_or(DEFAULT_PROMPT_TEMPLATE);
    let mut prompt = String::with_capacity(template.len() + label.len() + context.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        prompt.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(LABEL_PLACEHOLDER) {
            prompt.push_str(label);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
            prompt.push_str(context);
            rest = after;
        } else {
            prompt.push('{');
            rest = &tail[1..];
        }
    }
    prompt.push_str(rest);

    if label.trim().is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(UNLABELLED_HINT);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_embeds_label_and_context() {
        let prompt = build_prompt(None, "Test Field Name", "Dummy Context Data");
        assert!(prompt.contains("Test Field Name"));
        assert!(prompt.contains("Dummy Context Data"));
        assert!(!prompt.contains(UNLABELLED_HINT));
    }

    #[test]
    fn empty_label_still_builds() {
        let prompt = build_prompt(None, "", "Name: Ada Lovelace");
        assert!(prompt.contains("Name: Ada Lovelace"));
        assert!(prompt.contains(UNLABELLED_HINT));
    }

    #[test]
    fn braces_in_label_are_not_expanded() {
        let prompt = build_prompt(Some("{label} :: {context}"), "{context}", "ctx");
        assert_eq!(prompt, "{context} :: ctx");
    }

    #[test]
    fn custom_template_validation() {
        assert!(validate_template("{label} {context}").is_ok());
        assert!(validate_template("{label}").is_err());
        assert!(validate_template("{context}").is_err());
        assert!(validate_template(DEFAULT_PROMPT_TEMPLATE).is_ok());
    }
}
