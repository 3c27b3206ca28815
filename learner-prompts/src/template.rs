//! Prompt templates with `{{variable}}` substitution.

use std::collections::HashMap;
use std::fmt;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while parsing or rendering templates.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A referenced variable had no value at render time.
    #[error("missing template variable: {name}")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },

    /// The template text could not be parsed.
    #[error("invalid template at byte {offset}: {reason}")]
    Syntax {
        /// Byte offset of the offending `{{`.
        offset: usize,
        /// Reason for the failure.
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed prompt template.
///
/// Every `{{name}}` placeholder must receive a value when rendering; literal
/// text is copied unchanged.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use learner_prompts::PromptTemplate;
///
/// let template = PromptTemplate::parse("You are {{role}}.").unwrap();
/// let vars = HashMap::from([("role", "a copywriter")]);
/// assert_eq!(template.render(&vars).unwrap(), "You are a copywriter.");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parses template text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] for an unterminated or empty placeholder.
    pub fn parse(source: impl Into<String>) -> TemplateResult<Self> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut rest = source.as_str();
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_owned()));
            }
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                return Err(TemplateError::Syntax {
                    offset: offset + start,
                    reason: "unterminated placeholder",
                });
            };
            let name = after_open[..end].trim();
            if name.is_empty() {
                return Err(TemplateError::Syntax {
                    offset: offset + start,
                    reason: "empty placeholder",
                });
            }
            segments.push(Segment::Variable(name.to_owned()));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }

        Ok(Self { source, segments })
    }

    /// Names of the referenced variables, in order of first appearance.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Renders the template with the supplied values.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] if a referenced variable has
    /// no value.
    pub fn render(&self, vars: &HashMap<&str, &str>) -> TemplateResult<String> {
        let mut rendered = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Variable(name) => {
                    let value = vars.get(name.as_str()).ok_or_else(|| {
                        TemplateError::MissingVariable { name: name.clone() }
                    })?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiple_variables() {
        let template = PromptTemplate::parse("{{greeting}} {{ name }}, {{question}}").unwrap();
        let vars = HashMap::from([
            ("greeting", "Hello"),
            ("name", "Alice"),
            ("question", "how are you?"),
        ]);
        assert_eq!(template.render(&vars).unwrap(), "Hello Alice, how are you?");
    }

    #[test]
    fn reports_missing_variable() {
        let template = PromptTemplate::parse("Task: {{task}}").unwrap();
        let err = template.render(&HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingVariable {
                name: "task".to_owned()
            }
        );
    }

    #[test]
    fn rejects_malformed_placeholders() {
        assert!(matches!(
            PromptTemplate::parse("oops {{name"),
            Err(TemplateError::Syntax { offset: 5, .. })
        ));
        assert!(matches!(
            PromptTemplate::parse("{{ }}"),
            Err(TemplateError::Syntax { .. })
        ));
    }

    #[test]
    fn lists_unique_variables_in_order() {
        let template = PromptTemplate::parse("{{b}} {{a}} {{b}}").unwrap();
        assert_eq!(template.variables(), ["b", "a"]);
    }

    #[test]
    fn values_are_not_reinterpreted() {
        let template = PromptTemplate::parse("{{x}}").unwrap();
        let vars = HashMap::from([("x", "{{x}}")]);
        assert_eq!(template.render(&vars).unwrap(), "{{x}}");
    }
}
