//! System prompt construction

/// Refusal the model is instructed to use for off-topic questions.
pub const REFUSAL: &str = "Sorry I can only help with querying biological databases";

/// Renders the system instruction for one question.
///
/// Rebuilt at the start of every question, since the target database and
/// the requested verbosity may change between calls within one session.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    database: String,
    wordiness: String,
}

impl PromptBuilder {
    pub fn new(database: impl Into<String>, wordiness: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            wordiness: wordiness.into(),
        }
    }

    /// Produce the system message content.
    pub fn render(&self) -> String {
        format!(
            "Provide me with a python gget command to query {}. \
             Provide {} responses, and include code. \
             Respond to questions which are not related to using gget with '{}'.",
            self.database, self.wordiness, REFUSAL
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mentions_database_and_wordiness() {
        let prompt = PromptBuilder::new("uniprot", "detailed").render();
        assert!(prompt.contains("query uniprot"));
        assert!(prompt.contains("Provide detailed responses"));
        assert!(prompt.contains(REFUSAL));
    }

    #[test]
    fn test_render_changes_with_parameters() {
        let a = PromptBuilder::new("ensembl", "concise").render();
        let b = PromptBuilder::new("ncbi", "concise").render();
        assert_ne!(a, b);
    }
}
