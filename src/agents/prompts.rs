// Prompt templates for LLM interactions
//
// This module contains all prompt templates used by the specialists.
// Prompts are versioned so generated artifacts can be traced back to them.

use std::collections::HashMap;

/// Prompt template structure
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub system: String,
    pub user_template: String,
}

impl PromptTemplate {
    /// `name@version`, attached to generation logs
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Render the user template, replacing every `{{key}}` with its value.
    ///
    /// Single left-to-right pass: substituted values are never rescanned.
    /// Placeholders without a matching variable are left as-is.
    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(self.user_template.len());
        let mut rest = self.user_template.as_str();

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                rest = &rest[open..];
                break;
            };
            match variables.get(&after[..close]) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[open..open + 2 + close + 2]),
            }
            rest = &after[close + 2..];
        }

        out.push_str(rest);
        out
    }
}

pub mod library {
    use super::PromptTemplate;

    pub fn frontend_component() -> PromptTemplate {
        PromptTemplate {
            name: "frontend_component".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a senior frontend architect writing production React components \
                     in TypeScript. Reply with a single fenced code block."
                .to_string(),
            user_template: "Create a React component named {{component}}.\n\n\
                            Purpose: {{description}}\n\
                            Props: {{props}}\n\
                            Styling: {{styling}}\n\n\
                            Requirements:\n\
                            - Declare a TypeScript interface for the props\n\
                            - Export the component\n\
                            - No placeholder content or unfinished sections"
                .to_string(),
        }
    }

    pub fn backend_endpoint() -> PromptTemplate {
        PromptTemplate {
            name: "backend_endpoint".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a senior backend engineer writing server code in TypeScript. \
                     Reply with a single fenced code block."
                .to_string(),
            user_template: "Implement the {{method}} {{endpoint}} route handler using {{framework}}.\n\n\
                            Behavior: {{description}}\n\n\
                            Requirements:\n\
                            - Validate input and return proper status codes\n\
                            - Handle errors explicitly\n\
                            - Export the handler"
                .to_string(),
        }
    }

    pub fn database_schema() -> PromptTemplate {
        PromptTemplate {
            name: "database_schema".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a database architect writing SQL DDL. \
                     Reply with a single fenced code block."
                .to_string(),
            user_template: "Design the {{schema}} schema in {{dialect}}.\n\n\
                            Entities: {{entities}}\n\
                            Notes: {{description}}\n\n\
                            Requirements:\n\
                            - One CREATE TABLE statement per entity\n\
                            - Primary keys, foreign keys and useful indexes"
                .to_string(),
        }
    }

    pub fn test_suite() -> PromptTemplate {
        PromptTemplate {
            name: "test_suite".to_string(),
            version: "1.0.0".to_string(),
            system: "You are a QA engineer writing automated tests in TypeScript. \
                     Reply with a single fenced code block."
                .to_string(),
            user_template: "Write a {{framework}} test suite for {{target}}.\n\n\
                            What to cover: {{description}}\n\n\
                            Requirements:\n\
                            - Group cases with describe blocks\n\
                            - Cover success and failure paths"
                .to_string(),
        }
    }

    pub fn repair() -> PromptTemplate {
        PromptTemplate {
            name: "repair".to_string(),
            version: "1.0.0".to_string(),
            system: "You fix generated code. Reply with the complete corrected code \
                     in a single fenced code block."
                .to_string(),
            user_template: "The following code has these issues:\n{{issues}}\n\n\
                            Fix all of them and return the full file.\n\n\
                            ```\n{{code}}\n```"
                .to_string(),
        }
    }
}
