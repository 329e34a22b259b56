//! Per-specialization task behavior.
//!
//! The worker runs the same execution contract for every task; a
//! [`Specialist`] supplies the parts that differ: prompt, target file,
//! validation rules and the result summary.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use super::errors::{AgentError, AgentResult};
use super::payload::{has_export, has_type_declaration, marker_issues};
use super::prompts::{library, PromptTemplate};
use super::types::{
    BackendRequirements, DatabaseRequirements, FrontendRequirements, Specialization, Task,
    TaskRequirements, TestingRequirements,
};
use crate::llm::ChatMessage;

/// Where and how a generated payload is reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub language: &'static str,
    pub category: &'static str,
}

/// Specialization-defined parts of task execution
pub trait Specialist: Send + Sync {
    fn specialization(&self) -> Specialization;

    /// Sampling temperature for the first generation
    fn temperature(&self) -> f32;

    /// Sampling temperature for the single repair round trip
    fn repair_temperature(&self) -> f32 {
        0.1
    }

    /// Chat messages for the first generation
    fn prompt(&self, task: &Task) -> AgentResult<Vec<ChatMessage>>;

    fn artifact(&self, task: &Task) -> AgentResult<Artifact>;

    /// Heuristic issues found in a payload; empty means valid
    fn validate(&self, code: &str) -> Vec<String> {
        marker_issues(code)
    }

    /// Feature list reported in the `complete` summary
    fn features(&self, code: &str) -> Vec<String>;
}

/// Built-in specialist for a specialization
pub fn specialist_for(specialization: Specialization) -> Arc<dyn Specialist> {
    match specialization {
        Specialization::FrontendArchitect => Arc::new(FrontendArchitect),
        Specialization::Backend => Arc::new(BackendEngineer),
        Specialization::Database => Arc::new(DatabaseArchitect),
        Specialization::Testing => Arc::new(TestEngineer),
    }
}

fn unsupported(expected: Specialization, task: &Task) -> AgentError {
    AgentError::UnsupportedTask {
        expected: expected.to_string(),
        actual: task.task_type().to_string(),
    }
}

fn render(template: PromptTemplate, pairs: &[(&str, String)]) -> Vec<ChatMessage> {
    let variables: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let user = template.render(&variables);
    tracing::debug!(template = %template.label(), "prompt rendered");
    vec![ChatMessage::system(template.system), ChatMessage::user(user)]
}

fn list_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

/// `/api/users/:id` -> `users-id`
fn slug(endpoint: &str) -> String {
    let trimmed = endpoint.trim_matches('/');
    let trimmed = trimmed.strip_prefix("api/").unwrap_or(trimmed);
    let slug = trimmed
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "index".to_string()
    } else {
        slug
    }
}

// ===== Frontend =====

pub struct FrontendArchitect;

impl FrontendArchitect {
    fn requirements<'a>(&self, task: &'a Task) -> AgentResult<&'a FrontendRequirements> {
        match &task.requirements {
            TaskRequirements::FrontendArchitect(req) => Ok(req),
            _ => Err(unsupported(self.specialization(), task)),
        }
    }
}

impl Specialist for FrontendArchitect {
    fn specialization(&self) -> Specialization {
        Specialization::FrontendArchitect
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn prompt(&self, task: &Task) -> AgentResult<Vec<ChatMessage>> {
        let req = self.requirements(task)?;
        Ok(render(
            library::frontend_component(),
            &[
                ("component", req.component_name.clone()),
                ("description", req.description.clone()),
                ("props", list_or(&req.props, "none")),
                ("styling", req.styling.clone().unwrap_or_else(|| "Tailwind CSS".to_string())),
            ],
        ))
    }

    fn artifact(&self, task: &Task) -> AgentResult<Artifact> {
        let req = self.requirements(task)?;
        Ok(Artifact {
            path: format!("src/components/{}.tsx", req.component_name),
            language: "typescript",
            category: "component",
        })
    }

    fn validate(&self, code: &str) -> Vec<String> {
        let mut issues = marker_issues(code);
        if !has_export(code) {
            issues.push("Missing export statement".to_string());
        }
        if !has_type_declaration(code) {
            issues.push("Missing TypeScript interface or type for props".to_string());
        }
        issues
    }

    fn features(&self, code: &str) -> Vec<String> {
        let checks = [
            ("typed-props", has_type_declaration(code)),
            ("state", code.contains("useState")),
            ("effects", code.contains("useEffect")),
            ("styled", code.contains("className")),
            ("accessible", code.contains("aria-")),
        ];
        checks
            .iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

// ===== Backend =====

pub struct BackendEngineer;

impl BackendEngineer {
    fn requirements<'a>(&self, task: &'a Task) -> AgentResult<&'a BackendRequirements> {
        match &task.requirements {
            TaskRequirements::Backend(req) => Ok(req),
            _ => Err(unsupported(self.specialization(), task)),
        }
    }
}

impl Specialist for BackendEngineer {
    fn specialization(&self) -> Specialization {
        Specialization::Backend
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn prompt(&self, task: &Task) -> AgentResult<Vec<ChatMessage>> {
        let req = self.requirements(task)?;
        Ok(render(
            library::backend_endpoint(),
            &[
                ("method", req.method.to_ascii_uppercase()),
                ("endpoint", req.endpoint.clone()),
                ("framework", req.framework.clone().unwrap_or_else(|| "Express".to_string())),
                ("description", req.description.clone()),
            ],
        ))
    }

    fn artifact(&self, task: &Task) -> AgentResult<Artifact> {
        let req = self.requirements(task)?;
        Ok(Artifact {
            path: format!("src/api/{}.ts", slug(&req.endpoint)),
            language: "typescript",
            category: "api",
        })
    }

    fn validate(&self, code: &str) -> Vec<String> {
        let mut issues = marker_issues(code);
        if !has_export(code) {
            issues.push("Missing export statement".to_string());
        }
        issues
    }

    fn features(&self, code: &str) -> Vec<String> {
        let checks = [
            ("async", code.contains("async ")),
            ("error-handling", code.contains("try") && code.contains("catch")),
            ("validation", code.contains("400")),
            ("auth", code.contains("401") || code.contains("authorization")),
        ];
        checks
            .iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

// ===== Database =====

pub struct DatabaseArchitect;

impl DatabaseArchitect {
    fn requirements<'a>(&self, task: &'a Task) -> AgentResult<&'a DatabaseRequirements> {
        match &task.requirements {
            TaskRequirements::Database(req) => Ok(req),
            _ => Err(unsupported(self.specialization(), task)),
        }
    }
}

impl Specialist for DatabaseArchitect {
    fn specialization(&self) -> Specialization {
        Specialization::Database
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn prompt(&self, task: &Task) -> AgentResult<Vec<ChatMessage>> {
        let req = self.requirements(task)?;
        Ok(render(
            library::database_schema(),
            &[
                ("schema", req.schema_name.clone()),
                ("dialect", req.dialect.clone().unwrap_or_else(|| "PostgreSQL".to_string())),
                ("entities", list_or(&req.entities, "derive from notes")),
                ("description", req.description.clone()),
            ],
        ))
    }

    fn artifact(&self, task: &Task) -> AgentResult<Artifact> {
        let req = self.requirements(task)?;
        Ok(Artifact {
            path: format!("db/schema/{}.sql", req.schema_name),
            language: "sql",
            category: "schema",
        })
    }

    fn validate(&self, code: &str) -> Vec<String> {
        let mut issues = marker_issues(code);
        if !code.to_ascii_uppercase().contains("CREATE TABLE") {
            issues.push("Missing CREATE TABLE statement".to_string());
        }
        issues
    }

    fn features(&self, code: &str) -> Vec<String> {
        let upper = code.to_ascii_uppercase();
        let mut features = vec![format!("tables:{}", upper.matches("CREATE TABLE").count())];
        if upper.contains("CREATE INDEX") || upper.contains("CREATE UNIQUE INDEX") {
            features.push("indexes".to_string());
        }
        if upper.contains("REFERENCES") {
            features.push("foreign-keys".to_string());
        }
        features
    }
}

// ===== Testing =====

pub struct TestEngineer;

impl TestEngineer {
    fn requirements<'a>(&self, task: &'a Task) -> AgentResult<&'a TestingRequirements> {
        match &task.requirements {
            TaskRequirements::Testing(req) => Ok(req),
            _ => Err(unsupported(self.specialization(), task)),
        }
    }
}

impl Specialist for TestEngineer {
    fn specialization(&self) -> Specialization {
        Specialization::Testing
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn prompt(&self, task: &Task) -> AgentResult<Vec<ChatMessage>> {
        let req = self.requirements(task)?;
        Ok(render(
            library::test_suite(),
            &[
                ("framework", req.framework.clone().unwrap_or_else(|| "Vitest".to_string())),
                ("target", req.target.clone()),
                ("description", req.description.clone()),
            ],
        ))
    }

    fn artifact(&self, task: &Task) -> AgentResult<Artifact> {
        let req = self.requirements(task)?;
        Ok(Artifact {
            path: format!("tests/{}.test.ts", slug(&req.target)),
            language: "typescript",
            category: "test",
        })
    }

    fn validate(&self, code: &str) -> Vec<String> {
        let mut issues = marker_issues(code);
        if !(code.contains("describe(") || test_cases(code) > 0) {
            issues.push("No test cases found".to_string());
        }
        issues
    }

    fn features(&self, code: &str) -> Vec<String> {
        let cases = test_cases(code);
        let mut features = vec![format!("cases:{}", cases)];
        if code.contains("mock") {
            features.push("mocks".to_string());
        }
        features
    }
}

static TEST_CASE: OnceLock<Regex> = OnceLock::new();

/// Counts `it(...)` and `test(...)` calls, including `.only`/`.skip` variants
fn test_cases(code: &str) -> usize {
    TEST_CASE
        .get_or_init(|| Regex::new(r"\b(?:it|test)(?:\.(?:only|skip))?\s*\(").expect("test case pattern is valid"))
        .find_iter(code)
        .count()
}
