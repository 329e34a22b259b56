//! Extraction and heuristic validation of generated code.

use std::sync::OnceLock;

use regex::Regex;

static FENCE: OnceLock<Regex> = OnceLock::new();
static INLINE_FENCE: OnceLock<Regex> = OnceLock::new();
static EXPORT: OnceLock<Regex> = OnceLock::new();
static TYPE_DECLARATION: OnceLock<Regex> = OnceLock::new();

/// Substrings that mark generated code as unfinished.
pub const DISQUALIFYING_MARKERS: [&str; 3] = ["TODO", "FIXME", "placeholder"];

/// Opening fence at line start with any info string, closing fence at line start
fn fence() -> &'static Regex {
    FENCE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*```[^`\n]*\n([\s\S]*?)^[ \t]*```").expect("fence pattern is valid")
    })
}

/// A whole block on one line: ```code```
fn inline_fence() -> &'static Regex {
    INLINE_FENCE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*```([^\n]*?)```[ \t]*\r?$").expect("inline fence pattern is valid")
    })
}

/// Returns the inner text of the first fenced code block, trimmed, or the
/// whole trimmed response when there is no fence.
pub fn extract_payload(response: &str) -> String {
    let block = fence().captures(response).and_then(|caps| caps.get(1));
    let inline = inline_fence().captures(response).and_then(|caps| caps.get(1));

    let inner = match (block, inline) {
        (Some(b), Some(i)) => Some(if i.start() < b.start() { i } else { b }),
        (b, i) => b.or(i),
    };

    inner
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| response.trim().to_string())
}

/// Issues shared by every specialization.
pub fn marker_issues(code: &str) -> Vec<String> {
    DISQUALIFYING_MARKERS
        .iter()
        .filter(|marker| code.contains(*marker))
        .map(|marker| format!("Contains \"{}\"", marker))
        .collect()
}

pub fn has_export(code: &str) -> bool {
    EXPORT
        .get_or_init(|| Regex::new(r"\bexport\b").expect("export pattern is valid"))
        .is_match(code)
}

pub fn has_type_declaration(code: &str) -> bool {
    TYPE_DECLARATION
        .get_or_init(|| {
            Regex::new(r"\binterface\s+\w+|\btype\s+\w+\s*(<[^>]*>)?\s*=")
                .expect("type declaration pattern is valid")
        })
        .is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_inner_text_of_fence() {
        let response = "Here you go:\n\n```tsx\nexport const A = () => null;\n```\n\nEnjoy.";
        assert_eq!(extract_payload(response), "export const A = () => null;");
    }

    #[test]
    fn extracts_fence_without_language() {
        let response = "```\n  SELECT 1;  \n```";
        let payload = extract_payload(response);

        assert_eq!(payload, "SELECT 1;");
        assert!(!payload.contains("```"));
    }

    #[test]
    fn first_fence_wins() {
        let response = "```js\nfirst\n```\ntext\n```js\nsecond\n```";
        assert_eq!(extract_payload(response), "first");
    }

    #[test]
    fn info_string_with_attributes() {
        let response = "```ts title=\"a.ts\"\nA\n```\nmid\n```ts\nB\n```";
        assert_eq!(extract_payload(response), "A");
    }

    #[test]
    fn prose_between_blocks_is_never_the_payload() {
        let response = "Intro\n```python {linenos=true}\nprint(1)\n```\n\nSome notes here.\n\n```python\nprint(2)\n```";
        assert_eq!(extract_payload(response), "print(1)");
    }

    #[test]
    fn single_line_fence_strips_markers() {
        let payload = extract_payload("```const x = 1;```");
        assert_eq!(payload, "const x = 1;");
        assert!(!payload.contains("```"));
    }

    #[test]
    fn crlf_fences() {
        assert_eq!(extract_payload("```sql\r\nSELECT 1;\r\n```\r\n"), "SELECT 1;");
    }

    #[test]
    fn unfenced_response_is_trimmed() {
        assert_eq!(extract_payload("  plain code\n"), "plain code");
        assert_eq!(extract_payload("plain code"), "plain code");
    }

    #[test]
    fn unterminated_fence_falls_back_to_full_text() {
        let response = "```ts\nexport const x = 1;";
        assert_eq!(extract_payload(response), response);
    }

    #[test]
    fn detects_markers() {
        let issues = marker_issues("// TODO: wire up\n// FIXME later");
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("TODO"));

        assert!(marker_issues("export const done = true;").is_empty());
        assert_eq!(marker_issues("<input placeholder=\"Email\" />").len(), 1);
    }

    #[test]
    fn export_detection_uses_word_boundary() {
        assert!(has_export("export default App;"));
        assert!(!has_export("const exported = 1;"));
    }

    #[test]
    fn type_declaration_detection() {
        assert!(has_type_declaration("interface ButtonProps { label: string }"));
        assert!(has_type_declaration("type Props = { id: number };"));
        assert!(has_type_declaration("export type Result<T> = T | null;"));
        assert!(!has_type_declaration("const props = {};"));
    }
}
