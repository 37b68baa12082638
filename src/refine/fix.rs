//! Deterministic repairs for fixable validator errors
//!
//! Fixes are textual so that comments, key order and formatting of the
//! candidate document survive a repair pass.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::classify::{classify, ErrorKind};
use super::similarity::closest_match;
use crate::schema::TaskDefinition;
use crate::validator::ValidationIssue;

/// Result of one repair pass
#[derive(Debug, Clone, PartialEq)]
pub struct FixPass {
    pub yaml: String,
    /// Human-readable description per applied fix, in application order
    pub fixes: Vec<String>,
}

/// Registered name to put in place of an unresolved `name`. `None` when the
/// name is already registered or nothing in the registry is close enough.
pub fn task_substitute<'a>(name: &str, available_tasks: &'a [TaskDefinition]) -> Option<&'a str> {
    if available_tasks.iter().any(|t| t.name == name) {
        return None;
    }
    closest_match(name, available_tasks.iter().map(|t| t.name.as_str()))
}

/// Whether [`apply_fixes`] has a repair for `issue` against this registry
pub fn is_repairable(issue: &ValidationIssue, available_tasks: &[TaskDefinition]) -> bool {
    match classify(issue) {
        ErrorKind::UnknownTaskRef { name: Some(name) } => {
            task_substitute(&name, available_tasks).is_some()
        }
        kind => kind.is_fixable(),
    }
}

/// Apply a fix for every fixable error in `errors`.
///
/// Errors whose fix would not change the text (no registry candidate, name
/// already correct, nothing to normalize) produce no description.
pub fn apply_fixes(yaml: &str, errors: &[ValidationIssue], available_tasks: &[TaskDefinition]) -> FixPass {
    let mut text = yaml.to_string();
    let mut fixes: Vec<String> = Vec::new();
    let mut normalized = false;

    for issue in errors {
        match classify(issue) {
            ErrorKind::UnknownTaskRef { name: Some(name) } => {
                let Some(replacement) = task_substitute(&name, available_tasks) else {
                    continue;
                };
                if let Some(updated) = replace_task_ref(&text, &name, replacement) {
                    text = updated;
                    push_unique(
                        &mut fixes,
                        format!("Replace taskRef \"{}\" with \"{}\"", name, replacement),
                    );
                }
            }
            ErrorKind::MalformedExpression if !normalized => {
                normalized = true;
                let (updated, changed) = normalize_expressions(&text);
                if changed > 0 {
                    text = updated;
                    push_unique(
                        &mut fixes,
                        format!("Normalize template delimiters on {} line(s)", changed),
                    );
                }
            }
            _ => {}
        }
    }

    FixPass { yaml: text, fixes }
}

fn push_unique(fixes: &mut Vec<String>, fix: String) {
    if !fixes.contains(&fix) {
        fixes.push(fix);
    }
}

// ============================================================================
// TASK REFERENCE SUBSTITUTION
// ============================================================================

/// Rewrite every `taskRef: <from>` value (quoted or bare, block or flow
/// style) to `to`. Returns `None` when nothing matched.
pub fn replace_task_ref(yaml: &str, from: &str, to: &str) -> Option<String> {
    let pattern = format!(
        r#"(?m)(\btaskRef["']?[ \t]*:[ \t]*)(["']?){}(["']?)([ \t]*(?:[,}}\]#]|$))"#,
        regex::escape(from)
    );
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(yaml) {
        return None;
    }
    let replaced = re.replace_all(yaml, |caps: &Captures| {
        format!("{}{}{}{}{}", &caps[1], &caps[2], to, &caps[3], &caps[4])
    });
    Some(replaced.into_owned())
}

// ============================================================================
// EXPRESSION NORMALIZATION
// ============================================================================

static DOLLAR_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{\{").unwrap());
static TRIPLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\{+").unwrap());
static TRIPLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\}\}+").unwrap());
static SPACED_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[ \t]+\{").unwrap());
static SPACED_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}[ \t]+\}").unwrap());
/// `{steps.a.output}}` -> `{{steps.a.output}}`
static SINGLE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^{$])\{([^{}\s][^{}]*)\}\}").unwrap());

/// Best-effort repair of `{{ }}` delimiters. Returns the new text and the
/// number of lines that changed.
pub fn normalize_expressions(yaml: &str) -> (String, usize) {
    let mut changed = 0;
    let lines: Vec<String> = yaml
        .split('\n')
        .map(|line| {
            let fixed = normalize_line(line);
            if fixed != line {
                changed += 1;
            }
            fixed
        })
        .collect();
    (lines.join("\n"), changed)
}

fn normalize_line(line: &str) -> String {
    if !line.contains('{') && !line.contains('}') {
        return line.to_string();
    }

    let mut text = DOLLAR_OPEN.replace_all(line, "{{").into_owned();
    text = TRIPLE_OPEN.replace_all(&text, "{{").into_owned();
    text = TRIPLE_CLOSE.replace_all(&text, "}}").into_owned();
    text = SPACED_OPEN.replace_all(&text, "{{").into_owned();
    text = SPACED_CLOSE.replace_all(&text, "}}").into_owned();
    text = SINGLE_OPEN.replace_all(&text, "${1}{{${2}}}").into_owned();

    if text.matches("{{").count() > text.matches("}}").count() {
        text = close_unterminated(&text);
    }
    text
}

/// Close every `{{ expr` that has no `}}` before the next `{{` or line end.
fn close_unterminated(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 4);
    let mut rest = line;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open + 2]);
        rest = &rest[open + 2..];

        let next_open = rest.find("{{").unwrap_or(rest.len());
        if rest[..next_open].contains("}}") {
            let close = rest.find("}}").map(|c| c + 2).unwrap_or(next_open);
            out.push_str(&rest[..close]);
            rest = &rest[close..];
            continue;
        }

        // Expression runs until whitespace after content, a quote, or a brace
        let leading = rest.len() - rest.trim_start_matches(|c: char| c == ' ' || c == '\t').len();
        let body = &rest[leading..];
        let expr_len = body
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '{' | '}' | ','))
            .unwrap_or(body.len());

        out.push_str(&rest[..leading + expr_len]);
        rest = &rest[leading + expr_len..];

        // A lone `}` right after the expression becomes `}}`
        let trimmed = rest.trim_start_matches(|c: char| c == ' ' || c == '\t');
        if trimmed.starts_with('}') {
            let skipped = rest.len() - trimmed.len();
            out.push_str(&rest[..skipped]);
            out.push_str("}}");
            rest = &trimmed[1..];
        } else if leading > 0 {
            out.push_str(" }}");
        } else {
            out.push_str("}}");
        }
    }

    out.push_str(rest);
    out
}
