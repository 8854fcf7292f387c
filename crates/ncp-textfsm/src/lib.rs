//! A TextFSM-compatible subset for turning CLI text into rows.
//!
//! Templates declare `Value` lines followed by states of `^regex -> Action`
//! rules. Parsing walks the input line by line and emits one row per
//! `Record`, plus an implicit record at end of input unless an `EOF` state is
//! declared.

mod index;

pub use index::{expand_completion, TemplateIndex};

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

pub type Row = Map<String, Value>;

const START_STATE: &str = "Start";
const END_STATE: &str = "End";
const EOF_STATE: &str = "EOF";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("line {line}: invalid regex: {reason}")]
    Regex { line: usize, reason: String },
    #[error("template has no Start state")]
    MissingStart,
    #[error("rule targets unknown state {0}")]
    UnknownState(String),
    #[error("template raised error on input line {line}: {message}")]
    Raised { line: usize, message: String },
    #[error("unknown template {0}")]
    UnknownTemplate(String),
}

#[derive(Debug, Clone, Default)]
struct ValueOptions {
    filldown: bool,
    required: bool,
    list: bool,
}

#[derive(Debug, Clone)]
struct ValueDef {
    name: String,
    pattern: String,
    options: ValueOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineAction {
    Next,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordAction {
    NoRecord,
    Record,
    Clear,
    ClearAll,
}

#[derive(Debug, Clone)]
struct Rule {
    regex: Regex,
    line_action: LineAction,
    record_action: RecordAction,
    new_state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Template {
    values: Vec<ValueDef>,
    states: HashMap<String, Vec<Rule>>,
}

#[derive(Debug, Clone)]
enum Cell {
    Single(String),
    List(Vec<String>),
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Single(value) => value.is_empty(),
            Cell::List(items) => items.is_empty(),
        }
    }

    fn cleared(options: &ValueOptions) -> Self {
        if options.list {
            Cell::List(Vec::new())
        } else {
            Cell::Single(String::new())
        }
    }
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut values: Vec<ValueDef> = Vec::new();
        let mut lines = source.lines().enumerate().peekable();

        while let Some((idx, line)) = lines.peek().copied() {
            if is_comment(line) {
                lines.next();
                continue;
            }
            if line.trim().is_empty() {
                lines.next();
                break;
            }
            let Some(rest) = line.strip_prefix("Value ") else {
                break;
            };
            values.push(parse_value_line(idx + 1, rest)?);
            lines.next();
        }

        let patterns: HashMap<&str, &str> = values
            .iter()
            .map(|value| (value.name.as_str(), value.pattern.as_str()))
            .collect();

        let mut states: HashMap<String, Vec<Rule>> = HashMap::new();
        let mut current: Option<String> = None;
        for (idx, line) in lines {
            if is_comment(line) || line.trim().is_empty() {
                continue;
            }
            if !line.starts_with(char::is_whitespace) {
                let name = line.trim().to_string();
                states.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some(state) = current.as_ref() else {
                return Err(TemplateError::Syntax {
                    line: idx + 1,
                    reason: "rule outside of a state".to_string(),
                });
            };
            let rule = parse_rule(idx + 1, line.trim(), &patterns)?;
            if let Some(rules) = states.get_mut(state) {
                rules.push(rule);
            }
        }

        if !states.contains_key(START_STATE) {
            return Err(TemplateError::MissingStart);
        }
        for rules in states.values() {
            for rule in rules {
                if let Some(target) = &rule.new_state {
                    if target != END_STATE && !states.contains_key(target) {
                        return Err(TemplateError::UnknownState(target.clone()));
                    }
                }
            }
        }

        Ok(Self { values, states })
    }

    pub fn value_names(&self) -> Vec<&str> {
        self.values.iter().map(|value| value.name.as_str()).collect()
    }

    pub fn parse_text(&self, text: &str) -> Result<Vec<Row>, TemplateError> {
        let mut cells: Vec<Cell> = self
            .values
            .iter()
            .map(|value| Cell::cleared(&value.options))
            .collect();
        let mut rows = Vec::new();
        let mut state = START_STATE.to_string();

        'lines: for (idx, line) in text.lines().enumerate() {
            let Some(rules) = self.states.get(&state) else {
                break;
            };
            for rule in rules {
                let Some(captures) = rule.regex.captures(line) else {
                    continue;
                };
                for (pos, value) in self.values.iter().enumerate() {
                    if let Some(found) = captures.name(&value.name) {
                        assign(&mut cells[pos], found.as_str());
                    }
                }
                if let Some(message) = &rule.error {
                    return Err(TemplateError::Raised {
                        line: idx + 1,
                        message: message.clone(),
                    });
                }
                match rule.record_action {
                    RecordAction::Record => self.append_record(&mut cells, &mut rows),
                    RecordAction::Clear => self.clear(&mut cells, false),
                    RecordAction::ClearAll => self.clear(&mut cells, true),
                    RecordAction::NoRecord => {}
                }
                if let Some(target) = &rule.new_state {
                    if target == END_STATE {
                        return Ok(rows);
                    }
                    state = target.clone();
                }
                if rule.line_action == LineAction::Next {
                    continue 'lines;
                }
            }
        }

        if !self.states.contains_key(EOF_STATE) {
            self.append_record(&mut cells, &mut rows);
        }
        Ok(rows)
    }

    fn append_record(&self, cells: &mut [Cell], rows: &mut Vec<Row>) {
        let missing_required = self
            .values
            .iter()
            .zip(cells.iter())
            .any(|(value, cell)| value.options.required && cell.is_empty());
        if missing_required || cells.iter().all(Cell::is_empty) {
            self.clear(cells, false);
            return;
        }

        let mut row = Row::new();
        for (value, cell) in self.values.iter().zip(cells.iter()) {
            let rendered = match cell {
                Cell::Single(text) => Value::String(text.clone()),
                Cell::List(items) => {
                    Value::Array(items.iter().cloned().map(Value::String).collect())
                }
            };
            row.insert(value.name.to_lowercase(), rendered);
        }
        rows.push(row);
        self.clear(cells, false);
    }

    fn clear(&self, cells: &mut [Cell], all: bool) {
        for (value, cell) in self.values.iter().zip(cells.iter_mut()) {
            if all || !value.options.filldown {
                *cell = Cell::cleared(&value.options);
            }
        }
    }
}

fn assign(cell: &mut Cell, found: &str) {
    match cell {
        Cell::Single(value) => *value = found.to_string(),
        Cell::List(items) => items.push(found.to_string()),
    }
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn parse_value_line(line: usize, rest: &str) -> Result<ValueDef, TemplateError> {
    let rest = rest.trim();
    let (first, after) = rest.split_once(char::is_whitespace).ok_or_else(|| {
        TemplateError::Syntax {
            line,
            reason: "expected `Value [Options] NAME (regex)`".to_string(),
        }
    })?;
    let after = after.trim_start();

    let (options, name, pattern) = if after.starts_with('(') {
        ("", first, after)
    } else {
        let (name, pattern) =
            after
                .split_once(char::is_whitespace)
                .ok_or_else(|| TemplateError::Syntax {
                    line,
                    reason: "missing value regex".to_string(),
                })?;
        (first, name, pattern.trim_start())
    };

    if !(pattern.starts_with('(') && pattern.ends_with(')')) {
        return Err(TemplateError::Syntax {
            line,
            reason: format!("value {name} regex must be wrapped in parentheses"),
        });
    }

    let mut parsed = ValueOptions::default();
    for option in options.split(',').filter(|option| !option.is_empty()) {
        match option {
            "Filldown" => parsed.filldown = true,
            "Required" => parsed.required = true,
            "List" => parsed.list = true,
            "Key" | "Fillup" => {}
            other => {
                return Err(TemplateError::Syntax {
                    line,
                    reason: format!("unknown value option {other}"),
                })
            }
        }
    }

    Ok(ValueDef {
        name: name.to_string(),
        pattern: pattern[1..pattern.len() - 1].to_string(),
        options: parsed,
    })
}

fn parse_rule(
    line: usize,
    text: &str,
    patterns: &HashMap<&str, &str>,
) -> Result<Rule, TemplateError> {
    if !text.starts_with('^') {
        return Err(TemplateError::Syntax {
            line,
            reason: "rule must start with ^".to_string(),
        });
    }
    let (match_part, action_part) = match text.rfind(" -> ") {
        Some(pos) => (&text[..pos], Some(text[pos + 4..].trim())),
        None => (text, None),
    };

    let pattern = substitute(line, match_part.trim_end(), patterns)?;
    let regex = Regex::new(&pattern).map_err(|err| TemplateError::Regex {
        line,
        reason: err.to_string(),
    })?;

    let mut rule = Rule {
        regex,
        line_action: LineAction::Next,
        record_action: RecordAction::NoRecord,
        new_state: None,
        error: None,
    };
    let Some(action_part) = action_part else {
        return Ok(rule);
    };

    let (action, remainder) = match action_part.split_once(char::is_whitespace) {
        Some((action, remainder)) => (action, Some(remainder.trim())),
        None => (action_part, None),
    };

    if action == "Error" {
        rule.error = Some(
            remainder
                .map(|message| message.trim_matches('"').to_string())
                .unwrap_or_else(|| "state error".to_string()),
        );
        return Ok(rule);
    }

    let mut target = remainder.map(str::to_string);
    let (line_token, record_token) = match action.split_once('.') {
        Some((line_token, record_token)) => (Some(line_token), Some(record_token)),
        None if is_line_action(action) => (Some(action), None),
        None if is_record_action(action) => (None, Some(action)),
        None => {
            if target.is_some() {
                return Err(TemplateError::Syntax {
                    line,
                    reason: format!("unexpected action {action}"),
                });
            }
            target = Some(action.to_string());
            (None, None)
        }
    };

    if let Some(token) = line_token {
        rule.line_action = match token {
            "Next" => LineAction::Next,
            "Continue" => LineAction::Continue,
            other => {
                return Err(TemplateError::Syntax {
                    line,
                    reason: format!("unknown line action {other}"),
                })
            }
        };
    }
    if let Some(token) = record_token {
        rule.record_action = match token {
            "NoRecord" => RecordAction::NoRecord,
            "Record" => RecordAction::Record,
            "Clear" => RecordAction::Clear,
            "Clearall" => RecordAction::ClearAll,
            other => {
                return Err(TemplateError::Syntax {
                    line,
                    reason: format!("unknown record action {other}"),
                })
            }
        };
    }
    if rule.line_action == LineAction::Continue && target.is_some() {
        return Err(TemplateError::Syntax {
            line,
            reason: "Continue cannot change state".to_string(),
        });
    }
    rule.new_state = target;
    Ok(rule)
}

fn is_line_action(token: &str) -> bool {
    matches!(token, "Next" | "Continue")
}

fn is_record_action(token: &str) -> bool {
    matches!(token, "NoRecord" | "Record" | "Clear" | "Clearall")
}

/// Expands `${NAME}` to a named group and `$$` to a literal `$`.
fn substitute(
    line: usize,
    rule: &str,
    patterns: &HashMap<&str, &str>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(rule.len() * 2);
    let mut rest = rule;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("$$") {
            out.push('$');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("${") {
            let end = after.find('}').ok_or_else(|| TemplateError::Syntax {
                line,
                reason: "unterminated ${".to_string(),
            })?;
            let name = &after[..end];
            let pattern = patterns.get(name).ok_or_else(|| TemplateError::Syntax {
                line,
                reason: format!("undeclared value {name}"),
            })?;
            out.push_str(&format!("(?P<{name}>{pattern})"));
            rest = &after[end + 1..];
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}
