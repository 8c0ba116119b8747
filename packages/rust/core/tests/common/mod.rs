//! A tiny scripted kernel standing in for Jupyter in integration tests.
//!
//! It understands just enough of Python for notebooks written for it:
//! string and integer literals joined with `+`, names, `name = expr`,
//! `print(expr)`, comments, and a bare expression on the last line whose
//! repr becomes the cell's execute_result.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use notebox_core::{ExecutePreprocessor, ExecuteResources, Notebook};
use notebox_shared::{CellExecutionError, CellType, MimeBundle, NoteboxError, Output, Result};

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Int(i64),
}

impl Value {
    fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("'{s}'"),
            Self::Int(i) => i.to_string(),
        }
    }

    fn display(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
        }
    }
}

struct Raised {
    ename: &'static str,
    evalue: String,
}

fn split_terms(expr: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (i, ch) in expr.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, '+') => {
                terms.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&expr[start..]);
    terms
}

fn eval_term(term: &str, env: &HashMap<String, Value>) -> std::result::Result<Value, Raised> {
    let term = term.trim();
    for q in ['\'', '"'] {
        if term.len() >= 2 && term.starts_with(q) && term.ends_with(q) {
            return Ok(Value::Str(term[1..term.len() - 1].to_string()));
        }
    }
    if let Ok(i) = term.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    env.get(term).cloned().ok_or_else(|| Raised {
        ename: "NameError",
        evalue: format!("name '{term}' is not defined"),
    })
}

fn eval(expr: &str, env: &HashMap<String, Value>) -> std::result::Result<Value, Raised> {
    let mut terms = split_terms(expr).into_iter();
    let mut value = eval_term(terms.next().unwrap_or_default(), env)?;
    for term in terms {
        value = match (value, eval_term(term, env)?) {
            (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            _ => {
                return Err(Raised {
                    ename: "TypeError",
                    evalue: "unsupported operand type(s) for +".into(),
                });
            }
        };
    }
    Ok(value)
}

/// Executes notebooks with the scripted language above. Names persist
/// across the cells of one run. Records the resources of every call.
#[derive(Default)]
pub struct ScriptedKernel {
    pub calls: std::cell::RefCell<Vec<ExecuteResources>>,
}

impl ExecutePreprocessor for ScriptedKernel {
    fn preprocess(&self, nb: &mut Notebook, resources: &ExecuteResources) -> Result<()> {
        self.calls.borrow_mut().push(resources.clone());
        let mut env = HashMap::new();
        let mut count = 0;

        for (index, cell) in nb.iter_mut().enumerate() {
            if cell.cell_type() != CellType::Code {
                continue;
            }
            count += 1;
            cell.clear_outputs()?;
            cell.set_execution_count(Some(count))?;

            let lines: Vec<&str> = cell
                .source()
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .collect();
            let mut outputs = Vec::new();
            let mut raised = None;

            for (n, line) in lines.iter().enumerate() {
                let last = n + 1 == lines.len();
                let step = if let Some(arg) = line
                    .strip_prefix("print(")
                    .and_then(|rest| rest.strip_suffix(')'))
                {
                    eval(arg, &env).map(|v| {
                        outputs.push(Output::stream("stdout", format!("{}\n", v.display())));
                    })
                } else if let Some((name, expr)) = line.split_once(" = ") {
                    eval(expr, &env).map(|v| {
                        env.insert(name.trim().to_string(), v);
                    })
                } else {
                    eval(line, &env).map(|v| {
                        if last {
                            let data = MimeBundle::new().with_text("text/plain", v.repr());
                            outputs.push(Output::execute_result(Some(count), data));
                        }
                    })
                };
                if let Err(err) = step {
                    raised = Some(err);
                    break;
                }
            }

            if let Some(err) = raised {
                let traceback = vec![
                    "\u{1b}[0;31m---------------------------------------------------------------------------\u{1b}[0m".to_string(),
                    format!("\u{1b}[0;31m{}\u{1b}[0m: {}", err.ename, err.evalue),
                ];
                outputs.push(Output::error(err.ename, err.evalue.clone(), traceback.clone()));
                cell.set_outputs(outputs)?;
                return Err(NoteboxError::cell_execution(CellExecutionError {
                    cell_index: index,
                    ename: err.ename.into(),
                    evalue: err.evalue,
                    traceback: traceback.join("\n"),
                }));
            }
            cell.set_outputs(outputs)?;
        }
        Ok(())
    }
}

pub fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Copy a fixture into `dir` so tests may modify it.
pub fn fixture_copy(name: &str, dir: &Path) -> std::path::PathBuf {
    let target = dir.join(name);
    std::fs::copy(fixture(name), &target).expect("copy fixture");
    target
}
