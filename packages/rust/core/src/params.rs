//! Parameter-cell generation.
//!
//! Turns a set of named values into kernel source (Python literals) that
//! recreates them, and writes that source into a notebook's parameter
//! cell before a run.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use tracing::debug;

use notebox_shared::{NoteboxError, Result};

use crate::cell::Cell;
use crate::notebook::Notebook;

/// First line of a generated parameter cell.
pub const PARAMETER_CELL_HEADER: &str = "# This is autogenerated parameter cell\n";

/// Representation shape that rebuilds a non-builtin value: `[module.]Name(...)`.
static VALID_INIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9_]+[.])?[a-zA-Z0-9_]+\(.*\)").expect("valid regex"));

/// Representation that names its module, e.g. `datetime.date(...)`.
static MODULE_QUALIFIED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+[.].+").expect("valid regex"));

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

/// A value that can be injected into a notebook as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    Tuple(Vec<ParamValue>),
    /// Key/value pairs in insertion order.
    Dict(Vec<(ParamValue, ParamValue)>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    /// Any other kernel object, described by its class and representation.
    Object {
        module: String,
        class: String,
        repr: String,
    },
}

impl ParamValue {
    /// A kernel object built by `repr`, e.g.
    /// `ParamValue::object("decimal", "Decimal", "decimal.Decimal('1.5')")`.
    pub fn object(
        module: impl Into<String>,
        class: impl Into<String>,
        repr: impl Into<String>,
    ) -> Self {
        Self::Object {
            module: module.into(),
            class: class.into(),
            repr: repr.into(),
        }
    }

    /// Guess a value from command-line text: `None`, booleans, integers,
    /// floats, quoted strings, otherwise the text itself.
    pub fn infer(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed {
            "None" | "none" | "null" => return Self::None,
            "True" | "true" => return Self::Bool(true),
            "False" | "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Self::Int(n);
        }
        if let Ok(x) = trimmed.parse::<f64>() {
            if x.is_finite() {
                return Self::Float(x);
            }
        }
        for quote in ['\'', '"'] {
            if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
                return Self::Str(trimmed[1..trimmed.len() - 1].to_string());
            }
        }
        Self::Str(text.to_string())
    }

    /// Module the value's class lives in.
    pub fn module(&self) -> &str {
        match self {
            Self::DateTime(_) | Self::Date(_) => "datetime",
            Self::Object { module, .. } => module,
            _ => "builtins",
        }
    }

    /// Name of the value's class.
    pub fn class_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::Object { class, .. } => class,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.module() == "builtins"
    }

    /// The kernel-language literal that evaluates to this value.
    pub fn repr(&self) -> String {
        match self {
            Self::None => "None".into(),
            Self::Bool(true) => "True".into(),
            Self::Bool(false) => "False".into(),
            Self::Int(n) => n.to_string(),
            Self::Float(x) => float_repr(*x),
            Self::Str(s) => str_repr(s),
            Self::List(items) => format!("[{}]", join_reprs(items)),
            Self::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Self::Tuple(items) => format!("({})", join_reprs(items)),
            Self::Dict(pairs) => {
                let body = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{body}}}")
            }
            Self::DateTime(dt) => {
                let mut repr = format!(
                    "datetime.datetime({}, {}, {}, {}, {}",
                    dt.year(),
                    dt.month(),
                    dt.day(),
                    dt.hour(),
                    dt.minute()
                );
                let micros = dt.nanosecond() / 1_000;
                if dt.second() != 0 || micros != 0 {
                    let _ = write!(repr, ", {}", dt.second());
                }
                if micros != 0 {
                    let _ = write!(repr, ", {micros}");
                }
                repr.push(')');
                repr
            }
            Self::Date(d) => format!("datetime.date({}, {}, {})", d.year(), d.month(), d.day()),
            Self::Object { repr, .. } => repr.clone(),
        }
    }

    /// Import line making this value's class available, if one is needed.
    fn import_line(&self) -> Option<String> {
        if self.is_builtin() {
            return None;
        }
        let repr = self.repr();
        Some(if MODULE_QUALIFIED_RE.is_match(&repr) {
            format!("import {}", self.module())
        } else {
            format!("from {} import {}", self.module(), self.class_name())
        })
    }

    /// Visit this value and every nested value.
    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ParamValue)) {
        visit(self);
        match self {
            Self::List(items) | Self::Tuple(items) => {
                items.iter().for_each(|item| item.walk(visit));
            }
            Self::Dict(pairs) => {
                for (k, v) in pairs {
                    k.walk(visit);
                    v.walk(visit);
                }
            }
            _ => {}
        }
    }
}

fn join_reprs(items: &[ParamValue]) -> String {
    items
        .iter()
        .map(ParamValue::repr)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Python's float repr: shortest round-trip digits, exponent form outside
/// `[1e-4, 1e16)`.
fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "float('nan')".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "float('inf')" } else { "-float('inf')" }.into();
    }

    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{x:e}");
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }

    let plain = x.to_string();
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}

/// Python's str repr: single quotes unless the text contains a single quote
/// and no double quote.
fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

macro_rules! param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value.into())
            }
        })*
    };
}

param_from! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Str,
    &str => Str,
    NaiveDateTime => DateTime,
    NaiveDate => Date,
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Named parameter values in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Parameters::insert`].
    pub fn set(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a parameter. A replaced parameter keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        for (name, value) in entries {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kernel source assigning every parameter, optionally preceded by the
    /// imports its values need.
    pub fn to_source(&self, include_imports: bool) -> Result<String> {
        let mut imports: Vec<String> = Vec::new();
        let mut lines = Vec::with_capacity(self.entries.len());

        for (name, value) in &self.entries {
            if !is_identifier(name) {
                return Err(NoteboxError::InvalidIdentifier { name: name.clone() });
            }

            let mut failure = None;
            value.walk(&mut |v| {
                if failure.is_some() || v.is_builtin() {
                    return;
                }
                let repr = v.repr();
                if !VALID_INIT_RE.is_match(&repr) {
                    failure = Some(repr);
                    return;
                }
                if let Some(line) = v.import_line() {
                    if !imports.contains(&line) {
                        imports.push(line);
                    }
                }
            });
            if let Some(repr) = failure {
                return Err(NoteboxError::NonReproducibleRepr {
                    name: name.clone(),
                    repr,
                });
            }

            lines.push(format!("{name} = {}", value.repr()));
        }

        let code = lines.join("\n");
        if include_imports && !imports.is_empty() {
            Ok(format!("{}\n\n{code}", imports.join("\n")))
        } else {
            Ok(code)
        }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

/// Whether `name` can be assigned to: an identifier that is not a keyword.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !PYTHON_KEYWORDS.contains(&name)
}

impl Cell {
    /// A code cell assigning every parameter.
    pub fn from_parameters(params: &Parameters, include_imports: bool) -> Result<Cell> {
        Ok(Cell::code(params.to_source(include_imports)?))
    }
}

/// Overwrite the first cell tagged `tag` with generated parameter source.
pub fn set_parameters(
    notebook: &mut Notebook,
    params: &Parameters,
    tag: &str,
    include_imports: bool,
) -> Result<()> {
    let source = params.to_source(include_imports)?;

    let Some(cell) = notebook.iter_mut().find(|cell| cell.has_tag(tag)) else {
        return Err(NoteboxError::validation(format!(
            "no cell tagged '{tag}' to receive parameters"
        )));
    };

    cell.overwrite(&source);
    cell.insert(0, PARAMETER_CELL_HEADER);
    debug!(tag, count = params.len(), "parameters written");
    Ok(())
}
