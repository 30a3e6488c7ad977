//! Command templates
//!
//! A [`Template`] is parsed from raw macro text once and then expanded into
//! [`Binding`]s, one per job. Each binding is rendered back into a command
//! line with [`Template::render`], which also records the job's input,
//! output and extra files.
//!
//! ```
//! use mus::template::Template;
//!
//! let template = Template::parse("echo :range(0,3): :x<range(1,3):").unwrap();
//! let lines: Vec<String> = template
//!     .expand()
//!     .unwrap()
//!     .map(|b| template.render_plain(&b).unwrap())
//!     .collect();
//! assert_eq!(lines, ["echo 0 1", "echo 0 2", "echo 1 1", "echo 1 2", "echo 2 1", "echo 2 2"]);
//! ```

pub mod filter;
pub mod tokenizer;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{ParseError, RenderError};
use crate::job::{FileTag, Job};
use crate::tsp::{self, Atom, Function, Stack, Token};

pub use filter::Filter;
pub use tokenizer::Direction;

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*range\(\s*(-?\d+)\s*(?:,\s*(-?\d+)\s*)?(?:,\s*(-?\d+)\s*)?\)\s*$")
        .expect("range pattern is valid")
});

/// A parsed placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Input or output
    pub direction: Direction,
    /// Input name; for outputs the input this slot is rendered from
    pub name: String,
    /// Expression before the filter chain
    pub expression: String,
    /// Declared filters, applied left to right
    pub filters: Vec<Filter>,
}

impl Slot {
    /// Filters as applied at render time
    ///
    /// A slot without a file tag in its chain is tagged by direction, so
    /// each slot use lands in exactly one file set.
    #[must_use]
    pub fn effective_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::with_capacity(self.filters.len() + 1);
        if !self.filters.iter().any(Filter::is_file_tag) {
            filters.push(match self.direction {
                Direction::Input => Filter::Input,
                Direction::Output => Filter::Output,
            });
        }
        filters.extend(self.filters.iter().cloned());
        filters
    }

    fn has_wildcard(&self) -> bool {
        self.expression.contains(['*', '?'])
    }
}

/// One fragment of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Literal text
    Literal(String),
    /// A slot
    Slot(Slot),
}

/// A value bound to an input slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotValue {
    /// The expanded value with its tags
    pub atom: Atom,
    /// Glob pattern the value was matched by, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
}

/// One assignment of a value to every input slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    values: Vec<(String, SlotValue)>,
}

impl Binding {
    /// Value bound to the input slot `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SlotValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Values in slot declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// True for the singleton binding of a template without input slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Candidate values of one input slot
///
/// Ranges are kept as bounds and produce their values on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// Values produced by the token stack processor
    Values(Vec<SlotValue>),
    /// An integer range from `range(...)`
    Range(IntRange),
}

impl Candidates {
    /// Number of values
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Values(values) => values.len(),
            Self::Range(range) => range.len(),
        }
    }

    /// True when the slot has no values, so the template yields no jobs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th value
    #[must_use]
    pub fn get(&self, index: usize) -> Option<SlotValue> {
        match self {
            Self::Values(values) => values.get(index).cloned(),
            Self::Range(range) => range.get(index).map(|n| SlotValue {
                atom: Atom::new(n.to_string()),
                glob: None,
            }),
        }
    }
}

/// Half-open integer range with a non-zero step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    start: i64,
    step: i64,
    len: usize,
}

impl IntRange {
    /// Range from `start` towards `stop` (exclusive); `None` for a zero step
    #[must_use]
    pub fn new(start: i64, stop: i64, step: i64) -> Option<Self> {
        if step == 0 {
            return None;
        }
        let span = if step > 0 {
            i128::from(stop) - i128::from(start)
        } else {
            i128::from(start) - i128::from(stop)
        };
        let stride = i128::from(step).abs();
        let len = if span <= 0 { 0 } else { (span + stride - 1) / stride };
        Some(Self {
            start,
            step,
            len: usize::try_from(len).unwrap_or(usize::MAX),
        })
    }

    /// Number of values
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when the range is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The `index`-th value
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len {
            return None;
        }
        let offset = i128::from(u64::try_from(index).ok()?) * i128::from(self.step);
        i64::try_from(i128::from(self.start) + offset).ok()
    }

    /// Every value in order
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len).map_while(|i| self.get(i))
    }
}

/// Cartesian product over the expanded input slots
///
/// Yields bindings in lexicographic slot order: the last declared slot varies
/// fastest. A template without input slots yields one empty binding.
#[derive(Debug)]
pub struct Bindings {
    slots: Vec<(String, Candidates)>,
    cursor: Option<Vec<usize>>,
}

impl Bindings {
    fn new(slots: Vec<(String, Candidates)>) -> Self {
        let cursor = if slots.iter().any(|(_, values)| values.is_empty()) {
            None
        } else {
            Some(vec![0; slots.len()])
        };
        Self { slots, cursor }
    }

    /// Number of bindings still to come
    #[must_use]
    pub fn remaining(&self) -> usize {
        let Some(cursor) = &self.cursor else { return 0 };
        let mut remaining = 0usize;
        for ((_, values), &i) in self.slots.iter().zip(cursor) {
            remaining = remaining.saturating_mul(values.len()).saturating_add(values.len() - i - 1);
        }
        remaining.saturating_add(1)
    }
}

impl Iterator for Bindings {
    type Item = Binding;

    fn next(&mut self) -> Option<Binding> {
        let cursor = self.cursor.as_mut()?;
        let values = self
            .slots
            .iter()
            .zip(cursor.iter())
            .map(|((name, values), &i)| Some((name.clone(), values.get(i)?)))
            .collect::<Option<Vec<_>>>()?;

        let mut done = true;
        for (pos, (_, values)) in self.slots.iter().enumerate().rev() {
            cursor[pos] += 1;
            if cursor[pos] < values.len() {
                done = false;
                break;
            }
            cursor[pos] = 0;
        }
        if done {
            self.cursor = None;
        }
        Some(Binding { values })
    }
}

/// A parsed command template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    fragments: Vec<Fragment>,
}

impl Template {
    /// Parse raw macro text
    ///
    /// Every slot expression and filter chain is checked here, so an unknown
    /// stack function or filter fails before any job exists.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut fragments = Vec::new();
        for piece in tokenizer::tokenize(raw)? {
            match piece {
                tokenizer::Piece::Literal(text) => fragments.push(Fragment::Literal(text)),
                tokenizer::Piece::Slot {
                    direction,
                    name,
                    fragment,
                } => {
                    let (expression, filters) = filter::split_fragment(&fragment)?;
                    if direction == Direction::Input {
                        check_expression(&expression)?;
                    }
                    fragments.push(Fragment::Slot(Slot {
                        direction,
                        name,
                        expression,
                        filters,
                    }));
                },
            }
        }
        log::debug!("parsed template with {} fragment(s)", fragments.len());
        Ok(Self {
            raw: raw.to_string(),
            fragments,
        })
    }

    /// The raw text the template was parsed from
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed fragments in order
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Input slots in declaration order
    pub fn inputs(&self) -> impl Iterator<Item = &Slot> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Slot(slot) if slot.direction == Direction::Input => Some(slot),
            _ => None,
        })
    }

    /// True when the template has no input slots and yields a single job
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.inputs().next().is_none()
    }

    /// Expand every input slot and return the product of their values
    pub fn expand(&self) -> Result<Bindings, ParseError> {
        let mut slots = Vec::new();
        for slot in self.inputs() {
            let values = expand_expression(&slot.expression)?;
            log::debug!("slot '{}' expands to {} value(s)", slot.name, values.len());
            slots.push((slot.name.clone(), values));
        }
        Ok(Bindings::new(slots))
    }

    /// Render a binding into a command line, tagging files on `job`
    pub fn render(&self, binding: &Binding, job: &mut Job) -> Result<String, RenderError> {
        self.render_with(binding, &mut Some(job))
    }

    /// Render a binding without recording any files
    pub fn render_plain(&self, binding: &Binding) -> Result<String, RenderError> {
        self.render_with(binding, &mut None)
    }

    fn render_with(&self, binding: &Binding, job: &mut Option<&mut Job>) -> Result<String, RenderError> {
        let mut line = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(text) => line.push_str(text),
                Fragment::Slot(slot) => {
                    let bound = binding
                        .get(&slot.name)
                        .ok_or_else(|| RenderError::Unbound(slot.name.clone()))?;
                    let rendered = render_slot(slot, bound, job)?;
                    if slot.direction == Direction::Input {
                        if let Some(job) = job.as_deref_mut() {
                            job.rendered.entry(slot.name.clone()).or_insert_with(|| rendered.clone());
                        }
                    }
                    line.push_str(&rendered);
                },
            }
        }
        Ok(line)
    }

    /// One line per fragment describing how it is handled
    #[must_use]
    pub fn explain(&self) -> Vec<String> {
        self.fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Literal(text) => format!("Text   : '{text}'"),
                Fragment::Slot(slot) => {
                    let filters: Vec<String> = slot.effective_filters().iter().map(ToString::to_string).collect();
                    let kind = match slot.direction {
                        Direction::Input => "Input ",
                        Direction::Output => "Output",
                    };
                    format!("{kind} : {} '{}' | {}", slot.name, slot.expression, filters.join(" | "))
                },
            })
            .collect()
    }

    /// Canonical filter syntax of the whole template
    ///
    /// Slots are written `{{ name|filter|... }}`; output slots with a
    /// wildcard start with the implied `globmap`.
    #[must_use]
    pub fn render_syntax(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(text) => f.write_str(text)?,
                Fragment::Slot(slot) => {
                    write!(f, "{{{{ {}", slot.name)?;
                    if slot.direction == Direction::Output {
                        if slot.has_wildcard() {
                            write!(f, "|globmap('{}')", slot.expression)?;
                        } else {
                            write!(f, "|fmt('{}')", slot.expression)?;
                        }
                    }
                    for filter in slot.effective_filters() {
                        write!(f, "|{filter}")?;
                    }
                    write!(f, " }}}}")?;
                },
            }
        }
        Ok(())
    }
}

fn render_slot(slot: &Slot, bound: &SlotValue, job: &mut Option<&mut Job>) -> Result<String, RenderError> {
    let (mut value, mut glob) = match slot.direction {
        Direction::Input => (bound.atom.value().to_string(), bound.glob.clone()),
        Direction::Output if slot.has_wildcard() => {
            let from = bound.glob.as_deref().ok_or(RenderError::MissingArgument("globmap"))?;
            let mapped = filter::globmap(bound.atom.value(), from, &slot.expression)?;
            (mapped, Some(slot.expression.clone()))
        },
        Direction::Output => (filter::substitute(bound.atom.value(), &slot.expression), None),
    };

    for f in slot.effective_filters() {
        match f {
            Filter::Basename => value = filter::basename(&value),
            Filter::Resolve => value = filter::resolve(&value)?,
            Filter::Fmt(pattern) => value = filter::substitute(&value, &pattern),
            Filter::GlobMap { from, to } => {
                let from = from
                    .or_else(|| glob.clone())
                    .ok_or(RenderError::MissingArgument("globmap"))?;
                value = filter::globmap(&value, &from, &to)?;
                glob = Some(to);
            },
            Filter::Input => tag_file(job, FileTag::Input, &value),
            Filter::Output => tag_file(job, FileTag::Output, &value),
            Filter::Extra => tag_file(job, FileTag::Extra, &value),
        }
    }
    Ok(value)
}

fn tag_file(job: &mut Option<&mut Job>, tag: FileTag, value: &str) {
    if let Some(job) = job.as_deref_mut() {
        job.tag_file(tag, value);
    }
}

/// Parsed `range(a[,b[,c]])` shorthand
fn parse_range(expression: &str) -> Result<Option<IntRange>, ParseError> {
    if !expression.trim_start().starts_with("range(") {
        return Ok(None);
    }
    let invalid = || ParseError::InvalidRange(expression.trim().to_string());
    let caps = RANGE.captures(expression).ok_or_else(invalid)?;
    let numbers: Vec<i64> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().parse::<i64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;

    let (start, stop, step) = match numbers.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(invalid()),
    };
    IntRange::new(start, stop, step).map(Some).ok_or_else(invalid)
}

/// Expression as handed to the stack processor, with shorthands applied
fn stack_expression(expression: &str) -> String {
    let plain = !expression.contains([tsp::FUNCTION_SEPARATOR, tsp::VALUE_SEPARATOR]);
    if plain && expression.contains(['*', '?']) {
        format!("{expression}{}glob", tsp::FUNCTION_SEPARATOR)
    } else {
        expression.to_string()
    }
}

fn check_expression(expression: &str) -> Result<(), ParseError> {
    if parse_range(expression)?.is_none() {
        tsp::tokenize(&stack_expression(expression))?;
    }
    Ok(())
}

/// Pattern of the first value that is globbed
fn glob_source(tokens: &[Token]) -> Option<String> {
    tokens.windows(2).find_map(|pair| match pair {
        [Token::Value(v), Token::Call(Function::Glob)] => Some(v.clone()),
        _ => None,
    })
}

/// Expand one input slot expression into its candidate values
pub fn expand_expression(expression: &str) -> Result<Candidates, ParseError> {
    if let Some(range) = parse_range(expression)? {
        return Ok(Candidates::Range(range));
    }

    let tokens = tsp::tokenize(&stack_expression(expression))?;
    let glob = glob_source(&tokens);
    Ok(Candidates::Values(
        Stack::evaluate(&tokens)?
            .into_atoms()
            .into_iter()
            .map(|atom| SlotValue {
                atom,
                glob: glob.clone(),
            })
            .collect(),
    ))
}
