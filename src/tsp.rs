//! Token stack processor
//!
//! Evaluates a slot expression into an ordered list of [`Atom`]s. The
//! expression is a sequence of tokens; `&` introduces a function token and
//! `;` introduces a value token. The first token is always a value.
//!
//! ```text
//! data/*.txt&glob;test&filter      every data/*.txt containing "test"
//! list.txt&read;raw&tag            tokens of list.txt, tagged "raw"
//! ```
//!
//! Functions operate on the top of the stack:
//!
//! - `glob`: replace the top value with every path matching it
//! - `read`: replace the top value with the whitespace separated tokens of that file
//! - `filter` / `remove`: pop a substring, keep / drop values containing it
//! - `tag`: pop a string and attach it to every remaining value
//! - `input` / `output`: tag every value without popping

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, StackError};

/// Separator introducing a function token
pub const FUNCTION_SEPARATOR: char = '&';

/// Separator introducing a value token
pub const VALUE_SEPARATOR: char = ';';

/// A tagged string value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    value: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
}

impl Atom {
    /// Create an untagged atom
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            tags: BTreeSet::new(),
        }
    }

    /// Create an atom with the same tags as `self` but a different value
    #[must_use]
    pub fn derive(&self, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            tags: self.tags.clone(),
        }
    }

    /// The string value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Attach a tag
    pub fn tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Check for a tag
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// All tags, sorted
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Built-in stack functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Expand the top value as a glob
    Glob,
    /// Replace the top value with the tokens of that file
    Read,
    /// Keep values containing the popped substring
    Filter,
    /// Drop values containing the popped substring
    Remove,
    /// Attach the popped string as a tag
    Tag,
    /// Tag every value as an input
    Input,
    /// Tag every value as an output
    Output,
}

impl Function {
    /// Name as written in expressions
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Glob => "glob",
            Self::Read => "read",
            Self::Filter => "filter",
            Self::Remove => "remove",
            Self::Tag => "tag",
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl std::str::FromStr for Function {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "glob" => Ok(Self::Glob),
            "read" => Ok(Self::Read),
            "filter" => Ok(Self::Filter),
            "remove" => Ok(Self::Remove),
            "tag" => Ok(Self::Tag),
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            other => Err(ParseError::UnknownFunction(other.to_string())),
        }
    }
}

/// One token of a parsed expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Push a value
    Value(String),
    /// Apply a function
    Call(Function),
}

/// Split an expression into tokens
///
/// Unknown function names are rejected here, before anything is evaluated.
pub fn tokenize(expression: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut is_function = false;

    let mut flush = |text: &str, is_function: bool| -> Result<(), ParseError> {
        let text = text.trim();
        if is_function {
            tokens.push(Token::Call(text.parse()?));
        } else if !text.is_empty() {
            tokens.push(Token::Value(text.to_string()));
        }
        Ok(())
    };

    for c in expression.chars() {
        match c {
            FUNCTION_SEPARATOR | VALUE_SEPARATOR => {
                flush(&current, is_function)?;
                current.clear();
                is_function = c == FUNCTION_SEPARATOR;
            },
            _ => current.push(c),
        }
    }
    flush(&current, is_function)?;

    Ok(tokens)
}

/// The value stack being processed
#[derive(Debug, Default)]
pub struct Stack {
    atoms: Vec<Atom>,
}

impl Stack {
    /// Evaluate a tokenized expression on an empty stack
    pub fn evaluate(tokens: &[Token]) -> Result<Self, StackError> {
        let mut stack = Self::default();
        for token in tokens {
            match token {
                Token::Value(v) => stack.atoms.push(Atom::new(v.as_str())),
                Token::Call(f) => stack.apply(*f)?,
            }
        }
        Ok(stack)
    }

    /// Evaluate an expression string
    pub fn run(expression: &str) -> Result<Vec<Atom>, ParseError> {
        let tokens = tokenize(expression)?;
        Ok(Self::evaluate(&tokens)?.into_atoms())
    }

    /// Consume the stack, bottom first
    #[must_use]
    pub fn into_atoms(self) -> Vec<Atom> {
        self.atoms
    }

    fn pop(&mut self, function: Function) -> Result<Atom, StackError> {
        self.atoms.pop().ok_or(StackError::Underflow {
            function: function.name(),
        })
    }

    fn apply(&mut self, function: Function) -> Result<(), StackError> {
        log::debug!("stack function {} on {} value(s)", function.name(), self.atoms.len());
        match function {
            Function::Glob => {
                let top = self.pop(function)?;
                for entry in glob::glob(top.value())? {
                    let path = entry?;
                    self.atoms.push(top.derive(path.to_string_lossy()));
                }
            },
            Function::Read => {
                let top = self.pop(function)?;
                let path = PathBuf::from(top.value());
                let content = fs::read_to_string(&path)
                    .map_err(|source| StackError::Read { path, source })?;
                self.atoms.extend(content.split_whitespace().map(|t| top.derive(t)));
            },
            Function::Filter | Function::Remove => {
                let needle = self.pop(function)?;
                let keep_matches = function == Function::Filter;
                self.atoms.retain(|a| a.value().contains(needle.value()) == keep_matches);
            },
            Function::Tag => {
                let tag = self.pop(function)?;
                for atom in &mut self.atoms {
                    atom.tag(tag.value());
                }
            },
            Function::Input | Function::Output => {
                for atom in &mut self.atoms {
                    atom.tag(function.name());
                }
            },
        }
        Ok(())
    }
}
