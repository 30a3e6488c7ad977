//! Render filters
//!
//! A slot fragment may end in a filter chain, `expr|name|name('arg')|...`.
//! Filters run left to right on the slot's value when a job is rendered.

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::error::{ParseError, RenderError};

/// A render filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Strip directory and trailing extension
    Basename,
    /// Absolute, symlink-resolved path
    Resolve,
    /// Substitute the value for every `%` in a pattern
    Fmt(String),
    /// Rewrite the value from one glob shape to another
    GlobMap {
        /// Source pattern; defaults to the glob the value came from
        from: Option<String>,
        /// Target pattern
        to: String,
    },
    /// Record the value as an input file of the job
    Input,
    /// Record the value as an output file of the job
    Output,
    /// Record the value as a required file that does not take part in the mtime check
    Extra,
}

impl Filter {
    /// Filters that record the value into one of the job's file sets
    #[must_use]
    pub const fn is_file_tag(&self) -> bool {
        matches!(self, Self::Input | Self::Output | Self::Extra)
    }

    fn from_call(name: &str, mut args: Vec<String>) -> Result<Self, ParseError> {
        let given = args.len();
        let arity = |n: usize, f: Self| {
            if given == n {
                Ok(f)
            } else {
                Err(ParseError::InvalidFilterSyntax(format!(
                    "{name} takes {n} argument(s), got {given}"
                )))
            }
        };
        match name {
            "basename" => arity(0, Self::Basename),
            "resolve" => arity(0, Self::Resolve),
            "input" => arity(0, Self::Input),
            "output" => arity(0, Self::Output),
            "extra" => arity(0, Self::Extra),
            "fmt" => {
                if given != 1 {
                    return Err(ParseError::InvalidFilterSyntax(format!(
                        "fmt takes 1 argument, got {given}"
                    )));
                }
                Ok(Self::Fmt(args.remove(0)))
            },
            "globmap" => match given {
                1 => Ok(Self::GlobMap {
                    from: None,
                    to: args.remove(0),
                }),
                2 => {
                    let to = args.remove(1);
                    Ok(Self::GlobMap {
                        from: Some(args.remove(0)),
                        to,
                    })
                },
                n => Err(ParseError::InvalidFilterSyntax(format!(
                    "globmap takes 1 or 2 arguments, got {n}"
                ))),
            },
            other => Err(ParseError::UnknownFilter(other.to_string())),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basename => write!(f, "basename"),
            Self::Resolve => write!(f, "resolve"),
            Self::Fmt(p) => write!(f, "fmt('{p}')"),
            Self::GlobMap { from: None, to } => write!(f, "globmap('{to}')"),
            Self::GlobMap { from: Some(from), to } => write!(f, "globmap('{from}', '{to}')"),
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Extra => write!(f, "extra"),
        }
    }
}

/// Split a slot fragment into its expression and filter chain
///
/// The expression is everything before the first `|`.
pub fn split_fragment(fragment: &str) -> Result<(String, Vec<Filter>), ParseError> {
    match fragment.split_once('|') {
        None => Ok((fragment.trim().to_string(), Vec::new())),
        Some((expr, chain)) => Ok((expr.trim().to_string(), parse_chain(chain)?)),
    }
}

/// Parse a `|` separated filter chain
pub fn parse_chain(chain: &str) -> Result<Vec<Filter>, ParseError> {
    let mut filters = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut current = String::new();

    for c in chain.chars() {
        match (c, quote) {
            ('\'' | '"', None) => quote = Some(c),
            (q, Some(close)) if q == close => quote = None,
            ('(', None) => depth += 1,
            (')', None) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::InvalidFilterSyntax(chain.to_string()))?;
            },
            ('|', None) if depth == 0 => {
                filters.push(parse_call(&current)?);
                current.clear();
                continue;
            },
            _ => {},
        }
        current.push(c);
    }
    if quote.is_some() || depth != 0 {
        return Err(ParseError::InvalidFilterSyntax(chain.to_string()));
    }
    filters.push(parse_call(&current)?);
    Ok(filters)
}

/// Parse a single `name` or `name(arg, ...)` call
fn parse_call(text: &str) -> Result<Filter, ParseError> {
    let text = text.trim();
    let invalid = || ParseError::InvalidFilterSyntax(text.to_string());

    let Some(open) = text.find('(') else {
        if text.is_empty() || !text.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid());
        }
        return Filter::from_call(text, Vec::new());
    };
    let name = text[..open].trim();
    let inner = text[open + 1..].strip_suffix(')').ok_or_else(invalid)?;

    let mut args = Vec::new();
    let mut quote: Option<char> = None;
    let mut current = String::new();
    for c in inner.chars() {
        match (c, quote) {
            ('\'' | '"', None) => quote = Some(c),
            (q, Some(close)) if q == close => quote = None,
            (',', None) => {
                args.push(current.trim().to_string());
                current.clear();
            },
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current.trim().to_string());
    }

    Filter::from_call(name, args)
}

/// Wildcard-or-text segment of a glob pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Wildcard(char),
}

fn segments(pattern: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut upto = 0;
    for (i, c) in pattern.char_indices() {
        if c == '*' || c == '?' {
            out.push(Segment::Text(&pattern[upto..i]));
            out.push(Segment::Wildcard(c));
            upto = i + 1;
        }
    }
    out.push(Segment::Text(&pattern[upto..]));
    out
}

/// Rewrite `value`, which matches glob `from`, into the shape of glob `to`
///
/// Wildcards correspond by position, so both patterns must contain the same
/// wildcards in the same order.
///
/// ```
/// use mus::template::filter::globmap;
///
/// assert_eq!(globmap("seq.fa", "*.fa", "*.txt").unwrap(), "seq.txt");
/// assert_eq!(globmap("seq.1.fa", "*.?.fa", "*.no?.txt").unwrap(), "seq.no1.txt");
/// ```
pub fn globmap(value: &str, from: &str, to: &str) -> Result<String, RenderError> {
    let from_segments = segments(from);
    let to_segments = segments(to);

    let wildcards = |s: &[Segment<'_>]| -> Vec<char> {
        s.iter()
            .filter_map(|seg| match seg {
                Segment::Wildcard(c) => Some(*c),
                Segment::Text(_) => None,
            })
            .collect()
    };
    if wildcards(&from_segments) != wildcards(&to_segments) {
        return Err(RenderError::GlobMismatch {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let mut pattern = String::from("^");
    for seg in &from_segments {
        match seg {
            Segment::Text(t) => pattern.push_str(&regex::escape(t)),
            Segment::Wildcard('*') => pattern.push_str("(.*?)"),
            Segment::Wildcard(_) => pattern.push_str("(.)"),
        }
    }
    pattern.push('$');

    let no_match = || RenderError::NoMatch {
        value: value.to_string(),
        pattern: from.to_string(),
    };
    let re = Regex::new(&pattern).map_err(|_| no_match())?;
    let caps = re.captures(value).ok_or_else(no_match)?;

    let mut group = 1;
    let mut mapped = String::new();
    for seg in &to_segments {
        match seg {
            Segment::Text(t) => mapped.push_str(t),
            Segment::Wildcard(_) => {
                mapped.push_str(caps.get(group).map_or("", |m| m.as_str()));
                group += 1;
            },
        }
    }
    Ok(mapped)
}

/// Strip directory and trailing extension
#[must_use]
pub fn basename(value: &str) -> String {
    Path::new(value)
        .file_stem()
        .map_or_else(|| value.to_string(), |s| s.to_string_lossy().into_owned())
}

/// Absolute path with symlinks resolved where the path exists
pub fn resolve(value: &str) -> Result<String, RenderError> {
    let path = Path::new(value);
    let resolved = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => std::path::absolute(path)?,
    };
    Ok(resolved.to_string_lossy().into_owned())
}

/// Substitute `value` for every `%` in `pattern`
#[must_use]
pub fn substitute(value: &str, pattern: &str) -> String {
    pattern.replace('%', value)
}
