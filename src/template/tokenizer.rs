//! Macro tokenizer
//!
//! Splits raw macro text into literal text and slot markers. A slot is
//! written `:<name><direction><fragment>:`, where both name and direction
//! are optional:
//!
//! ```text
//! :*.txt:            unnamed input, auto-named a, b, c, ...
//! :src<*.fa:         input named "src"
//! :>*.out:           output derived from the only input
//! :src>*.out:        output derived from input "src"
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;

static SLOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":(?P<nametype>\w+[<>]|[<>]|)\s*(?P<fragment>[^:<>\n]+):")
        .expect("slot pattern is valid")
});

/// Direction of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Expanded into one value per job
    Input,
    /// Rendered from an input value
    Output,
}

impl Direction {
    /// Marker character used in macro text
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Input => '<',
            Self::Output => '>',
        }
    }
}

/// A tokenized piece of macro text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Literal text, copied through unchanged
    Literal(String),
    /// A slot marker with its resolved name and raw fragment text
    Slot {
        /// Input or output
        direction: Direction,
        /// Slot name; for outputs this is the input it refers to
        name: String,
        /// Fragment text between the markers (expression plus filters)
        fragment: String,
    },
}

/// Name for the n-th unnamed input (0 -> `a`, 25 -> `z`, 26 -> `aa`)
#[must_use]
pub fn auto_name(mut n: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'a' + u8::try_from(n % 26).unwrap_or(0));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Tokenize raw macro text
///
/// Unnamed outputs are rewritten to name the only input slot; this fails
/// unless exactly one input slot exists.
pub fn tokenize(raw: &str) -> Result<Vec<Piece>, ParseError> {
    let mut pieces = Vec::new();
    let mut upto = 0;
    let mut unnamed = 0;
    let mut inputs: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut has_unnamed_output = false;

    for caps in SLOT.captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };

        if whole.start() > upto {
            pieces.push(Piece::Literal(raw[upto..whole.start()].to_string()));
        }
        upto = whole.end();

        let nametype = caps.name("nametype").map_or("", |m| m.as_str());
        let fragment = caps.name("fragment").map_or("", |m| m.as_str()).to_string();

        let (name, direction) = match nametype {
            "" | "<" => (None, Direction::Input),
            ">" => (None, Direction::Output),
            named => {
                let (name, marker) = named.split_at(named.len() - 1);
                let direction = if marker == ">" { Direction::Output } else { Direction::Input };
                (Some(name.to_string()), direction)
            },
        };

        let name = match (direction, name) {
            (Direction::Input, Some(name)) => name,
            (Direction::Input, None) => {
                let name = auto_name(unnamed);
                unnamed += 1;
                name
            },
            (Direction::Output, Some(name)) => name,
            (Direction::Output, None) => {
                has_unnamed_output = true;
                String::new()
            },
        };

        if direction == Direction::Input {
            if !seen.insert(name.clone()) {
                return Err(ParseError::DuplicateInput(name));
            }
            inputs.push(name.clone());
        }

        pieces.push(Piece::Slot {
            direction,
            name,
            fragment,
        });
    }

    if upto < raw.len() {
        pieces.push(Piece::Literal(raw[upto..].to_string()));
    }

    if has_unnamed_output {
        let [only] = inputs.as_slice() else {
            return Err(ParseError::AmbiguousOutput {
                inputs: inputs.len(),
            });
        };
        for piece in &mut pieces {
            if let Piece::Slot {
                direction: Direction::Output,
                name,
                ..
            } = piece
            {
                if name.is_empty() {
                    name.clone_from(only);
                }
            }
        }
    }

    let unknown = pieces.iter().find_map(|piece| match piece {
        Piece::Slot {
            direction: Direction::Output,
            name,
            ..
        } if !seen.contains(name) => Some(name.clone()),
        _ => None,
    });
    if let Some(name) = unknown {
        return Err(ParseError::UnknownSlotReference(name));
    }

    Ok(pieces)
}
