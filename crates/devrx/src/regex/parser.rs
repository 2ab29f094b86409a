// Regex pattern parser
// Parses a pattern string into a syntax tree for the program compiler

use super::class::{CharClass, SetItem};
use super::flags::CaptureGroups;
use super::limits::{MAX_NESTING, MAX_REPEAT};
use crate::error::PreconditionKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Matches the empty string, e.g. one side of `a|`
    Empty,
    /// Literal character
    Char(char),
    /// Any character (.)
    Dot,
    /// Character set ([abc], [^abc], \d, \W, ...)
    Set { items: Vec<SetItem>, negated: bool },
    /// Zero-width assertion
    Assert(AssertKind),
    /// Parenthesized group; `index` is `None` for non-capturing groups
    Group { index: Option<usize>, node: Box<Node> },
    Concat(Vec<Node>),
    Alternate(Vec<Node>),
    /// Repetition (*, +, ?, {n,m}) with `max == None` meaning unbounded
    Repeat {
        node: Box<Node>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertKind {
    Caret,           // ^
    Dollar,          // $
    TextStart,       // \A
    TextEnd,         // \Z
    WordBoundary,    // \b
    NotWordBoundary, // \B
}

/// Syntax error reported by the parser or the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub kind: PreconditionKind,
    pub message: String,
}

impl PatternError {
    pub fn new(kind: PreconditionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct ParsedPattern {
    pub root: Node,
    /// Capture groups recognized under the capture mode
    pub groups: usize,
}

/// Parse a regex pattern.
pub fn parse_pattern(pattern: &str, capture: CaptureGroups) -> Result<ParsedPattern, PatternError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut parser = Parser {
        chars: &chars,
        pos: 0,
        capture,
        groups: 0,
        depth: 0,
    };
    let root = parser.parse_alternation()?;
    if parser.pos < chars.len() {
        // only a stray ')' stops the top-level alternation early
        return Err(parser.error("unmatched ')'"));
    }
    Ok(ParsedPattern {
        root,
        groups: parser.groups,
    })
}

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
    capture: CaptureGroups,
    groups: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Quote the pattern text around the current position.
    fn fragment(&self, at: usize) -> String {
        let start = at.min(self.chars.len());
        let end = (start + 8).min(self.chars.len());
        self.chars[start..end].iter().collect()
    }

    fn error_at(&self, kind: PreconditionKind, at: usize, msg: &str) -> PatternError {
        PatternError::new(kind, format!("{} at position {} near '{}'", msg, at, self.fragment(at)))
    }

    fn error(&self, msg: &str) -> PatternError {
        self.error_at(PreconditionKind::InvalidArgument, self.pos, msg)
    }

    fn parse_alternation(&mut self) -> Result<Node, PatternError> {
        let mut branches = vec![self.parse_concat()?];
        while self.peek() == Some('|') {
            self.pos += 1;
            branches.push(self.parse_concat()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap_or(Node::Empty))
        } else {
            Ok(Node::Alternate(branches))
        }
    }

    fn parse_concat(&mut self) -> Result<Node, PatternError> {
        let mut seq = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let atom = self.parse_atom()?;
            let node = self.parse_quantifier(atom)?;
            seq.push(node);
        }
        match seq.len() {
            0 => Ok(Node::Empty),
            1 => Ok(seq.pop().unwrap_or(Node::Empty)),
            _ => Ok(Node::Concat(seq)),
        }
    }

    fn parse_atom(&mut self) -> Result<Node, PatternError> {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Err(self.error("unexpected end of pattern"));
        };
        match c {
            '(' => self.parse_group(),
            '[' => self.parse_set(),
            '.' => {
                self.pos += 1;
                Ok(Node::Dot)
            }
            '^' => {
                self.pos += 1;
                Ok(Node::Assert(AssertKind::Caret))
            }
            '$' => {
                self.pos += 1;
                Ok(Node::Assert(AssertKind::Dollar))
            }
            '\\' => self.parse_escape(),
            '*' | '+' | '?' => Err(self.error("nothing to repeat")),
            '{' if self.counted_quantifier()?.is_some() => Err(self.error("nothing to repeat")),
            _ => {
                // includes a '{' that does not start a counted quantifier
                self.pos = start + 1;
                Ok(Node::Char(c))
            }
        }
    }

    fn parse_group(&mut self) -> Result<Node, PatternError> {
        let open = self.pos;
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_at(PreconditionKind::OutOfRange, open, "groups nested too deeply"));
        }
        self.pos += 1; // skip '('

        let mut capturing = self.capture == CaptureGroups::Extract;
        if self.peek() == Some('?') {
            if self.peek_at(1) == Some(':') {
                capturing = false;
                self.pos += 2;
            } else {
                let construct: String = self.chars[open..(open + 3).min(self.chars.len())].iter().collect();
                return Err(self.error_at(
                    PreconditionKind::Unsupported,
                    open,
                    &format!("unsupported group construct '{}'", construct),
                ));
            }
        }

        // numbered by opening parenthesis, before any nested group
        let index = if capturing {
            self.groups += 1;
            Some(self.groups)
        } else {
            None
        };

        let inner = self.parse_alternation()?;
        if self.peek() != Some(')') {
            return Err(self.error_at(PreconditionKind::InvalidArgument, open, "missing ')'"));
        }
        self.pos += 1;
        self.depth -= 1;
        Ok(Node::Group {
            index,
            node: Box::new(inner),
        })
    }

    fn parse_quantifier(&mut self, atom: Node) -> Result<Node, PatternError> {
        let (min, max, len) = match self.peek() {
            Some('*') => (0, None, 1),
            Some('+') => (1, None, 1),
            Some('?') => (0, Some(1), 1),
            Some('{') => match self.counted_quantifier()? {
                Some(counted) => counted,
                None => return Ok(atom),
            },
            _ => return Ok(atom),
        };
        if matches!(atom, Node::Assert(_)) {
            return Err(self.error("nothing to repeat"));
        }
        self.pos += len;

        let greedy = if self.peek() == Some('?') {
            self.pos += 1;
            false
        } else {
            true
        };

        match self.peek() {
            Some('*' | '+' | '?') => return Err(self.error("multiple repeat")),
            Some('{') if self.counted_quantifier()?.is_some() => return Err(self.error("multiple repeat")),
            _ => {}
        }

        Ok(Node::Repeat {
            node: Box::new(atom),
            min,
            max,
            greedy,
        })
    }

    /// Recognize `{n}`, `{n,}`, `{,m}` or `{n,m}` at the current position
    /// without consuming it. Returns `(min, max, length)`, or `None` when the
    /// brace is a literal.
    fn counted_quantifier(&self) -> Result<Option<(u32, Option<u32>, usize)>, PatternError> {
        let mut i = self.pos + 1;
        let min_start = i;
        while self.chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        let min_digits = &self.chars[min_start..i];

        let (max_digits, has_comma) = if self.chars.get(i) == Some(&',') {
            i += 1;
            let max_start = i;
            while self.chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            (&self.chars[max_start..i], true)
        } else {
            (&self.chars[i..i], false)
        };

        if self.chars.get(i) != Some(&'}') || (min_digits.is_empty() && max_digits.is_empty()) {
            return Ok(None);
        }
        let len = i + 1 - self.pos;

        let min = if min_digits.is_empty() {
            0
        } else {
            self.repeat_count(min_digits)?
        };
        let max = if !has_comma {
            Some(min)
        } else if max_digits.is_empty() {
            None
        } else {
            Some(self.repeat_count(max_digits)?)
        };

        if let Some(max) = max
            && min > max
        {
            return Err(self.error("min repeat greater than max repeat"));
        }
        Ok(Some((min, max, len)))
    }

    fn repeat_count(&self, digits: &[char]) -> Result<u32, PatternError> {
        let mut value: u32 = 0;
        for d in digits {
            value = value
                .saturating_mul(10)
                .saturating_add(d.to_digit(10).unwrap_or(0));
        }
        if value > MAX_REPEAT {
            return Err(self.error_at(
                PreconditionKind::OutOfRange,
                self.pos,
                &format!("repeat count {} exceeds {}", value, MAX_REPEAT),
            ));
        }
        Ok(value)
    }

    fn parse_escape(&mut self) -> Result<Node, PatternError> {
        let start = self.pos;
        self.pos += 1; // skip '\'
        let Some(c) = self.peek() else {
            return Err(self.error_at(PreconditionKind::InvalidArgument, start, "trailing backslash"));
        };
        if let Some((class, negated)) = shorthand_class(c) {
            self.pos += 1;
            return Ok(Node::Set {
                items: vec![SetItem::Class(class)],
                negated,
            });
        }
        let assert = match c {
            'b' => Some(AssertKind::WordBoundary),
            'B' => Some(AssertKind::NotWordBoundary),
            'A' => Some(AssertKind::TextStart),
            'Z' | 'z' => Some(AssertKind::TextEnd),
            _ => None,
        };
        if let Some(kind) = assert {
            self.pos += 1;
            return Ok(Node::Assert(kind));
        }
        if ('1'..='9').contains(&c) {
            return Err(self.error_at(PreconditionKind::Unsupported, start, "backreferences are not supported"));
        }
        self.parse_escaped_char(start, false).map(Node::Char)
    }

    /// Decode the escape whose backslash is at `start`; `pos` is just past it.
    fn parse_escaped_char(&mut self, start: usize, in_set: bool) -> Result<char, PatternError> {
        let Some(c) = self.peek() else {
            return Err(self.error_at(PreconditionKind::InvalidArgument, start, "trailing backslash"));
        };
        self.pos += 1;
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'f' => '\x0c',
            'v' => '\x0b',
            'a' => '\x07',
            'e' => '\x1b',
            'b' if in_set => '\x08',
            '0' => {
                // up to two more octal digits
                let mut value = 0u32;
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                char::from_u32(value).unwrap_or('\0')
            }
            'x' => self.parse_hex(start, 2)?,
            'u' => self.parse_hex(start, 4)?,
            c if c.is_ascii_alphanumeric() => {
                return Err(self.error_at(
                    PreconditionKind::InvalidArgument,
                    start,
                    &format!("bad escape '\\{}'", c),
                ));
            }
            c => c,
        };
        Ok(decoded)
    }

    fn parse_hex(&mut self, start: usize, digits: usize) -> Result<char, PatternError> {
        let mut value = 0u32;
        for _ in 0..digits {
            let Some(d) = self.peek().and_then(|d| d.to_digit(16)) else {
                return Err(self.error_at(PreconditionKind::InvalidArgument, start, "incomplete hex escape"));
            };
            value = value * 16 + d;
            self.pos += 1;
        }
        char::from_u32(value)
            .ok_or_else(|| self.error_at(PreconditionKind::InvalidArgument, start, "invalid code point"))
    }

    fn parse_set(&mut self) -> Result<Node, PatternError> {
        let open = self.pos;
        self.pos += 1; // skip '['
        let negated = self.peek() == Some('^');
        if negated {
            self.pos += 1;
        }

        let mut items = Vec::new();
        // ']' as first char in set is literal
        if self.peek() == Some(']') {
            items.push(SetItem::Char(']'));
            self.pos += 1;
        }

        loop {
            let Some(c) = self.peek() else {
                return Err(self.error_at(PreconditionKind::InvalidArgument, open, "missing ']'"));
            };
            if c == ']' {
                self.pos += 1;
                break;
            }

            let first = self.parse_set_atom()?;
            let SetItem::Char(lo) = first else {
                items.push(first);
                continue;
            };

            // Range: a-z
            if self.peek() == Some('-') && self.peek_at(1).is_some_and(|n| n != ']') {
                let dash = self.pos;
                self.pos += 1;
                let SetItem::Char(hi) = self.parse_set_atom()? else {
                    return Err(self.error_at(PreconditionKind::InvalidArgument, dash, "bad character range"));
                };
                if lo > hi {
                    return Err(self.error_at(
                        PreconditionKind::InvalidArgument,
                        dash,
                        &format!("bad character range {}-{}", lo, hi),
                    ));
                }
                items.push(SetItem::Range(lo, hi));
            } else {
                items.push(SetItem::Char(lo));
            }
        }

        Ok(Node::Set { items, negated })
    }

    fn parse_set_atom(&mut self) -> Result<SetItem, PatternError> {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Err(self.error_at(PreconditionKind::InvalidArgument, start, "missing ']'"));
        };
        self.pos += 1;
        if c != '\\' {
            return Ok(SetItem::Char(c));
        }
        if let Some((class, negated)) = self.peek().and_then(shorthand_class) {
            self.pos += 1;
            return Ok(if negated {
                SetItem::InvertedClass(class)
            } else {
                SetItem::Class(class)
            });
        }
        if self.peek().is_some_and(|d| ('1'..='9').contains(&d)) {
            return Err(self.error_at(PreconditionKind::Unsupported, start, "backreferences are not supported"));
        }
        self.parse_escaped_char(start, true).map(SetItem::Char)
    }
}

fn shorthand_class(c: char) -> Option<(CharClass, bool)> {
    match c {
        'd' => Some((CharClass::Digit, false)),
        'D' => Some((CharClass::Digit, true)),
        'w' => Some((CharClass::Word, false)),
        'W' => Some((CharClass::Word, true)),
        's' => Some((CharClass::Space, false)),
        'S' => Some((CharClass::Space, true)),
        _ => None,
    }
}
