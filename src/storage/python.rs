//! Python literal reader
//!
//! Reads the subset of Python literal syntax a template file uses for its
//! `FIELD_ZONES` table and class attributes: dicts, tuples, lists, strings
//! (raw or escaped, single or triple quoted), numbers, `True`, `False` and
//! `None`. Nothing is evaluated.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PyParseError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("invalid number '{0}' at position {1}")]
    InvalidNumber(String, usize),

    #[error("unsupported name '{0}' at position {1}")]
    UnsupportedName(String, usize),

    #[error("'{0}' not found")]
    MissingAssignment(String),
}

/// A parsed literal
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Str(String),
    Num(f64),
    Bool(bool),
    None,
    /// Tuples and lists
    Seq(Vec<PyValue>),
    /// Entries in source order
    Dict(Vec<(PyValue, PyValue)>),
}

impl PyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// A two-number tuple or list
    pub fn as_pair(&self) -> Option<(f64, f64)> {
        match self {
            PyValue::Seq(items) => match items.as_slice() {
                [PyValue::Num(a), PyValue::Num(b)] => Some((*a, *b)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Value of a string key in a dict
    pub fn get(&self, key: &str) -> Option<&PyValue> {
        match self {
            PyValue::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, pos: usize) -> Self {
        Self { input, pos }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    /// Whitespace, newlines and `#` comments
    fn skip_blank(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), PyParseError> {
        self.skip_blank();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(PyParseError::UnexpectedChar(ch, self.pos)),
            None => Err(PyParseError::UnexpectedEnd),
        }
    }

    fn parse_value(&mut self) -> Result<PyValue, PyParseError> {
        self.skip_blank();
        let ch = self.peek().ok_or(PyParseError::UnexpectedEnd)?;
        match ch {
            '{' => self.parse_dict(),
            '(' => self.parse_seq(')'),
            '[' => self.parse_seq(']'),
            '\'' | '"' => self.parse_string(false),
            'r' | 'R' if matches!(self.input[self.pos + 1..].chars().next(), Some('\'' | '"')) => {
                self.advance();
                self.parse_string(true)
            }
            '-' | '+' | '.' | '0'..='9' => self.parse_number(),
            c if c.is_alphabetic() || c == '_' => self.parse_name(),
            c => Err(PyParseError::UnexpectedChar(c, self.pos)),
        }
    }

    fn parse_name(&mut self) -> Result<PyValue, PyParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        match &self.input[start..self.pos] {
            "True" => Ok(PyValue::Bool(true)),
            "False" => Ok(PyValue::Bool(false)),
            "None" => Ok(PyValue::None),
            other => Err(PyParseError::UnsupportedName(other.to_string(), start)),
        }
    }

    fn parse_number(&mut self) -> Result<PyValue, PyParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_')) {
            // Sign only at the start or after an exponent
            if matches!(self.peek(), Some('-' | '+'))
                && self.pos != start
                && !self.input[..self.pos].ends_with(['e', 'E'])
            {
                break;
            }
            self.advance();
        }
        let text = &self.input[start..self.pos];
        text.replace('_', "")
            .parse::<f64>()
            .map(PyValue::Num)
            .map_err(|_| PyParseError::InvalidNumber(text.to_string(), start))
    }

    fn parse_string(&mut self, raw: bool) -> Result<PyValue, PyParseError> {
        let start = self.pos;
        let quote = self.advance().ok_or(PyParseError::UnexpectedEnd)?;
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.input[start..].starts_with(&triple);
        if is_triple {
            self.pos = start + triple.len();
        }

        let mut out = String::new();
        loop {
            let ch = self.advance().ok_or(PyParseError::UnterminatedString(start))?;
            if ch == quote {
                if !is_triple {
                    return Ok(PyValue::Str(out));
                }
                if self.starts_with(&triple[1..]) {
                    self.pos += 2;
                    return Ok(PyValue::Str(out));
                }
                out.push(ch);
            } else if ch == '\n' && !is_triple {
                return Err(PyParseError::UnterminatedString(start));
            } else if ch == '\\' {
                let next = self.advance().ok_or(PyParseError::UnterminatedString(start))?;
                if raw {
                    // Raw strings keep the backslash, it only protects the quote
                    out.push('\\');
                    out.push(next);
                    continue;
                }
                match next {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' | '\'' | '"' => out.push(next),
                    '\n' => {}
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            } else {
                out.push(ch);
            }
        }
    }

    fn parse_seq(&mut self, close: char) -> Result<PyValue, PyParseError> {
        self.advance();
        let mut items = Vec::new();
        loop {
            self.skip_blank();
            if self.peek() == Some(close) {
                self.advance();
                return Ok(PyValue::Seq(items));
            }
            items.push(self.parse_value()?);
            self.skip_blank();
            if self.peek() == Some(',') {
                self.advance();
            } else {
                self.expect(close)?;
                return Ok(PyValue::Seq(items));
            }
        }
    }

    fn parse_dict(&mut self) -> Result<PyValue, PyParseError> {
        self.advance();
        let mut entries = Vec::new();
        loop {
            self.skip_blank();
            if self.peek() == Some('}') {
                self.advance();
                return Ok(PyValue::Dict(entries));
            }
            let key = self.parse_value()?;
            self.expect(':')?;
            let value = self.parse_value()?;
            entries.push((key, value));
            self.skip_blank();
            if self.peek() == Some(',') {
                self.advance();
            } else {
                self.expect('}')?;
                return Ok(PyValue::Dict(entries));
            }
        }
    }
}

/// Parse one literal
pub fn parse_literal(text: &str) -> Result<PyValue, PyParseError> {
    Parser::new(text, 0).parse_value()
}

/// Parse the literal assigned to `name` (`name = <literal>`), first assignment wins
pub fn parse_assignment(source: &str, name: &str) -> Result<PyValue, PyParseError> {
    let mut search = 0;
    while let Some(found) = source[search..].find(name) {
        let at = search + found;
        search = at + name.len();

        let before_ok = source[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '.'));
        let rest = source[search..].trim_start_matches([' ', '\t']);
        if !before_ok || !rest.starts_with('=') || rest.starts_with("==") {
            continue;
        }

        let value_start = source.len() - rest.len() + 1;
        return Parser::new(source, value_start).parse_value();
    }
    Err(PyParseError::MissingAssignment(name.to_string()))
}
