//! LDAP-style filters evaluated against capability properties.
//!
//! Supports `&`, `|`, `!`, `=`, `~=`, `<=`, `>=`, presence (`(k=*)`),
//! substrings (`(k=a*b*c)`), `\` escapes, and the two OBR set operators:
//! `(k<*a,b)` holds when the property's values are a subset of `{a, b}`, and
//! `(k*>a,b)` when they are a superset. Operands are converted to version,
//! long and double once, at parse time.

use crate::value::{PropertyValue, split_list};
use crate::version::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A malformed filter expression.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The filter text does not follow the filter grammar.
    #[error("Invalid filter '{filter}' at offset {offset}: {message}")]
    Syntax {
        /// The full filter text.
        filter: String,
        /// Character offset where parsing stopped.
        offset: usize,
        /// What was expected.
        message: String,
    },
}

/// Something a filter can read properties from.
///
/// Lookup prefers an exact key and falls back to an ASCII case-insensitive
/// match, like OSGi filters do.
pub trait PropertySource {
    /// Find the value stored under `key`.
    fn property(&self, key: &str) -> Option<&PropertyValue>;
}

impl PropertySource for [(String, PropertyValue)] {
    fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
            .map(|(_, v)| v)
    }
}

impl PropertySource for BTreeMap<String, PropertyValue> {
    fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.get(key).or_else(|| {
            self.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }
}

/// A parsed filter expression.
///
/// # Example
///
/// ```
/// use obr_schema::{Filter, PropertyValue, Version};
/// use std::collections::BTreeMap;
///
/// let filter = Filter::parse("(&(package=org.acme)(version>=1.2))").unwrap();
/// let mut props = BTreeMap::new();
/// props.insert("package".to_string(), PropertyValue::from("org.acme"));
/// props.insert("version".to_string(), PropertyValue::from(Version::new(1, 10, 0)));
/// assert!(filter.matches(&props));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    text: String,
    root: Node,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Present(String),
    Compare {
        attr: String,
        op: Op,
        operand: Operand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
    Subset,
    Superset,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Literal(Literal),
    Substring(Substring),
    Set(Vec<String>),
}

/// Operand text with its typed readings.
#[derive(Debug, Clone, PartialEq)]
struct Literal {
    text: String,
    version: Option<Version>,
    long: Option<i64>,
    double: Option<f64>,
}

impl Literal {
    fn new(text: String) -> Self {
        let trimmed = text.trim();
        Self {
            version: Version::parse(trimmed).ok(),
            long: trimmed.parse().ok(),
            double: trimmed.parse().ok(),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Substring {
    initial: Option<String>,
    any: Vec<String>,
    last: Option<String>,
}

impl Substring {
    fn from_parts(mut parts: Vec<String>) -> Self {
        let last = parts.pop().filter(|s| !s.is_empty());
        let mut rest = parts.into_iter();
        let initial = rest.next().filter(|s| !s.is_empty());
        let any = rest.filter(|s| !s.is_empty()).collect();
        Self { initial, any, last }
    }

    fn matches(&self, value: &str) -> bool {
        let mut rest = value;
        if let Some(initial) = &self.initial {
            match rest.strip_prefix(initial.as_str()) {
                Some(after) => rest = after,
                None => return false,
            }
        }
        for part in &self.any {
            match rest.find(part.as_str()) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
        self.last.as_ref().is_none_or(|last| rest.ends_with(last.as_str()))
    }
}

impl Filter {
    /// Parse filter text.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Syntax`] describing the first problem found.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let mut parser = Parser::new(text);
        let root = parser.parse_filter()?;
        parser.skip_ws();
        if parser.peek().is_some() {
            return Err(parser.error("unexpected characters after filter"));
        }
        Ok(Self {
            text: text.to_string(),
            root,
        })
    }

    /// Evaluate the filter. Never fails; type mismatches simply do not match.
    pub fn matches<P: PropertySource + ?Sized>(&self, properties: &P) -> bool {
        eval(&self.root, properties)
    }

    /// The filter text as written.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn eval<P: PropertySource + ?Sized>(node: &Node, properties: &P) -> bool {
    match node {
        Node::And(children) => children.iter().all(|c| eval(c, properties)),
        Node::Or(children) => children.iter().any(|c| eval(c, properties)),
        Node::Not(child) => !eval(child, properties),
        Node::Present(attr) => properties.property(attr).is_some(),
        Node::Compare { attr, op, operand } => match properties.property(attr) {
            Some(value) => compare(value, *op, operand),
            // A missing property is the empty set.
            None => match (op, operand) {
                (Op::Subset, Operand::Set(_)) => true,
                (Op::Superset, Operand::Set(wanted)) => wanted.is_empty(),
                _ => false,
            },
        },
    }
}

fn compare(value: &PropertyValue, op: Op, operand: &Operand) -> bool {
    match operand {
        Operand::Set(wanted) => {
            let have = value.as_set();
            match op {
                Op::Subset => have.iter().all(|h| wanted.contains(h)),
                Op::Superset => wanted.iter().all(|w| have.contains(w)),
                _ => false,
            }
        }
        Operand::Substring(pattern) => match value {
            PropertyValue::String(s) => pattern.matches(s),
            PropertyValue::StringArray(items) => items.iter().any(|i| pattern.matches(i)),
            other => pattern.matches(&other.to_string()),
        },
        Operand::Literal(literal) => compare_literal(value, op, literal),
    }
}

fn compare_literal(value: &PropertyValue, op: Op, literal: &Literal) -> bool {
    match value {
        PropertyValue::String(s) => compare_str(s, op, &literal.text),
        PropertyValue::StringArray(items) => items.iter().any(|i| compare_str(i, op, &literal.text)),
        PropertyValue::Long(n) => literal.long.is_some_and(|m| ordered(n.cmp(&m), op)),
        PropertyValue::Double(x) => literal
            .double
            .and_then(|y| x.partial_cmp(&y))
            .is_some_and(|ord| ordered(ord, op)),
        PropertyValue::Version(v) => literal
            .version
            .as_ref()
            .is_some_and(|w| ordered(v.cmp(w), op)),
        PropertyValue::VersionRange(range) => {
            literal.version.as_ref().is_some_and(|w| match op {
                Op::Equal | Op::Approx => range.includes(w),
                Op::GreaterEq => range.floor() >= w,
                Op::LessEq => range.ceiling().is_some_and(|c| c <= w),
                Op::Subset | Op::Superset => false,
            })
        }
    }
}

fn ordered(ord: Ordering, op: Op) -> bool {
    match op {
        Op::Equal | Op::Approx => ord == Ordering::Equal,
        Op::GreaterEq => ord != Ordering::Less,
        Op::LessEq => ord != Ordering::Greater,
        Op::Subset | Op::Superset => false,
    }
}

fn compare_str(value: &str, op: Op, text: &str) -> bool {
    match op {
        Op::Equal => value == text,
        Op::Approx => approx(value) == approx(text),
        Op::GreaterEq => value >= text,
        Op::LessEq => value <= text,
        Op::Subset | Op::Superset => false,
    }
}

fn approx(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> FilterError {
        FilterError::Syntax {
            filter: self.input.to_string(),
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), FilterError> {
        if self.peek() == Some(wanted) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{wanted}'")))
        }
    }

    fn parse_filter(&mut self) -> Result<Node, FilterError> {
        self.skip_ws();
        self.expect('(')?;
        self.skip_ws();
        let node = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Node::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Node::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                Node::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_ws();
        self.expect(')')?;
        Ok(node)
    }

    fn parse_list(&mut self) -> Result<Vec<Node>, FilterError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some('(') {
                break;
            }
            nodes.push(self.parse_filter()?);
        }
        if nodes.is_empty() {
            return Err(self.error("expected at least one operand"));
        }
        Ok(nodes)
    }

    fn parse_item(&mut self) -> Result<Node, FilterError> {
        let attr = self.parse_attr()?;
        let op = self.parse_op()?;
        let mut parts = self.parse_value()?;

        let operand = match op {
            Op::Equal if parts.len() == 1 => Operand::Literal(Literal::new(parts.remove(0))),
            Op::Equal if parts.len() == 2 && parts.iter().all(String::is_empty) => {
                return Ok(Node::Present(attr));
            }
            Op::Equal => Operand::Substring(Substring::from_parts(parts)),
            Op::Subset | Op::Superset => Operand::Set(split_list(&parts.join("*"))),
            Op::Approx | Op::GreaterEq | Op::LessEq => {
                Operand::Literal(Literal::new(parts.join("*")))
            }
        };

        Ok(Node::Compare { attr, op, operand })
    }

    fn parse_attr(&mut self) -> Result<String, FilterError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            match c {
                '=' | '<' | '>' | '~' | '(' | ')' => break,
                '*' if self.peek_next() == Some('>') => break,
                _ => self.pos += 1,
            }
        }
        let attr: String = self.chars[start..self.pos].iter().collect();
        let attr = attr.trim();
        if attr.is_empty() {
            return Err(self.error("missing attribute name"));
        }
        Ok(attr.to_string())
    }

    fn parse_op(&mut self) -> Result<Op, FilterError> {
        let (op, width) = match (self.peek(), self.peek_next()) {
            (Some('='), _) => (Op::Equal, 1),
            (Some('~'), Some('=')) => (Op::Approx, 2),
            (Some('>'), Some('=')) => (Op::GreaterEq, 2),
            (Some('<'), Some('=')) => (Op::LessEq, 2),
            (Some('<'), Some('*')) => (Op::Subset, 2),
            (Some('*'), Some('>')) => (Op::Superset, 2),
            _ => return Err(self.error("expected comparison operator")),
        };
        self.pos += width;
        Ok(op)
    }

    /// Reads up to the closing `)`, splitting on unescaped `*`.
    fn parse_value(&mut self) -> Result<Vec<String>, FilterError> {
        let mut parts = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    current.push(escaped);
                }
                Some('*') => parts.push(std::mem::take(&mut current)),
                Some(c) => current.push(c),
            }
            self.pos += 1;
        }
        parts.push(current);
        Ok(parts)
    }
}
