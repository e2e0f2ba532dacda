//! Source text → program list.
//!
//! The parser tokenizes a character stream into a single flat list whose
//! items are atoms (numbers, words with their sigils, operators,
//! punctuation) and nested lists built from `[` `]`. It performs no
//! semantic interpretation: `to`, `end`, procedure calls and infix
//! operators are all plain words here, handled later by the evaluator.
//!
//! Every recorded token and closed sublist registers its list cell in a
//! [`SourceMap`] keyed by node identity, so the evaluator can resolve any
//! cursor back to its source span for observers and error context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use nom::{
    IResult, Parser,
    character::complete::{char, digit1, one_of},
    combinator::{opt, recognize},
    sequence::preceded,
};

use crate::Error;
use crate::list::{List, ListBuilder, ListNode, Value};

/// Characters that terminate a word or a number. Whitespace terminates too
/// but is handled separately.
const DELIMITERS: &str = "[]()+-*/<>=;";

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || DELIMITERS.contains(c)
}

/// Source span of one program node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSource {
    /// The full program text the node was parsed from.
    pub source: Rc<str>,
    /// Byte offset of the first character of the token.
    pub start: usize,
    /// Byte offset one past the last character of the token.
    pub end: usize,
}

impl NodeSource {
    /// The token text itself.
    pub fn text(&self) -> &str {
        &self.source[self.start..self.end]
    }
}

struct MapEntry {
    node: Weak<ListNode>,
    source: Rc<str>,
    start: usize,
    end: usize,
}

/// Mapping from list-cell identity to source span.
///
/// Entries hold weak node handles, so a span lives exactly as long as the
/// node it describes; dead entries are pruned on the next parse.
#[derive(Default)]
pub struct SourceMap {
    entries: RefCell<HashMap<usize, MapEntry>>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap::default()
    }

    pub(crate) fn record(&self, node: &List, source: &Rc<str>, start: usize, end: usize) {
        self.entries.borrow_mut().insert(
            node.as_ptr() as usize,
            MapEntry {
                node: node.downgrade(),
                source: source.clone(),
                start,
                end,
            },
        );
    }

    /// Resolve a node back to its source span, if the parser recorded one.
    pub fn resolve(&self, node: &List) -> Option<NodeSource> {
        let entries = self.entries.borrow();
        let entry = entries.get(&(node.as_ptr() as usize))?;
        // A dead weak handle means the address was reused by an unrelated
        // allocation; such entries are stale, not matches.
        let alive = entry.node.upgrade()?;
        if !std::ptr::eq(Rc::as_ptr(&alive), node.as_ptr()) {
            return None;
        }
        Some(NodeSource {
            source: entry.source.clone(),
            start: entry.start,
            end: entry.end,
        })
    }

    /// Carry the span of one node over to another. Used when a procedure
    /// body is rebuilt from the program list during `to`.
    pub(crate) fn copy(&self, from: &List, to: &List) {
        if let Some(span) = self.resolve(from) {
            self.record(to, &span.source, span.start, span.end);
        }
    }

    /// Drop entries whose nodes are no longer alive.
    pub(crate) fn prune(&self) {
        self.entries
            .borrow_mut()
            .retain(|_, entry| entry.node.upgrade().is_some());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Recognize the unsigned part of a number: integer digits, optional
/// fractional part (at least one digit after the dot), optional exponent.
fn unsigned_number(input: &str) -> IResult<&str, &str> {
    recognize((
        digit1,
        opt(preceded(char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

/// Consume one word, resolving backslash escapes. After a leading `"`, a
/// single delimiter other than `[` or `]` is allowed unescaped, so `"+`
/// and `"-` are valid quoted literals.
fn word_token(input: &str) -> IResult<&str, String> {
    let mut out = String::new();
    let mut rest = input;

    let mut chars = rest.chars();
    match chars.next() {
        Some('"') => {
            out.push('"');
            rest = chars.as_str();
            if let Some(c) = rest.chars().next()
                && is_delimiter(c)
                && !c.is_whitespace()
                && c != '['
                && c != ']'
            {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
        Some(c) if !is_delimiter(c) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::TakeWhile1,
            )));
        }
    }

    loop {
        let mut iter = rest.chars();
        match iter.next() {
            Some('\\') => match iter.next() {
                Some(escaped) => {
                    out.push(escaped);
                    rest = iter.as_str();
                }
                None => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        rest,
                        nom::error::ErrorKind::Escaped,
                    )));
                }
            },
            Some(c) if !is_delimiter(c) => {
                out.push(c);
                rest = iter.as_str();
            }
            _ => break,
        }
    }

    Ok((rest, out))
}

/// Parse a whole program into a flat list of tokens and nested lists,
/// recording every cell's source span into `map`.
pub fn parse_program(source: &str, map: &SourceMap) -> Result<List, Error> {
    map.prune();
    let text: Rc<str> = Rc::from(source);
    let mut builders = vec![ListBuilder::new()];
    let mut opens: Vec<usize> = Vec::new();
    let mut rest = source;
    // True at start of input and after whitespace; gates the unary-minus
    // number rule.
    let mut boundary = true;

    loop {
        // Skip whitespace and comments.
        loop {
            let trimmed = rest.trim_start();
            if trimmed.len() != rest.len() {
                rest = trimmed;
                boundary = true;
            }
            if let Some(after) = rest.strip_prefix(';') {
                rest = match after.find('\n') {
                    Some(pos) => &after[pos..],
                    None => "",
                };
                boundary = true;
                continue;
            }
            break;
        }

        let offset = source.len() - rest.len();
        let Some(c) = rest.chars().next() else {
            break;
        };

        match c {
            '[' => {
                builders.push(ListBuilder::new());
                opens.push(offset);
                rest = &rest[1..];
                boundary = false;
            }
            ']' => {
                if builders.len() == 1 {
                    return Err(Error::syntax_at("unexpected ]", source, offset));
                }
                let closed = builders
                    .pop()
                    .expect("builder stack holds the list being closed");
                let start = opens.pop().expect("every frame records its [ offset");
                let node = push_token(&mut builders, Value::List(closed.list()));
                map.record(&node, &text, start, offset + 1);
                rest = &rest[1..];
                boundary = false;
            }
            c if c.is_ascii_digit() || (c == '-' && boundary && follows_digit(rest)) => {
                let signed = c == '-';
                let after_sign = if signed { &rest[1..] } else { rest };
                let (after_num, digits) = match unsigned_number(after_sign) {
                    Ok(ok) => ok,
                    Err(_) => {
                        return Err(Error::syntax_at("invalid number", source, offset));
                    }
                };
                if after_num.starts_with('.') {
                    return Err(Error::syntax_at(
                        "missing digits after decimal point",
                        source,
                        offset,
                    ));
                }
                let prefix_len = usize::from(signed) + digits.len();
                let terminated = after_num
                    .chars()
                    .next()
                    .is_none_or(is_delimiter);
                if terminated {
                    let token = &rest[..prefix_len];
                    let value: f64 = token
                        .parse()
                        .map_err(|_| Error::syntax_at("invalid number", source, offset))?;
                    let node = push_token(&mut builders, Value::Number(value));
                    map.record(&node, &text, offset, offset + prefix_len);
                    rest = after_num;
                } else {
                    // Not a well-terminated number: the whole run is a word.
                    let (after_word, tail) = word_token(after_num).map_err(|_| {
                        Error::syntax_at("invalid token", source, offset + prefix_len)
                    })?;
                    let word = format!("{}{}", &rest[..prefix_len], tail);
                    let consumed = source.len() - offset - after_word.len();
                    let node = push_token(&mut builders, Value::Word(word));
                    map.record(&node, &text, offset, offset + consumed);
                    rest = after_word;
                }
                boundary = false;
            }
            '+' | '-' | '*' | '/' | '<' | '>' | '=' | '(' | ')' => {
                let node = push_token(&mut builders, Value::Word(c.to_string()));
                map.record(&node, &text, offset, offset + 1);
                rest = &rest[1..];
                boundary = false;
            }
            _ => {
                let (after, word) = word_token(rest)
                    .map_err(|_| Error::syntax_at("invalid token", source, offset))?;
                let consumed = rest.len() - after.len();
                let node = push_token(&mut builders, Value::Word(word));
                map.record(&node, &text, offset, offset + consumed);
                rest = after;
                boundary = false;
            }
        }
    }

    if let Some(open) = opens.last() {
        return Err(Error::syntax_at("end of input inside [", source, *open));
    }
    Ok(builders
        .pop()
        .expect("top-level builder remains after balanced parse")
        .list())
}

fn follows_digit(rest: &str) -> bool {
    rest.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
}

fn push_token(builders: &mut [ListBuilder], value: Value) -> List {
    builders
        .last_mut()
        .expect("at least one list builder is always open")
        .push(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<List, Error> {
        parse_program(source, &SourceMap::new())
    }

    fn tokens(source: &str) -> Vec<Value> {
        parse(source)
            .unwrap_or_else(|e| panic!("parse failed for {source:?}: {e}"))
            .iter()
            .collect()
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn word(w: &str) -> Value {
        Value::Word(w.to_owned())
    }

    #[test]
    fn test_tokenization_comprehensive() {
        let cases: Vec<(&str, Vec<Value>)> = vec![
            // Plain words and numbers
            ("print 12", vec![word("print"), num(12.0)]),
            ("forward 100.5", vec![word("forward"), num(100.5)]),
            ("x 2e3 1.5e-2", vec![word("x"), num(2000.0), num(0.015)]),
            // Operators are single-character tokens
            (
                "1 + 2 * 3",
                vec![num(1.0), word("+"), num(2.0), word("*"), num(3.0)],
            ),
            ("3-4", vec![num(3.0), word("-"), num(4.0)]),
            ("3 - 4", vec![num(3.0), word("-"), num(4.0)]),
            ("(sum 1 2)", vec![word("("), word("sum"), num(1.0), num(2.0), word(")")]),
            // Unary minus folds into the number only after a boundary and
            // before a digit
            ("-3", vec![num(-3.0)]),
            ("print -3", vec![word("print"), num(-3.0)]),
            ("3 -4", vec![num(3.0), num(-4.0)]),
            ("- 3", vec![word("-"), num(3.0)]),
            // Numbers not terminated by a delimiter fall back to words
            ("12abc", vec![word("12abc")]),
            ("-12x", vec![word("-12x")]),
            ("1e", vec![word("1e")]),
            // Sigils stay on the word; the parser is purely lexical
            (
                "make \"x :y",
                vec![word("make"), word("\"x"), word(":y")],
            ),
            ("\"+", vec![word("\"+")]),
            ("\"-", vec![word("\"-")]),
            ("\"", vec![word("\"")]),
            // Backslash escapes the next character literally
            ("a\\ b", vec![word("a b")]),
            ("a\\[b", vec![word("a[b")]),
            // Comments run to end of line
            ("; nothing\nprint 1", vec![word("print"), num(1.0)]),
            ("print 1 ; trailing", vec![word("print"), num(1.0)]),
            // Whitespace variety
            ("\t print \r\n 2 ", vec![word("print"), num(2.0)]),
            ("", vec![]),
            ("   ", vec![]),
        ];
        for (i, (source, expected)) in cases.iter().enumerate() {
            assert_eq!(
                &tokens(source),
                expected,
                "case #{} for {source:?}",
                i + 1
            );
        }
    }

    #[test]
    fn test_nested_lists() {
        let program = tokens("print [a [b c] 3]");
        assert_eq!(program.len(), 2);
        assert_eq!(program[0], word("print"));
        let Value::List(outer) = &program[1] else {
            panic!("expected list, got {:?}", program[1]);
        };
        let items: Vec<Value> = outer.iter().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], word("a"));
        assert_eq!(
            items[1],
            Value::List(vec![word("b"), word("c")].into_iter().collect())
        );
        assert_eq!(items[2], num(3.0));
    }

    #[test]
    fn test_parse_errors() {
        let cases = vec![
            ("[1 2", "end of input inside ["),
            ("[ [a] ", "end of input inside ["),
            ("]", "unexpected ]"),
            ("1 ] 2", "unexpected ]"),
            ("1.", "missing digits after decimal point"),
            ("print 1.x", "missing digits after decimal point"),
            ("word\\", "invalid token"),
        ];
        for (source, expected) in cases {
            match parse(source) {
                Err(Error::Syntax { message, .. }) => {
                    assert!(
                        message.contains(expected),
                        "for {source:?}: expected {expected:?} in {message:?}"
                    );
                }
                other => panic!("expected syntax error for {source:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_structure_is_lossless() {
        // Stringifying the parsed list reproduces the token structure
        // modulo whitespace normalization and comment removal.
        let cases = vec![
            ("print [1 2] 3", "print [1 2] 3"),
            ("  print   [ 1   2 ]  3 ", "print [1 2] 3"),
            ("repeat 4 [fd 100 rt 90] ; square", "repeat 4 [fd 100 rt 90]"),
            ("to sq :n output :n * :n end", "to sq :n output :n * :n end"),
        ];
        for (source, expected) in cases {
            let program = parse(source).unwrap();
            assert_eq!(program.stringify("", ""), expected, "for {source:?}");
        }
    }

    #[test]
    fn test_source_map_spans() {
        let map = SourceMap::new();
        let source = "print [a b] 123";
        let program = parse_program(source, &map).unwrap();
        let cursors: Vec<List> = program.cursors().collect();
        assert_eq!(cursors.len(), 3);

        let spans: Vec<(usize, usize)> = cursors
            .iter()
            .map(|c| {
                let s = map.resolve(c).expect("every token has a span");
                (s.start, s.end)
            })
            .collect();
        assert_eq!(spans, vec![(0, 5), (6, 11), (12, 15)]);

        let span = map.resolve(&cursors[1]).unwrap();
        assert_eq!(span.text(), "[a b]");
        assert_eq!(&*span.source, source);
    }

    #[test]
    fn test_source_map_prunes_dead_nodes() {
        let map = SourceMap::new();
        let program = parse_program("print 1 2 3", &map).unwrap();
        let recorded = map.len();
        assert!(recorded >= 4);
        drop(program);
        map.prune();
        assert_eq!(map.len(), 0);

        // Spans survive across later parses while their nodes live.
        let keep = parse_program("print 9", &map).unwrap();
        parse_program("show 10", &map).unwrap();
        let first = keep.cursors().next().unwrap();
        assert_eq!(map.resolve(&first).map(|s| s.text().to_owned()).as_deref(), Some("print"));
    }
}
