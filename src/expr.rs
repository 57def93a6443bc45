//! Parser for conditional test expressions: the boolean/comparison
//! grammar used by `{% if %}` and `{% elseif %}` clauses.
//!
//! `parse_test` is total: any input, including garbage, yields a
//! deterministic test node. Malformed input produces a never-true test
//! rather than an error, in keeping with the fail-safe design of the
//! template parser.

use crate::data::Data;

/// A value position in a test: a dot-path into the scope, or a literal.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Operand {
    Key(String),
    Literal(Data),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

/// A parsed conditional test. Negation is normalized into `Not`
/// wrappers; stacked negations cancel pairwise at evaluation time.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TestNode {
    Truthy(Operand),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    And(Vec<TestNode>),
    Or(Vec<TestNode>),
    Not(Box<TestNode>),
}

/// The constant-false test substituted for unparsable input: an empty
/// key never resolves, so its truthiness is always false.
fn default_test() -> TestNode {
    TestNode::Truthy(Operand::Key(String::new()))
}

pub(crate) fn parse_test(source: &str) -> TestNode {
    let mut parser = TestParser { toks: tokenize(source), pos: 0 };
    parser.parse_or().unwrap_or_else(default_test)
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Cmp(CompareOp),
    Operand(Operand),
}

/// Longest-match scan. Unrecognized characters are skipped so the scan
/// index always advances and tokenizing always terminates.
fn tokenize(source: &str) -> Vec<Tok> {
    let mut toks = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let ch = match rest.chars().next() {
            Some(ch) => ch,
            None => break,
        };

        if rest.starts_with("&&") {
            toks.push(Tok::And);
            pos += 2;
        } else if rest.starts_with("||") {
            toks.push(Tok::Or);
            pos += 2;
        } else if rest.starts_with("==") {
            toks.push(Tok::Cmp(CompareOp::Eq));
            pos += 2;
        } else if rest.starts_with("!=") {
            toks.push(Tok::Cmp(CompareOp::Ne));
            pos += 2;
        } else if rest.starts_with(">=") {
            toks.push(Tok::Cmp(CompareOp::Ge));
            pos += 2;
        } else if rest.starts_with("<=") {
            toks.push(Tok::Cmp(CompareOp::Le));
            pos += 2;
        } else {
            match ch {
                '(' => {
                    toks.push(Tok::LParen);
                    pos += 1;
                }
                ')' => {
                    toks.push(Tok::RParen);
                    pos += 1;
                }
                '>' => {
                    toks.push(Tok::Cmp(CompareOp::Gt));
                    pos += 1;
                }
                '<' => {
                    toks.push(Tok::Cmp(CompareOp::Lt));
                    pos += 1;
                }
                '!' => {
                    toks.push(Tok::Not);
                    pos += 1;
                }
                '\'' | '"' => {
                    let (value, consumed) = scan_string(rest, ch);
                    toks.push(Tok::Operand(Operand::Literal(Data::String(value))));
                    pos += consumed;
                }
                '0'..='9' => {
                    let (value, consumed) = scan_number(rest);
                    toks.push(Tok::Operand(Operand::Literal(Data::Number(value))));
                    pos += consumed;
                }
                '+' | '-' if rest[1..].starts_with(|c: char| c.is_ascii_digit()) => {
                    let (value, consumed) = scan_number(rest);
                    toks.push(Tok::Operand(Operand::Literal(Data::Number(value))));
                    pos += consumed;
                }
                _ if ch.is_ascii_alphabetic() || ch == '_' => {
                    let word: String = rest
                        .chars()
                        .take_while(|&c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                        .collect();
                    pos += word.len();
                    toks.push(classify_word(word));
                }
                _ => pos += ch.len_utf8(),
            }
        }
    }

    toks
}

/// Reserved words become literals (or the `not` operator); anything
/// else is a key. Matching is case-insensitive and already
/// word-bounded because the whole identifier was consumed.
fn classify_word(word: String) -> Tok {
    if word.eq_ignore_ascii_case("not") {
        Tok::Not
    } else if word.eq_ignore_ascii_case("true") {
        Tok::Operand(Operand::Literal(Data::Bool(true)))
    } else if word.eq_ignore_ascii_case("false") {
        Tok::Operand(Operand::Literal(Data::Bool(false)))
    } else if word.eq_ignore_ascii_case("null") {
        Tok::Operand(Operand::Literal(Data::Null))
    } else {
        Tok::Operand(Operand::Key(word))
    }
}

/// Scan a quoted string with backslash escaping. An unterminated
/// string consumes the rest of the input.
fn scan_string(rest: &str, quote: char) -> (String, usize) {
    let mut value = String::new();
    let mut chars = rest.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some((_, escaped)) = chars.next() {
                value.push(escaped);
            }
        } else if c == quote {
            return (value, i + quote.len_utf8());
        } else {
            value.push(c);
        }
    }

    (value, rest.len())
}

/// Scan `[+-]?digits(.digits)?`. The caller guarantees the input
/// starts with a digit or a signed digit.
fn scan_number(rest: &str) -> (f64, usize) {
    let bytes = rest.as_bytes();
    let mut end = 0;
    if bytes[0] == b'+' || bytes[0] == b'-' {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' && bytes[end + 1..].first().is_some_and(|b| b.is_ascii_digit()) {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    (rest[..end].parse().unwrap_or(0.0), end)
}

enum Prim {
    Group(TestNode),
    Operand(Operand),
}

struct TestParser {
    toks: Vec<Tok>,
    pos: usize,
}

impl TestParser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // Or -> And (OR And)*
    fn parse_or(&mut self) -> Option<TestNode> {
        let first = self.parse_and()?;
        let mut children = vec![first];
        while matches!(self.peek(), Some(Tok::Or)) {
            self.pos += 1;
            match self.parse_and() {
                Some(node) => children.push(node),
                None => break,
            }
        }
        if children.len() == 1 {
            children.pop()
        } else {
            Some(TestNode::Or(children))
        }
    }

    // And -> Unary (AND Unary)*
    fn parse_and(&mut self) -> Option<TestNode> {
        let first = self.parse_unary()?;
        let mut children = vec![first];
        while matches!(self.peek(), Some(Tok::And)) {
            self.pos += 1;
            match self.parse_unary() {
                Some(node) => children.push(node),
                None => break,
            }
        }
        if children.len() == 1 {
            children.pop()
        } else {
            Some(TestNode::And(children))
        }
    }

    // Unary -> (NOT)* Compare
    fn parse_unary(&mut self) -> Option<TestNode> {
        let mut negations = 0;
        while matches!(self.peek(), Some(Tok::Not)) {
            self.pos += 1;
            negations += 1;
        }
        let mut node = self.parse_compare()?;
        for _ in 0..negations {
            node = TestNode::Not(Box::new(node));
        }
        Some(node)
    }

    // Compare -> Primary (CompareOp Operand)?
    //
    // A parenthesized group is not a comparable operand: a compare
    // operator after a group is left unconsumed and parsing of the
    // enclosing clause simply stops there.
    fn parse_compare(&mut self) -> Option<TestNode> {
        match self.parse_primary()? {
            Prim::Group(node) => Some(node),
            Prim::Operand(left) => {
                if let Some(&Tok::Cmp(op)) = self.peek() {
                    if let Some(Tok::Operand(_)) = self.toks.get(self.pos + 1) {
                        self.pos += 1;
                        if let Some(Tok::Operand(right)) = self.next() {
                            return Some(TestNode::Compare { left, op, right });
                        }
                    }
                }
                Some(TestNode::Truthy(left))
            }
        }
    }

    // Primary -> '(' Or ')' | Operand
    fn parse_primary(&mut self) -> Option<Prim> {
        match self.peek()? {
            Tok::LParen => {
                self.pos += 1;
                let inner = self.parse_or();
                if matches!(self.peek(), Some(Tok::RParen)) {
                    self.pos += 1;
                }
                inner.map(Prim::Group)
            }
            Tok::Operand(_) => match self.next() {
                Some(Tok::Operand(operand)) => Some(Prim::Operand(operand)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Whole-token literal grammar shared with the template parser: quoted
/// strings (backslash-escaped), numbers, `true`/`false`/`null`.
pub(crate) fn parse_literal(token: &str) -> Option<Data> {
    if token.starts_with('\'') || token.starts_with('"') {
        return unquote(token).map(Data::String);
    }
    if is_number(token) {
        return token.parse().ok().map(Data::Number);
    }
    if token.eq_ignore_ascii_case("true") {
        return Some(Data::Bool(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Some(Data::Bool(false));
    }
    if token.eq_ignore_ascii_case("null") {
        return Some(Data::Null);
    }
    None
}

/// A literal, or failing that, an identifier/dot-path key.
pub(crate) fn parse_operand(token: &str) -> Option<Operand> {
    if let Some(literal) = parse_literal(token) {
        return Some(Operand::Literal(literal));
    }
    if is_path(token) {
        return Some(Operand::Key(token.to_string()));
    }
    None
}

/// `[A-Za-z_][\w.]*`
pub(crate) fn is_path(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// `[A-Za-z_]\w*`
pub(crate) fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_number(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let integer_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == integer_start {
        return false;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let fraction_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == fraction_start {
            return false;
        }
    }
    i == bytes.len()
}

/// Strip matching quotes and process backslash escapes. The closing
/// quote must be the final, unescaped character of the token.
fn unquote(s: &str) -> Option<String> {
    let mut chars = s.chars();
    let quote = chars.next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }

    let mut out = String::new();
    loop {
        match chars.next() {
            None => return None,
            Some('\\') => match chars.next() {
                Some(c) => out.push(c),
                None => return None,
            },
            Some(c) if c == quote => {
                return if chars.as_str().is_empty() { Some(out) } else { None };
            }
            Some(c) => out.push(c),
        }
    }
}
