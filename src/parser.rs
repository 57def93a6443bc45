//! The tokenizing template parser.
//!
//! `parse` is total: it never fails on malformed input. Every error
//! path degrades to emitting the offending token's literal source text
//! as a `Text` node, after which scanning resumes past the token. A
//! broken template renders as close to its source as possible instead
//! of breaking the host application.

// for bug!
use log::error;

use crate::data::Data;
use crate::expr::{self, Operand, TestNode};

/// One parsed template node.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    /// Literal output, emitted verbatim.
    Text(String),
    /// `{{ key || fallback | filter }}`; `raw` disables HTML escaping.
    Interp {
        key: String,
        raw: bool,
        fallbacks: Vec<(FallbackOp, Operand)>,
        filters: Vec<FilterCall>,
    },
    /// `{% if %}...{% elseif %}...{% else %}...{% endif %}`
    Cond {
        test: TestNode,
        consequent: Vec<Node>,
        branches: Vec<(TestNode, Vec<Node>)>,
        alternate: Option<Vec<Node>>,
    },
    /// `{% each list as item[, index] %}...{% endeach %}`
    Each {
        list: String,
        item: String,
        index: Option<String>,
        body: Vec<Node>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum FallbackOp {
    /// `||` — replaces when the current value is emptyish.
    Or,
    /// `??` — replaces only when the current value is null/absent.
    Nullish,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FilterCall {
    pub name: String,
    pub args: Vec<Data>,
}

pub(crate) fn parse(source: &str) -> Vec<Node> {
    Parser::new(source).parse()
}

#[derive(Clone, Copy)]
enum TokenKind {
    Interp,
    Control,
    Comment,
}

/// An open block. The raw source text of every opening/branch tag is
/// kept so an unclosed block can be flattened back into literal text
/// at end of input.
enum Frame {
    Cond {
        raw: String,
        test: TestNode,
        consequent: Vec<Node>,
        branches: Vec<(String, TestNode, Vec<Node>)>,
        alternate: Option<(String, Vec<Node>)>,
    },
    Each {
        raw: String,
        list: String,
        item: String,
        index: Option<String>,
        body: Vec<Node>,
    },
}

/// What a successfully parsed token does to the tree under
/// construction. Classification is separated from application so that
/// a misplaced token can be detected (and preserved as literal text)
/// before any state is touched.
enum Effect {
    Comment,
    Node(Node),
    OpenCond(TestNode),
    ElseIf(TestNode),
    Else,
    EndIf,
    OpenEach {
        list: String,
        item: String,
        index: Option<String>,
    },
    EndEach,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    nodes: Vec<Node>,
    frames: Vec<Frame>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Parser<'a> {
        Parser { src, pos: 0, nodes: Vec::new(), frames: Vec::new() }
    }

    fn parse(mut self) -> Vec<Node> {
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            let (offset, kind) = match find_opener(rest) {
                Some(found) => found,
                None => {
                    let text = rest.to_string();
                    self.push_text(text);
                    self.pos = self.src.len();
                    break;
                }
            };

            if offset > 0 {
                let text = rest[..offset].to_string();
                self.push_text(text);
            }

            let start = self.pos + offset;
            if !self.scan_token(start, kind) {
                break;
            }
        }

        self.unwind();
        self.nodes
    }

    /// Scan one token starting at the opener. Returns `false` when the
    /// token is unterminated and the source is exhausted.
    fn scan_token(&mut self, start: usize, kind: TokenKind) -> bool {
        let src = self.src;

        let mut body = start + 2;
        let mut open_mark = None;
        if let Some(c) = src[body..].chars().next() {
            if c == '-' || c == '~' {
                open_mark = Some(c);
                body += 1;
            }
        }

        let closer = match kind {
            TokenKind::Interp => "}}",
            TokenKind::Control => "%}",
            TokenKind::Comment => "#}",
        };

        let mut inner_end = match src[body..].find(closer) {
            Some(i) => body + i,
            None => {
                // Unterminated token: the remainder of the source is a
                // single literal text node.
                let text = src[start..].to_string();
                self.push_text(text);
                self.pos = src.len();
                return false;
            }
        };
        let after = inner_end + 2;

        let mut close_mark = None;
        if let Some(c) = src[body..inner_end].chars().last() {
            if c == '-' || c == '~' {
                close_mark = Some(c);
                inner_end -= 1;
            }
        }

        let inner = src[body..inner_end].trim();

        let effect = match kind {
            TokenKind::Comment => Some(Effect::Comment),
            TokenKind::Interp => parse_interpolation(inner).map(Effect::Node),
            TokenKind::Control => self.classify_control(inner),
        };

        match effect {
            None => {
                // Degrade to literal text; surrounding whitespace is
                // left untouched.
                let raw = src[start..after].to_string();
                self.push_text(raw);
                self.pos = after;
            }
            Some(effect) => {
                let raw = src[start..after].to_string();
                self.trim_preceding(open_mark);
                let chomp_newline =
                    matches!(kind, TokenKind::Control) && close_mark.is_none();
                self.apply(effect, raw);
                self.pos = after;
                self.skip_following(close_mark, chomp_newline);
            }
        }
        true
    }

    /// Keyword dispatch for `{% ... %}`. Returns `None` for unknown or
    /// misplaced tokens, which the caller preserves as literal text.
    fn classify_control(&self, inner: &str) -> Option<Effect> {
        let (word, rest) = match inner.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (inner, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "if" => Some(Effect::OpenCond(expr::parse_test(rest))),
            "elseif" if self.top_is_open_cond() => Some(Effect::ElseIf(expr::parse_test(rest))),
            "else" if self.top_is_open_cond() => Some(Effect::Else),
            "endif" if matches!(self.frames.last(), Some(Frame::Cond { .. })) => {
                Some(Effect::EndIf)
            }
            "each" => parse_each(rest),
            "endeach" if matches!(self.frames.last(), Some(Frame::Each { .. })) => {
                Some(Effect::EndEach)
            }
            _ => None,
        }
    }

    /// `elseif`/`else` are only valid while the innermost open block is
    /// a conditional that has not yet entered its alternate branch.
    fn top_is_open_cond(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Cond { alternate: None, .. }))
    }

    fn apply(&mut self, effect: Effect, raw: String) {
        match effect {
            Effect::Comment => {}
            Effect::Node(node) => self.push_node(node),
            Effect::OpenCond(test) => self.frames.push(Frame::Cond {
                raw,
                test,
                consequent: Vec::new(),
                branches: Vec::new(),
                alternate: None,
            }),
            Effect::ElseIf(test) => match self.frames.last_mut() {
                Some(Frame::Cond { branches, .. }) => branches.push((raw, test, Vec::new())),
                _ => bug!("elseif applied with no open conditional frame"),
            },
            Effect::Else => match self.frames.last_mut() {
                Some(Frame::Cond { alternate, .. }) => *alternate = Some((raw, Vec::new())),
                _ => bug!("else applied with no open conditional frame"),
            },
            Effect::EndIf => match self.frames.pop() {
                Some(Frame::Cond { test, consequent, branches, alternate, .. }) => {
                    self.push_node(Node::Cond {
                        test,
                        consequent,
                        branches: branches.into_iter().map(|(_, t, nodes)| (t, nodes)).collect(),
                        alternate: alternate.map(|(_, nodes)| nodes),
                    });
                }
                _ => bug!("endif applied with no open conditional frame"),
            },
            Effect::OpenEach { list, item, index } => self.frames.push(Frame::Each {
                raw,
                list,
                item,
                index,
                body: Vec::new(),
            }),
            Effect::EndEach => match self.frames.pop() {
                Some(Frame::Each { list, item, index, body, .. }) => {
                    self.push_node(Node::Each { list, item, index, body });
                }
                _ => bug!("endeach applied with no open loop frame"),
            },
        }
    }

    /// Apply an open-side trim marker to the trailing whitespace of the
    /// preceding text node. `~` stops at (and keeps) any newline.
    fn trim_preceding(&mut self, mark: Option<char>) {
        let mark = match mark {
            Some(mark) => mark,
            None => return,
        };
        let list = self.current_list();
        let now_empty = match list.last_mut() {
            Some(Node::Text(text)) => {
                let keep = match mark {
                    '-' => text.trim_end().len(),
                    _ => text
                        .trim_end_matches(|c: char| {
                            c.is_whitespace() && c != '\n' && c != '\r'
                        })
                        .len(),
                };
                text.truncate(keep);
                text.is_empty()
            }
            _ => false,
        };
        if now_empty {
            list.pop();
        }
    }

    /// Apply a close-side trim marker to the source following the
    /// token, or, for control tokens without an explicit marker,
    /// consume exactly one newline sequence.
    fn skip_following(&mut self, mark: Option<char>, chomp_newline: bool) {
        let rest = &self.src[self.pos..];
        match mark {
            Some('-') => {
                self.pos += rest.len() - rest.trim_start().len();
            }
            Some(_) => {
                let kept = rest
                    .trim_start_matches(|c: char| c.is_whitespace() && c != '\n' && c != '\r');
                self.pos += rest.len() - kept.len();
            }
            None => {
                if chomp_newline {
                    if rest.starts_with("\r\n") {
                        self.pos += 2;
                    } else if rest.starts_with('\n') {
                        self.pos += 1;
                    }
                }
            }
        }
    }

    fn current_list(&mut self) -> &mut Vec<Node> {
        match self.frames.last_mut() {
            None => &mut self.nodes,
            Some(Frame::Each { body, .. }) => body,
            Some(Frame::Cond { consequent, branches, alternate, .. }) => {
                if let Some((_, nodes)) = alternate {
                    nodes
                } else if let Some((_, _, nodes)) = branches.last_mut() {
                    nodes
                } else {
                    consequent
                }
            }
        }
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let list = self.current_list();
        if let Some(Node::Text(prev)) = list.last_mut() {
            prev.push_str(&text);
        } else {
            list.push(Node::Text(text));
        }
    }

    fn push_node(&mut self, node: Node) {
        self.current_list().push(node);
    }

    /// End of input with open blocks: every tag already consumed
    /// degrades back to its literal source text, with the parsed inner
    /// nodes kept in place.
    fn unwind(&mut self) {
        while let Some(frame) = self.frames.pop() {
            let mut flattened = Vec::new();
            match frame {
                Frame::Cond { raw, consequent, branches, alternate, .. } => {
                    flattened.push(Node::Text(raw));
                    flattened.extend(consequent);
                    for (raw, _, nodes) in branches {
                        flattened.push(Node::Text(raw));
                        flattened.extend(nodes);
                    }
                    if let Some((raw, nodes)) = alternate {
                        flattened.push(Node::Text(raw));
                        flattened.extend(nodes);
                    }
                }
                Frame::Each { raw, body, .. } => {
                    flattened.push(Node::Text(raw));
                    flattened.extend(body);
                }
            }
            for node in flattened {
                match node {
                    Node::Text(text) => self.push_text(text),
                    other => self.push_node(other),
                }
            }
        }
    }
}

fn find_opener(s: &str) -> Option<(usize, TokenKind)> {
    let mut best: Option<(usize, TokenKind)> = None;
    for (pattern, kind) in [
        ("{{", TokenKind::Interp),
        ("{%", TokenKind::Control),
        ("{#", TokenKind::Comment),
    ] {
        if let Some(i) = s.find(pattern) {
            if best.map_or(true, |(b, _)| i < b) {
                best = Some((i, kind));
            }
        }
    }
    best
}

/// `<listExpr> as <var>[, <indexVar>]`
fn parse_each(rest: &str) -> Option<Effect> {
    let mut words = rest.split_whitespace();
    let list = words.next()?;
    if !words.next()?.eq_ignore_ascii_case("as") {
        return None;
    }
    let vars = words.collect::<Vec<_>>().join(" ");

    let mut parts = vars.split(',').map(str::trim);
    let item = parts.next()?;
    let index = parts.next();
    if parts.next().is_some() {
        return None;
    }

    if !expr::is_path(list) || !expr::is_ident(item) {
        return None;
    }
    if let Some(index) = index {
        if !expr::is_ident(index) {
            return None;
        }
    }

    Some(Effect::OpenEach {
        list: list.to_string(),
        item: item.to_string(),
        index: index.map(str::to_string),
    })
}

/// `[=] key (||/?? fallback)* (| filter(args))*`
///
/// Returns `None` when the interpolation must be preserved as literal
/// text (key not matching the path grammar).
fn parse_interpolation(inner: &str) -> Option<Node> {
    let mut rest = inner;
    let mut raw = false;
    if let Some(stripped) = rest.strip_prefix('=') {
        raw = true;
        rest = stripped.trim_start();
    }

    let (expr_segment, filter_segment) = split_filters(rest);
    let (head, links) = split_fallbacks(expr_segment);

    let key = head.trim();
    if !expr::is_path(key) {
        return None;
    }

    let mut fallbacks = Vec::new();
    for (op, token) in links {
        match expr::parse_operand(token.trim()) {
            Some(operand) => fallbacks.push((op, operand)),
            None => {
                // One unparsable link discards the entire chain; the
                // base key interpolation still proceeds.
                fallbacks.clear();
                break;
            }
        }
    }

    let filters = match filter_segment {
        Some(segment) => parse_filters(segment),
        None => Vec::new(),
    };

    Some(Node::Interp { key: key.to_string(), raw, fallbacks, filters })
}

/// Split at the first unquoted, non-doubled `|` into the expression
/// segment and the filters segment.
fn split_filters(s: &str) -> (&str, Option<&str>) {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'|' => {
                    if bytes.get(i + 1) == Some(&b'|') {
                        // `||` is a fallback operator, not a filter pipe.
                        i += 1;
                    } else {
                        return (&s[..i], Some(&s[i + 1..]));
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    (s, None)
}

/// Split the expression segment on unquoted `||`/`??` into the base key
/// and the ordered fallback chain.
fn split_fallbacks(s: &str) -> (&str, Vec<(FallbackOp, &str)>) {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut boundaries: Vec<(usize, FallbackOp)> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'|' if bytes.get(i + 1) == Some(&b'|') => {
                    boundaries.push((i, FallbackOp::Or));
                    i += 1;
                }
                b'?' if bytes.get(i + 1) == Some(&b'?') => {
                    boundaries.push((i, FallbackOp::Nullish));
                    i += 1;
                }
                _ => {}
            },
        }
        i += 1;
    }

    if boundaries.is_empty() {
        return (s, Vec::new());
    }

    let head = &s[..boundaries[0].0];
    let mut links = Vec::new();
    for (k, &(pos, op)) in boundaries.iter().enumerate() {
        let end = boundaries.get(k + 1).map_or(s.len(), |&(next, _)| next);
        links.push((op, &s[pos + 2..end]));
    }
    (head, links)
}

/// Split on unquoted `delim` (an ASCII byte), respecting backslash
/// escapes inside quotes.
fn split_unquoted(s: &str, delim: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                } else if b == delim {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
            }
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

/// Parse the filters segment: `name(arg, ...)` calls separated by `|`.
/// Malformed calls are skipped and unparsable arguments dropped;
/// neither is fatal.
fn parse_filters(segment: &str) -> Vec<FilterCall> {
    let mut calls = Vec::new();
    for part in split_unquoted(segment, b'|') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, args) = match part.split_once('(') {
            None => (part, Vec::new()),
            Some((name, arg_source)) => {
                let arg_source = match arg_source.trim_end().strip_suffix(')') {
                    Some(inner) => inner,
                    None => continue,
                };
                let mut args = Vec::new();
                if !arg_source.trim().is_empty() {
                    for arg in split_unquoted(arg_source, b',') {
                        if let Some(literal) = expr::parse_literal(arg.trim()) {
                            args.push(literal);
                        }
                    }
                }
                (name.trim(), args)
            }
        };
        if expr::is_ident(name) {
            calls.push(FilterCall { name: name.to_string(), args });
        }
    }
    calls
}
