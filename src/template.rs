//! A compiled template and the tree-walking renderer.
//!
//! Rendering is pure and never fails: the same nodes and the same data
//! always produce the same output string.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::data::Data;
use crate::expr::{CompareOp, Operand, TestNode};
use crate::filters::FilterRegistry;
use crate::parser::{FallbackOp, FilterCall, Node};
use crate::scope::{emptyish, truthy, Scope};

/// A parsed template, reusable across renders.
#[derive(Clone, Debug)]
pub struct Template {
    pub(crate) nodes: Vec<Node>,
}

impl Template {
    pub(crate) fn new(nodes: Vec<Node>) -> Template {
        Template { nodes }
    }
}

/// Replace the five HTML-significant characters with entities.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) struct Renderer<'r> {
    pub filters: &'r FilterRegistry,
}

impl<'r> Renderer<'r> {
    pub fn render(&self, template: &Template, root: &Data) -> String {
        let scope = Scope::new(root);
        let mut out = String::new();
        self.render_nodes(&template.nodes, &scope, &mut out);
        out
    }

    fn render_nodes(&self, nodes: &[Node], scope: &Scope, out: &mut String) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Interp { key, raw, fallbacks, filters } => {
                    self.render_interp(scope, key, *raw, fallbacks, filters, out);
                }
                Node::Cond { test, consequent, branches, alternate } => {
                    // Branches render in the current scope; no frame is
                    // pushed, and branch tests past the first match are
                    // never evaluated.
                    if eval_test(scope, test) {
                        self.render_nodes(consequent, scope, out);
                    } else if let Some((_, nodes)) =
                        branches.iter().find(|(test, _)| eval_test(scope, test))
                    {
                        self.render_nodes(nodes, scope, out);
                    } else if let Some(nodes) = alternate {
                        self.render_nodes(nodes, scope, out);
                    }
                }
                Node::Each { list, item, index, body } => {
                    self.render_each(scope, list, item, index.as_deref(), body, out);
                }
            }
        }
    }

    fn render_interp(
        &self,
        scope: &Scope,
        key: &str,
        raw: bool,
        fallbacks: &[(FallbackOp, Operand)],
        filters: &[FilterCall],
        out: &mut String,
    ) {
        let mut value = scope.resolve(key);
        for (op, operand) in fallbacks {
            let replace = match op {
                FallbackOp::Or => emptyish(value),
                FallbackOp::Nullish => matches!(value, None | Some(&Data::Null)),
            };
            if replace {
                value = match operand {
                    Operand::Key(key) => scope.resolve(key),
                    Operand::Literal(literal) => Some(literal),
                };
            }
        }

        let rendered = if filters.is_empty() {
            value.map(Data::to_string).unwrap_or_default()
        } else {
            let mut current = value.cloned().unwrap_or(Data::Null);
            for call in filters {
                if let Some(f) = self.filters.get(&call.name) {
                    current = f(current, &call.args);
                }
            }
            current.to_string()
        };

        if raw {
            out.push_str(&rendered);
        } else {
            out.push_str(&escape_html(&rendered));
        }
    }

    fn render_each(
        &self,
        scope: &Scope,
        list: &str,
        item: &str,
        index: Option<&str>,
        body: &[Node],
        out: &mut String,
    ) {
        match scope.resolve(list) {
            Some(Data::Vec(elements)) => {
                for (i, element) in elements.iter().enumerate() {
                    let mut vars: Vec<(&str, Cow<Data>)> = vec![(item, Cow::Borrowed(element))];
                    if let Some(index) = index {
                        vars.push((index, Cow::Owned(Data::Number(i as f64))));
                    }
                    let frame = scope.child(vars);
                    self.render_nodes(body, &frame, out);
                }
            }
            Some(Data::Map(entries)) => {
                // Record iteration: the loop variable binds to a
                // {key, value} pair per entry, in key order.
                for (i, (key, value)) in entries.iter().enumerate() {
                    let mut pair = BTreeMap::new();
                    pair.insert("key".to_string(), Data::String(key.clone()));
                    pair.insert("value".to_string(), value.clone());

                    let mut vars: Vec<(&str, Cow<Data>)> =
                        vec![(item, Cow::Owned(Data::Map(pair)))];
                    if let Some(index) = index {
                        vars.push((index, Cow::Owned(Data::Number(i as f64))));
                    }
                    let frame = scope.child(vars);
                    self.render_nodes(body, &frame, out);
                }
            }
            // Scalars, null, and absent lists render nothing.
            _ => {}
        }
    }
}

fn eval_test(scope: &Scope, test: &TestNode) -> bool {
    match test {
        TestNode::Truthy(operand) => truthy(resolve_operand(scope, operand)),
        TestNode::Compare { left, op, right } => {
            let left = resolve_operand(scope, left);
            let right = resolve_operand(scope, right);
            match op {
                CompareOp::Eq => loose_eq(left, right),
                CompareOp::Ne => !loose_eq(left, right),
                CompareOp::Gt | CompareOp::Lt | CompareOp::Ge | CompareOp::Le => {
                    relational(left, *op, right)
                }
            }
        }
        TestNode::And(children) => children.iter().all(|child| eval_test(scope, child)),
        TestNode::Or(children) => children.iter().any(|child| eval_test(scope, child)),
        TestNode::Not(child) => !eval_test(scope, child),
    }
}

fn resolve_operand<'a>(scope: &'a Scope, operand: &'a Operand) -> Option<&'a Data> {
    match operand {
        Operand::Key(key) => scope.resolve(key),
        Operand::Literal(literal) => Some(literal),
    }
}

/// Loose equality coerces the left side toward the type of the right:
/// number right coerces the left numerically (NaN never equal), boolean
/// right compares truthiness, null right matches null/absent, anything
/// else compares stringified forms.
fn loose_eq(left: Option<&Data>, right: Option<&Data>) -> bool {
    match right {
        None | Some(&Data::Null) => matches!(left, None | Some(&Data::Null)),
        Some(&Data::Number(n)) => left
            .unwrap_or(&Data::Null)
            .coerce_number()
            .is_some_and(|l| l == n),
        Some(&Data::Bool(b)) => truthy(left) == b,
        Some(other) => stringify(left) == other.to_string(),
    }
}

/// Relational operators compare numerically when both sides coerce,
/// falling back to lexicographic string comparison otherwise.
fn relational(left: Option<&Data>, op: CompareOp, right: Option<&Data>) -> bool {
    let ln = left.unwrap_or(&Data::Null).coerce_number();
    let rn = right.unwrap_or(&Data::Null).coerce_number();

    let ordering = match (ln, rn) {
        (Some(l), Some(r)) => match l.partial_cmp(&r) {
            Some(ordering) => ordering,
            // NaN compares false against everything
            None => return false,
        },
        _ => stringify(left).cmp(&stringify(right)),
    };

    match op {
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Eq | CompareOp::Ne => false,
    }
}

fn stringify(value: Option<&Data>) -> String {
    value.map(Data::to_string).unwrap_or_default()
}
