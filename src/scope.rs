//! Identifier resolution against a chain of lookup frames.
//!
//! The root frame is the caller's data map. Loop bodies push child
//! frames carrying their one or two loop bindings; frames borrow their
//! parent rather than copying it, so shadowing is cheap and nothing
//! leaks out of a loop body.

use std::borrow::Cow;

use crate::data::Data;

pub(crate) struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    vars: Vec<(&'a str, Cow<'a, Data>)>,
    root: &'a Data,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Data) -> Scope<'a> {
        Scope { parent: None, vars: Vec::new(), root }
    }

    pub fn child(&'a self, vars: Vec<(&'a str, Cow<'a, Data>)>) -> Scope<'a> {
        Scope { parent: Some(self), vars, root: self.root }
    }

    /// Resolve a dot-path. Only the first segment consults the frame
    /// chain (innermost first, then the root map); the remaining
    /// segments resolve strictly inside the value that lookup
    /// produced. Only map entries are readable: there is no other
    /// lookup channel, so adversarial data cannot reach anything a
    /// template did not name.
    pub fn resolve(&self, path: &str) -> Option<&Data> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        if first.is_empty() {
            return None;
        }

        let mut value = self.lookup(first)?;
        for segment in segments {
            if segment.is_empty() {
                return None;
            }
            value = match *value {
                Data::Map(ref entries) => entries.get(segment)?,
                _ => return None,
            };
        }
        Some(value)
    }

    fn lookup(&self, name: &str) -> Option<&Data> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some((_, value)) = scope.vars.iter().rev().find(|(var, _)| *var == name) {
                return Some(value.as_ref());
            }
            frame = scope.parent;
        }
        match *self.root {
            Data::Map(ref entries) => entries.get(name),
            _ => None,
        }
    }
}

/// Truthiness rule used by conditional tests: collections are truthy
/// iff non-empty, everything else follows ordinary boolean coercion.
pub(crate) fn truthy(value: Option<&Data>) -> bool {
    match value {
        None | Some(&Data::Null) => false,
        Some(&Data::Bool(b)) => b,
        Some(&Data::Number(n)) => n != 0.0 && !n.is_nan(),
        Some(Data::String(s)) => !s.is_empty(),
        Some(Data::Vec(v)) => !v.is_empty(),
        Some(Data::Map(m)) => !m.is_empty(),
    }
}

/// Emptiness rule used by the `||` fallback operator. Distinct from
/// truthiness: `0` and `false` are not empty.
pub(crate) fn emptyish(value: Option<&Data>) -> bool {
    match value {
        None | Some(&Data::Null) => true,
        Some(Data::String(s)) => s.is_empty(),
        Some(Data::Vec(v)) => v.is_empty(),
        Some(Data::Map(m)) => m.is_empty(),
        Some(&Data::Bool(_)) | Some(&Data::Number(_)) => false,
    }
}
