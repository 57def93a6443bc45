use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// `Data` is the value model templates are rendered against.
///
/// Values are plain trees: there is no function variant, so nothing a
/// template resolves can ever execute code. Maps use `BTreeMap` so that
/// record iteration (`{% each map as entry %}`) has a deterministic
/// enumeration order.
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Vec(Vec<Data>),
    Map(BTreeMap<String, Data>),
}

impl Data {
    /// Numeric coercion used by comparison operators and the number
    /// filters. `None` means the value has no numeric interpretation
    /// (the NaN case of the comparison rules).
    pub(crate) fn coerce_number(&self) -> Option<f64> {
        match *self {
            Data::Number(n) => Some(n),
            Data::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Data::Null => Some(0.0),
            Data::String(ref s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse().ok()
                }
            }
            Data::Vec(_) | Data::Map(_) => None,
        }
    }
}

/// The output stringification: `Null` is empty, strings pass through
/// unchanged, integral numbers print without a decimal point, vectors
/// join their elements with commas and maps print as nothing.
impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Data::Null | Data::Map(_) => Ok(()),
            Data::Bool(b) => write!(f, "{}", b),
            Data::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
                    write!(f, "{}", n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Data::String(ref s) => f.write_str(s),
            Data::Vec(ref values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", value)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Data::Null => serializer.serialize_unit(),
            Data::Bool(b) => serializer.serialize_bool(b),
            Data::Number(n) => serializer.serialize_f64(n),
            Data::String(ref s) => serializer.serialize_str(s),
            Data::Vec(ref values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Data::Map(ref entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
