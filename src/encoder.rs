use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

// for bug!
use log::error;

use serde::ser::{self, Serialize};

use crate::data::Data;

/// Error type to represent encoding failure.
///
/// This type is not intended to be matched exhaustively as new variants
/// may be added in future without a version bump.
#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    KeyIsNotString,
    Message(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::KeyIsNotString => write!(f, "map key is not a string"),
            Error::Message(ref msg) => f.write_str(msg),
        }
    }
}

impl StdError for Error {}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

/// Convert any `Serialize` value into a `Data` tree.
pub fn to_data<T: Serialize>(value: &T) -> Result<Data, Error> {
    value.serialize(Encoder)
}

/// `Encoder` is a `serde::Serializer` whose output is a `Data` value.
pub struct Encoder;

impl ser::Serializer for Encoder {
    type Ok = Data;
    type Error = Error;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeDataMap;
    type SerializeStruct = SerializeDataMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Data, Error> {
        Ok(Data::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_i16(self, v: i16) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_i32(self, v: i32) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_i64(self, v: i64) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u8(self, v: u8) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u16(self, v: u16) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u32(self, v: u32) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u64(self, v: u64) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f32(self, v: f32) -> Result<Data, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<Data, Error> {
        Ok(Data::Number(v))
    }

    fn serialize_char(self, v: char) -> Result<Data, Error> {
        Ok(Data::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Data, Error> {
        Ok(Data::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Data, Error> {
        Ok(Data::Vec(v.iter().map(|&b| Data::Number(b as f64)).collect()))
    }

    fn serialize_none(self) -> Result<Data, Error> {
        Ok(Data::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Data, Error> {
        value.serialize(Encoder)
    }

    fn serialize_unit(self) -> Result<Data, Error> {
        Ok(Data::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Data, Error> {
        Ok(Data::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Data, Error> {
        Ok(Data::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Data, Error> {
        value.serialize(Encoder)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Data, Error> {
        let mut map = BTreeMap::new();
        map.insert(variant.to_string(), value.serialize(Encoder)?);
        Ok(Data::Map(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec, Error> {
        Ok(SerializeVec { vec: Vec::with_capacity(len.unwrap_or(0)) })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeVec, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant, Error> {
        Ok(SerializeTupleVariant { variant, vec: Vec::with_capacity(len) })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeDataMap, Error> {
        Ok(SerializeDataMap { map: BTreeMap::new(), key: None })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<SerializeDataMap, Error> {
        self.serialize_map(None)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeStructVariant, Error> {
        Ok(SerializeStructVariant { variant, map: BTreeMap::new() })
    }
}

pub struct SerializeVec {
    vec: Vec<Data>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Data;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.vec.push(value.serialize(Encoder)?);
        Ok(())
    }

    fn end(self) -> Result<Data, Error> {
        Ok(Data::Vec(self.vec))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Data;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Data, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Data, Error> {
        ser::SerializeSeq::end(self)
    }
}

pub struct SerializeTupleVariant {
    variant: &'static str,
    vec: Vec<Data>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.vec.push(value.serialize(Encoder)?);
        Ok(())
    }

    fn end(self) -> Result<Data, Error> {
        let mut map = BTreeMap::new();
        map.insert(self.variant.to_string(), Data::Vec(self.vec));
        Ok(Data::Map(map))
    }
}

pub struct SerializeDataMap {
    map: BTreeMap<String, Data>,
    key: Option<String>,
}

impl ser::SerializeMap for SerializeDataMap {
    type Ok = Data;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Error> {
        match key.serialize(Encoder)? {
            Data::String(s) => {
                self.key = Some(s);
                Ok(())
            }
            _ => Err(Error::KeyIsNotString),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let key = match self.key.take() {
            Some(key) => key,
            None => {
                bug!("serialize_value called before serialize_key");
                return Err(Error::KeyIsNotString);
            }
        };
        self.map.insert(key, value.serialize(Encoder)?);
        Ok(())
    }

    fn end(self) -> Result<Data, Error> {
        Ok(Data::Map(self.map))
    }
}

impl ser::SerializeStruct for SerializeDataMap {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map.insert(key.to_string(), value.serialize(Encoder)?);
        Ok(())
    }

    fn end(self) -> Result<Data, Error> {
        Ok(Data::Map(self.map))
    }
}

pub struct SerializeStructVariant {
    variant: &'static str,
    map: BTreeMap<String, Data>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map.insert(key.to_string(), value.serialize(Encoder)?);
        Ok(())
    }

    fn end(self) -> Result<Data, Error> {
        let mut map = BTreeMap::new();
        map.insert(self.variant.to_string(), Data::Map(self.map));
        Ok(Data::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::to_data;
    use crate::data::Data;

    #[test]
    fn scalars() {
        assert_eq!(to_data(&true), Ok(Data::Bool(true)));
        assert_eq!(to_data(&7u8), Ok(Data::Number(7.0)));
        assert_eq!(to_data(&-2.5f64), Ok(Data::Number(-2.5)));
        assert_eq!(to_data(&"hi"), Ok(Data::String("hi".into())));
        assert_eq!(to_data(&()), Ok(Data::Null));
        assert_eq!(to_data(&Option::<u32>::None), Ok(Data::Null));
        assert_eq!(to_data(&Some(3)), Ok(Data::Number(3.0)));
    }

    #[test]
    fn collections() {
        assert_eq!(
            to_data(&vec![1, 2]),
            Ok(Data::Vec(vec![Data::Number(1.0), Data::Number(2.0)]))
        );

        let mut source = BTreeMap::new();
        source.insert("a", 1);
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Data::Number(1.0));
        assert_eq!(to_data(&source), Ok(Data::Map(expected)));
    }

    #[test]
    fn non_string_keys_are_rejected() {
        let mut source = BTreeMap::new();
        source.insert(1, "one");
        assert_eq!(to_data(&source), Err(super::Error::KeyIsNotString));
    }
}
