use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::Data;
use crate::encoder;
use crate::error::Error;

/// `MapBuilder` is a helper type that construct `Data` types.
pub struct MapBuilder {
    data: BTreeMap<String, Data>,
}

impl MapBuilder {
    /// Create a `MapBuilder`
    pub fn new() -> MapBuilder {
        MapBuilder { data: BTreeMap::new() }
    }

    /// Add an `Serialize` value to the `MapBuilder`.
    ///
    /// ```rust
    /// use stencil::MapBuilder;
    /// let data = MapBuilder::new()
    ///     .insert("name", &"Jane Austen").expect("could not encode name")
    ///     .insert("age", &41usize).expect("could not encode age")
    ///     .build();
    /// ```
    pub fn insert<K: ToString, T: Serialize>(self, key: K, value: &T) -> Result<MapBuilder, Error> {
        let MapBuilder { mut data } = self;
        let value = encoder::to_data(value)?;
        data.insert(key.to_string(), value);
        Ok(MapBuilder { data })
    }

    /// Add a `String` to the `MapBuilder`.
    ///
    /// ```rust
    /// use stencil::MapBuilder;
    /// let data = MapBuilder::new()
    ///     .insert_str("name", "Jane Austen")
    ///     .build();
    /// ```
    pub fn insert_str<K: ToString, V: ToString>(self, key: K, value: V) -> MapBuilder {
        let MapBuilder { mut data } = self;
        data.insert(key.to_string(), Data::String(value.to_string()));
        MapBuilder { data }
    }

    /// Add a `bool` to the `MapBuilder`.
    ///
    /// ```rust
    /// use stencil::MapBuilder;
    /// let data = MapBuilder::new()
    ///     .insert_bool("show", true)
    ///     .build();
    /// ```
    pub fn insert_bool<K: ToString>(self, key: K, value: bool) -> MapBuilder {
        let MapBuilder { mut data } = self;
        data.insert(key.to_string(), Data::Bool(value));
        MapBuilder { data }
    }

    /// Add a number to the `MapBuilder`.
    ///
    /// ```rust
    /// use stencil::MapBuilder;
    /// let data = MapBuilder::new()
    ///     .insert_num("count", 7.0)
    ///     .build();
    /// ```
    pub fn insert_num<K: ToString>(self, key: K, value: f64) -> MapBuilder {
        let MapBuilder { mut data } = self;
        data.insert(key.to_string(), Data::Number(value));
        MapBuilder { data }
    }

    /// Add a `Vec` to the `MapBuilder`.
    ///
    /// ```rust
    /// use stencil::MapBuilder;
    /// let data = MapBuilder::new()
    ///     .insert_vec("authors", |builder| {
    ///         builder
    ///             .push_str("Jane Austen")
    ///             .push_str("Lewis Carroll")
    ///     })
    ///     .build();
    /// ```
    pub fn insert_vec<K, F>(self, key: K, f: F) -> MapBuilder
    where
        K: ToString,
        F: FnOnce(VecBuilder) -> VecBuilder,
    {
        let MapBuilder { mut data } = self;
        let builder = f(VecBuilder::new());
        data.insert(key.to_string(), builder.build());
        MapBuilder { data }
    }

    /// Add a `Map` to the `MapBuilder`.
    ///
    /// ```rust
    /// use stencil::MapBuilder;
    /// let data = MapBuilder::new()
    ///     .insert_map("person1", |builder| {
    ///         builder
    ///             .insert_str("first_name", "Jane")
    ///             .insert_str("last_name", "Austen")
    ///     })
    ///     .build();
    /// ```
    pub fn insert_map<K, F>(self, key: K, f: F) -> MapBuilder
    where
        K: ToString,
        F: FnOnce(MapBuilder) -> MapBuilder,
    {
        let MapBuilder { mut data } = self;
        let builder = f(MapBuilder::new());
        data.insert(key.to_string(), builder.build());
        MapBuilder { data }
    }

    /// Return the built `Data`.
    pub fn build(self) -> Data {
        Data::Map(self.data)
    }
}

impl Default for MapBuilder {
    fn default() -> MapBuilder {
        MapBuilder::new()
    }
}

pub struct VecBuilder {
    data: Vec<Data>,
}

impl VecBuilder {
    /// Create a `VecBuilder`
    pub fn new() -> VecBuilder {
        VecBuilder { data: Vec::new() }
    }

    /// Add an `Serialize` value to the `VecBuilder`.
    ///
    /// ```rust
    /// use stencil::VecBuilder;
    /// let data = VecBuilder::new()
    ///     .push(&"Jane Austen").expect("could not encode")
    ///     .push(&41usize).expect("could not encode")
    ///     .build();
    /// ```
    pub fn push<T: Serialize>(self, value: &T) -> Result<VecBuilder, Error> {
        let VecBuilder { mut data } = self;
        let value = encoder::to_data(value)?;
        data.push(value);
        Ok(VecBuilder { data })
    }

    /// Add a `String` to the `VecBuilder`.
    ///
    /// ```rust
    /// use stencil::VecBuilder;
    /// let data = VecBuilder::new()
    ///     .push_str("Jane Austen")
    ///     .push_str("Lewis Carroll")
    ///     .build();
    /// ```
    pub fn push_str<T: ToString>(self, value: T) -> VecBuilder {
        let VecBuilder { mut data } = self;
        data.push(Data::String(value.to_string()));
        VecBuilder { data }
    }

    /// Add a `bool` to the `VecBuilder`.
    pub fn push_bool(self, value: bool) -> VecBuilder {
        let VecBuilder { mut data } = self;
        data.push(Data::Bool(value));
        VecBuilder { data }
    }

    /// Add a number to the `VecBuilder`.
    pub fn push_num(self, value: f64) -> VecBuilder {
        let VecBuilder { mut data } = self;
        data.push(Data::Number(value));
        VecBuilder { data }
    }

    /// Add a `Vec` to the `VecBuilder`.
    pub fn push_vec<F>(self, f: F) -> VecBuilder
    where
        F: FnOnce(VecBuilder) -> VecBuilder,
    {
        let VecBuilder { mut data } = self;
        let builder = f(VecBuilder::new());
        data.push(builder.build());
        VecBuilder { data }
    }

    /// Add a `Map` to the `VecBuilder`.
    ///
    /// ```rust
    /// use stencil::VecBuilder;
    /// let data = VecBuilder::new()
    ///     .push_map(|builder| {
    ///         builder
    ///             .insert_str("first_name", "Jane")
    ///             .insert_str("last_name", "Austen")
    ///     })
    ///     .build();
    /// ```
    pub fn push_map<F>(self, f: F) -> VecBuilder
    where
        F: FnOnce(MapBuilder) -> MapBuilder,
    {
        let VecBuilder { mut data } = self;
        let builder = f(MapBuilder::new());
        data.push(builder.build());
        VecBuilder { data }
    }

    /// Return the built `Data`.
    pub fn build(self) -> Data {
        Data::Vec(self.data)
    }
}

impl Default for VecBuilder {
    fn default() -> VecBuilder {
        VecBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{MapBuilder, VecBuilder};
    use crate::data::Data;

    #[test]
    fn test_empty_builders() {
        assert_eq!(MapBuilder::new().build(), Data::Map(BTreeMap::new()));
        assert_eq!(VecBuilder::new().build(), Data::Vec(Vec::new()));
    }

    #[test]
    fn test_builders() {
        let mut pride_and_prejudice = BTreeMap::new();
        pride_and_prejudice
            .insert("title".to_string(), Data::String("Pride and Prejudice".to_string()));
        pride_and_prejudice.insert("publish_date".to_string(), Data::Number(1813.0));

        let mut m = BTreeMap::new();
        m.insert("first_name".to_string(), Data::String("Jane".to_string()));
        m.insert("last_name".to_string(), Data::String("Austen".to_string()));
        m.insert("age".to_string(), Data::Number(41.0));
        m.insert("died".to_string(), Data::Bool(true));
        m.insert(
            "works".to_string(),
            Data::Vec(vec![
                Data::String("Sense and Sensibility".to_string()),
                Data::Map(pride_and_prejudice),
            ]),
        );

        let data = MapBuilder::new()
            .insert_str("first_name", "Jane")
            .insert_str("last_name", "Austen")
            .insert_num("age", 41.0)
            .insert_bool("died", true)
            .insert_vec("works", |builder| {
                builder
                    .push_str("Sense and Sensibility")
                    .push_map(|builder| {
                        builder
                            .insert_str("title", "Pride and Prejudice")
                            .insert_num("publish_date", 1813.0)
                    })
            })
            .build();

        assert_eq!(data, Data::Map(m));
    }

    #[test]
    fn test_serialize_insert() {
        let data = MapBuilder::new()
            .insert("tags", &vec!["a", "b"])
            .unwrap()
            .build();

        let mut m = BTreeMap::new();
        m.insert(
            "tags".to_string(),
            Data::Vec(vec![Data::String("a".to_string()), Data::String("b".to_string())]),
        );
        assert_eq!(data, Data::Map(m));
    }
}
