use std::sync::Arc;

use serde::Serialize;

use crate::data::Data;
use crate::encoder;
use crate::error::Error;
use crate::filters::{self, DateFormatter, FilterFn, FilterRegistry};
use crate::template::{Renderer, Template};

/// A rendering engine: the filter table plus the render entry points.
///
/// Construction seeds the built-in filters; `register_filter` adds or
/// silently overrides entries, built-ins included. Engines are cheap
/// to share behind a reference and rendering takes `&self`, so one
/// engine can serve many threads once registration is done.
pub struct Engine {
    filters: FilterRegistry,
}

impl Engine {
    pub fn new() -> Engine {
        Engine { filters: FilterRegistry::builtins() }
    }

    /// Register a filter. The name must match `^[a-z]\w*$`;
    /// re-registering an existing name (including a built-in) replaces
    /// it without complaint.
    pub fn register_filter<F>(&mut self, name: &str, f: F) -> Result<(), Error>
    where
        F: Fn(Data, &[Data]) -> Data + Send + Sync + 'static,
    {
        if !filters::valid_name(name) {
            return Err(Error::InvalidFilterName(name.to_string()));
        }
        self.filters.insert(name, Arc::new(f));
        Ok(())
    }

    /// Look up a registered filter by name.
    pub fn filter(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name).map(Arc::as_ref)
    }

    /// Replace the backend of the `dateformat` filter.
    pub fn set_date_formatter<D: DateFormatter + 'static>(&mut self, formatter: D) {
        self.filters.insert("dateformat", filters::date_filter(Arc::new(formatter)));
    }

    /// Parse and render in one step.
    pub fn render<T: Serialize>(&self, source: &str, data: &T) -> Result<String, Error> {
        self.render_template(&crate::compile_str(source), data)
    }

    /// Render a compiled template against any serializable data.
    ///
    /// The only failure mode is the data failing to encode; template
    /// problems never surface as errors.
    pub fn render_template<T: Serialize>(
        &self,
        template: &Template,
        data: &T,
    ) -> Result<String, Error> {
        let data = encoder::to_data(data)?;
        Ok(self.render_data(template, &data))
    }

    /// Render a compiled template against an already-encoded `Data`
    /// tree. Never fails.
    pub fn render_data(&self, template: &Template, data: &Data) -> String {
        Renderer { filters: &self.filters }.render(template, data)
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}
