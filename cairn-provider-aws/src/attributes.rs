//! Typed access to generic resource attributes

use std::collections::HashMap;
use std::ops::RangeInclusive;

use cairn_core::parameter::{Parameter, ParameterSet};
use cairn_core::provider::{ProviderError, ProviderResult};
use cairn_core::resource::{Resource, ResourceId, Value};

/// Read-only view over an attribute map that reports errors against a resource
#[derive(Clone, Copy)]
pub(crate) struct Attributes<'a> {
    id: &'a ResourceId,
    attrs: &'a HashMap<String, Value>,
}

impl<'a> Attributes<'a> {
    pub(crate) fn new(id: &'a ResourceId, attrs: &'a HashMap<String, Value>) -> Self {
        Self { id, attrs }
    }

    pub(crate) fn of(resource: &'a Resource) -> Self {
        Self::new(&resource.id, &resource.attributes)
    }

    fn invalid(&self, key: &str, expected: &str) -> ProviderError {
        ProviderError::new(format!("Attribute '{}' must be {}", key, expected))
            .for_resource(self.id.clone())
    }

    pub(crate) fn required_string(&self, key: &str) -> ProviderResult<String> {
        self.string(key)?.ok_or_else(|| {
            ProviderError::new(format!("Attribute '{}' is required", key))
                .for_resource(self.id.clone())
        })
    }

    pub(crate) fn string(&self, key: &str) -> ProviderResult<Option<String>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(key, "a string")),
        }
    }

    pub(crate) fn int(&self, key: &str) -> ProviderResult<Option<i64>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(Value::Int(i)) => Ok(Some(*i)),
            Some(_) => Err(self.invalid(key, "an integer")),
        }
    }

    /// Integer attribute that must fall in `range`, narrowed to the SDK's i32
    pub(crate) fn int_in_range(
        &self,
        key: &str,
        range: RangeInclusive<i64>,
    ) -> ProviderResult<Option<i32>> {
        match self.int(key)? {
            None => Ok(None),
            Some(i) if range.contains(&i) => Ok(Some(i as i32)),
            Some(i) => Err(ProviderError::new(format!(
                "Attribute '{}' must be between {} and {}, got {}",
                key,
                range.start(),
                range.end(),
                i
            ))
            .for_resource(self.id.clone())),
        }
    }

    pub(crate) fn string_list(&self, key: &str) -> ProviderResult<Option<Vec<String>>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(key, "a list of strings"))
                })
                .collect::<ProviderResult<Vec<_>>>()
                .map(Some),
            Some(_) => Err(self.invalid(key, "a list of strings")),
        }
    }

    pub(crate) fn nested(&self, key: &str) -> ProviderResult<Option<Attributes<'a>>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(Value::Map(map)) => Ok(Some(Attributes::new(self.id, map))),
            Some(_) => Err(self.invalid(key, "a map")),
        }
    }

    /// Parameters declared as a list of `{name, value}` maps
    pub(crate) fn parameters(&self, key: &str) -> ProviderResult<ParameterSet> {
        let items = match self.attrs.get(key) {
            None => return Ok(ParameterSet::new()),
            Some(Value::List(items)) => items,
            Some(_) => return Err(self.invalid(key, "a list of {name, value} maps")),
        };

        let mut parameters = Vec::with_capacity(items.len());
        for item in items {
            let entry = item
                .as_map()
                .ok_or_else(|| self.invalid(key, "a list of {name, value} maps"))?;
            let entry = Attributes::new(self.id, entry);
            parameters.push(Parameter::new(
                entry.required_string("name")?,
                entry.required_string("value")?,
            ));
        }

        ParameterSet::from_parameters(parameters)
            .map_err(|e| ProviderError::new("Invalid parameters").for_resource(self.id.clone()).with_cause(e))
    }
}

/// Render parameters back into the `{name, value}` list shape
pub(crate) fn parameters_value(parameters: &ParameterSet) -> Value {
    Value::List(
        parameters
            .iter()
            .map(|(name, value)| {
                Value::Map(HashMap::from([
                    ("name".to_string(), Value::String(name.to_string())),
                    ("value".to_string(), Value::String(value.to_string())),
                ]))
            })
            .collect(),
    )
}

/// Builder for attribute maps read back from the remote API
#[derive(Default)]
pub(crate) struct AttributeMap {
    attrs: HashMap<String, Value>,
}

impl AttributeMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, key: &str, value: Value) -> &mut Self {
        self.attrs.insert(key.to_string(), value);
        self
    }

    pub(crate) fn string(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.attrs
                .insert(key.to_string(), Value::String(v.to_string()));
        }
        self
    }

    pub(crate) fn int(&mut self, key: &str, value: Option<i64>) -> &mut Self {
        if let Some(v) = value {
            self.attrs.insert(key.to_string(), Value::Int(v));
        }
        self
    }

    pub(crate) fn string_list(&mut self, key: &str, values: &[String]) -> &mut Self {
        if !values.is_empty() {
            self.attrs
                .insert(key.to_string(), Value::string_list(values.iter().cloned()));
        }
        self
    }

    pub(crate) fn build(self) -> HashMap<String, Value> {
        self.attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(attrs: Vec<(&str, Value)>) -> Resource {
        attrs
            .into_iter()
            .fold(Resource::new("test", "example"), |r, (k, v)| {
                r.with_attribute(k, v)
            })
    }

    fn param(name: &str, value: &str) -> Value {
        Value::Map(HashMap::from([
            ("name".to_string(), Value::String(name.to_string())),
            ("value".to_string(), Value::String(value.to_string())),
        ]))
    }

    #[test]
    fn reads_typed_values() {
        let r = resource(vec![
            ("name", Value::String("cache".to_string())),
            ("max_size", Value::Int(10)),
            ("subnet_ids", Value::string_list(["a", "b"])),
        ]);
        let attrs = Attributes::of(&r);

        assert_eq!(attrs.required_string("name").unwrap(), "cache");
        assert_eq!(attrs.int_in_range("max_size", 1..=25).unwrap(), Some(10));
        assert_eq!(
            attrs.string_list("subnet_ids").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(attrs.string("missing").unwrap(), None);
    }

    #[test]
    fn rejects_wrong_types_and_ranges() {
        let r = resource(vec![
            ("name", Value::Int(1)),
            ("max_size", Value::Int(26)),
        ]);
        let attrs = Attributes::of(&r);

        assert!(attrs.required_string("name").is_err());
        assert!(attrs.required_string("absent").is_err());
        let err = attrs.int_in_range("max_size", 1..=25).unwrap_err();
        assert!(err.to_string().contains("between 1 and 25"));
    }

    #[test]
    fn parameters_round_trip_through_values() {
        let r = resource(vec![(
            "parameter",
            Value::List(vec![param("appendonly", "yes"), param("appendfsync", "always")]),
        )]);
        let set = Attributes::of(&r).parameters("parameter").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("appendfsync"), Some("always"));

        let value = parameters_value(&set);
        let again = Attributes::new(&r.id, &HashMap::from([("parameter".to_string(), value)]))
            .parameters("parameter")
            .unwrap();
        assert_eq!(again, set);
    }

    #[test]
    fn conflicting_parameters_are_an_error() {
        let r = resource(vec![(
            "parameter",
            Value::List(vec![param("appendonly", "yes"), param("appendonly", "no")]),
        )]);
        assert!(Attributes::of(&r).parameters("parameter").is_err());
    }
}
