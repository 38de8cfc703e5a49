//! Verification of untyped option maps
//!
//! Requests that arrive as loose JSON (the configuration file, the command
//! line) are checked against a [`Schema`] before they are turned into typed
//! values. A schema names every recognized field together with a [`Rule`].

use serde_json::{Map, Value};

use crate::error::{DumonError, Result};

/// Untyped option map, as read from JSON
pub type Options = Map<String, Value>;

/// What a schema expects of one field
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Field has to be present and non-null
    Mandatory,
    /// Field may or may not be present
    Optional,
    /// Field value has to be one of the listed values (absence counts as null)
    OneOf(Vec<Value>),
    /// Field may be absent; `verify_and_sanitize` fills in the value when it is
    Default(Value),
}

/// Ordered set of field rules
#[derive(Debug, Clone, Default)]
pub struct Schema {
    rules: Vec<(String, Rule)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rule: Rule) -> Self {
        self.rules.retain(|(existing, _)| existing != name);
        self.rules.push((name.to_string(), rule));
        self
    }

    pub fn mandatory(self, name: &str) -> Self {
        self.field(name, Rule::Mandatory)
    }

    pub fn optional(self, name: &str) -> Self {
        self.field(name, Rule::Optional)
    }

    pub fn one_of<I, V>(self, name: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.field(name, Rule::OneOf(allowed.into_iter().map(Into::into).collect()))
    }

    pub fn default_value(self, name: &str, value: impl Into<Value>) -> Self {
        self.field(name, Rule::Default(value.into()))
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rule)| rule)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Verifies `options` against `schema` and returns them unchanged.
///
/// Fails with [`DumonError::UnknownField`] for a field the schema does not
/// declare, [`DumonError::MissingField`] for an absent or null mandatory field
/// and [`DumonError::InvalidValue`] for a value outside its allow-list.
pub fn verify(options: &Options, schema: &Schema) -> Result<()> {
    if schema.is_empty() {
        return Err(DumonError::invalid_value("schema", "{}", "at least one field"));
    }

    if let Some(unknown) = options.keys().find(|key| schema.rule(key).is_none()) {
        return Err(DumonError::UnknownField(unknown.clone()));
    }

    for (name, rule) in &schema.rules {
        match rule {
            Rule::Mandatory => {
                if options.get(name).is_none_or(Value::is_null) {
                    return Err(DumonError::MissingField(name.clone()));
                }
            }
            Rule::OneOf(allowed) => {
                let value = options.get(name).unwrap_or(&Value::Null);
                if !allowed.contains(value) {
                    return Err(DumonError::invalid_value(
                        name.as_str(),
                        value,
                        format!("one of {}", Value::Array(allowed.clone())),
                    ));
                }
            }
            Rule::Optional | Rule::Default(_) => {}
        }
    }

    Ok(())
}

/// Same as [`verify`], then fills in declared defaults for absent fields.
///
/// An explicitly supplied value (an explicit null included) is never replaced.
pub fn verify_and_sanitize(mut options: Options, schema: &Schema) -> Result<Options> {
    verify(&options, schema)?;

    for (name, rule) in &schema.rules {
        if let Rule::Default(value) = rule {
            if !value.is_null() && !options.contains_key(name) {
                options.insert(name.clone(), value.clone());
            }
        }
    }

    Ok(options)
}
