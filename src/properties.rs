//! Properties: coding attributes to flat feature dictionaries.
//!
//! Expansion entries carry property data in one of two encodings:
//!
//! ```json
//! {"code": "A", "property": [{"code": "inactive", "valueBoolean": false}]}
//! ```
//!
//! or, on servers that pre-adopt the R5 element, as an extension:
//!
//! ```json
//! {"code": "A", "extension": [{
//!     "url": "http://hl7.org/fhir/5.0/StructureDefinition/extension-ValueSet.expansion.contains.property",
//!     "extension": [{"url": "code", "valueCode": "inactive"},
//!                   {"url": "value", "valueBoolean": false}]
//! }]}
//! ```
//!
//! Both are parsed into the same [`Property`] tree. Subproperties nest under
//! their parent, and [`flatten`] turns the tree into a flat mapping keyed by
//! dotted paths such as `609096000.363698007`.

use crate::fhir::Coding;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Pre-adoption extension carrying an expansion property.
pub const PROPERTY_EXTENSION_URL: &str =
    "http://hl7.org/fhir/5.0/StructureDefinition/extension-ValueSet.expansion.contains.property";

/// Keys holding native nested properties. R5 spells it `subProperty`; some
/// servers emit the lowercase form.
const SUBPROPERTY_KEYS: &[&str] = &["subProperty", "subproperty"];

/// Hierarchy links. These duplicate what the closure already encodes.
pub const STRUCTURAL_PROPERTIES: &[&str] = &["parent", "child"];

/// A scalar property value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Interpret a `value[x]` payload.
    ///
    /// `valueCoding` contributes its code. Anything else non-scalar is dropped.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(AttributeValue::Flag(*b)),
            Value::Number(n) => n.as_f64().map(AttributeValue::Number),
            Value::String(s) => Some(AttributeValue::Text(s.clone())),
            Value::Object(obj) => obj
                .get("code")
                .and_then(Value::as_str)
                .map(|code| AttributeValue::Text(code.to_string())),
            Value::Null | Value::Array(_) => None,
        }
    }
}

/// Flattened attributes of one coding, keyed by dotted property path.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A property with optional value and nested subproperties.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub code: String,
    pub value: Option<AttributeValue>,
    pub subproperties: Vec<Property>,
}

impl Property {
    pub fn new(code: impl Into<String>, value: Option<AttributeValue>) -> Self {
        Self {
            code: code.into(),
            value,
            subproperties: Vec::new(),
        }
    }

    pub fn with_subproperty(mut self, subproperty: Property) -> Self {
        self.subproperties.push(subproperty);
        self
    }

    /// Parse a native `property` (or `subproperty`) element.
    pub fn from_element(element: &Value) -> Option<Self> {
        let obj = element.as_object()?;
        let code = obj.get("code")?.as_str()?;

        let mut subproperties: Vec<Property> = SUBPROPERTY_KEYS
            .iter()
            .filter_map(|key| obj.get(*key).and_then(Value::as_array))
            .flatten()
            .filter_map(Property::from_element)
            .collect();
        subproperties.extend(extension_subproperties(obj));

        Some(Self {
            code: code.to_string(),
            value: first_value(obj),
            subproperties,
        })
    }

    /// Parse a property (or subproperty) encoded as an extension.
    ///
    /// The code lives in a child extension with url `code`, the value in one
    /// with url `value`.
    pub fn from_extension(extension: &Value) -> Option<Self> {
        let obj = extension.as_object()?;
        let children = obj.get("extension")?.as_array()?;

        let code = children
            .iter()
            .find(|e| has_url(e, "code"))?
            .get("valueCode")?
            .as_str()?;
        let value = children
            .iter()
            .find(|e| has_url(e, "value"))
            .and_then(Value::as_object)
            .and_then(first_value);

        Some(Self {
            code: code.to_string(),
            value,
            subproperties: extension_subproperties(obj),
        })
    }
}

/// Extract the property tree of a coding.
///
/// Native `property` elements win; the extension encoding is only consulted
/// when no native property is present.
pub fn coding_properties(coding: &Coding) -> Vec<Property> {
    if !coding.property.is_empty() {
        return coding
            .property
            .iter()
            .filter_map(Property::from_element)
            .collect();
    }
    coding
        .extension
        .iter()
        .filter(|e| has_url(e, PROPERTY_EXTENSION_URL))
        .filter_map(Property::from_extension)
        .collect()
}

/// Flatten a property tree into dotted keys.
///
/// Structural properties are skipped along with their subtrees. When a key
/// repeats, the last value wins.
pub fn flatten(properties: &[Property]) -> Attributes {
    properties
        .iter()
        .filter(|p| !STRUCTURAL_PROPERTIES.contains(&p.code.as_str()))
        .flat_map(|p| flatten_property(p, None))
        .collect()
}

/// Flattened attributes of a coding.
pub fn attributes(coding: &Coding) -> Attributes {
    flatten(&coding_properties(coding))
}

fn flatten_property(property: &Property, prefix: Option<&str>) -> Vec<(String, AttributeValue)> {
    let path = make_path(prefix, &property.code);
    let own = property
        .value
        .clone()
        .map(|value| (path.clone(), value));
    let nested = property
        .subproperties
        .iter()
        .flat_map(|sub| flatten_property(sub, Some(path.as_str())));
    own.into_iter().chain(nested).collect()
}

fn make_path(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) => format!("{}.{}", p, key),
        None => key.to_string(),
    }
}

fn first_value(obj: &Map<String, Value>) -> Option<AttributeValue> {
    obj.iter()
        .find(|(k, _)| k.starts_with("value"))
        .and_then(|(_, v)| AttributeValue::from_json(v))
}

fn extension_subproperties(obj: &Map<String, Value>) -> Vec<Property> {
    obj.get("extension")
        .and_then(Value::as_array)
        .map(|exts| {
            exts.iter()
                .filter(|e| has_url(e, "subproperty"))
                .filter_map(Property::from_extension)
                .collect()
        })
        .unwrap_or_default()
}

fn has_url(extension: &Value, url: &str) -> bool {
    extension.get("url").and_then(Value::as_str) == Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> AttributeValue {
        AttributeValue::Text(s.to_string())
    }

    #[test]
    fn test_native_properties() {
        let coding = Coding::new("A")
            .with_property(json!({"code": "inactive", "valueBoolean": false}))
            .with_property(json!({"code": "effectiveTime", "valueString": "20020131"}))
            .with_property(json!({"code": "parent", "valueCode": "B"}));

        let attrs = attributes(&coding);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["inactive"], AttributeValue::Flag(false));
        assert_eq!(attrs["effectiveTime"], text("20020131"));
        assert!(!attrs.contains_key("parent"));
    }

    #[test]
    fn test_extension_properties() {
        let mut coding = Coding::new("A");
        coding.extension.push(json!({
            "url": PROPERTY_EXTENSION_URL,
            "extension": [
                {"url": "code", "valueCode": "status"},
                {"url": "value", "valueCode": "active"}
            ]
        }));
        coding.extension.push(json!({
            "url": "http://example.org/unrelated",
            "valueString": "ignored"
        }));

        let attrs = attributes(&coding);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["status"], text("active"));
    }

    #[test]
    fn test_nested_subproperties() {
        let mut coding = Coding::new("A");
        coding.extension.push(json!({
            "url": PROPERTY_EXTENSION_URL,
            "extension": [
                {"url": "code", "valueCode": "609096000"},
                {"url": "subproperty", "extension": [
                    {"url": "code", "valueCode": "363698007"},
                    {"url": "value", "valueCoding": {"system": "http://snomed.info/sct", "code": "113331007"}},
                    {"url": "subproperty", "extension": [
                        {"url": "code", "valueCode": "depth"},
                        {"url": "value", "valueInteger": 2}
                    ]}
                ]}
            ]
        }));

        let attrs = attributes(&coding);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["609096000.363698007"], text("113331007"));
        assert_eq!(attrs["609096000.363698007.depth"], AttributeValue::Number(2.0));
        // The group itself has no value
        assert!(!attrs.contains_key("609096000"));
    }

    #[test]
    fn test_native_subproperty_element() {
        let coding = Coding::new("A").with_property(json!({
            "code": "role",
            "valueString": "x",
            "subproperty": [{"code": "kind", "valueCode": "y"}]
        }));

        let attrs = attributes(&coding);
        assert_eq!(attrs["role"], text("x"));
        assert_eq!(attrs["role.kind"], text("y"));
    }

    #[test]
    fn test_native_subproperty_r5_spelling() {
        let coding = Coding::new("A").with_property(json!({
            "code": "609096000",
            "subProperty": [{"code": "363698007", "valueCode": "113331007"}]
        }));

        let attrs = attributes(&coding);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["609096000.363698007"], text("113331007"));
    }

    #[test]
    fn test_flatten_is_pure() {
        let tree = vec![
            Property::new("a", Some(text("1")))
                .with_subproperty(Property::new("b", Some(AttributeValue::Number(3.5)))),
            Property::new("child", Some(text("C"))),
        ];

        let first = flatten(&tree);
        let second = flatten(&tree);
        assert_eq!(first, second);
        assert_eq!(first.keys().collect::<Vec<_>>(), vec!["a", "a.b"]);
    }

    #[test]
    fn test_repeated_key_last_wins() {
        let tree = vec![
            Property::new("status", Some(text("draft"))),
            Property::new("status", Some(text("active"))),
        ];
        assert_eq!(flatten(&tree)["status"], text("active"));
    }

    #[test]
    fn test_property_without_code_skipped() {
        let coding = Coding::new("A").with_property(json!({"valueString": "orphan"}));
        assert!(attributes(&coding).is_empty());
    }
}
