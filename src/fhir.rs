//! FHIR resource shapes exchanged with the terminology server.
//!
//! Only the fields the encoder reads or writes are modelled. Unknown fields are
//! ignored on input. Property data on a [`Coding`] is kept as raw JSON and
//! interpreted by [`crate::properties`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Media type for all terminology requests and responses.
pub const FHIR_JSON: &str = "application/fhir+json";

/// A coded term as it appears in `ValueSet.expansion.contains`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Native `property` elements (FHIR R5 expansions).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property: Vec<Value>,
    /// Extensions, including the pre-adoption property extension.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Value>,
}

impl Coding {
    /// Create a coding with only a code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Set the code system.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the display text.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Append a raw `property` element.
    pub fn with_property(mut self, property: Value) -> Self {
        self.property.push(property);
        self
    }

    /// The identifying part of the coding: `system`, `version` and `code`.
    ///
    /// Display and property data play no part in subsumption.
    pub fn identity(&self) -> Coding {
        Coding {
            system: self.system.clone(),
            version: self.version.clone(),
            code: self.code.clone(),
            ..Coding::default()
        }
    }
}

/// `ValueSet` resource returned by `$expand`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueSet {
    pub expansion: ValueSetExpansion,
}

/// One page of an expansion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueSetExpansion {
    /// Declared cardinality of the whole scope.
    pub total: usize,
    /// Servers omit `contains` for empty pages.
    #[serde(default)]
    pub contains: Vec<Coding>,
}

/// `Parameters` resource sent to `$closure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub resource_type: String,
    pub parameter: Vec<Parameter>,
}

impl Parameters {
    pub fn new(parameter: Vec<Parameter>) -> Self {
        Self {
            resource_type: "Parameters".to_string(),
            parameter,
        }
    }

    /// Value of the first `valueString` parameter with the given name.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.parameter
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.value_string.as_deref())
    }

    /// All `valueCoding` parameters with the given name, in order.
    pub fn codings<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Coding> + 'a {
        self.parameter
            .iter()
            .filter(move |p| p.name == name)
            .filter_map(|p| p.value_coding.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_coding: Option<Coding>,
}

impl Parameter {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_string: Some(value.into()),
            value_coding: None,
        }
    }

    pub fn coding(name: impl Into<String>, value: Coding) -> Self {
        Self {
            name: name.into(),
            value_string: None,
            value_coding: Some(value),
        }
    }
}

/// `ConceptMap` returned by `$closure`.
///
/// A missing `group` means the server found no new relationships.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<ConceptMapGroup>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptMapGroup {
    #[serde(default)]
    pub element: Vec<ConceptMapElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptMapElement {
    pub code: String,
    #[serde(default)]
    pub target: Vec<ConceptMapTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptMapTarget {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equivalence: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coding_identity_drops_display_and_properties() {
        let coding = Coding::new("73211009")
            .with_system("http://snomed.info/sct")
            .with_display("Diabetes mellitus")
            .with_property(serde_json::json!({"code": "inactive", "valueBoolean": false}));

        let identity = coding.identity();
        assert_eq!(identity.code, "73211009");
        assert_eq!(identity.system.as_deref(), Some("http://snomed.info/sct"));
        assert!(identity.display.is_none());
        assert!(identity.property.is_empty());

        let json = serde_json::to_value(&identity).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"system": "http://snomed.info/sct", "code": "73211009"})
        );
    }

    #[test]
    fn test_expansion_without_contains() {
        let vs: ValueSet =
            serde_json::from_str(r#"{"resourceType": "ValueSet", "expansion": {"total": 0}}"#)
                .expect("parse");
        assert_eq!(vs.expansion.total, 0);
        assert!(vs.expansion.contains.is_empty());
    }

    #[test]
    fn test_parameters_wire_format() {
        let params = Parameters::new(vec![
            Parameter::string("name", "abc"),
            Parameter::coding("concept", Coding::new("A")),
        ]);
        let json = serde_json::to_value(&params).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "resourceType": "Parameters",
                "parameter": [
                    {"name": "name", "valueString": "abc"},
                    {"name": "concept", "valueCoding": {"code": "A"}}
                ]
            })
        );
        assert_eq!(params.string("name"), Some("abc"));
        assert_eq!(params.codings("concept").count(), 1);
    }

    #[test]
    fn test_concept_map_without_group() {
        let map: ConceptMap =
            serde_json::from_str(r#"{"resourceType": "ConceptMap", "status": "active"}"#)
                .expect("parse");
        assert!(map.group.is_none());
    }
}
