//! Closure: incremental transitive closure via the `$closure` operation.
//!
//! The server keeps a named closure table. Each update adds a batch of codings
//! to the table and answers with only the relationships that batch revealed,
//! so nothing here has to hold the whole table in memory.

use crate::client::TerminologyClient;
use crate::error::ServiceError;
use crate::fhir::{Coding, ConceptMap, Parameter, Parameters};
use tracing::debug;
use uuid::Uuid;

/// Equivalence marking a subsumption in closure output.
pub const SUBSUMES: &str = "subsumes";

/// `source` is subsumed by (is a descendant of) `target`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubsumptionPair {
    pub source: String,
    pub target: String,
}

impl SubsumptionPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Every code subsumes itself.
    pub fn reflexive(code: &str) -> Self {
        Self::new(code, code)
    }
}

/// A named closure table on the terminology server.
///
/// Updates take `&mut self`: one session has one writer, and batches are
/// applied in the order they are submitted.
pub struct ClosureSession<'a, C: TerminologyClient + ?Sized> {
    client: &'a C,
    name: String,
    batches: usize,
}

impl<'a, C: TerminologyClient + ?Sized> ClosureSession<'a, C> {
    /// Allocate a fresh session name and initialize it on the server.
    pub fn open(client: &'a C) -> Result<Self, ServiceError> {
        let name = Uuid::new_v4().simple().to_string();
        let request = Parameters::new(vec![Parameter::string("name", name.as_str())]);
        client.closure(&request)?;
        debug!(session = %name, "closure initialized");

        Ok(Self {
            client,
            name,
            batches: 0,
        })
    }

    /// Session name used on the server.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of non-empty batches submitted so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Add a batch to the closure and return the pairs it introduced.
    ///
    /// The reflexive pair of every code in the batch is appended after the
    /// server's pairs.
    pub fn update(&mut self, batch: &[Coding]) -> Result<Vec<SubsumptionPair>, ServiceError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut parameter = Vec::with_capacity(batch.len() + 1);
        parameter.push(Parameter::string("name", self.name.as_str()));
        parameter.extend(
            batch
                .iter()
                .map(|coding| Parameter::coding("concept", coding.identity())),
        );

        let concept_map = self.client.closure(&Parameters::new(parameter))?;
        self.batches += 1;

        let mut pairs = subsumption_pairs(&concept_map);
        pairs.extend(batch.iter().map(|coding| SubsumptionPair::reflexive(&coding.code)));
        Ok(pairs)
    }
}

/// Pairs from every `subsumes` target in a closure concept map.
pub fn subsumption_pairs(concept_map: &ConceptMap) -> Vec<SubsumptionPair> {
    let Some(groups) = &concept_map.group else {
        return Vec::new();
    };
    groups
        .iter()
        .flat_map(|group| &group.element)
        .flat_map(|element| {
            element
                .target
                .iter()
                .filter(|target| target.equivalence.as_deref() == Some(SUBSUMES))
                .map(move |target| SubsumptionPair::new(&element.code, &target.code))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ExpandRequest;
    use crate::fhir::ValueSet;
    use std::cell::RefCell;

    /// Records closure requests and replays canned concept maps.
    struct RecordingClient {
        responses: RefCell<Vec<std::result::Result<ConceptMap, ServiceError>>>,
        requests: RefCell<Vec<Parameters>>,
    }

    impl RecordingClient {
        fn new(mut responses: Vec<std::result::Result<ConceptMap, ServiceError>>) -> Self {
            responses.reverse();
            Self {
                responses: RefCell::new(responses),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl TerminologyClient for RecordingClient {
        fn expand(&self, _: &ExpandRequest<'_>) -> std::result::Result<ValueSet, ServiceError> {
            Err(ServiceError::Malformed("not scripted".to_string()))
        }

        fn closure(&self, parameters: &Parameters) -> std::result::Result<ConceptMap, ServiceError> {
            self.requests.borrow_mut().push(parameters.clone());
            self.responses
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok(ConceptMap::default()))
        }
    }

    fn concept_map(json: serde_json::Value) -> ConceptMap {
        serde_json::from_value(json).expect("concept map")
    }

    #[test]
    fn test_open_sends_name_only() {
        let client = RecordingClient::new(vec![]);
        let session = ClosureSession::open(&client).expect("open");

        let requests = client.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].parameter.len(), 1);
        assert_eq!(requests[0].string("name"), Some(session.name()));
        assert_eq!(session.name().len(), 32);
    }

    #[test]
    fn test_session_names_unique() {
        let client = RecordingClient::new(vec![]);
        let a = ClosureSession::open(&client).expect("open");
        let b = ClosureSession::open(&client).expect("open");
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_update_sends_identity_only() {
        let client = RecordingClient::new(vec![]);
        let mut session = ClosureSession::open(&client).expect("open");
        let batch = vec![
            Coding::new("A")
                .with_system("http://snomed.info/sct")
                .with_display("Alpha")
                .with_property(serde_json::json!({"code": "inactive", "valueBoolean": true})),
            Coding::new("B"),
        ];

        session.update(&batch).expect("update");

        let requests = client.requests.borrow();
        let update = &requests[1];
        assert_eq!(update.string("name"), Some(session.name()));
        let concepts: Vec<&Coding> = update.codings("concept").collect();
        assert_eq!(concepts.len(), 2);
        assert_eq!(concepts[0], &batch[0].identity());
        assert!(concepts[0].display.is_none());
        assert!(concepts[0].property.is_empty());
    }

    #[test]
    fn test_update_extracts_subsumes_and_reflexive() {
        let client = RecordingClient::new(vec![
            Ok(ConceptMap::default()),
            Ok(concept_map(serde_json::json!({
                "resourceType": "ConceptMap",
                "group": [{
                    "element": [{
                        "code": "A",
                        "target": [
                            {"code": "B", "equivalence": "subsumes"},
                            {"code": "C", "equivalence": "specializes"}
                        ]
                    }]
                }]
            }))),
        ]);
        let mut session = ClosureSession::open(&client).expect("open");

        let pairs = session
            .update(&[Coding::new("A"), Coding::new("B")])
            .expect("update");

        assert_eq!(
            pairs,
            vec![
                SubsumptionPair::new("A", "B"),
                SubsumptionPair::reflexive("A"),
                SubsumptionPair::reflexive("B"),
            ]
        );
        assert_eq!(session.batches(), 1);
    }

    #[test]
    fn test_no_group_yields_reflexive_only() {
        let client = RecordingClient::new(vec![]);
        let mut session = ClosureSession::open(&client).expect("open");

        let pairs = session.update(&[Coding::new("C")]).expect("update");
        assert_eq!(pairs, vec![SubsumptionPair::reflexive("C")]);
    }

    #[test]
    fn test_empty_batch_skips_server() {
        let client = RecordingClient::new(vec![]);
        let mut session = ClosureSession::open(&client).expect("open");

        let pairs = session.update(&[]).expect("update");
        assert!(pairs.is_empty());
        assert_eq!(client.requests.borrow().len(), 1);
        assert_eq!(session.batches(), 0);
    }

    #[test]
    fn test_open_failure() {
        let client = RecordingClient::new(vec![Err(ServiceError::Status {
            status: 500,
            url: "http://localhost/$closure".to_string(),
            body: String::new(),
        })]);
        assert!(matches!(
            ClosureSession::open(&client),
            Err(ServiceError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn test_update_failure() {
        let client = RecordingClient::new(vec![
            Ok(ConceptMap::default()),
            Err(ServiceError::Malformed("truncated".to_string())),
        ]);
        let mut session = ClosureSession::open(&client).expect("open");
        assert!(session.update(&[Coding::new("A")]).is_err());
    }
}
