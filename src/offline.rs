//! In-memory terminology server.
//!
//! [`OfflineTerminology`] serves a fixed list of codings and answers closure
//! requests from a declared is-a hierarchy. It follows the same contract as a
//! real server: expansion pages are cut at `offset`/`count`, closure sessions
//! are keyed by name, and each update reports only relationships involving
//! codes new to the session.

use crate::client::{ExpandRequest, TerminologyClient};
use crate::closure::SUBSUMES;
use crate::error::ServiceError;
use crate::fhir::{
    Coding, ConceptMap, ConceptMapElement, ConceptMapGroup, ConceptMapTarget, Parameters, ValueSet,
    ValueSetExpansion,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Terminology answered from memory.
#[derive(Debug, Default)]
pub struct OfflineTerminology {
    codings: Vec<Coding>,
    parents: HashMap<String, Vec<String>>,
    sessions: RefCell<HashMap<String, Vec<String>>>,
}

impl OfflineTerminology {
    pub fn new(codings: Vec<Coding>) -> Self {
        Self {
            codings,
            ..Self::default()
        }
    }

    /// Declare that `child` is a direct descendant of `parent`.
    pub fn with_parent(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.parents
            .entry(child.into())
            .or_default()
            .push(parent.into());
        self
    }

    /// Names of the closure sessions opened so far.
    pub fn session_names(&self) -> Vec<String> {
        self.sessions.borrow().keys().cloned().collect()
    }

    /// Transitive ancestors of `code`, excluding itself.
    pub fn ancestors(&self, code: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = vec![code];
        while let Some(current) = stack.pop() {
            for parent in self.parents.get(current).into_iter().flatten() {
                if parent != code && seen.insert(parent.clone()) {
                    stack.push(parent);
                }
            }
        }
        seen
    }

    fn is_a(&self, ancestors: &mut HashMap<String, HashSet<String>>, child: &str, parent: &str) -> bool {
        ancestors
            .entry(child.to_string())
            .or_insert_with(|| self.ancestors(child))
            .contains(parent)
    }

    fn page(&self, request: &ExpandRequest<'_>) -> Vec<Coding> {
        let all = request.properties.iter().any(|p| p == "*");
        self.codings
            .iter()
            .skip(request.offset)
            .take(request.count)
            .map(|coding| {
                let mut coding = coding.clone();
                coding.property.retain(|p| {
                    all || p
                        .get("code")
                        .and_then(|c| c.as_str())
                        .is_some_and(|c| request.properties.iter().any(|r| r == c))
                });
                coding
            })
            .collect()
    }
}

impl TerminologyClient for OfflineTerminology {
    fn expand(&self, request: &ExpandRequest<'_>) -> Result<ValueSet, ServiceError> {
        Ok(ValueSet {
            expansion: ValueSetExpansion {
                total: self.codings.len(),
                contains: self.page(request),
            },
        })
    }

    fn closure(&self, parameters: &Parameters) -> Result<ConceptMap, ServiceError> {
        let name = parameters
            .string("name")
            .ok_or_else(|| ServiceError::Malformed("closure request without name".to_string()))?;
        let mut sessions = self.sessions.borrow_mut();
        let concepts: Vec<&Coding> = parameters.codings("concept").collect();

        if concepts.is_empty() {
            sessions.insert(name.to_string(), Vec::new());
            return Ok(ConceptMap::default());
        }

        let known = sessions.get_mut(name).ok_or_else(|| ServiceError::Status {
            status: 404,
            url: "$closure".to_string(),
            body: format!("closure {} not initialized", name),
        })?;

        let mut ancestors = HashMap::new();
        let mut found: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for concept in concepts {
            let code = concept.code.as_str();
            if known.iter().any(|k| k == code) {
                continue;
            }
            for other in known.iter() {
                if self.is_a(&mut ancestors, code, other) {
                    found.entry(code.to_string()).or_default().push(other.clone());
                }
                if self.is_a(&mut ancestors, other, code) {
                    found.entry(other.clone()).or_default().push(code.to_string());
                }
            }
            known.push(code.to_string());
        }

        if found.is_empty() {
            return Ok(ConceptMap::default());
        }
        let element = found
            .into_iter()
            .map(|(code, targets)| ConceptMapElement {
                code,
                target: targets
                    .into_iter()
                    .map(|code| ConceptMapTarget {
                        code,
                        equivalence: Some(SUBSUMES.to_string()),
                    })
                    .collect(),
            })
            .collect();
        Ok(ConceptMap {
            group: Some(vec![ConceptMapGroup { element }]),
        })
    }
}
