//! SKOS view over a [`KnowledgeGraph`]: concepts with their labels and
//! parent edges, concept schemes with their metadata.

use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use super::KnowledgeGraph;
use crate::utils::concept_local_id;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";

pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";
pub const SKOS_CONCEPT_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#ConceptScheme";
pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
pub const SKOS_BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";
pub const SKOS_BROADER_TRANSITIVE: &str = "http://www.w3.org/2004/02/skos/core#broaderTransitive";
pub const SKOS_NARROWER: &str = "http://www.w3.org/2004/02/skos/core#narrower";
pub const SKOS_NARROWER_TRANSITIVE: &str = "http://www.w3.org/2004/02/skos/core#narrowerTransitive";
pub const SKOS_HAS_TOP_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#hasTopConcept";
pub const SKOS_TOP_CONCEPT_OF: &str = "http://www.w3.org/2004/02/skos/core#topConceptOf";
pub const SKOS_IN_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#inScheme";
pub const SKOS_SCOPE_NOTE: &str = "http://www.w3.org/2004/02/skos/core#scopeNote";
pub const SKOS_DEFINITION: &str = "http://www.w3.org/2004/02/skos/core#definition";

pub const DC_TITLE: &str = "http://purl.org/dc/elements/1.1/title";
pub const DC_DATE: &str = "http://purl.org/dc/elements/1.1/date";
pub const DC_DESCRIPTION: &str = "http://purl.org/dc/elements/1.1/description";
pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";
pub const DCTERMS_CREATED: &str = "http://purl.org/dc/terms/created";
pub const DCTERMS_MODIFIED: &str = "http://purl.org/dc/terms/modified";
pub const DCTERMS_DESCRIPTION: &str = "http://purl.org/dc/terms/description";

const PARENT_PREDICATES: &[&str] = &[SKOS_BROADER, SKOS_BROADER_TRANSITIVE];
const CHILD_PREDICATES: &[&str] = &[SKOS_NARROWER, SKOS_NARROWER_TRANSITIVE];
const SCHEME_LABEL_PREDICATES: &[&str] = &[SKOS_PREF_LABEL, DC_TITLE, DCTERMS_TITLE, RDFS_LABEL];
const SCHEME_DESCRIPTION_PREDICATES: &[&str] =
    &[DCTERMS_DESCRIPTION, DC_DESCRIPTION, SKOS_DEFINITION, RDFS_COMMENT];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    pub uri: String,
    pub label: String,
    pub synonyms: Vec<String>,
    pub description: Option<String>,
    /// Parent concepts within the same graph, sorted.
    pub parents: Vec<String>,
    /// Schemes that mark this concept as a top concept, sorted.
    pub top_of: Vec<String>,
    /// Schemes from `skos:inScheme`, sorted.
    pub schemes: Vec<String>,
}

impl Concept {
    pub fn is_marked_top(&self) -> bool {
        !self.top_of.is_empty()
    }

    /// Scheme used for dates: a top-concept marker first, then membership.
    pub fn home_scheme(&self) -> Option<&str> {
        self.top_of
            .first()
            .or_else(|| self.schemes.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptScheme {
    pub uri: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Thesaurus {
    concepts: BTreeMap<String, Concept>,
    schemes: BTreeMap<String, ConceptScheme>,
}

impl Thesaurus {
    pub fn from_graph(graph: &KnowledgeGraph, language: &str) -> Self {
        let concept_uris: BTreeSet<&str> = graph.subjects_of_type(SKOS_CONCEPT).into_iter().collect();

        let mut parents: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for predicate in PARENT_PREDICATES {
            for triple in graph.triples_with_predicate(predicate) {
                if let Some(parent) = triple.object.as_resource() {
                    if concept_uris.contains(triple.subject.as_str()) && concept_uris.contains(parent) {
                        parents.entry(triple.subject.as_str()).or_default().insert(parent.to_string());
                    }
                }
            }
        }
        for predicate in CHILD_PREDICATES {
            for triple in graph.triples_with_predicate(predicate) {
                if let Some(child) = triple.object.as_resource() {
                    if concept_uris.contains(triple.subject.as_str()) && concept_uris.contains(child) {
                        parents.entry(child).or_default().insert(triple.subject.clone());
                    }
                }
            }
        }

        let mut top_of: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for triple in graph.triples_with_predicate(SKOS_HAS_TOP_CONCEPT) {
            if let Some(concept) = triple.object.as_resource() {
                if concept_uris.contains(concept) {
                    top_of.entry(concept).or_default().insert(triple.subject.clone());
                }
            }
        }
        for triple in graph.triples_with_predicate(SKOS_TOP_CONCEPT_OF) {
            if let Some(scheme) = triple.object.as_resource() {
                if concept_uris.contains(triple.subject.as_str()) {
                    top_of.entry(triple.subject.as_str()).or_default().insert(scheme.to_string());
                }
            }
        }

        let mut concepts = BTreeMap::new();
        for &uri in &concept_uris {
            let label = match pick_literal(graph.literals(uri, SKOS_PREF_LABEL), language) {
                Some(label) => label,
                None => {
                    let fallback = concept_local_id(uri);
                    warn!("Concept {} has no prefLabel, using '{}'", uri, fallback);
                    fallback
                }
            };

            let mut synonyms: Vec<String> = graph
                .literals(uri, SKOS_ALT_LABEL)
                .filter(|(_, lang)| lang.map_or(true, |l| language_matches(l, language)))
                .map(|(value, _)| value.trim().to_string())
                .filter(|value| !value.is_empty() && *value != label)
                .collect();
            synonyms.sort();
            synonyms.dedup();

            let description = pick_literal(graph.literals(uri, SKOS_SCOPE_NOTE), language)
                .or_else(|| pick_literal(graph.literals(uri, SKOS_DEFINITION), language));

            let mut schemes: Vec<String> = graph.resources(uri, SKOS_IN_SCHEME).map(str::to_string).collect();
            schemes.sort();
            schemes.dedup();

            concepts.insert(
                uri.to_string(),
                Concept {
                    uri: uri.to_string(),
                    label,
                    synonyms,
                    description,
                    parents: parents.remove(uri).map(|p| p.into_iter().collect()).unwrap_or_default(),
                    top_of: top_of.remove(uri).map(|s| s.into_iter().collect()).unwrap_or_default(),
                    schemes,
                },
            );
        }

        let schemes = graph
            .subjects_of_type(SKOS_CONCEPT_SCHEME)
            .into_iter()
            .map(|uri| {
                let scheme = ConceptScheme {
                    uri: uri.to_string(),
                    label: first_of(graph, uri, SCHEME_LABEL_PREDICATES, language),
                    description: first_of(graph, uri, SCHEME_DESCRIPTION_PREDICATES, language),
                    created: pick_literal(graph.literals(uri, DCTERMS_CREATED), language),
                    modified: pick_literal(graph.literals(uri, DCTERMS_MODIFIED), language),
                    date: pick_literal(graph.literals(uri, DC_DATE), language),
                };
                (uri.to_string(), scheme)
            })
            .collect();

        Self { concepts, schemes }
    }

    /// Concepts in URI order.
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    pub fn concept(&self, uri: &str) -> Option<&Concept> {
        self.concepts.get(uri)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn has_top_markers(&self) -> bool {
        self.concepts.values().any(Concept::is_marked_top)
    }

    pub fn schemes(&self) -> impl Iterator<Item = &ConceptScheme> {
        self.schemes.values()
    }

    pub fn scheme(&self, uri: &str) -> Option<&ConceptScheme> {
        self.schemes.get(uri)
    }

    /// First scheme by URI; supplies the thesaurus name and default dates.
    pub fn primary_scheme(&self) -> Option<&ConceptScheme> {
        self.schemes.values().next()
    }
}

fn language_matches(tag: &str, wanted: &str) -> bool {
    if tag.eq_ignore_ascii_case(wanted) {
        return true;
    }
    match (tag.get(..wanted.len()), tag.as_bytes().get(wanted.len())) {
        (Some(prefix), Some(b'-')) => prefix.eq_ignore_ascii_case(wanted),
        _ => false,
    }
}

/// Choose one literal: preferred language, then untagged, then anything.
/// Ties go to the lexically smallest value so the pick never depends on
/// triple order.
fn pick_literal<'a>(candidates: impl Iterator<Item = (&'a str, Option<&'a str>)>, language: &str) -> Option<String> {
    let mut best: Option<(u8, &str)> = None;
    for (value, lang) in candidates {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let rank = match lang {
            Some(tag) if tag.eq_ignore_ascii_case(language) => 0,
            Some(tag) if language_matches(tag, language) => 1,
            None => 2,
            Some(_) => 3,
        };
        if best.map_or(true, |current| (rank, value) < current) {
            best = Some((rank, value));
        }
    }
    best.map(|(_, value)| value.to_string())
}

fn first_of(graph: &KnowledgeGraph, subject: &str, predicates: &[&str], language: &str) -> Option<String> {
    predicates
        .iter()
        .find_map(|predicate| pick_literal(graph.literals(subject, predicate), language))
}
