use oxiri::Iri;
use rio_api::model::{Literal, Subject, Term, Triple};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesParser, TurtleError, TurtleParser};
use rio_xml::{RdfXmlError, RdfXmlParser};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;
use url::Url;

use crate::error::{ConversionError, Result};
use crate::handlers::RdfFormat;

pub mod skos;

pub use skos::{Concept, ConceptScheme, Thesaurus};

/// Object position of a triple. Blank nodes are kept as `_:id` resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RdfObject {
    Resource(String),
    Literal {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl RdfObject {
    pub fn resource(iri: impl Into<String>) -> Self {
        RdfObject::Resource(iri.into())
    }

    pub fn literal(value: impl Into<String>, language: Option<&str>) -> Self {
        RdfObject::Literal {
            value: value.into(),
            language: language.map(|l| l.to_lowercase()),
        }
    }

    pub fn as_resource(&self) -> Option<&str> {
        match self {
            RdfObject::Resource(iri) => Some(iri),
            RdfObject::Literal { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RdfTriple {
    pub subject: String,
    pub predicate: String,
    pub object: RdfObject,
}

impl RdfTriple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: RdfObject) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }

    fn from_rio(triple: &Triple<'_>) -> Option<Self> {
        let subject = match triple.subject {
            Subject::NamedNode(node) => node.iri.to_string(),
            Subject::BlankNode(node) => format!("_:{}", node.id),
            // RDF-star quoted triples carry no SKOS data we use
            _ => return None,
        };

        let object = match triple.object {
            Term::NamedNode(node) => RdfObject::resource(node.iri),
            Term::BlankNode(node) => RdfObject::Resource(format!("_:{}", node.id)),
            Term::Literal(Literal::Simple { value }) => RdfObject::literal(value, None),
            Term::Literal(Literal::LanguageTaggedString { value, language }) => {
                RdfObject::literal(value, Some(language))
            }
            Term::Literal(Literal::Typed { value, .. }) => RdfObject::literal(value, None),
            _ => return None,
        };

        Some(Self::new(subject, triple.predicate.iri, object))
    }
}

/// In-memory triple store for one source file, indexed by subject and
/// predicate.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    triples: Vec<RdfTriple>,
    seen: HashSet<RdfTriple>,
    by_subject: HashMap<String, Vec<usize>>,
    by_predicate: HashMap<String, Vec<usize>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a file, choosing the syntax from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ConversionError::io(path, e))?;
        let format = RdfFormat::from_path(path);
        let base = file_base_iri(path);
        debug!("Parsing {} as {} (base {:?})", path.display(), format, base.as_ref().map(|b| b.as_str()));

        let mut graph = Self::new();
        graph
            .parse_into(BufReader::new(file), format, base)
            .map_err(|message| ConversionError::Parse {
                path: path.to_path_buf(),
                message,
            })?;

        debug!("{}", graph.statistics());
        Ok(graph)
    }

    /// Parse an in-memory document. Relative IRIs need an explicit `base`.
    pub fn parse(content: &str, format: RdfFormat, base: Option<&str>) -> std::result::Result<Self, String> {
        let base = base
            .map(|b| Iri::parse(b.to_string()).map_err(|e| format!("invalid base IRI '{}': {}", b, e)))
            .transpose()?;

        let mut graph = Self::new();
        graph.parse_into(content.as_bytes(), format, base)?;
        Ok(graph)
    }

    fn parse_into<R: BufRead>(
        &mut self,
        reader: R,
        format: RdfFormat,
        base: Option<Iri<String>>,
    ) -> std::result::Result<(), String> {
        match format {
            RdfFormat::RdfXml => RdfXmlParser::new(reader, base)
                .parse_all(&mut |t| -> std::result::Result<(), RdfXmlError> {
                    self.insert_rio(&t);
                    Ok(())
                })
                .map_err(|e| e.to_string()),
            RdfFormat::Turtle => TurtleParser::new(reader, base)
                .parse_all(&mut |t| -> std::result::Result<(), TurtleError> {
                    self.insert_rio(&t);
                    Ok(())
                })
                .map_err(|e| e.to_string()),
            // N-Triples only allows absolute IRIs
            RdfFormat::NTriples => NTriplesParser::new(reader)
                .parse_all(&mut |t| -> std::result::Result<(), TurtleError> {
                    self.insert_rio(&t);
                    Ok(())
                })
                .map_err(|e| e.to_string()),
        }
    }

    fn insert_rio(&mut self, triple: &Triple<'_>) {
        if let Some(triple) = RdfTriple::from_rio(triple) {
            self.insert(triple);
        }
    }

    /// Add a triple; returns `false` if it was already present.
    pub fn insert(&mut self, triple: RdfTriple) -> bool {
        if !self.seen.insert(triple.clone()) {
            return false;
        }

        let index = self.triples.len();
        self.by_subject.entry(triple.subject.clone()).or_default().push(index);
        self.by_predicate.entry(triple.predicate.clone()).or_default().push(index);
        self.triples.push(triple);
        true
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn triples(&self) -> &[RdfTriple] {
        &self.triples
    }

    pub fn triples_with_predicate<'a>(&'a self, predicate: &str) -> impl Iterator<Item = &'a RdfTriple> + 'a {
        self.by_predicate
            .get(predicate)
            .into_iter()
            .flatten()
            .map(move |&i| &self.triples[i])
    }

    pub fn objects<'a>(&'a self, subject: &str, predicate: &'a str) -> impl Iterator<Item = &'a RdfObject> + 'a {
        self.by_subject
            .get(subject)
            .into_iter()
            .flatten()
            .map(move |&i| &self.triples[i])
            .filter(move |t| t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// Resource objects of `subject predicate ?o`, literals skipped.
    pub fn resources<'a>(&'a self, subject: &str, predicate: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.objects(subject, predicate).filter_map(RdfObject::as_resource)
    }

    /// Literal objects of `subject predicate ?o` as (value, language).
    pub fn literals<'a>(&'a self, subject: &str, predicate: &'a str) -> impl Iterator<Item = (&'a str, Option<&'a str>)> + 'a {
        self.objects(subject, predicate).filter_map(|o| match o {
            RdfObject::Literal { value, language } => Some((value.as_str(), language.as_deref())),
            RdfObject::Resource(_) => None,
        })
    }

    /// Subjects of `?s predicate object` for a resource object, sorted and
    /// deduplicated.
    pub fn subjects(&self, predicate: &str, object: &str) -> Vec<&str> {
        let mut subjects: Vec<&str> = self
            .triples_with_predicate(predicate)
            .filter(|t| t.object.as_resource() == Some(object))
            .map(|t| t.subject.as_str())
            .collect();
        subjects.sort_unstable();
        subjects.dedup();
        subjects
    }

    pub fn subjects_of_type(&self, type_iri: &str) -> Vec<&str> {
        self.subjects(skos::RDF_TYPE, type_iri)
    }

    pub fn statistics(&self) -> KnowledgeGraphStats {
        let unique_subjects = self.by_subject.len();
        let unique_predicates = self.by_predicate.len();
        let unique_objects = self
            .triples
            .iter()
            .map(|t| &t.object)
            .collect::<HashSet<_>>()
            .len();

        KnowledgeGraphStats {
            total_triples: self.triples.len(),
            unique_subjects,
            unique_predicates,
            unique_objects,
        }
    }
}

/// `file://` IRI of a document, used to resolve its relative IRIs.
fn file_base_iri(path: &Path) -> Option<Iri<String>> {
    let absolute = path.canonicalize().ok()?;
    let url = Url::from_file_path(&absolute).ok()?;

    match Iri::parse(url.to_string()) {
        Ok(iri) => Some(iri),
        Err(e) => {
            debug!("No base IRI for {}: {}", path.display(), e);
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraphStats {
    pub total_triples: usize,
    pub unique_subjects: usize,
    pub unique_predicates: usize,
    pub unique_objects: usize,
}

impl std::fmt::Display for KnowledgeGraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,
            "Graph statistics: {} triples, {} subjects, {} predicates, {} objects",
            self.total_triples,
            self.unique_subjects,
            self.unique_predicates,
            self.unique_objects
        )
    }
}
