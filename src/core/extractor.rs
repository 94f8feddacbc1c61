use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TopConceptFallback;
use crate::error::{ConversionError, Result};
use crate::knowledge_graph::{Concept, ConceptScheme, Thesaurus};
use crate::utils::concept_local_id;
use crate::utils::dates::normalize_date;

const UNCLASSIFIED_SUFFIX: &str = "unclassified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VocabularyKind {
    TopConcept { uri: String },
    Unclassified,
}

#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub name: String,
    pub description: String,
    pub kind: VocabularyKind,
    pub created: String,
    pub last_update: String,
    /// Member concepts sorted by label, then URI.
    pub members: Vec<Concept>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_unclassified(&self) -> bool {
        self.kind == VocabularyKind::Unclassified
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub fallback: TopConceptFallback,
    /// Already normalised date used when the graph carries none.
    pub default_date: String,
    /// Thesaurus name when no concept scheme has a label, usually the
    /// source file stem.
    pub source_name: String,
}

/// Partitions the concepts of one thesaurus into vocabularies, one per top
/// concept plus an optional unclassified bucket.
pub struct VocabularyExtractor<'a> {
    thesaurus: &'a Thesaurus,
    options: ExtractionOptions,
}

impl<'a> VocabularyExtractor<'a> {
    pub fn new(thesaurus: &'a Thesaurus, options: ExtractionOptions) -> Self {
        Self { thesaurus, options }
    }

    pub fn extract(&self, source: &Path) -> Result<Vec<Vocabulary>> {
        self.check_cycles(source)?;

        let tops = self.top_concepts();
        info!("Found {} top concepts in {}", tops.len(), source.display());

        let assignments = self.assign(&tops);
        let mut vocabularies = Vec::with_capacity(tops.len() + 1);

        for top in &tops {
            info!("Extracting terms for top concept: {}", top.label);
            let members = self.members_where(|uri| assignments.get(uri) == Some(&top.uri.as_str()));
            let scheme = top
                .home_scheme()
                .and_then(|uri| self.thesaurus.scheme(uri))
                .or_else(|| self.thesaurus.primary_scheme());
            let (created, last_update) = self.dates_for(scheme);

            vocabularies.push(Vocabulary {
                name: top.label.clone(),
                description: top.description.clone().unwrap_or_default(),
                kind: VocabularyKind::TopConcept { uri: top.uri.clone() },
                created,
                last_update,
                members,
            });
        }

        let unclassified = self.members_where(|uri| !assignments.contains_key(uri));
        let per_scheme = self.thesaurus.schemes().count() > 1;
        for (scheme, members) in self.group_by_scheme(unclassified) {
            let base_name = match scheme {
                Some(scheme) => scheme
                    .label
                    .clone()
                    .unwrap_or_else(|| concept_local_id(&scheme.uri)),
                None if per_scheme => self.options.source_name.clone(),
                None => self.thesaurus_name(),
            };
            let name = if tops.is_empty() {
                base_name
            } else {
                format!("{} {}", base_name, UNCLASSIFIED_SUFFIX)
            };
            debug!("{} concepts reach no top concept, collected in '{}'", members.len(), name);

            let scheme = scheme.or_else(|| self.thesaurus.primary_scheme());
            let (created, last_update) = self.dates_for(scheme);

            vocabularies.push(Vocabulary {
                name,
                description: scheme.and_then(|s| s.description.clone()).unwrap_or_default(),
                kind: VocabularyKind::Unclassified,
                created,
                last_update,
                members,
            });
        }

        Ok(vocabularies)
    }

    /// Primary scheme label, else the source name.
    fn thesaurus_name(&self) -> String {
        self.thesaurus
            .primary_scheme()
            .and_then(|s| s.label.clone())
            .unwrap_or_else(|| self.options.source_name.clone())
    }

    /// Unclassified concepts bucketed by their home scheme when the graph
    /// holds several schemes. Scheme buckets come in URI order; concepts
    /// outside any known scheme form a trailing bucket keyed `None`.
    fn group_by_scheme(&self, members: Vec<Concept>) -> Vec<(Option<&'a ConceptScheme>, Vec<Concept>)> {
        if members.is_empty() {
            return Vec::new();
        }

        let thesaurus = self.thesaurus;
        if thesaurus.schemes().count() <= 1 {
            return vec![(None, members)];
        }

        let mut by_scheme: BTreeMap<&'a str, Vec<Concept>> = BTreeMap::new();
        let mut loose = Vec::new();
        for concept in members {
            let home = concept.home_scheme().and_then(|uri| thesaurus.scheme(uri));
            match home {
                Some(scheme) => by_scheme.entry(scheme.uri.as_str()).or_default().push(concept),
                None => loose.push(concept),
            }
        }

        let mut groups: Vec<(Option<&'a ConceptScheme>, Vec<Concept>)> = by_scheme
            .into_iter()
            .map(|(uri, members)| (thesaurus.scheme(uri), members))
            .collect();
        if !loose.is_empty() {
            groups.push((None, loose));
        }
        groups
    }

    /// Parentless concepts carrying a top-concept marker. Without any marker
    /// in the graph the configured fallback decides.
    pub fn top_concepts(&self) -> Vec<&'a Concept> {
        let thesaurus = self.thesaurus;
        let parentless = thesaurus.concepts().filter(|c| c.parents.is_empty());

        if thesaurus.has_top_markers() {
            for concept in thesaurus.concepts().filter(|c| c.is_marked_top() && !c.parents.is_empty()) {
                debug!("{} is marked as top concept but has a broader concept", concept.uri);
            }
            return parentless.filter(|c| c.is_marked_top()).collect();
        }

        match self.options.fallback {
            TopConceptFallback::Unclassified => Vec::new(),
            TopConceptFallback::ParentlessRoots => parentless.collect(),
        }
    }

    /// Map every reachable concept to its nearest top concept.
    ///
    /// Breadth-first from all tops at once, seeded in URI order with children
    /// visited in URI order: a concept at equal distance from two tops goes
    /// to the top with the smaller URI.
    fn assign(&self, tops: &[&'a Concept]) -> HashMap<&'a str, &'a str> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for concept in self.thesaurus.concepts() {
            for parent in &concept.parents {
                children.entry(parent.as_str()).or_default().push(concept.uri.as_str());
            }
        }

        let mut owner: HashMap<&str, &str> = HashMap::new();
        let mut queue = VecDeque::new();
        for top in tops {
            owner.insert(top.uri.as_str(), top.uri.as_str());
            queue.push_back(top.uri.as_str());
        }

        while let Some(node) = queue.pop_front() {
            let Some(&top) = owner.get(node) else { continue };
            for &child in children.get(node).into_iter().flatten() {
                if !owner.contains_key(child) {
                    owner.insert(child, top);
                    queue.push_back(child);
                }
            }
        }

        owner
    }

    fn members_where(&self, keep: impl Fn(&str) -> bool) -> Vec<Concept> {
        let mut members: Vec<Concept> = self
            .thesaurus
            .concepts()
            .filter(|c| keep(c.uri.as_str()))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.uri.cmp(&b.uri)));
        members
    }

    /// Reject hierarchies where a concept is its own ancestor.
    fn check_cycles(&self, source: &Path) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Active,
            Done,
        }

        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

        for start in self.thesaurus.concepts() {
            if marks.contains_key(start.uri.as_str()) {
                continue;
            }

            marks.insert(start.uri.as_str(), Mark::Active);
            let mut stack: Vec<(&str, usize)> = vec![(start.uri.as_str(), 0)];

            while let Some(&(node, next)) = stack.last() {
                let parents = self
                    .thesaurus
                    .concept(node)
                    .map(|c| c.parents.as_slice())
                    .unwrap_or_default();

                if next >= parents.len() {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    continue;
                }

                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }

                let parent = parents[next].as_str();
                match marks.get(parent) {
                    Some(Mark::Active) => {
                        let from = stack.iter().position(|(n, _)| *n == parent).unwrap_or(0);
                        let mut concepts: Vec<String> =
                            stack[from..].iter().map(|(n, _)| n.to_string()).collect();
                        concepts.sort();
                        warn!("Broader cycle through {} concepts in {}", concepts.len(), source.display());
                        return Err(ConversionError::Cycle {
                            path: source.to_path_buf(),
                            concepts,
                        });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(parent, Mark::Active);
                        stack.push((parent, 0));
                    }
                }
            }
        }

        Ok(())
    }

    fn dates_for(&self, scheme: Option<&ConceptScheme>) -> (String, String) {
        let created = scheme
            .and_then(|s| s.created.as_deref().or(s.date.as_deref()))
            .map(resolve_date)
            .unwrap_or_else(|| self.options.default_date.clone());

        let last_update = scheme
            .and_then(|s| s.modified.as_deref().or(s.date.as_deref()))
            .map(resolve_date)
            .unwrap_or_else(|| created.clone());

        (created, last_update)
    }
}

fn resolve_date(raw: &str) -> String {
    normalize_date(raw).unwrap_or_else(|| {
        warn!("Unrecognised date '{}', passing it through unchanged", raw.trim());
        raw.trim().to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::RdfFormat;
    use crate::knowledge_graph::KnowledgeGraph;
    use std::path::PathBuf;

    const PREFIXES: &str = r#"
        @prefix skos: <http://www.w3.org/2004/02/skos/core#> .
        @prefix dct: <http://purl.org/dc/terms/> .
        @prefix dc: <http://purl.org/dc/elements/1.1/> .
        @prefix ex: <http://example.org/> .
    "#;

    fn thesaurus(body: &str) -> Thesaurus {
        let graph = KnowledgeGraph::parse(&format!("{}{}", PREFIXES, body), RdfFormat::Turtle, None).unwrap();
        Thesaurus::from_graph(&graph, "en")
    }

    fn options(fallback: TopConceptFallback) -> ExtractionOptions {
        ExtractionOptions {
            fallback,
            default_date: "2000-01-01T00:00:00".to_string(),
            source_name: "colors-file".to_string(),
        }
    }

    fn extract(t: &Thesaurus, fallback: TopConceptFallback) -> Result<Vec<Vocabulary>> {
        VocabularyExtractor::new(t, options(fallback)).extract(&PathBuf::from("test.ttl"))
    }

    fn member_labels(v: &Vocabulary) -> Vec<&str> {
        v.members.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn test_top_child_and_unclassified() {
        let t = thesaurus(r#"
            ex:scheme a skos:ConceptScheme ; skos:prefLabel "Thesaurus"@en ; skos:hasTopConcept ex:a .
            ex:a a skos:Concept ; skos:prefLabel "A"@en .
            ex:b a skos:Concept ; skos:prefLabel "B"@en ; skos:broader ex:a .
            ex:c a skos:Concept ; skos:prefLabel "C"@en .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies.len(), 2);
        assert_eq!(vocabularies[0].name, "A");
        assert_eq!(member_labels(&vocabularies[0]), vec!["A", "B"]);
        assert!(vocabularies[1].is_unclassified());
        assert_eq!(vocabularies[1].name, "Thesaurus unclassified");
        assert_eq!(member_labels(&vocabularies[1]), vec!["C"]);
    }

    #[test]
    fn test_n_tops_give_n_disjoint_vocabularies() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ; skos:hasTopConcept ex:t1, ex:t2, ex:t3 .
            ex:t1 a skos:Concept ; skos:prefLabel "One"@en .
            ex:t2 a skos:Concept ; skos:prefLabel "Two"@en .
            ex:t3 a skos:Concept ; skos:prefLabel "Three"@en .
            ex:x a skos:Concept ; skos:broader ex:t1 .
            ex:y a skos:Concept ; skos:broader ex:x .
            ex:z a skos:Concept ; skos:broaderTransitive ex:t3 .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies.len(), 3);
        assert!(vocabularies.iter().all(|v| !v.is_unclassified()));

        let total: usize = vocabularies.iter().map(Vocabulary::len).sum();
        assert_eq!(total, t.len());

        let mut seen: Vec<&str> = vocabularies
            .iter()
            .flat_map(|v| v.members.iter().map(|c| c.uri.as_str()))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), t.len());
    }

    #[test]
    fn test_diamond_goes_to_smaller_uri() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ; skos:hasTopConcept ex:t2, ex:t1 .
            ex:t1 a skos:Concept ; skos:prefLabel "First"@en .
            ex:t2 a skos:Concept ; skos:prefLabel "Second"@en .
            ex:b a skos:Concept ; skos:broader ex:t2 .
            ex:c a skos:Concept ; skos:broader ex:t1 .
            ex:d a skos:Concept ; skos:prefLabel "Diamond"@en ; skos:broader ex:b, ex:c .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies[0].name, "First");
        assert!(member_labels(&vocabularies[0]).contains(&"Diamond"));
        assert!(!member_labels(&vocabularies[1]).contains(&"Diamond"));
    }

    #[test]
    fn test_nearest_top_wins_over_uri_order() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ; skos:hasTopConcept ex:t1, ex:t2 .
            ex:t1 a skos:Concept ; skos:prefLabel "First"@en .
            ex:t2 a skos:Concept ; skos:prefLabel "Second"@en .
            ex:m a skos:Concept ; skos:broader ex:t1 .
            ex:n a skos:Concept ; skos:broader ex:m .
            ex:leaf a skos:Concept ; skos:prefLabel "Leaf"@en ; skos:broader ex:n, ex:t2 .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert!(member_labels(&vocabularies[1]).contains(&"Leaf"));
    }

    #[test]
    fn test_no_markers_default_fallback_is_single_vocabulary() {
        let t = thesaurus(r#"
            ex:a a skos:Concept ; skos:prefLabel "A"@en .
            ex:b a skos:Concept ; skos:prefLabel "B"@en ; skos:broader ex:a .
            ex:c a skos:Concept ; skos:prefLabel "C"@en .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies.len(), 1);
        assert_eq!(vocabularies[0].name, "colors-file");
        assert_eq!(vocabularies[0].len(), 3);
    }

    #[test]
    fn test_unclassified_split_by_scheme() {
        let t = thesaurus(r#"
            ex:s1 a skos:ConceptScheme ; skos:prefLabel "Colors"@en ; dct:created "2014-01-01" .
            ex:s2 a skos:ConceptScheme ; skos:prefLabel "Colors"@en ; dct:created "2015-01-01" .
            ex:a a skos:Concept ; skos:prefLabel "A"@en ; skos:inScheme ex:s1 .
            ex:b a skos:Concept ; skos:prefLabel "B"@en ; skos:inScheme ex:s2 .
            ex:c a skos:Concept ; skos:prefLabel "C"@en .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        let names: Vec<_> = vocabularies.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Colors", "Colors", "colors-file"]);
        assert_eq!(member_labels(&vocabularies[0]), vec!["A"]);
        assert_eq!(vocabularies[0].created, "2014-01-01T00:00:00");
        assert_eq!(member_labels(&vocabularies[1]), vec!["B"]);
        assert_eq!(vocabularies[1].created, "2015-01-01T00:00:00");
        assert_eq!(member_labels(&vocabularies[2]), vec!["C"]);
        assert!(vocabularies.iter().all(Vocabulary::is_unclassified));
    }

    #[test]
    fn test_single_scheme_keeps_one_unclassified_bucket() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ; skos:prefLabel "Palette"@en .
            ex:a a skos:Concept ; skos:prefLabel "A"@en ; skos:inScheme ex:s .
            ex:b a skos:Concept ; skos:prefLabel "B"@en .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies.len(), 1);
        assert_eq!(vocabularies[0].name, "Palette");
        assert_eq!(vocabularies[0].len(), 2);
    }

    #[test]
    fn test_parentless_roots_fallback() {
        let t = thesaurus(r#"
            ex:a a skos:Concept ; skos:prefLabel "A"@en .
            ex:b a skos:Concept ; skos:prefLabel "B"@en ; skos:broader ex:a .
            ex:c a skos:Concept ; skos:prefLabel "C"@en .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::ParentlessRoots).unwrap();
        let names: Vec<_> = vocabularies.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(member_labels(&vocabularies[0]), vec!["A", "B"]);
    }

    #[test]
    fn test_marked_top_with_parent_is_not_a_top() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ; skos:hasTopConcept ex:a, ex:b .
            ex:a a skos:Concept ; skos:prefLabel "A"@en .
            ex:b a skos:Concept ; skos:prefLabel "B"@en ; skos:broader ex:a .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies.len(), 1);
        assert_eq!(member_labels(&vocabularies[0]), vec!["A", "B"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ; skos:hasTopConcept ex:top .
            ex:top a skos:Concept .
            ex:a a skos:Concept ; skos:broader ex:b .
            ex:b a skos:Concept ; skos:broader ex:a .
        "#);

        match extract(&t, TopConceptFallback::Unclassified) {
            Err(ConversionError::Cycle { concepts, .. }) => {
                assert_eq!(concepts, vec!["http://example.org/a", "http://example.org/b"]);
            }
            other => panic!("expected cycle error, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let t = thesaurus("ex:a a skos:Concept ; skos:broader ex:a .");
        assert!(matches!(
            extract(&t, TopConceptFallback::Unclassified),
            Err(ConversionError::Cycle { .. })
        ));
    }

    #[test]
    fn test_dates_from_scheme() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ;
                dct:created "2015-03-01" ;
                dct:modified "2017-06-30T12:00:00Z" ;
                skos:hasTopConcept ex:a .
            ex:a a skos:Concept ; skos:prefLabel "A"@en ; skos:scopeNote "About A"@en .
        "#);

        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies[0].created, "2015-03-01T00:00:00");
        assert_eq!(vocabularies[0].last_update, "2017-06-30T12:00:00");
        assert_eq!(vocabularies[0].description, "About A");
    }

    #[test]
    fn test_dc_date_and_defaults() {
        let t = thesaurus(r#"
            ex:s a skos:ConceptScheme ; dc:date "2016-11-28_10-15-42" ; skos:hasTopConcept ex:a .
            ex:a a skos:Concept .
        "#);
        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies[0].created, "2016-11-28T10:15:42");
        assert_eq!(vocabularies[0].last_update, "2016-11-28T10:15:42");

        let t = thesaurus("ex:a a skos:Concept .");
        let vocabularies = extract(&t, TopConceptFallback::Unclassified).unwrap();
        assert_eq!(vocabularies[0].created, "2000-01-01T00:00:00");
        assert_eq!(vocabularies[0].last_update, "2000-01-01T00:00:00");
    }

    #[test]
    fn test_empty_thesaurus() {
        let t = thesaurus("ex:s a skos:ConceptScheme .");
        assert!(extract(&t, TopConceptFallback::Unclassified).unwrap().is_empty());
    }
}
