use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

use crate::core::Vocabulary;
use crate::error::{ConversionError, Result};
use crate::utils::{concept_local_id, xml_escape};

const TERM_TEMPLATE_NAME: &str = "term";

// Block helpers never stand alone on a line, so no whitespace is stripped.
const TERM_TEMPLATE: &str = r#"<TERM code="{{code}}" encoding="DNET" english_name="{{label}}" native_name="{{native_name}}">
  {{#if synonyms}}<SYNONYMS>{{#each synonyms}}
    <SYNONYM encoding="DNET" term="{{this}}"/>{{/each}}
  </SYNONYMS>{{else}}<SYNONYMS/>{{/if}}
  <RELATIONS/>
</TERM>"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermEntry {
    pub code: String,
    pub label: String,
    pub native_name: String,
    pub synonyms: Vec<String>,
}

pub struct TermRenderer {
    handlebars: Handlebars<'static>,
    namespace: String,
    include_synonyms: bool,
}

impl TermRenderer {
    pub fn new(namespace: &str, include_synonyms: bool) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(|s| xml_escape(s).into_owned());
        handlebars
            .register_template_string(TERM_TEMPLATE_NAME, TERM_TEMPLATE)
            .map_err(|e| ConversionError::Template(format!("term template: {}", e)))?;

        Ok(Self {
            handlebars,
            namespace: namespace.to_string(),
            include_synonyms,
        })
    }

    /// Term entries in vocabulary member order.
    pub fn entries(&self, vocabulary: &Vocabulary) -> Vec<TermEntry> {
        let mut seen_codes = HashSet::new();

        vocabulary
            .members
            .iter()
            .map(|concept| {
                let local_id = concept_local_id(&concept.uri);
                let code = format!("{}:{}", self.namespace, local_id);
                if !seen_codes.insert(code.clone()) {
                    warn!("Duplicate term code {} in vocabulary '{}' ({})", code, vocabulary.name, concept.uri);
                }

                TermEntry {
                    code,
                    label: concept.label.clone(),
                    native_name: format!("{}/Concept/{}", self.namespace, local_id),
                    synonyms: if self.include_synonyms {
                        concept.synonyms.clone()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    }

    pub fn render_entry(&self, entry: &TermEntry) -> Result<String> {
        self.handlebars
            .render(TERM_TEMPLATE_NAME, entry)
            .map_err(|e| ConversionError::Template(format!("rendering term {}: {}", entry.code, e)))
    }

    /// XML fragment for the `*TERMS*` marker, one `<TERM>` element per line
    /// group, without leading indentation.
    pub fn render_block(&self, vocabulary: &Vocabulary) -> Result<(String, usize)> {
        let entries = self.entries(vocabulary);
        let rendered = entries
            .iter()
            .map(|entry| self.render_entry(entry))
            .collect::<Result<Vec<_>>>()?;
        Ok((rendered.join("\n"), entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VocabularyKind;
    use crate::knowledge_graph::Concept;

    fn concept(uri: &str, label: &str, synonyms: &[&str]) -> Concept {
        Concept {
            uri: uri.to_string(),
            label: label.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            description: None,
            parents: vec![],
            top_of: vec![],
            schemes: vec![],
        }
    }

    fn vocabulary(members: Vec<Concept>) -> Vocabulary {
        Vocabulary {
            name: "Colors".to_string(),
            description: String::new(),
            kind: VocabularyKind::Unclassified,
            created: "2017-01-01T00:00:00".to_string(),
            last_update: "2017-01-01T00:00:00".to_string(),
            members,
        }
    }

    #[test]
    fn test_codes_derive_from_uri() {
        let renderer = TermRenderer::new("parthenos", true).unwrap();
        let entries = renderer.entries(&vocabulary(vec![
            concept("http://vocab.example.org/Concept/42", "Red", &[]),
            concept("http://example.org/ns#blue", "Blue", &[]),
        ]));

        assert_eq!(entries[0].code, "parthenos:42");
        assert_eq!(entries[0].native_name, "parthenos/Concept/42");
        assert_eq!(entries[1].code, "parthenos:blue");
    }

    #[test]
    fn test_render_without_synonyms() {
        let renderer = TermRenderer::new("parthenos", true).unwrap();
        let (block, count) = renderer
            .render_block(&vocabulary(vec![concept("http://ex.org/Concept/1", "Red & Pink", &[])]))
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            block,
            "<TERM code=\"parthenos:1\" encoding=\"DNET\" english_name=\"Red &amp; Pink\" native_name=\"parthenos/Concept/1\">\n  <SYNONYMS/>\n  <RELATIONS/>\n</TERM>"
        );
    }

    #[test]
    fn test_render_with_synonyms() {
        let renderer = TermRenderer::new("ns", true).unwrap();
        let (block, _) = renderer
            .render_block(&vocabulary(vec![concept("http://ex.org/Concept/1", "Red", &["Crimson", "\"Rouge\""])]))
            .unwrap();

        assert!(block.contains(
            "  <SYNONYMS>\n    <SYNONYM encoding=\"DNET\" term=\"Crimson\"/>\n    <SYNONYM encoding=\"DNET\" term=\"&quot;Rouge&quot;\"/>\n  </SYNONYMS>\n"
        ));
    }

    #[test]
    fn test_synonyms_can_be_disabled() {
        let renderer = TermRenderer::new("ns", false).unwrap();
        let (block, _) = renderer
            .render_block(&vocabulary(vec![concept("http://ex.org/Concept/1", "Red", &["Crimson"])]))
            .unwrap();
        assert!(block.contains("<SYNONYMS/>"));
        assert!(!block.contains("Crimson"));
    }

    #[test]
    fn test_multiple_terms_joined_by_newline() {
        let renderer = TermRenderer::new("ns", true).unwrap();
        let (block, count) = renderer
            .render_block(&vocabulary(vec![
                concept("http://ex.org/Concept/1", "A", &[]),
                concept("http://ex.org/Concept/2", "B", &[]),
            ]))
            .unwrap();
        assert_eq!(count, 2);
        assert!(block.contains("</TERM>\n<TERM code=\"ns:2\""));
    }
}
