use anyhow::{Context, Result};
use extract::{ParsedEntity, normalize_label};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const SURGICAL_RELATIONS: &[(&str, &[&str])] = &[
    ("monopolar curved scissors", &["cutting", "cauterization", "retraction", "tool manipulation"]),
    ("forceps", &["grasping", "cauterization", "retraction", "tool manipulation"]),
    ("needle driver", &["suturing", "tool manipulation"]),
    ("clip applier", &["applying clip", "tool manipulation"]),
    ("grasper", &["grasping", "retraction", "cauterization", "tool manipulation"]),
    ("stapler", &["applying clip", "tool manipulation"]),
    ("permanent cautery hook", &["cauterization", "tool manipulation", "retraction", "grasping", "cutting"]),
];

static SURGICAL_GRAPH: Lazy<Arc<KnowledgeGraph>> = Lazy::new(|| {
    let relations = SURGICAL_RELATIONS
        .iter()
        .map(|(instrument, actions)| (instrument.to_string(), actions.iter().map(|a| a.to_string()).collect()));
    Arc::new(KnowledgeGraph::from_relations(relations).expect("built-in relations are non-empty"))
});

/// Read-only map of instrument -> actions the instrument can perform.
///
/// Keys and members are stored normalized, so lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    relations: HashMap<String, HashSet<String>>,
}

impl KnowledgeGraph {
    /// Build a graph, rejecting instruments with no permitted actions.
    pub fn from_relations<I>(relations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut map: HashMap<String, HashSet<String>> = HashMap::new();

        for (instrument, actions) in relations {
            let key = normalize_label(&instrument);
            if actions.is_empty() {
                anyhow::bail!("Instrument '{}' has no permitted actions", key);
            }
            map.entry(key)
                .or_default()
                .extend(actions.iter().map(|a| normalize_label(a)));
        }

        Ok(Self { relations: map })
    }

    /// Load `{"instrument": ["action", ...]}` from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read knowledge graph {}", path.display()))?;
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(&content)
            .context("Failed to parse knowledge graph JSON")?;
        Self::from_relations(raw)
    }

    /// The built-in instrument/action graph, shared process-wide.
    pub fn surgical() -> Arc<KnowledgeGraph> {
        Arc::clone(&SURGICAL_GRAPH)
    }

    /// Permitted actions; empty for an unrecognized instrument.
    pub fn valid_actions(&self, instrument: &str) -> Vec<&str> {
        let mut actions: Vec<&str> = self
            .relations
            .get(&normalize_label(instrument))
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default();
        actions.sort_unstable();
        actions
    }

    pub fn is_consistent(&self, instrument: &str, action: &str) -> bool {
        self.relations
            .get(&normalize_label(instrument))
            .is_some_and(|actions| actions.contains(&normalize_label(action)))
    }

    /// An `Unknown` on either side is never consistent.
    pub fn is_consistent_parsed(&self, instrument: &ParsedEntity, action: &ParsedEntity) -> bool {
        match (instrument, action) {
            (ParsedEntity::Known(i), ParsedEntity::Known(a)) => self.is_consistent(i, a),
            _ => false,
        }
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{ACTION_LABELS, INSTRUMENT_LABELS};
    use std::io::Write;

    #[test]
    fn test_listed_pairs_are_consistent() {
        let kg = KnowledgeGraph::surgical();
        for (instrument, actions) in SURGICAL_RELATIONS {
            for action in *actions {
                assert!(kg.is_consistent(instrument, action), "{instrument} / {action}");
            }
        }
    }

    #[test]
    fn test_unlisted_pairs_are_inconsistent() {
        let kg = KnowledgeGraph::surgical();
        for (_, instrument) in INSTRUMENT_LABELS {
            for (_, action) in ACTION_LABELS {
                let listed = SURGICAL_RELATIONS.iter().any(|(i, actions)| {
                    i.eq_ignore_ascii_case(instrument)
                        && actions.iter().any(|a| a.eq_ignore_ascii_case(action))
                });
                assert_eq!(kg.is_consistent(instrument, action), listed, "{instrument} / {action}");
            }
        }
    }

    #[test]
    fn test_examples() {
        let kg = KnowledgeGraph::surgical();
        assert!(kg.is_consistent("Forceps", "Grasping"));
        assert!(kg.is_consistent("  MONOPOLAR curved scissors ", "Cutting\n"));
        assert!(!kg.is_consistent("Stapler", "Cutting"));
        assert!(!kg.is_consistent("unknown-tool", "anything"));
        assert!(kg.valid_actions("unknown-tool").is_empty());
        assert_eq!(kg.valid_actions("Needle Driver"), vec!["suturing", "tool manipulation"]);
    }

    #[test]
    fn test_unknown_entity_is_never_consistent() {
        let kg = KnowledgeGraph::surgical();
        let action = ParsedEntity::Known("tool manipulation".to_string());
        assert!(!kg.is_consistent_parsed(&ParsedEntity::Unknown, &action));
        assert!(kg.is_consistent_parsed(&ParsedEntity::Known("Grasper".to_string()), &action));
    }

    #[test]
    fn test_empty_action_set_rejected() {
        let result = KnowledgeGraph::from_relations(vec![("trocar".to_string(), Vec::new())]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Suction Irrigator": ["Suction", "Irrigation"]}}"#).unwrap();

        let kg = KnowledgeGraph::from_json_file(file.path()).unwrap();
        assert_eq!(kg.len(), 1);
        assert!(kg.is_consistent("suction irrigator", "IRRIGATION"));
        assert!(!kg.is_consistent("forceps", "grasping"));
    }
}
