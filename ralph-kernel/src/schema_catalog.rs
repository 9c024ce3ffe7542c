//! The structural schema model and the catalog of declared schema keys.

use std::collections::BTreeMap;

/// A structural schema. `Nullable` is the only way to encode an absent
/// field — `optional` fields are forbidden.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    String,
    Number,
    Bool,
    /// A closed enumeration, e.g. `priority ∈ {critical, high, medium, low}`.
    Enum(Vec<&'static str>),
    Nullable(Box<SchemaType>),
    List(Box<SchemaType>),
    Record(BTreeMap<&'static str, SchemaType>),
    Union(Vec<SchemaType>),
}

impl SchemaType {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Bool => "bool",
            SchemaType::Enum(_) => "enum",
            SchemaType::Nullable(_) => "nullable",
            SchemaType::List(_) => "list",
            SchemaType::Record(_) => "record",
            SchemaType::Union(_) => "union",
        }
    }

    pub fn nullable(self) -> SchemaType {
        SchemaType::Nullable(Box::new(self))
    }

    pub fn list_of(self) -> SchemaType {
        SchemaType::List(Box::new(self))
    }
}

pub fn record(fields: impl IntoIterator<Item = (&'static str, SchemaType)>) -> SchemaType {
    SchemaType::Record(fields.into_iter().collect())
}

const PRIORITY: &[&str] = &["critical", "high", "medium", "low"];
const SEVERITY: &[&str] = &["none", "minor", "major", "critical"];
const COMPLEXITY_TIER: &[&str] = &["trivial", "small", "medium", "large"];
const STATUS: &[&str] = &["partial", "complete", "blocked"];

fn priority() -> SchemaType {
    SchemaType::Enum(PRIORITY.to_vec())
}

fn severity() -> SchemaType {
    SchemaType::Enum(SEVERITY.to_vec())
}

fn complexity_tier() -> SchemaType {
    SchemaType::Enum(COMPLEXITY_TIER.to_vec())
}

fn status() -> SchemaType {
    SchemaType::Enum(STATUS.to_vec())
}

/// A mapping from `schema_key -> structural schema`.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<&'static str, SchemaType>,
}

impl SchemaCatalog {
    pub fn get(&self, key: &str) -> Option<&SchemaType> {
        self.schemas.get(key)
    }

    pub fn insert(&mut self, key: &'static str, schema: SchemaType) {
        self.schemas.insert(key, schema);
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }

    /// The builtin catalog of structural schemas for every known stage.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();

        catalog.insert(
            "discover",
            record([
                ("id", SchemaType::String),
                ("title", SchemaType::String),
                ("description", SchemaType::String),
                ("category", SchemaType::String),
                ("priority", priority()),
                ("complexityTier", complexity_tier()),
                (
                    "acceptanceCriteria",
                    SchemaType::String.list_of().nullable(),
                ),
                ("relevantFiles", SchemaType::String.list_of()),
                ("referenceFiles", SchemaType::String.list_of()),
            ]),
        );

        catalog.insert(
            "research",
            record([
                ("summary", SchemaType::String),
                ("findings", SchemaType::String.list_of()),
                ("openQuestions", SchemaType::String.list_of().nullable()),
            ]),
        );

        catalog.insert(
            "plan",
            record([
                ("summary", SchemaType::String),
                ("steps", SchemaType::String.list_of()),
                ("risks", SchemaType::String.list_of().nullable()),
            ]),
        );

        catalog.insert(
            "implement",
            record([
                ("summary", SchemaType::String),
                ("filesChanged", SchemaType::String.list_of()),
                ("status", status()),
            ]),
        );

        catalog.insert(
            "test_results",
            record([
                ("passed", SchemaType::Bool),
                ("summary", SchemaType::String),
                ("failingTests", SchemaType::String.list_of().nullable()),
            ]),
        );

        catalog.insert(
            "build_verify",
            record([
                ("passed", SchemaType::Bool),
                ("log", SchemaType::String.nullable()),
            ]),
        );

        catalog.insert(
            "spec_review",
            record([
                ("approved", SchemaType::Bool),
                ("severity", severity()),
                ("notes", SchemaType::String.nullable()),
            ]),
        );

        catalog.insert(
            "code_review",
            record([
                ("approved", SchemaType::Bool),
                ("severity", severity()),
                ("notes", SchemaType::String.nullable()),
            ]),
        );

        catalog.insert(
            "review_fix",
            record([
                ("summary", SchemaType::String),
                ("filesChanged", SchemaType::String.list_of()),
            ]),
        );

        catalog.insert(
            "report",
            record([
                ("summary", SchemaType::String),
                ("status", status()),
            ]),
        );

        catalog.insert(
            "land",
            record([
                ("landed", SchemaType::Bool),
                ("evicted", SchemaType::Bool),
                ("reason", SchemaType::String.nullable()),
                ("branchCommits", SchemaType::String.list_of().nullable()),
                ("diffSummary", SchemaType::String.list_of().nullable()),
                ("mainlineCommits", SchemaType::String.list_of().nullable()),
            ]),
        );

        catalog.insert(
            "ticket_schedule",
            record([
                ("jobs", SchemaType::String.list_of()),
                ("rateLimitedAgents", SchemaType::String.list_of().nullable()),
            ]),
        );

        catalog.insert(
            "merge_queue_result",
            record([
                ("ticketId", SchemaType::String),
                ("landed", SchemaType::Bool),
                ("evicted", SchemaType::Bool),
                ("reason", SchemaType::String.nullable()),
            ]),
        );

        catalog.insert(
            "interpret_config",
            record([("summary", SchemaType::String)]),
        );

        catalog.insert(
            "progress",
            record([
                ("summary", SchemaType::String),
                ("status", status()),
            ]),
        );

        catalog.insert("monitor", record([("summary", SchemaType::String)]));

        catalog.insert(
            "category_review",
            record([
                ("category", SchemaType::String),
                ("severity", severity()),
                ("notes", SchemaType::String.nullable()),
            ]),
        );

        catalog.insert(
            "integration_test",
            record([
                ("passed", SchemaType::Bool),
                ("summary", SchemaType::String),
            ]),
        );

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_every_named_key() {
        let catalog = SchemaCatalog::builtin();
        for key in [
            "discover",
            "research",
            "plan",
            "implement",
            "test_results",
            "build_verify",
            "spec_review",
            "code_review",
            "review_fix",
            "report",
            "land",
            "ticket_schedule",
            "merge_queue_result",
            "interpret_config",
            "progress",
            "monitor",
            "category_review",
            "integration_test",
        ] {
            assert!(catalog.get(key).is_some(), "missing schema for {key}");
        }
    }

    #[test]
    fn enumerations_are_closed() {
        let catalog = SchemaCatalog::builtin();
        let discover = catalog.get("discover").unwrap();
        if let SchemaType::Record(fields) = discover {
            assert_eq!(
                fields.get("priority"),
                Some(&SchemaType::Enum(PRIORITY.to_vec()))
            );
        } else {
            panic!("expected record");
        }
    }
}
