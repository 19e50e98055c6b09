//! Smart collection rule evaluation and the registry of saved collections.
//!
//! Rules are folded strictly left to right: the first rule seeds the result
//! and each later rule joins the running result with its own conjunction.
//! `A AND B OR C` therefore means `(A AND B) OR C`, and `A OR B AND C` means
//! `(A OR B) AND C`. There is no operator precedence.

use crate::{
    models::{
        collection::{
            CollectionRule, Condition, Conjunction, DateCondition, ExtensionCondition,
            FlagCondition, SizeCondition, SmartCollection, TagCondition, TextCondition,
            TypeCondition,
        },
        file_record::FileRecord,
    },
    services::file_tree::{TreeError, TreeResult},
};
use chrono::Utc;
use uuid::Uuid;

fn matches_type(cond: &TypeCondition, record: &FileRecord) -> bool {
    match cond {
        TypeCondition::Equals(t) => record.file_type == *t,
        TypeCondition::In(types) => types.contains(&record.file_type),
    }
}

fn matches_size(cond: &SizeCondition, record: &FileRecord) -> bool {
    match cond {
        SizeCondition::GreaterThan(bytes) => record.size > *bytes,
        SizeCondition::LessThan(bytes) => record.size < *bytes,
    }
}

fn matches_date(cond: &DateCondition, record: &FileRecord) -> bool {
    match cond {
        DateCondition::Before(at) => record.updated_at < *at,
        DateCondition::After(at) => record.updated_at > *at,
    }
}

fn matches_tags(cond: &TagCondition, record: &FileRecord) -> bool {
    match cond {
        TagCondition::Contains(tag) => record.tags.contains(tag),
        TagCondition::In(tags) => tags.iter().any(|t| record.tags.contains(t)),
        TagCondition::NotIn(tags) => !tags.iter().any(|t| record.tags.contains(t)),
    }
}

fn matches_name(cond: &TextCondition, record: &FileRecord) -> bool {
    match cond {
        TextCondition::Contains(text) => record.name.to_lowercase().contains(&text.to_lowercase()),
        TextCondition::Equals(text) => record.name == *text,
    }
}

fn matches_extension(cond: &ExtensionCondition, record: &FileRecord) -> bool {
    let Some(ext) = record.extension() else {
        return false;
    };
    let normalize = |s: &str| s.trim_start_matches('.').to_ascii_lowercase();
    match cond {
        ExtensionCondition::Equals(want) => ext == normalize(want),
        ExtensionCondition::In(wants) => wants.iter().any(|w| ext == normalize(w)),
    }
}

fn matches_flag(cond: &FlagCondition, actual: bool) -> bool {
    match cond {
        FlagCondition::Equals(want) => actual == *want,
    }
}

/// Evaluate a single condition against a record.
pub fn matches_condition(condition: &Condition, record: &FileRecord) -> bool {
    match condition {
        Condition::Type(c) => matches_type(c, record),
        Condition::Size(c) => matches_size(c, record),
        Condition::Date(c) => matches_date(c, record),
        Condition::Tags(c) => matches_tags(c, record),
        Condition::Name(c) => matches_name(c, record),
        Condition::Extension(c) => matches_extension(c, record),
        Condition::Starred(c) => matches_flag(c, record.starred),
        Condition::Shared(c) => matches_flag(c, record.shared),
    }
}

/// Evaluate a whole rule chain against a record.
///
/// The first rule's conjunction is ignored. An empty chain matches.
pub fn matches_rules(rules: &[CollectionRule], record: &FileRecord) -> bool {
    let mut iter = rules.iter();
    let Some(first) = iter.next() else {
        return true;
    };

    iter.fold(matches_condition(&first.condition, record), |acc, rule| {
        let hit = matches_condition(&rule.condition, record);
        match rule.conjunction {
            Conjunction::And => acc && hit,
            Conjunction::Or => acc || hit,
        }
    })
}

/// Fields supplied when saving a collection.
#[derive(Clone, Debug)]
pub struct NewCollection {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub rules: Vec<CollectionRule>,
}

const DEFAULT_ICON: &str = "sparkles";
const DEFAULT_COLOR: &str = "#8b5cf6";

/// Saved smart collections, in creation order.
#[derive(Debug, Default)]
pub struct CollectionStore {
    collections: Vec<SmartCollection>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, new: NewCollection) -> TreeResult<SmartCollection> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(TreeError::InvalidName {
                name: new.name.clone(),
                reason: "collection name cannot be empty".into(),
            });
        }
        if new.rules.is_empty() {
            return Err(TreeError::InvalidRule(
                "a collection needs at least one rule".into(),
            ));
        }

        let now = Utc::now();
        let collection = SmartCollection {
            id: Uuid::new_v4(),
            name: name.to_string(),
            icon: new.icon.unwrap_or_else(|| DEFAULT_ICON.into()),
            color: new.color.unwrap_or_else(|| DEFAULT_COLOR.into()),
            rules: new.rules,
            created_at: now,
            updated_at: now,
        };
        self.collections.push(collection.clone());
        Ok(collection)
    }

    pub fn list(&self) -> &[SmartCollection] {
        &self.collections
    }

    pub fn get(&self, id: Uuid) -> TreeResult<&SmartCollection> {
        self.collections
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("collection {}", id)))
    }

    pub fn delete(&mut self, id: Uuid) -> TreeResult<SmartCollection> {
        let pos = self
            .collections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("collection {}", id)))?;
        Ok(self.collections.remove(pos))
    }
}
