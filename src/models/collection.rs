//! Smart collections: saved queries that behave like virtual folders.

use crate::models::file_record::FileType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a rule combines with the result of every rule before it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum TypeCondition {
    Equals(FileType),
    In(Vec<FileType>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum SizeCondition {
    GreaterThan(u64),
    LessThan(u64),
}

/// Compared against `updated_at`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum DateCondition {
    Before(DateTime<Utc>),
    After(DateTime<Utc>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum TagCondition {
    Contains(Uuid),
    In(Vec<Uuid>),
    NotIn(Vec<Uuid>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum TextCondition {
    Contains(String),
    Equals(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum ExtensionCondition {
    Equals(String),
    In(Vec<String>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum FlagCondition {
    Equals(bool),
}

/// One (field, operator, value) test. The set of fields is closed and each
/// field only admits the operators that make sense for it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "field", rename_all = "camelCase")]
pub enum Condition {
    Type(TypeCondition),
    Size(SizeCondition),
    Date(DateCondition),
    Tags(TagCondition),
    Name(TextCondition),
    Extension(ExtensionCondition),
    Starred(FlagCondition),
    Shared(FlagCondition),
}

/// A condition plus the conjunction joining it to the rules before it.
///
/// Wire shape: `{"field":"type","operator":"equals","value":"document","conjunction":"AND"}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CollectionRule {
    #[serde(flatten)]
    pub condition: Condition,

    #[serde(default)]
    pub conjunction: Conjunction,
}

/// A saved, rule-evaluated virtual folder.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmartCollection {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub rules: Vec<CollectionRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_reads_flat_json() {
        let rule: CollectionRule = serde_json::from_value(json!({
            "field": "type",
            "operator": "equals",
            "value": "document",
            "conjunction": "OR"
        }))
        .unwrap();

        assert_eq!(
            rule.condition,
            Condition::Type(TypeCondition::Equals(FileType::Document))
        );
        assert_eq!(rule.conjunction, Conjunction::Or);
    }

    #[test]
    fn conjunction_defaults_to_and() {
        let rule: CollectionRule = serde_json::from_value(json!({
            "field": "size",
            "operator": "greaterThan",
            "value": 1024
        }))
        .unwrap();

        assert_eq!(rule.conjunction, Conjunction::And);
        assert_eq!(rule.condition, Condition::Size(SizeCondition::GreaterThan(1024)));
    }

    #[test]
    fn operator_must_fit_field() {
        let result: Result<CollectionRule, _> = serde_json::from_value(json!({
            "field": "starred",
            "operator": "greaterThan",
            "value": 3
        }));
        assert!(result.is_err());
    }
}
