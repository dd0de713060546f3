//! Tabular (`as=Table`) rendering of resource objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::object;

const NAME_DESCRIPTION: &str = "Name must be unique within a namespace. Is required when creating resources, although some resources may allow a client to request the generation of an appropriate name automatically. Name is primarily intended for creation idempotence and configuration definition. Cannot be updated. More info: http://kubernetes.io/docs/user-guide/identifiers#names";
const AGE_DESCRIPTION: &str =
    "Custom resource definition column (in JSONPath format): .metadata.creationTimestamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub kind: String,
    pub api_version: String,
    pub metadata: TableMetadata,
    pub column_definitions: Vec<TableColumnDefinition>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub format: String,
    pub description: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<Value>,
    pub object: Value,
}

/// The fixed `Name` / `Age` column set.
pub fn columns() -> Vec<TableColumnDefinition> {
    vec![
        TableColumnDefinition {
            name: "Name".into(),
            column_type: "string".into(),
            format: "name".into(),
            description: NAME_DESCRIPTION.into(),
            priority: 0,
        },
        TableColumnDefinition {
            name: "Age".into(),
            column_type: "date".into(),
            format: String::new(),
            description: AGE_DESCRIPTION.into(),
            priority: 0,
        },
    ]
}

/// Renders `items` as a table. The age cell is the stored creation
/// timestamp, verbatim, or `null`.
pub fn render(items: Vec<Value>) -> Table {
    let rows = items
        .into_iter()
        .map(|item| TableRow {
            cells: vec![
                object::name(&item).map_or(Value::Null, |n| Value::String(n.into())),
                object::creation_timestamp(&item),
            ],
            object: item,
        })
        .collect();

    Table {
        kind: "Table".into(),
        api_version: "meta.k8s.io/v1".into(),
        metadata: TableMetadata::default(),
        column_definitions: columns(),
        rows,
    }
}
