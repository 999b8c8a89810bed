use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::pipeline::types::{ChartType, ExplanationFragment};

// Output of SQL generation
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: String,
}

impl GeneratedQuery {
    pub fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }
}

// Output of query explanation
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedExplanations {
    pub explanations: Vec<ExplanationFragment>,
}

impl GeneratedExplanations {
    pub fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "explanations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "fragment": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["fragment", "description"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["explanations"],
            "additionalProperties": false
        })
    }
}

/// Chart configuration without colors; colors are assigned locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDraft {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x_key: String,
    pub y_keys: Vec<String>,
    pub legend: bool,
}

impl ChartDraft {
    pub fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "enum": ["bar", "line", "pie", "area", "scatter"] },
                "xKey": { "type": "string" },
                "yKeys": { "type": "array", "items": { "type": "string" } },
                "legend": { "type": "boolean" }
            },
            "required": ["type", "xKey", "yKeys", "legend"],
            "additionalProperties": false
        })
    }
}
