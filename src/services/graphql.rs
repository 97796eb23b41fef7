//! GraphQL request and response envelopes.
//!
//! Documents are static; every value travels in `variables` so nothing
//! user-supplied is ever interpolated into query text.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};

/// A GraphQL operation ready to be posted as JSON.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Map<String, Value>,
}

impl GraphQlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        GraphQlRequest {
            query: query.into(),
            variables: Map::new(),
        }
    }

    /// Bind a variable.
    pub fn var(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorItem {
    pub message: String,
}

/// Standard GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlErrorItem>>,
}

impl<T: DeserializeOwned> GraphQlResponse<T> {
    /// Data when the operation fully succeeded.
    pub fn into_data(self) -> SyncResult<T> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            return Err(SyncError::GraphQl(
                errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        self.data
            .ok_or_else(|| SyncError::GraphQl(vec!["response carried no data".to_string()]))
    }
}
