use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StoreMemoryParams {
    #[schemars(description = "Session token of the user the memory belongs to")]
    pub auth_token: String,

    #[schemars(description = "The information to remember (at most 8000 characters)")]
    pub content: String,

    #[schemars(description = "Optional JSON object stored alongside the memory, e.g. {\"category\": \"work\"}")]
    pub metadata: Option<serde_json::Value>,
}
