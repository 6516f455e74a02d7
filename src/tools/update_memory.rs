use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateMemoryParams {
    #[schemars(description = "Session token of the memory's owner")]
    pub auth_token: String,

    #[schemars(description = "ID of the memory to update")]
    pub id: String,

    #[schemars(description = "Replacement content; the embedding is regenerated from it")]
    pub content: String,

    #[schemars(description = "Replacement metadata object")]
    pub metadata: Option<serde_json::Value>,
}
