use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RetrieveMemoriesParams {
    #[schemars(description = "Session token of the user whose memories are searched")]
    pub auth_token: String,

    #[schemars(description = "What to search for in the memories")]
    pub query: String,

    #[schemars(description = "Maximum number of memories to return (1-100). Defaults to 5.")]
    pub limit: Option<i64>,

    #[schemars(description = "Minimum cosine similarity, 0.0-1.0. Defaults to 0.7.")]
    pub threshold: Option<f64>,
}
