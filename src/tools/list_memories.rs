use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListMemoriesParams {
    #[schemars(description = "Session token of the user whose memories are listed")]
    pub auth_token: String,

    #[schemars(description = "Page size (1-100). Defaults to 10.")]
    pub limit: Option<i64>,

    #[schemars(description = "Number of memories to skip, most recent first")]
    pub offset: Option<i64>,
}
