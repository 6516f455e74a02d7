use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteMemoryParams {
    #[schemars(description = "Session token of the memory's owner")]
    pub auth_token: String,

    #[schemars(description = "ID of the memory to delete")]
    pub id: String,
}
