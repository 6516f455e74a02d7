//! Assistant status tools that need no backend.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetStatusParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteTaskParams {
    #[schemars(description = "The task to execute")]
    pub task: String,
}

pub fn get_status() -> Value {
    json!({
        "status": "running",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

pub fn execute_task(params: ExecuteTaskParams) -> Value {
    json!({
        "task": params.task,
        "status": "completed",
        "result": "Task executed successfully",
    })
}
