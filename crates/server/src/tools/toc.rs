//! toc_get tool implementation.

use std::path::Path;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use klazz_core::content::load_toc;

/// Input parameters for toc_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TocGetParams {
    /// Language directory, e.g. `javascript`.
    pub language: String,
}

/// Implementation of the toc_get tool.
pub fn toc_impl(content_dir: &Path, params: TocGetParams) -> Result<CallToolResult, McpError> {
    let toc = load_toc(content_dir, params.language.trim())?;
    json_result(&toc)
}
