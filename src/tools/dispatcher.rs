//! Routes tool calls issued by the assistant to the lending functions.
//!
//! Every call yields exactly one output so the run can continue: unknown
//! tools and malformed arguments are reported back to the model as text
//! rather than aborting the run.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::assistants::{Run, ToolCall, ToolOutput};

use super::ToolError;
use super::lending::{
    self, CREATE_LOAN_DOC, GET_RATE_SHEET, LoanDocArgs, RateSheetArgs, WEB_SEARCH, WebSearchArgs,
};

#[derive(Debug, Clone, Default)]
pub struct ToolDispatcher;

impl ToolDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Outputs for every pending tool call of `run`, in call order, ready
    /// for `submit_tool_outputs`.
    pub fn handle_step(&self, run: &Run) -> Result<Vec<ToolOutput>, ToolError> {
        if run.required_action.is_none() {
            return Err(ToolError::NoRequiredAction(run.id.clone()));
        }
        Ok(run
            .pending_tool_calls()
            .iter()
            .map(|call| ToolOutput {
                tool_call_id: call.id.clone(),
                output: self.dispatch(call),
            })
            .collect())
    }

    /// Execute a single call and return the text handed back to the model.
    pub fn dispatch(&self, call: &ToolCall) -> String {
        let name = call.function.name.as_str();
        let raw_args = call.function.arguments.as_str();
        debug!(tool = %name, call_id = %call.id, args = %raw_args, "dispatching tool call");

        let result = match name {
            WEB_SEARCH => parse_args::<WebSearchArgs>(raw_args).and_then(|a| lending::web_search(&a)),
            GET_RATE_SHEET => {
                parse_args::<RateSheetArgs>(raw_args).and_then(|a| lending::get_rate_sheet(&a))
            }
            CREATE_LOAN_DOC => {
                parse_args::<LoanDocArgs>(raw_args).and_then(|a| lending::create_loan_doc(&a))
            }
            other => {
                warn!(tool = %other, "model requested an unknown tool");
                return format!("Unknown tool {other}");
            }
        };

        result.unwrap_or_else(|reason| {
            warn!(tool = %name, %reason, "tool call rejected");
            format!("Invalid arguments for {name}: {reason}")
        })
    }
}

fn parse_args<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| e.to_string())
}
