//! Assistants backend implementations.
//!
//! `build(config)` is the factory, called at startup.
//! Adding a new backend = new module + new match arm.

pub mod azure;
pub mod dummy;

use crate::assistants::{ApiError, AssistantsBackend};
use crate::config::Config;

/// Construct an `AssistantsBackend` from config.
///
/// The Azure backend needs an endpoint and the API key from
/// `AZURE_OPENAI_API_KEY`; the dummy backend needs neither.
pub fn build(config: &Config) -> Result<AssistantsBackend, ApiError> {
    match config.assistant.backend.as_str() {
        "dummy" => Ok(AssistantsBackend::Dummy(dummy::DummyAssistants::new())),
        "azure" => {
            if config.azure.endpoint.is_empty() {
                return Err(ApiError::MissingEndpoint);
            }
            let api_key = config.api_key.clone().ok_or(ApiError::MissingApiKey)?;
            let client = azure::AzureAssistantsClient::new(
                config.azure.endpoint.clone(),
                config.azure.api_version.clone(),
                config.azure.timeout_seconds,
                api_key,
            )?;
            Ok(AssistantsBackend::Azure(client))
        }
        other => Err(ApiError::UnknownBackend(other.to_string())),
    }
}
