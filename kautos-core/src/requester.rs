//! Forced structured output from a generative backend.
//!
//! The backend is a capability: it takes an instruction, a context payload,
//! one tool schema and a temperature, and must answer by calling that tool.
//! [`ContentRequester`] layers the three event operations on top of it and
//! validates whatever comes back.

use crate::error::GenerationError;
use crate::schema::{event_schema, Event};
use async_trait::async_trait;
use claude::{Claude, Message, Request, Tool};
use serde_json::Value;
use tracing::{debug, instrument};

/// Sampling temperature for creative generation.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// One forced-tool call.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub instruction: String,
    pub context: String,
    /// The single tool the backend is forced to call.
    pub tool: Tool,
    pub temperature: f32,
}

/// A backend able to return one value shaped by a tool schema.
#[async_trait]
pub trait StructuredBackend: Send + Sync {
    /// Return the input the backend passed to `request.tool`.
    async fn generate(&self, request: StructuredRequest) -> Result<Value, claude::Error>;
}

/// [`StructuredBackend`] over the Claude Messages API.
pub struct ClaudeBackend {
    client: Claude,
    max_tokens: usize,
}

impl ClaudeBackend {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl StructuredBackend for ClaudeBackend {
    async fn generate(&self, request: StructuredRequest) -> Result<Value, claude::Error> {
        let tool_name = request.tool.name.clone();
        let api_request = Request::new(vec![Message::user(request.context)])
            .with_system(request.instruction)
            .with_max_tokens(self.max_tokens)
            .with_temperature(request.temperature)
            .with_tools(vec![request.tool]);
        self.client.complete_forced_tool(api_request, &tool_name).await
    }
}

/// The structured-output contracts this crate requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationTag {
    SimilarEvent,
    CompleteEvent,
    GenerateInRange,
}

impl OperationTag {
    pub fn tool_name(&self) -> &'static str {
        match self {
            OperationTag::SimilarEvent => "generate_similar_event",
            OperationTag::CompleteEvent => "complete_event",
            OperationTag::GenerateInRange => "generate_event_in_range",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OperationTag::SimilarEvent => {
                "Record a new event similar to the seed event. Exactly one event, not a list."
            }
            OperationTag::CompleteEvent => {
                "Record the completed version of the given event. Exactly one event, not a list."
            }
            OperationTag::GenerateInRange => {
                "Record a new event inside the given time range and location. Exactly one event, not a list."
            }
        }
    }

    /// System instruction for the operation.
    pub fn instruction(&self) -> &'static str {
        match self {
            OperationTag::SimilarEvent => include_str!("prompts/similar_event.txt"),
            OperationTag::CompleteEvent => include_str!("prompts/complete_event.txt"),
            OperationTag::GenerateInRange => include_str!("prompts/event_in_range.txt"),
        }
    }

    /// The tool definition for this operation with the given input schema.
    pub fn tool(&self, schema: Value) -> Tool {
        Tool {
            name: self.tool_name().to_string(),
            description: self.description().to_string(),
            input_schema: schema,
        }
    }
}

/// Requests structured values from a [`StructuredBackend`].
pub struct ContentRequester<B> {
    backend: B,
}

impl<B: StructuredBackend> ContentRequester<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Force one structured value matching `schema` out of the backend.
    ///
    /// No retry is attempted. Every backend failure surfaces as
    /// [`GenerationError::Backend`].
    #[instrument(level = "debug", skip(self, instruction, context, schema), fields(tool = tag.tool_name()))]
    pub async fn request(
        &self,
        instruction: &str,
        context: &str,
        schema: Value,
        tag: OperationTag,
        temperature: f32,
    ) -> Result<Value, GenerationError> {
        let request = StructuredRequest {
            instruction: instruction.to_string(),
            context: context.to_string(),
            tool: tag.tool(schema),
            temperature,
        };
        let value = self.backend.generate(request).await?;
        debug!("structured output received");
        Ok(value)
    }

    /// Request one event for `tag` and check it against the event contract.
    pub async fn request_event(
        &self,
        context: &str,
        tag: OperationTag,
        temperature: f32,
    ) -> Result<Event, GenerationError> {
        let value = self
            .request(tag.instruction(), context, event_schema(), tag, temperature)
            .await?;
        let event: Event = serde_json::from_value(value).map_err(GenerationError::Malformed)?;
        event
            .validate_generated()
            .map_err(GenerationError::InvalidOutput)?;
        Ok(event)
    }
}
