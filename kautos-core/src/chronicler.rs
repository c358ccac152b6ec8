//! The chronicler: resolve context, then ask the backend for one event.

use crate::config::Config;
use crate::error::{ConfigError, Error, GenerationError};
use crate::requester::{ClaudeBackend, ContentRequester, OperationTag, StructuredBackend};
use crate::resolver::{ContextResolver, RangeQuery, YearRange};
use crate::schema::Event;
use crate::store::RecordStore;
use claude::Claude;
use notion::Notion;
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Generates timeline events from stored context.
pub struct Chronicler<S, B> {
    resolver: ContextResolver<S>,
    requester: ContentRequester<B>,
    temperature: f32,
}

impl Chronicler<Notion, ClaudeBackend> {
    /// Build a chronicler over Notion and Claude.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let notion = Notion::new(config.notion_token.clone())
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        let claude = Claude::new(config.anthropic_api_key.clone())
            .map_err(|e| ConfigError::Client(e.to_string()))?
            .with_model(config.model.clone());

        let resolver = ContextResolver::from_config(notion, config);
        let backend = ClaudeBackend::new(claude).with_max_tokens(config.max_tokens);
        Ok(Self::new(resolver, ContentRequester::new(backend)).with_temperature(config.temperature))
    }
}

impl<S: RecordStore, B: StructuredBackend> Chronicler<S, B> {
    pub fn new(resolver: ContextResolver<S>, requester: ContentRequester<B>) -> Self {
        Self {
            resolver,
            requester,
            temperature: crate::requester::DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn resolver(&self) -> &ContextResolver<S> {
        &self.resolver
    }

    pub fn requester(&self) -> &ContentRequester<B> {
        &self.requester
    }

    /// Generate a new event similar to the named seed event.
    #[instrument(level = "info", skip(self))]
    pub async fn generate_similar_event(
        &self,
        event_name: &str,
        delta_years: u32,
        near: bool,
        symmetric: bool,
    ) -> Result<Event, Error> {
        require_name(event_name)?;
        let (seed, similar) = self
            .resolver
            .resolve_similar_to_event(event_name, delta_years, near, symmetric)
            .await?;

        let context = [fenced("Event", &seed)?, fenced("Similar Events", &similar)?].concat();
        let event = self
            .requester
            .request_event(&context, OperationTag::SimilarEvent, self.temperature)
            .await?;

        info!(generated = %event.name, "generated similar event");
        Ok(event)
    }

    /// Fill the gaps of the named event, using nearby events as inspiration.
    #[instrument(level = "info", skip(self))]
    pub async fn complete_event(
        &self,
        event_name: &str,
        delta_years: u32,
        near: bool,
        symmetric: bool,
    ) -> Result<Event, Error> {
        require_name(event_name)?;
        let (seed, similar) = self
            .resolver
            .resolve_similar_to_event(event_name, delta_years, near, symmetric)
            .await?;

        let context = [
            fenced("Event to Complete", &seed)?,
            fenced("Similar Events", &similar)?,
        ]
        .concat();
        let event = self
            .requester
            .request_event(&context, OperationTag::CompleteEvent, self.temperature)
            .await?;

        if event.name != seed.name {
            warn!(seed = %seed.name, completed = %event.name, "completed event was renamed");
        }
        Ok(event)
    }

    /// Generate a new event inside `target` at `location`.
    ///
    /// Context is every event starting inside `context_range` at the location
    /// (and its neighbours when `near` is set).
    #[instrument(level = "info", skip(self))]
    pub async fn generate_event_in_range(
        &self,
        target: YearRange,
        context_range: YearRange,
        location: &str,
        near: bool,
    ) -> Result<Event, Error> {
        require_ordered("target", target)?;
        require_ordered("context", context_range)?;
        if location.trim().is_empty() {
            return Err(Error::InvalidInput("location must not be empty".to_string()));
        }

        let query = RangeQuery::within(context_range)
            .at_location(location)
            .near(near);
        let events = self.resolver.resolve_in_range(&query).await?;

        let context = [
            fenced_text("Time Range", &format!("{} to {}", target.start, target.end)),
            fenced_text("Location", location),
            fenced("Events", &events)?,
        ]
        .concat();
        let event = self
            .requester
            .request_event(&context, OperationTag::GenerateInRange, self.temperature)
            .await?;

        if !target.contains(event.start_year) || !target.contains(event.effective_end_year()) {
            warn!(
                start = event.start_year,
                end = ?event.end_year,
                "generated event falls outside the target range"
            );
        }
        if event.location_name() != Some(location) {
            warn!(expected = location, got = ?event.location_name(), "generated event is elsewhere");
        }
        Ok(event)
    }
}

fn require_name(event_name: &str) -> Result<(), Error> {
    if event_name.trim().is_empty() {
        return Err(Error::InvalidInput("event name must not be empty".to_string()));
    }
    Ok(())
}

fn require_ordered(what: &str, range: YearRange) -> Result<(), Error> {
    if range.end < range.start {
        return Err(Error::InvalidInput(format!(
            "{what} range ends ({}) before it starts ({})",
            range.end, range.start
        )));
    }
    Ok(())
}

fn fenced_text(title: &str, body: &str) -> String {
    format!("{title}:\n```\n{body}\n```\n")
}

fn fenced<T: Serialize + ?Sized>(title: &str, value: &T) -> Result<String, GenerationError> {
    let body = serde_json::to_string_pretty(value).map_err(GenerationError::Payload)?;
    Ok(fenced_text(title, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_sections() {
        assert_eq!(fenced_text("Location", "Veskar Isles"), "Location:\n```\nVeskar Isles\n```\n");
        assert_eq!(
            fenced("Events", &Vec::<Event>::new()).unwrap(),
            "Events:\n```\n[]\n```\n"
        );
    }

    #[test]
    fn test_range_order_check() {
        assert!(require_ordered("target", YearRange::new(5, 5)).is_ok());
        let err = require_ordered("context", YearRange::new(5, 4)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: context range ends (4) before it starts (5)");
    }
}
