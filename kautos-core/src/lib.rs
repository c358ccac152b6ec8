//! Timeline context resolution and event generation for the world of Kautos.
//!
//! This crate provides:
//! - Typed projections of the timeline's Notion databases
//! - A context resolver that flattens events and gathers nearby ones
//! - A content requester that forces one structured event out of Claude
//! - The [`Chronicler`] facade tying both together
//!
//! # Quick Start
//!
//! ```ignore
//! use kautos_core::{Chronicler, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let chronicler = Chronicler::from_config(&config)?;
//!
//!     let event = chronicler
//!         .generate_similar_event("Founding of Merkuna", 100, true, true)
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&event)?);
//!     Ok(())
//! }
//! ```

pub mod chronicler;
pub mod config;
pub mod error;
pub mod projection;
pub mod requester;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod testing;

pub use chronicler::Chronicler;
pub use config::Config;
pub use error::{ConfigError, Error, GenerationError, RecordKind, ResolveError};
pub use requester::{ClaudeBackend, ContentRequester, OperationTag, StructuredBackend};
pub use resolver::{ContextResolver, RangeQuery, RelationPolicy, YearRange};
pub use schema::{Biome, Event, EventType, Location, Polity};
pub use store::RecordStore;
