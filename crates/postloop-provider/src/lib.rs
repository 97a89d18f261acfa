//! # postloop-provider
//!
//! Capability contracts consumed by the loop controller, plus the concrete
//! adapters that talk to the outside world.
//!
//! ## Key Types
//!
//! - [`Generator`] / [`Critic`] / [`PreCheck`] - the three capability seams
//! - [`ModelClient`] - retrying Anthropic messages-API client
//! - [`ModelGenerator`] / [`ModelCritic`] - typed JSON adapters over the client
//!
//! Capabilities are constructed once and injected by reference into
//! controller instances. Retry policy for transient API failures lives
//! here, never in the loop itself.

mod anthropic;
mod message;
mod retry;
mod task;
mod traits;

pub use anthropic::{extract_json, ModelClient, ModelCritic, ModelGenerator, DEFAULT_MODEL};
pub use message::{Message, Role};
pub use retry::RetryPolicy;
pub use task::TaskSpec;
pub use traits::{Critic, Generation, Generator, PreCheck, ProviderError};
