// LLM abstraction layer

pub mod provider;
pub mod openrouter;

pub use openrouter::OpenRouterAdapter;
pub use provider::*;
