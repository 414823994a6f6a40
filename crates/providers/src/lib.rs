//! External backend implementations for VitalChat.
//!
//! - [`OpenAiCompatProvider`] implements `vitalchat_core::Provider`.
//! - [`OpenAiWebSearch`] implements `vitalchat_core::SearchCapability`.
//!
//! [`build_from_config`] wires both from an `AppConfig`.

pub mod openai_compat;
pub mod router;
pub mod web_search;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{Backends, build_from_config};
pub use web_search::OpenAiWebSearch;
