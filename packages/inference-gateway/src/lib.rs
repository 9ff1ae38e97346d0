//! Typed facade over embed/rerank/NLI/LLM-extract model transports
//!, with calibration and prompt-leak defense built in.

pub mod calibration;
pub mod credentials;
pub mod error;
pub mod leak_defense;
pub mod openai_gateway;
pub mod robust_parse;
pub mod traits;
pub mod types;

pub use credentials::ProviderCredentials;
pub use error::{GatewayError, Result};
pub use openai_gateway::OpenAiGateway;
pub use traits::InferenceGateway;
pub use types::{ClaimType, ExtractedClaim, NliLabel, NliResult, RerankedDoc};
