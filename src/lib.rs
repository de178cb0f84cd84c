//! Loan Advisor
//!
//! Decision pipeline behind a conversational loan advisor:
//! - Chat turns answered by a language model, with a keyword fallback
//! - Inline result tags carrying eligibility verdicts inside chat text
//! - Rule-based eligibility scoring against a product's criteria
//! - AI-assisted document plausibility checks
//! - A guarded application lifecycle with an audit trail
//!
//! FLOW:
//! CHAT → VERDICT TAG → APPLICATION → DOCUMENTS → ANALYSIS → REVIEW → DISBURSE

pub mod analysis;
pub mod audit;
pub mod config;
pub mod conversation;
pub mod eligibility;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod reasoner;
pub mod store;
pub mod tags;
pub mod telemetry;

pub use error::{AdvisorError, Result};

// Re-export common types
pub use conversation::{ConversationEngine, ConversationTurn};
pub use lifecycle::ApplicationService;
pub use models::*;
pub use tags::ResultTagCodec;
