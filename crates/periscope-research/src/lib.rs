//! `periscope-research` — the two remote collaborators.
//!
//! [`client::ResearchClient`] is the completion-call contract (implemented
//! for the Perplexity chat-completions API), [`webhook::Notifier`] the
//! fire-and-forget outcome delivery. Both carry their own bounded timeout
//! so a slow external dependency can never starve the scheduler's timer
//! tasks.

pub mod client;
pub mod perplexity;
pub mod webhook;

pub use client::{Completion, ResearchClient, ResearchError, ResearchRequest};
pub use perplexity::PerplexityClient;
pub use webhook::{DeliveryStatus, Notifier, NotifyError, WebhookNotifier, WebhookPayload};
