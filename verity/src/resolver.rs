//! `AnyResolver`: a closed enum over the three resolver backends (spec §6.5),
//! implementing `Resolver` by matching and delegating. `Resolver` uses
//! `#[allow(async_fn_in_trait)]` and is therefore not object-safe, so this is the
//! concrete type the scheduler's generic `R: Resolver` bound is instantiated with
//! at the top of the stack, in place of a `dyn Resolver` that could never exist.

use verity_core::config::{DispatchConfig, ResolverType};
use verity_core::errors::DispatchError;
use verity_core::traits::Resolver;
use verity_dispatch::{IssueTrackerResolver, NoneResolver, WebhookResolver};

pub enum AnyResolver {
    None(NoneResolver),
    Webhook(WebhookResolver),
    IssueTracker(IssueTrackerResolver),
}

impl AnyResolver {
    /// Build the configured backend, per spec §6.5/§6.7. `webhook`/`issue_tracker`
    /// with no `resolver_url` configured fall back to an empty URL, which is a
    /// caller configuration error surfaced at dispatch time rather than here.
    pub fn from_config(config: &DispatchConfig) -> Self {
        match config.resolver_type {
            ResolverType::None => AnyResolver::None(NoneResolver),
            ResolverType::Webhook => {
                AnyResolver::Webhook(WebhookResolver::new(config.resolver_url.clone().unwrap_or_default(), config.resolver_token.clone()))
            }
            ResolverType::IssueTracker => {
                AnyResolver::IssueTracker(IssueTrackerResolver::new(config.resolver_url.clone().unwrap_or_default(), config.resolver_token.clone()))
            }
        }
    }
}

impl Resolver for AnyResolver {
    async fn dispatch(&self, payload: &serde_json::Value) -> Result<(), DispatchError> {
        match self {
            AnyResolver::None(r) => r.dispatch(payload).await,
            AnyResolver::Webhook(r) => r.dispatch(payload).await,
            AnyResolver::IssueTracker(r) => r.dispatch(payload).await,
        }
    }
}
