//! Process-local map from usage slot to the configuration currently backing it.

use chrono::Utc;
use indexmap::IndexMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use switchyard_core::{
    LlmProfile, Missing, ProfileError, ProfileId, ProfileSource, RegistryEvent,
    RegistryEventKind, Result, SwitchRequest,
};
use switchyard_store::ProfileStore;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type Subscriber = Box<dyn FnMut(&RegistryEvent) -> anyhow::Result<()> + Send>;

/// Handle returned by [`Registry::subscribe`]. Only the most recent token can
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

pub struct Registry<S = ProfileStore> {
    registry_id: Uuid,
    source: S,
    usage_to_llm: IndexMap<String, LlmProfile>,
    subscriber: Option<(SubscriptionToken, Subscriber)>,
    next_token: u64,
}

impl<S> fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("registry_id", &self.registry_id)
            .field("usage_ids", &self.usage_to_llm.keys().collect::<Vec<_>>())
            .field("subscribed", &self.subscriber.is_some())
            .finish()
    }
}

impl<S: ProfileSource> Registry<S> {
    pub fn new(source: S) -> Self {
        Self {
            registry_id: Uuid::now_v7(),
            source,
            usage_to_llm: IndexMap::new(),
            subscriber: None,
            next_token: 0,
        }
    }

    pub fn registry_id(&self) -> Uuid {
        self.registry_id
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Install the single subscriber, replacing any previous one.
    ///
    /// The callback runs synchronously inside `bind`/`switch`, so a slow
    /// subscriber delays those calls. Errors and panics it raises are logged
    /// and swallowed.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionToken
    where
        F: FnMut(&RegistryEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.next_token += 1;
        let token = SubscriptionToken(self.next_token);
        if self.subscriber.replace((token, Box::new(callback))).is_some() {
            debug!(registry_id = %self.registry_id, "replaced registry subscriber");
        }
        token
    }

    /// Returns false when `token` is stale (another subscriber took over).
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        match &self.subscriber {
            Some((current, _)) if *current == token => {
                self.subscriber = None;
                true
            }
            _ => false,
        }
    }

    pub fn bind(&mut self, llm: LlmProfile) -> Result<()> {
        let usage_id = llm.usage_id.clone();
        if self.usage_to_llm.contains_key(&usage_id) {
            return Err(ProfileError::DuplicateSlot { usage_id });
        }
        self.usage_to_llm.insert(usage_id.clone(), llm.clone());
        info!(
            registry_id = %self.registry_id,
            usage_id = %usage_id,
            profile_id = llm.profile_id.as_deref().unwrap_or("-"),
            "bound llm"
        );
        self.notify(RegistryEventKind::Bound, llm);
        Ok(())
    }

    pub fn get(&self, usage_id: &str) -> Result<&LlmProfile> {
        let llm = self
            .usage_to_llm
            .get(usage_id)
            .ok_or_else(|| missing_slot(usage_id))?;
        debug!(registry_id = %self.registry_id, usage_id, "retrieved llm");
        Ok(llm)
    }

    /// Bound usage ids in bind order.
    pub fn usage_ids(&self) -> Vec<&str> {
        self.usage_to_llm.keys().map(String::as_str).collect()
    }

    /// Point `usage_id` at the stored profile `profile_id`.
    ///
    /// The loaded profile is rebound to `usage_id`, so one profile can back
    /// several slots. Switching to the configuration already bound is a no-op
    /// and does not notify. On any error the previous binding is untouched.
    pub fn switch(&mut self, usage_id: &str, profile_id: &str) -> Result<LlmProfile> {
        if !self.usage_to_llm.contains_key(usage_id) {
            return Err(missing_slot(usage_id));
        }
        let loaded = self.source.load_profile(profile_id)?;
        let next = LlmProfile {
            usage_id: usage_id.to_string(),
            profile_id: Some(profile_id.to_string()),
            ..loaded
        };
        self.replace(usage_id, next)
    }

    /// Apply a switch request: a profile id goes through [`Registry::switch`],
    /// an inline configuration is rebound to `usage_id` and installed as is.
    pub fn apply(&mut self, usage_id: &str, request: SwitchRequest) -> Result<LlmProfile> {
        match request {
            SwitchRequest::Profile(profile_id) => self.switch(usage_id, &profile_id),
            SwitchRequest::Inline(llm) => {
                let next = LlmProfile {
                    usage_id: usage_id.to_string(),
                    ..*llm
                };
                self.replace(usage_id, next)
            }
        }
    }

    fn replace(&mut self, usage_id: &str, next: LlmProfile) -> Result<LlmProfile> {
        let slot = self
            .usage_to_llm
            .get_mut(usage_id)
            .ok_or_else(|| missing_slot(usage_id))?;
        if *slot == next {
            debug!(
                registry_id = %self.registry_id,
                usage_id,
                "switch resolved to the active configuration; nothing to do"
            );
            return Ok(next);
        }

        let previous = std::mem::replace(slot, next.clone());
        info!(
            registry_id = %self.registry_id,
            usage_id,
            from = previous.profile_id.as_deref().unwrap_or("-"),
            to = next.profile_id.as_deref().unwrap_or("-"),
            model = %next.model,
            "switched llm"
        );
        self.notify(
            RegistryEventKind::Switched {
                previous_profile_id: previous.profile_id,
            },
            next.clone(),
        );
        Ok(next)
    }

    fn notify(&mut self, kind: RegistryEventKind, llm: LlmProfile) {
        let Some((_, callback)) = self.subscriber.as_mut() else {
            return;
        };
        let event = RegistryEvent {
            registry_id: self.registry_id,
            at: Utc::now(),
            kind,
            llm,
        };
        match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                registry_id = %self.registry_id,
                usage_id = event.usage_id(),
                "failed to emit registry event: {err:#}"
            ),
            Err(_) => warn!(
                registry_id = %self.registry_id,
                usage_id = event.usage_id(),
                "registry subscriber panicked; event dropped"
            ),
        }
    }
}

impl Registry<ProfileStore> {
    /// Load profiles from the store and bind each one. All stored profiles
    /// are tried when `profile_ids` is `None`.
    ///
    /// Invalid ids, unreadable documents and already-bound slots are skipped
    /// with a log line. Returns the usage ids that were bound.
    pub fn register_profiles(&mut self, profile_ids: Option<&[String]>) -> Result<Vec<String>> {
        let candidates = match profile_ids {
            Some(ids) => ids.to_vec(),
            None => self.source.list()?,
        };

        let mut registered = Vec::new();
        for profile_id in candidates {
            if let Err(err) = ProfileId::parse(&profile_id) {
                warn!(profile_id = %profile_id, "skipping profile: {err}");
                continue;
            }
            let llm = match self.source.load(&profile_id) {
                Ok(llm) => llm,
                Err(err) => {
                    warn!(profile_id = %profile_id, "failed to load profile: {err}");
                    continue;
                }
            };
            let usage_id = llm.usage_id.clone();
            match self.bind(llm) {
                Ok(()) => registered.push(usage_id),
                Err(err) => info!(
                    profile_id = %profile_id,
                    "skipping profile: registry bind failed: {err}"
                ),
            }
        }
        Ok(registered)
    }
}

impl<S: ProfileSource> ProfileSource for Registry<S> {
    fn load_profile(&self, profile_id: &str) -> Result<LlmProfile> {
        self.source.load_profile(profile_id)
    }
}

fn missing_slot(usage_id: &str) -> ProfileError {
    Missing::Slot {
        usage_id: usage_id.to_string(),
    }
    .into()
}
