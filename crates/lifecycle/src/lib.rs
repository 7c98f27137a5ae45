//! The per-provider key lifecycle: draft edits, saves, validation probes,
//! and the bulk save-all-and-close protocol.
//!
//! [`KeyLifecycleController`] owns the authoritative state for every
//! configured provider and is the single inbound surface for the
//! presentation layer. It is an explicit instance: construct one where the
//! UI tree is composed and clone it freely (clones share state). All
//! mutations are synchronous under one lock; the only suspension point is
//! the network probe inside [`KeyLifecycleController::handle_validate`], so
//! no two mutations ever interleave mid-update.
//!
//! Stale work is superseded, not cancelled: each provider carries generation
//! counters for its validation requests and its "saved" flash timer, and a
//! completion applies only while its token is still current. A draft edit or
//! clear bumps the tokens, so an in-flight probe for text the user has since
//! replaced can never overwrite the newer state.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    futures::future::join_all,
    tracing::{debug, info},
};

use {
    byokay_store::KeyStore,
    byokay_validation::{EMPTY_KEY_MESSAGE, KeyValidation, Outcome, ValidationClient},
};

mod record;

pub use record::KeyRecord;
pub use {
    byokay_common::{ProviderId, UnknownProvider},
    byokay_store,
    byokay_validation,
};

/// How long the "saved" confirmation stays visible before resetting.
const SAVED_FLASH: Duration = Duration::from_millis(1500);

/// Owns per-provider [`KeyRecord`] state and orchestrates saves and
/// validation probes against it.
#[derive(Clone)]
pub struct KeyLifecycleController {
    inner: Arc<Inner>,
}

struct Inner {
    /// Configured providers, in display order, deduplicated.
    providers: Vec<ProviderId>,
    /// One record per configured provider, present from construction on,
    /// so nothing downstream ever handles a missing entry.
    records: Mutex<HashMap<ProviderId, KeyRecord>>,
    /// Latest validation request per provider; completions carrying a stale
    /// token are discarded.
    validate_tokens: HashMap<ProviderId, AtomicU64>,
    /// Latest save per provider; guards the deferred saved-flash reset.
    flash_tokens: HashMap<ProviderId, AtomicU64>,
    /// True only while initial hydration from the store is running.
    is_loading: AtomicBool,
    store: KeyStore,
    validation: Arc<dyn KeyValidation>,
}

impl KeyLifecycleController {
    /// Build a controller for `providers` and hydrate it from `store`.
    ///
    /// A provider with a stored key starts out with that key as its draft
    /// and `is_validated` set: prior persistence implies the key was
    /// accepted once, and the system trusts that rather than re-probing on
    /// every load.
    pub fn new(
        providers: impl IntoIterator<Item = ProviderId>,
        store: KeyStore,
        validation: Arc<dyn KeyValidation>,
    ) -> Self {
        let mut configured: Vec<ProviderId> = Vec::new();
        for provider in providers {
            if !configured.contains(&provider) {
                configured.push(provider);
            }
        }

        let inner = Arc::new(Inner {
            records: Mutex::new(
                configured
                    .iter()
                    .map(|&provider| (provider, KeyRecord::default()))
                    .collect(),
            ),
            validate_tokens: configured
                .iter()
                .map(|&provider| (provider, AtomicU64::new(0)))
                .collect(),
            flash_tokens: configured
                .iter()
                .map(|&provider| (provider, AtomicU64::new(0)))
                .collect(),
            is_loading: AtomicBool::new(true),
            providers: configured,
            store,
            validation,
        });

        let controller = Self { inner };
        controller.hydrate();
        controller
    }

    /// Controller wired to the default on-disk store and live validators.
    #[must_use]
    pub fn with_defaults(providers: impl IntoIterator<Item = ProviderId>) -> Self {
        Self::new(providers, KeyStore::new(), Arc::new(ValidationClient::new()))
    }

    fn hydrate(&self) {
        for &provider in &self.inner.providers {
            if let Some(stored) = self.inner.store.get(provider) {
                let mut records = self.lock_records();
                if let Some(record) = records.get_mut(&provider) {
                    record.draft_value = stored;
                    record.is_validated = true;
                }
                debug!(provider = %provider, "hydrated stored key");
            }
        }
        self.inner.is_loading.store(false, Ordering::SeqCst);
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, HashMap<ProviderId, KeyRecord>> {
        self.inner.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(tokens: &HashMap<ProviderId, AtomicU64>, provider: ProviderId) {
        if let Some(token) = tokens.get(&provider) {
            token.fetch_add(1, Ordering::SeqCst);
        }
    }

    // ── Inbound operations ─────────────────────────────────────────────────

    /// Replace the draft text for `provider`.
    ///
    /// Synchronous, no I/O. Clears every verification flag and message:
    /// status describes the last-validated text, never a stale one. Also
    /// supersedes any in-flight probe or pending flash reset.
    pub fn handle_key_change(&self, provider: ProviderId, value: impl Into<String>) {
        Self::bump(&self.inner.validate_tokens, provider);
        Self::bump(&self.inner.flash_tokens, provider);

        let mut records = self.lock_records();
        let Some(record) = records.get_mut(&provider) else {
            debug!(provider = %provider, "ignoring edit for unconfigured provider");
            return;
        };
        record.draft_value = value.into();
        record.reset_verification();
    }

    /// Persist `value` for `provider` and flash the "saved" confirmation.
    ///
    /// No-op for blank values. The flash reset is a fire-and-forget task
    /// that only ever lowers `is_saved`; a newer save restarts the display
    /// window by superseding the pending reset. Must run inside a Tokio
    /// runtime.
    pub fn handle_save(&self, provider: ProviderId, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        let Some(flash) = self.inner.flash_tokens.get(&provider) else {
            debug!(provider = %provider, "ignoring save for unconfigured provider");
            return;
        };

        self.inner.store.set(provider, value);
        {
            let mut records = self.lock_records();
            if let Some(record) = records.get_mut(&provider) {
                record.draft_value = value.to_string();
                record.is_saved = true;
            }
        }
        debug!(provider = %provider, "key saved");

        let token = flash.fetch_add(1, Ordering::SeqCst) + 1;
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SAVED_FLASH).await;
            controller.end_saved_flash(provider, token);
        });
    }

    fn end_saved_flash(&self, provider: ProviderId, token: u64) {
        let Some(flash) = self.inner.flash_tokens.get(&provider) else {
            return;
        };
        if flash.load(Ordering::SeqCst) != token {
            debug!(provider = %provider, "saved flash superseded");
            return;
        }
        let mut records = self.lock_records();
        if let Some(record) = records.get_mut(&provider) {
            record.is_saved = false;
        }
    }

    /// Remove `provider`'s key from the store and reset its record.
    /// Idempotent.
    pub fn handle_clear(&self, provider: ProviderId) {
        Self::bump(&self.inner.validate_tokens, provider);
        Self::bump(&self.inner.flash_tokens, provider);

        self.inner.store.remove(provider);
        let mut records = self.lock_records();
        if let Some(record) = records.get_mut(&provider) {
            *record = KeyRecord::default();
            debug!(provider = %provider, "key cleared");
        }
    }

    /// [`Self::handle_clear`] for every configured provider.
    pub fn handle_clear_all(&self) {
        for &provider in &self.inner.providers {
            self.handle_clear(provider);
        }
    }

    /// Probe `api_key` against `provider` and fold the outcome into state.
    ///
    /// Valid keys and cross-origin-unverifiable keys are persisted; hard
    /// errors leave the store untouched and surface a message on the
    /// record. A completion whose request was superseded by a newer edit,
    /// clear, or re-validate is discarded wholesale.
    pub async fn handle_validate(&self, provider: ProviderId, api_key: &str) -> Outcome {
        let Some(token_slot) = self.inner.validate_tokens.get(&provider) else {
            debug!(provider = %provider, "ignoring validate for unconfigured provider");
            return Outcome::Invalid(format!(
                "{} is not configured in this dialog.",
                provider.display_name()
            ));
        };

        if api_key.trim().is_empty() {
            let mut records = self.lock_records();
            if let Some(record) = records.get_mut(&provider) {
                record.last_message = Some(EMPTY_KEY_MESSAGE.to_string());
            }
            return Outcome::Invalid(EMPTY_KEY_MESSAGE.to_string());
        }

        let token = token_slot.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut records = self.lock_records();
            if let Some(record) = records.get_mut(&provider) {
                record.is_validating = true;
                record.is_validated = false;
                record.is_unverified_cross_origin = false;
                record.last_message = None;
            }
        }
        debug!(provider = %provider, "validation started");

        let outcome = self.inner.validation.validate(provider, api_key).await;

        if token_slot.load(Ordering::SeqCst) != token {
            debug!(provider = %provider, "discarding stale validation completion");
            return outcome;
        }

        match &outcome {
            Outcome::Valid => {
                self.handle_save(provider, api_key);
                let mut records = self.lock_records();
                if let Some(record) = records.get_mut(&provider) {
                    record.is_validated = true;
                    record.is_validating = false;
                }
            },
            Outcome::UnverifiableCrossOrigin(message) => {
                // The key is persisted even though the provider could not
                // confirm it.
                self.handle_save(provider, api_key);
                let mut records = self.lock_records();
                if let Some(record) = records.get_mut(&provider) {
                    record.is_unverified_cross_origin = true;
                    record.last_message = Some(message.clone());
                    record.is_validating = false;
                }
            },
            Outcome::Invalid(message) | Outcome::NetworkError(message) => {
                let mut records = self.lock_records();
                if let Some(record) = records.get_mut(&provider) {
                    record.last_message = Some(message.clone());
                    record.is_validating = false;
                }
            },
        }
        outcome
    }

    /// Settle every provider with a non-empty draft, then close.
    ///
    /// Already-verified providers are re-saved; unverified ones without an
    /// existing error are validated concurrently, and all of that settles
    /// (join barrier) before the hard-error check. `on_close` runs, and
    /// `true` is returned, only when no provider is left with a hard
    /// error; otherwise the dialog stays open with each error surfaced on
    /// its own row. Providers that fail never roll back the ones that
    /// succeeded.
    pub async fn handle_save_all_and_close<F>(&self, on_close: F) -> bool
    where
        F: FnOnce(),
    {
        let mut resave = Vec::new();
        let mut needs_validation = Vec::new();
        {
            let records = self.lock_records();
            for &provider in &self.inner.providers {
                let Some(record) = records.get(&provider) else {
                    continue;
                };
                if !record.has_key() {
                    continue;
                }
                if record.is_validated || record.is_unverified_cross_origin {
                    resave.push((provider, record.draft_value.clone()));
                } else if record.last_message.is_none() {
                    needs_validation.push((provider, record.draft_value.clone()));
                }
                // Records already carrying a hard error fall through to the
                // check below and keep the dialog open.
            }
        }

        for (provider, value) in &resave {
            self.handle_save(*provider, value);
        }

        join_all(
            needs_validation
                .iter()
                .map(|(provider, value)| self.handle_validate(*provider, value)),
        )
        .await;

        let blocked: Vec<ProviderId> = {
            let records = self.lock_records();
            self.inner
                .providers
                .iter()
                .copied()
                .filter(|provider| records.get(provider).is_some_and(KeyRecord::has_hard_error))
                .collect()
        };

        if blocked.is_empty() {
            info!(
                validated = needs_validation.len(),
                resaved = resave.len(),
                "all provider keys settled, closing"
            );
            on_close();
            true
        } else {
            info!(providers = ?blocked, "bulk save blocked by hard errors");
            false
        }
    }

    // ── Outbound state ─────────────────────────────────────────────────────

    /// True iff some provider holds a non-empty persisted key that the
    /// provider's API actually confirmed. Cross-origin-unverified keys do
    /// not count: the user never saw a confirmation for them.
    #[must_use]
    pub fn has_any_key(&self) -> bool {
        let records = self.lock_records();
        self.inner.providers.iter().any(|provider| {
            records.get(provider).is_some_and(|r| r.is_validated)
                && self
                    .inner
                    .store
                    .get(*provider)
                    .is_some_and(|v| !v.trim().is_empty())
        })
    }

    /// Persisted keys accepted for use (validated or saved-but-unverified),
    /// for hosts to pass on to their API clients.
    #[must_use]
    pub fn validated_keys(&self) -> HashMap<ProviderId, String> {
        let records = self.lock_records();
        self.inner
            .providers
            .iter()
            .filter_map(|&provider| {
                let record = records.get(&provider)?;
                if !(record.is_validated || record.is_unverified_cross_origin) {
                    return None;
                }
                let value = self.inner.store.get(provider)?;
                (!value.trim().is_empty()).then_some((provider, value))
            })
            .collect()
    }

    /// Snapshot of every configured provider's record.
    #[must_use]
    pub fn records(&self) -> HashMap<ProviderId, KeyRecord> {
        self.lock_records().clone()
    }

    /// Snapshot of one provider's record, if configured.
    #[must_use]
    pub fn record(&self, provider: ProviderId) -> Option<KeyRecord> {
        self.lock_records().get(&provider).cloned()
    }

    /// The configured providers, in display order.
    #[must_use]
    pub fn providers(&self) -> &[ProviderId] {
        &self.inner.providers
    }

    /// True only during initial hydration from the store.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.is_loading.load(Ordering::SeqCst)
    }
}
