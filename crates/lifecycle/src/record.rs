//! Pure per-provider key state. No I/O.

/// Everything the presentation layer needs to render one provider row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRecord {
    /// Current input text; may differ from what is persisted.
    pub draft_value: String,
    /// Transient flag shown briefly after a successful save.
    pub is_saved: bool,
    /// A validation probe is in flight for this provider.
    pub is_validating: bool,
    /// The provider's API confirmed the key.
    pub is_validated: bool,
    /// The key was persisted without confirmation because the provider's
    /// API cannot be probed from a browser context.
    pub is_unverified_cross_origin: bool,
    /// Human-readable outcome of the most recent validation attempt.
    pub last_message: Option<String>,
}

impl KeyRecord {
    /// True when the draft holds a non-blank key.
    #[must_use]
    pub fn has_key(&self) -> bool {
        !self.draft_value.trim().is_empty()
    }

    /// A definitive rejection or network failure, as opposed to the
    /// informational cross-origin notice. Hard errors block the bulk close.
    #[must_use]
    pub fn has_hard_error(&self) -> bool {
        self.last_message.is_some() && !self.is_unverified_cross_origin
    }

    /// Drop everything the verification status says about the draft.
    ///
    /// Invariant: status always describes exactly the last-validated text,
    /// so any draft edit routes through here before anything else reads the
    /// record.
    pub(crate) fn reset_verification(&mut self) {
        self.is_saved = false;
        self.is_validating = false;
        self.is_validated = false;
        self.is_unverified_cross_origin = false;
        self.last_message = None;
    }
}
