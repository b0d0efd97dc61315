//! Declarative tag overrides applied in a single streaming pass.
//!
//! Rules are resolved into one patch per entity before streaming. Precedence
//! is per key: a later rule overwrites an earlier rule's value for the same
//! key, while keys mentioned by only one rule survive regardless of order.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info};

use crate::{Diagnostics, EntityKey, EntityResult, Tags, Warning};

/// What a rule does to one tag key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    /// Set or overwrite the key with this value.
    Set(String),
    /// Remove the key if present.
    Remove,
}

impl TagAction {
    /// Interpret a raw rule value: the empty string means removal.
    ///
    /// # Examples
    /// ```
    /// use refit_core::TagAction;
    ///
    /// assert_eq!(TagAction::from_rule_value(""), TagAction::Remove);
    /// assert_eq!(TagAction::from_rule_value("no"), TagAction::Set("no".into()));
    /// ```
    #[must_use]
    pub fn from_rule_value(value: &str) -> Self {
        if value.is_empty() {
            Self::Remove
        } else {
            Self::Set(value.to_owned())
        }
    }
}

/// Per-key tag edits for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPatch {
    actions: BTreeMap<String, TagAction>,
}

impl TagPatch {
    /// Build a patch from raw `key -> value` pairs, treating `""` as removal.
    pub fn from_rule_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        Self {
            actions: values
                .into_iter()
                .map(|(key, value)| (key.into(), TagAction::from_rule_value(value.as_ref())))
                .collect(),
        }
    }

    /// Number of keys touched by the patch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the patch touches no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action for `key`, if the patch mentions it.
    #[must_use]
    pub fn action(&self, key: &str) -> Option<&TagAction> {
        self.actions.get(key)
    }

    /// Overlay `later` on top of this patch, key by key.
    pub fn overlay(&mut self, later: &Self) {
        for (key, action) in &later.actions {
            self.actions.insert(key.clone(), action.clone());
        }
    }

    /// Apply the patch to `tags`, returning whether anything changed.
    ///
    /// Re-setting an identical value or removing an absent key is a no-op,
    /// which makes repeated application idempotent.
    ///
    /// # Examples
    /// ```
    /// use refit_core::{TagPatch, Tags};
    ///
    /// let patch = TagPatch::from_rule_values([("highway", "motorway_link"), ("name", "")]);
    /// let mut tags = Tags::from([
    ///     ("highway".into(), "primary".into()),
    ///     ("name".into(), "Ramp".into()),
    /// ]);
    /// assert!(patch.apply(&mut tags));
    /// assert!(!patch.apply(&mut tags));
    /// assert_eq!(tags, Tags::from([("highway".into(), "motorway_link".into())]));
    /// ```
    pub fn apply(&self, tags: &mut Tags) -> bool {
        let mut changed = false;
        for (key, action) in &self.actions {
            match action {
                TagAction::Remove => changed |= tags.remove(key).is_some(),
                TagAction::Set(value) => {
                    if tags.get(key) != Some(value) {
                        tags.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
            }
        }
        changed
    }
}

/// A validated override rule: a set of targets and the patch to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRule {
    targets: Vec<EntityKey>,
    patch: TagPatch,
}

impl OverrideRule {
    /// Construct a rule from its targets and patch.
    #[must_use]
    pub const fn new(targets: Vec<EntityKey>, patch: TagPatch) -> Self {
        Self { targets, patch }
    }

    /// Entities the rule applies to.
    #[must_use]
    pub fn targets(&self) -> &[EntityKey] {
        &self.targets
    }

    /// Tag edits the rule performs.
    #[must_use]
    pub const fn patch(&self) -> &TagPatch {
        &self.patch
    }
}

/// Resolved patch per target entity.
///
/// # Examples
/// ```
/// use refit_core::{EntityKey, OverrideIndex, OverrideRule, TagAction, TagPatch};
///
/// let rules = vec![
///     OverrideRule::new(vec![EntityKey::way(42)], TagPatch::from_rule_values([("highway", "primary")])),
///     OverrideRule::new(vec![EntityKey::way(42)], TagPatch::from_rule_values([("name", "")])),
/// ];
/// let index = OverrideIndex::build(&rules);
/// let patch = index.patch_for(EntityKey::way(42)).expect("way 42 is targeted");
/// assert_eq!(patch.action("highway"), Some(&TagAction::Set("primary".into())));
/// assert_eq!(patch.action("name"), Some(&TagAction::Remove));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideIndex {
    patches: HashMap<EntityKey, TagPatch>,
}

impl OverrideIndex {
    /// Resolve `rules` in order into one patch per target.
    #[must_use]
    pub fn build(rules: &[OverrideRule]) -> Self {
        let mut patches: HashMap<EntityKey, TagPatch> = HashMap::new();
        for rule in rules {
            for target in &rule.targets {
                patches.entry(*target).or_default().overlay(&rule.patch);
            }
        }
        debug!(
            "resolved {} override rules into {} entity patches",
            rules.len(),
            patches.len()
        );
        Self { patches }
    }

    /// Patch for `key`, if any rule targets it.
    #[must_use]
    pub fn patch_for(&self, key: EntityKey) -> Option<&TagPatch> {
        self.patches.get(&key)
    }

    /// Number of targeted entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether no entity is targeted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Stream adapter rewriting tags of targeted entities.
///
/// Targets never seen by the time the upstream ends are reported as
/// [`Warning::UnmatchedRule`], sorted by identity.
#[derive(Debug)]
pub struct ApplyOverrides<I> {
    upstream: I,
    index: OverrideIndex,
    matched: HashSet<EntityKey>,
    rewritten: u64,
    diagnostics: Diagnostics,
    finished: bool,
}

impl<I> ApplyOverrides<I>
where
    I: Iterator<Item = EntityResult>,
{
    /// Wrap `upstream` with the resolved `index`.
    pub fn new(upstream: I, index: OverrideIndex, diagnostics: Diagnostics) -> Self {
        Self {
            upstream,
            index,
            matched: HashSet::new(),
            rewritten: 0,
            diagnostics,
            finished: false,
        }
    }

    fn report_unmatched(&self) {
        let mut unmatched: Vec<EntityKey> = self
            .index
            .patches
            .keys()
            .filter(|key| !self.matched.contains(key))
            .copied()
            .collect();
        unmatched.sort_unstable();
        for key in unmatched {
            self.diagnostics.warn(Warning::UnmatchedRule { key });
        }
        info!(
            "Tag overrides matched {} of {} targets; {} entities rewritten",
            self.matched.len(),
            self.index.len(),
            self.rewritten
        );
    }
}

impl<I> Iterator for ApplyOverrides<I>
where
    I: Iterator<Item = EntityResult>,
{
    type Item = EntityResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.upstream.next() {
            Some(Ok(mut entity)) => {
                let key = entity.key();
                if let Some(patch) = self.index.patches.get(&key) {
                    self.matched.insert(key);
                    if patch.apply(entity.tags_mut()) {
                        self.rewritten += 1;
                    }
                }
                Some(Ok(entity))
            }
            Some(Err(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            None => {
                self.finished = true;
                self.report_unmatched();
                None
            }
        }
    }
}
