use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Chapter a new playthrough opens on.
pub const INITIAL_CHAPTER: &str = "chapter1";

/// Built-in stats and their starting values.
const INITIAL_STATS: &[(&str, i64)] = &[
    ("magic", 0),
    ("lira_trust", 0),
    ("kyle_trust", 0),
    ("elina_trust", 0),
    ("moral", 50),
    ("gold", 10),
    ("health", 100),
    ("willpower", 5),
    ("persuasion", 0),
    ("intimidation", 0),
    ("fate", 0),
    ("sanity", 10),
    ("church_hostility", 0),
    ("combat_skill", 0),
    ("insight", 0),
];

/// Allowed range for a numeric stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatRange {
    pub min: i64,
    pub max: Option<i64>,
}

impl StatRange {
    /// `health` is a percentage, `sanity` and `fate` are 0..=10 gauges,
    /// everything else only has a floor.
    pub fn for_stat(name: &str) -> StatRange {
        match name {
            "health" => StatRange {
                min: 0,
                max: Some(100),
            },
            "sanity" | "fate" => StatRange {
                min: 0,
                max: Some(10),
            },
            _ => StatRange { min: 0, max: None },
        }
    }

    pub fn clamp(&self, value: i64) -> i64 {
        let floored = value.max(self.min);
        match self.max {
            Some(max) => floored.min(max),
            None => floored,
        }
    }
}

/// The single mutable progress record of one playthrough.
///
/// Numeric stats live in a flat map so content can reference arbitrary
/// trust-style stats (`lira_trust`, `kyle_trust`, ...). Only stats that
/// already exist can be changed by effects; see [`PlayerState::adjust`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(rename = "currentChapter")]
    pub current_chapter: String,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(rename = "revealedChapters", default)]
    pub revealed_chapters: Vec<String>,
    #[serde(default)]
    pub endings_unlocked: Vec<String>,
    #[serde(default)]
    pub statuses: FxHashMap<String, String>,
    #[serde(flatten)]
    pub stats: FxHashMap<String, i64>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerState {
    /// Fresh state for a new playthrough.
    pub fn new() -> Self {
        Self {
            current_chapter: INITIAL_CHAPTER.to_string(),
            inventory: Vec::new(),
            revealed_chapters: Vec::new(),
            endings_unlocked: Vec::new(),
            statuses: FxHashMap::default(),
            stats: INITIAL_STATS
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }

    /// Fresh state with some stats overridden or added.
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a i64)>,
    {
        let mut state = Self::new();
        for (name, value) in overrides {
            state
                .stats
                .insert(name.clone(), StatRange::for_stat(name).clamp(*value));
        }
        state
    }

    /// Current value of a stat. Absent stats read as 0.
    pub fn stat(&self, name: &str) -> i64 {
        self.stats.get(name).copied().unwrap_or(0)
    }

    pub fn has_stat(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    /// Add `delta` to an existing stat, clamped to its range.
    ///
    /// Returns false (and changes nothing) when the stat does not exist.
    pub fn adjust(&mut self, name: &str, delta: i64) -> bool {
        match self.stats.get_mut(name) {
            Some(value) => {
                *value = StatRange::for_stat(name).clamp(value.saturating_add(delta));
                true
            }
            None => false,
        }
    }

    pub fn status(&self, key: &str) -> Option<&str> {
        self.statuses.get(key).map(String::as_str)
    }

    pub fn set_status(&mut self, key: &str, value: &str) {
        self.statuses.insert(key.to_string(), value.to_string());
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.inventory.iter().any(|i| i == item)
    }

    /// True when every listed item is held. An empty list is trivially held.
    pub fn has_all_items<S: AsRef<str>>(&self, items: &[S]) -> bool {
        items.iter().all(|item| self.has_item(item.as_ref()))
    }

    pub fn has_any_item<S: AsRef<str>>(&self, items: &[S]) -> bool {
        items.iter().any(|item| self.has_item(item.as_ref()))
    }

    /// Append items not already held, keeping first-seen order.
    pub fn add_items<S: AsRef<str>>(&mut self, items: &[S]) {
        for item in items {
            let item = item.as_ref();
            if !self.has_item(item) {
                self.inventory.push(item.to_string());
            }
        }
    }

    pub fn remove_items<S: AsRef<str>>(&mut self, items: &[S]) {
        self.inventory
            .retain(|held| !items.iter().any(|item| item.as_ref() == held));
    }

    /// Record a revealed chapter. Returns false if it was already revealed.
    pub fn reveal(&mut self, chapter_id: &str) -> bool {
        if self.is_revealed(chapter_id) {
            return false;
        }
        self.revealed_chapters.push(chapter_id.to_string());
        true
    }

    pub fn is_revealed(&self, chapter_id: &str) -> bool {
        self.revealed_chapters.iter().any(|c| c == chapter_id)
    }

    /// Record a reached ending. Returns false if it was already unlocked.
    pub fn unlock_ending(&mut self, ending_id: &str) -> bool {
        if self.endings_unlocked.iter().any(|e| e == ending_id) {
            return false;
        }
        self.endings_unlocked.push(ending_id.to_string());
        true
    }

    /// Discard all progress.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
