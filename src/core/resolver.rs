/// Chapter/variant resolution, choice visibility and choice outcomes.
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::core::effect::EffectWarning;
use crate::schema::chapter::{is_ending_id, Chapter, Choice, REVEAL_SENTINEL};
use crate::schema::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("choice '{0}' has no successor")]
    NoSuccessor(String),
    #[error("choice '{0}' reveals a chapter but names none")]
    RevealWithoutTarget(String),
}

/// The content body shown for one chapter load: the base chapter with the
/// matching variant's fields laid over it.
#[derive(Debug, Clone)]
pub struct ActiveContent {
    pub chapter_id: String,
    /// Index of the matching variant, `None` for the base content.
    pub variant: Option<usize>,
    pub title: Option<String>,
    pub text: String,
    pub background: String,
    pub choices: Vec<Choice>,
    pub default_next: Option<String>,
}

/// Pick the first variant whose trigger matches, else the base content.
pub fn resolve_variant(chapter: &Chapter, state: &PlayerState) -> ActiveContent {
    let mut active = ActiveContent {
        chapter_id: chapter.id.clone(),
        variant: None,
        title: chapter.title.clone(),
        text: chapter.text.clone(),
        background: chapter.background.clone(),
        choices: chapter.choices.clone(),
        default_next: chapter.default_next.clone(),
    };

    let Some((index, variant)) = chapter
        .variants
        .iter()
        .enumerate()
        .find(|(_, v)| v.trigger.matches(state))
    else {
        return active;
    };

    active.variant = Some(index);
    if let Some(title) = &variant.title {
        active.title = Some(title.clone());
    }
    if let Some(text) = &variant.text {
        active.text = text.clone();
    }
    if let Some(background) = &variant.background {
        active.background = background.clone();
    }
    if let Some(choices) = &variant.choices {
        active.choices = choices.clone();
    }
    if let Some(next) = &variant.default_next {
        active.default_next = Some(next.clone());
    }
    active
}

/// Where a presented choice comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChoiceSlot {
    /// Index into [`ActiveContent::choices`].
    Authored { index: usize },
    /// Synthetic fallback shown when nothing else is visible.
    Continue { next: String },
}

/// A choice as the presentation layer should show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceView {
    pub slot: ChoiceSlot,
    pub text: String,
    /// Disabled choices are shown but cannot be taken.
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// Choices to present, in authored order.
///
/// A hidden choice whose requirement fails is left out; a plain choice
/// whose requirement fails is kept but disabled. Structurally invalid
/// choices are dropped. When nothing remains, a single "continue" choice
/// leads to `default_next`, else to `fallback_chapter`.
pub fn visible_choices(
    content: &ActiveContent,
    state: &PlayerState,
    continue_label: &str,
    fallback_chapter: &str,
) -> Vec<ChoiceView> {
    let mut views: Vec<ChoiceView> = content
        .choices
        .iter()
        .enumerate()
        .filter_map(|(index, choice)| {
            if !choice.is_well_formed() {
                log::warn!(
                    "chapter '{}': dropping invalid choice #{} ('{}')",
                    content.chapter_id,
                    index,
                    choice.text
                );
                return None;
            }
            let enabled = choice.requires.evaluate(state);
            if choice.hidden && !enabled {
                return None;
            }
            Some(ChoiceView {
                slot: ChoiceSlot::Authored { index },
                text: choice.text.clone(),
                enabled,
                timeout: choice.timeout.and_then(timeout_duration),
            })
        })
        .collect();

    if views.is_empty() {
        views.push(ChoiceView {
            slot: ChoiceSlot::Continue {
                next: content
                    .default_next
                    .clone()
                    .unwrap_or_else(|| fallback_chapter.to_string()),
            },
            text: continue_label.to_string(),
            enabled: true,
            timeout: None,
        });
    }

    views
}

/// Negative, non-finite and out-of-range timeouts are ignored.
fn timeout_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

/// The next thing to load after a choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Successor {
    Chapter(String),
    /// A revealed chapter, already recorded in `revealedChapters`.
    Reveal(String),
    Ending(String),
}

impl Successor {
    pub fn id(&self) -> &str {
        match self {
            Successor::Chapter(id) | Successor::Reveal(id) | Successor::Ending(id) => id,
        }
    }

    /// Route an id by the ending prefix convention.
    pub fn for_id(id: &str) -> Successor {
        if is_ending_id(id) {
            Successor::Ending(id.to_string())
        } else {
            Successor::Chapter(id.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceResolution {
    pub successor: Successor,
    /// Effects that were skipped.
    pub warnings: Vec<EffectWarning>,
}

/// Apply a choice and work out its successor.
///
/// The successor is checked first, so a choice with nowhere to go changes
/// nothing. Then the effects apply, then a reveal is recorded.
pub fn resolve_choice(
    choice: &Choice,
    state: &mut PlayerState,
) -> Result<ChoiceResolution, ResolveError> {
    let successor = match (choice.next.as_deref(), choice.reveal.as_deref()) {
        (Some(REVEAL_SENTINEL), Some(target)) => Successor::Reveal(target.to_string()),
        (Some(REVEAL_SENTINEL), None) => {
            return Err(ResolveError::RevealWithoutTarget(choice.text.clone()))
        }
        (Some(next), _) => Successor::for_id(next),
        // Older content puts the revealed chapter in `reveal` alone.
        (None, Some(target)) => Successor::Reveal(target.to_string()),
        (None, None) => return Err(ResolveError::NoSuccessor(choice.text.clone())),
    };

    let warnings = choice.effects.apply(state);

    if let Successor::Reveal(id) = &successor {
        state.reveal(id);
    }

    Ok(ChoiceResolution {
        successor,
        warnings,
    })
}
