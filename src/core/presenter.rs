/// The engine's outbound interface to whatever renders the story.
///
/// Every method has a no-op default so a presenter only implements what it
/// shows.
use crate::core::engine::ErrorKind;
use crate::core::reaction::Reaction;
use crate::core::resolver::{ActiveContent, ChoiceView};
use crate::schema::state::PlayerState;

pub trait Presenter {
    fn on_variant_resolved(&mut self, _content: &ActiveContent) {}
    fn on_choices_ready(&mut self, _choices: &[ChoiceView]) {}
    fn on_stats_changed(&mut self, _state: &PlayerState) {}
    fn on_error(&mut self, _kind: ErrorKind, _message: &str) {}
    fn on_ending_reached(&mut self, _ending_id: &str, _title: &str, _text: &str) {}
    fn on_reaction(&mut self, _reaction: &Reaction) {}
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}
