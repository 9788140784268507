/// The story session: chapter loading, choice resolution, timers and
/// spellcasting over one explicitly owned `PlayerState`.
///
/// Loading is two-phase so asynchronous hosts can fetch documents
/// themselves: `begin_load` hands out a [`ContentRequest`], the host answers
/// with `complete_load` or `fail_load`. With a configured
/// [`ContentSource`], `start`/`load_chapter`/`choose`/`tick` do both halves.
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::content::{ContentKind, ContentRequest, ContentSource, DirectorySource, FetchError};
use crate::core::magic::{self, MagicError, SpellOption};
use crate::core::presenter::{NullPresenter, Presenter};
use crate::core::reaction::react;
use crate::core::resolver::{
    resolve_choice, resolve_variant, visible_choices, ActiveContent, ChoiceSlot, ChoiceView,
    ResolveError,
};
use crate::core::timers::ChoiceTimers;
use crate::schema::chapter::{Chapter, DocumentError, Ending};
use crate::schema::state::PlayerState;

/// Error categories reported to the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ContentFetch,
    MalformedContent,
    InvalidChoice,
    UnknownSpell,
    UnknownElement,
    LoadInProgress,
    Usage,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to fetch content: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to load '{id}': {message}")]
    LoadFailed { id: String, message: String },
    #[error("'{id}': {source}")]
    Document {
        id: String,
        #[source]
        source: DocumentError,
    },
    #[error("invalid choice: {0}")]
    InvalidChoice(#[from] ResolveError),
    #[error(transparent)]
    Magic(#[from] MagicError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot load '{requested}' while '{pending}' is loading")]
    LoadInProgress { requested: String, pending: String },
    #[error("cannot {action} while '{pending}' is loading")]
    Busy { action: &'static str, pending: String },
    #[error("no load is in progress")]
    NotLoading,
    #[error("no choices are on offer")]
    NoChoices,
    #[error("no choice at position {0}")]
    ChoiceOutOfRange(usize),
    #[error("choice {0} is disabled")]
    ChoiceDisabled(usize),
    #[error("no chapter is active")]
    NoActiveChapter,
    #[error("no content source configured")]
    NoSource,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Fetch(_) | EngineError::LoadFailed { .. } => ErrorKind::ContentFetch,
            EngineError::Document {
                source: DocumentError::Parse(_),
                ..
            } => ErrorKind::ContentFetch,
            EngineError::Document { .. } => ErrorKind::MalformedContent,
            EngineError::InvalidChoice(_) => ErrorKind::InvalidChoice,
            EngineError::Magic(MagicError::UnknownSpell(_)) => ErrorKind::UnknownSpell,
            EngineError::Magic(MagicError::UnknownElement { .. }) => ErrorKind::UnknownElement,
            EngineError::LoadInProgress { .. } | EngineError::Busy { .. } => {
                ErrorKind::LoadInProgress
            }
            EngineError::Config(_)
            | EngineError::NotLoading
            | EngineError::NoChoices
            | EngineError::ChoiceOutOfRange(_)
            | EngineError::ChoiceDisabled(_)
            | EngineError::NoActiveChapter
            | EngineError::NoSource => ErrorKind::Usage,
        }
    }
}

/// Where the session is in a chapter's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterPhase {
    /// Nothing presented yet (or back at the main menu).
    Idle,
    Loading,
    ChoicesVisible,
    Ended,
}

/// The top-level story engine. Built via `StoryEngine::builder()`.
pub struct StoryEngine<P: Presenter = NullPresenter> {
    config: EngineConfig,
    source: Option<Box<dyn ContentSource>>,
    presenter: P,
    state: PlayerState,
    phase: ChapterPhase,
    pending: Option<ContentRequest>,
    chapter: Option<Chapter>,
    active: Option<ActiveContent>,
    ending: Option<Ending>,
    choices: Vec<ChoiceView>,
    timers: ChoiceTimers,
    /// State from before the choice whose successor is loading.
    rollback: Option<PlayerState>,
}

/// Builder for constructing a `StoryEngine`.
pub struct StoryEngineBuilder<P: Presenter> {
    config: Option<EngineConfig>,
    config_path: Option<String>,
    source: Option<Box<dyn ContentSource>>,
    presenter: P,
    /// Directly provided state (for testing mid-story situations).
    state: Option<PlayerState>,
}

impl StoryEngine<NullPresenter> {
    pub fn builder() -> StoryEngineBuilder<NullPresenter> {
        StoryEngineBuilder {
            config: None,
            config_path: None,
            source: None,
            presenter: NullPresenter,
            state: None,
        }
    }
}

impl<P: Presenter> StoryEngine<P> {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn phase(&self) -> ChapterPhase {
        self.phase
    }

    /// The load the engine is waiting on, if any.
    pub fn pending_request(&self) -> Option<&ContentRequest> {
        self.pending.as_ref()
    }

    /// The chapter currently presented.
    pub fn chapter(&self) -> Option<&Chapter> {
        self.chapter.as_ref()
    }

    pub fn active_content(&self) -> Option<&ActiveContent> {
        self.active.as_ref()
    }

    /// The ending reached, once the story is over.
    pub fn ending(&self) -> Option<&Ending> {
        self.ending.as_ref()
    }

    pub fn choices(&self) -> &[ChoiceView] {
        &self.choices
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Start loading `id`. Rejected while another load is pending.
    pub fn begin_load(&mut self, id: &str) -> Result<ContentRequest, EngineError> {
        if let Some(pending) = &self.pending {
            let err = EngineError::LoadInProgress {
                requested: id.to_string(),
                pending: pending.id.clone(),
            };
            return Err(self.report(err));
        }

        self.cancel_pending_timers();
        let request = ContentRequest::new(id);
        log::debug!("loading {} '{}'", request.kind, request.id);
        self.pending = Some(request.clone());
        self.phase = ChapterPhase::Loading;
        Ok(request)
    }

    /// Finish the pending load with the fetched document.
    ///
    /// A document that fails to parse leaves the state untouched and puts
    /// the previous screen back.
    pub fn complete_load(&mut self, raw: &str) -> Result<(), EngineError> {
        let Some(request) = self.pending.take() else {
            return Err(self.report(EngineError::NotLoading));
        };

        match request.kind {
            ContentKind::Chapter => match Chapter::from_json(raw) {
                Ok(chapter) => {
                    self.enter_chapter(&request.id, chapter);
                    Ok(())
                }
                Err(source) => Err(self.abort_load(EngineError::Document {
                    id: request.id,
                    source,
                })),
            },
            ContentKind::Ending => match Ending::from_json(raw) {
                Ok(ending) => {
                    self.enter_ending(&request.id, ending);
                    Ok(())
                }
                Err(source) => Err(self.abort_load(EngineError::Document {
                    id: request.id,
                    source,
                })),
            },
        }
    }

    /// The host could not fetch the pending document.
    pub fn fail_load(&mut self, message: &str) -> Result<(), EngineError> {
        let Some(request) = self.pending.take() else {
            return Err(self.report(EngineError::NotLoading));
        };
        self.abort_load(EngineError::LoadFailed {
            id: request.id,
            message: message.to_string(),
        });
        Ok(())
    }

    /// Take the choice at `position` in [`choices`](Self::choices) and
    /// start loading its successor.
    pub fn select_choice(&mut self, position: usize) -> Result<ContentRequest, EngineError> {
        self.ensure_not_loading("take a choice")?;
        if self.phase != ChapterPhase::ChoicesVisible {
            return Err(self.report(EngineError::NoChoices));
        }
        let Some(view) = self.choices.get(position) else {
            return Err(self.report(EngineError::ChoiceOutOfRange(position)));
        };
        if !view.enabled {
            return Err(self.report(EngineError::ChoiceDisabled(position)));
        }

        match view.slot.clone() {
            ChoiceSlot::Continue { next } => self.begin_load(&next),
            ChoiceSlot::Authored { index } => self.take_choice(index),
        }
    }

    /// Advance the timer clock. A timed-out choice that is still enabled
    /// resolves as if selected; the load it starts is returned.
    pub fn poll_timers(&mut self, dt: Duration) -> Result<Option<ContentRequest>, EngineError> {
        let due = self.timers.advance(dt);
        for index in due {
            let still_enabled = self
                .active
                .as_ref()
                .and_then(|active| active.choices.get(index))
                .is_some_and(|choice| choice.requires.evaluate(&self.state));
            if !still_enabled {
                log::debug!("timer for choice #{} expired on a disabled choice", index);
                continue;
            }
            log::debug!("choice #{} timed out", index);
            return self.take_choice(index).map(Some);
        }
        Ok(None)
    }

    /// Cancel every pending auto-resolve timer.
    pub fn cancel_pending_timers(&mut self) -> usize {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            log::debug!("cancelled {} pending timer(s)", cancelled);
        }
        cancelled
    }

    /// Load the configured start chapter.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let start = self.config.start_chapter.clone();
        self.load_chapter(&start)
    }

    /// Load `id` through the configured content source.
    pub fn load_chapter(&mut self, id: &str) -> Result<(), EngineError> {
        self.require_source()?;
        let request = self.begin_load(id)?;
        self.fetch_and_complete(&request)
    }

    /// `select_choice` followed by loading the successor from the source.
    pub fn choose(&mut self, position: usize) -> Result<(), EngineError> {
        self.require_source()?;
        let request = self.select_choice(position)?;
        self.fetch_and_complete(&request)
    }

    /// `poll_timers` followed by loading any successor from the source.
    /// Returns true when a timer fired.
    pub fn tick(&mut self, dt: Duration) -> Result<bool, EngineError> {
        self.require_source()?;
        match self.poll_timers(dt)? {
            Some(request) => {
                self.fetch_and_complete(&request)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cast a spell of the active chapter. Returns whether it succeeded;
    /// unknown spells and elements are reported to the presenter.
    pub fn cast_spell(&mut self, name: &str) -> bool {
        if self.ensure_not_loading("cast a spell").is_err() {
            return false;
        }
        let Some(chapter) = self.chapter.as_ref() else {
            self.report(EngineError::NoActiveChapter);
            return false;
        };

        match magic::cast_spell(name, chapter, &mut self.state, &self.config) {
            Ok(outcome) if outcome.succeeded => {
                log::debug!("cast '{}' with power {:.2}", name, outcome.power);
                self.presenter.on_stats_changed(&self.state);
                self.publish_choices(false);
                true
            }
            Ok(_) => false,
            Err(e) => {
                self.report(e.into());
                false
            }
        }
    }

    /// Spells of the active chapter with their availability.
    pub fn available_spells(&self) -> Vec<SpellOption> {
        match &self.chapter {
            Some(chapter) => magic::available_spells(chapter, &self.state),
            None => Vec::new(),
        }
    }

    /// Discard the playthrough and return to the main menu.
    pub fn reset(&mut self) {
        self.cancel_pending_timers();
        self.state = self.config.initial_state();
        self.phase = ChapterPhase::Idle;
        self.pending = None;
        self.chapter = None;
        self.active = None;
        self.ending = None;
        self.choices.clear();
        self.rollback = None;
        log::debug!("session reset");
        self.presenter.on_stats_changed(&self.state);
    }

    fn take_choice(&mut self, index: usize) -> Result<ContentRequest, EngineError> {
        let (Some(chapter), Some(active)) = (self.chapter.as_ref(), self.active.as_ref()) else {
            return Err(self.report(EngineError::NoActiveChapter));
        };
        let Some(choice) = active.choices.get(index).cloned() else {
            return Err(self.report(EngineError::ChoiceOutOfRange(index)));
        };

        let snapshot = self.state.clone();
        let resolution = match resolve_choice(&choice, &mut self.state) {
            Ok(resolution) => resolution,
            Err(e) => {
                self.state = snapshot;
                return Err(self.report(e.into()));
            }
        };
        let (reactions, reaction_warnings) = react(chapter, &choice, &mut self.state);
        self.cancel_pending_timers();

        for warning in resolution.warnings.iter().chain(&reaction_warnings) {
            log::warn!("skipped effect: {}", warning);
            self.presenter
                .on_error(ErrorKind::InvalidChoice, &warning.to_string());
        }
        for reaction in &reactions {
            self.presenter.on_reaction(reaction);
        }
        self.presenter.on_stats_changed(&self.state);

        match self.begin_load(resolution.successor.id()) {
            Ok(request) => {
                self.rollback = Some(snapshot);
                Ok(request)
            }
            Err(e) => {
                self.state = snapshot;
                self.presenter.on_stats_changed(&self.state);
                Err(e)
            }
        }
    }

    fn enter_chapter(&mut self, id: &str, chapter: Chapter) {
        if chapter.id != id {
            log::warn!("requested chapter '{}' but document says '{}'", id, chapter.id);
        }
        let active = resolve_variant(&chapter, &self.state);
        match active.variant {
            Some(index) => log::debug!("chapter '{}' resolved to variant #{}", id, index),
            None => log::debug!("chapter '{}' resolved to base content", id),
        }

        for (index, choice) in active.choices.iter().enumerate() {
            if !choice.is_well_formed() {
                self.presenter.on_error(
                    ErrorKind::InvalidChoice,
                    &format!("chapter '{}': choice #{} is missing text or an outcome", id, index),
                );
            }
        }

        self.rollback = None;
        self.state.current_chapter = id.to_string();
        self.chapter = Some(chapter);
        self.active = Some(active);
        self.ending = None;
        self.present();
    }

    fn enter_ending(&mut self, id: &str, ending: Ending) {
        self.rollback = None;
        if self.state.unlock_ending(id) {
            log::debug!("ending '{}' unlocked", id);
        }
        self.state.current_chapter = id.to_string();
        self.chapter = None;
        self.active = None;
        self.choices.clear();
        self.phase = ChapterPhase::Ended;

        self.presenter.on_stats_changed(&self.state);
        self.presenter
            .on_ending_reached(id, &ending.title, &ending.text);
        self.ending = Some(ending);
    }

    /// Report a failed load and put the previous screen back. A choice
    /// whose successor failed to load is undone, so it can be taken again.
    fn abort_load(&mut self, err: EngineError) -> EngineError {
        let err = self.report(err);
        if let Some(snapshot) = self.rollback.take() {
            log::debug!("undoing the choice that led to the failed load");
            self.state = snapshot;
        }
        if self.active.is_some() {
            log::debug!("returning to chapter '{}'", self.state.current_chapter);
            self.present();
        } else if self.ending.is_some() {
            self.phase = ChapterPhase::Ended;
        } else {
            self.phase = ChapterPhase::Idle;
        }
        err
    }

    fn present(&mut self) {
        if let Some(active) = &self.active {
            self.presenter.on_variant_resolved(active);
        }
        self.publish_choices(true);
        self.presenter.on_stats_changed(&self.state);
    }

    /// Recompute the visible choices and hand them to the presenter.
    fn publish_choices(&mut self, arm_timers: bool) {
        let Some(active) = &self.active else {
            return;
        };
        self.choices = visible_choices(
            active,
            &self.state,
            &self.config.continue_label,
            &self.config.fallback_chapter,
        );
        if arm_timers {
            for view in &self.choices {
                if let (ChoiceSlot::Authored { index }, Some(after)) = (&view.slot, view.timeout) {
                    self.timers.arm(*index, after);
                }
            }
        }
        if self.pending.is_none() {
            self.phase = ChapterPhase::ChoicesVisible;
        }
        self.presenter.on_choices_ready(&self.choices);
    }

    fn fetch_and_complete(&mut self, request: &ContentRequest) -> Result<(), EngineError> {
        let fetched = match &self.source {
            Some(source) => source.fetch(&request.id),
            None => return Err(self.report(EngineError::NoSource)),
        };
        match fetched {
            Ok(raw) => self.complete_load(&raw),
            Err(e) => {
                self.pending = None;
                Err(self.abort_load(e.into()))
            }
        }
    }

    fn ensure_not_loading(&mut self, action: &'static str) -> Result<(), EngineError> {
        match &self.pending {
            Some(pending) => {
                let err = EngineError::Busy {
                    action,
                    pending: pending.id.clone(),
                };
                Err(self.report(err))
            }
            None => Ok(()),
        }
    }

    fn require_source(&mut self) -> Result<(), EngineError> {
        if self.source.is_none() {
            return Err(self.report(EngineError::NoSource));
        }
        Ok(())
    }

    fn report(&mut self, err: EngineError) -> EngineError {
        log::warn!("{}", err);
        self.presenter.on_error(err.kind(), &err.to_string());
        err
    }
}

impl<P: Presenter> StoryEngineBuilder<P> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from a RON file at build time.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    pub fn source(mut self, source: impl ContentSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Read documents from `<dir>/chapters` and `<dir>/endings`.
    pub fn content_dir(self, dir: &str) -> Self {
        self.source(DirectorySource::new(dir))
    }

    pub fn presenter<Q: Presenter>(self, presenter: Q) -> StoryEngineBuilder<Q> {
        StoryEngineBuilder {
            config: self.config,
            config_path: self.config_path,
            source: self.source,
            presenter,
            state: self.state,
        }
    }

    /// Provide a player state directly (for testing without playing up to it).
    pub fn with_state(mut self, state: PlayerState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> Result<StoryEngine<P>, EngineError> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => EngineConfig::load_from_ron(Path::new(&path))?,
            (None, None) => EngineConfig::default(),
        };
        let state = self.state.unwrap_or_else(|| config.initial_state());

        Ok(StoryEngine {
            config,
            source: self.source,
            presenter: self.presenter,
            state,
            phase: ChapterPhase::Idle,
            pending: None,
            chapter: None,
            active: None,
            ending: None,
            choices: Vec::new(),
            timers: ChoiceTimers::new(),
            rollback: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::MemorySource;

    #[derive(Default)]
    struct Recorder {
        errors: Vec<ErrorKind>,
        choice_batches: usize,
        endings: Vec<String>,
    }

    impl Presenter for Recorder {
        fn on_choices_ready(&mut self, _choices: &[ChoiceView]) {
            self.choice_batches += 1;
        }
        fn on_error(&mut self, kind: ErrorKind, _message: &str) {
            self.errors.push(kind);
        }
        fn on_ending_reached(&mut self, ending_id: &str, _title: &str, _text: &str) {
            self.endings.push(ending_id.to_string());
        }
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with(
                "chapter1",
                r#"{"id": "chapter1", "text": "Start.", "background": "a.webp",
                    "choices": [
                        {"text": "Wait", "next": "chapter2", "timeout": 5, "effects": {"gold": 1}},
                        {"text": "Flee", "next": "ending_run"},
                        {"text": "Broken", "next": "chapter404", "effects": {"gold": 5}}
                    ]}"#,
            )
            .with(
                "chapter2",
                r#"{"id": "chapter2", "text": "Later.", "background": "b.webp"}"#,
            )
            .with(
                "ending_run",
                r#"{"id": "ending_run", "title": "Run", "text": "You ran.", "background": "c.webp"}"#,
            )
    }

    fn engine() -> StoryEngine<Recorder> {
        StoryEngine::builder()
            .source(source())
            .presenter(Recorder::default())
            .build()
            .unwrap()
    }

    #[test]
    fn start_presents_choices() {
        let mut engine = engine();
        assert_eq!(engine.phase(), ChapterPhase::Idle);
        engine.start().unwrap();
        assert_eq!(engine.phase(), ChapterPhase::ChoicesVisible);
        assert_eq!(engine.choices().len(), 3);
        assert_eq!(engine.state().current_chapter, "chapter1");
    }

    #[test]
    fn reentrant_load_rejected() {
        let mut engine = engine();
        engine.begin_load("chapter1").unwrap();
        let err = engine.begin_load("chapter2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadInProgress);
        assert_eq!(engine.presenter().errors, vec![ErrorKind::LoadInProgress]);
        assert_eq!(engine.pending_request().map(|r| r.id.as_str()), Some("chapter1"));
    }

    #[test]
    fn timer_fires_once() {
        let mut engine = engine();
        engine.start().unwrap();

        assert!(!engine.tick(Duration::from_secs(4)).unwrap());
        assert!(engine.tick(Duration::from_secs(1)).unwrap());
        assert_eq!(engine.state().current_chapter, "chapter2");
        assert_eq!(engine.state().stat("gold"), 11);
        assert!(!engine.tick(Duration::from_secs(30)).unwrap());
        assert_eq!(engine.state().stat("gold"), 11);
    }

    #[test]
    fn chapter_change_cancels_timer() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.tick(Duration::from_secs(3)).unwrap();
        engine.choose(1).unwrap();
        assert_eq!(engine.phase(), ChapterPhase::Ended);
        assert!(!engine.tick(Duration::from_secs(10)).unwrap());
        assert_eq!(engine.state().stat("gold"), 10);
    }

    #[test]
    fn ending_unlocks() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.choose(1).unwrap();
        assert_eq!(engine.state().endings_unlocked, vec!["ending_run"]);
        assert_eq!(engine.state().current_chapter, "ending_run");
        assert_eq!(engine.presenter().endings, vec!["ending_run"]);
        assert_eq!(engine.ending().map(|e| e.title.as_str()), Some("Run"));
    }

    #[test]
    fn failed_fetch_returns_to_previous_chapter() {
        let mut engine = engine();
        engine.start().unwrap();
        let batches = engine.presenter().choice_batches;

        let err = engine.choose(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentFetch);
        assert_eq!(engine.phase(), ChapterPhase::ChoicesVisible);
        assert_eq!(engine.state().current_chapter, "chapter1");
        assert_eq!(engine.presenter().choice_batches, batches + 1);
        assert_eq!(engine.state().stat("gold"), 10);
        // The timer was re-armed along with the re-presented choices.
        assert!(engine.tick(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn failed_choice_can_be_retried_without_stacking_effects() {
        let mut engine = engine();
        engine.start().unwrap();
        for _ in 0..3 {
            assert!(engine.choose(2).is_err());
        }
        assert_eq!(engine.state().stat("gold"), 10);

        // Same through the host-driven path.
        let request = engine.select_choice(2).unwrap();
        assert_eq!(request.id, "chapter404");
        assert_eq!(engine.state().stat("gold"), 15);
        engine.fail_load("HTTP 404").unwrap();
        assert_eq!(engine.state().stat("gold"), 10);
        assert_eq!(engine.phase(), ChapterPhase::ChoicesVisible);
    }

    #[test]
    fn nothing_touches_state_while_loading() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.begin_load("chapter2").unwrap();

        assert!(!engine.cast_spell("anything"));
        assert_eq!(engine.phase(), ChapterPhase::Loading);
        let err = engine.select_choice(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadInProgress);
        assert_eq!(engine.state().stat("gold"), 10);
        assert_eq!(
            engine.presenter().errors,
            vec![ErrorKind::LoadInProgress, ErrorKind::LoadInProgress]
        );

        engine.complete_load(r#"{"id": "chapter2", "text": "Later.", "background": "b.webp"}"#).unwrap();
        assert_eq!(engine.state().current_chapter, "chapter2");
    }

    #[test]
    fn failed_first_load_goes_idle() {
        let mut engine = engine();
        assert!(engine.load_chapter("chapter9").is_err());
        assert_eq!(engine.phase(), ChapterPhase::Idle);
        assert!(engine.pending_request().is_none());
    }

    #[test]
    fn malformed_document_keeps_state() {
        let mut engine = engine();
        engine.start().unwrap();
        let before = engine.state().clone();

        engine.begin_load("chapter2").unwrap();
        let err = engine.complete_load(r#"{"id": "chapter2", "background": "x"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedContent);
        assert_eq!(engine.state(), &before);

        engine.begin_load("chapter2").unwrap();
        let err = engine.complete_load("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContentFetch);
    }

    #[test]
    fn host_reported_failure() {
        let mut engine = engine();
        engine.begin_load("chapter1").unwrap();
        engine.fail_load("HTTP 404").unwrap();
        assert_eq!(engine.presenter().errors, vec![ErrorKind::ContentFetch]);
        assert_eq!(engine.phase(), ChapterPhase::Idle);
        assert!(matches!(engine.fail_load("again"), Err(EngineError::NotLoading)));
    }

    #[test]
    fn selection_errors_are_usage() {
        let mut engine = engine();
        assert_eq!(engine.select_choice(0).unwrap_err().kind(), ErrorKind::Usage);
        engine.start().unwrap();
        assert_eq!(engine.select_choice(7).unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn without_source_sync_calls_fail() {
        let mut engine = StoryEngine::builder().build().unwrap();
        assert!(matches!(engine.start(), Err(EngineError::NoSource)));
        assert_eq!(engine.phase(), ChapterPhase::Idle);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.choose(0).unwrap();
        engine.reset();
        assert_eq!(engine.phase(), ChapterPhase::Idle);
        assert_eq!(engine.state(), &PlayerState::new());
        assert!(engine.choices().is_empty());
    }
}
