//! WASM bindings for story-engine. The browser host fetches documents and
//! renders; the engine decides everything else.
//!
//! All data crosses the boundary as JSON strings. Presenter notifications
//! are buffered and drained with `take_events()` after each call.

use std::time::Duration;
use wasm_bindgen::prelude::*;

use story_engine::core::config::EngineConfig;
use story_engine::core::content::{content_path, ContentRequest};
use story_engine::core::engine::{ErrorKind, StoryEngine};
use story_engine::core::presenter::Presenter;
use story_engine::core::reaction::Reaction;
use story_engine::core::resolver::{ActiveContent, ChoiceView};
use story_engine::schema::state::PlayerState;

// ---------------------------------------------------------------------------
// Embedded default configuration
// ---------------------------------------------------------------------------
const DEFAULT_CONFIG: &str = include_str!("../../config/default.ron");

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct ChoiceInfo {
    position: usize,
    text: String,
    enabled: bool,
    /// Seconds.
    timeout: Option<f64>,
}

#[derive(serde::Serialize)]
struct RequestInfo {
    id: String,
    kind: String,
    path: String,
}

#[derive(serde::Serialize)]
struct SpellInfo {
    key: String,
    name: String,
    available: bool,
}

#[derive(serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum HostEvent {
    VariantResolved {
        chapter_id: String,
        variant: Option<usize>,
        title: Option<String>,
        text: String,
        background: String,
    },
    ChoicesReady {
        choices: Vec<ChoiceInfo>,
    },
    StatsChanged {
        state: PlayerState,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
    EndingReached {
        ending_id: String,
        title: String,
        text: String,
    },
    Reaction {
        reaction: Reaction,
    },
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------
fn choice_info(position: usize, view: &ChoiceView) -> ChoiceInfo {
    ChoiceInfo {
        position,
        text: view.text.clone(),
        enabled: view.enabled,
        timeout: view.timeout.map(|t| t.as_secs_f64()),
    }
}

fn request_json(request: &ContentRequest) -> Result<String, JsError> {
    to_json(&RequestInfo {
        id: request.id.clone(),
        kind: request.kind.to_string(),
        path: request.path.clone(),
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

// ---------------------------------------------------------------------------
// Buffering presenter
// ---------------------------------------------------------------------------
#[derive(Default)]
struct JsPresenter {
    events: Vec<HostEvent>,
}

impl Presenter for JsPresenter {
    fn on_variant_resolved(&mut self, content: &ActiveContent) {
        self.events.push(HostEvent::VariantResolved {
            chapter_id: content.chapter_id.clone(),
            variant: content.variant,
            title: content.title.clone(),
            text: content.text.clone(),
            background: content.background.clone(),
        });
    }

    fn on_choices_ready(&mut self, choices: &[ChoiceView]) {
        self.events.push(HostEvent::ChoicesReady {
            choices: choices
                .iter()
                .enumerate()
                .map(|(position, view)| choice_info(position, view))
                .collect(),
        });
    }

    fn on_stats_changed(&mut self, state: &PlayerState) {
        self.events.push(HostEvent::StatsChanged {
            state: state.clone(),
        });
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        self.events.push(HostEvent::Error {
            kind,
            message: message.to_string(),
        });
    }

    fn on_ending_reached(&mut self, ending_id: &str, title: &str, text: &str) {
        self.events.push(HostEvent::EndingReached {
            ending_id: ending_id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
        });
    }

    fn on_reaction(&mut self, reaction: &Reaction) {
        self.events.push(HostEvent::Reaction {
            reaction: reaction.clone(),
        });
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StorySession {
    engine: StoryEngine<JsPresenter>,
}

#[wasm_bindgen]
impl StorySession {
    /// Create a session. `config_ron` overrides the embedded default.
    #[wasm_bindgen(constructor)]
    pub fn new(config_ron: Option<String>) -> Result<StorySession, JsError> {
        let config = EngineConfig::parse_ron(config_ron.as_deref().unwrap_or(DEFAULT_CONFIG))
            .map_err(|e| JsError::new(&format!("Config error: {e}")))?;
        let engine = StoryEngine::builder()
            .config(config)
            .presenter(JsPresenter::default())
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;
        Ok(StorySession { engine })
    }

    /// Begin loading a chapter or ending; returns `{id, kind, path}`.
    pub fn begin_load(&mut self, id: &str) -> Result<String, JsError> {
        let request = self.engine.begin_load(id).map_err(js_err)?;
        request_json(&request)
    }

    /// Begin loading the configured start chapter.
    pub fn start(&mut self) -> Result<String, JsError> {
        let start = self.engine.config().start_chapter.clone();
        self.begin_load(&start)
    }

    pub fn complete_load(&mut self, document: &str) -> Result<(), JsError> {
        self.engine.complete_load(document).map_err(js_err)
    }

    pub fn fail_load(&mut self, message: &str) -> Result<(), JsError> {
        self.engine.fail_load(message).map_err(js_err)
    }

    /// Take a visible choice; returns the load to perform next.
    pub fn select_choice(&mut self, position: usize) -> Result<String, JsError> {
        let request = self.engine.select_choice(position).map_err(js_err)?;
        request_json(&request)
    }

    /// Advance timers by `elapsed_ms`; returns the load a timed-out choice
    /// started, or `null`.
    pub fn poll_timers(&mut self, elapsed_ms: f64) -> Result<String, JsError> {
        let dt = Duration::try_from_secs_f64(elapsed_ms / 1000.0).unwrap_or(if elapsed_ms > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        });
        match self.engine.poll_timers(dt).map_err(js_err)? {
            Some(request) => request_json(&request),
            None => Ok("null".to_string()),
        }
    }

    pub fn cancel_pending_timers(&mut self) -> usize {
        self.engine.cancel_pending_timers()
    }

    pub fn cast_spell(&mut self, name: &str) -> bool {
        self.engine.cast_spell(name)
    }

    pub fn available_spells(&self) -> Result<String, JsError> {
        let spells: Vec<SpellInfo> = self
            .engine
            .available_spells()
            .into_iter()
            .map(|option| SpellInfo {
                key: option.key,
                name: option.name,
                available: option.available,
            })
            .collect();
        to_json(&spells)
    }

    pub fn state(&self) -> Result<String, JsError> {
        to_json(self.engine.state())
    }

    pub fn phase(&self) -> Result<String, JsError> {
        to_json(&self.engine.phase())
    }

    /// Drain buffered presenter notifications as a JSON array.
    pub fn take_events(&mut self) -> Result<String, JsError> {
        let events = std::mem::take(&mut self.engine.presenter_mut().events);
        to_json(&events)
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// URL path of a document, relative to the content root.
    pub fn content_path(id: &str) -> String {
        content_path(id)
    }
}
