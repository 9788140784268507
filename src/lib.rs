//! Story Engine: state-driven branching narrative for visual novels.
//!
//! Decides which chapter variant a player sees, which choices are visible
//! or enabled, how choices, spells and faction reactions change the player
//! state, and which chapter or ending comes next. Rendering and content
//! fetching belong to the host, behind the `Presenter` and `ContentSource`
//! traits.

pub mod core;
pub mod schema;

pub use crate::core::config::EngineConfig;
pub use crate::core::content::{ContentSource, DirectorySource, MemorySource};
pub use crate::core::engine::{ChapterPhase, EngineError, ErrorKind, StoryEngine};
pub use crate::core::presenter::{NullPresenter, Presenter};
pub use crate::schema::state::PlayerState;
