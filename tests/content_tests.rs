/// Content integration tests: fixture documents, the directory source and
/// how the engine copes with broken content.

use story_engine::core::config::EngineConfig;
use story_engine::core::content::{ContentKind, ContentSource, DirectorySource};
use story_engine::core::engine::{ChapterPhase, ErrorKind, StoryEngine};
use story_engine::core::presenter::Presenter;
use story_engine::schema::chapter::{Chapter, DocumentError, Ending, FactionResponse};
use std::path::Path;

const CONTENT: &str = "tests/fixtures/content";
const BROKEN: &str = "tests/fixtures/broken";

fn chapter(root: &str, id: &str) -> Result<Chapter, DocumentError> {
    let raw = DirectorySource::new(root).fetch_chapter(id).unwrap();
    Chapter::from_json(&raw)
}

#[test]
fn fixture_story_parses() {
    let source = DirectorySource::new(CONTENT);
    assert_eq!(
        source.ids(ContentKind::Chapter).unwrap(),
        vec!["chapter1", "chapter2", "secret_grove"]
    );
    assert_eq!(
        source.ids(ContentKind::Ending).unwrap(),
        vec!["ending_ashes", "ending_dawn"]
    );

    for id in source.ids(ContentKind::Chapter).unwrap() {
        let chapter = chapter(CONTENT, &id).unwrap();
        assert_eq!(chapter.id, id);
        for choice in &chapter.choices {
            assert!(choice.is_well_formed(), "{id}: '{}'", choice.text);
            assert!(choice.requires.problems().is_empty());
            assert!(choice.effects.problems().is_empty());
        }
    }

    let raw = source.fetch_ending("ending_dawn").unwrap();
    let ending = Ending::from_json(&raw).unwrap();
    assert_eq!(ending.title, "A New Dawn");
}

#[test]
fn opening_chapter_structure() {
    let chapter = chapter(CONTENT, "chapter1").unwrap();
    assert_eq!(chapter.title.as_deref(), Some("The Tolling Bells"));
    assert_eq!(chapter.choices.len(), 5);
    assert!(chapter.choices[2].hidden);
    assert_eq!(chapter.choices[3].timeout, Some(5.0));
    assert_eq!(chapter.choices[4].arc.as_deref(), Some("rebellion"));
    assert_eq!(chapter.variants.len(), 1);

    let config = EngineConfig::default();
    for spell in chapter.spells.values() {
        assert!(config.ley_line(&spell.element).is_some());
    }

    let strategy = chapter.faction_ai["church"].strategy.as_ref().unwrap();
    assert_eq!(
        strategy.then,
        vec![FactionResponse::SendZealots, FactionResponse::BurnForest]
    );
}

#[test]
fn broken_documents_are_rejected() {
    assert!(matches!(
        chapter(BROKEN, "chapter2"),
        Err(DocumentError::MissingFields(fields)) if fields == vec!["text"]
    ));

    let raw = DirectorySource::new(BROKEN).fetch_ending("ending_bad").unwrap();
    assert!(matches!(Ending::from_json(&raw), Err(DocumentError::Parse(_))));
}

#[test]
fn broken_chapter_problems_are_detectable() {
    let chapter = chapter(BROKEN, "chapter1").unwrap();
    let config = EngineConfig::default();

    assert!(!chapter.choices[0].is_well_formed());
    assert_eq!(chapter.choices[2].effects.problems().len(), 1);
    assert!(config.ley_line(&chapter.spells["frost_lance"].element).is_none());

    let strategy = chapter.faction_ai["church"].strategy.as_ref().unwrap();
    assert_eq!(strategy.condition.problems().len(), 1);
    assert_eq!(
        strategy.then,
        vec![FactionResponse::Unrecognized("ring_bells".to_string())]
    );
}

#[derive(Default)]
struct ErrorLog(Vec<ErrorKind>);

impl Presenter for ErrorLog {
    fn on_error(&mut self, kind: ErrorKind, _message: &str) {
        self.0.push(kind);
    }
}

#[test]
fn engine_survives_broken_content() {
    let mut engine = StoryEngine::builder()
        .content_dir(BROKEN)
        .presenter(ErrorLog::default())
        .build()
        .unwrap();

    engine.start().unwrap();
    // The choice with no outcome is dropped and reported.
    assert_eq!(engine.presenter().0, vec![ErrorKind::InvalidChoice]);
    assert_eq!(engine.choices().len(), 2);

    // The bad inventory action is skipped, then chapter2 turns out malformed.
    let trade = engine
        .choices()
        .iter()
        .position(|c| c.text == "Trade")
        .unwrap();
    let err = engine.choose(trade).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedContent);
    assert_eq!(
        engine.presenter().0,
        vec![
            ErrorKind::InvalidChoice,
            ErrorKind::InvalidChoice,
            ErrorKind::MalformedContent
        ]
    );
    assert_eq!(engine.phase(), ChapterPhase::ChoicesVisible);
    assert_eq!(engine.state().current_chapter, "chapter1");

    // Unknown ley line.
    assert!(!engine.cast_spell("frost_lance"));
    assert_eq!(engine.presenter().0.last(), Some(&ErrorKind::UnknownElement));
}

#[test]
fn default_config_file() {
    let config = EngineConfig::load_from_ron(Path::new("config/default.ron")).unwrap();
    assert_eq!(config.start_chapter, "chapter1");
    assert_eq!(config.ley_line("void").map(|l| l.alignment.as_str()), Some("eldritch"));
}
