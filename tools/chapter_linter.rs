/// Chapter Linter: static checks over a story content directory.
///
/// Usage: chapter_linter <content_dir> [--config <file>]

use std::collections::BTreeSet;
use std::path::Path;
use std::process;

use story_engine::core::condition::Condition;
use story_engine::core::config::EngineConfig;
use story_engine::core::content::{ContentKind, ContentSource, DirectorySource};
use story_engine::core::effect::EffectSet;
use story_engine::schema::chapter::{
    Chapter, Choice, Ending, FactionResponse, SpellEffect, REVEAL_SENTINEL,
};

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: chapter_linter <content_dir> [--config <file>]");
        process::exit(0);
    }

    let content_dir = &args[1];
    let mut config_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            i += 1;
            config_path = Some(args[i].clone());
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => match EngineConfig::load_from_ron(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config: {}", e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    if !Path::new(content_dir).is_dir() {
        eprintln!("ERROR: Path '{}' is not a directory", content_dir);
        process::exit(1);
    }
    let source = DirectorySource::new(content_dir);

    let report = lint_content(&source, &config);

    println!("\n=== Chapter Lint Report ===\n");

    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} chapters, {} endings, {} errors, {} warnings",
        report.chapters,
        report.endings,
        report.errors.len(),
        report.warnings.len()
    );

    if report.errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

#[derive(Default)]
struct LintReport {
    chapters: usize,
    endings: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn lint_content(source: &DirectorySource, config: &EngineConfig) -> LintReport {
    let mut report = LintReport::default();

    let list = |kind: ContentKind, report: &mut LintReport| match source.ids(kind) {
        Ok(ids) => ids,
        Err(e) => {
            report.errors.push(format!("cannot list {} documents: {}", kind, e));
            Vec::new()
        }
    };
    let chapter_ids = list(ContentKind::Chapter, &mut report);
    let ending_ids = list(ContentKind::Ending, &mut report);

    let known: BTreeSet<&str> = chapter_ids
        .iter()
        .chain(&ending_ids)
        .map(String::as_str)
        .collect();

    for id in &ending_ids {
        match source.fetch_ending(id).map(|raw| Ending::from_json(&raw)) {
            Ok(Ok(ending)) => {
                report.endings += 1;
                if &ending.id != id {
                    report.warnings.push(format!(
                        "ending file '{}' declares id '{}'",
                        id, ending.id
                    ));
                }
            }
            Ok(Err(e)) => report.errors.push(format!("ending '{}': {}", id, e)),
            Err(e) => report.errors.push(e.to_string()),
        }
    }

    for id in &chapter_ids {
        let chapter = match source.fetch_chapter(id).map(|raw| Chapter::from_json(&raw)) {
            Ok(Ok(chapter)) => chapter,
            Ok(Err(e)) => {
                report.errors.push(format!("chapter '{}': {}", id, e));
                continue;
            }
            Err(e) => {
                report.errors.push(e.to_string());
                continue;
            }
        };
        report.chapters += 1;
        if &chapter.id != id {
            report.warnings.push(format!(
                "chapter file '{}' declares id '{}'",
                id, chapter.id
            ));
        }
        lint_chapter(&chapter, config, &known, &mut report);
    }

    report
}

fn lint_chapter(
    chapter: &Chapter,
    config: &EngineConfig,
    known: &BTreeSet<&str>,
    report: &mut LintReport,
) {
    let at = |what: String| format!("chapter '{}': {}", chapter.id, what);

    check_successor(chapter.default_next.as_deref(), "default_next", known, &at, report);
    lint_choices(&chapter.choices, "choice", known, &at, report);

    for (v, variant) in chapter.variants.iter().enumerate() {
        check_condition(&variant.trigger.condition, &format!("variant #{v} trigger"), &at, report);
        if let Some(choices) = &variant.choices {
            lint_choices(choices, &format!("variant #{v} choice"), known, &at, report);
        }
        check_successor(
            variant.default_next.as_deref(),
            &format!("variant #{v} default_next"),
            known,
            &at,
            report,
        );
    }

    for (name, spell) in &chapter.spells {
        if config.ley_line(&spell.element).is_none() {
            report.errors.push(at(format!(
                "spell '{}' uses unknown ley line '{}'",
                name, spell.element
            )));
        }
        check_condition(&spell.requires, &format!("spell '{name}' requires"), &at, report);
        for effect in &spell.effects {
            match effect {
                SpellEffect::FactionReaction { faction, .. }
                    if !chapter.faction_ai.contains_key(faction) =>
                {
                    report.warnings.push(at(format!(
                        "spell '{}' provokes faction '{}' which has no faction_ai entry",
                        name, faction
                    )));
                }
                SpellEffect::Unknown => {
                    report
                        .warnings
                        .push(at(format!("spell '{}' has an effect of unknown type", name)));
                }
                _ => {}
            }
        }
    }

    for (faction, ai) in &chapter.faction_ai {
        let Some(strategy) = &ai.strategy else {
            continue;
        };
        check_condition(&strategy.condition, &format!("faction '{faction}' strategy"), &at, report);
        for response in &strategy.then {
            if let FactionResponse::Unrecognized(token) = response {
                report.warnings.push(at(format!(
                    "faction '{}' response '{}' is not recognised and will be ignored",
                    faction, token
                )));
            }
        }
    }

    let main_ids: BTreeSet<&str> = chapter.characters.main.iter().map(|c| c.id.as_str()).collect();
    for (c, choice) in chapter.choices.iter().enumerate() {
        for character in &choice.characters {
            if !main_ids.contains(character.as_str()) {
                report.warnings.push(at(format!(
                    "choice #{} names character '{}' not listed in characters.main",
                    c, character
                )));
            }
        }
    }

    for (character, interaction) in &chapter.dynamic_elements.character_interactions {
        if let Some(on_select) = &interaction.on_select {
            check_effects(&on_select.effects, &format!("'{character}' interaction"), &at, report);
        }
    }
}

fn lint_choices(
    choices: &[Choice],
    label: &str,
    known: &BTreeSet<&str>,
    at: &dyn Fn(String) -> String,
    report: &mut LintReport,
) {
    for (c, choice) in choices.iter().enumerate() {
        let what = format!("{label} #{c}");
        if !choice.is_well_formed() {
            report
                .errors
                .push(at(format!("{} needs text and one of next/reveal/effects", what)));
        }
        if choice.next.is_none() && choice.reveal.is_none() {
            report
                .warnings
                .push(at(format!("{} has no successor and cannot be taken", what)));
        }
        match (choice.next.as_deref(), choice.reveal.as_deref()) {
            (Some(REVEAL_SENTINEL), None) => {
                report
                    .errors
                    .push(at(format!("{} reveals a chapter but names none", what)));
            }
            (Some(REVEAL_SENTINEL), reveal) | (None, reveal) => {
                check_successor(reveal, &what, known, at, report)
            }
            (next, _) => check_successor(next, &what, known, at, report),
        }
        check_condition(&choice.requires, &format!("{what} requires"), at, report);
        check_effects(&choice.effects, &what, at, report);
    }
}

fn check_successor(
    id: Option<&str>,
    what: &str,
    known: &BTreeSet<&str>,
    at: &dyn Fn(String) -> String,
    report: &mut LintReport,
) {
    if let Some(id) = id {
        if !known.contains(id) {
            report
                .errors
                .push(at(format!("{} leads to unknown document '{}'", what, id)));
        }
    }
}

fn check_condition(
    condition: &Condition,
    what: &str,
    at: &dyn Fn(String) -> String,
    report: &mut LintReport,
) {
    for problem in condition.problems() {
        report
            .errors
            .push(at(format!("{} is malformed: {}", what, problem)));
    }
}

fn check_effects(
    effects: &EffectSet,
    what: &str,
    at: &dyn Fn(String) -> String,
    report: &mut LintReport,
) {
    for problem in effects.problems() {
        report
            .errors
            .push(at(format!("{} has an invalid effect {}", what, problem)));
    }
}
