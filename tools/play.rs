/// Play: interactive terminal player for a story content directory.
///
/// Usage: play <content_dir> [--config <file>] [--start <id>]
///
/// Commands:
///   <n>             take choice number n
///   cast <spell>    cast a spell of the current chapter
///   spells          list the chapter's spells
///   stats           show the player state
///   wait <seconds>  let time pass (timed choices may fire)
///   restart         start a new playthrough
///   help            list commands
///   quit            exit

use std::io::{self, BufRead, Write};
use std::time::Duration;

use story_engine::core::engine::{ChapterPhase, ErrorKind, StoryEngine};
use story_engine::core::presenter::Presenter;
use story_engine::core::reaction::Reaction;
use story_engine::core::resolver::{ActiveContent, ChoiceView};
use story_engine::schema::state::PlayerState;

/// Prints every notification to stdout.
struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn on_variant_resolved(&mut self, content: &ActiveContent) {
        println!();
        if let Some(title) = &content.title {
            println!("=== {} ===", title);
        }
        println!("[{}]", content.background);
        println!("{}\n", content.text);
    }

    fn on_choices_ready(&mut self, choices: &[ChoiceView]) {
        for (i, view) in choices.iter().enumerate() {
            let mut line = format!("  {}. {}", i + 1, view.text);
            if !view.enabled {
                line.push_str(" (unavailable)");
            }
            if let Some(timeout) = view.timeout {
                line.push_str(&format!(" [auto in {}s]", timeout.as_secs_f64()));
            }
            println!("{}", line);
        }
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        println!("! {:?}: {}", kind, message);
    }

    fn on_ending_reached(&mut self, ending_id: &str, title: &str, text: &str) {
        println!("\n*** {} ({}) ***", title, ending_id);
        println!("{}\n", text);
        println!("The story is over. 'restart' to play again, 'quit' to exit.");
    }

    fn on_reaction(&mut self, reaction: &Reaction) {
        match reaction {
            Reaction::SpriteChange { character, sprite } => {
                println!("  ({} now shows '{}')", character, sprite)
            }
            Reaction::Dialogue {
                speaker, text, mood, ..
            } => println!("  {} [{}]: \"{}\"", speaker, mood, text),
        }
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let content_dir = args[1].clone();
    let mut config_path = None;
    let mut start = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--start" if i + 1 < args.len() => {
                i += 1;
                start = Some(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = StoryEngine::builder()
        .content_dir(&content_dir)
        .presenter(TerminalPresenter);
    if let Some(ref path) = config_path {
        builder = builder.config_file(path);
    }
    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("Type 'help' for commands.");
    let first = start.unwrap_or_else(|| engine.config().start_chapter.clone());
    // Failures are already reported through the presenter.
    let _ = engine.load_chapter(&first);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "stats" => print_stats(engine.state()),
            "spells" => {
                let spells = engine.available_spells();
                if spells.is_empty() {
                    println!("No spells here.");
                }
                for spell in spells {
                    let mark = if spell.available { "" } else { " (unavailable)" };
                    println!("  {} ({}){}", spell.name, spell.key, mark);
                }
            }
            "cast" => {
                let Some(name) = parts.get(1) else {
                    println!("Usage: cast <spell>");
                    continue;
                };
                if engine.cast_spell(name) {
                    println!("The spell takes hold.");
                } else {
                    println!("The spell fails.");
                }
            }
            "wait" => {
                let elapsed = parts
                    .get(1)
                    .and_then(|s| s.parse::<f64>().ok())
                    .and_then(|s| Duration::try_from_secs_f64(s).ok());
                let Some(elapsed) = elapsed else {
                    println!("Usage: wait <seconds>");
                    continue;
                };
                match engine.tick(elapsed) {
                    Ok(true) => {}
                    Ok(false) => println!("Time passes."),
                    Err(_) => {}
                }
            }
            "restart" => {
                engine.reset();
                let _ = engine.start();
            }
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    if engine.phase() != ChapterPhase::ChoicesVisible {
                        println!("There is nothing to choose.");
                        continue;
                    }
                    let _ = engine.choose(n - 1);
                }
                _ => println!("Unknown command '{}'. Type 'help'.", other),
            },
        }
    }
}

fn print_stats(state: &PlayerState) {
    println!("Chapter: {}", state.current_chapter);
    let mut stats: Vec<(&String, &i64)> = state.stats.iter().collect();
    stats.sort();
    for (name, value) in stats {
        println!("  {:<18} {}", name, value);
    }
    if !state.inventory.is_empty() {
        println!("Inventory: {}", state.inventory.join(", "));
    }
    if !state.revealed_chapters.is_empty() {
        println!("Revealed: {}", state.revealed_chapters.join(", "));
    }
    if !state.endings_unlocked.is_empty() {
        println!("Endings: {}", state.endings_unlocked.join(", "));
    }
    let mut statuses: Vec<_> = state.statuses.iter().collect();
    statuses.sort();
    for (key, value) in statuses {
        println!("  {} = {}", key, value);
    }
}

fn print_usage() {
    println!("Usage: play <content_dir> [--config <file>] [--start <id>]");
}

fn print_help() {
    println!("Commands:");
    println!("  <n>             take choice number n");
    println!("  cast <spell>    cast a spell of the current chapter");
    println!("  spells          list the chapter's spells");
    println!("  stats           show the player state");
    println!("  wait <seconds>  let time pass (timed choices may fire)");
    println!("  restart         start a new playthrough");
    println!("  help            list commands");
    println!("  quit            exit");
}
