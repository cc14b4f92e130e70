use std::io::{BufRead, Write};

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;

use wordgroups::puzzle::PuzzleCatalog;
use wordgroups::store::GameStore;
use wordgroups::{GameService, GuessOutcome, ServiceError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Puzzle file to load
    #[arg(short, long)]
    puzzle_file: Option<String>,

    /// Game state file
    #[arg(short, long)]
    games_file: Option<String>,

    /// Override today's date (YYYY-MM-DD), for replaying old puzzles
    #[arg(short, long)]
    today: Option<NaiveDate>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let puzzle_file = args
        .puzzle_file
        .or_else(|| std::env::var("WORDGROUPS_PUZZLES").ok())
        .unwrap_or_else(|| "puzzles.json".to_string());
    let games_file = args
        .games_file
        .or_else(|| std::env::var("WORDGROUPS_GAMES").ok())
        .unwrap_or_else(|| "games.json".to_string());
    let today = args.today.unwrap_or_else(|| chrono::Local::now().date_naive());

    let catalog = PuzzleCatalog::load_from_file(&puzzle_file)?;
    println!("Loaded {} puzzles from {}", catalog.len(), puzzle_file);

    let store = GameStore::open(&games_file)?;
    let (mut service, warnings) = GameService::new(catalog, store);
    for warning in &warnings {
        eprintln!("Warning: skipping game {}: {}", warning.game_id, warning.error);
    }

    println!("\nAvailable puzzles:");
    let available: Vec<(u32, NaiveDate, String)> = service
        .catalog()
        .available(today)
        .map(|puzzle| (puzzle.id(), puzzle.date(), puzzle.author().to_string()))
        .collect();
    if available.is_empty() {
        println!("  (none released yet)");
        return Ok(());
    }
    for (id, date, author) in &available {
        println!("  {}: {} by {}", id, date, author);
    }

    let stdin = std::io::stdin();
    let puzzle_id = loop {
        print!("\nPuzzle id> ");
        std::io::stdout().flush()?;
        let Some(line) = stdin.lock().lines().next() else {
            return Ok(());
        };
        match line?.trim().parse::<u32>() {
            Ok(id) if available.iter().any(|(pid, _, _)| *pid == id) => break id,
            _ => println!("Pick one of the listed puzzle ids."),
        }
    };

    let game_id = service.start_or_resume(puzzle_id, today)?.id();
    println!("Game {}", game_id);

    loop {
        let view = service.view(game_id)?;
        for group in &view.solved_groups {
            println!(
                "{} {} ({}): {}",
                group.color().symbol(),
                group.color(),
                group.category(),
                group.items().join(", ")
            );
        }
        for row in view.items.chunks(4) {
            println!("  {}", row.join("  "));
        }
        println!("Attempts remaining: {}", view.attempts_remaining);

        if view.solved || view.failed {
            println!("{}", if view.solved { "Solved!" } else { "Out of attempts." });
            for line in service.game(game_id)?.report_lines() {
                println!("{line}");
            }
            return Ok(());
        }

        print!("Guess (4 items, comma-separated)> ");
        std::io::stdout().flush()?;
        let Some(line) = stdin.lock().lines().next() else {
            return Ok(());
        };
        let items: Vec<String> = line?
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();

        match service.submit_guess(game_id, &items) {
            Ok(GuessOutcome::Correct) => println!("Correct!"),
            Ok(GuessOutcome::IncorrectOneAway) => println!("One away..."),
            Ok(GuessOutcome::Incorrect) => println!("Incorrect."),
            Ok(GuessOutcome::AlreadyGuessed) => println!("Already guessed."),
            Err(ServiceError::Game(e)) => println!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }
}
