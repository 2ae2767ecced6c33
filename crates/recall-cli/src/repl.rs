//! REPL – Read-Eval-Print Loop for the Recall shell.
//!
//! Supported slash-commands:
//!   /remember <text> [| id,id…]  – store a memory, optionally linked
//!   /recall <id> [depth]         – show a memory and its neighbourhood
//!   /search <keyword>            – substring search over memories
//!   /forget <id>                 – delete a memory
//!   /note <text>  /notes         – scratch buffer
//!   /think <goal>                – start a thought chain
//!   /thought [type:] <text>      – add a thought to the current chain
//!   /conclude <conclusion>       – complete the current chain
//!   /chains                      – list active chains
//!   /mode <mode>                 – switch cognitive mode
//!   /stats  /save  /help  /quit

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use colored::Colorize;
use recall_runtime::Orchestrator;
use recall_types::{CognitiveMode, RecallError, ThoughtType};
use tokio::runtime::Handle;

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Remember {
        text: String,
        associations: Vec<String>,
    },
    Recall {
        id: String,
        depth: Option<usize>,
    },
    Search(String),
    Forget(String),
    Note(String),
    Notes,
    Think(String),
    Thought {
        thought_type: ThoughtType,
        text: String,
    },
    Conclude(String),
    Chains,
    Mode(CognitiveMode),
    Stats,
    Save,
    Help,
    Quit,
}

/// Parse one input line.  The error is a usage message for the user.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let required = |usage: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {usage}"))
        } else {
            Ok(rest.to_string())
        }
    };

    match name {
        "/remember" => {
            let body = required("/remember <text> [| id,id…]")?;
            let (text, links) = match body.split_once('|') {
                Some((text, links)) => (text.trim().to_string(), links),
                None => (body.clone(), ""),
            };
            let associations = links
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            Ok(Command::Remember { text, associations })
        }
        "/recall" => {
            let body = required("/recall <id> [depth]")?;
            let mut parts = body.split_whitespace();
            let id = parts.next().unwrap_or_default().to_string();
            let depth = match parts.next() {
                Some(d) => Some(
                    d.parse::<usize>()
                        .map_err(|_| format!("depth must be a number, got '{d}'"))?,
                ),
                None => None,
            };
            Ok(Command::Recall { id, depth })
        }
        "/search" => required("/search <keyword>").map(Command::Search),
        "/forget" => required("/forget <id>").map(Command::Forget),
        "/note" => required("/note <text>").map(Command::Note),
        "/notes" => Ok(Command::Notes),
        "/think" => required("/think <goal>").map(Command::Think),
        "/thought" => {
            let body = required("/thought [type:] <text>")?;
            if let Some((tag, text)) = body.split_once(':')
                && let Ok(thought_type) = ThoughtType::from_str(tag.trim())
                && !text.trim().is_empty()
            {
                return Ok(Command::Thought {
                    thought_type,
                    text: text.trim().to_string(),
                });
            }
            Ok(Command::Thought {
                thought_type: ThoughtType::Analysis,
                text: body,
            })
        }
        "/conclude" => required("/conclude <conclusion>").map(Command::Conclude),
        "/chains" => Ok(Command::Chains),
        "/mode" => {
            let body = required("/mode <analytical|creative|critical|intuitive|meta_cognitive>")?;
            CognitiveMode::from_str(&body)
                .map(Command::Mode)
                .map_err(|e| e.to_string())
        }
        "/stats" => Ok(Command::Stats),
        "/save" => Ok(Command::Save),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command: '{other}'. Type /help for available commands.")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// The chain `/thought` and `/conclude` act on.
#[derive(Default)]
struct Session {
    chain_id: Option<String>,
    last_thought: Option<String>,
}

/// Run the REPL until `/quit` or end of input.
pub fn run(handle: &Handle, recall: &Orchestrator) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut session = Session::default();

    loop {
        print!("{} ", "recall>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{}", msg.yellow());
                continue;
            }
        };
        if command == Command::Quit {
            println!("{}", "Goodbye.".green());
            break;
        }
        if let Err(e) = handle.block_on(execute(recall, &mut session, command)) {
            print_error(&e);
        }
    }
}

async fn execute(
    recall: &Orchestrator,
    session: &mut Session,
    command: Command,
) -> Result<(), RecallError> {
    match command {
        Command::Remember { text, associations } => {
            let id = recall.add_memory(&text, associations).await?;
            println!("{} {}", "✓ Remembered".green(), id.bold());
        }
        Command::Recall { id, depth } => {
            let hit = recall.get_memory(&id, depth).await?;
            println!("{}", hit.node.text.bold());
            println!(
                "  accessed {} time(s), last {}",
                hit.node.metadata.access_count,
                hit.node.metadata.last_accessed.to_rfc3339().dimmed()
            );
            for node in &hit.associations {
                println!("  ↳ {} {}", node.id.dimmed(), node.text);
            }
        }
        Command::Search(keyword) => {
            let hits = recall.search_memories(&keyword, None, false).await?;
            if hits.is_empty() {
                println!("{}", "No matches.".dimmed());
            }
            for hit in hits {
                println!("  {} {}", hit.id.dimmed(), hit.text);
            }
        }
        Command::Forget(id) => {
            recall.delete_memory(&id).await?;
            println!("{} {}", "✓ Forgot".green(), id.bold());
        }
        Command::Note(text) => {
            recall.add_to_scratch(&text).await?;
            println!("{}", "✓ Noted".green());
        }
        Command::Notes => {
            let notes = recall.get_scratch().await;
            if notes.is_empty() {
                println!("{}", "Scratch buffer is empty.".dimmed());
            }
            for note in notes {
                println!("  {} {}", note.timestamp.format("%H:%M:%S").to_string().dimmed(), note.text);
            }
        }
        Command::Think(goal) => {
            let suggested = Orchestrator::get_optimal_mode_for_task(&goal);
            let chain_id = recall.start_thought_process(&goal, None).await?;
            println!(
                "{} {} (mode {}, suggested {})",
                "✓ Thinking in chain".green(),
                chain_id.bold(),
                recall.current_cognitive_mode().await.to_string().yellow(),
                suggested.to_string().cyan()
            );
            session.chain_id = Some(chain_id);
            session.last_thought = None;
        }
        Command::Thought { thought_type, text } => {
            let Some(chain_id) = session.chain_id.clone() else {
                println!("{}", "No current chain. Start one with /think <goal>.".yellow());
                return Ok(());
            };
            let id = recall
                .add_thought(
                    &chain_id,
                    &text,
                    thought_type,
                    session.last_thought.as_deref(),
                    None,
                )
                .await?;
            let thought = recall.get_thought(&id).await?;
            println!(
                "{} {} [{} depth {}]",
                "✓ Thought".green(),
                id.bold(),
                thought_type,
                thought.reasoning_depth
            );
            session.last_thought = Some(id);
        }
        Command::Conclude(conclusion) => {
            let Some(chain_id) = session.chain_id.take() else {
                println!("{}", "No current chain. Start one with /think <goal>.".yellow());
                return Ok(());
            };
            session.last_thought = None;
            let outcome = recall.complete_thought_process(&chain_id, &conclusion).await?;
            println!("{} {}", "✓ Completed chain".green(), outcome.chain_id.bold());
            if let Some(id) = outcome.summary_memory_id {
                println!("  summary stored as {}", id.bold());
            }
        }
        Command::Chains => {
            let chains = recall.get_active_chains().await;
            if chains.is_empty() {
                println!("{}", "No active chains.".dimmed());
            }
            for chain in chains {
                let marker = if session.chain_id.as_deref() == Some(chain.id.as_str()) {
                    "▶"
                } else {
                    " "
                };
                println!(
                    "  {} {} {} ({} thought(s), {})",
                    marker.green(),
                    chain.id.dimmed(),
                    chain.goal.bold(),
                    chain.thoughts.len(),
                    chain.cognitive_mode
                );
            }
        }
        Command::Mode(mode) => {
            recall
                .switch_cognitive_mode(mode, session.chain_id.as_deref())
                .await?;
            println!("{} {}", "✓ Cognitive mode set to".green(), mode.to_string().bold());
        }
        Command::Stats => {
            let stats = recall.get_memory_stats().await;
            match serde_json::to_string_pretty(&stats) {
                Ok(json) => println!("{json}"),
                Err(e) => println!("{}: {}", "Failed to render stats".red(), e),
            }
        }
        Command::Save => {
            recall.persist().await?;
            println!("{}", "✓ Saved".green());
        }
        Command::Help => print_help(),
        Command::Quit => {}
    }
    Ok(())
}

fn print_error(e: &RecallError) {
    println!("{} {}", format!("[{:?}]", e.kind()).red(), e);
}

fn print_help() {
    println!();
    println!("{}", "Recall Commands".bold().underline());
    let rows = [
        ("/remember <text> [| id,id]", "store a memory, optionally linked"),
        ("/recall <id> [depth]", "show a memory and its associations"),
        ("/search <keyword>", "find memories containing a keyword"),
        ("/forget <id>", "delete a memory"),
        ("/note <text>", "add to the scratch buffer"),
        ("/notes", "list scratch notes, newest first"),
        ("/think <goal>", "start a thought chain"),
        ("/thought [type:] <text>", "add a thought to the current chain"),
        ("/conclude <text>", "complete the current chain"),
        ("/chains", "list active chains"),
        ("/mode <mode>", "switch cognitive mode"),
        ("/stats", "memory statistics"),
        ("/save", "save the memory graph now"),
        ("/quit  /exit", "save and exit"),
    ];
    for (cmd, what) in rows {
        println!("  {:<28} – {}", cmd.bold().cyan(), what);
    }
    println!();
}
