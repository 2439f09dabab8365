//! REPL – Read-Eval-Print Loop for the mnemos interactive shell.
//!
//! Supported slash-commands:
//!   /help                               – show this list
//!   /agents                             – list registered agents
//!   /init <name> <in-schema> <out-schema> – create or reopen an agent (JSON Schema)
//!   /use <name>                         – select the current agent
//!   /store <input> <output>             – store a record pair
//!   /reinforce <input> <output>         – store and embed a record pair
//!   /recall input|output <partial>      – nearest reinforced records
//!   /find [input|output <partial>]      – records with equal field values
//!   /get <id>                           – one record
//!   /edit <id> input|output <patch>     – patch one side of a record
//!   /delete <id>                        – delete a record
//!   /infer <input> [examples]           – generate an output record
//!   /model [<id>]                       – show or switch the generation model
//!   /erase <name>                       – drop an agent and all its records
//!   /quit | /exit                       – gracefully exit the CLI
//!
//! Records and schemas are JSON values; several may follow each other on one
//! line.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use mnemos_memory::{RECALL_LIMIT, RecallQuery};
use mnemos_runtime::InferOptions;
use mnemos_schema::from_json_schema;
use mnemos_types::{AgentName, Fields, MnemosError, RecordId, RecordSchema};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Context, Editor, Helper, Highlighter, Hinter, Validator};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::warn;

use crate::config;
use crate::session::Session;

const COMMANDS: &[&str] = &[
    "/help", "/agents", "/init", "/use", "/store", "/reinforce", "/recall", "/find", "/get",
    "/edit", "/delete", "/infer", "/model", "/erase", "/quit", "/exit",
];

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Agents,
    Init {
        name: AgentName,
        input: RecordSchema,
        output: RecordSchema,
    },
    Use(AgentName),
    Store {
        input: Fields,
        output: Fields,
        reinforce: bool,
    },
    Recall(RecallQuery),
    Find {
        input: Option<Fields>,
        output: Option<Fields>,
    },
    Get(RecordId),
    Edit {
        id: RecordId,
        input: Option<Fields>,
        output: Option<Fields>,
    },
    Delete(RecordId),
    Infer {
        input: Fields,
        examples: usize,
    },
    Model(Option<String>),
    Erase(AgentName),
    Quit,
}

/// Split off the first whitespace-delimited word.
fn word(rest: &str) -> (&str, &str) {
    let rest = rest.trim_start();
    match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    }
}

/// Every JSON value in `text`, in order.
fn json_values(text: &str) -> Result<Vec<Value>, String> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid JSON: {e}"))
}

fn object(value: Value, what: &str) -> Result<Fields, String> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("{what} must be a JSON object, got {other}")),
    }
}

fn objects<const N: usize>(text: &str, what: [&str; N]) -> Result<[Fields; N], String> {
    let values = json_values(text)?;
    if values.len() != N {
        return Err(format!("expected {} JSON object(s): {}", N, what.join(", ")));
    }
    let mut out = Vec::with_capacity(N);
    for (value, label) in values.into_iter().zip(what) {
        out.push(object(value, label)?);
    }
    out.try_into()
        .map_err(|_| "internal argument count error".to_string())
}

fn agent_name(raw: &str) -> Result<AgentName, String> {
    if raw.is_empty() {
        return Err("missing agent name".into());
    }
    AgentName::parse(raw).map_err(|e| e.to_string())
}

fn side(raw: &str) -> Result<bool, String> {
    match raw {
        "input" => Ok(true),
        "output" => Ok(false),
        other => Err(format!("expected 'input' or 'output', got '{other}'")),
    }
}

fn schema(value: &Value) -> Result<RecordSchema, String> {
    from_json_schema(value).map_err(|e| e.to_string())
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let (cmd, rest) = word(line.trim());
    match cmd {
        "/help" => Ok(Command::Help),
        "/agents" => Ok(Command::Agents),
        "/quit" | "/exit" => Ok(Command::Quit),
        "/init" => {
            let (name, rest) = word(rest);
            let name = agent_name(name)?;
            let values = json_values(rest)?;
            let [input, output] = values.as_slice() else {
                return Err("usage: /init <name> <input JSON Schema> <output JSON Schema>".into());
            };
            Ok(Command::Init {
                name,
                input: schema(input)?,
                output: schema(output)?,
            })
        }
        "/use" => Ok(Command::Use(agent_name(word(rest).0)?)),
        "/erase" => Ok(Command::Erase(agent_name(word(rest).0)?)),
        "/store" | "/reinforce" => {
            let [input, output] = objects(rest, ["input", "output"])?;
            Ok(Command::Store {
                input,
                output,
                reinforce: cmd == "/reinforce",
            })
        }
        "/recall" => {
            let (which, rest) = word(rest);
            let is_input = side(which)?;
            let [target] = objects(rest, ["partial record"])?;
            Ok(Command::Recall(if is_input {
                RecallQuery::by_input(target)
            } else {
                RecallQuery::by_output(target)
            }))
        }
        "/find" => {
            let (which, rest) = word(rest);
            if which.is_empty() {
                return Ok(Command::Find {
                    input: None,
                    output: None,
                });
            }
            let is_input = side(which)?;
            let [filter] = objects(rest, ["filter"])?;
            Ok(if is_input {
                Command::Find {
                    input: Some(filter),
                    output: None,
                }
            } else {
                Command::Find {
                    input: None,
                    output: Some(filter),
                }
            })
        }
        "/get" | "/delete" => {
            let id = word(rest).0;
            if id.is_empty() {
                return Err(format!("usage: {cmd} <id>"));
            }
            let id = RecordId::from(id);
            Ok(if cmd == "/get" {
                Command::Get(id)
            } else {
                Command::Delete(id)
            })
        }
        "/edit" => {
            let (id, rest) = word(rest);
            if id.is_empty() {
                return Err("usage: /edit <id> input|output <patch>".into());
            }
            let (which, rest) = word(rest);
            let is_input = side(which)?;
            let [patch] = objects(rest, ["patch"])?;
            let (input, output) = if is_input {
                (Some(patch), None)
            } else {
                (None, Some(patch))
            };
            Ok(Command::Edit {
                id: RecordId::from(id),
                input,
                output,
            })
        }
        "/infer" => {
            let mut values = json_values(rest)?;
            let examples = match values.len() {
                1 => 0,
                2 => values
                    .pop()
                    .and_then(|v| v.as_u64())
                    .map(|n| (n as usize).min(RECALL_LIMIT))
                    .ok_or("examples must be a non-negative integer")?,
                _ => return Err("usage: /infer <input> [examples]".into()),
            };
            let input = values.pop().ok_or("missing input record")?;
            Ok(Command::Infer {
                input: object(input, "input")?,
                examples,
            })
        }
        "/model" => {
            let id = word(rest).0;
            Ok(Command::Model((!id.is_empty()).then(|| id.to_string())))
        }
        other => Err(format!("Unknown command: '{other}'")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution
// ─────────────────────────────────────────────────────────────────────────────

fn current(session: &Session) -> Result<&AgentName, MnemosError> {
    session
        .agent
        .as_ref()
        .ok_or_else(|| MnemosError::InvalidQuery("no agent selected; use /init or /use first".into()))
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("{}: {}", "Serialization error".red(), e),
    }
}

/// Run one command.  Returns `false` when the REPL should exit.
pub async fn execute(session: &mut Session, command: Command) -> Result<bool, MnemosError> {
    let deadline = session.deadline();
    match command {
        Command::Help => cmd_help(),
        Command::Quit => return Ok(false),
        Command::Agents => {
            let agents = session.client.list_agents()?;
            if agents.is_empty() {
                println!("  {}", "no agents".dimmed());
            }
            for agent in agents {
                let marker = if session.agent.as_ref() == Some(&agent.name) { "▶" } else { " " };
                println!(
                    "  {} {} {}",
                    marker.green(),
                    agent.name.as_str().bold(),
                    format!("(created {})", agent.created_at.format("%Y-%m-%d %H:%M")).dimmed()
                );
            }
        }
        Command::Init { name, input, output } => {
            session.client.init(&name, &input, &output)?;
            println!("{} {}", "✓ Agent ready:".green(), name.as_str().bold());
            session.agent = Some(name);
        }
        Command::Use(name) => {
            // Remote agents cannot be listed; trust the name.
            if session.client.mode() == mnemos_runtime::Mode::Local
                && !session.client.list_agents()?.iter().any(|a| a.name == name)
            {
                return Err(MnemosError::AgentNotFound(name.as_str().to_string()));
            }
            println!("{} {}", "✓ Using agent".green(), name.as_str().bold());
            session.agent = Some(name);
        }
        Command::Store {
            input,
            output,
            reinforce,
        } => {
            let agent = current(session)?;
            let id = if reinforce {
                session.client.reinforce(agent, &input, &output, deadline).await?
            } else {
                session.client.store(agent, &input, &output, deadline).await?
            };
            println!("{} {}", "✓ Stored".green(), id.as_str().bold());
        }
        Command::Recall(query) => {
            let agent = current(session)?;
            let result = session.client.recall(agent, &query, deadline).await?;
            print_json(&result.matches);
            if result.dropped > 0 {
                println!(
                    "  {} {} unreadable match(es) skipped",
                    "Warning:".yellow(),
                    result.dropped
                );
            }
        }
        Command::Find { input, output } => {
            let agent = current(session)?;
            let records = session
                .client
                .find(agent, input.as_ref(), output.as_ref(), deadline)
                .await?;
            print_json(&records);
        }
        Command::Get(id) => {
            let agent = current(session)?;
            print_json(&session.client.get(agent, &id, deadline).await?);
        }
        Command::Edit { id, input, output } => {
            let agent = current(session)?;
            let record = session
                .client
                .edit(agent, &id, input.as_ref(), output.as_ref(), deadline)
                .await?;
            print_json(&record);
        }
        Command::Delete(id) => {
            let agent = current(session)?;
            if session.client.delete(agent, &id, deadline).await? {
                println!("{} {}", "✓ Deleted".green(), id.as_str().bold());
            } else {
                println!("  {} {}", "nothing to delete for".dimmed(), id.as_str());
            }
        }
        Command::Infer { input, examples } => {
            let agent = current(session)?;
            let options = InferOptions::new(session.model.clone()).with_examples(examples);
            let inference = session.client.infer(agent, &input, &options, deadline).await?;
            print_json(&inference.output);
        }
        Command::Model(None) => println!("  Active model : {}", session.model.yellow()),
        Command::Model(Some(model)) => {
            println!("{} {}", "✓ Active model set to".green(), model.bold());
            session.model = model;
        }
        Command::Erase(name) => {
            if session.client.erase(&name)? {
                println!("{} {}", "✓ Erased".green(), name.as_str().bold());
            } else {
                println!("  {} {}", "no such agent".dimmed(), name.as_str());
            }
            if session.agent.as_ref() == Some(&name) {
                session.agent = None;
            }
        }
    }
    Ok(true)
}

fn cmd_help() {
    println!();
    println!("{}", "mnemos Commands".bold().underline());
    let rows = [
        ("/agents", "list registered agents"),
        ("/init <name> <in> <out>", "create or reopen an agent from two JSON Schemas"),
        ("/use <name>", "select the current agent"),
        ("/store <in> <out>", "store a record pair"),
        ("/reinforce <in> <out>", "store and embed a record pair"),
        ("/recall input|output <partial>", "nearest reinforced records"),
        ("/find [input|output <partial>]", "records with equal field values"),
        ("/get <id>", "show one record"),
        ("/edit <id> input|output <patch>", "patch one side of a record"),
        ("/delete <id>", "delete a record"),
        ("/infer <in> [examples]", "generate an output record"),
        ("/model [<id>]", "show or switch the generation model"),
        ("/erase <name>", "drop an agent and all its records"),
        ("/quit  /exit", "exit the CLI"),
    ];
    for (usage, what) in rows {
        println!("  {:<34} – {}", usage.bold().cyan(), what);
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Line editor
// ─────────────────────────────────────────────────────────────────────────────

/// Slash-command names starting with `prefix`.
pub fn complete_command(prefix: &str) -> Vec<String> {
    COMMANDS
        .iter()
        .filter(|c| c.starts_with(prefix))
        .map(|c| c.to_string())
        .collect()
}

#[derive(Helper, Hinter, Highlighter, Validator)]
struct CommandHelper;

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<String>)> {
        let head = &line[..pos];
        if head.starts_with('/') && !head.contains(char::is_whitespace) {
            Ok((0, complete_command(head)))
        } else {
            Ok((pos, Vec::new()))
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut session: Session, runtime: &Runtime, shutdown: Arc<AtomicBool>) {
    let mut editor: Editor<CommandHelper, DefaultHistory> = match Editor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };
    editor.set_helper(Some(CommandHelper));
    let history = config::data_dir().join("history.txt");
    // A missing history file is normal on first run.
    let _ = editor.load_history(&history);

    let prompt = format!("{} ", "mnemos>".bold().cyan());
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{} {}. Type {} for available commands.", "✗".red(), e, "/help".bold());
                continue;
            }
        };
        match runtime.block_on(execute(&mut session, command)) {
            Ok(true) => {}
            Ok(false) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    if let Err(e) = editor.save_history(&history) {
        warn!(error = %e, "could not save REPL history");
    }
}
