use std::cell::RefCell;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::rc::Rc;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::checklist_io::{self, ChecklistIoError};
use crate::io::config_io;
use crate::model::item::Item;
use crate::ops::events::ChangeEvent;
use crate::ops::history::HistoryError;
use crate::ops::manager::{DeleteOutcome, ListManager};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;
    let mut session = Session::open(&cli)?;

    match cli.command {
        None | Some(Commands::Show) => cmd_show(&session, json),
        Some(Commands::Change(change)) => cmd_change(&mut session, change, json),
        Some(Commands::Run) => {
            let stdin = io::stdin();
            cmd_run(&mut session, stdin.lock(), json)
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A checklist file loaded into a list manager
struct Session {
    path: PathBuf,
    title: Option<String>,
    dropped: Vec<String>,
    loaded: Vec<Item>,
    manager: ListManager,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, ChecklistIoError> {
        let path = PathBuf::from(&cli.file);
        let config_path = match &cli.config {
            Some(config) => PathBuf::from(config),
            None => config_io::config_path_for(&path),
        };
        let mut config = config_io::read_config(&config_path)?;
        if let Some(sort) = cli.sort {
            config.list.sort = sort;
        }

        let (checklist, dropped) = checklist_io::load_checklist(&path)?;
        let mut manager = ListManager::with_config(&config.list);
        manager.init(checklist.items);
        tracing::debug!(path = %path.display(), items = manager.len(), sort = ?config.list.sort, "checklist loaded");

        Ok(Session {
            path,
            title: checklist.title,
            dropped,
            loaded: manager.items().snapshot(),
            manager,
        })
    }

    /// Write the checklist back if anything changed since it was loaded
    fn save_if_changed(&self) -> Result<bool, ChecklistIoError> {
        if self.manager.items().snapshot() == self.loaded {
            return Ok(false);
        }
        if !self.dropped.is_empty() {
            eprintln!(
                "warning: {} unrecognized line(s) in {} were not kept",
                self.dropped.len(),
                self.path.display()
            );
        }
        checklist_io::save_checklist(&self.path, self.title.as_deref(), self.manager.items())?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_show(session: &Session, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let out = checklist_to_json(
            session.title.as_deref(),
            session.manager.policy(),
            session.manager.items(),
        );
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for line in format_checklist(session.title.as_deref(), session.manager.items()) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_change(
    session: &mut Session,
    change: ChangeCommand,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = apply_change(&mut session.manager, change)?;
    session.save_if_changed()?;
    if json {
        cmd_show(session, true)
    } else {
        println!("{}", outcome.message);
        Ok(())
    }
}

/// Apply stdin operations in one session; the file is written once at the
/// end, and not at all if any line fails
fn cmd_run(
    session: &mut Session,
    input: impl BufRead,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let events: Rc<RefCell<Vec<ChangeEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    session
        .manager
        .subscribe(move |event: &ChangeEvent| sink.borrow_mut().push(*event));

    let mut steps = Vec::new();
    for (n, line) in input.lines().enumerate() {
        let line = line?;
        let number = n + 1;
        let op = RunLine::parse_line(&line).map_err(|e| {
            let detail = e.to_string();
            let first = detail.lines().next().unwrap_or("").trim_start_matches("error: ");
            format!("line {}: {}", number, first)
        })?;
        let Some(op) = op else {
            continue;
        };

        let outcome = match op {
            RunOp::Change(change) => apply_change(&mut session.manager, change)
                .map_err(|e| format!("line {}: {}", number, e))?,
            RunOp::Undo => history_step(session.manager.undo(), "undone")
                .map_err(|e| format!("line {}: {}", number, e))?,
            RunOp::Redo => history_step(session.manager.redo(), "redone")
                .map_err(|e| format!("line {}: {}", number, e))?,
            RunOp::Show => Outcome {
                message: format_checklist(session.title.as_deref(), session.manager.items())
                    .join("\n"),
                focus: None,
            },
        };

        let step_events = std::mem::take(&mut *events.borrow_mut());
        if json {
            steps.push(RunStepJson {
                line: number,
                op: line.trim().to_string(),
                message: outcome.message,
                focus: outcome.focus.map(|f| f + 1),
                events: step_events,
            });
        } else {
            println!("{}", outcome.message);
            for event in &step_events {
                tracing::debug!(line = number, "{}", format_event(event));
            }
        }
    }

    let saved = session.save_if_changed()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else if !saved {
        println!("no changes");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// What a command did, for the user
struct Outcome {
    message: String,
    /// 0-based position worth looking at afterwards
    focus: Option<usize>,
}

impl Outcome {
    fn at(message: String, focus: usize) -> Self {
        Outcome {
            message,
            focus: Some(focus),
        }
    }

    fn plain(message: impl Into<String>) -> Self {
        Outcome {
            message: message.into(),
            focus: None,
        }
    }
}

/// Convert a 1-based position to an index into a list of `len` rows
fn to_index(pos: usize, len: usize) -> Result<usize, String> {
    if pos == 0 || pos > len {
        return Err(format!(
            "no item at position {} (checklist has {} items)",
            pos, len
        ));
    }
    Ok(pos - 1)
}

fn apply_change(
    manager: &mut ListManager,
    change: ChangeCommand,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let len = manager.len();
    let outcome = match change {
        ChangeCommand::Add(args) => {
            let body = args.text.join(" ");
            let position = match args.at {
                // one past the end appends
                Some(at) => to_index(at, len + 1)?,
                None => len,
            };
            let at = if args.child {
                manager.add_item(position, Item::child(body))?
            } else if args.at.is_some() {
                manager.add(position, body)?
            } else {
                manager.add_item(position, Item::new(body))?
            };
            Outcome::at(format!("added at {}", at + 1), at)
        }
        ChangeCommand::Edit(args) => {
            let index = to_index(args.pos, len)?;
            manager.change_text(index, args.text.join(" "))?;
            Outcome::at(format!("{} updated", args.pos), index)
        }
        ChangeCommand::Rm(args) => {
            let index = to_index(args.pos, len)?;
            match manager.delete(index, !args.keep_children, args.force)? {
                DeleteOutcome::Deleted(item) => {
                    let extra = item.children.len();
                    let message = if extra > 0 {
                        format!("deleted {} and {} child item(s)", item.body, extra)
                    } else {
                        format!("deleted {}", item.body)
                    };
                    Outcome::plain(message)
                }
                DeleteOutcome::Redirected { focus } => Outcome::at(
                    "kept the first item (use --force to delete it)".to_string(),
                    focus,
                ),
            }
        }
        ChangeCommand::Check(args) => check(manager, args.pos, true)?,
        ChangeCommand::Uncheck(args) => check(manager, args.pos, false)?,
        ChangeCommand::Indent(args) => {
            let index = to_index(args.pos, len)?;
            if manager.set_is_child(index, true, false)? {
                Outcome::at(format!("{} indented", args.pos), index)
            } else {
                Outcome::plain(format!("{} cannot be indented", args.pos))
            }
        }
        ChangeCommand::Outdent(args) => {
            let index = to_index(args.pos, len)?;
            if manager.set_is_child(index, false, args.all)? {
                Outcome::at(format!("{} outdented", args.pos), index)
            } else {
                Outcome::plain(format!("{} is not a child item", args.pos))
            }
        }
        ChangeCommand::Mv(args) => {
            let from = to_index(args.from, len)?;
            let to = to_index(args.to, len)?;
            match manager.move_item(from, args.count, to)? {
                Some(at) => Outcome::at(format!("moved to {}", at + 1), at),
                None => Outcome::plain(format!("cannot move {} to {}", args.from, args.to)),
            }
        }
        ChangeCommand::CheckAll => {
            manager.change_checked_for_all(true)?;
            Outcome::plain("checked all items")
        }
        ChangeCommand::UncheckAll => {
            manager.change_checked_for_all(false)?;
            Outcome::plain("unchecked all items")
        }
        ChangeCommand::Clean => {
            let removed = manager.delete_checked()?;
            let count: usize = removed.iter().map(Item::item_count).sum();
            Outcome::plain(format!("deleted {} checked item(s)", count))
        }
    };
    Ok(outcome)
}

fn check(
    manager: &mut ListManager,
    pos: usize,
    checked: bool,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let index = to_index(pos, manager.len())?;
    let at = manager.change_checked(index, checked)?;
    let verb = if checked { "checked" } else { "unchecked" };
    let message = if at == index {
        format!("{} {}", pos, verb)
    } else {
        format!("{} {}, now at {}", pos, verb, at + 1)
    };
    Ok(Outcome::at(message, at))
}

fn history_step(
    result: Result<Option<usize>, HistoryError>,
    done: &str,
) -> Result<Outcome, HistoryError> {
    match result {
        Ok(Some(focus)) => Ok(Outcome::at(format!("{} (focus {})", done, focus + 1), focus)),
        Ok(None) => Ok(Outcome::plain(done)),
        Err(HistoryError::NoChangeToUndo) => Ok(Outcome::plain("nothing to undo")),
        Err(HistoryError::NoChangeToRedo) => Ok(Outcome::plain("nothing to redo")),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
