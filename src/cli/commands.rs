use clap::{Args, Parser, Subcommand};

use crate::model::config::SortPolicy;

#[derive(Parser)]
#[command(name = "chk", about = concat!("[x] checklist v", env!("CARGO_PKG_VERSION"), " - nested checklists in plain markdown"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Checklist file to read and write
    #[arg(short = 'f', long, global = true, default_value = "checklist.md")]
    pub file: String,

    /// Config file (default: checklist.toml beside the checklist)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Override the configured sort policy
    #[arg(long, global = true, value_enum)]
    pub sort: Option<SortPolicy>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the checklist (default)
    Show,
    #[command(flatten)]
    Change(ChangeCommand),
    /// Apply operations read from stdin, one per line (undo and redo allowed)
    Run,
}

/// Commands that edit the checklist. Positions are 1-based, as printed by `show`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ChangeCommand {
    /// Add an item (at the end unless --at is given)
    Add(AddArgs),
    /// Replace an item's text
    Edit(EditArgs),
    /// Delete an item
    Rm(RmArgs),
    /// Check an item (a parent checks its children too)
    Check(PosArgs),
    /// Uncheck an item
    Uncheck(PosArgs),
    /// Make an item a child of the item above it
    Indent(PosArgs),
    /// Make a child item a parent
    Outdent(OutdentArgs),
    /// Move an item (a parent moves with its children)
    Mv(MvArgs),
    /// Check every item
    CheckAll,
    /// Uncheck every item
    UncheckAll,
    /// Delete all checked items
    Clean,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    /// Item text
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
    /// Position to insert at
    #[arg(long)]
    pub at: Option<usize>,
    /// Add as a child of the item above
    #[arg(long)]
    pub child: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    /// Item position
    pub pos: usize,
    /// New text
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RmArgs {
    /// Item position
    pub pos: usize,
    /// Allow deleting the first item
    #[arg(long)]
    pub force: bool,
    /// Keep the item's children instead of deleting them with it
    #[arg(long)]
    pub keep_children: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PosArgs {
    /// Item position
    pub pos: usize,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct OutdentArgs {
    /// Item position
    pub pos: usize,
    /// Also make the following siblings parents
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct MvArgs {
    /// Position of the item to move
    pub from: usize,
    /// Target position
    pub to: usize,
    /// Number of rows to move
    #[arg(long, default_value_t = 1)]
    pub count: usize,
}

/// One line of `chk run` input
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
pub struct RunLine {
    #[command(subcommand)]
    pub op: RunOp,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RunOp {
    #[command(flatten)]
    Change(ChangeCommand),
    /// Revert the last change
    Undo,
    /// Re-apply the last undone change
    Redo,
    /// Print the checklist
    Show,
}

impl RunLine {
    /// Parse one line of input; blank lines and `#` comments yield `None`
    pub fn parse_line(line: &str) -> Result<Option<RunOp>, clap::Error> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let parsed = RunLine::try_parse_from(line.split_whitespace())?;
        Ok(Some(parsed.op))
    }
}
