use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::{SortDirection, SortKey};

#[derive(Parser)]
#[command(name = "tl", about = concat!("tally v", env!("CARGO_PKG_VERSION"), " - named counters in colored groups"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "workspace-dir", global = true)]
    pub workspace_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a workspace in the current directory
    Init(InitArgs),
    /// Add an item
    Add(AddArgs),
    /// List items, sorted, filtered and grouped
    List(ListArgs),
    /// Show an item and its groups
    Show(ItemArg),
    /// Rename an item
    Rename(RenameArgs),
    /// Add one to an item's count
    Inc(ItemArg),
    /// Subtract one from an item's count (stops at zero)
    Dec(ItemArg),
    /// Set an item's count
    Set(SetArgs),
    /// Delete an item
    Rm(ItemArg),
    /// Change which groups an item belongs to
    Member(MemberArgs),
    /// List groups with member counts and totals
    Groups,
    /// Group management
    Group(GroupCmd),
    /// Search item and group names by regex
    Search(SearchArgs),
    /// Show or change the default view
    View(ViewArgs),
    /// Validate store integrity
    Check,
    /// Re-render the list whenever the store changes
    Watch(ListArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

fn parse_sort_key(s: &str) -> Result<SortKey, String> {
    SortKey::parse_key(s).ok_or_else(|| format!("unknown sort key '{s}' (expected: name, count)"))
}

fn parse_direction(s: &str) -> Result<SortDirection, String> {
    SortDirection::parse_direction(s)
        .ok_or_else(|| format!("unknown direction '{s}' (expected: ascending, descending)"))
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Workspace name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Rewrite tally.toml even if the workspace exists (the store is kept)
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ItemArg {
    /// Item id or name
    pub item: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Item name
    pub name: String,
    /// Initial count
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub count: i64,
    /// Group to put the item in, created if it does not exist (repeatable)
    #[arg(long = "group", short = 'g')]
    pub groups: Vec<String>,
}

#[derive(Args)]
pub struct RenameArgs {
    /// Item id or name
    pub item: String,
    /// New name
    pub name: String,
}

#[derive(Args)]
pub struct SetArgs {
    /// Item id or name
    pub item: String,
    /// New count
    #[arg(allow_negative_numbers = true)]
    pub count: i64,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only items whose name contains this text (case-insensitive)
    #[arg(long, short = 's')]
    pub search: Option<String>,
    /// Sort key: name or count (default from tally.toml)
    #[arg(long, value_parser = parse_sort_key)]
    pub sort: Option<SortKey>,
    /// Sort descending
    #[arg(long, conflicts_with = "asc")]
    pub desc: bool,
    /// Sort ascending
    #[arg(long)]
    pub asc: bool,
    /// Only members of this group (implies a flat list)
    #[arg(long, short = 'g')]
    pub group: Option<String>,
    /// Do not group under headings
    #[arg(long)]
    pub flat: bool,
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MemberAction {
    Add,
    Rm,
    Toggle,
}

#[derive(Args)]
pub struct MemberArgs {
    /// Item id or name
    pub item: String,
    /// What to do
    #[arg(value_enum)]
    pub action: MemberAction,
    /// Group id or name
    pub group: String,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct GroupCmd {
    #[command(subcommand)]
    pub action: GroupAction,
}

#[derive(Subcommand)]
pub enum GroupAction {
    /// Create a group
    New(GroupNewArgs),
    /// Rename a group
    Rename(GroupRenameArgs),
    /// Change a group's color (omit to pick the next free one)
    Color(GroupColorArgs),
    /// Delete a group (its items are kept)
    Rm(GroupArg),
}

#[derive(Args)]
pub struct GroupArg {
    /// Group id or name
    pub group: String,
}

#[derive(Args)]
pub struct GroupNewArgs {
    /// Group name
    pub name: String,
    /// Hex color, e.g. "#FF5733" (default: next free palette color)
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct GroupRenameArgs {
    /// Group id or name
    pub group: String,
    /// New name
    pub name: String,
}

#[derive(Args)]
pub struct GroupColorArgs {
    /// Group id or name
    pub group: String,
    /// Hex color
    pub color: Option<String>,
}

// ---------------------------------------------------------------------------
// Search, view, recovery
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
    /// Match case-insensitively
    #[arg(short = 'i', long)]
    pub ignore_case: bool,
}

#[derive(Args)]
pub struct ViewArgs {
    /// Default sort key: name or count
    #[arg(long, value_parser = parse_sort_key)]
    pub sort: Option<SortKey>,
    /// Default direction: ascending or descending
    #[arg(long, value_parser = parse_direction)]
    pub direction: Option<SortDirection>,
    /// Reverse the saved default direction
    #[arg(long, conflicts_with = "direction")]
    pub flip: bool,
    /// Group under headings by default
    #[arg(long)]
    pub grouped: Option<bool>,
}

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (RFC 3339; default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
