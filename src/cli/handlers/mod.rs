mod init;
pub use init::cmd_init;

use std::error::Error;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::lock::FileLock;
use crate::io::recovery;
use crate::io::store_io::{self, FileBackend, StoreError, TALLY_DIR, Workspace};
use crate::io::watcher::StoreWatcher;
use crate::model::config::TallyConfig;
use crate::model::store::{Store, names_match};
use crate::model::{GroupId, ItemId, SortDirection, ViewConfig};
use crate::ops::projection::{group_summaries, project, ungrouped_items};
use crate::ops::{OpError, check, search};
use crate::session::Session;

type CmdResult = Result<(), Box<dyn Error>>;

const DEFAULT_RECOVERY_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let ctx = Context::new(cli.workspace_dir.as_deref(), cli.json)?;

    match cli.command {
        Commands::Init(args) => cmd_init(&ctx, args),

        // Read commands
        Commands::List(args) => cmd_list(&ctx, &args),
        Commands::Show(args) => cmd_show(&ctx, args),
        Commands::Groups => cmd_groups(&ctx),
        Commands::Search(args) => cmd_search(&ctx, args),
        Commands::Check => cmd_check(&ctx),
        Commands::Watch(args) => cmd_watch(&ctx, &args),

        // Write commands
        Commands::Add(args) => cmd_add(&ctx, args),
        Commands::Rename(args) => cmd_rename(&ctx, args),
        Commands::Inc(args) => cmd_inc(&ctx, args),
        Commands::Dec(args) => cmd_dec(&ctx, args),
        Commands::Set(args) => cmd_set(&ctx, args),
        Commands::Rm(args) => cmd_rm(&ctx, args),
        Commands::Member(args) => cmd_member(&ctx, args),
        Commands::Group(cmd) => cmd_group(&ctx, cmd.action),

        // Configuration and maintenance
        Commands::View(args) => cmd_view(&ctx, args),
        Commands::Recovery(cmd) => cmd_recovery(&ctx, cmd),
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-invocation settings shared by every handler.
pub struct Context {
    /// Resolved `-C` directory, if given
    dir: Option<PathBuf>,
    pub json: bool,
}

/// A locked workspace with a session ready to mutate it. The lock is
/// released when this is dropped, after the session.
struct WriteSession {
    session: Session<FileBackend>,
    tally_dir: PathBuf,
    _lock: FileLock,
}

impl Context {
    fn new(dir: Option<&str>, json: bool) -> Result<Self, Box<dyn Error>> {
        let dir = match dir {
            Some(dir) => Some(
                std::fs::canonicalize(dir)
                    .map_err(|e| format!("cannot resolve -C path '{dir}': {e}"))?,
            ),
            None => None,
        };
        Ok(Context { dir, json })
    }

    /// The directory commands start from: `-C` or the current directory.
    fn start_dir(&self) -> Result<PathBuf, StoreError> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn tally_dir(&self) -> Result<PathBuf, StoreError> {
        Ok(store_io::discover_workspace(&self.start_dir()?)?.join(TALLY_DIR))
    }

    fn load(&self) -> Result<Workspace, StoreError> {
        store_io::load_workspace(&store_io::discover_workspace(&self.start_dir()?)?)
    }

    /// Lock, then load, so the state we mutate is the state on disk.
    fn open(&self) -> Result<WriteSession, Box<dyn Error>> {
        let root = store_io::discover_workspace(&self.start_dir()?)?;
        let lock = FileLock::acquire_default(&root.join(TALLY_DIR))?;
        let ws = store_io::load_workspace(&root)?;
        let backend = ws.backend();
        Ok(WriteSession {
            session: Session::new(ws.store, backend),
            tally_dir: ws.tally_dir,
            _lock: lock,
        })
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> CmdResult {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `7` or `#7`
fn parse_id(key: &str) -> Option<u32> {
    key.strip_prefix('#').unwrap_or(key).parse().ok()
}

/// Look an item up by id, then by name (case-insensitive). Item names are
/// not unique, so a name shared by several items is rejected.
fn resolve_item(store: &Store, key: &str) -> Result<ItemId, Box<dyn Error>> {
    if let Some(id) = parse_id(key).map(ItemId)
        && store.item(id).is_some()
    {
        return Ok(id);
    }
    match store.find_items(|item| names_match(&item.name, key)).as_slice() {
        [] => Err(format!("item not found: {key}").into()),
        [item] => Ok(item.id),
        many => {
            let ids: Vec<String> = many.iter().map(|item| format!("#{}", item.id)).collect();
            Err(format!("\"{key}\" matches {} items ({}); use an id", many.len(), ids.join(", ")).into())
        }
    }
}

fn resolve_group(store: &Store, key: &str) -> Result<GroupId, Box<dyn Error>> {
    if let Some(id) = parse_id(key).map(GroupId)
        && store.group(id).is_some()
    {
        return Ok(id);
    }
    store
        .group_by_name(key)
        .map(|group| group.id)
        .ok_or_else(|| format!("group not found: {key}").into())
}

/// Merge list flags over the `[view]` defaults from tally.toml.
fn build_view(store: &Store, config: &TallyConfig, args: &ListArgs) -> Result<ViewConfig, Box<dyn Error>> {
    let mut view = config.view.to_view_config();
    if let Some(ref search) = args.search {
        view.search_text = search.clone();
    }
    if let Some(sort) = args.sort {
        view.sort_key = sort;
    }
    if args.desc {
        view.direction = SortDirection::Descending;
    } else if args.asc {
        view.direction = SortDirection::Ascending;
    }
    if let Some(ref group) = args.group {
        view.group_filter = Some(resolve_group(store, group)?);
    }
    if args.flat {
        view.grouped = false;
    }
    Ok(view)
}

fn print_item(ctx: &Context, store: &Store, id: ItemId) -> CmdResult {
    let item = store.item(id).ok_or(OpError::ItemNotFound(id))?;
    if ctx.json {
        ctx.print_json(&item_to_json(store, item))
    } else {
        println!("{}: {}", item.name, item.count);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn render_list(ctx: &Context, ws: &Workspace, args: &ListArgs) -> CmdResult {
    let view = build_view(&ws.store, &ws.config, args)?;
    let projection = project(&ws.store, &view);
    if ctx.json {
        return ctx.print_json(&projection_to_json(&ws.store, &projection));
    }
    for line in format_projection(&ws.store, &projection) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_list(ctx: &Context, args: &ListArgs) -> CmdResult {
    let ws = ctx.load()?;
    render_list(ctx, &ws, args)
}

fn cmd_show(ctx: &Context, args: ItemArg) -> CmdResult {
    let ws = ctx.load()?;
    let id = resolve_item(&ws.store, &args.item)?;
    let item = ws.store.item(id).ok_or(OpError::ItemNotFound(id))?;
    if ctx.json {
        return ctx.print_json(&item_to_json(&ws.store, item));
    }
    for line in format_item_detail(&ws.store, item) {
        println!("{line}");
    }
    Ok(())
}

#[derive(Serialize)]
struct GroupsJson {
    groups: Vec<GroupJson>,
    ungrouped: Vec<ItemId>,
}

fn cmd_groups(ctx: &Context) -> CmdResult {
    let ws = ctx.load()?;
    let summaries = group_summaries(&ws.store);
    let ungrouped = ungrouped_items(&ws.store);

    if ctx.json {
        let groups = summaries
            .iter()
            .filter_map(|s| ws.store.group(s.group).map(|g| group_to_json(g, Some(s))))
            .collect();
        return ctx.print_json(&GroupsJson { groups, ungrouped });
    }

    for line in format_group_lines(&ws.store, &summaries) {
        println!("{line}");
    }
    if !ungrouped.is_empty() {
        println!("({} ungrouped)", ungrouped.len());
    }
    Ok(())
}

fn cmd_search(ctx: &Context, args: SearchArgs) -> CmdResult {
    let ws = ctx.load()?;
    let re = RegexBuilder::new(&args.pattern)
        .case_insensitive(args.ignore_case)
        .build()?;
    let hits = search::search_store(&ws.store, &re);

    if ctx.json {
        let hits: Vec<SearchHitJson> = hits.iter().map(|h| search_hit_to_json(&ws.store, h)).collect();
        return ctx.print_json(&hits);
    }
    for line in hits.iter().filter_map(|h| format_search_hit(&ws.store, h)) {
        println!("{line}");
    }
    Ok(())
}

/// Reads the raw store file, so problems that loading would repair are still
/// visible.
fn cmd_check(ctx: &Context) -> CmdResult {
    let tally_dir = ctx.tally_dir()?;
    let file = store_io::read_store_file(&tally_dir)?;
    let result = check::check_store_file(&file);

    if ctx.json {
        return ctx.print_json(&result);
    }
    for line in format_check_result(&result) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_watch(ctx: &Context, args: &ListArgs) -> CmdResult {
    let tally_dir = ctx.tally_dir()?;
    let watcher = StoreWatcher::start(&tally_dir)?;
    let clear = !ctx.json && std::io::stdout().is_terminal();

    let render = || -> CmdResult {
        let ws = ctx.load()?;
        if clear {
            print!("\x1b[2J\x1b[H");
        }
        if ctx.json {
            let view = build_view(&ws.store, &ws.config, args)?;
            let projection = project(&ws.store, &view);
            println!("{}", serde_json::to_string(&projection_to_json(&ws.store, &projection))?);
            Ok(())
        } else {
            render_list(ctx, &ws, args)
        }
    };

    render()?;
    while let Some(changes) = watcher.wait(Duration::from_secs(1)) {
        if changes.is_empty() {
            continue;
        }
        // A store another process is halfway through fixing by hand should
        // not end the watch.
        if let Err(e) = render() {
            eprintln!("warning: {e}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(ctx: &Context, args: AddArgs) -> CmdResult {
    let mut ws = ctx.open()?;
    let item = ws
        .session
        .create_item_in_groups(&args.name, args.count, &args.groups)?;

    if ctx.json {
        return ctx.print_json(&item_to_json(ws.session.store(), &item));
    }
    println!("{}", item.id);
    Ok(())
}

fn cmd_rename(ctx: &Context, args: RenameArgs) -> CmdResult {
    let mut ws = ctx.open()?;
    let id = resolve_item(ws.session.store(), &args.item)?;
    ws.session.rename_item(id, &args.name)?;
    print_item(ctx, ws.session.store(), id)
}

fn cmd_inc(ctx: &Context, args: ItemArg) -> CmdResult {
    let mut ws = ctx.open()?;
    let id = resolve_item(ws.session.store(), &args.item)?;
    ws.session.increment(id)?;
    print_item(ctx, ws.session.store(), id)
}

fn cmd_dec(ctx: &Context, args: ItemArg) -> CmdResult {
    let mut ws = ctx.open()?;
    let id = resolve_item(ws.session.store(), &args.item)?;
    ws.session.decrement(id)?;
    print_item(ctx, ws.session.store(), id)
}

fn cmd_set(ctx: &Context, args: SetArgs) -> CmdResult {
    let mut ws = ctx.open()?;
    let id = resolve_item(ws.session.store(), &args.item)?;
    ws.session.set_count(id, args.count)?;
    print_item(ctx, ws.session.store(), id)
}

fn cmd_rm(ctx: &Context, args: ItemArg) -> CmdResult {
    let mut ws = ctx.open()?;
    let id = resolve_item(ws.session.store(), &args.item)?;
    let groups = group_names(ws.session.store(), id);

    let item = ws.session.delete_item(id)?;
    recovery::log_item_deletion(&ws.tally_dir, &item.name, item.count, &groups);

    if ctx.json {
        return ctx.print_json(&ItemJson {
            id: item.id,
            name: item.name,
            count: item.count,
            groups,
        });
    }
    println!("deleted {} (#{})", item.name, item.id);
    Ok(())
}

fn cmd_member(ctx: &Context, args: MemberArgs) -> CmdResult {
    let mut ws = ctx.open()?;
    let item = resolve_item(ws.session.store(), &args.item)?;
    let group = resolve_group(ws.session.store(), &args.group)?;

    match args.action {
        MemberAction::Add => {
            ws.session.add_membership(item, group)?;
        }
        MemberAction::Rm => {
            ws.session.remove_membership(item, group)?;
        }
        MemberAction::Toggle => {
            ws.session.toggle_membership(item, group)?;
        }
    }

    let store = ws.session.store();
    if ctx.json {
        return ctx.print_json(&item_to_json(store, store.item(item).ok_or(OpError::ItemNotFound(item))?));
    }
    let item_name = store.item(item).map(|i| i.name.as_str()).unwrap_or_default();
    let group_name = store.group(group).map(|g| g.name.as_str()).unwrap_or_default();
    if store.is_member(item, group) {
        println!("{item_name} is in {group_name}");
    } else {
        println!("{item_name} is not in {group_name}");
    }
    Ok(())
}

fn cmd_group(ctx: &Context, action: GroupAction) -> CmdResult {
    let mut ws = ctx.open()?;

    let group = match action {
        GroupAction::New(args) => ws.session.create_group(&args.name, args.color.as_deref())?,
        GroupAction::Rename(args) => {
            let id = resolve_group(ws.session.store(), &args.group)?;
            ws.session.rename_group(id, &args.name)?
        }
        GroupAction::Color(args) => {
            let id = resolve_group(ws.session.store(), &args.group)?;
            ws.session.recolor_group(id, args.color.as_deref())?;
            ws.session
                .store()
                .group(id)
                .cloned()
                .ok_or(OpError::GroupNotFound(id))?
        }
        GroupAction::Rm(args) => {
            let id = resolve_group(ws.session.store(), &args.group)?;
            let store = ws.session.store();
            let members: Vec<String> = store
                .members_of(id)
                .into_iter()
                .filter_map(|item| store.item(item).map(|i| i.name.clone()))
                .collect();

            let group = ws.session.delete_group(id)?;
            recovery::log_group_deletion(&ws.tally_dir, &group.name, &group.color, &members);
            if ctx.json {
                return ctx.print_json(&group_to_json(&group, None));
            }
            println!("deleted group {} (#{})", group.name, group.id);
            return Ok(());
        }
    };

    if ctx.json {
        return ctx.print_json(&group_to_json(&group, None));
    }
    println!("#{}  {}  {}", group.id, group.name, group.color);
    Ok(())
}

// ---------------------------------------------------------------------------
// Configuration and maintenance
// ---------------------------------------------------------------------------

fn cmd_view(ctx: &Context, args: ViewArgs) -> CmdResult {
    let tally_dir = ctx.tally_dir()?;
    let changing =
        args.sort.is_some() || args.direction.is_some() || args.flip || args.grouped.is_some();

    let defaults = if changing {
        let _lock = FileLock::acquire_default(&tally_dir)?;
        let (config, mut doc) = config_io::read_config(&tally_dir)?;
        let mut view = config.view;
        if let Some(sort) = args.sort {
            view.sort = sort;
        }
        if let Some(direction) = args.direction {
            view.direction = direction;
        }
        if args.flip {
            view.direction.toggle();
        }
        if let Some(grouped) = args.grouped {
            view.grouped = grouped;
        }
        config_io::set_view_defaults(&mut doc, &view);
        config_io::write_config(&tally_dir, &doc)?;
        view
    } else {
        config_io::load_config(&tally_dir)?.view
    };

    if ctx.json {
        return ctx.print_json(&defaults);
    }
    println!("sort = {}", defaults.sort);
    println!("direction = {}", defaults.direction);
    println!("grouped = {}", defaults.grouped);
    Ok(())
}

fn parse_before(s: &str) -> Result<DateTime<Utc>, Box<dyn Error>> {
    let stamp = DateTime::parse_from_rfc3339(s)
        .map_err(|e| format!("invalid --before timestamp '{s}' (expected RFC 3339): {e}"))?;
    Ok(stamp.with_timezone(&Utc))
}

fn cmd_recovery(ctx: &Context, cmd: RecoveryCmd) -> CmdResult {
    let tally_dir = ctx.tally_dir()?;

    match cmd.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(&tally_dir).display());
            Ok(())
        }
        // prune_recovery takes the workspace lock itself
        Some(RecoveryAction::Prune(args)) => {
            let before = args.before.as_deref().map(parse_before).transpose()?;
            let removed = recovery::prune_recovery(&tally_dir, before, args.all)?;
            println!("pruned {removed} entries");
            Ok(())
        }
        None => show_recovery(ctx, &tally_dir, cmd.limit.unwrap_or(DEFAULT_RECOVERY_LIMIT)),
    }
}

fn show_recovery(ctx: &Context, tally_dir: &Path, limit: usize) -> CmdResult {
    let entries = recovery::read_recovery_entries(tally_dir, Some(limit));
    if ctx.json {
        return ctx.print_json(&entries);
    }
    if entries.is_empty() {
        println!("recovery log is empty");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_recovery_entry(entry));
        for (key, value) in &entry.fields {
            println!("    {key}: {value}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> Store {
        let mut store = Store::new();
        store.insert_item("Coffee".into(), 1).unwrap();
        store.insert_item("Laps".into(), 2).unwrap();
        store.insert_item("laps".into(), 3).unwrap();
        store.insert_item("7".into(), 0).unwrap();
        store.insert_group("Drinks".into(), "#FF5733".into()).unwrap();
        store
    }

    #[test]
    fn items_resolve_by_id_or_name() {
        let store = store();
        assert_eq!(resolve_item(&store, "1").unwrap(), ItemId(1));
        assert_eq!(resolve_item(&store, "#2").unwrap(), ItemId(2));
        assert_eq!(resolve_item(&store, "coffee").unwrap(), ItemId(1));
        // No item #7 exists, so the name wins
        assert_eq!(resolve_item(&store, "7").unwrap(), ItemId(4));
    }

    #[test]
    fn ambiguous_item_names_are_rejected() {
        let store = store();
        let err = resolve_item(&store, "LAPS").unwrap_err().to_string();
        assert_eq!(err, "\"LAPS\" matches 2 items (#2, #3); use an id");
        assert!(resolve_item(&store, "Tea").is_err());
    }

    #[test]
    fn groups_resolve_by_id_or_name() {
        let store = store();
        assert_eq!(resolve_group(&store, "drinks").unwrap(), GroupId(1));
        assert_eq!(resolve_group(&store, "#1").unwrap(), GroupId(1));
        assert!(resolve_group(&store, "Food").is_err());
    }

    #[test]
    fn list_flags_override_config_defaults() {
        let store = store();
        let config: TallyConfig = toml::from_str(
            "[workspace]\nname = \"t\"\n[view]\nsort = \"count\"\ndirection = \"descending\"\n",
        )
        .unwrap();
        let args = ListArgs {
            search: Some("a".into()),
            sort: None,
            desc: false,
            asc: true,
            group: Some("Drinks".into()),
            flat: false,
        };
        let view = build_view(&store, &config, &args).unwrap();
        assert_eq!(view.sort_key, crate::model::SortKey::Count);
        assert_eq!(view.direction, SortDirection::Ascending);
        assert_eq!(view.group_filter, Some(GroupId(1)));
        assert_eq!(view.search_text, "a");
        assert!(view.grouped);
    }

    #[test]
    fn before_accepts_rfc3339_only() {
        assert!(parse_before("2026-01-02T03:04:05Z").is_ok());
        assert!(parse_before("yesterday").is_err());
    }
}
