use crate::cli::commands::InitArgs;
use crate::io::store_io;

use super::Context;

const TALLY_TOML_TEMPLATE: &str = r##"[workspace]
name = "{name}"

# --- Default view ---
# Used by `tl list` and `tl watch` when no flag overrides it.
# Change with: tl view --sort count --direction descending

[view]
sort = "name"            # name | count
direction = "ascending"  # ascending | descending
grouped = true
"##;

/// Infer a workspace name from a directory name: hyphens and underscores
/// become spaces, words are title-cased.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a name for a TOML basic string.
fn toml_quote(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

fn render_tally_toml(name: &str) -> String {
    TALLY_TOML_TEMPLATE.replace("{name}", &toml_quote(name))
}

pub fn cmd_init(ctx: &Context, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let root = ctx.start_dir()?;

    // Check for an enclosing workspace and warn
    if let Some(parent) = root.parent()
        && let Ok(parent_root) = store_io::discover_workspace(parent)
    {
        eprintln!(
            "note: parent workspace found at {}/",
            parent_root.join(store_io::TALLY_DIR).display()
        );
    }

    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    });

    let tally_dir = store_io::create_workspace(&root, &render_tally_toml(&name), args.force)?;
    if ctx.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "name": name,
                "path": tally_dir,
            }))?
        );
    } else {
        println!("Initialized tally workspace: {name}");
    }
    Ok(())
}
