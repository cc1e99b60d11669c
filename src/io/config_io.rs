use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::{DocumentMut, Item, Table, value};

use crate::io::recovery::atomic_write;
use crate::io::store_io::{CONFIG_FILE, StoreError};
use crate::model::config::{TallyConfig, ViewDefaults};

fn config_path(tally_dir: &Path) -> PathBuf {
    tally_dir.join(CONFIG_FILE)
}

fn read_config_text(tally_dir: &Path) -> Result<String, StoreError> {
    let path = config_path(tally_dir);
    fs::read_to_string(&path).map_err(|source| StoreError::ReadError { path, source })
}

pub fn load_config(tally_dir: &Path) -> Result<TallyConfig, StoreError> {
    Ok(toml::from_str(&read_config_text(tally_dir)?)?)
}

/// Read the config both parsed and as a `toml_edit` document, so edits keep
/// the user's comments and layout.
pub fn read_config(tally_dir: &Path) -> Result<(TallyConfig, DocumentMut), StoreError> {
    let text = read_config_text(tally_dir)?;
    let config: TallyConfig = toml::from_str(&text)?;
    let doc: DocumentMut = text.parse()?;
    Ok((config, doc))
}

pub fn write_config(tally_dir: &Path, doc: &DocumentMut) -> Result<(), StoreError> {
    atomic_write(&config_path(tally_dir), doc.to_string().as_bytes())?;
    Ok(())
}

/// Set every key of the `[view]` table, creating the table if needed.
pub fn set_view_defaults(doc: &mut DocumentMut, view: &ViewDefaults) {
    if !doc.contains_table("view") {
        doc["view"] = Item::Table(Table::new());
    }
    doc["view"]["sort"] = value(view.sort.as_str());
    doc["view"]["direction"] = value(view.direction.as_str());
    doc["view"]["grouped"] = value(view.grouped);
}
