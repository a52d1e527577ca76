use std::path::Path;

use anyhow::Result;

use gitterlog_core::{ArchiveStore, Config};

use crate::ui;

pub fn run(config_path: &Path, json: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let store = ArchiveStore::new(&config.archive_dir);
    let rooms = store.list_rooms()?;

    if json {
        let mut entries = Vec::new();
        for uri in &rooms {
            entries.push(serde_json::json!({
                "room": uri,
                "archived": store.load(uri)?.len(),
                "indexed": store.load_ledger(uri)?.len(),
            }));
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if rooms.is_empty() {
        ui::info("No rooms archived yet. Run: gitterlog sync");
        return Ok(());
    }

    for uri in &rooms {
        let archived = store.load(uri)?.len();
        let indexed = store.load_ledger(uri)?.len();
        let marker = if archived == indexed {
            ""
        } else {
            "  (ledger out of step!)"
        };
        ui::info(&format!("{uri}: {archived} archived / {indexed} indexed{marker}"));
    }
    Ok(())
}
