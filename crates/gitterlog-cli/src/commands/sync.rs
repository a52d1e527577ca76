use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use gitterlog_core::{
    ArchiveStore, Config, EsBackend, GitterClient, IndexingPipeline, RoomOutcome, SyncOrchestrator,
};

use crate::{backup, ui};

pub async fn run(config_path: &Path, no_index: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let token = config.resolve_token()?;

    let client = GitterClient::new(&config.api_url, token)?;
    let store = ArchiveStore::new(&config.archive_dir);
    let backend = EsBackend::new(&config.search_url, &config.index_name)
        .context("failed to build search backend client")?;
    let pipeline = IndexingPipeline::new(&backend, config.batch_size);
    let indexing = config.index && !no_index;

    let orchestrator = SyncOrchestrator::new(
        &client,
        &store,
        indexing.then_some(&pipeline),
        config.page_size,
    );

    let pb = ui::spinner("Syncing rooms");
    let report = match orchestrator.run().await {
        Ok(report) => {
            pb.finish_and_clear();
            report
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e.into());
        }
    };

    for outcome in &report.outcomes {
        match outcome {
            RoomOutcome::Synced {
                room,
                new_messages,
                total_messages,
                ..
            } => {
                if *new_messages > 0 {
                    ui::success(&format!(
                        "{room}: {new_messages} new messages ({total_messages} archived)"
                    ));
                } else {
                    ui::success(&format!("{room}: up to date"));
                }
            }
            RoomOutcome::Skipped { room, reason } => {
                ui::error(&format!("{room}: skipped ({reason})"));
            }
        }
    }

    let summary = &report.summary;
    ui::info(&format!(
        "{} rooms scanned, {} synced, {} skipped, {} new messages, {} documents indexed",
        summary.rooms_scanned,
        summary.rooms_synced,
        summary.rooms_skipped,
        summary.messages_archived,
        summary.documents_indexed
    ));

    if config.backup {
        match backup::commit_and_push(&config.archive_dir) {
            Ok(()) => ui::success("archive backed up"),
            Err(e) => {
                warn!(error = %e, "archive backup failed");
                ui::error(&format!("backup: {e}"));
            }
        }
    }

    Ok(())
}
