//! Version-control backup of the archive root.
//!
//! Runs after a successful sync when enabled: stages everything in the
//! archive repository (untracked files included), commits with a
//! timestamped message, and pushes to `origin`. The caller reports
//! failures; they never abort the process.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use git2::{Cred, IndexAddOption, PushOptions, RemoteCallbacks, Repository, StatusOptions};
use tracing::info;

pub fn commit_and_push(archive_dir: &Path) -> Result<()> {
    let repo = Repository::open(archive_dir)
        .with_context(|| format!("{} is not a git repository", archive_dir.display()))?;

    if !commit_archive(&repo)? {
        info!("archive unchanged, nothing to back up");
        return Ok(());
    }
    push_to_origin(&repo)
}

/// Stage and commit every change under the archive root. Returns false
/// when the working tree is already clean.
fn commit_archive(repo: &Repository) -> Result<bool> {
    let mut status_opts = StatusOptions::new();
    status_opts.include_untracked(true);
    if repo.statuses(Some(&mut status_opts))?.is_empty() {
        return Ok(false);
    }

    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let signature = repo.signature()?;
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    let message = format!(
        "Message archive update {}",
        Local::now().format("%d/%m/%Y %H:%M:%S")
    );
    repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &parents)?;
    Ok(true)
}

fn push_to_origin(repo: &Repository) -> Result<()> {
    let branch = repo.head()?.shorthand().unwrap_or("master").to_string();
    let config = repo.config()?;

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, _allowed| {
        Cred::credential_helper(&config, url, username)
    });
    let mut options = PushOptions::new();
    options.remote_callbacks(callbacks);

    let mut remote = repo.find_remote("origin")?;
    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    remote
        .push(&[refspec.as_str()], Some(&mut options))
        .context("failed to push archive to origin")?;
    info!(%branch, "archive pushed to origin");
    Ok(())
}
