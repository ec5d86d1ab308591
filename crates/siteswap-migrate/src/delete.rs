use siteswap_core::{RemoteError, RemotePath};
use siteswap_remote::RemoteTreeClient;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionStats {
    pub files_deleted: usize,
    pub directories_removed: usize,
}

/// Removes `dir` and everything below it with single-entry primitives, post-order.
///
/// The first failing primitive aborts the walk; whatever was already removed stays
/// removed.
pub fn delete_tree(
    client: &mut dyn RemoteTreeClient,
    dir: &RemotePath,
) -> Result<DeletionStats, RemoteError> {
    let mut stats = DeletionStats::default();
    delete_tree_recursive(client, dir, &mut stats)?;
    tracing::debug!(
        path = %dir,
        files = stats.files_deleted,
        directories = stats.directories_removed,
        "deleted remote tree"
    );
    Ok(stats)
}

fn delete_tree_recursive(
    client: &mut dyn RemoteTreeClient,
    dir: &RemotePath,
    stats: &mut DeletionStats,
) -> Result<(), RemoteError> {
    let entries = client.list_directory(dir)?;
    for file in entries.iter().filter(|entry| !entry.is_directory) {
        client.delete_file(&dir.join(&file.name))?;
        stats.files_deleted += 1;
    }
    for child in entries.iter().filter(|entry| entry.is_directory) {
        delete_tree_recursive(client, &dir.join(&child.name), stats)?;
    }
    client.remove_directory(dir)?;
    stats.directories_removed += 1;
    Ok(())
}
