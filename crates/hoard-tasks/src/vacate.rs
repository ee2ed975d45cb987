use std::fs;
use std::io;
use std::path::PathBuf;

use hoard_types::AFile;

use crate::config::Config;
use crate::error::TaskResult;
use crate::pack::pack_once;
use crate::session::Session;
use crate::upload::upload_once;

/// Pack every local download, including the current hour, and upload every
/// local archive. Afterwards the feed's workspace holds no data.
pub fn vacate(session: &Session) -> TaskResult<Vec<AFile>> {
    let packed = pack_once(session, None)?;
    tracing::info!(feed = %session.id(), archives = packed.len(), "packed all downloads");
    upload_once(session)
}

/// Delete local data after a vacate. With `whole_workspace` the workspace
/// root goes; otherwise only the directories of the configured feeds, so
/// other feeds sharing the workspace keep their data. Returns the paths
/// removed.
pub fn remove_local_data(config: &Config, whole_workspace: bool) -> TaskResult<Vec<PathBuf>> {
    let targets = if whole_workspace {
        vec![config.workspace_path.clone()]
    } else {
        config.feeds.iter().flat_map(|feed| config.feed_dirs(feed)).collect()
    };
    let mut removed = Vec::with_capacity(targets.len());
    for path in targets {
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed local data");
                removed.push(path);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(removed)
}
