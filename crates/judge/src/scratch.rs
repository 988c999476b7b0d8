use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{JudgeError, Result};

/// 一次提交独占的临时目录，内含唯一的源文件。
///
/// 目录在 `Drop` 时整体删除，无论判题成功、出错还是发生 panic。
#[derive(Debug)]
pub struct ScratchDir {
    dir: PathBuf,
    source: PathBuf,
}

impl ScratchDir {
    pub fn create(root: &Path, file_name: &str, contents: &[u8]) -> Result<Self> {
        if file_name.is_empty() || Path::new(file_name).components().count() != 1 {
            return Err(JudgeError::Scratch(format!(
                "source file name must be a single path component: {file_name:?}"
            )));
        }

        fs::create_dir_all(root).map_err(|e| {
            JudgeError::Scratch(format!("failed to create scratch root {}: {e}", root.display()))
        })?;
        // Commands run with the scratch directory as cwd, so every path handed out is absolute.
        let root = std::path::absolute(root).map_err(|e| {
            JudgeError::Scratch(format!("failed to resolve {}: {e}", root.display()))
        })?;

        let dir = root.join(Uuid::new_v4().to_string());
        // create_dir fails if the name is taken, so the directory is ours alone.
        fs::create_dir(&dir).map_err(|e| {
            JudgeError::Scratch(format!("failed to create {}: {e}", dir.display()))
        })?;

        let scratch = Self {
            source: dir.join(file_name),
            dir,
        };
        fs::write(&scratch.source, contents).map_err(|e| {
            JudgeError::Scratch(format!("failed to write {}: {e}", scratch.source.display()))
        })?;

        debug!(dir = %scratch.dir.display(), "scratch directory created");
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path for build artifacts inside the scratch directory.
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(dir = %self.dir.display(), "scratch directory removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                dir = %self.dir.display(),
                error = %err,
                "failed to remove scratch directory"
            ),
        }
    }
}
