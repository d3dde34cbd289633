use crate::util::errors::QuillResult;
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Scratch directories under `{root}/{session_id}` holding uploads.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    root: PathBuf,
}

impl Default for SessionStorage {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("quill"))
    }
}

impl SessionStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(sanitize_file_name(session_id))
    }

    pub fn create(&self, session_id: &str) -> QuillResult<PathBuf> {
        let dir = self.session_dir(session_id);
        std::fs::create_dir_all(&dir)?;
        debug!("Session directory ready: {}", dir.display());
        Ok(dir)
    }

    pub fn remove(&self, session_id: &str) {
        let dir = self.session_dir(session_id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!("Removed session directory: {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove session directory: path={}, error={}",
                dir.display(),
                e
            ),
        }
    }

    /// Write uploaded bytes into the session directory and return the path.
    pub async fn save_upload(
        &self,
        session_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> QuillResult<PathBuf> {
        let dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(sanitize_file_name(file_name));
        tokio::fs::write(&path, bytes).await?;
        debug!(
            "Saved upload: session_id={}, path={}, bytes={}",
            session_id,
            path.display(),
            bytes.len()
        );
        Ok(path)
    }
}

/// Final path component with anything outside `[A-Za-z0-9._ -]` replaced.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\RFI 2024.csv"), "RFI 2024.csv");
        assert_eq!(sanitize_file_name("q&a?.html"), "q_a_.html");
        assert_eq!(sanitize_file_name("..."), "upload");
    }

    #[tokio::test]
    async fn saves_and_removes_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(dir.path());
        storage.create("s1").unwrap();
        let path = storage.save_upload("s1", "questions.csv", b"Question\nA?").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Question\nA?");
        storage.remove("s1");
        assert!(!storage.session_dir("s1").exists());
    }
}
