use chunkferry_protocol::constants::{
    LOCAL_BATCH_RENAME_PATH, LOCAL_BUILD_INDEX_PATH, LOCAL_DECRYPT_PATH, LOCAL_DRIVES_PATH,
    LOCAL_ENCRYPT_PATH, LOCAL_FILE_TREE_PATH, LOCAL_OPEN_DIR_PATH, LOCAL_SEARCH_PATH,
};
use chunkferry_protocol::{FileNode, IndexResult, RenameFile};
use chunkferry_transport::{Form, HttpTransport, Request, TransportError};
use tracing::{debug, info};

/// Shape of a [`LocalFilesApi::file_tree`] listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeQuery {
    pub show_files: bool,
    pub show_folders: bool,
    /// Levels below the root to descend. 0 means unlimited.
    pub max_depth: u32,
}

impl Default for TreeQuery {
    fn default() -> Self {
        Self {
            show_files: true,
            show_folders: true,
            max_depth: 1,
        }
    }
}

/// Client for the backend host's own filesystem: drive listing, the
/// keyword index, directory trees, file encryption and batch renames.
///
/// Paths are absolute paths on the backend host, not on this machine.
#[derive(Clone)]
pub struct LocalFilesApi {
    transport: HttpTransport,
}

impl LocalFilesApi {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Drive roots, e.g. `C:\` or `/`.
    pub async fn drives(&self) -> Result<Vec<String>, TransportError> {
        let drives = self
            .transport
            .send::<Vec<String>>(Request::get(LOCAL_DRIVES_PATH))
            .await?;
        Ok(drives.unwrap_or_default())
    }

    /// Rebuilds the search index over `drives`.
    pub async fn build_index(&self, drives: &[String]) -> Result<IndexResult, TransportError> {
        let req = Request::post(LOCAL_BUILD_INDEX_PATH).json(&drives)?;
        let result: IndexResult = self.transport.fetch(req).await?;
        info!(
            files = result.indexed_file_count,
            millis = result.index_time,
            "host index rebuilt"
        );
        Ok(result)
    }

    /// Indexed paths matching `keyword`.
    pub async fn search(&self, keyword: &str) -> Result<Vec<String>, TransportError> {
        let hits = self
            .transport
            .send::<Vec<String>>(Request::get(LOCAL_SEARCH_PATH).query("keyword", keyword))
            .await?
            .unwrap_or_default();
        debug!(keyword, hits = hits.len(), "host search");
        Ok(hits)
    }

    /// Directory tree under `path`. `None` when `path` is not a directory.
    pub async fn file_tree(
        &self,
        path: &str,
        query: TreeQuery,
    ) -> Result<Option<FileNode>, TransportError> {
        let req = Request::get(LOCAL_FILE_TREE_PATH)
            .query("path", path)
            .query("showFiles", query.show_files)
            .query("showFolders", query.show_folders)
            .query("maxDepth", query.max_depth);
        self.transport.send(req).await
    }

    /// Opens `dir` in the host's file manager.
    pub async fn open_dir(&self, dir: &str) -> Result<(), TransportError> {
        let form = Form::new().text("dir", dir);
        self.transport
            .execute(Request::post(LOCAL_OPEN_DIR_PATH).form(form))
            .await
    }

    /// Encrypts `file_path` next to itself and returns the new file's path.
    pub async fn encrypt(&self, file_path: &str, password: &str) -> Result<String, TransportError> {
        let out = self.crypt(LOCAL_ENCRYPT_PATH, file_path, password).await?;
        info!(file = file_path, output = %out, "file encrypted");
        Ok(out)
    }

    /// Reverses [`encrypt`](Self::encrypt) and returns the restored path.
    pub async fn decrypt(&self, file_path: &str, password: &str) -> Result<String, TransportError> {
        let out = self.crypt(LOCAL_DECRYPT_PATH, file_path, password).await?;
        info!(file = file_path, output = %out, "file decrypted");
        Ok(out)
    }

    /// Applies every rename or none of them.
    pub async fn batch_rename(&self, renames: &[RenameFile]) -> Result<(), TransportError> {
        let req = Request::post(LOCAL_BATCH_RENAME_PATH).json(&renames)?;
        self.transport.execute(req).await?;
        info!(count = renames.len(), "files renamed");
        Ok(())
    }

    async fn crypt(&self, path: &str, file_path: &str, password: &str) -> Result<String, TransportError> {
        let form = Form::new()
            .text("filePath", file_path)
            .text("password", password);
        self.transport.fetch(Request::post(path).form(form)).await
    }
}
