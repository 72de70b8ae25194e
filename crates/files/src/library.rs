use chunkferry_protocol::constants::{
    ADD_SHARED_FILE_PATH, DELETE_FILE_PATH, ENABLE_SHARE_PATH, FILE_PAGE_PATH,
    SHARE_ADDRESS_PATH, SHARE_STATUS_PATH, SHARED_FILES_PATH, SSE_SUBSCRIBE_PATH,
    UNSHARE_FILE_PATH,
};
use chunkferry_protocol::{FileRecord, Page, ShareStatus, StorageType};
use chunkferry_transport::{Form, HttpTransport, Request, TransportError};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::{debug, info, warn};

use crate::notice::ServerNotice;

/// Filters for [`FilesApi::page_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based page index.
    pub page: u32,
    pub page_size: u32,
    pub storage_type: StorageType,
    /// Substring match on the stored file name.
    pub file_name: Option<String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            storage_type: StorageType::Local,
            file_name: None,
        }
    }
}

impl PageQuery {
    pub fn new(storage_type: StorageType) -> Self {
        Self {
            storage_type,
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.file_name = (!name.is_empty()).then_some(name);
        self
    }
}

/// Client for the stored-file library and LAN sharing.
#[derive(Clone)]
pub struct FilesApi {
    transport: HttpTransport,
}

impl FilesApi {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// One page of stored files.
    pub async fn page_files(&self, query: &PageQuery) -> Result<Page<FileRecord>, TransportError> {
        let mut req = Request::get(FILE_PAGE_PATH)
            .query("page", query.page)
            .query("pageSize", query.page_size)
            .query("storageType", query.storage_type.as_str());
        if let Some(name) = &query.file_name {
            req = req.query("fileName", name);
        }

        let page: Page<FileRecord> = self.transport.fetch(req).await?;
        debug!(
            page = page.current,
            records = page.records.len(),
            total = page.total,
            "file page loaded"
        );
        Ok(page)
    }

    /// Files currently exposed on the LAN share.
    pub async fn shared_files(&self) -> Result<Vec<FileRecord>, TransportError> {
        let files = self
            .transport
            .send::<Vec<FileRecord>>(Request::get(SHARED_FILES_PATH))
            .await?;
        Ok(files.unwrap_or_default())
    }

    pub async fn add_shared_file(&self, file_identifier: &str) -> Result<(), TransportError> {
        self.post_identifier(ADD_SHARED_FILE_PATH, file_identifier).await?;
        info!(file = file_identifier, "file shared");
        Ok(())
    }

    pub async fn unshare_file(&self, file_identifier: &str) -> Result<(), TransportError> {
        self.post_identifier(UNSHARE_FILE_PATH, file_identifier).await?;
        info!(file = file_identifier, "file unshared");
        Ok(())
    }

    /// Deletes the stored object and its record.
    pub async fn delete_file(&self, file_identifier: &str) -> Result<(), TransportError> {
        self.post_identifier(DELETE_FILE_PATH, file_identifier).await?;
        info!(file = file_identifier, "file deleted");
        Ok(())
    }

    /// Switches LAN sharing on or off.
    pub async fn enable_share(&self, enable: bool) -> Result<(), TransportError> {
        let form = Form::new().text("enable", enable);
        self.transport
            .execute(Request::post(ENABLE_SHARE_PATH).form(form))
            .await?;
        info!(enable, "share toggled");
        Ok(())
    }

    pub async fn share_status(&self) -> Result<ShareStatus, TransportError> {
        self.transport.fetch(Request::get(SHARE_STATUS_PATH)).await
    }

    /// Address other devices open to browse shared files. `client_port` is
    /// the port the browsing front-end is served on.
    pub async fn share_address(&self, client_port: u16) -> Result<String, TransportError> {
        self.transport
            .fetch(Request::get(SHARE_ADDRESS_PATH).query("clientPort", client_port))
            .await
    }

    /// Subscribes to server push notices.
    ///
    /// Events whose payload is not a notice JSON object come through as
    /// [`TransportError::Decode`]; the stream carries on after them.
    pub async fn notifications(
        &self,
    ) -> Result<BoxStream<'static, Result<ServerNotice, TransportError>>, TransportError> {
        let events = self.transport.subscribe(SSE_SUBSCRIBE_PATH).await?;
        let notices = events.map(|event| {
            let event = event?;
            event.notify_message().map(ServerNotice::from).map_err(|e| {
                warn!(error = %e, data = %event.data, "undecodable notice");
                TransportError::Decode(format!("notice: {e}"))
            })
        });
        Ok(notices.boxed())
    }

    async fn post_identifier(&self, path: &str, file_identifier: &str) -> Result<(), TransportError> {
        let form = Form::new().text("fileIdentifier", file_identifier);
        self.transport.execute(Request::post(path).form(form)).await
    }
}
