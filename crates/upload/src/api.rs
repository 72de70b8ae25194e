//! Backend seam for the upload flow.
//!
//! `UploadApi` is what [`UploadClient`](crate::UploadClient) talks to.
//! [`HttpUploadApi`] implements it over [`HttpTransport`]; tests use mocks.

use std::future::Future;
use std::pin::Pin;

use chunkferry_protocol::constants::{
    CREATE_MULTIPART_PATH, DIRECT_UPLOAD_PATH, MERGE_PATH, PRESIGN_PART_PATH, UPLOAD_PART_PATH,
    UPLOAD_PROGRESS_PATH,
};
use chunkferry_protocol::{
    CreateMultipartUpload, FileRecord, MergeResult, STORAGE_TYPE_HEADER, StorageType, TaskInfo,
};
use chunkferry_transport::{Form, HttpTransport, Request, TransportError};
use tracing::debug;

/// Boxed future returned by [`UploadApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Where one part's bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartDestination {
    /// Pre-signed object-store URL; bytes are `PUT` there directly.
    Presigned(String),
    /// The backend's own part endpoint, addressed by session.
    Direct { upload_id: String },
}

/// A whole file sent in one request, bypassing the session flow.
#[derive(Debug, Clone)]
pub struct DirectUpload {
    pub file_name: String,
    pub content_type: String,
    pub folder: Option<String>,
    pub file_type: Option<u32>,
    pub bytes: Vec<u8>,
}

/// Calls the upload flow makes against the backend.
pub trait UploadApi: Send + Sync {
    /// Session state for a fingerprint. `None` means no session exists.
    fn progress(&self, identifier: &str) -> ApiFuture<'_, Option<TaskInfo>>;

    /// Opens a multipart session.
    fn create(&self, request: &CreateMultipartUpload) -> ApiFuture<'_, TaskInfo>;

    /// Resolves the destination for one part.
    fn part_destination(
        &self,
        identifier: &str,
        upload_id: &str,
        part_number: u32,
    ) -> ApiFuture<'_, PartDestination>;

    /// Transmits one part's bytes.
    fn put_part(
        &self,
        destination: &PartDestination,
        part_number: u32,
        bytes: Vec<u8>,
    ) -> ApiFuture<'_, ()>;

    /// Finalizes the session.
    fn merge(&self, identifier: &str) -> ApiFuture<'_, MergeResult>;

    /// Uploads a small file in a single request.
    fn upload_direct(&self, upload: DirectUpload) -> ApiFuture<'_, FileRecord>;
}

/// [`UploadApi`] over HTTP. Every call carries the `Storage-Type` header.
///
/// Part calls are sent quiet: one rejected upload can fail many parts, and
/// the client reports the upload's failure once.
#[derive(Clone)]
pub struct HttpUploadApi {
    transport: HttpTransport,
    storage: StorageType,
}

impl HttpUploadApi {
    pub fn new(transport: HttpTransport, storage: StorageType) -> Self {
        Self { transport, storage }
    }

    pub fn storage(&self) -> StorageType {
        self.storage
    }

    fn with_storage(&self, req: Request) -> Request {
        req.header(STORAGE_TYPE_HEADER, self.storage.as_str())
    }
}

impl UploadApi for HttpUploadApi {
    fn progress(&self, identifier: &str) -> ApiFuture<'_, Option<TaskInfo>> {
        let req = self.with_storage(Request::get(UPLOAD_PROGRESS_PATH).query("identifier", identifier));
        Box::pin(async move { self.transport.send(req).await })
    }

    fn create(&self, request: &CreateMultipartUpload) -> ApiFuture<'_, TaskInfo> {
        let req = Request::post(CREATE_MULTIPART_PATH).json(request);
        Box::pin(async move { self.transport.fetch(self.with_storage(req?)).await })
    }

    fn part_destination(
        &self,
        identifier: &str,
        upload_id: &str,
        part_number: u32,
    ) -> ApiFuture<'_, PartDestination> {
        if !self.storage.uses_presigned_parts() {
            let dest = PartDestination::Direct {
                upload_id: upload_id.to_string(),
            };
            return Box::pin(async move { Ok(dest) });
        }

        let req = self.with_storage(
            Request::get(PRESIGN_PART_PATH)
                .query("identifier", identifier)
                .query("partNumber", part_number)
                .quiet(),
        );
        Box::pin(async move {
            let url: String = self.transport.fetch(req).await?;
            debug!(part = part_number, "pre-signed destination issued");
            Ok(PartDestination::Presigned(url))
        })
    }

    fn put_part(
        &self,
        destination: &PartDestination,
        part_number: u32,
        bytes: Vec<u8>,
    ) -> ApiFuture<'_, ()> {
        match destination {
            PartDestination::Presigned(url) => {
                let url = url.clone();
                Box::pin(async move { self.transport.put_bytes(&url, bytes).await })
            }
            PartDestination::Direct { upload_id } => {
                let form = Form::new()
                    .text("uploadId", upload_id)
                    .text("partNumber", part_number)
                    .file("file", "blob", None, bytes);
                let req = self.with_storage(Request::post(UPLOAD_PART_PATH).form(form).quiet());
                Box::pin(async move { self.transport.execute(req).await })
            }
        }
    }

    fn merge(&self, identifier: &str) -> ApiFuture<'_, MergeResult> {
        let req = self.with_storage(Request::post(MERGE_PATH).query("identifier", identifier));
        Box::pin(async move { self.transport.fetch(req).await })
    }

    fn upload_direct(&self, upload: DirectUpload) -> ApiFuture<'_, FileRecord> {
        let form = Form::new()
            .file(
                "file",
                upload.file_name,
                Some(upload.content_type),
                upload.bytes,
            )
            .text_opt("folder", upload.folder.filter(|f| !f.is_empty()))
            .text_opt("fileType", upload.file_type);
        let req = self.with_storage(Request::post(DIRECT_UPLOAD_PATH).form(form));
        Box::pin(async move { self.transport.fetch(req).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chunkferry_notify::{SharedToasts, SilentNotifier};
    use chunkferry_queue::{Queue, QueueConfig};
    use chunkferry_transport::{StaticCredential, TransportConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::{FileUpload, UploadClient, UploadConfig};

    /// Reads one request: head plus a `Content-Length` body.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let mut expected = None;
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if expected.is_none()
                && let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n")
            {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                expected = Some(end + 4 + length);
            }
            if expected.is_some_and(|total| buf.len() >= total) {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answers each connection with the next JSON body and records the raw requests.
    async fn mock_server(bodies: Vec<&str>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let bodies: Vec<String> = bodies.into_iter().map(str::to_owned).collect();

        tokio::spawn(async move {
            for body in bodies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                log.lock().unwrap().push(request);
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, seen)
    }

    #[tokio::test]
    async fn rejected_parts_fail_the_upload_with_one_notice() {
        let rejected = r#"{"code":500,"msg":"session not found"}"#;
        let mut bodies = vec![
            r#"{"code":200,"data":null}"#,
            r#"{"code":200,"data":{"finished":false,"taskRecord":{"uploadId":"u-1","chunkSize":2,"totalSize":10,"chunkNum":5}}}"#,
        ];
        // More rejections than parts, so extra calls would be answered and counted.
        bodies.extend([rejected; 6]);
        let (url, seen) = mock_server(bodies).await;

        let toasts = SharedToasts::new();
        let transport = HttpTransport::new(
            TransportConfig {
                base_url: url,
                ..TransportConfig::default()
            },
            Arc::new(StaticCredential::new(None)),
            Arc::new(toasts.clone()),
        )
        .unwrap();
        let queue = Queue::new(QueueConfig {
            concurrency: 1,
            retry_limit: 3,
            ..QueueConfig::default()
        });
        let client = UploadClient::new(
            Arc::new(HttpUploadApi::new(transport, StorageType::Local)),
            queue.clone(),
            UploadConfig {
                chunk_size: 2,
                hash_window: 4,
                merge_retries: 1,
            },
            Arc::new(toasts.clone()),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ten.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let err = client.upload(&FileUpload::new(path)).await.unwrap_err();
        assert_eq!(err.missing_parts(), &[1, 2, 3, 4, 5]);
        assert!(!err.was_notified());
        queue.wait_idle().await;

        let seen = seen.lock().unwrap();
        let parts = seen.iter().filter(|r| r.starts_with("POST /upload/part ")).count();
        assert_eq!(parts, 1);
        assert_eq!(seen.len(), 3);

        let shown = toasts.drain();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].title.contains("ten.bin"));
        assert!(shown[0].message.as_deref().unwrap().contains("session not found"));
    }

    fn api(url: &str, storage: StorageType) -> HttpUploadApi {
        let transport = HttpTransport::new(
            TransportConfig {
                base_url: url.to_string(),
                ..TransportConfig::default()
            },
            Arc::new(StaticCredential::new(Some("pw".into()))),
            Arc::new(SilentNotifier),
        )
        .unwrap();
        HttpUploadApi::new(transport, storage)
    }

    #[tokio::test]
    async fn progress_sends_storage_header() {
        let (url, seen) = mock_server(vec![
            r#"{"code":200,"data":{"finished":false,"path":"","taskRecord":{"id":9,"uploadId":"u-9","chunkSize":4,"totalSize":10,"exitPartList":[{"partNumber":2,"size":4}]}}}"#,
        ])
        .await;
        let api = api(&url, StorageType::Minio);

        let info = api.progress("abc").await.unwrap().unwrap();
        let record = info.task_record.unwrap();
        assert_eq!(record.upload_id, "u-9");
        assert_eq!(record.completed_parts().collect::<Vec<_>>(), vec![2]);

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("GET /upload/getUploadProgress?identifier=abc "));
        assert!(seen[0].to_ascii_lowercase().contains("storage-type: minio"));
    }

    #[tokio::test]
    async fn null_progress_means_no_session() {
        let (url, _) = mock_server(vec![r#"{"code":200,"data":null}"#]).await;
        assert!(api(&url, StorageType::Local).progress("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_posts_camel_case_json() {
        let (url, seen) = mock_server(vec![
            r#"{"code":200,"data":{"finished":false,"taskRecord":{"uploadId":"u-1"}}}"#,
        ])
        .await;
        let api = api(&url, StorageType::Oss);

        let info = api
            .create(&CreateMultipartUpload {
                identifier: "abc".into(),
                file_name: "a.bin".into(),
                total_size: 10,
                chunk_size: 4,
                content_type: "application/octet-stream".into(),
                folder: "backups".into(),
            })
            .await
            .unwrap();
        assert_eq!(info.task_record.unwrap().upload_id, "u-1");

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("POST /upload/createMultipartUpload "));
        assert!(seen[0].contains(r#""fileName":"a.bin""#));
        assert!(seen[0].contains(r#""chunkSize":4"#));
    }

    #[tokio::test]
    async fn local_storage_parts_go_to_part_endpoint() {
        let (url, seen) = mock_server(vec![r#"{"code":200,"data":null}"#]).await;
        let api = api(&url, StorageType::Local);

        let dest = api.part_destination("abc", "u-1", 2).await.unwrap();
        assert_eq!(
            dest,
            PartDestination::Direct {
                upload_id: "u-1".into()
            }
        );
        api.put_part(&dest, 2, b"PART-TWO".to_vec()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("POST /upload/part "));
        assert!(seen[0].contains("name=\"uploadId\""));
        assert!(seen[0].contains("u-1"));
        assert!(seen[0].contains("PART-TWO"));
    }

    #[tokio::test]
    async fn object_storage_parts_use_presigned_url() {
        let (put_url, put_seen) = mock_server(vec![""]).await;
        let presigned = format!("{put_url}/bucket/abc?partNumber=1&sig=xyz");
        let body = format!(r#"{{"code":200,"data":"{presigned}"}}"#);
        let (url, seen) = mock_server(vec![body.as_str()]).await;
        let api = api(&url, StorageType::Minio);

        let dest = api.part_destination("abc", "u-1", 1).await.unwrap();
        assert_eq!(dest, PartDestination::Presigned(presigned));
        api.put_part(&dest, 1, b"RAW".to_vec()).await.unwrap();

        assert!(seen.lock().unwrap()[0]
            .starts_with("GET /upload/getPreSignUploadUrl?identifier=abc&partNumber=1 "));
        let put = put_seen.lock().unwrap();
        assert!(put[0].starts_with("PUT /bucket/abc?partNumber=1&sig=xyz "));
        assert!(!put[0].to_ascii_lowercase().contains("authorization:"));
        assert!(put[0].ends_with("RAW"));
    }

    #[tokio::test]
    async fn merge_returns_access_url() {
        let (url, seen) = mock_server(vec![
            r#"{"code":200,"data":{"accessUrl":"http://files/a.bin","fileId":17}}"#,
        ])
        .await;
        let result = api(&url, StorageType::Obs).merge("abc").await.unwrap();
        assert_eq!(result.access_url, "http://files/a.bin");
        assert_eq!(result.file_id, "17");
        assert!(seen.lock().unwrap()[0].starts_with("POST /upload/merge?identifier=abc "));
    }

    #[tokio::test]
    async fn direct_upload_sends_optional_fields() {
        let (url, seen) = mock_server(vec![
            r#"{"code":200,"data":{"fileIdentifier":"f-1","accessUrl":"http://files/x.txt"}}"#,
        ])
        .await;
        let record = api(&url, StorageType::Local)
            .upload_direct(DirectUpload {
                file_name: "x.txt".into(),
                content_type: "text/plain".into(),
                folder: Some(String::new()),
                file_type: Some(2),
                bytes: b"hello".to_vec(),
            })
            .await
            .unwrap();
        assert_eq!(record.file_identifier, "f-1");

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("POST /upload "));
        assert!(seen[0].contains("name=\"fileType\""));
        assert!(!seen[0].contains("name=\"folder\""));
        assert!(seen[0].contains("filename=\"x.txt\""));
    }
}
