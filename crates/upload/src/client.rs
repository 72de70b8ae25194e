//! Upload session client.
//!
//! One [`UploadClient`] drives uploads through
//! `Idle → Probing → (Creating | Resuming) → UploadingParts → Merging → Done`,
//! with `Failed` reachable from every non-terminal state. Part uploads run on
//! a [`Queue`] that may be shared with other clients, so the concurrency
//! budget is global across files.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chunkferry_notify::Notifier;
use chunkferry_protocol::{CreateMultipartUpload, MergeResult, TaskRecord};
use chunkferry_queue::{Queue, TaskError};
use chunkferry_transfer::{
    FileFingerprint, PartReader, PartSpec, UploadPlan, fingerprint_file, validate_folder,
};
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{DirectUpload, UploadApi};
use crate::error::UploadError;
use crate::types::{FileUpload, UploadConfig, UploadEvent, UploadResult, UploadState};

/// Session identifiers every part task needs.
struct Session {
    identifier: String,
    upload_id: String,
}

/// Drives chunked uploads against an [`UploadApi`].
pub struct UploadClient {
    api: Arc<dyn UploadApi>,
    queue: Queue,
    config: UploadConfig,
    notifier: Arc<dyn Notifier>,
    events_tx: Option<mpsc::Sender<UploadEvent>>,
    cancel: CancellationToken,
    state: Mutex<UploadState>,
}

impl UploadClient {
    pub fn new(
        api: Arc<dyn UploadApi>,
        queue: Queue,
        config: UploadConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            queue,
            config,
            notifier,
            events_tx: None,
            cancel: CancellationToken::new(),
            state: Mutex::new(UploadState::Idle),
        }
    }

    /// Sends progress events to `tx`. The receiver must be drained.
    pub fn with_events(mut self, tx: mpsc::Sender<UploadEvent>) -> Self {
        self.events_tx = Some(tx);
        self
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this client's uploads.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> UploadState {
        *self.state.lock().unwrap()
    }

    /// Uploads `file` through the resumable session flow.
    ///
    /// On failure the caller may call this again with the same file; parts
    /// the backend already holds are not sent twice.
    pub async fn upload(&self, file: &FileUpload) -> Result<UploadResult, UploadError> {
        let result = self.run_session(file).await;
        self.finish(file, result).await
    }

    /// Uploads `file` in a single request, bypassing the session flow.
    pub async fn upload_direct(
        &self,
        file: &FileUpload,
        file_type: Option<u32>,
    ) -> Result<UploadResult, UploadError> {
        let result = self.run_direct(file, file_type).await;
        self.finish(file, result).await
    }

    async fn run_session(&self, file: &FileUpload) -> Result<UploadResult, UploadError> {
        self.set_state(UploadState::Idle).await;
        self.check_cancelled()?;
        check_folder(&file.folder)?;

        let reader = PartReader::open(&file.path).await?;
        let fingerprint = self
            .cancellable(fingerprint_file(&file.path, self.config.hash_window))
            .await??;

        // Look up an earlier session
        self.set_state(UploadState::Probing).await;
        let found = self.cancellable(self.api.progress(fingerprint.as_str())).await??;

        if let Some(info) = &found
            && info.finished
        {
            info!(fingerprint = %fingerprint, "content already stored, skipping upload");
            return Ok(UploadResult {
                access_url: info.path.clone(),
                file_id: info
                    .task_record
                    .as_ref()
                    .map(|r| r.id.clone())
                    .unwrap_or_default(),
                parts_uploaded: 0,
                resumed: false,
            });
        }

        let plan = UploadPlan::new(fingerprint.clone(), reader.file_size(), self.config.chunk_size)?;

        // Create or resume
        let existing = found.and_then(|info| info.task_record);
        let resumed = existing.is_some();
        let (record, completed) = match existing {
            Some(record) => {
                self.set_state(UploadState::Resuming).await;
                let completed = adopt_session(&plan, &record)?;
                info!(
                    fingerprint = %fingerprint,
                    completed = completed.len(),
                    total = plan.part_count(),
                    "resuming upload session"
                );
                (record, completed)
            }
            None => {
                self.set_state(UploadState::Creating).await;
                let request = CreateMultipartUpload {
                    identifier: fingerprint.to_string(),
                    file_name: file.file_name.clone(),
                    total_size: plan.total_size(),
                    chunk_size: plan.chunk_size(),
                    content_type: file.content_type.clone(),
                    folder: file.folder.clone(),
                };
                let created = self.cancellable(self.api.create(&request)).await??;
                let record = created.task_record.ok_or_else(|| {
                    UploadError::Protocol("createMultipartUpload returned no task record".into())
                })?;
                let completed = adopt_session(&plan, &record)?;
                info!(
                    fingerprint = %fingerprint,
                    upload_id = %record.upload_id,
                    parts = plan.part_count(),
                    "upload session created"
                );
                (record, completed)
            }
        };

        // Upload
        self.set_state(UploadState::UploadingParts).await;
        let session = Arc::new(Session {
            identifier: fingerprint.to_string(),
            upload_id: record.upload_id,
        });
        let parts_uploaded = self.upload_parts(&plan, &reader, session, completed).await?;

        // Merge
        self.set_state(UploadState::Merging).await;
        let merged = self.merge(&fingerprint).await?;

        Ok(UploadResult {
            access_url: merged.access_url,
            file_id: merged.file_id,
            parts_uploaded,
            resumed,
        })
    }

    /// Submits every part not yet in `completed` and waits for all of them.
    ///
    /// Completion is tracked by set membership; this loop is the set's only
    /// writer. Returns the number of parts sent. A fatal part failure
    /// returns at once and withdraws the parts still queued.
    async fn upload_parts(
        &self,
        plan: &UploadPlan,
        reader: &PartReader,
        session: Arc<Session>,
        mut completed: BTreeSet<u32>,
    ) -> Result<u32, UploadError> {
        let total = plan.part_count();
        let remaining = plan.remaining(&completed);
        debug!(
            fingerprint = %plan.fingerprint(),
            remaining = remaining.len(),
            total,
            "submitting parts"
        );

        // Cancelled when this call returns, whatever the outcome.
        let parts_cancel = self.cancel.child_token();
        let _withdraw = parts_cancel.clone().drop_guard();

        let mut pending = FuturesUnordered::new();
        for part in remaining {
            let api = Arc::clone(&self.api);
            let reader = reader.clone();
            let session = Arc::clone(&session);
            let cancel = parts_cancel.clone();
            let part_number = part.part_number;

            let handle = self.queue.enqueue(move || {
                let api = Arc::clone(&api);
                let reader = reader.clone();
                let session = Arc::clone(&session);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Err(UploadError::Cancelled);
                    }
                    let result = send_part(api.as_ref(), &reader, &session, &part).await;
                    // Withdraw siblings before the queue hands out the next slot.
                    if let Err(e) = &result
                        && e.is_fatal()
                    {
                        cancel.cancel();
                    }
                    result
                }
            });
            pending.push(handle.map(move |outcome| (part_number, outcome)));
        }

        let mut sent = 0u32;
        let mut first_error: Option<UploadError> = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                next = pending.next() => next,
            };
            let Some((part_number, outcome)) = next else {
                break;
            };

            match outcome {
                Ok(n) => {
                    sent += 1;
                    completed.insert(n);
                    debug!(part = n, completed = completed.len(), total, "part stored");
                    self.emit(UploadEvent::PartCompleted {
                        part_number: n,
                        completed: completed.len() as u32,
                        total,
                    })
                    .await;
                }
                Err(TaskError::Failed { attempts, error }) => {
                    warn!(part = part_number, attempts, error = %error, "part failed");
                    if error.is_fatal() {
                        return Err(parts_failed(plan, &completed, error));
                    }
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(TaskError::Aborted) => {
                    warn!(part = part_number, "part dropped by the queue");
                    if first_error.is_none() {
                        first_error = Some(UploadError::Protocol(format!(
                            "part {part_number} was dropped before it ran"
                        )));
                    }
                }
            }
        }

        if plan.part_numbers().is_subset(&completed) {
            return Ok(sent);
        }
        let source = first_error
            .unwrap_or_else(|| UploadError::Protocol("parts missing after queue drained".into()));
        Err(parts_failed(plan, &completed, source))
    }

    /// Merges, retrying network-level failures `merge_retries` times.
    async fn merge(&self, fingerprint: &FileFingerprint) -> Result<MergeResult, UploadError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.cancellable(self.api.merge(fingerprint.as_str())).await? {
                Ok(merged) => {
                    info!(fingerprint = %fingerprint, file_id = %merged.file_id, "upload merged");
                    return Ok(merged);
                }
                Err(e) if e.is_network() && attempt <= self.config.merge_retries => {
                    warn!(fingerprint = %fingerprint, attempt, error = %e, "merge failed, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn run_direct(
        &self,
        file: &FileUpload,
        file_type: Option<u32>,
    ) -> Result<UploadResult, UploadError> {
        self.set_state(UploadState::Idle).await;
        self.check_cancelled()?;
        check_folder(&file.folder)?;

        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(chunkferry_transfer::TransferError::from)?;

        self.set_state(UploadState::UploadingParts).await;
        let upload = DirectUpload {
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            folder: Some(file.folder.clone()),
            file_type,
            bytes,
        };
        let record = self.cancellable(self.api.upload_direct(upload)).await??;
        info!(file = %file.file_name, file_id = %record.file_identifier, "direct upload stored");

        Ok(UploadResult {
            access_url: record.access_url,
            file_id: record.file_identifier,
            parts_uploaded: 1,
            resumed: false,
        })
    }

    async fn finish(
        &self,
        file: &FileUpload,
        result: Result<UploadResult, UploadError>,
    ) -> Result<UploadResult, UploadError> {
        match &result {
            Ok(done) => {
                self.set_state(UploadState::Done).await;
                info!(file = %file.file_name, url = %done.access_url, "upload finished");
                self.emit(UploadEvent::Finished {
                    access_url: done.access_url.clone(),
                })
                .await;
            }
            Err(e) => {
                self.set_state(UploadState::Failed).await;
                error!(file = %file.file_name, error = %e, "upload failed");
                if !matches!(e, UploadError::Cancelled) && !e.was_notified() {
                    let title = format!("Upload of {} failed", file.file_name);
                    self.notifier.error(&title, Some(e.to_string().as_str()));
                }
                self.emit(UploadEvent::Failed {
                    error: e.to_string(),
                })
                .await;
            }
        }
        result
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            out = fut => Ok(out),
        }
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn set_state(&self, state: UploadState) {
        let previous = std::mem::replace(&mut *self.state.lock().unwrap(), state);
        if previous != state {
            debug!(from = %previous, to = %state, "upload state changed");
            self.emit(UploadEvent::StateChanged(state)).await;
        }
    }

    async fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Reads one part and hands it to its destination.
async fn send_part(
    api: &dyn UploadApi,
    reader: &PartReader,
    session: &Session,
    part: &PartSpec,
) -> Result<u32, UploadError> {
    let bytes = reader.read(part).await?;
    let dest = api
        .part_destination(&session.identifier, &session.upload_id, part.part_number)
        .await?;
    api.put_part(&dest, part.part_number, bytes).await?;
    Ok(part.part_number)
}

fn parts_failed(plan: &UploadPlan, completed: &BTreeSet<u32>, source: UploadError) -> UploadError {
    if matches!(source, UploadError::Cancelled) {
        return UploadError::Cancelled;
    }
    UploadError::PartsFailed {
        missing: plan.part_numbers().difference(completed).copied().collect(),
        source: Box::new(source),
    }
}

fn check_folder(folder: &str) -> Result<(), UploadError> {
    validate_folder(folder).map_err(|e| UploadError::InvalidInput(e.to_string()))
}

/// Checks a backend session against the local plan and returns its
/// completed-part set.
fn adopt_session(plan: &UploadPlan, record: &TaskRecord) -> Result<BTreeSet<u32>, UploadError> {
    if record.chunk_size != 0 && record.chunk_size != plan.chunk_size() {
        return Err(UploadError::StateConflict(format!(
            "session chunk size {} differs from local chunk size {}",
            record.chunk_size,
            plan.chunk_size()
        )));
    }
    if record.total_size != 0 && record.total_size != plan.total_size() {
        return Err(UploadError::StateConflict(format!(
            "session total size {} differs from file size {}",
            record.total_size,
            plan.total_size()
        )));
    }
    if record.chunk_num != 0 && record.chunk_num != plan.part_count() {
        return Err(UploadError::StateConflict(format!(
            "session expects {} parts, local plan has {}",
            record.chunk_num,
            plan.part_count()
        )));
    }

    let mut completed = BTreeSet::new();
    for n in record.completed_parts() {
        if !plan.contains(n) {
            return Err(UploadError::StateConflict(format!(
                "session reports part {n} outside 1..={}",
                plan.part_count()
            )));
        }
        completed.insert(n);
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    use chunkferry_notify::SharedToasts;
    use chunkferry_protocol::{FileRecord, PartSummary, TaskInfo};
    use chunkferry_queue::QueueConfig;
    use chunkferry_transport::TransportError;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::api::{ApiFuture, PartDestination};

    const DATA: &[u8] = b"0123456789";
    const CHUNK: u64 = 4;

    fn unavailable() -> TransportError {
        TransportError::Status {
            status: 503,
            body: "busy".into(),
        }
    }

    fn rejected(message: &str) -> TransportError {
        TransportError::Application {
            code: 500,
            message: message.into(),
            notified: true,
        }
    }

    fn record(upload_id: &str, done: &[u32]) -> TaskRecord {
        TaskRecord {
            id: "7".into(),
            upload_id: upload_id.into(),
            total_size: DATA.len() as u64,
            chunk_size: CHUNK,
            chunk_num: 3,
            exit_part_list: done
                .iter()
                .map(|&n| PartSummary {
                    part_number: n,
                    size: CHUNK,
                    etag: None,
                })
                .collect(),
            ..TaskRecord::default()
        }
    }

    fn open_session(record: TaskRecord) -> TaskInfo {
        TaskInfo {
            finished: false,
            path: String::new(),
            task_record: Some(record),
        }
    }

    /// Scripted backend that records every call.
    #[derive(Default)]
    struct MockApi {
        progress: Mutex<Option<TaskInfo>>,
        create_result: Mutex<Option<Result<TaskInfo, TransportError>>>,
        /// Network failures to inject per part before it succeeds.
        flaky_parts: Mutex<HashMap<u32, u32>>,
        merge_failures: Mutex<u32>,
        /// Part the backend refuses outright.
        rejected_part: Mutex<Option<u32>>,
        /// When set, `put_part` waits for a permit.
        gate: Option<Arc<Semaphore>>,
        calls: Mutex<Vec<String>>,
        stored: Mutex<HashMap<u32, Vec<u8>>>,
    }

    impl MockApi {
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }

        fn stored_parts(&self) -> BTreeSet<u32> {
            self.stored.lock().unwrap().keys().copied().collect()
        }
    }

    impl UploadApi for MockApi {
        fn progress(&self, identifier: &str) -> ApiFuture<'_, Option<TaskInfo>> {
            self.log(format!("progress:{identifier}"));
            let progress = self.progress.lock().unwrap().clone();
            Box::pin(async move { Ok(progress) })
        }

        fn create(&self, request: &CreateMultipartUpload) -> ApiFuture<'_, TaskInfo> {
            self.log(format!("create:{}:{}", request.file_name, request.chunk_size));
            let result = self
                .create_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(open_session(record("u-new", &[]))));
            Box::pin(async move { result })
        }

        fn part_destination(
            &self,
            _identifier: &str,
            upload_id: &str,
            part_number: u32,
        ) -> ApiFuture<'_, PartDestination> {
            self.log(format!("dest:{part_number}"));
            let dest = PartDestination::Direct {
                upload_id: upload_id.to_string(),
            };
            Box::pin(async move { Ok(dest) })
        }

        fn put_part(
            &self,
            _destination: &PartDestination,
            part_number: u32,
            bytes: Vec<u8>,
        ) -> ApiFuture<'_, ()> {
            self.log(format!("put:{part_number}"));
            Box::pin(async move {
                if let Some(gate) = &self.gate {
                    let _permit = gate.acquire().await.unwrap();
                }
                if *self.rejected_part.lock().unwrap() == Some(part_number) {
                    return Err(TransportError::Application {
                        code: 500,
                        message: "session not found".into(),
                        notified: false,
                    });
                }
                {
                    let mut flaky = self.flaky_parts.lock().unwrap();
                    if let Some(left) = flaky.get_mut(&part_number)
                        && *left > 0
                    {
                        *left -= 1;
                        return Err(unavailable());
                    }
                }
                self.stored.lock().unwrap().insert(part_number, bytes);
                Ok(())
            })
        }

        fn merge(&self, identifier: &str) -> ApiFuture<'_, MergeResult> {
            self.log(format!("merge:{identifier}"));
            let fail = {
                let mut left = self.merge_failures.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    true
                } else {
                    false
                }
            };
            Box::pin(async move {
                if fail {
                    return Err(unavailable());
                }
                Ok(MergeResult {
                    access_url: "http://files/data.bin".into(),
                    file_id: "42".into(),
                })
            })
        }

        fn upload_direct(&self, upload: DirectUpload) -> ApiFuture<'_, FileRecord> {
            self.log(format!("direct:{}:{}", upload.file_name, upload.bytes.len()));
            Box::pin(async move {
                Ok(FileRecord {
                    file_identifier: "f-1".into(),
                    access_url: "http://files/direct.bin".into(),
                    ..FileRecord::default()
                })
            })
        }
    }

    fn write_data(dir: &Path) -> FileUpload {
        let path = dir.join("data.bin");
        std::fs::write(&path, DATA).unwrap();
        FileUpload::new(path).with_folder("backups")
    }

    fn client_with(
        api: Arc<MockApi>,
        retry_limit: u32,
        concurrency: usize,
    ) -> (UploadClient, SharedToasts, Queue) {
        let toasts = SharedToasts::new();
        let queue = Queue::new(QueueConfig {
            concurrency,
            retry_limit,
            ..QueueConfig::default()
        });
        let client = UploadClient::new(
            api,
            queue.clone(),
            UploadConfig {
                chunk_size: CHUNK,
                hash_window: 3,
                merge_retries: 1,
            },
            Arc::new(toasts.clone()),
        );
        (client, toasts, queue)
    }

    fn client(api: Arc<MockApi>) -> (UploadClient, SharedToasts) {
        let (client, toasts, _) = client_with(api, 3, 2);
        (client, toasts)
    }

    fn position(calls: &[String], call: &str) -> usize {
        calls.iter().position(|c| c == call).unwrap()
    }

    #[tokio::test]
    async fn fresh_upload_creates_uploads_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        let (tx, mut rx) = mpsc::channel(64);
        let (client, toasts) = client(Arc::clone(&api));
        let client = client.with_events(tx);

        let result = client.upload(&file).await.unwrap();
        assert_eq!(result.access_url, "http://files/data.bin");
        assert_eq!(result.file_id, "42");
        assert_eq!(result.parts_uploaded, 3);
        assert!(!result.resumed);
        assert_eq!(client.state(), UploadState::Done);
        assert!(toasts.is_empty());

        let stored = api.stored.lock().unwrap().clone();
        assert_eq!(stored[&1], b"0123");
        assert_eq!(stored[&2], b"4567");
        assert_eq!(stored[&3], b"89");

        let calls = api.calls();
        assert!(calls[0].starts_with("progress:"));
        assert_eq!(calls[1], "create:data.bin:4");
        assert!(calls.last().unwrap().starts_with("merge:"));
        assert_eq!(api.count("merge:"), 1);

        drop(client);
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        let states: Vec<UploadState> = events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                UploadState::Probing,
                UploadState::Creating,
                UploadState::UploadingParts,
                UploadState::Merging,
                UploadState::Done
            ]
        );
        let parts = events
            .iter()
            .filter(|e| matches!(e, UploadEvent::PartCompleted { total: 3, .. }))
            .count();
        assert_eq!(parts, 3);
        assert!(matches!(events.last(), Some(UploadEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn resume_uploads_only_missing_parts() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        // Duplicate report of part 2 must not count twice.
        *api.progress.lock().unwrap() = Some(open_session(record("u-old", &[2, 2])));
        let (client, _) = client(Arc::clone(&api));

        let result = client.upload(&file).await.unwrap();
        assert!(result.resumed);
        assert_eq!(result.parts_uploaded, 2);
        assert_eq!(api.stored_parts(), BTreeSet::from([1, 3]));
        assert_eq!(api.count("create:"), 0);
        assert_eq!(api.count("put:2"), 0);

        let calls = api.calls();
        let merge = calls.iter().position(|c| c.starts_with("merge:")).unwrap();
        assert!(position(&calls, "put:1") < merge);
        assert!(position(&calls, "put:3") < merge);
    }

    #[tokio::test]
    async fn finished_session_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        *api.progress.lock().unwrap() = Some(TaskInfo {
            finished: true,
            path: "http://files/already.bin".into(),
            task_record: Some(record("u-done", &[1, 2, 3])),
        });
        let (client, _) = client(Arc::clone(&api));

        let result = client.upload(&file).await.unwrap();
        assert_eq!(result.access_url, "http://files/already.bin");
        assert_eq!(result.file_id, "7");
        assert_eq!(result.parts_uploaded, 0);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn chunk_size_mismatch_is_state_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        let mut stale = record("u-old", &[1]);
        stale.chunk_size = 8;
        stale.chunk_num = 2;
        *api.progress.lock().unwrap() = Some(open_session(stale));
        let (client, toasts) = client(Arc::clone(&api));

        let err = client.upload(&file).await.unwrap_err();
        assert!(matches!(err, UploadError::StateConflict(_)));
        assert_eq!(client.state(), UploadState::Failed);
        assert_eq!(api.count("put:"), 0);
        assert_eq!(toasts.len(), 1);
    }

    #[tokio::test]
    async fn unknown_completed_part_is_state_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        let mut odd = record("u-old", &[7]);
        odd.chunk_num = 0;
        *api.progress.lock().unwrap() = Some(open_session(odd));
        let (client, _) = client(Arc::clone(&api));

        let err = client.upload(&file).await.unwrap_err();
        match err {
            UploadError::StateConflict(msg) => assert!(msg.contains("part 7")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn flaky_part_recovers_within_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        api.flaky_parts.lock().unwrap().insert(2, 2);
        let (client, toasts) = client(Arc::clone(&api));

        let result = client.upload(&file).await.unwrap();
        assert_eq!(result.parts_uploaded, 3);
        assert_eq!(api.count("put:2"), 3);
        assert_eq!(api.stored_parts(), BTreeSet::from([1, 2, 3]));
        assert!(toasts.is_empty());
    }

    #[tokio::test]
    async fn exhausted_part_fails_without_merge() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        api.flaky_parts.lock().unwrap().insert(3, u32::MAX);
        let (client, toasts, _) = client_with(Arc::clone(&api), 1, 2);

        let err = client.upload(&file).await.unwrap_err();
        assert_eq!(err.missing_parts(), &[3]);
        match &err {
            UploadError::PartsFailed { source, .. } => {
                assert!(matches!(**source, UploadError::Network(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.count("put:3"), 2);
        assert_eq!(api.count("merge:"), 0);
        assert_eq!(api.stored_parts(), BTreeSet::from([1, 2]));
        assert_eq!(toasts.len(), 1);
    }

    #[tokio::test]
    async fn rejected_part_stops_upload_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        *api.rejected_part.lock().unwrap() = Some(1);
        let (client, toasts, queue) = client_with(Arc::clone(&api), 3, 1);

        let err = client.upload(&file).await.unwrap_err();
        assert_eq!(err.missing_parts(), &[1, 2, 3]);
        match &err {
            UploadError::PartsFailed { source, .. } => {
                assert!(matches!(**source, UploadError::Application(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.state(), UploadState::Failed);
        assert_eq!(toasts.len(), 1);

        // Queued siblings are withdrawn, not retried or recorded.
        queue.wait_idle().await;
        assert_eq!(api.count("put:"), 1);
        assert_eq!(api.count("merge:"), 0);
        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cancelled, 2);
        assert_eq!(stats.retried, 0);
    }

    #[tokio::test]
    async fn rerun_after_failure_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        *api.progress.lock().unwrap() = Some(open_session(record("u-old", &[1, 2])));
        let (client, _) = client(Arc::clone(&api));

        client.upload(&file).await.unwrap();
        assert_eq!(api.stored_parts(), BTreeSet::from([3]));
    }

    #[tokio::test]
    async fn rejected_create_is_not_notified_twice() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        *api.create_result.lock().unwrap() = Some(Err(rejected("bucket missing")));
        let (client, toasts) = client(Arc::clone(&api));

        let err = client.upload(&file).await.unwrap_err();
        assert!(matches!(err, UploadError::Application(_)));
        assert!(err.was_notified());
        // The transport already showed it; the client stays quiet.
        assert!(toasts.is_empty());
        assert_eq!(api.count("put:"), 0);
    }

    #[tokio::test]
    async fn create_without_record_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        *api.create_result.lock().unwrap() = Some(Ok(TaskInfo {
            finished: false,
            path: String::new(),
            task_record: None,
        }));
        let (client, _) = client(Arc::clone(&api));

        assert!(matches!(
            client.upload(&file).await.unwrap_err(),
            UploadError::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn merge_retried_once_on_network_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        *api.merge_failures.lock().unwrap() = 1;
        let (client, _) = client(Arc::clone(&api));

        client.upload(&file).await.unwrap();
        assert_eq!(api.count("merge:"), 2);
    }

    #[tokio::test]
    async fn merge_gives_up_after_one_retry() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        *api.merge_failures.lock().unwrap() = 2;
        let (client, _) = client(Arc::clone(&api));

        let err = client.upload(&file).await.unwrap_err();
        assert!(matches!(err, UploadError::Network(_)));
        assert_eq!(api.count("merge:"), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        let (client, toasts) = client(Arc::clone(&api));
        client.cancel_token().cancel();

        let err = client.upload(&file).await.unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
        assert!(api.calls().is_empty());
        assert!(toasts.is_empty());
    }

    #[tokio::test]
    async fn cancel_mid_upload_returns_without_draining() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let gate = Arc::new(Semaphore::new(0));
        let api = Arc::new(MockApi {
            gate: Some(Arc::clone(&gate)),
            ..MockApi::default()
        });
        let (client, _, queue) = client_with(Arc::clone(&api), 0, 1);
        let token = client.cancel_token();

        let canceller = async {
            while api.count("put:") == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            token.cancel();
        };
        let (result, ()) = tokio::join!(client.upload(&file), canceller);
        assert!(matches!(result, Err(UploadError::Cancelled)));

        // Let the in-flight part finish; queued parts must not reach the backend.
        gate.add_permits(10);
        queue.wait_idle().await;
        assert_eq!(api.count("dest:"), 1);
        assert_eq!(api.count("put:"), 1);
        assert_eq!(client.state(), UploadState::Failed);
    }

    #[tokio::test]
    async fn traversal_folder_rejected_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path()).with_folder("../etc");
        let api = Arc::new(MockApi::default());
        let (client, _) = client(Arc::clone(&api));

        let err = client.upload(&file).await.unwrap_err();
        match &err {
            UploadError::InvalidInput(msg) => assert!(msg.contains("..")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let api = Arc::new(MockApi::default());
        let (client, toasts) = client(Arc::clone(&api));

        let err = client
            .upload(&FileUpload::new("/definitely/not/here.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Read(_)));
        assert_eq!(toasts.len(), 1);
    }

    #[tokio::test]
    async fn empty_file_uploads_one_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();
        let api = Arc::new(MockApi::default());
        let mut fresh = record("u-empty", &[]);
        fresh.total_size = 0;
        fresh.chunk_num = 1;
        *api.create_result.lock().unwrap() = Some(Ok(open_session(fresh)));
        let (client, _) = client(Arc::clone(&api));

        let result = client.upload(&FileUpload::new(path)).await.unwrap();
        assert_eq!(result.parts_uploaded, 1);
        assert_eq!(api.stored.lock().unwrap()[&1], b"");
    }

    #[tokio::test]
    async fn direct_upload_sends_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_data(dir.path());
        let api = Arc::new(MockApi::default());
        let (client, _) = client(Arc::clone(&api));

        let result = client.upload_direct(&file, None).await.unwrap();
        assert_eq!(result.access_url, "http://files/direct.bin");
        assert_eq!(result.file_id, "f-1");
        assert_eq!(api.calls(), vec!["direct:data.bin:10".to_string()]);
        assert_eq!(client.state(), UploadState::Done);
    }
}
