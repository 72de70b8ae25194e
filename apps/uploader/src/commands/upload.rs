use std::sync::Arc;

use anyhow::bail;
use chunkferry_notify::Notifier;
use chunkferry_queue::Queue;
use chunkferry_upload::{
    FileUpload, HttpUploadApi, UploadApi, UploadClient, UploadError, UploadEvent, UploadResult,
    UploadState,
};
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Context, UploadArgs};

/// Uploads every path concurrently. All files share one queue, so
/// `concurrency` bounds the parts in flight across the whole invocation.
pub(super) async fn run(
    ctx: &Context,
    args: UploadArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let api: Arc<dyn UploadApi> = Arc::new(HttpUploadApi::new(ctx.transport.clone(), ctx.storage));
    let queue = Queue::new(ctx.config.queue_config());
    let notifier: Arc<dyn Notifier> = Arc::new(ctx.toasts.clone());

    let uploads = args.paths.iter().map(|path| {
        let file = FileUpload::new(path).with_folder(args.folder.clone());
        let client = UploadClient::new(
            Arc::clone(&api),
            queue.clone(),
            ctx.config.upload_config(),
            Arc::clone(&notifier),
        )
        .with_cancel_token(cancel.child_token());
        upload_one(client, file, args.direct.then_some(args.file_type))
    });
    let outcomes = join_all(uploads).await;

    let mut failed = 0;
    for (path, outcome) in args.paths.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                let how = if result.resumed { " (resumed)" } else { "" };
                println!("{} -> {}{how}", path.display(), result.access_url);
            }
            Err(UploadError::Cancelled) => {
                failed += 1;
                eprintln!("{}: cancelled", path.display());
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", path.display());
                let missing = e.missing_parts();
                if !missing.is_empty() {
                    eprintln!("  parts not stored: {missing:?}; run again to resume");
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} uploads did not complete", args.paths.len());
    }
    Ok(())
}

/// Runs one upload while printing its progress. `direct` carries the file
/// type tag when the file goes up in a single request.
async fn upload_one(
    client: UploadClient,
    file: FileUpload,
    direct: Option<Option<u32>>,
) -> Result<UploadResult, UploadError> {
    let (tx, rx) = mpsc::channel(64);
    let client = client.with_events(tx);
    let name = file.file_name.clone();

    let upload = async move {
        match direct {
            Some(file_type) => client.upload_direct(&file, file_type).await,
            None => client.upload(&file).await,
        }
        // `client` drops here, closing the event channel.
    };
    let (result, ()) = tokio::join!(upload, print_progress(name, rx));
    result
}

async fn print_progress(name: String, mut rx: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            UploadEvent::StateChanged(UploadState::Resuming) => {
                eprintln!("{name}: resuming earlier session");
            }
            UploadEvent::StateChanged(UploadState::Merging) => {
                eprintln!("{name}: merging parts");
            }
            UploadEvent::StateChanged(state) => {
                tracing::debug!(file = %name, %state, "state changed");
            }
            UploadEvent::PartCompleted {
                part_number,
                completed,
                total,
            } => {
                eprintln!("{name}: part {part_number} stored ({completed}/{total})");
            }
            UploadEvent::Finished { .. } | UploadEvent::Failed { .. } => {}
        }
    }
}
