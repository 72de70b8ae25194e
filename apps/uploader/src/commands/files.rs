use chunkferry_files::{FilesApi, PageQuery, ServerNotice, ShareAction};
use chunkferry_protocol::FileRecord;
use chunkferry_transport::TransportError;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{Context, LsArgs, ShareCommand};

pub(super) async fn list(ctx: &Context, args: LsArgs) -> anyhow::Result<()> {
    let api = FilesApi::new(ctx.transport.clone());
    let mut query = PageQuery::new(ctx.storage)
        .page(args.page)
        .page_size(args.page_size);
    if let Some(name) = args.name {
        query = query.file_name(name);
    }

    let page = api.page_files(&query).await?;
    print_records(&page.records);
    println!(
        "page {}/{} ({} files)",
        page.current,
        page.page_count().max(1),
        page.total
    );
    Ok(())
}

pub(super) async fn share(ctx: &Context, action: ShareCommand) -> anyhow::Result<()> {
    let api = FilesApi::new(ctx.transport.clone());
    match action {
        ShareCommand::Add { file_identifier } => api.add_shared_file(&file_identifier).await?,
        ShareCommand::Remove { file_identifier } => api.unshare_file(&file_identifier).await?,
        ShareCommand::List => print_records(&api.shared_files().await?),
        ShareCommand::Enable => api.enable_share(true).await?,
        ShareCommand::Disable => api.enable_share(false).await?,
        ShareCommand::Status => {
            let on = api.share_status().await?.0;
            println!("sharing is {}", if on { "on" } else { "off" });
        }
        ShareCommand::Address { port } => println!("{}", api.share_address(port).await?),
    }
    Ok(())
}

pub(super) async fn delete(ctx: &Context, file_identifier: &str) -> anyhow::Result<()> {
    FilesApi::new(ctx.transport.clone())
        .delete_file(file_identifier)
        .await?;
    Ok(())
}

/// Prints notices until the stream ends or `cancel` fires.
pub(super) async fn watch(ctx: &Context, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut notices = FilesApi::new(ctx.transport.clone()).notifications().await?;
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = notices.next() => next,
        };
        match next {
            None => {
                tracing::info!("server closed the notification stream");
                return Ok(());
            }
            Some(Ok(notice)) => println!("{}", describe(&notice)),
            // One bad event does not end the subscription.
            Some(Err(TransportError::Decode(detail))) => {
                tracing::warn!(%detail, "skipping notice");
            }
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

fn describe(notice: &ServerNotice) -> String {
    match notice {
        ServerNotice::SharedFileUpdate {
            file_identifier,
            action,
        } => match action {
            ShareAction::Added => format!("shared: {file_identifier}"),
            ShareAction::Removed => format!("unshared: {file_identifier}"),
            ShareAction::Other(other) => format!("share {other}: {file_identifier}"),
        },
        ServerNotice::PasswordChanged => {
            "password changed on the server; update `password` in the config".into()
        }
        ServerNotice::Unknown { kind } => format!("notice: {kind}"),
    }
}

fn print_records(records: &[FileRecord]) {
    for record in records {
        println!(
            "{:<34} {:>10}  {}  {}",
            record.file_identifier,
            format_size(record.total_size),
            record.file_name,
            record.access_url
        );
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
