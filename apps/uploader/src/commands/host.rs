use anyhow::Context as _;
use chunkferry_files::{LocalFilesApi, PasswordApi, TreeQuery};
use chunkferry_protocol::FileNode;

use super::{Context, HostCommand, PasswordCommand};
use crate::config::{Config, config_file_path};

pub(super) async fn run(ctx: &Context, action: HostCommand) -> anyhow::Result<()> {
    let api = LocalFilesApi::new(ctx.transport.clone());
    match action {
        HostCommand::Drives => {
            for drive in api.drives().await? {
                println!("{drive}");
            }
        }
        HostCommand::Index { drives } => {
            let result = api.build_index(&drives).await?;
            println!(
                "indexed {} files on {} in {} ms ({} MiB)",
                result.indexed_file_count,
                result.drives.join(", "),
                result.index_time,
                result.memory_usage
            );
        }
        HostCommand::Search { keyword } => {
            for hit in api.search(&keyword).await? {
                println!("{hit}");
            }
        }
        HostCommand::Tree {
            path,
            depth,
            folders_only,
            files_only,
        } => {
            let query = TreeQuery {
                show_files: !folders_only,
                show_folders: !files_only,
                max_depth: depth,
            };
            match api.file_tree(&path, query).await? {
                Some(tree) => print!("{}", render_tree(&tree)),
                None => anyhow::bail!("{path} is not a directory on the server"),
            }
        }
        HostCommand::Open { dir } => api.open_dir(&dir).await?,
        HostCommand::Encrypt { path, password } => println!("{}", api.encrypt(&path, &password).await?),
        HostCommand::Decrypt { path, password } => println!("{}", api.decrypt(&path, &password).await?),
        HostCommand::Rename { renames } => {
            api.batch_rename(&renames).await?;
            println!("renamed {} files", renames.len());
        }
    }
    Ok(())
}

pub(super) async fn password(ctx: &Context, action: PasswordCommand) -> anyhow::Result<()> {
    let api = PasswordApi::new(ctx.transport.clone());
    match action {
        PasswordCommand::Show => {
            let info = api.get().await?;
            if info.password.is_empty() {
                println!("no password set");
            } else {
                println!("{}", info.password);
            }
            if !info.main_user {
                println!("(not the main user; changes will be refused)");
            }
        }
        PasswordCommand::Set { password, save } => {
            api.set(&password).await?;
            if save {
                let path = match &ctx.config_path {
                    Some(path) => path.clone(),
                    None => config_file_path()?,
                };
                // Reload so command-line overrides are not persisted.
                let mut config = Config::load_from(&path)?;
                config.password = password;
                config
                    .save_to(&path)
                    .with_context(|| format!("saving password to {}", path.display()))?;
                println!("password changed and saved to {}", path.display());
            } else {
                println!("password changed; update `password` in the config to keep access");
            }
        }
    }
    Ok(())
}

/// Indented listing, folders marked with a trailing `/`.
fn render_tree(root: &FileNode) -> String {
    fn walk(node: &FileNode, depth: usize, out: &mut String) {
        let marker = if node.folder { "/" } else { "" };
        let name = if depth == 0 { &node.path } else { &node.name };
        out.push_str(&format!("{:indent$}{name}{marker}\n", "", indent = depth * 2));
        for child in node.children() {
            walk(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    walk(root, 0, &mut out);
    out
}
