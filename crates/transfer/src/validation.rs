use std::path::{Component, Path};

use crate::TransferError;

/// Checks a destination folder before it is sent to the backend.
///
/// The empty string means the storage root and is accepted. Anything that
/// could climb out of the storage root is rejected: absolute paths, `..`
/// components and Windows drive or UNC prefixes.
pub fn validate_folder(folder: &str) -> Result<(), TransferError> {
    if folder.is_empty() {
        return Ok(());
    }

    if folder.contains('\0') {
        return Err(TransferError::InvalidPath(format!(
            "NUL byte in folder: {folder:?}"
        )));
    }

    let path = Path::new(folder);
    if path.is_absolute() || folder.starts_with('/') || folder.starts_with('\\') {
        return Err(TransferError::InvalidPath(format!(
            "folder must be relative: {folder}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "folder may not contain '..': {folder}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "folder must be relative: {folder}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    if folder.split(['/', '\\']).any(|seg| seg == "..") {
        return Err(TransferError::InvalidPath(format!(
            "folder may not contain '..': {folder}"
        )));
    }

    Ok(())
}
