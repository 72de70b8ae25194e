//! File library client.
//!
//! Paged listing of stored files, LAN sharing toggles, deletion, and the
//! server's push notifications. [`LocalFilesApi`] reaches the backend
//! host's own filesystem; [`PasswordApi`] manages the access password.

mod library;
mod local;
mod notice;
mod password;
#[cfg(test)]
mod test_support;

pub use library::{FilesApi, PageQuery};
pub use local::{LocalFilesApi, TreeQuery};
pub use notice::{ServerNotice, ShareAction};
pub use password::PasswordApi;
