//! Endpoint paths, header names and protocol sentinels.

/// Envelope `code` that marks a successful response.
pub const SUCCESS_CODE: i64 = 200;

/// Header selecting the backend storage target for upload calls.
pub const STORAGE_TYPE_HEADER: &str = "Storage-Type";

// ---------------------------------------------------------------------------
// Upload endpoints
// ---------------------------------------------------------------------------

/// `GET ?identifier=`: prior session state for a fingerprint.
pub const UPLOAD_PROGRESS_PATH: &str = "/upload/getUploadProgress";

/// `POST`: create a multipart upload session.
pub const CREATE_MULTIPART_PATH: &str = "/upload/createMultipartUpload";

/// `GET ?identifier=&partNumber=`: pre-signed destination for one part.
pub const PRESIGN_PART_PATH: &str = "/upload/getPreSignUploadUrl";

/// `POST ?identifier=`: finalize a multipart upload.
pub const MERGE_PATH: &str = "/upload/merge";

/// `POST` multipart form: direct small-file upload.
pub const DIRECT_UPLOAD_PATH: &str = "/upload";

/// `POST` multipart form: upload one part's bytes to the backend itself.
pub const UPLOAD_PART_PATH: &str = "/upload/part";

// ---------------------------------------------------------------------------
// File library endpoints
// ---------------------------------------------------------------------------

pub const FILE_PAGE_PATH: &str = "/file/page";
pub const SHARED_FILES_PATH: &str = "/file/sharedFiles";
pub const ADD_SHARED_FILE_PATH: &str = "/file/addSharedFile";
pub const UNSHARE_FILE_PATH: &str = "/file/unShareFile";
pub const DELETE_FILE_PATH: &str = "/file/deleteFile";
pub const ENABLE_SHARE_PATH: &str = "/file/enableShare";
pub const SHARE_STATUS_PATH: &str = "/file/getShareStatus";
/// LAN address other devices reach shared files at.
pub const SHARE_ADDRESS_PATH: &str = "/file/shareAddress";

// ---------------------------------------------------------------------------
// Backend host filesystem
// ---------------------------------------------------------------------------

/// `GET`: drive roots on the backend host.
pub const LOCAL_DRIVES_PATH: &str = "/localFile/getDrives";
/// `POST` JSON array of drive roots: (re)build the search index.
pub const LOCAL_BUILD_INDEX_PATH: &str = "/localFile/buildIndex";
/// `GET ?keyword=`: indexed paths matching a keyword.
pub const LOCAL_SEARCH_PATH: &str = "/localFile/search";
/// `GET ?path=&showFiles=&showFolders=&maxDepth=`
pub const LOCAL_FILE_TREE_PATH: &str = "/localFile/getFileTree";
/// `POST` form `dir`: reveal a directory in the host's file manager.
pub const LOCAL_OPEN_DIR_PATH: &str = "/localFile/openDir";
/// `POST` form `filePath`, `password`.
pub const LOCAL_ENCRYPT_PATH: &str = "/localFile/encrypt";
/// `POST` form `filePath`, `password`.
pub const LOCAL_DECRYPT_PATH: &str = "/localFile/decrypt";
/// `POST` JSON array of renames, applied all or nothing.
pub const LOCAL_BATCH_RENAME_PATH: &str = "/localFile/batchRenameFile";

// ---------------------------------------------------------------------------
// Access password
// ---------------------------------------------------------------------------

pub const GET_PASSWORD_PATH: &str = "/config/getPassword";
/// `POST` form `password`.
pub const SET_PASSWORD_PATH: &str = "/config/setPassword";

/// Server-sent notification stream.
pub const SSE_SUBSCRIBE_PATH: &str = "/sse/subscribe";
