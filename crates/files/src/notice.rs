use chunkferry_protocol::NotifyMessage;

/// What happened to a shared file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareAction {
    Added,
    Removed,
    Other(String),
}

impl ShareAction {
    fn parse(action: &str) -> Self {
        match action {
            "add" => ShareAction::Added,
            // The server spells removal as "remote".
            "remove" | "remote" | "delete" => ShareAction::Removed,
            other => ShareAction::Other(other.to_string()),
        }
    }
}

/// A decoded server push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotice {
    /// The shared-file set changed.
    SharedFileUpdate {
        file_identifier: String,
        action: ShareAction,
    },
    /// The access password was changed; stored credentials are stale.
    PasswordChanged,
    /// A notice type this client does not know.
    Unknown { kind: String },
}

impl From<NotifyMessage> for ServerNotice {
    fn from(msg: NotifyMessage) -> Self {
        match msg.kind.as_str() {
            "sharedFileUpdate" => ServerNotice::SharedFileUpdate {
                file_identifier: msg.field("fileIdentifier").unwrap_or_default().to_string(),
                action: ShareAction::parse(msg.field("action").unwrap_or_default()),
            },
            "setPassword" => ServerNotice::PasswordChanged,
            _ => ServerNotice::Unknown { kind: msg.kind },
        }
    }
}
