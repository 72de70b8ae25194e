use std::sync::RwLock;

/// Supplies the credential attached to every outgoing request.
///
/// Called once per request, so a provider can hand out a rotated value
/// without rebuilding the transport.
pub trait CredentialProvider: Send + Sync {
    /// `None` (or an empty string) sends no `Authorization` header.
    fn credential(&self) -> Option<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn credential(&self) -> Option<String> {
        self()
    }
}

/// A credential held in memory, replaceable at runtime.
#[derive(Debug, Default)]
pub struct StaticCredential {
    value: RwLock<Option<String>>,
}

impl StaticCredential {
    pub fn new(value: Option<String>) -> Self {
        Self {
            value: RwLock::new(value.filter(|v| !v.is_empty())),
        }
    }

    /// Replaces the stored credential (e.g. after the server announces a new password).
    pub fn set(&self, value: Option<String>) {
        *self.value.write().unwrap() = value.filter(|v| !v.is_empty());
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Option<String> {
        self.value.read().unwrap().clone()
    }
}
