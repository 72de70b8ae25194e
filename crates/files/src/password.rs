use chunkferry_protocol::PasswordInfo;
use chunkferry_protocol::constants::{GET_PASSWORD_PATH, SET_PASSWORD_PATH};
use chunkferry_transport::{Form, HttpTransport, Request, TransportError};
use tracing::info;

/// Client for the backend's access password.
#[derive(Clone)]
pub struct PasswordApi {
    transport: HttpTransport,
}

impl PasswordApi {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Current password and whether this client is the host's main user.
    pub async fn get(&self) -> Result<PasswordInfo, TransportError> {
        let raw = self
            .transport
            .send::<String>(Request::get(GET_PASSWORD_PATH))
            .await?
            .unwrap_or_default();
        Ok(PasswordInfo::from_wire(&raw))
    }

    /// Replaces the password. Connected clients get a password-changed notice.
    pub async fn set(&self, password: &str) -> Result<(), TransportError> {
        let form = Form::new().text("password", password);
        self.transport
            .execute(Request::post(SET_PASSWORD_PATH).form(form))
            .await?;
        info!("access password changed");
        Ok(())
    }
}
