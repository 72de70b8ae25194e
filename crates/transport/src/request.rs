use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart;
use serde::Serialize;

use crate::TransportError;

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub(crate) enum Body {
    #[default]
    Empty,
    Json(serde_json::Value),
    Form(Form),
}

/// A request relative to the transport's base URL.
///
/// Plain data, so a retried task can rebuild and resend it.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Body,
    /// Whether an application failure is shown to the user.
    pub(crate) notify: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
            notify: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, TransportError> {
        let value = serde_json::to_value(body)
            .map_err(|e| TransportError::Decode(format!("request body: {e}")))?;
        self.body = Body::Json(value);
        Ok(self)
    }

    /// Sets a `multipart/form-data` body.
    pub fn form(mut self, form: Form) -> Self {
        self.body = Body::Form(form);
        self
    }

    /// Leaves reporting an application failure to the caller.
    pub fn quiet(mut self) -> Self {
        self.notify = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn header_map(&self) -> Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[derive(Debug, Clone)]
enum Field {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// A `multipart/form-data` body that can be cloned and resent.
#[derive(Debug, Clone, Default)]
pub struct Form {
    fields: Vec<(String, Field)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((name.into(), Field::Text(value.to_string())));
        self
    }

    /// Adds a text field only when `value` is `Some`.
    pub fn text_opt(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.fields.push((
            name.into(),
            Field::File {
                file_name: file_name.into(),
                mime,
                bytes,
            },
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_multipart(self) -> Result<multipart::Form, TransportError> {
        let mut form = multipart::Form::new();
        for (name, field) in self.fields {
            form = match field {
                Field::Text(value) => form.text(name, value),
                Field::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut part = multipart::Part::bytes(bytes).file_name(file_name);
                    if let Some(mime) = mime {
                        part = part
                            .mime_str(&mime)
                            .map_err(|_| TransportError::InvalidHeader(format!("content type {mime}")))?;
                    }
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}
