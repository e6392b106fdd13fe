//! Response context for services.
//!
//! Services answer with a JSON [`ResponseBody`]:
//!
//! ```text
//! {"success":true,"code":0,"message":"Success","data":{...}}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scheduler::SendHandle;

/// Code of a successful response.
pub const CODE_OK: i32 = 0;

/// Request body could not be decoded.
pub const CODE_INVALID_BODY: i32 = -1;

/// One entry of a request list is malformed.
pub const CODE_INVALID_ITEM: i32 = -2;

/// A required request field is missing.
pub const CODE_MISSING_PARAMETER: i32 = -3;

/// JSON envelope of every service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub success: bool,
    pub code: i32,
    pub message: String,
    /// `null` when the response carries no data.
    pub data: serde_json::Value,
}

impl ResponseBody {
    /// Successful response with `data`.
    pub fn success(message: &str, data: serde_json::Value) -> Self {
        Self {
            success: true,
            code: CODE_OK,
            message: message.to_string(),
            data,
        }
    }

    /// Failed response without data.
    pub fn failure(code: i32, message: &str) -> Self {
        Self {
            success: false,
            code,
            message: message.to_string(),
            data: serde_json::Value::Null,
        }
    }
}

type Responder = Arc<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

/// Context passed to services for answering a request.
///
/// `Clone` and cheap; responses are queued, never awaited.
#[derive(Clone, Default)]
pub struct ResponseContext {
    responder: Option<Responder>,
}

impl ResponseContext {
    /// Create a context that discards responses (for testing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond through a scheduler's send queue.
    pub fn from_sender(sender: SendHandle) -> Self {
        Self::with_responder(move |data| sender.send(data))
    }

    /// Respond through an arbitrary function.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
        }
    }

    /// Send a response body.
    pub fn respond(&self, body: &ResponseBody) -> Result<()> {
        let data = serde_json::to_vec(body)?;
        self.respond_raw(&data)
    }

    /// Send raw response bytes.
    pub fn respond_raw(&self, data: &[u8]) -> Result<()> {
        match &self.responder {
            Some(responder) => responder(data),
            // No responder configured (testing mode)
            None => Ok(()),
        }
    }

    /// Send a successful response.
    pub fn success(&self, message: &str, data: serde_json::Value) -> Result<()> {
        self.respond(&ResponseBody::success(message, data))
    }

    /// Send a failed response.
    pub fn failure(&self, code: i32, message: &str) -> Result<()> {
        self.respond(&ResponseBody::failure(code, message))
    }
}
