//! Shared fixtures for command tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::rc::Rc;
use std::time::Duration;

use crate::cli::args::Verbosity;
use crate::cli::context::CmdContext;
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::printer::Printer;
use crate::core::auth::CredentialStore;
use crate::core::cancel::CancelToken;
use crate::core::config::ConfigStore;
use crate::core::errors::CliError;
use crate::services::{ApiRequest, ApiResponse, HttpTransport};

pub const TEST_PROJECT_ID: &str = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";

/// In-memory writer whose clones share one buffer
#[derive(Clone, Default)]
pub struct CaptureBuffer(Rc<RefCell<Vec<u8>>>);

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Recorded {
    requests: Vec<ApiRequest>,
    responses: VecDeque<ApiResponse>,
}

/// Transport that records requests and replays queued responses
#[derive(Clone, Default)]
pub struct RecordingTransport(Rc<RefCell<Recorded>>);

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: serde_json::Value) {
        self.respond_text(status, &body.to_string());
    }

    pub fn respond_text(&self, status: u16, body: &str) {
        self.0.borrow_mut().responses.push_back(ApiResponse {
            status,
            status_text: String::new(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.0.borrow().requests.clone()
    }
}

impl HttpTransport for RecordingTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, CliError> {
        let mut inner = self.0.borrow_mut();
        inner.requests.push(request.clone());
        inner.responses.pop_front().ok_or_else(|| CliError::Http {
            operation: format!("{} {}", request.method, request.url),
            message: "no response queued".to_string(),
        })
    }
}

pub struct TestHandles {
    pub out: CaptureBuffer,
    pub err: CaptureBuffer,
    pub transport: RecordingTransport,
}

/// Context with captured streams, `stdin` as prompt input and a fake token
pub fn test_context(transport: RecordingTransport, stdin: &str) -> (CmdContext, TestHandles) {
    context_with_verbosity(Verbosity::Info, transport, stdin)
}

/// Like `test_context`, but printing debug messages
pub fn debug_context(transport: RecordingTransport, stdin: &str) -> (CmdContext, TestHandles) {
    context_with_verbosity(Verbosity::Debug, transport, stdin)
}

fn context_with_verbosity(
    verbosity: Verbosity,
    transport: RecordingTransport,
    stdin: &str,
) -> (CmdContext, TestHandles) {
    let out = CaptureBuffer::default();
    let err = CaptureBuffer::default();
    let printer = Printer::with_io(
        verbosity,
        Box::new(out.clone()),
        Box::new(err.clone()),
        Box::new(Cursor::new(stdin.to_string())),
    );
    let ctx = CmdContext {
        printer,
        global: GlobalFlagModel {
            project_id: Some(TEST_PROJECT_ID.to_string()),
            region: Some("eu01".to_string()),
            verbosity,
            ..Default::default()
        },
        config: ConfigStore::in_memory(),
        credentials: CredentialStore::new(None),
        transport: Box::new(transport.clone()),
        cancel: CancelToken::new(),
        env_token: Some("test-token".to_string()),
        poll_interval: Duration::ZERO,
        wait_timeout: Duration::from_secs(5),
    };
    (
        ctx,
        TestHandles {
            out,
            err,
            transport,
        },
    )
}
