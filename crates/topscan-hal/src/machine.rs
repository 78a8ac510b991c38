//! [`MachineClient`] – command and telemetry link to the positioning machine.
//!
//! The machine controller exposes two HTTP endpoints under a base URL:
//!
//! | Endpoint | Method | Body | Purpose |
//! |---|---|---|---|
//! | `<base>/code` | POST | `runtime=g&cmd=<G-code>` | queue a motion command |
//! | `<base>/status` | GET | – | report the current position |
//!
//! The status body is expected to look like
//! `{"data":{"status":{"posx":..,"posy":..,"posz":..}}}`.
//!
//! Every operation is one blocking round trip over the client's single
//! [`Transport`].  Operations take `&mut self`, so a second request cannot be
//! issued on the same client while one is outstanding.
//!
//! # Example
//!
//! ```rust
//! use topscan_hal::machine::MachineClient;
//! use topscan_hal::sim::SimMachine;
//!
//! let mut client = MachineClient::with_transport("http://machine/api", SimMachine::new());
//! client.send_move(1.0, 2.0, 3.0).unwrap();
//!
//! let status = client.query_position();
//! assert!(status.success);
//! assert_eq!((status.x, status.y, status.z), (1.0, 2.0, 3.0));
//! ```

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;
use topscan_types::StatusResponse;
use tracing::{debug, instrument, warn};

/// Upper bound on the length of a single G-code command string.
pub const MAX_COMMAND_LEN: usize = 300;

pub const CODE_PATH: &str = "/code";
pub const STATUS_PATH: &str = "/status";

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failure of the underlying request/response exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Machine unreachable: {0}")]
    Unreachable(String),
}

/// Errors that can arise from [`MachineClient`] command operations.
#[derive(Error, Debug)]
pub enum MachineError {
    #[error("Command is {len} characters, limit is {max}")]
    CommandTooLong { len: usize, max: usize },

    #[error("Command is empty")]
    EmptyCommand,

    #[error("Command contains forbidden character {ch:?}")]
    ForbiddenCharacter { ch: char },

    #[error("Coordinate {axis} is not finite: {value}")]
    NonFiniteCoordinate { axis: char, value: f32 },

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport seam
// ─────────────────────────────────────────────────────────────────────────────

/// One request/response connection to the machine controller.
pub trait Transport: Send {
    /// POST `body` to `url`; the response body is discarded.
    fn post(&mut self, url: &str, body: &str) -> Result<(), TransportError>;

    /// GET `url` and return the response body.
    fn get(&mut self, url: &str) -> Result<String, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post(&mut self, url: &str, body: &str) -> Result<(), TransportError> {
        (**self).post(url, body)
    }

    fn get(&mut self, url: &str) -> Result<String, TransportError> {
        (**self).get(url)
    }
}

/// [`Transport`] backed by a blocking `reqwest` client.
///
/// The client keeps its connection alive between requests and sends the
/// controller's required headers with every call.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the TLS backend or client cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Self::with_builder(reqwest::blocking::Client::builder(), timeout)
    }

    fn with_builder(
        builder: reqwest::blocking::ClientBuilder,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = builder
            .default_headers(default_headers())
            .user_agent(concat!("topscan/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

/// Headers the controller expects on both endpoints.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("charsets"),
        HeaderValue::from_static("UTF-8"),
    );
    headers
}

impl Transport for HttpTransport {
    fn post(&mut self, url: &str, body: &str) -> Result<(), TransportError> {
        self.client
            .post(url)
            .body(body.to_owned())
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn get(&mut self, url: &str) -> Result<String, TransportError> {
        let body = self.client.get(url).send()?.error_for_status()?.text()?;
        Ok(body)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command formatting
// ─────────────────────────────────────────────────────────────────────────────

/// Format a rapid move (`G0`) to (`x`, `y`, `z`) with six decimals per axis.
///
/// # Errors
///
/// Returns [`MachineError::NonFiniteCoordinate`] for NaN or infinite input
/// and [`MachineError::CommandTooLong`] if the formatted command exceeds
/// [`MAX_COMMAND_LEN`].
pub fn format_move(x: f32, y: f32, z: f32) -> Result<String, MachineError> {
    for (axis, value) in [('X', x), ('Y', y), ('Z', z)] {
        if !value.is_finite() {
            return Err(MachineError::NonFiniteCoordinate { axis, value });
        }
    }
    let command = format!("G0X{x:.6}Y{y:.6}Z{z:.6}");
    validate_command(&command)?;
    Ok(command)
}

/// Characters that would end the `cmd` form field or the G-code line.
const FORBIDDEN_CHARS: [char; 3] = ['&', '\r', '\n'];

/// Check a command string against the protocol's length bound and the
/// characters the form body cannot carry.
///
/// # Errors
///
/// Returns [`MachineError::EmptyCommand`],
/// [`MachineError::ForbiddenCharacter`] or [`MachineError::CommandTooLong`].
pub fn validate_command(command: &str) -> Result<(), MachineError> {
    if command.trim().is_empty() {
        return Err(MachineError::EmptyCommand);
    }
    if let Some(ch) = command.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(MachineError::ForbiddenCharacter { ch });
    }
    if command.len() > MAX_COMMAND_LEN {
        return Err(MachineError::CommandTooLong {
            len: command.len(),
            max: MAX_COMMAND_LEN,
        });
    }
    Ok(())
}

/// Request body for the `/code` endpoint.
pub fn command_body(command: &str) -> String {
    format!("runtime=g&cmd={command}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Telemetry parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a `/status` response body.
///
/// The shape is validated outermost first: the document must be an object,
/// holding a `data` object, holding a `status` object, holding numeric
/// `posx`, `posy` and `posz`.  Any deviation yields
/// [`StatusResponse::failed`].
pub fn parse_status(body: &str) -> StatusResponse {
    let Ok(document) = serde_json::from_str::<Value>(body) else {
        return StatusResponse::failed();
    };
    let Some(root) = document.as_object() else {
        return StatusResponse::failed();
    };
    let Some(data) = root.get("data").and_then(Value::as_object) else {
        return StatusResponse::failed();
    };
    let Some(status) = data.get("status").and_then(Value::as_object) else {
        return StatusResponse::failed();
    };
    let field = |name: &str| status.get(name).and_then(Value::as_f64);
    match (field("posx"), field("posy"), field("posz")) {
        (Some(x), Some(y), Some(z)) => {
            let (x, y, z) = (x as f32, y as f32, z as f32);
            if x.is_finite() && y.is_finite() && z.is_finite() {
                StatusResponse::ok(x, y, z)
            } else {
                StatusResponse::failed()
            }
        }
        _ => StatusResponse::failed(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MachineClient
// ─────────────────────────────────────────────────────────────────────────────

/// Observer notified with the outcome of every position poll.
pub type PositionHandler = Box<dyn FnMut(&StatusResponse) + Send>;

/// Owned connection to one positioning machine.
///
/// Construct once and reuse; all requests go through the same transport.
pub struct MachineClient<T: Transport = HttpTransport> {
    base_url: String,
    transport: T,
    position_handler: Option<PositionHandler>,
}

impl MachineClient<HttpTransport> {
    /// Create a client talking HTTP to `base_url`
    /// (e.g. `"http://192.168.0.10:8000/api/v1"`).
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Transport`] if the HTTP client cannot be built.
    pub fn connect(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MachineError> {
        let transport = HttpTransport::new(timeout)?;
        Ok(Self::with_transport(base_url, transport))
    }
}

impl<T: Transport> MachineClient<T> {
    /// Create a client over an arbitrary transport.
    pub fn with_transport(base_url: impl Into<String>, transport: T) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            position_handler: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Point subsequent requests at a different controller.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register the observer invoked once per [`query_position`][Self::query_position].
    /// Replaces any previously registered handler.
    pub fn set_position_handler(&mut self, handler: impl FnMut(&StatusResponse) + Send + 'static) {
        self.position_handler = Some(Box::new(handler));
    }

    pub fn clear_position_handler(&mut self) {
        self.position_handler = None;
    }

    /// Command a rapid move to (`x`, `y`, `z`).
    ///
    /// Success only means the controller accepted the request; whether the
    /// stage reached the target is observed through
    /// [`query_position`][Self::query_position].
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`format_move`] before anything is
    /// sent, or [`MachineError::Transport`] if the request fails.  No retry
    /// is attempted.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub fn send_move(&mut self, x: f32, y: f32, z: f32) -> Result<(), MachineError> {
        let command = format_move(x, y, z)?;
        self.send_raw_command(&command)
    }

    /// Send a pre-formatted G-code command.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::EmptyCommand`],
    /// [`MachineError::ForbiddenCharacter`] or
    /// [`MachineError::CommandTooLong`] without sending, or
    /// [`MachineError::Transport`] if the request fails.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub fn send_raw_command(&mut self, command: &str) -> Result<(), MachineError> {
        validate_command(command)?;
        let url = self.endpoint(CODE_PATH);
        let body = command_body(command);
        debug!(%url, %body, "sending G-code");
        self.transport.post(&url, &body).map_err(|e| {
            warn!(error = %e, "G-code command failed");
            MachineError::from(e)
        })
    }

    /// Poll the controller for its current position.
    ///
    /// Never fails: transport errors and malformed payloads both yield
    /// [`StatusResponse::failed`].  The registered position handler, if any,
    /// receives the same value before it is returned.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub fn query_position(&mut self) -> StatusResponse {
        let url = self.endpoint(STATUS_PATH);
        let status = match self.transport.get(&url) {
            Ok(body) => {
                let status = parse_status(&body);
                if !status.success {
                    warn!(body_len = body.len(), "malformed status payload");
                }
                status
            }
            Err(e) => {
                warn!(error = %e, "status poll failed");
                StatusResponse::failed()
            }
        };
        if let Some(handler) = self.position_handler.as_mut() {
            handler(&status);
        }
        status
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
