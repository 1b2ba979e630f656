use std::fmt;
use std::io;

use canmux_dispatch::DispatchError;
use canmux_driver::DriverError;
use canmux_frame::FrameError;
use canmux_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const NOT_FOUND: i32 = 66;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidMagic
        | FrameError::InvalidDlc { .. }
        | FrameError::InvalidId { .. }
        | FrameError::Truncated(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::EndOfStream => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Frame(err) => frame_error(context, err),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn dispatch_error(context: &str, err: DispatchError) -> CliError {
    match err {
        DispatchError::Transport(err) => transport_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn driver_error(context: &str, err: DriverError) -> CliError {
    match err {
        DriverError::Dispatch(err) => dispatch_error(context, err),
        DriverError::Transport(err) => transport_error(context, err),
        DriverError::Frame(err) => frame_error(context, err),
        DriverError::Io(err) => io_error(context, err),
        DriverError::Config(_) | DriverError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}
