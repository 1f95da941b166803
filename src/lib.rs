#![warn(
    clippy::all,
    clippy::cargo,
    clippy::perf,
    clippy::style,
    clippy::correctness,
    clippy::suspicious
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod protocol;
pub mod stream;

pub use config::{DecodePolicy, ReaderConfig};
pub use error::{FrontendError, Result};
pub use protocol::{
    FrontendMessage, MessageReader, PasswordMessage, Phase, QueryMessage, SslRequest,
    StartupMessage, StartupPacket, Terminate, read_message,
};
pub use stream::FrontendStream;
