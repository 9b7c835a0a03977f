//! Wire Protocol
//!
//! This module defines the JSON frames exchanged over the WebSocket.
//!
//! ## Overview
//!
//! The client sends one command per frame and receives one response per
//! frame, in order. Commands name an `action` and carry an ordered list of
//! `parameters`; responses echo the action and carry a string `message`.
//!
//! ## Modules
//!
//! - `types`: `Command`, `Response` and the typed `Request` view
//! - `parser`: JSON encoding and decoding of frames
//!
//! ## Example
//!
//! ```
//! use keyreg::protocol::{decode_command, encode_response, Request, Response};
//!
//! let cmd = decode_command(br#"{"action":"read_identifier","parameters":[{"key":"key","value":"pk1"}]}"#).unwrap();
//! assert_eq!(Request::from(&cmd), Request::ReadIdentifier { key: "pk1".into() });
//!
//! let text = encode_response(&Response::unrecognized()).unwrap();
//! assert_eq!(text, r#"{"action":"*","message":"unrecognized command"}"#);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode_command, encode_response, ProtocolError, ProtocolResult};
pub use types::{
    Action, Command, Parameter, Request, Response, UNRECOGNIZED_ACTION, UNRECOGNIZED_MESSAGE,
};
