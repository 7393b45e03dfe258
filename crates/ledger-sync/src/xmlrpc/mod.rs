//! # XML-RPC
//!
//! A hand-built client side of XML-RPC: the value model, a small XML
//! reader, the envelope codec, and the HTTP transport that carries it.

pub mod codec;
pub mod transport;
pub mod value;
pub mod xml;

pub use codec::{build_call, decode_response, encode_value};
pub use transport::{HttpRpcTransport, RpcTransport};
pub use value::{RpcStruct, RpcValue};
