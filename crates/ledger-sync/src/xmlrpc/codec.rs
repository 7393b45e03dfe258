//! # XML-RPC Codec
//!
//! Request construction and response decoding, with no I/O.
//!
//! ## Envelopes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  build_call("execute_kw", [db, uid, pw, "res.partner", "search", ...]) │
//! │                                                                         │
//! │  <?xml version="1.0"?>                                                 │
//! │  <methodCall>                                                          │
//! │    <methodName>execute_kw</methodName>                                 │
//! │    <params>                                                            │
//! │      <param><value><string>prod</string></value></param>              │
//! │      <param><value><int>7</int></value></param>                       │
//! │      ...                                                               │
//! │    </params>                                                           │
//! │  </methodCall>                                                         │
//! │                                                                         │
//! │  decode_response(body)                                                 │
//! │                                                                         │
//! │  <methodResponse>                                                      │
//! │    <params><param><value>…</value></param></params>   ──► Ok(value)   │
//! │  </methodResponse>                                                     │
//! │                                                                         │
//! │  <methodResponse>                                                      │
//! │    <fault><value><struct>…</struct></value></fault>   ──► RemoteFault │
//! │  </methodResponse>                                                     │
//! │                                                                         │
//! │  anything else                                        ──► Protocol    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Type Mapping
//! | Wire             | RpcValue                         |
//! |------------------|----------------------------------|
//! | `string`         | `String`                         |
//! | `int`, `i4`, `i8`| `Int`                            |
//! | `double`         | `Double`                         |
//! | `boolean`        | `Bool` (`"1"` is true)           |
//! | `array`          | `Array` (order kept)             |
//! | `struct`         | `Struct` (order kept)            |
//! | `nil`            | `Nil`                            |
//! | bare text        | `String`                         |
//! | any other type   | `String` (its text)              |

use std::fmt::Write;

use super::value::{RpcStruct, RpcValue};
use super::xml::{escape, parse_document, Element};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Encoding
// =============================================================================

/// Encodes one value as a `<value>` element.
pub fn encode_value(value: &RpcValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &RpcValue) {
    out.push_str("<value>");
    match value {
        RpcValue::Nil => out.push_str("<string></string>"),
        RpcValue::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        RpcValue::Int(i) => {
            let _ = write!(out, "<int>{i}</int>");
        }
        RpcValue::Double(d) => {
            let _ = write!(out, "<double>{d}</double>");
        }
        RpcValue::String(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s));
        }
        RpcValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        RpcValue::Struct(members) => {
            out.push_str("<struct>");
            for (key, member) in members.iter() {
                let _ = write!(out, "<member><name>{}</name>", escape(key));
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Builds a complete `methodCall` document.
pub fn build_call(method: &str, params: &[RpcValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>");
    let _ = write!(
        out,
        "<methodCall><methodName>{}</methodName><params>",
        escape(method)
    );
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

// =============================================================================
// Decoding
// =============================================================================

/// Decodes a `methodResponse` body.
///
/// ## Errors
/// * `SyncError::RemoteFault` - the body carries a fault; the message is
///   the fault value, as JSON text when it is not a scalar
/// * `SyncError::Protocol` - the body is not a readable response
pub fn decode_response(body: &str) -> SyncResult<RpcValue> {
    let root = parse_document(body).map_err(|e| SyncError::Protocol(e.to_string()))?;

    if root.name != "methodResponse" {
        return Err(SyncError::Protocol(format!(
            "expected <methodResponse>, got <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let message = match fault.child("value") {
            Some(value) => fault_message(&decode_value(value)?),
            None => "unspecified fault".to_string(),
        };
        return Err(SyncError::RemoteFault(message));
    }

    let value = root
        .child("params")
        .and_then(|p| p.child("param"))
        .and_then(|p| p.child("value"))
        .ok_or_else(|| SyncError::Protocol("response has no return value".into()))?;

    decode_value(value)
}

fn fault_message(value: &RpcValue) -> String {
    match value {
        RpcValue::String(s) => s.clone(),
        RpcValue::Int(i) => i.to_string(),
        RpcValue::Double(d) => d.to_string(),
        RpcValue::Bool(b) => b.to_string(),
        RpcValue::Nil => String::new(),
        other => other.to_json().to_string(),
    }
}

/// Decodes one `<value>` element.
pub fn decode_value(value: &Element) -> SyncResult<RpcValue> {
    let Some(typed) = value.first_element() else {
        return Ok(RpcValue::String(value.text()));
    };

    match typed.name.as_str() {
        "string" => Ok(RpcValue::String(typed.text())),
        "int" | "i4" | "i8" => {
            let text = typed.text();
            text.trim()
                .parse::<i64>()
                .map(RpcValue::Int)
                .map_err(|_| SyncError::Protocol(format!("invalid integer '{}'", text.trim())))
        }
        "double" => {
            let text = typed.text();
            text.trim()
                .parse::<f64>()
                .map(RpcValue::Double)
                .map_err(|_| SyncError::Protocol(format!("invalid double '{}'", text.trim())))
        }
        "boolean" => Ok(RpcValue::Bool(typed.text().trim() == "1")),
        "nil" => Ok(RpcValue::Nil),
        "dateTime.iso8601" | "base64" => Ok(RpcValue::String(typed.text())),
        "array" => {
            let items = match typed.child("data") {
                Some(data) => data
                    .elements()
                    .filter(|e| e.name == "value")
                    .map(decode_value)
                    .collect::<SyncResult<Vec<_>>>()?,
                None => Vec::new(),
            };
            Ok(RpcValue::Array(items))
        }
        "struct" => {
            let mut members = RpcStruct::new();
            for member in typed.elements().filter(|e| e.name == "member") {
                let name = member
                    .child("name")
                    .map(Element::text)
                    .ok_or_else(|| SyncError::Protocol("struct member without a name".into()))?;
                let decoded = match member.child("value") {
                    Some(v) => decode_value(v)?,
                    None => RpcValue::Nil,
                };
                members.insert(name, decoded);
            }
            Ok(RpcValue::Struct(members))
        }
        // Unknown types (<date>, vendor extensions) degrade to their text.
        _ => Ok(RpcValue::String(typed.text())),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
