//! Wire format shared by the toolbus client and server: JSON-RPC envelopes,
//! tool descriptor and result types, and the newline-delimited line codec.

#![warn(missing_docs, clippy::pedantic)]

mod codec;
mod envelope;
mod tool;

pub use codec::{CodecError, Incoming, decode_line, encode_line};
pub use envelope::{
    CallHeaders, CallParams, JSONRPC_VERSION, METHOD_READY, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    Notification, Request, Response, RpcError, ToolListResult,
};
pub use tool::{ContentBlock, InputSchema, ToolDescriptor, ToolResult};
