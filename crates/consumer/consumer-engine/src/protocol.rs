//! Decoded inbound/outbound shapes the consumer worker dispatches against.
//!
//! The concrete wire encoding is out of scope here; this is the boundary
//! between "bytes on a `Channel`" and the state machine — analogous to a
//! decode layer that already ran, leaving only the fields the scheduler,
//! session, and item registry need to act on.

#[derive(Debug, Clone)]
pub enum InboundEvent {
    LoginRefresh { supports_post: bool },
    LoginReject { reason: String },
    DirectoryRefresh { service_found: bool },
    DictionaryFieldComplete,
    DictionaryEnumComplete,
    ItemRefresh { stream_id: u32 },
    /// An update or generic message; `stamp_nanos` is `Some` when the
    /// matching `TIM_TRK_*` field was present and nonzero (§4.7).
    ItemUpdate { stream_id: u32, stamp_nanos: Option<u64> },
    GenericMsg { stream_id: u32, stamp_nanos: Option<u64> },
    /// A final (closed/not-found/etc.) status on a stream.
    ItemStatusFinal { stream_id: u32 },
    Ping,
}

#[derive(Debug, Clone)]
pub enum OutboundRequest {
    Login { uname: String, app_name: String, supports_post: bool },
    DirectoryRequest,
    DictionaryRequest { field: bool },
    ItemRequest { stream_id: u32, snapshot: bool },
    Post { stream_id: u32, stamp_nanos: Option<u64> },
    Generic { stream_id: u32, stamp_nanos: Option<u64> },
    Ping,
}
