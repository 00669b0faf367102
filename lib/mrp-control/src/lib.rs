// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire records and framing for the control-plane RPC (§6): the
//! length-prefixed protocol `mrpd` exposes over an abstract `AF_UNIX
//! SOCK_DGRAM` endpoint and `mrpctl` speaks as a client.
//!
//! This crate only knows about bytes on the wire, mirroring how
//! [`mrp_proto`] only knows about the on-network MRP frame codec; neither
//! `mrpd` nor `mrpctl` link against `mrp-core`'s state-machine types
//! through here.

mod error;
mod framing;
mod records;

pub use error::{Error, Result};
pub use framing::{
    decode_record, decode_reply, decode_request, encode_empty_reply, encode_empty_request,
    encode_reply, encode_request,
};
pub use records::{
    AddMrpRequest, Cmd, DelMrpRequest, GetMrpReply, Header, MrpStatus, MAX_MRP_INSTANCES,
};
