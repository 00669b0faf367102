// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolves the interface name and MAC address the control plane's
//! `ADD_MRP` needs but only carries an ifindex for: `mrp-core`'s
//! `AddRequest` wants both (for logging and for the bridge-driver calls
//! that still address ports by name on some backends).

use std::ffi::CStr;
use std::fs;
use std::io;

use mrp_proto::MacAddr;

pub fn ifname_of(ifindex: u32) -> io::Result<String> {
    let mut buf = [0u8; libc::IF_NAMESIZE];
    let ptr = unsafe { libc::if_indextoname(ifindex, buf.as_mut_ptr() as *mut libc::c_char) };
    if ptr.is_null() {
        return Err(io::Error::last_os_error());
    }
    let name = unsafe { CStr::from_ptr(buf.as_ptr() as *const libc::c_char) };
    Ok(name.to_string_lossy().into_owned())
}

pub fn mac_of(ifname: &str) -> io::Result<MacAddr> {
    let path = format!("/sys/class/net/{ifname}/address");
    let text = fs::read_to_string(&path)?;
    parse_mac(text.trim()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, format!("{path} did not contain a MAC address"))
    })
}

fn parse_mac(text: &str) -> Option<MacAddr> {
    let mut bytes = [0u8; 6];
    let mut parts = text.split(':');
    for b in bytes.iter_mut() {
        *b = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(MacAddr::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_separated_mac() {
        assert_eq!(parse_mac("01:15:4e:00:00:01"), Some(MacAddr::new([0x01, 0x15, 0x4e, 0x00, 0x00, 0x01])));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(parse_mac("01:15:4e:00:00"), None);
        assert_eq!(parse_mac("01:15:4e:00:00:01:02"), None);
    }
}
