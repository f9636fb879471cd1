/**
    xenstore-rs provides a Rust based xenstore implementation.
    Copyright (C) 2016 Star Lab Corp.

    This program is free software; you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation; either version 2 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License along
    with this program; if not, see <http://www.gnu.org/licenses/>.
**/

use super::Request;
use crate::wire;

macro_rules! egress_path {
    ($fnname:ident, $val:expr) => {
        pub fn $fnname(path: &str) -> Request {
            let mut payload = path.as_bytes().to_owned();
            payload.push(b'\0');
            Request {
                msg_type: $val,
                payload,
            }
        }
    };
}

egress_path!(directory, wire::XS_DIRECTORY);
egress_path!(read, wire::XS_READ);
egress_path!(mkdir, wire::XS_MKDIR);
egress_path!(rm, wire::XS_RM);

macro_rules! egress_wpath {
    ($fnname:ident, $val:expr) => {
        pub fn $fnname(path: &str, token: &str) -> Request {
            let mut payload = path.as_bytes().to_owned();
            payload.push(b'\0');
            payload.extend_from_slice(token.as_bytes());
            payload.push(b'\0');
            Request {
                msg_type: $val,
                payload,
            }
        }
    };
}

egress_wpath!(watch, wire::XS_WATCH);
egress_wpath!(unwatch, wire::XS_UNWATCH);

pub fn write(path: &str, data: &str) -> Request {
    let mut payload = path.as_bytes().to_owned();
    payload.push(b'\0');
    payload.extend_from_slice(data.as_bytes());
    Request {
        msg_type: wire::XS_WRITE,
        payload,
    }
}

pub fn transaction_start() -> Request {
    Request {
        msg_type: wire::XS_TRANSACTION_START,
        payload: vec![b'\0'],
    }
}

pub fn transaction_end(commit: bool) -> Request {
    let payload = if commit {
        b"T\0".to_vec()
    } else {
        b"F\0".to_vec()
    };
    Request {
        msg_type: wire::XS_TRANSACTION_END,
        payload,
    }
}
