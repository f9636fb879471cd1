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

use crate::wire;

pub mod egress;
pub mod ingress;

/// A serialised operation still waiting for its header identifiers.
///
/// The request id and transaction id are the correlator's business, so a
/// factory only pins down the operation tag and the payload.
pub struct Request {
    pub msg_type: u32,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn encode(&self, req_id: wire::ReqId, tx_id: wire::TxId) -> Vec<u8> {
        let header = wire::Header {
            msg_type: self.msg_type,
            req_id,
            tx_id,
            len: self.payload.len() as u32,
        };

        let mut bytes = header.to_vec();
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_prefixes_header() {
        let request = Request {
            msg_type: wire::XS_READ,
            payload: b"/a\0".to_vec(),
        };
        let bytes = request.encode(7, 3);

        let header = wire::Header::parse(&bytes).unwrap();
        assert_eq!(header.msg_type, wire::XS_READ);
        assert_eq!(header.req_id, 7);
        assert_eq!(header.tx_id, 3);
        assert_eq!(header.len, 3);
        assert_eq!(&bytes[wire::HEADER_SIZE..], b"/a\0");
    }
}
