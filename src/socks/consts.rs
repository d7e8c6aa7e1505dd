//! SOCKS5 wire protocol constants (RFC 1928, RFC 1929).

/// Protocol version carried in the greeting, request and reply frames.
pub const SOCKS5_VERSION: u8 = 0x05;

/// Reserved byte in request and reply frames, always zero.
pub const RESERVED: u8 = 0x00;

/// Method code: no authentication required.
pub const METHOD_NO_AUTH: u8 = 0x00;
/// Method code: username/password sub-negotiation (RFC 1929).
pub const METHOD_USER_PASS: u8 = 0x02;
/// Sent when the client offered no method the server supports.
pub const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

/// Version byte of the username/password sub-negotiation.
pub const USER_PASS_VERSION: u8 = 0x01;
/// Sub-negotiation status: credentials accepted.
pub const USER_PASS_SUCCESS: u8 = 0x00;
/// Sub-negotiation status: credentials rejected.
pub const USER_PASS_FAILURE: u8 = 0x01;

/// Address type: 4-byte IPv4 address.
pub const ATYP_IPV4: u8 = 0x01;
/// Address type: length-prefixed domain name.
pub const ATYP_FQDN: u8 = 0x03;
/// Address type: 16-byte IPv6 address.
pub const ATYP_IPV6: u8 = 0x04;

/// A domain name field carries at most this many bytes.
pub const MAX_FQDN_LEN: usize = 255;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values() {
        assert_eq!(SOCKS5_VERSION, 5);
        assert_eq!(METHOD_NO_AUTH, 0);
        assert_eq!(METHOD_USER_PASS, 2);
        assert_eq!(METHOD_NO_ACCEPTABLE, 255);
        assert_eq!(ATYP_IPV4, 1);
        assert_eq!(ATYP_FQDN, 3);
        assert_eq!(ATYP_IPV6, 4);
    }
}
