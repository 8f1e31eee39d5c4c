use libc::{EAGAIN, EWOULDBLOCK, F_GETFL, F_SETFL, O_NONBLOCK, fcntl, sockaddr_in6};

use std::io;
use std::mem;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

/// Builds the wildcard `[::]:port` address used by dual-stack listeners.
pub(crate) fn any_sockaddr_in6(port: u16) -> sockaddr_in6 {
    let mut address: sockaddr_in6 = unsafe { mem::zeroed() };
    address.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    address.sin6_port = port.to_be();

    address
}

/// Converts a kernel-filled `sockaddr_in6` into a [`SocketAddr`].
///
/// IPv4 peers reaching a dual-stack socket show up as v4-mapped addresses
/// (`::ffff:a.b.c.d`); those are reported as plain IPv4.
pub(crate) fn sockaddr_to_socketaddr(address: &sockaddr_in6) -> SocketAddr {
    let ip = Ipv6Addr::from(address.sin6_addr.s6_addr);
    let port = u16::from_be(address.sin6_port);

    match ip.to_ipv4_mapped() {
        Some(v4) => SocketAddr::from((v4, port)),
        None => SocketAddr::V6(SocketAddrV6::new(
            ip,
            port,
            u32::from_be(address.sin6_flowinfo),
            address.sin6_scope_id,
        )),
    }
}

/// True when the last OS error means "try again later".
pub(crate) fn would_block(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == EAGAIN || code == EWOULDBLOCK)
}

/// Maps a raw `ssize_t` syscall result onto the crate's I/O convention:
/// progress is `Ok(n)`, would-block is `Ok(0)`, anything else is an error.
pub(crate) fn nonblocking_result(ret: isize) -> io::Result<usize> {
    if ret >= 0 {
        return Ok(ret as usize);
    }

    let err = io::Error::last_os_error();
    if would_block(&err) {
        return Ok(0);
    }

    Err(err)
}

pub(crate) fn set_nonblocking(file_descriptor: i32) -> io::Result<()> {
    let flags = unsafe { fcntl(file_descriptor, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { fcntl(file_descriptor, F_SETFL, flags | O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_v4_mapped_peer_is_reported_as_ipv4() {
        let mut raw = any_sockaddr_in6(8080);
        raw.sin6_addr.s6_addr = Ipv4Addr::new(127, 0, 0, 1).to_ipv6_mapped().octets();

        let address = sockaddr_to_socketaddr(&raw);
        assert_eq!(address, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn test_native_ipv6_peer() {
        let mut raw = any_sockaddr_in6(443);
        raw.sin6_addr.s6_addr = Ipv6Addr::LOCALHOST.octets();

        let address = sockaddr_to_socketaddr(&raw);
        assert_eq!(address, "[::1]:443".parse().unwrap());
    }

    #[test]
    fn test_wildcard_port_is_network_order() {
        let raw = any_sockaddr_in6(0x1234);
        assert_eq!(u16::from_be(raw.sin6_port), 0x1234);
        assert_eq!(raw.sin6_family, libc::AF_INET6 as libc::sa_family_t);
    }
}
