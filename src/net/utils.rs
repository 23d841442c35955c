use libc::{AF_INET, in_addr, sa_family_t, sockaddr_in};

use std::mem;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

pub(crate) fn socketaddr_to_sockaddr(address: &SocketAddrV4) -> sockaddr_in {
    let mut raw: sockaddr_in = unsafe { mem::zeroed() };

    raw.sin_family = AF_INET as sa_family_t;
    raw.sin_port = address.port().to_be();
    raw.sin_addr = in_addr {
        s_addr: u32::from(*address.ip()).to_be(),
    };

    raw
}

pub(crate) fn sockaddr_to_socketaddr(address: &sockaddr_in) -> SocketAddr {
    let ip = Ipv4Addr::from(u32::from_be(address.sin_addr.s_addr));
    let port = u16::from_be(address.sin_port);

    SocketAddr::V4(SocketAddrV4::new(ip, port))
}
