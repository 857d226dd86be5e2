//! Shared library behind the `ftpd` and `dnsquery` binaries: the RFC1035 wire codec and
//! multi-server resolver (shared with `dnsquery`), plus the passive-mode FTP server (directory
//! tree, command parser, client session and event loop) driven by `ftpd`.
#[macro_use]
pub mod macros;

pub mod error;
pub mod util;

pub mod network_order;
pub mod rfc1035;
pub mod resolver;

pub mod buffer;
pub mod ftp;
