//! Per-connection session state: login state, the `(last_command, current_command)` guard pair
//! RNTO/PASS rely on, the current-working-directory text and tree handle, and the PASV data
//! channel, which is torn down on every exit path of the command that used it via an RAII guard
//! rather than relying on each handler to remember.
use tokio::net::{TcpListener, TcpStream};

use crate::ftp::parser::Verb;
use crate::ftp::tree::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    LoggedIn,
}

/// Owns a session's PASV listener and, once the client connects, the accepted peer. Dropping it
/// (at the end of the command that allocated it, on every exit path — success, error, or early
/// return) closes whichever of the two sockets is still present, so a handler can never leak a
/// PASV resource by forgetting an explicit close.
#[derive(Debug, Default)]
pub struct PasvGuard {
    pub listener: Option<TcpListener>,
    pub peer: Option<TcpStream>,
}

impl PasvGuard {
    pub fn is_armed(&self) -> bool {
        self.listener.is_some() || self.peer.is_some()
    }

    pub fn take_peer(&mut self) -> Option<TcpStream> {
        self.peer.take()
    }

    pub fn clear(&mut self) {
        self.listener = None;
        self.peer = None;
    }
}

#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub verb: Verb,
    pub argument: String,
}

/// All per-connection state the command handlers read and mutate. One `Session` lives for the
/// lifetime of one control connection; it is dropped (and its control socket closed) when the
/// session task exits, whether via QUIT, peer close, or a fatal I/O error.
#[derive(Debug)]
pub struct Session {
    pub peer_addr: std::net::SocketAddr,
    pub local_addr: std::net::SocketAddr,
    pub state: SessionState,
    pub last_command: Option<PendingCommand>,
    pub current_command: Option<PendingCommand>,
    pub cwd_text: String,
    pub cwd_node: NodeId,
    pub pasv: PasvGuard,
    pub rnfr_source: Option<NodeId>,
    pub pending_user: Option<String>,
}

impl Session {
    pub fn new(peer_addr: std::net::SocketAddr, local_addr: std::net::SocketAddr, root: NodeId) -> Self {
        Self {
            peer_addr,
            local_addr,
            state: SessionState::Connected,
            last_command: None,
            current_command: None,
            cwd_text: "/".to_string(),
            cwd_node: root,
            pasv: PasvGuard::default(),
            rnfr_source: None,
            pending_user: None,
        }
    }

    pub fn begin_command(&mut self, verb: Verb, argument: String) {
        self.current_command = Some(PendingCommand { verb, argument });
    }

    /// Called once a command handler has finished: promotes the just-run command to
    /// `last_command`, the guard state PASS/RNTO read on their next invocation.
    pub fn finish_command(&mut self) {
        self.last_command = self.current_command.take();
    }

    pub fn last_verb(&self) -> Option<Verb> {
        self.last_command.as_ref().map(|c| c.verb)
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::LoggedIn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
    }

    #[test]
    fn new_session_starts_connected_at_root() {
        let s = Session::new(addr(4000), addr(21), 0);
        assert_eq!(s.state, SessionState::Connected);
        assert_eq!(s.cwd_text, "/");
        assert!(!s.is_logged_in());
    }

    #[test]
    fn finish_command_promotes_last_command() {
        let mut s = Session::new(addr(4000), addr(21), 0);
        s.begin_command(Verb::User, "anon".to_string());
        assert!(s.last_verb().is_none());
        s.finish_command();
        assert_eq!(s.last_verb(), Some(Verb::User));
        assert!(s.current_command.is_none());
    }

    #[test]
    fn pasv_guard_reports_armed_state() {
        let mut guard = PasvGuard::default();
        assert!(!guard.is_armed());
        guard.clear();
        assert!(!guard.is_armed());
    }
}
