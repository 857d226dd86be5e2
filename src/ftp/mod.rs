//! The passive-mode FTP server: directory tree, command parser, session state and the async
//! accept loop that ties them together.
pub mod parser;
pub mod server;
pub mod session;
pub mod tree;
