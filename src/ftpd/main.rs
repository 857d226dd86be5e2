//! The `ftpd` binary: wires CLI configuration into `ftp::server::Server` and runs its accept
//! loop until an interrupt signal asks it to stop.
use log::info;

use dnslib::error::FtpResult;
use dnslib::ftp::server::{Server, ServerConfig};

mod args;
use args::CliOptions;

#[tokio::main]
async fn main() -> FtpResult<()> {
    let options = CliOptions::options()?;

    let level = match options.verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    info!("starting ftpd with options: {:?}", &options);

    let config = ServerConfig {
        bind_addr: options.bind_address,
        bind_port: options.bind_port,
        root: options.root,
        auth: options.auth,
        users: options.users,
        pasv_port_base: options.pasv_port_base,
    };

    let server = Server::init(config).await?;
    server.run().await
}
