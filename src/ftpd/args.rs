//! Manage command line arguments here.
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{App, Arg};

use dnslib::error::{FtpError, FtpResult};
use dnslib::ftp::server::AuthMode;

/// This structure holds the command line arguments.
#[derive(Debug)]
pub struct CliOptions {
    pub bind_address: IpAddr,
    pub bind_port: u16,
    pub root: PathBuf,
    pub auth: AuthMode,
    pub users: Vec<(String, String)>,
    pub pasv_port_base: u16,
    pub verbosity: u64,
}

impl CliOptions {
    pub fn options() -> FtpResult<Self> {
        let matches = App::new("ftpd")
            .version("0.1")
            .author("Alain Viguier dandyvica@gmail.com")
            .about("A small passive-mode FTP server")
            .arg(
                Arg::new("bind-address")
                    .long("bind-address")
                    .required(false)
                    .default_value("0.0.0.0")
                    .long_help("Local address to bind the control listener to")
                    .takes_value(true),
            )
            .arg(
                Arg::new("bind-port")
                    .long("bind-port")
                    .required(false)
                    .default_value("21")
                    .long_help("Local port to bind the control listener to")
                    .takes_value(true),
            )
            .arg(
                Arg::new("root")
                    .long("root")
                    .required(true)
                    .long_help("Directory to serve")
                    .takes_value(true),
            )
            .arg(
                Arg::new("auth")
                    .long("auth")
                    .required(false)
                    .default_value("anonymous")
                    .possible_values(["anonymous", "password"])
                    .long_help("Authentication mode")
                    .takes_value(true),
            )
            .arg(
                Arg::new("user")
                    .long("user")
                    .required(false)
                    .multiple_occurrences(true)
                    .long_help("Username for password auth mode, paired by position with --pass")
                    .takes_value(true),
            )
            .arg(
                Arg::new("pass")
                    .long("pass")
                    .required(false)
                    .multiple_occurrences(true)
                    .long_help("Password for password auth mode, paired by position with --user")
                    .takes_value(true),
            )
            .arg(
                Arg::new("pasv-port-base")
                    .long("pasv-port-base")
                    .required(false)
                    .default_value("65000")
                    .long_help("First port tried when allocating a PASV listener")
                    .takes_value(true),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .required(false)
                    .multiple_occurrences(true)
                    .long_help("Raise log verbosity, repeatable")
                    .takes_value(false),
            )
            .get_matches();

        let bind_address = IpAddr::from_str(matches.value_of("bind-address").unwrap())
            .map_err(|e| FtpError::Fatal(format!("invalid --bind-address: {}", e)))?;
        let bind_port = matches
            .value_of("bind-port")
            .unwrap()
            .parse()
            .map_err(|e| FtpError::Fatal(format!("invalid --bind-port: {}", e)))?;
        let root = PathBuf::from(matches.value_of("root").unwrap());
        let auth = match matches.value_of("auth").unwrap() {
            "password" => AuthMode::PasswordRequired,
            _ => AuthMode::Anonymous,
        };

        let user_names: Vec<&str> = matches.values_of("user").map(|v| v.collect()).unwrap_or_default();
        let passwords: Vec<&str> = matches.values_of("pass").map(|v| v.collect()).unwrap_or_default();
        if user_names.len() != passwords.len() {
            return Err(FtpError::Fatal(
                "--user and --pass must be given the same number of times".to_string(),
            ));
        }
        let users = user_names
            .into_iter()
            .zip(passwords)
            .map(|(u, p)| (u.to_string(), p.to_string()))
            .collect();

        let pasv_port_base = matches
            .value_of("pasv-port-base")
            .unwrap()
            .parse()
            .map_err(|e| FtpError::Fatal(format!("invalid --pasv-port-base: {}", e)))?;
        let verbosity = matches.occurrences_of("verbose");

        Ok(Self {
            bind_address,
            bind_port,
            root,
            auth,
            users,
            pasv_port_base,
            verbosity,
        })
    }
}
