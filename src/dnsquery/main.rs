//! A DNS resource query
use std::io::Cursor;
use std::net::UdpSocket;

use log::debug;

// our DNS library
use dnslib::{
    error::DNSResult,
    format_buffer,
    network_order::ToFromNetworkOrder,
    resolver::{Resolver, ResolverConfig},
    rfc1035::{DNSMessage, DNSQuestion, QClass, ResponseCode, MAX_DNS_PACKET_SIZE, OPT},
    util::pretty_cursor,
};

mod args;
use args::CliOptions;

mod display;
use display::{display_data, DisplayWrapper};

fn main() -> DNSResult<()> {
    env_logger::init();

    // manage arguments from command line
    let options = CliOptions::options()?;
    debug!("options: {:?}", &options);

    if let Some(servers) = options.server_list.clone() {
        return query_via_resolver(&options, servers);
    }

    // bind to an ephemeral local port
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    debug!("socket: {:?}", &socket);

    // create the query from command line arguments
    let mut query = DNSMessage::default();
    let question = DNSQuestion::new(&options.domain, options.qtype, None)?;
    debug!("question to send: {:?}", &question);
    query.push_question(question);

    // by default we want OPT
    if !options.no_opt {
        // attach the OPT pseudo-RR to the additional data; set_opt bumps ar_count itself
        query.set_opt(OPT::default());
    }
    debug!("query: {:?}", &query);
    println!("QUERY: {}", DisplayWrapper(&query));

    // send query
    query.send(&socket, &options.ns)?;

    // receive request
    let _received = receive_answer(&socket, options.debug)?;

    Ok(())
}

/// Drives the multi-server retry resolver (`--server-list`) instead of the single direct UDP
/// round-trip above. Spins up a small single-threaded runtime since the rest of `main` stays
/// synchronous to match the teacher's style for this binary.
fn query_via_resolver(options: &CliOptions, servers: Vec<String>) -> DNSResult<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let mut config = ResolverConfig::new(servers);
        config.max_attempts = options.retries;
        let resolver = Resolver::new(config);

        let mut scratch = Vec::new();
        let reply = resolver
            .query(&options.domain, options.qtype, QClass::IN, &mut scratch)
            .await?;

        if reply.header.flags.response_code != ResponseCode::NoError {
            eprintln!("response error: {:?}", reply.header.flags.response_code);
            std::process::exit(1);
        }

        println!("ANSWER: {}", DisplayWrapper(&reply));
        display_data(&reply, &scratch);

        Ok(())
    })
}

fn receive_answer(socket: &UdpSocket, debug: bool) -> DNSResult<usize> {
    // receive packet from endpoint
    let mut buf = [0; MAX_DNS_PACKET_SIZE];
    let received = socket.recv(&mut buf)?;
    let slice = &buf[..received];
    debug!("received buffer: {}", format_buffer!("X", &slice));
    debug!("received buffer: [{}", format_buffer!("C", &slice));

    if debug {
        pretty_cursor(&Cursor::new(slice));
    }

    // cursor is necessary to use the ToFromNetworkOrder trait
    let mut cursor = Cursor::new(slice);

    // get response
    let mut dns_response = DNSMessage::default();
    dns_response.from_network_bytes(&mut cursor)?;

    // check return code
    if dns_response.header.flags.response_code != ResponseCode::NoError {
        eprintln!("response error: {:?}", dns_response.header.flags.response_code);
        std::process::exit(1);
    }

    // display data to user
    println!("ANSWER: {}", DisplayWrapper(&dns_response));
    display_data(&dns_response, slice);

    Ok(received)
}
