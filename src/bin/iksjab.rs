/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::env;
use std::process::ExitCode;

use iks_xmpp::Jid;
use iks_xmpp::StreamEvent;
use iks_xmpp::XmppClient;
use iks_xmpp::XmppClientError;
use iks_xmpp::extensions::roster::RosterItem;
use tracing_subscriber::EnvFilter;

fn print_version() {
    println!("iksjab (iksemel) v{}", iks_xmpp::VERSION);
}

fn print_usage() {
    println!(concat!(
        "Usage: iksjab [OPTIONS]\n",
        "This tool logs into an XMPP account and prints the roster.\n",
        "Options:\n",
        "  -j, --jid <JID>        Jabber ID\n",
        "  -s, --server <HOST>    Connect to this host[:port] instead\n",
        "      --no-tls           Do not upgrade the connection with StartTLS\n",
        "  -d, --debug            Log the XML traffic\n",
        "  -h, --help             Display this help message and exit\n",
        "  -v, --version          Display the version and exit\n",
        "The password is read from the IKSJAB_PASSWORD environment variable\n",
        "or asked on the terminal.\n",
        "Report issues at https://github.com/meduketto/iksemel-rust/issues"
    ));
}

fn print_item(item: &RosterItem) {
    let name = item.name.as_deref().unwrap_or("");
    let pending = if item.ask { " (pending)" } else { "" };
    if item.groups.is_empty() {
        println!("{} {name} [{}]{pending}", item.jid, item.subscription.as_str());
    } else {
        println!(
            "{} {name} [{}]{pending} {{{}}}",
            item.jid,
            item.subscription.as_str(),
            item.groups.join(", ")
        );
    }
}

fn run(
    jid: Jid,
    password: &str,
    server: Option<String>,
    use_tls: bool,
    debug: bool,
) -> Result<(), XmppClientError> {
    let mut client = XmppClient::build(jid)
        .password(password)
        .server(server)
        .use_tls(use_tls)
        .debug(debug)
        .connect()?;
    let bound = client.login()?;
    println!("Logged in as {bound}");
    loop {
        match client.next_event()? {
            StreamEvent::Roster(items) => {
                for item in &items {
                    print_item(item);
                }
                break;
            }
            StreamEvent::End => return Err(XmppClientError::Disconnected),
            StreamEvent::StreamFault(fault) => return Err(fault.into()),
            _ => {}
        }
    }
    client.terminate()
}

fn main() -> ExitCode {
    let mut args = env::args();
    let mut jid: Option<Jid> = None;
    let mut server: Option<String> = None;
    let mut use_tls = true;
    let mut debug = false;

    // Skip the first argument (program name)
    args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-j" | "--jid" => {
                if let Some(value) = args.next() {
                    jid = match Jid::new(&value) {
                        Ok(jid) => Some(jid),
                        Err(err) => {
                            eprintln!("Error: {}", err);
                            return ExitCode::FAILURE;
                        }
                    };
                } else {
                    eprintln!("Error: Jabber ID expected after {arg}");
                    return ExitCode::FAILURE;
                }
            }
            "-s" | "--server" => {
                if let Some(value) = args.next() {
                    server = Some(value);
                } else {
                    eprintln!("Error: host name expected after {arg}");
                    return ExitCode::FAILURE;
                }
            }
            "--no-tls" => use_tls = false,
            "-d" | "--debug" => debug = true,
            "-h" | "--help" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "-v" | "--version" => {
                print_version();
                return ExitCode::SUCCESS;
            }
            _ => {
                eprintln!("Error: unknown option {arg}");
                return ExitCode::FAILURE;
            }
        }
    }

    let Some(jid) = jid else {
        eprintln!("Error: a Jabber ID is required, see --help");
        return ExitCode::FAILURE;
    };

    let level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let password = match env::var("IKSJAB_PASSWORD") {
        Ok(password) => password,
        Err(_) => match rpassword::prompt_password(format!("Password for {jid}: ")) {
            Ok(password) => password,
            Err(err) => {
                eprintln!("Error: cannot read password: {err}");
                return ExitCode::FAILURE;
            }
        },
    };

    match run(jid, &password, server, use_tls, debug) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
