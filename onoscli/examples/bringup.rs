//! Bring-up example: start the ONOS console on every node and look around
//!
//! This example logs into one or more bench machines, enters the ONOS
//! console on each of them concurrently and runs a short bring-up check:
//! cluster summary, topology size, an application activation and the flow
//! state. Recoverable failures are reported and the run goes on; a lost
//! connection aborts the whole run with exit status 1.
//!
//! # Prerequisites
//!
//! - A bench machine with ONOS installed (the `onos` script on its PATH)
//! - A running controller reachable from it
//!
//! # Usage
//!
//! One node from the command line:
//! ```bash
//! cargo run --example bringup -- --host OC1 --user sdn --password rocks --controller 10.128.20.11
//! ```
//!
//! Several nodes from a JSON file (a list of node parameters):
//! ```bash
//! cargo run --example bringup -- --nodes cell.json --devices 25 --links 50
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use onoscli::{NodeParams, Run, RunAborted};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let nodes = args.node_params()?;
    if nodes.is_empty() {
        eprintln!("Error: no nodes given");
        std::process::exit(1);
    }

    let mut drivers = Vec::with_capacity(nodes.len());
    for params in &nodes {
        println!("Connecting to {} ({}:{})...", params.name, params.host, params.port);
        let mut driver = params
            .builder()
            .timeout(Duration::from_secs(args.timeout))
            .mirror_commands(args.mirror)
            .build()?;
        driver.open().await?;
        drivers.push(driver);
    }
    println!("Connected to {} nodes", drivers.len());

    let mut run = Run::new(drivers);
    let controllers: Vec<&str> = nodes.iter().map(|params| params.controller.as_str()).collect();
    let idle_timeout = nodes[0].idle_timeout.as_deref();

    if let Err(aborted) = bringup(&mut run, &controllers, idle_timeout, &args).await {
        eprintln!("{}", aborted);
        std::process::exit(aborted.exit_code());
    }

    println!("\nClosing connections...");
    run.finish().await;
    println!("Done!");

    Ok(())
}

async fn bringup(
    run: &mut Run,
    controllers: &[&str],
    idle_timeout: Option<&str>,
    args: &Args,
) -> Result<(), RunAborted> {
    println!("\nStarting ONOS cli on every node...");
    if !run.start_clis(controllers, idle_timeout).await? {
        eprintln!("Not every console came up, carrying on with the rest");
    }

    for i in 0..run.len() {
        let Some(node) = run.node(i) else { continue };
        let name = node.name().to_string();

        let result = node.summary_json().await;
        if let Some(summary) = run.check(&format!("{}: summary", name), result).await? {
            println!(
                "{}: version {}, {} nodes, {} devices, {} links",
                name,
                summary.version.as_deref().unwrap_or("?"),
                summary.nodes.unwrap_or_default(),
                summary.devices.unwrap_or_default(),
                summary.links.unwrap_or_default()
            );
        }
    }

    let Some(first) = run.node(0) else {
        return Ok(());
    };
    let name = first.name().to_string();

    if let (Some(devices), Some(links)) = (args.devices, args.links) {
        let Some(first) = run.node(0) else {
            return Ok(());
        };
        let result = first.check_status(devices, links).await;
        match run.check(&format!("{}: topology", name), result).await? {
            Some(true) => println!("Topology has {} devices and {} links", devices, links),
            Some(false) => eprintln!("Topology does not match {} devices / {} links", devices, links),
            None => {}
        }
    }

    println!("\nActivating {}...", args.app);
    let Some(first) = run.node(0) else {
        return Ok(());
    };
    let result = first.activate_app(&args.app, true).await;
    if run.check(&format!("{}: activate {}", name, args.app), result).await?.is_some() {
        println!("{} is active", args.app);
    }

    let Some(first) = run.node(0) else {
        return Ok(());
    };
    let result = first.check_flows_state().await;
    if let Some(all_added) = run.check(&format!("{}: flows", name), result).await? {
        println!("All flows added: {}", all_added);
    }

    let Some(first) = run.node(0) else {
        return Ok(());
    };
    let result = first.intent_summary().await;
    if let Some(summary) = run.check(&format!("{}: intents", name), result).await? {
        for (state, count) in &summary {
            println!("  {:<16} {}", state, count);
        }
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    nodes: Option<PathBuf>,
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    controller: Option<String>,
    app: String,
    devices: Option<u64>,
    links: Option<u64>,
    timeout: u64,
    mirror: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut nodes = None;
        let mut host = "OC1".to_string();
        let mut port = 22u16;
        let mut user = env::var("ONOS_USER").unwrap_or_else(|_| "sdn".to_string());
        let mut password = None;
        let mut key = None;
        let mut controller = None;
        let mut app = "org.onosproject.fwd".to_string();
        let mut devices = None;
        let mut links = None;
        let mut timeout = 30u64;
        let mut mirror = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--nodes" | "-n" => {
                    i += 1;
                    if i < args.len() {
                        nodes = Some(PathBuf::from(&args[i]));
                    }
                }
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--key" | "-k" => {
                    i += 1;
                    if i < args.len() {
                        key = Some(PathBuf::from(&args[i]));
                    }
                }
                "--controller" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        controller = Some(args[i].clone());
                    }
                }
                "--app" | "-a" => {
                    i += 1;
                    if i < args.len() {
                        app = args[i].clone();
                    }
                }
                "--devices" => {
                    i += 1;
                    if i < args.len() {
                        devices = args[i].parse().ok();
                    }
                }
                "--links" => {
                    i += 1;
                    if i < args.len() {
                        links = args[i].parse().ok();
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--mirror" => mirror = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            nodes,
            host,
            port,
            user,
            password,
            key,
            controller,
            app,
            devices,
            links,
            timeout,
            mirror,
        }
    }

    /// Nodes from `--nodes`, or the single node described on the command line.
    fn node_params(&self) -> Result<Vec<NodeParams>, Box<dyn std::error::Error>> {
        if let Some(path) = &self.nodes {
            let text = std::fs::read_to_string(path)?;
            return Ok(NodeParams::list_from_json(&text)?);
        }

        if self.password.is_none() && self.key.is_none() {
            return Err("must provide either --password or --key".into());
        }
        let controller = self.controller.clone().unwrap_or_else(|| self.host.clone());

        let node = serde_json::json!({
            "name": "ONOScli1",
            "host": self.host,
            "port": self.port,
            "user": self.user,
            "password": self.password,
            "key": self.key,
            "controller": controller,
        });
        Ok(vec![NodeParams::from_json(&node.to_string())?])
    }

    fn print_help() {
        println!(
            r#"onoscli bringup example

USAGE:
    cargo run --example bringup -- [OPTIONS]

OPTIONS:
    -n, --nodes <FILE>         JSON list of node parameters (overrides the single-node options)
    -h, --host <HOST>          Bench machine, or an env variable holding it [default: OC1]
    -p, --port <PORT>          SSH port [default: 22]
    -u, --user <USER>          Username [default: $ONOS_USER or sdn]
    -P, --password <PASS>      Password for authentication
    -k, --key <PATH>           Path to SSH private key
    -c, --controller <ADDR>    Controller address for `onos -w` [default: the host]
    -a, --app <NAME>           Application to activate [default: org.onosproject.fwd]
        --devices <N>          Expected number of devices
        --links <N>            Expected number of links
    -t, --timeout <SECS>       Connection timeout [default: 30]
        --mirror               Record every command in the controller log
    --help                     Print this help message

EXAMPLES:
    # Single node with password
    cargo run --example bringup -- --host OC1 --user sdn --password rocks --controller 10.128.20.11

    # Three-node cell, checking the topology
    cargo run --example bringup -- --nodes cell.json --devices 25 --links 50
"#
        );
    }
}
