//! Relay a request from a panel thread to a backend process and back.
//!
//! ```text
//! cargo run -p infoview-server --example proxy_loopback            # `cat` echoes the request
//! cargo run -p infoview-server --example proxy_loopback -- lean --server
//! ```
//!
//! Set `RUST_LOG=infoview_server=trace` to see every relayed message.

use infoview_core::{Event, FromInfoviewMessage, ToInfoviewMessage};
use infoview_server::{Connection, ProcessTransport, ProxyHost, ProxyTransport, Transport};
use serde_json::{Value, json};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("infoview_server=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let program = args.next().unwrap_or_else(|| "cat".to_string());
    let transport = args.fold(ProcessTransport::new(program), |t, arg| t.arg(arg));
    let backend = transport.connect()?;

    let (to_panel_tx, to_panel_rx) = mpsc::channel::<ToInfoviewMessage>();
    let (to_host_tx, to_host_rx) = mpsc::channel::<FromInfoviewMessage>();
    let mut host = ProxyHost::new(backend, to_panel_tx);

    let panel = thread::spawn(move || -> Option<Value> {
        let inbound: Event<ToInfoviewMessage> = Event::new();
        let mut conn = ProxyTransport::new(to_host_tx, inbound.clone())
            .connect()
            .ok()?;

        let (reply_tx, reply_rx) = mpsc::channel();
        conn.json_message().subscribe(move |value: &Value| {
            let _ = reply_tx.send(value.clone());
        });
        conn.error().subscribe(|err| eprintln!("panel: transport error: {err}"));

        let request = json!({
            "command": "info",
            "seq_num": 1,
            "file_name": "/tmp/example.lean",
            "line": 1,
            "column": 0
        });
        conn.send(&request).ok()?;

        while let Ok(msg) = to_panel_rx.recv_timeout(Duration::from_secs(5)) {
            inbound.fire(msg);
            if let Ok(reply) = reply_rx.try_recv() {
                return Some(reply);
            }
        }
        None
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while !panel.is_finished() && Instant::now() < deadline {
        while let Ok(msg) = to_host_rx.try_recv() {
            if let Err(err) = host.handle(&msg) {
                eprintln!("host: {err}");
            }
        }
        host.backend_mut().poll();
        thread::sleep(Duration::from_millis(10));
    }

    match panel.join() {
        Ok(Some(reply)) => println!("panel received: {reply}"),
        Ok(None) => println!("panel received no reply"),
        Err(_) => println!("panel thread panicked"),
    }
    Ok(())
}
