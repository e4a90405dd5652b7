//! Greeter Example
//!
//! A small script that answers chat commands, running on an [`OfflineHost`]
//! so it works without a chat server.
//!
//! # Commands
//!
//! ```text
//! !hello   - Greets the sender
//! !count   - How many greetings this instance has sent
//! !shout   - Greets the sender on every instance
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package greeter -- --say '!hello' --say '!count'
//! cargo run --package greeter -- --config lyre.toml --serve
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use lyre::prelude::*;
use lyre::runtime::config::InstanceConfig;
use tracing::info;

// ============================================================================
// Script
// ============================================================================

fn manifest() -> Manifest {
    Manifest::new("Greeter", "1.0.0")
        .description("Answers !hello, !count and !shout")
        .engine(">= 0.1")
}

async fn greeter_main(ctx: ScriptContext) -> Result<(), BoxError> {
    let greeting = ctx
        .settings()
        .get("greeting")
        .and_then(Value::as_str)
        .unwrap_or("Hello")
        .to_string();
    let backend = ctx.backend();
    let engine = ctx.engine();
    let events = ctx.events();
    let store = ctx.store();

    let chat_events = events.clone();
    events.on("chat", move |event: Arc<Event>| {
        let backend = backend.clone();
        let events = chat_events.clone();
        let store = store.clone();
        let greeting = greeting.clone();
        async move {
            let Some(msg) = event.message() else { return };
            let sender = msg.client.name.clone();

            match msg.text.trim() {
                "!hello" => {
                    let count = store.get_as::<u64>("greetings").unwrap_or(0) + 1;
                    store.set("greetings", &count);
                    backend.chat(&format!("{greeting}, {sender}!"));
                }
                "!count" => {
                    let count = store.get_as::<u64>("greetings").unwrap_or(0);
                    backend.chat(&format!("{count} greetings so far"));
                }
                "!shout" => {
                    events.broadcast("greeter.shout", json!({ "from": sender })).await;
                }
                _ => {}
            }
        }
    });

    let shout_backend = ctx.backend();
    events.on("greeter.shout", move |event: Arc<Event>| {
        let backend = shout_backend.clone();
        async move {
            let from = event
                .data()
                .and_then(|d| d.get("from"))
                .and_then(Value::as_str)
                .unwrap_or("someone")
                .to_string();
            backend.chat(&format!("{from} says hi to everyone!"));
        }
    });

    engine.log("Greeter ready");
    Ok(())
}

pub static GREETER: ScriptDescriptor = define_script! {
    name: "greeter",
    manifest: manifest,
    main: greeter_main,
};

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "greeter", about = "Run the greeter script on an offline host")]
struct Args {
    /// Configuration file; `lyre.toml` in the current directory when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instance the chat messages are sent to
    #[arg(short, long, default_value = "main")]
    instance: String,

    /// Sender name of the chat messages
    #[arg(long, default_value = "alice")]
    sender: String,

    /// Chat messages to deliver, in order
    #[arg(long = "say")]
    messages: Vec<String>,

    /// Keep running until Ctrl+C instead of exiting after the messages
    #[arg(long)]
    serve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = LyreRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;
    runtime.register_script(&GREETER);

    let host = Arc::new(OfflineHost::new());
    runtime.attach_host(args.instance.clone(), HostBundle::from_shared(Arc::clone(&host)));

    runtime.start().await?;
    if runtime.instance(&args.instance).is_none() {
        runtime
            .add_instance(&InstanceConfig::new(args.instance.clone()))
            .await?;
    }

    for text in &args.messages {
        let payload = json!({ "text": text, "client": { "name": args.sender } });
        runtime.raise_json(&args.instance, "chat", payload)?;
    }
    // Handlers run on the instance scheduler.
    tokio::time::sleep(Duration::from_millis(100)).await;

    for action in host.actions() {
        info!(instance = %args.instance, "{action}");
    }

    if args.serve {
        info!("Serving. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
    }
    runtime.stop().await?;
    Ok(())
}
