//! CLI module for binlog
//!
//! Commands over captured gRPC binary logs:
//! - `view`, `stats`, `debug`: inspect a capture
//! - `filter`, `decode`, `encode`: rewrite a capture
//! - `replay`: re-issue captured calls against a live server
//! - `send`, `fetch`, `recv`: ship events to and from a log service

use crate::settings::{AppConfig, TableStyle};
use anyhow::{Context as _, Result};
use binlog_codec::{decode_stream, open_source, EventStream, FollowOptions};
use binlog_schema::{SchemaRegistry, SchemaRegistryBuilder};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod debug;
pub mod output;
pub mod recv;
pub mod replay;
pub mod remote;
pub mod rewrite;
pub mod stats;
pub mod view;

/// gRPC binary log tooling
#[derive(Parser, Debug)]
#[command(name = "binlog")]
#[command(about = "Inspect, transcode and replay gRPC binary call logs")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Schema source file (repeatable)
    #[arg(short = 'p', long = "proto", global = true)]
    pub proto: Vec<PathBuf>,

    /// Import search path for schema sources (repeatable)
    #[arg(short = 'I', long = "proto_path", global = true)]
    pub proto_path: Vec<PathBuf>,

    /// Serialized FileDescriptorSet (repeatable, missing files are skipped)
    #[arg(long = "descriptor_set", global = true)]
    pub descriptor_set: Vec<PathBuf>,

    /// Keep reading the capture as it grows, until Ctrl-C
    #[arg(short = 'f', long, global = true)]
    pub follow: bool,

    /// Configuration file used instead of ./binlog.toml
    #[arg(long, global = true, env = "BINLOG_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Per-call summary table
    View {
        /// Capture file, `-` for stdin
        input: PathBuf,
        /// Print decoded request and response bodies
        #[arg(short, long)]
        expand: bool,
        /// Print header and trailer metadata
        #[arg(long)]
        headers: bool,
        /// Print the trailer status message
        #[arg(long)]
        status_message: bool,
    },
    /// Latency histogram per method
    Stats {
        /// Capture file, `-` for stdin
        input: PathBuf,
    },
    /// One line per raw event
    Debug {
        /// Capture file, `-` for stdin
        input: PathBuf,
        /// Print the full JSON form of each event
        #[arg(short, long)]
        expand: bool,
    },
    /// Re-frame only the events of one call to stdout
    Filter {
        /// Capture file, `-` for stdin
        input: PathBuf,
        /// Call to keep, 0 keeps everything
        #[arg(long, default_value_t = 0)]
        call_id: u64,
    },
    /// Convert frames to annotated JSON
    Decode {
        /// Capture file, `-` for stdin
        input: PathBuf,
        /// Call to keep, 0 keeps everything
        #[arg(long, default_value_t = 0)]
        call_id: u64,
        /// Decode message bodies into `message.decoded`
        #[arg(short, long)]
        expand: bool,
    },
    /// Convert annotated JSON back to frames on stdout
    Encode {
        /// JSON file, `-` for stdin
        input: PathBuf,
        /// Call to keep, 0 keeps everything
        #[arg(long, default_value_t = 0)]
        call_id: u64,
    },
    /// Re-issue captured calls against a live server
    Replay {
        /// Capture file, `-` for stdin
        input: PathBuf,
        /// Server address, `host:port` or a URI
        #[arg(short, long)]
        target: String,
        /// Call to replay, 0 replays everything
        #[arg(long, default_value_t = 0)]
        call_id: u64,
        /// Print decoded response bodies
        #[arg(short, long)]
        expand: bool,
        /// Per-call deadline in seconds, overrides `replay.timeout_secs`
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Send captured request metadata with each call
        #[arg(long)]
        forward_metadata: bool,
    },
    /// Append events to a remote log sink
    Send {
        /// Capture file, `-` for stdin
        input: PathBuf,
        /// Sink address
        #[arg(short, long)]
        target: String,
        /// Origin the events are stored under
        #[arg(long)]
        origin: String,
        /// Namespace for call ids, keeps merged captures apart
        #[arg(long)]
        prefix: String,
        /// Extra request header, `Key: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Stream stored events from a remote log source to stdout
    Fetch {
        /// Source address
        #[arg(short, long)]
        source: String,
        /// Origin to read, empty for all
        #[arg(long, default_value = "")]
        origin: String,
        /// Trace to read
        #[arg(long)]
        trace_id: String,
    },
    /// Serve the sink service and print what arrives
    Recv {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:9090")]
        listen: String,
    },
}

/// State shared by the commands of one run
pub struct Context {
    pub settings: AppConfig,
    pub registry: SchemaRegistry,
    pub follow: Option<FollowOptions>,
    pub cancel: CancellationToken,
}

impl Context {
    /// Build the registry and follow settings from configuration and flags
    pub fn new(settings: AppConfig, global: &GlobalArgs) -> Result<Self> {
        let registry = load_registry(&settings, global)?;
        let cancel = CancellationToken::new();
        let follow = global
            .follow
            .then(|| FollowOptions::new(settings.reader.poll_interval(), cancel.clone()));
        Ok(Self {
            settings,
            registry,
            follow,
            cancel,
        })
    }

    pub fn table_style(&self) -> TableStyle {
        self.settings.output.table_style
    }

    /// Start decoding a capture; `-` reads stdin and is never followed
    pub async fn open_events(&self, input: &Path) -> Result<EventStream> {
        let capacity = self.settings.reader.channel_capacity;
        if input == Path::new("-") {
            return Ok(decode_stream(tokio::io::stdin(), capacity));
        }
        let source = open_source(input, self.follow.as_ref())
            .await
            .with_context(|| format!("Failed to open {}", input.display()))?;
        Ok(decode_stream(source, capacity))
    }

    /// Cancel following when the user presses Ctrl-C
    fn watch_interrupt(&self) {
        if self.follow.is_none() {
            return;
        }
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, stopping follow");
                cancel.cancel();
            }
        });
    }
}

fn load_registry(settings: &AppConfig, global: &GlobalArgs) -> Result<SchemaRegistry> {
    let schema = &settings.schema;
    let protos: Vec<PathBuf> = schema.proto_files.iter().chain(&global.proto).cloned().collect();
    let imports: Vec<PathBuf> = schema
        .import_paths
        .iter()
        .chain(&global.proto_path)
        .cloned()
        .collect();
    let sets: Vec<PathBuf> = schema
        .descriptor_sets
        .iter()
        .chain(&global.descriptor_set)
        .cloned()
        .collect();

    let mut builder = SchemaRegistryBuilder::new();
    if !protos.is_empty() {
        builder
            .load_from_schema_sources(&protos, &imports)
            .context("Failed to load schema sources")?;
    }
    if !sets.is_empty() {
        builder
            .load_from_schema_sets(&sets)
            .context("Failed to load descriptor sets")?;
    }
    let registry = builder.build();
    debug!(methods = registry.methods().count(), "schema registry ready");
    Ok(registry)
}

/// Run the CLI command
pub async fn run(cli: Cli, settings: AppConfig) -> Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let ctx = Context::new(settings, &cli.global)?;
    ctx.watch_interrupt();

    match command {
        Commands::View {
            input,
            expand,
            headers,
            status_message,
        } => {
            let options = view::ViewOptions {
                expand,
                headers,
                status_message,
            };
            view::run(&ctx, &input, options).await
        }
        Commands::Stats { input } => stats::run(&ctx, &input).await,
        Commands::Debug { input, expand } => debug::run(&ctx, &input, expand).await,
        Commands::Filter { input, call_id } => rewrite::filter(&ctx, &input, call_id).await,
        Commands::Decode {
            input,
            call_id,
            expand,
        } => rewrite::decode(&ctx, &input, call_id, expand).await,
        Commands::Encode { input, call_id } => rewrite::encode(&ctx, &input, call_id).await,
        Commands::Replay {
            input,
            target,
            call_id,
            expand,
            timeout_secs,
            forward_metadata,
        } => {
            let timeout = match timeout_secs {
                Some(0) => None,
                Some(secs) => Some(std::time::Duration::from_secs(secs)),
                None => ctx.settings.replay.timeout(),
            };
            let options = binlog_replay::ReplayOptions::default()
                .with_call_id(call_id)
                .with_timeout(timeout)
                .with_forward_metadata(forward_metadata || ctx.settings.replay.forward_metadata);
            replay::run(&ctx, &input, &target, options, expand).await
        }
        Commands::Send {
            input,
            target,
            origin,
            prefix,
            headers,
        } => remote::send(&ctx, &input, &target, &origin, &prefix, &headers).await,
        Commands::Fetch {
            source,
            origin,
            trace_id,
        } => remote::fetch(&source, &origin, &trace_id).await,
        Commands::Recv { listen } => recv::run(&ctx, &listen).await,
    }
}
