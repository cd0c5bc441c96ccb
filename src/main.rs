//! Heartbeat ceremony driver
//!
//! Plays the three ceremony roles over real files: the client (`gen`,
//! `encode`), the auditor (`challenge`, `verify`), and the storage server
//! (`prove`). Every object is written to disk in its binary wire form, or as
//! a JSON envelope carrying the base64 payload when `--json` is given.
//!
//! Run with: cargo run --release -- gen --out beat.priv --public-out beat.pub

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use heartbeat_por::{
    config, Challenge, Heartbeat, PorError, Proof, Result, State, StreamFile, Tag, Wire,
};

/// Command-line arguments for the heartbeat ceremony driver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read and write objects as JSON envelopes instead of raw binary
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Increase output verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a private engine and its public reduction
    Gen {
        /// Fraction of chunks each challenge examines
        #[arg(long, default_value_t = config::DEFAULT_CHECK_FRACTION)]
        check_fraction: f64,

        /// Sectors per chunk
        #[arg(long, default_value_t = config::DEFAULT_SECTORS)]
        sectors: u32,

        /// Prime modulus width in bytes
        #[arg(long, default_value_t = config::DEFAULT_PRIME_BYTES)]
        prime_bytes: usize,

        /// Where to write the private engine
        #[arg(long, default_value = "beat.priv")]
        out: PathBuf,

        /// Where to write the public engine handed to the server
        #[arg(long, default_value = "beat.pub")]
        public_out: PathBuf,
    },

    /// Encode a file into its tag and sealed state (client)
    Encode {
        /// Private engine
        #[arg(long, default_value = "beat.priv")]
        beat: PathBuf,

        /// File to encode
        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "file.tag")]
        tag_out: PathBuf,

        #[arg(long, default_value = "file.state")]
        state_out: PathBuf,
    },

    /// Issue a fresh challenge against a sealed state (auditor)
    Challenge {
        #[arg(long, default_value = "beat.priv")]
        beat: PathBuf,

        #[arg(long, default_value = "file.state")]
        state: PathBuf,

        #[arg(long, default_value = "file.challenge")]
        out: PathBuf,
    },

    /// Answer a challenge over the stored file (server)
    Prove {
        /// Public (or private) engine
        #[arg(long, default_value = "beat.pub")]
        beat: PathBuf,

        /// The stored file
        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "file.challenge")]
        challenge: PathBuf,

        #[arg(long, default_value = "file.tag")]
        tag: PathBuf,

        #[arg(long, default_value = "file.proof")]
        out: PathBuf,
    },

    /// Check a proof against the challenge and sealed state (auditor)
    Verify {
        #[arg(long, default_value = "beat.priv")]
        beat: PathBuf,

        #[arg(long, default_value = "file.proof")]
        proof: PathBuf,

        #[arg(long, default_value = "file.challenge")]
        challenge: PathBuf,

        #[arg(long, default_value = "file.state")]
        state: PathBuf,
    },
}

/// JSON envelope wrapping the base64 payload of any wire object.
#[derive(Serialize, Deserialize)]
struct JsonEnvelope {
    kind: String,
    payload: String,
}

fn write_object<T: Wire>(path: &Path, object: &T, kind: &str, json: bool) -> Result<()> {
    if json {
        let envelope = JsonEnvelope {
            kind: kind.to_string(),
            payload: object.to_base64()?,
        };
        let text = serde_json::to_string_pretty(&envelope)
            .map_err(|e| PorError::InvalidInput(format!("JSON encoding failed: {e}")))?;
        fs::write(path, text)?;
    } else {
        fs::write(path, object.to_bytes()?)?;
    }
    info!(path = %path.display(), kind, "wrote object");
    Ok(())
}

fn read_object<T: Wire>(path: &Path, kind: &str, json: bool) -> Result<T> {
    let bytes = fs::read(path)?;
    if json {
        let envelope: JsonEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| PorError::Deserialization(format!("JSON envelope: {e}")))?;
        if envelope.kind != kind {
            return Err(PorError::Deserialization(format!(
                "expected a {kind} envelope, found {}",
                envelope.kind
            )));
        }
        T::from_base64(&envelope.payload)
    } else {
        T::from_bytes(&bytes)
    }
}

fn open_file(path: &Path) -> Result<StreamFile<fs::File>> {
    Ok(StreamFile::new(fs::File::open(path)?))
}

fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Command::Gen {
            check_fraction,
            sectors,
            prime_bytes,
            out,
            public_out,
        } => {
            let hb = Heartbeat::new(check_fraction, sectors, prime_bytes)?;
            info!(
                bits = hb.p().bits(),
                sectors = hb.sectors(),
                sector_size = hb.sector_size(),
                "generated engine"
            );
            write_object(&out, &hb, "heartbeat", json)?;
            write_object(&public_out, &hb.public(), "heartbeat", json)?;
        }

        Command::Encode {
            beat,
            file,
            tag_out,
            state_out,
        } => {
            let hb: Heartbeat = read_object(&beat, "heartbeat", json)?;
            let mut input = open_file(&file)?;
            let (tag, state) = hb.encode(&mut input)?;
            info!(chunks = tag.len(), "encoded {}", file.display());
            write_object(&tag_out, &tag, "tag", json)?;
            write_object(&state_out, &state, "state", json)?;
        }

        Command::Challenge { beat, state, out } => {
            let hb: Heartbeat = read_object(&beat, "heartbeat", json)?;
            let state: State = read_object(&state, "state", json)?;
            let challenge = hb.gen_challenge(&state)?;
            info!(l = challenge.l(), "issued challenge");
            write_object(&out, &challenge, "challenge", json)?;
        }

        Command::Prove {
            beat,
            file,
            challenge,
            tag,
            out,
        } => {
            let hb: Heartbeat = read_object(&beat, "heartbeat", json)?;
            let challenge: Challenge = read_object(&challenge, "challenge", json)?;
            let tag: Tag = read_object(&tag, "tag", json)?;
            let mut stored = open_file(&file)?;
            let proof = hb.prove(&mut stored, &challenge, &tag)?;
            write_object(&out, &proof, "proof", json)?;
        }

        Command::Verify {
            beat,
            proof,
            challenge,
            state,
        } => {
            let hb: Heartbeat = read_object(&beat, "heartbeat", json)?;
            let proof: Proof = read_object(&proof, "proof", json)?;
            let challenge: Challenge = read_object(&challenge, "challenge", json)?;
            let state: State = read_object(&state, "state", json)?;

            if hb.verify(&proof, &challenge, &state)? {
                info!("proof VALID: the server holds the file");
            } else {
                error!("proof INVALID: retrievability not demonstrated");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info,heartbeat_por=info",
        1 => "debug,heartbeat_por=debug",
        _ => "heartbeat_por=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    use tracing_tree::HierarchicalLayer;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            HierarchicalLayer::new(2)
                .with_targets(false)
                .with_bracketed_fields(true),
        )
        .init();
}
