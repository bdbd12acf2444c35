use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vocal-range", about = "Estimate a singer's vocal range and preferred key")]
pub struct Cli {
    /// Config file (defaults to vocal-range.toml, then the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sing into the default microphone for a fixed window
    Listen {
        /// Session length in seconds (defaults to the configured duration)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a session over synthetic sine tones instead of the microphone
    Tone {
        /// Tone frequencies in Hz, played one after another
        #[arg(required = true)]
        frequencies: Vec<f32>,

        /// Seconds of each tone
        #[arg(long, default_value_t = 1.0)]
        seconds_each: f32,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the note table, or look up the given notes (e.g. A4 Db4)
    Notes {
        names: Vec<String>,
    },

    /// Show or reset the daily session counter
    Usage {
        /// Clear all counters
        #[arg(long)]
        reset: bool,
    },
}
