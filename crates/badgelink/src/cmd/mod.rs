use std::path::PathBuf;

use badgelink_frame::{MessageMode, MessageSpeed};
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode one message slot frame.
    Decode(DecodeArgs),
    /// Encode a message into its slot frame.
    Encode(EncodeArgs),
    /// Run a full session against a simulated badge.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex (whitespace and a 0x prefix are ignored).
    pub hex: String,
    /// Reject speed values that match no known speed.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Display mode (static, scroll, replace, wargames, loop).
    #[arg(long, default_value = "scroll")]
    pub mode: MessageMode,
    /// Scroll speed (slowest, slow, medium, fast, fastest).
    #[arg(long, default_value = "medium")]
    pub speed: MessageSpeed,
    /// ASCII message text.
    #[arg(long)]
    pub text: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Link configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Message slots on the simulated badge.
    #[arg(long, default_value_t = badgelink_transport::SimulatedBadge::DEFAULT_MESSAGE_SLOTS)]
    pub slots: usize,
    /// Simulate a device without the badge service.
    #[arg(long)]
    pub unsupported: bool,
    /// Set brightness.
    #[arg(long)]
    pub brightness: Option<u8>,
    /// Turn the display on or off.
    #[arg(long)]
    pub display: Option<Toggle>,
    /// Select the active message.
    #[arg(long, allow_negative_numbers = true)]
    pub active: Option<i8>,
    /// Replace a message's text (SLOT=TEXT, repeatable).
    #[arg(long = "message", value_name = "SLOT=TEXT")]
    pub messages: Vec<String>,
    /// Change a message's mode (SLOT=MODE, repeatable).
    #[arg(long = "mode", value_name = "SLOT=MODE")]
    pub modes: Vec<String>,
    /// Change a message's speed (SLOT=SPEED, repeatable).
    #[arg(long = "speed", value_name = "SLOT=SPEED")]
    pub speeds: Vec<String>,
    /// Rename the badge.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
