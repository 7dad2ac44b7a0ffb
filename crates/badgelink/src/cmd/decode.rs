use badgelink_frame::{decode_message, CodecConfig, SpeedPolicy};

use crate::cmd::DecodeArgs;
use crate::exit::{decode_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{from_hex, print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = from_hex(&args.hex)
        .ok_or_else(|| CliError::new(USAGE, format!("invalid hex frame: {}", args.hex)))?;

    let config = CodecConfig {
        speed_policy: if args.strict {
            SpeedPolicy::Strict
        } else {
            SpeedPolicy::Nearest
        },
        ..CodecConfig::default()
    };
    let message = decode_message(&frame, &config).map_err(|err| decode_error("decode", err))?;

    print_message(&message, &frame, format);
    Ok(SUCCESS)
}
