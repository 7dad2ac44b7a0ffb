use badgelink_frame::{encode_message, CodecConfig, Message};

use crate::cmd::EncodeArgs;
use crate::exit::{validation_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let message = Message::new(args.mode, args.speed, args.text);
    let frame = encode_message(&message, &CodecConfig::default())
        .map_err(|err| validation_error("encode", err))?;

    print_message(&message, &frame, format);
    Ok(SUCCESS)
}
