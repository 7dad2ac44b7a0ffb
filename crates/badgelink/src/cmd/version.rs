use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    features: Vec<&'static str>,
    max_text_len: usize,
    max_frame_size: usize,
    max_brightness: u8,
}

impl BuildInfo {
    fn current() -> Self {
        let features = [
            ("device", cfg!(feature = "device")),
            ("async", cfg!(feature = "async")),
            ("cli", true),
        ];
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("BADGELINK_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("BADGELINK_BUILD_PROFILE").unwrap_or("unknown"),
            features: features
                .into_iter()
                .filter_map(|(name, on)| on.then_some(name))
                .collect(),
            max_text_len: badgelink_frame::DEFAULT_MAX_TEXT_LEN,
            max_frame_size: badgelink_frame::MAX_FRAME_SIZE,
            max_brightness: badgelink_device::DEFAULT_MAX_BRIGHTNESS,
        }
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let info = BuildInfo::current();
    if !args.extended {
        println!("{} {}", info.name, info.version);
        return Ok(SUCCESS);
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        ),
        _ => {
            println!("name: {}", info.name);
            println!("version: {}", info.version);
            println!("target: {}", info.target);
            println!("profile: {}", info.profile);
            println!("features: {}", info.features.join(", "));
            println!(
                "firmware limits: text {} bytes, frame {} bytes, brightness 0..={}",
                info.max_text_len, info.max_frame_size, info.max_brightness
            );
        }
    }
    Ok(SUCCESS)
}
