use std::str::FromStr;
use std::sync::Arc;

use badgelink_device::{BadgeLink, EventPump, LinkConfig, LinkNotice};
use badgelink_transport::{event_channel, CompletionMode, Register, SimulatedBadge};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cmd::{SimulateArgs, Toggle};
use crate::exit::{link_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_snapshot, OutputFormat};

const SIMULATED_ADDRESS: &str = "AC:DC:00:00:00:01";

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = match &args.config {
        Some(path) => LinkConfig::from_file(path).map_err(|err| link_error("load config", err))?,
        None => LinkConfig::default(),
    };

    let (tx, rx) = event_channel();
    let mut badge = SimulatedBadge::new(SIMULATED_ADDRESS, tx.clone())
        .with_message_slots(args.slots)
        .with_completion_mode(CompletionMode::Auto);
    if args.unsupported {
        badge = badge.without_badge_service();
    }
    let badge = Arc::new(badge);
    let link = Arc::new(BadgeLink::new(badge.clone(), tx, config));
    let mut pump = EventPump::new(link.clone(), rx);
    let mut notices = link.notices();

    link.connect();
    pump.drain();
    if !link.is_ready() {
        let reason = first_error(&mut notices).unwrap_or_else(|| link.state().to_string());
        link.close();
        return Err(CliError::new(FAILURE, format!("connect: {reason}")));
    }
    info!(address = SIMULATED_ADDRESS, "simulated badge ready");

    apply_mutations(&link, &args)?;
    let queued = link
        .save_dirty_messages()
        .map_err(|err| link_error("save messages", err))?;
    debug!(queued, "dirty messages saved");
    if let Some(name) = &args.name {
        link.rename_device(name)
            .map_err(|err| link_error("rename", err))?;
    }
    pump.drain();

    if let Some(reason) = first_error(&mut notices) {
        link.close();
        return Err(CliError::new(FAILURE, reason));
    }

    link.refresh();
    pump.drain();

    let name = badge
        .handle(Register::DeviceName)
        .and_then(|handle| badge.value(&handle))
        .map(|value| String::from_utf8_lossy(&value).into_owned())
        .unwrap_or_default();
    print_snapshot(SIMULATED_ADDRESS, &name, &link.snapshot(), format);

    link.close();
    Ok(SUCCESS)
}

fn apply_mutations(link: &BadgeLink, args: &SimulateArgs) -> CliResult<()> {
    if let Some(toggle) = args.display {
        link.set_display_enabled(toggle == Toggle::On)
            .map_err(|err| link_error("set display", err))?;
    }
    if let Some(value) = args.brightness {
        link.set_brightness(value)
            .map_err(|err| link_error("set brightness", err))?;
    }
    if let Some(index) = args.active {
        link.set_active_message(index)
            .map_err(|err| link_error("set active message", err))?;
    }
    for spec in &args.messages {
        let (slot, text) = parse_slot_value::<String>(spec)?;
        link.set_message_text(slot, &text)
            .map_err(|err| link_error("set message text", err))?;
    }
    for spec in &args.modes {
        let (slot, mode) = parse_slot_value(spec)?;
        link.set_message_mode(slot, mode)
            .map_err(|err| link_error("set message mode", err))?;
    }
    for spec in &args.speeds {
        let (slot, speed) = parse_slot_value(spec)?;
        link.set_message_speed(slot, speed)
            .map_err(|err| link_error("set message speed", err))?;
    }
    Ok(())
}

/// Parse `SLOT=VALUE`.
fn parse_slot_value<T>(spec: &str) -> CliResult<(usize, T)>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let usage = |detail: String| CliError::new(USAGE, format!("invalid slot edit '{spec}': {detail}"));
    let (slot, value) = spec
        .split_once('=')
        .ok_or_else(|| usage("expected SLOT=VALUE".to_string()))?;
    let slot = slot
        .trim()
        .parse::<usize>()
        .map_err(|err| usage(err.to_string()))?;
    let value = value.parse::<T>().map_err(|err| usage(err.to_string()))?;
    Ok((slot, value))
}

fn first_error(notices: &mut broadcast::Receiver<LinkNotice>) -> Option<String> {
    let mut first = None;
    while let Ok(notice) = notices.try_recv() {
        if let LinkNotice::Error(message) = notice {
            first.get_or_insert(message);
        }
    }
    first
}
