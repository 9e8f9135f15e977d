//! Test-data feeder for the warehouse log
//!
//! Usage:
//!   feeder append <player> <static_id> <action> <item_id> <qty> [warehouse]
//!   feeder interactive
//!   feeder random [interval_ms]
//!
//! Environment variables:
//! - STOCKWATCH_LOG: Log file to append to (default: warehouse_logs.csv)
//! - STOCKWATCH_TZ: Zone of written timestamps (default: Europe/Moscow)

use std::io::BufRead;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use rand::seq::SliceRandom;
use rand::Rng;
use stockwatch::config::DEFAULT_TIMEZONE;
use stockwatch::ingest::{Action, EventWriter, NewEvent};

const PLAYERS: &[(&str, u64)] = &[("Nick", 12345), ("Ivan", 22222), ("Max", 33333)];
const ITEMS: &[u32] = &[1, 2, 3, 4];
const WAREHOUSES: &[&str] = &["Marabunta Grande"];

fn parse_event(parts: &[&str], tz: Tz) -> Result<NewEvent, String> {
    if parts.len() < 5 {
        return Err("need: player_name static_id action item_id quantity [warehouse_id]".into());
    }

    let subject_id = parts[1]
        .parse()
        .map_err(|_| format!("static_id '{}' is not an integer", parts[1]))?;
    let item_id = parts[3]
        .parse()
        .map_err(|_| format!("item_id '{}' is not an integer", parts[3]))?;
    let quantity = parts[4]
        .parse()
        .map_err(|_| format!("quantity '{}' is not an integer", parts[4]))?;

    let mut event = NewEvent::take(parts[0], subject_id, item_id, quantity, Utc::now().with_timezone(&tz))
        .with_action(Action::parse(parts[2]));
    if parts.len() > 5 {
        event = event.at_location(parts[5..].join(" "));
    }
    Ok(event)
}

fn append(writer: &EventWriter, event: &NewEvent) -> Result<(), Box<dyn std::error::Error>> {
    let id = writer.append(event)?;
    println!(
        "[feeder] appended #{}: {} ({}) {} item={} qty={} at {}",
        id,
        event.subject_name,
        event.subject_id,
        event.action.as_str(),
        event.item_id,
        event.quantity,
        event.location.as_deref().unwrap_or("N/A"),
    );
    Ok(())
}

fn interactive(writer: &EventWriter, tz: Tz) -> Result<(), Box<dyn std::error::Error>> {
    println!("Interactive mode. Example: Nick 12345 TAKE 1001 10 LSPD");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parse_event(&parts, tz) {
            Ok(event) => append(writer, &event)?,
            Err(e) => eprintln!("{}", e),
        }
    }
    Ok(())
}

fn random(writer: &EventWriter, tz: Tz, interval: Duration) -> Result<(), Box<dyn std::error::Error>> {
    println!("Random mode, one TAKE every {:?}. Ctrl+C to stop.", interval);
    let mut rng = rand::thread_rng();
    loop {
        let (name, static_id) = *PLAYERS.choose(&mut rng).unwrap_or(&PLAYERS[0]);
        let item_id = *ITEMS.choose(&mut rng).unwrap_or(&ITEMS[0]);
        let warehouse = *WAREHOUSES.choose(&mut rng).unwrap_or(&WAREHOUSES[0]);
        let quantity = rng.gen_range(1..=50);

        let event = NewEvent::take(name, static_id, item_id, quantity, Utc::now().with_timezone(&tz))
            .at_location(warehouse);
        append(writer, &event)?;

        std::thread::sleep(interval);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let log_path =
        std::env::var("STOCKWATCH_LOG").unwrap_or_else(|_| "warehouse_logs.csv".to_string());
    let tz_name = std::env::var("STOCKWATCH_TZ").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| format!("unknown timezone '{}'", tz_name))?;
    let writer = EventWriter::new(&log_path);

    match args.get(1).map(String::as_str) {
        Some("append") => {
            let parts: Vec<&str> = args[2..].iter().map(String::as_str).collect();
            let event = parse_event(&parts, tz)?;
            append(&writer, &event)
        }
        Some("random") => {
            let interval_ms: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1000);
            random(&writer, tz, Duration::from_millis(interval_ms))
        }
        Some("interactive") | None => interactive(&writer, tz),
        Some(other) => {
            eprintln!("Unknown mode '{}'. Use append, interactive or random.", other);
            std::process::exit(2);
        }
    }
}
