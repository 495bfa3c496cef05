use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use ulid::Ulid;

use roost::api::{BookingApi, CreateBookingInput, Latency};
use roost::catalog::{PropertyCatalog, SearchQuery};
use roost::engine::{DEFAULT_EXTRA_GUEST_FEE, EngineError};
use roost::model::{BookingPatch, Destination, Ms, NIGHT_MS, Stay};
use roost::session::SessionManager;

fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Accepts raw unix ms, or `+Nd` meaning N days from now.
fn parse_ms(token: &str, now: Ms) -> Option<Ms> {
    if let Some(days) = token.strip_prefix('+').and_then(|t| t.strip_suffix('d')) {
        return days.parse::<i64>().ok().map(|n| now + n * NIGHT_MS);
    }
    token.parse().ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = env_parse("ROOST_METRICS_PORT");
    roost::observability::init(metrics_port);

    let data_dir = std::env::var("ROOST_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let catalog_path =
        std::env::var("ROOST_CATALOG").unwrap_or_else(|_| "./fixtures/properties.json".into());
    let session = std::env::var("ROOST_SESSION").unwrap_or_else(|_| "default".into());
    let latency_ms: u64 = env_parse("ROOST_LATENCY_MS").unwrap_or(500);
    let extra_guest_fee: f64 =
        env_parse("ROOST_EXTRA_GUEST_FEE").unwrap_or(DEFAULT_EXTRA_GUEST_FEE);
    let compact_threshold: u64 = env_parse("ROOST_COMPACT_THRESHOLD").unwrap_or(1000);

    std::fs::create_dir_all(&data_dir)?;
    let catalog = Arc::new(PropertyCatalog::load(Path::new(&catalog_path))?);
    let sessions = Arc::new(SessionManager::new(
        PathBuf::from(&data_dir),
        catalog.clone(),
        compact_threshold,
        extra_guest_fee,
    ));
    let engine = sessions.get_or_create(&session)?;
    let bookings = engine.booking_count().await;

    let latency = if latency_ms == 0 {
        Latency::None
    } else {
        Latency::Jittered {
            max: Duration::from_millis(latency_ms),
        }
    };
    let api = BookingApi::new(engine, latency);

    info!("roost session '{session}' ready");
    info!("  data_dir: {data_dir}");
    info!("  catalog: {} properties", catalog.len());
    info!("  bookings: {bookings}");
    info!("  simulated latency: up to {latency_ms}ms");

    println!("roost — type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        use std::io::Write;
        print!("roost> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let args: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, rest)) = args.split_first() else {
            continue;
        };
        if cmd == "quit" || cmd == "exit" {
            break;
        }
        if let Err(e) = dispatch(&api, cmd, rest).await {
            println!("error: {e}");
        }
    }

    info!("roost stopped");
    Ok(())
}

async fn dispatch(api: &BookingApi, cmd: &str, rest: &[&str]) -> Result<(), EngineError> {
    match cmd {
        "help" => print_help(),
        "properties" => {
            for p in api.list_properties().await {
                println!(
                    "{}  {} — {}, {} · {}/night · sleeps {}",
                    p.id, p.title, p.location.city, p.location.state, p.price_per_night, p.guests
                );
            }
        }
        "destinations" => {
            for d in api.engine().destinations() {
                println!("{}, {}, {}", d.city, d.state, d.country);
            }
        }
        "property" => {
            let id = parse_id(rest.first())?;
            let p = api.get_property(id).await?;
            println!("{} — {}", p.title, p.description);
            println!(
                "  {}, {}, {} · {}/night · sleeps {} · {} bd / {} ba · {} ({} reviews)",
                p.location.city,
                p.location.state,
                p.location.country,
                p.price_per_night,
                p.guests,
                p.bedrooms,
                p.bathrooms,
                p.rating,
                p.reviews
            );
        }
        "search" => {
            let query = parse_search(rest)?;
            for hit in api.search_properties(&query).await? {
                let p = &hit.property;
                match hit.stay_total {
                    Some(total) => println!(
                        "{}  {} ({}, {}) — {}/night · {total} total",
                        p.id, p.title, p.location.city, p.location.state, p.price_per_night
                    ),
                    None => println!(
                        "{}  {} ({}, {}) — {}/night",
                        p.id, p.title, p.location.city, p.location.state, p.price_per_night
                    ),
                }
            }
        }
        "book" => {
            let now = now_ms();
            let (property_id, stay, guests) = match rest {
                [id, from, to, guests] => (
                    parse_id(Some(id))?,
                    parse_stay(from, to, now)?,
                    parse_guests(guests)?,
                ),
                _ => return usage("book <property_id> <from> <to> <guests>"),
            };
            let booking = api
                .create_booking(CreateBookingInput {
                    property_id,
                    stay,
                    guests,
                })
                .await?;
            println!(
                "booked {} — {} nights, {} guests, total {}",
                booking.id,
                booking.stay.nights(),
                booking.guests,
                booking.total_price
            );
        }
        "update" => {
            let now = now_ms();
            let (id, patch) = match rest {
                [id, from, to] => (
                    parse_id(Some(id))?,
                    BookingPatch {
                        stay: Some(parse_stay(from, to, now)?),
                        guests: None,
                    },
                ),
                [id, from, to, guests] => (
                    parse_id(Some(id))?,
                    BookingPatch {
                        stay: Some(parse_stay(from, to, now)?),
                        guests: Some(parse_guests(guests)?),
                    },
                ),
                _ => return usage("update <booking_id> <from> <to> [guests]"),
            };
            let booking = api.update_booking(id, patch).await?;
            println!(
                "updated {} — {} nights, {} guests, total {}",
                booking.id,
                booking.stay.nights(),
                booking.guests,
                booking.total_price
            );
        }
        "cancel" => {
            let id = parse_id(rest.first())?;
            let booking = api.cancel_booking(id).await?;
            println!("cancelled {}", booking.id);
        }
        "bookings" => {
            let lists = api.list_bookings().await;
            if lists.upcoming.is_empty() && lists.past.is_empty() {
                println!("no bookings yet");
                return Ok(());
            }
            if !lists.upcoming.is_empty() {
                println!("upcoming:");
                for b in &lists.upcoming {
                    print_booking(b);
                }
            }
            if !lists.past.is_empty() {
                println!("past:");
                for b in &lists.past {
                    print_booking(b);
                }
            }
        }
        other => {
            println!("unknown command: {other} (try 'help')");
        }
    }
    Ok(())
}

fn print_booking(b: &roost::model::Booking) {
    println!(
        "  {}  property {} · [{}, {}) · {} guests · total {}",
        b.id, b.property_id, b.stay.check_in, b.stay.check_out, b.guests, b.total_price
    );
}

fn print_help() {
    println!("  properties                            list the catalog");
    println!("  property <id>                         show one property");
    println!("  destinations                          list known destinations");
    println!("  search [city=X] [state=X] [country=X] [guests=N] [from=T to=T]");
    println!("  book <property_id> <from> <to> <guests>");
    println!("  update <booking_id> <from> <to> [guests]");
    println!("  cancel <booking_id>");
    println!("  bookings                              upcoming and past bookings");
    println!("  quit");
    println!("  times are unix ms, or +Nd for N days from now; _ stands for a space in values");
}

fn usage(msg: &str) -> Result<(), EngineError> {
    println!("usage: {msg}");
    Ok(())
}

fn parse_id(token: Option<&&str>) -> Result<Ulid, EngineError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or(EngineError::LimitExceeded("expected a ulid argument"))
}

fn parse_guests(token: &str) -> Result<u32, EngineError> {
    token
        .parse()
        .map_err(|_| EngineError::LimitExceeded("guest count must be a number"))
}

fn parse_stay(from: &str, to: &str, now: Ms) -> Result<Stay, EngineError> {
    let (Some(from), Some(to)) = (parse_ms(from, now), parse_ms(to, now)) else {
        return Err(EngineError::LimitExceeded("times must be unix ms or +Nd"));
    };
    if from >= to {
        return Err(EngineError::InvalidRange);
    }
    Ok(Stay::new(from, to))
}

/// `key=value` pairs; `_` in a value stands for a space.
fn parse_search(args: &[&str]) -> Result<SearchQuery, EngineError> {
    let now = now_ms();
    let mut city = None;
    let mut state = None;
    let mut country = None;
    let mut query = SearchQuery::default();
    let mut from = None;
    let mut to = None;

    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(EngineError::LimitExceeded("search arguments are key=value"));
        };
        let value = value.replace('_', " ");
        match key {
            "city" => city = Some(value),
            "state" => state = Some(value),
            "country" => country = Some(value),
            "guests" => query.guests = Some(parse_guests(&value)?),
            "from" => from = parse_ms(&value, now),
            "to" => to = parse_ms(&value, now),
            _ => return Err(EngineError::LimitExceeded("unknown search key")),
        }
    }

    if let (Some(city), Some(state), Some(country)) = (&city, &state, &country) {
        query.destination = Some(Destination {
            city: city.clone(),
            state: state.clone(),
            country: country.clone(),
        });
    } else if city.is_some() || state.is_some() || country.is_some() {
        return Err(EngineError::LimitExceeded(
            "destination needs city, state, and country",
        ));
    }
    if let (Some(from), Some(to)) = (from, to) {
        if from >= to {
            return Err(EngineError::InvalidRange);
        }
        query.stay = Some(Stay::new(from, to));
    }
    Ok(query)
}
