use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, Instant, sleep};
use tracing::{debug, info, warn};

use rescue_core::app::{AvailabilityFilter, ImpactStats};
use rescue_core::domain::{AgentId, Donation, DonationRequest, Priority, TaskId, TransitionEvent};
use rescue_core::observability::RegistryCounts;
use rescue_core::config::parse_var;
use rescue_core::{AppBuilder, ConfigError, RescueConfig, RescueError, RescueService};

struct Seed {
    food_type: &'static str,
    quantity: &'static str,
    weight_kg: f64,
    description: &'static str,
    priority: Priority,
    donor_name: &'static str,
    address: &'static str,
    /// Minutes relative to now.
    opens: i64,
    closes: i64,
}

// Oldest first, so the board lists them newest first.
const SEEDS: [Seed; 5] = [
    Seed {
        food_type: "Fruit Box",
        quantity: "30 packs",
        weight_kg: 18.0,
        description: "Surplus hotel breakfast fruit. Apples, bananas, oranges.",
        priority: Priority::Low,
        donor_name: "ITC Windsor Hotel",
        address: "25 Windsor Square, Bengaluru",
        opens: 60,
        closes: 360,
    },
    Seed {
        food_type: "Bread & Pastries",
        quantity: "60 pieces",
        weight_kg: 8.0,
        description: "End-of-day unsold bakery items. Mix of sourdough, croissants, muffins.",
        priority: Priority::High,
        donor_name: "The Daily Loaf Bakery",
        address: "45 Church Street, Bengaluru",
        opens: -5,
        closes: 90,
    },
    Seed {
        food_type: "Hot Biryani",
        quantity: "40 portions",
        weight_kg: 20.0,
        description: "Freshly cooked chicken biryani from wedding event. Still warm.",
        priority: Priority::Urgent,
        donor_name: "Ravi Catering Co.",
        address: "12 MG Road, Bengaluru",
        opens: -10,
        closes: 35,
    },
    Seed {
        food_type: "Mixed Vegetables",
        quantity: "15 kg",
        weight_kg: 15.0,
        description: "Fresh produce: tomatoes, spinach, carrots. Surplus from market.",
        priority: Priority::Normal,
        donor_name: "Devaraja Market",
        address: "Devaraja Market, Mysuru",
        opens: 30,
        closes: 240,
    },
    Seed {
        food_type: "Rice & Dal",
        quantity: "25 portions",
        weight_kg: 12.0,
        description: "Office canteen surplus. Sealed containers.",
        priority: Priority::Normal,
        donor_name: "Infosys Cafeteria",
        address: "Electronics City, Bengaluru",
        opens: 15,
        closes: 120,
    },
];

impl Seed {
    fn request(&self) -> DonationRequest {
        let now = Utc::now();
        DonationRequest::new(
            Donation {
                food_type: self.food_type.to_string(),
                quantity: self.quantity.to_string(),
                description: Some(self.description.to_string()),
                donor_name: self.donor_name.to_string(),
                address: self.address.to_string(),
            },
            now + ChronoDuration::minutes(self.opens),
            now + ChronoDuration::minutes(self.closes),
        )
        .with_priority(self.priority)
        .with_weight_kg(self.weight_kg)
    }
}

/// Temple prasad that shows up every so often and needs pickup within 30 minutes.
fn sambar() -> DonationRequest {
    let donation = Donation {
        food_type: "Sambar & Rice".to_string(),
        quantity: "20 portions".to_string(),
        description: Some("Temple prasad, freshly prepared. Needs pickup ASAP.".to_string()),
        donor_name: "Sri Ganesh Temple".to_string(),
        address: "Malleswaram, Bengaluru".to_string(),
    };
    DonationRequest::window_from(
        donation,
        Utc::now(),
        ChronoDuration::zero(),
        ChronoDuration::minutes(30),
    )
    .with_priority(Priority::Urgent)
    .with_weight_kg(10.0)
}

/// Claim whatever looks good, carry it through, repeat until `deadline`.
async fn agent_loop(service: RescueService, agent: AgentId, deadline: Instant) -> u32 {
    let mut delivered = 0;
    while Instant::now() < deadline {
        let listings = service.list_available(AvailabilityFilter::All).await;
        if listings.is_empty() {
            sleep(Duration::from_millis(100)).await;
            continue;
        }
        // everybody eyes the top of the board, which is where the races happen
        let pick = rand::thread_rng().gen_range(0..listings.len().min(3));
        let task = &listings[pick].task;

        let claimed = match service.claim(agent, task.id(), task.version()).await {
            Ok(claimed) => claimed,
            Err(err) if err.is_retryable() => {
                debug!(agent_id = %agent, task_id = %task.id(), "someone else claimed it first");
                continue;
            }
            Err(err) => {
                warn!(agent_id = %agent, task_id = %task.id(), error = %err, "claim failed");
                sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        if let Err(err) = carry(&service, agent, claimed.id(), claimed.version()).await {
            warn!(agent_id = %agent, task_id = %claimed.id(), error = %err, "rescue abandoned");
            break;
        }
        delivered += 1;
    }
    delivered
}

async fn carry(
    service: &RescueService,
    agent: AgentId,
    task_id: TaskId,
    version: u64,
) -> Result<(), RescueError> {
    sleep(travel_time()).await;
    let picked = service.mark_picked_up(agent, task_id, version).await?;
    sleep(travel_time()).await;
    service
        .mark_delivered(agent, task_id, picked.version())
        .await?;
    Ok(())
}

fn travel_time() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(100..400))
}

/// Prints every accepted transition as a JSON line until the feed goes away.
async fn print_events(mut rx: tokio::sync::broadcast::Receiver<TransitionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to encode event"),
            },
            Err(RecvError::Lagged(missed)) => warn!(missed, "event printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[derive(Serialize)]
struct Summary {
    stats: ImpactStats,
    counts: RegistryCounts,
    delivered_per_agent: Vec<u32>,
}

/// Demo knob `key`, or `default` when unset. A value that does not parse is
/// an error rather than a silent fallback.
fn demo_var<T>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_var(&lookup, key)?.unwrap_or(default))
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let agents: usize = demo_var(env_var, "RESCUE_DEMO_AGENTS", 4)?;
    let run_for = Duration::from_secs(demo_var(env_var, "RESCUE_DEMO_SECS", 6)?);
    let spawn_every = Duration::from_millis(demo_var(env_var, "RESCUE_DEMO_SPAWN_MS", 1500)?);

    let service = AppBuilder::new()
        .with_config(RescueConfig::from_env()?)
        .build()?;

    eprintln!("🍱 rescue-cli v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Agents: {agents}");
    eprintln!("   Running for: {}s", run_for.as_secs());

    // (A) feed printer first, so it sees everything
    let printer = tokio::spawn(print_events(service.feed().subscribe()));

    // (B) the original five donations
    for seed in &SEEDS {
        service.post_donation(seed.request()).await?;
    }

    // (C) synthetic urgent donations
    let generator = {
        let service = service.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(spawn_every);
            tick.tick().await;
            loop {
                tick.tick().await;
                match service.post_donation(sambar()).await {
                    Ok(task) => info!(task_id = %task.id(), "new urgent rescue posted: Sambar & Rice"),
                    Err(err) => warn!(error = %err, "synthetic donation rejected"),
                }
            }
        })
    };

    // (D) racing agents
    let deadline = Instant::now() + run_for;
    let workers: Vec<_> = (0..agents)
        .map(|_| {
            let service = service.clone();
            let agent = service.register_agent();
            tokio::spawn(agent_loop(service, agent, deadline))
        })
        .collect();

    let mut delivered_per_agent = Vec::with_capacity(workers.len());
    for worker in workers {
        delivered_per_agent.push(worker.await?);
    }
    generator.abort();
    // a cancelled generator still owns a service clone until it is joined
    let _ = generator.await;

    let summary = Summary {
        stats: service.impact_stats().await,
        counts: service.counts().await,
        delivered_per_agent,
    };

    // last handle to the feed: the printer drains and exits
    drop(service);
    printer.await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
