use std::env;
use std::sync::Arc;

use anyhow::{bail, Result};
use event_schema::streams;
use event_stream::{EventLog, EventProducer, RedisEventLog};
use forum_sync_service::CatalogEventPublisher;

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  forum-sync-cli force-sync <resource_id> [REDIS_URL]");
    eprintln!("  forum-sync-cli pending <stream> <group> [REDIS_URL]");
    std::process::exit(1);
}

async fn connect(url: Option<&String>) -> Result<Arc<RedisEventLog>> {
    let url = url
        .cloned()
        .or_else(|| env::var("REDIS_URL").ok())
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
    Ok(Arc::new(RedisEventLog::connect(&url).await?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    match args[1].as_str() {
        "force-sync" if args.len() <= 4 => {
            let resource_id = &args[2];
            let log = connect(args.get(3)).await?;
            let publisher = CatalogEventPublisher::new(EventProducer::new(log));
            let id = publisher.request_sync(resource_id).await?;
            println!("Requested sync of {} (entry {})", resource_id, id);
        }
        "pending" if args.len() >= 4 && args.len() <= 5 => {
            let stream = args[2].as_str();
            if !streams::all_names().contains(&stream) {
                bail!(
                    "unknown stream '{}', expected one of {:?}",
                    stream,
                    streams::all_names()
                );
            }
            let group = &args[3];
            let log = connect(args.get(4)).await?;
            let count = log.pending_count(stream, group).await?;
            println!("{} entries pending for {} on {}", count, group, stream);
        }
        _ => usage(),
    }

    Ok(())
}
