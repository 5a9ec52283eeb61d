//! fandian: manage restaurant lists and pick where to eat.
//!
//! Usage: fandian <command> [args]
//!
//! Lists and restaurants can be named by id or by exact name.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use fandian::config::Config;
use fandian::filter::{self, FilterOptions};
use fandian::local_store::LocalStore;
use fandian::picker;
use fandian::service::{share_link, ListService};
use fandian::storage::{HttpStore, RemoteStore};
use fandian::sync::{SyncEngine, SyncOutcome};
use fandian_shared::{JoinRequest, RestaurantDraft, RestaurantList};
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "\
Usage: fandian <command> [args]

Commands:
  lists                                 Show every list
  show <list>                           Show a list's restaurants
  create <name>                         Create a list
  add <list> <name> [--address A] [--price N] [--tags a,b]
                    [--phone P] [--note N] [--rating R]
                                        Add a restaurant
  exclude <list> <restaurant>           Toggle whether the picker skips it
  remove <list> <restaurant>            Delete a restaurant
  delete-list <list>                    Delete a list from this device
  pick <list> [--min N] [--max N] [--tags a,b] [--search S]
                                        Pick a random restaurant
  sync <list>                           Reconcile once with the server
  watch <list>                          Keep reconciling until Ctrl+C
  join <list-id>                        Join a shared list
  share <list> [--base URL]             Print an invitation link
  config                                Print the default configuration";

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    if command == "config" {
        print!("{}", Config::example_config());
        return Ok(());
    }

    let config = Config::load()?;
    let local = Arc::new(LocalStore::open(
        &config.storage.resolve_data_dir()?,
        &config.storage.storage_key,
    )?);
    let remote: Option<Arc<dyn RemoteStore>> = if config.sync.enabled {
        Some(Arc::new(HttpStore::new(
            &config.sync.server_url,
            config.sync.request_timeout(),
        )?))
    } else {
        None
    };
    let service = ListService::new(local.clone(), remote.clone(), config.sync.request_timeout());
    let opts = Opts::parse(rest)?;

    match command.as_str() {
        "lists" => cmd_lists(&service),
        "show" => cmd_show(&service, &opts),
        "create" => {
            let list = service.create_list(opts.positional(0, "name")?).await?;
            println!("Created {} ({})", list.name, list.id);
            Ok(())
        }
        "add" => cmd_add(&service, &opts).await,
        "exclude" => {
            let (list, restaurant_id) = resolve_restaurant(&service, &opts)?;
            match service.toggle_excluded(&list.id, &restaurant_id).await? {
                Some(true) => println!("Excluded from picks"),
                Some(false) => println!("Included in picks"),
                None => bail!("Restaurant disappeared"),
            }
            Ok(())
        }
        "remove" => {
            let (list, restaurant_id) = resolve_restaurant(&service, &opts)?;
            service.delete_restaurant(&list.id, &restaurant_id).await?;
            println!("Removed");
            Ok(())
        }
        "delete-list" => {
            let list = resolve_list(&service, opts.positional(0, "list")?)?;
            service.delete_list(&list.id)?;
            println!("Deleted {} from this device", list.name);
            Ok(())
        }
        "pick" => cmd_pick(&service, &opts),
        "sync" | "watch" => {
            let remote = remote.context("Sync is disabled in the config")?;
            let list = resolve_list(&service, opts.positional(0, "list")?)?;
            let engine = Arc::new(SyncEngine::new(local, remote, &config.sync));
            if command == "sync" {
                report(engine.tick(&list.id).await);
                Ok(())
            } else {
                cmd_watch(engine, list).await
            }
        }
        "join" => {
            let request = JoinRequest {
                user_id: config.user.id.clone(),
                user_name: config.user.display_name(),
            };
            let list = service
                .join_shared(opts.positional(0, "list-id")?, &request)
                .await?;
            println!(
                "Joined {} ({} restaurants, {} members)",
                list.name,
                list.restaurants.len(),
                list.users.len()
            );
            Ok(())
        }
        "share" => {
            let list = resolve_list(&service, opts.positional(0, "list")?)?;
            let base = opts.flag("base").unwrap_or(&config.sync.share_base_url);
            println!("{}", share_link(base, &list));
            if let Some(code) = &list.share_code {
                println!("Share code: {code}");
            }
            Ok(())
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

/// Positional arguments plus `--key value` flags.
struct Opts {
    positional: Vec<String>,
    flags: Vec<(String, String)>,
}

impl Opts {
    fn parse(args: &[String]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if let Some(key) = arg.strip_prefix("--") {
                let value = iter
                    .next()
                    .with_context(|| format!("--{key} needs a value"))?;
                flags.push((key.to_string(), value.clone()));
            } else {
                positional.push(arg.clone());
            }
        }
        Ok(Self { positional, flags })
    }

    fn positional(&self, idx: usize, name: &str) -> Result<&str> {
        self.positional
            .get(idx)
            .map(String::as_str)
            .with_context(|| format!("Missing <{name}>\n\n{USAGE}"))
    }

    fn flag(&self, key: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn number(&self, key: &str) -> Result<Option<f64>> {
        self.flag(key)
            .map(|v| v.parse::<f64>().with_context(|| format!("--{key} must be a number")))
            .transpose()
    }

    fn tags(&self) -> Vec<String> {
        self.flag("tags")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn resolve_list(service: &ListService, key: &str) -> Result<RestaurantList> {
    let lists = service.lists();
    lists
        .iter()
        .find(|l| l.id == key)
        .or_else(|| lists.iter().find(|l| l.name == key))
        .cloned()
        .with_context(|| format!("No list named {key:?}"))
}

fn resolve_restaurant(service: &ListService, opts: &Opts) -> Result<(RestaurantList, String)> {
    let list = resolve_list(service, opts.positional(0, "list")?)?;
    let key = opts.positional(1, "restaurant")?;
    let id = list
        .restaurant(key)
        .or_else(|| list.restaurants.iter().find(|r| r.name == key))
        .map(|r| r.id.clone())
        .with_context(|| format!("No restaurant named {key:?} in {}", list.name))?;
    Ok((list, id))
}

fn cmd_lists(service: &ListService) -> Result<()> {
    let lists = service.lists();
    if lists.is_empty() {
        println!("No lists yet. Create one with: fandian create <name>");
    }
    for list in lists {
        println!(
            "{}  {}  ({} restaurants, {} active)",
            list.id,
            list.name,
            list.restaurants.len(),
            list.active().count()
        );
    }
    Ok(())
}

fn cmd_show(service: &ListService, opts: &Opts) -> Result<()> {
    let list = resolve_list(service, opts.positional(0, "list")?)?;
    println!("{} ({})", list.name, list.id);
    for r in &list.restaurants {
        let marker = if r.excluded { "x" } else { " " };
        let tags = if r.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", r.tags.join(", "))
        };
        println!("[{marker}] {}  {}  ¥{}{tags}", r.name, r.address, r.avg_price);
    }
    let tags = filter::all_tags(&list.restaurants);
    if !tags.is_empty() {
        println!("Tags: {}", tags.join(", "));
    }
    Ok(())
}

async fn cmd_add(service: &ListService, opts: &Opts) -> Result<()> {
    let list = resolve_list(service, opts.positional(0, "list")?)?;
    let draft = RestaurantDraft {
        address: opts.flag("address").unwrap_or_default().to_string(),
        avg_price: opts.number("price")?.unwrap_or(0.0),
        rating: opts.number("rating")?,
        tags: opts.tags(),
        phone: opts.flag("phone").map(str::to_string),
        note: opts.flag("note").map(str::to_string),
        ..RestaurantDraft::new(opts.positional(1, "name")?)
    };
    let restaurant = service
        .add_restaurant(&list.id, draft)
        .await?
        .context("List disappeared")?;
    println!("Added {} ({})", restaurant.name, restaurant.id);
    Ok(())
}

fn cmd_pick(service: &ListService, opts: &Opts) -> Result<()> {
    let list = resolve_list(service, opts.positional(0, "list")?)?;
    let (lo, hi) = filter::price_bounds(&list.restaurants);
    let filter = FilterOptions {
        price_range: (
            opts.number("min")?.unwrap_or(lo),
            opts.number("max")?.unwrap_or(hi),
        ),
        tags: opts.tags(),
        search_text: opts.flag("search").unwrap_or_default().to_string(),
    };

    match picker::pick_available(&list.restaurants, &filter, &mut rand::thread_rng()) {
        Some(r) => {
            println!("{}", r.name);
            if !r.address.is_empty() {
                println!("  {}", r.address);
            }
            if let Some(note) = &r.note {
                println!("  {note}");
            }
        }
        None => println!("Nothing to pick: every matching restaurant is excluded or filtered out"),
    }
    Ok(())
}

async fn cmd_watch(engine: Arc<SyncEngine>, list: RestaurantList) -> Result<()> {
    println!("Watching {} (Ctrl+C to stop)", list.name);
    let handle = engine.spawn(Some(list.id));
    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;
    handle.stop().await;
    Ok(())
}

fn report(outcome: SyncOutcome) {
    let msg = match outcome {
        SyncOutcome::UpSynced => "Pushed local list to the server",
        SyncOutcome::DownSynced => "Pulled changes from the server",
        SyncOutcome::Unchanged => "Already in sync",
        SyncOutcome::Skipped => "Server unreachable; try again later",
        SyncOutcome::Discarded => "Selection changed; result dropped",
    };
    println!("{msg}");
}
