// Terminal chat client for the halal map service
use halal_map::client::{
    ChatView, FavoritesStore, GuestQuota, HttpChatApi, JsonFileStore, KeyValueStore, MapView,
    TurnOutcome,
};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /fav <n> toggles favorite on result n, /select <n> shows details, \
/favs lists favorite ids, /reset starts over, /quit exits";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let base_url = env::var("HALAL_MAP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let state_path = env::var("HALAL_MAP_STATE").unwrap_or_else(|_| ".halal-map-state.json".to_string());
    let guest = env::args().any(|arg| arg == "--guest");

    let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&state_path)?);
    let api = HttpChatApi::new(base_url.clone());

    let mut chat = ChatView::new(FavoritesStore::load(storage.clone()));
    if guest {
        chat = chat.with_guest_quota(GuestQuota::load(storage));
    }
    let mut map = MapView::new();

    println!("🕌 Halal map chat ({})", base_url);
    match chat.load_initial(&api).await {
        Ok(()) => println!("Loaded {} places.", chat.places().len()),
        Err(e) => println!("❌ Could not load places: {}", e),
    }
    map.set_places(chat.places().to_vec());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(&chat);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            match (parts.next(), parts.next().and_then(|n| n.parse::<usize>().ok())) {
                (Some("quit"), _) => break,
                (Some("reset"), _) => {
                    if let Err(e) = chat.reset(&api).await {
                        println!("❌ Reload failed: {}", e);
                    }
                    map.set_places(chat.places().to_vec());
                    map.clear_selection();
                    println!("Conversation cleared. {} places on the map.", chat.places().len());
                }
                (Some("favs"), _) => println!("Favorites: {:?}", chat.favorites().ids()),
                (Some("fav"), Some(n)) => {
                    let id = chat.chat_list().get(n.wrapping_sub(1)).map(|p| p.id);
                    match id {
                        Some(id) => match chat.favorites_mut().toggle(id) {
                            Ok(true) => println!("⭐ Added {} to favorites", id),
                            Ok(false) => println!("Removed {} from favorites", id),
                            Err(e) => println!("❌ Could not save favorites: {}", e),
                        },
                        None => println!("No result #{}", n),
                    }
                }
                (Some("select"), Some(n)) => {
                    let id = chat.chat_list().get(n.wrapping_sub(1)).map(|p| p.id);
                    match id.filter(|id| map.select(*id)) {
                        Some(_) => {
                            if let Some(place) = map.popup_place() {
                                println!(
                                    "{} | {} | {} | {}",
                                    place.name,
                                    place.address.as_deref().unwrap_or("-"),
                                    place.halal_status.as_deref().unwrap_or("-"),
                                    place.opening_hours.as_deref().unwrap_or("-"),
                                );
                            }
                        }
                        None => println!("No result #{}", n),
                    }
                }
                _ => println!("{}", HELP),
            }
            continue;
        }

        let shown = chat.messages().len();
        // Ctrl-C abandons the turn in flight instead of exiting
        let abort = chat.abort_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                abort.cancel();
            }
        });
        let outcome = chat.submit(&api, line).await;
        interrupt.abort();
        if outcome == TurnOutcome::Rejected {
            continue;
        }

        for message in &chat.messages()[shown..] {
            if message.role == halal_map::ChatRole::Assistant {
                println!("🤖 {}", message.content);
                if message.show_places {
                    for (i, place) in chat.chat_list().iter().enumerate() {
                        let star = if chat.favorites().contains(place.id) { "⭐" } else { " " };
                        println!(
                            "  {}{:>2}. {} ({})",
                            star,
                            i + 1,
                            place.name,
                            place.cuisine_label().unwrap_or("?")
                        );
                    }
                    if chat.places().len() > chat.chat_list().len() {
                        println!("  ...and {} more on the map", chat.places().len() - chat.chat_list().len());
                    }
                }
                if let Some(name) = &message.recommended_place {
                    println!("  👉 Recommended: {}", name);
                }
            }
        }
        map.set_places(chat.places().to_vec());
    }

    Ok(())
}

fn print_prompt(chat: &ChatView) {
    use std::io::Write;
    match chat.guest_quota() {
        Some(quota) => print!("[{} left] > ", quota.remaining()),
        None => print!("> "),
    }
    let _ = std::io::stdout().flush();
}
