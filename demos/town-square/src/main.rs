use std::sync::Arc;
use std::time::Duration;

use tickward::persist::MemoryBackend;
use tickward::prelude::*;
use tickward::{Delivery, init_tracing};
use tokio::sync::mpsc;
use tracing::warn;

/// One second at the default 50 Hz.
const MINE_TICKS: u64 = 50;
const ORE_EXPERIENCE: i64 = 40;

const FIXTURES: &str = r#"{
    "tw_accounts": [
        {"ID": 1, "Username": "mira", "Password": "secret", "Level": 2, "Exp": 30,
         "Upgrade": 0, "PrisonSeconds": 0, "DailyChairGolds": 0, "Relations": 0,
         "WorldID": 0, "DailyStamp": 0, "WeekStamp": 0, "MonthStamp": 0,
         "Strength": 3, "Dexterity": 2, "Hardness": 1, "Vampirism": 0},
        {"ID": 2, "Username": "oskar", "Password": "hunter2", "Level": 1, "Exp": 0,
         "Upgrade": 0, "PrisonSeconds": 0, "DailyChairGolds": 0, "Relations": 0,
         "WorldID": 0, "DailyStamp": 0, "WeekStamp": 0, "MonthStamp": 0,
         "Strength": 1, "Dexterity": 1, "Hardness": 1, "Vampirism": 0}
    ]
}"#;

// ---------------------------------------------------------------------------
// Game commands
// ---------------------------------------------------------------------------

fn mine(world: &mut World, slot: ClientSlot) {
    let started = world.start_action(slot, MINE_TICKS, "Mining", move |world: &mut World| {
        match world.add_experience(slot, ORE_EXPERIENCE) {
            Ok(()) => {
                let _ = world.chat_to(slot, "You mined some ore (+{INT} exp).", &targs![ORE_EXPERIENCE]);
            }
            Err(TickwardError::NotLoggedIn(_)) => {
                let _ = world.chat_to(slot, "You found ore but nobody to credit it to.", &targs![]);
            }
            Err(e) => warn!(%slot, error = %e, "mining reward failed"),
        }
    });
    match started {
        Ok(()) => {}
        Err(TickwardError::Session(_)) => {
            let _ = world.chat_to(slot, "You are already busy.", &targs![]);
        }
        Err(e) => {
            let _ = world.chat_to(slot, "{STR}", &targs![e.to_string()]);
        }
    }
}

fn build_engine(backend: Arc<MemoryBackend>) -> Result<Engine, TickwardError> {
    let config = EngineConfig {
        world_name: "town-square".into(),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(backend, config)?;

    engine.register_command("mine", "", CommandScope::Chat, "Mine the rock you stand on", |world, slot, _args| {
        mine(world, slot)
    })?;
    engine.register_menu_command("mine", |world, slot, _, _| mine(world, slot));
    engine.register_menu(MenuPage::MAIN, |_world, _slot, menu| {
        menu.command("Mine here", "mine", 0, 0);
    });
    Ok(engine)
}

fn print(delivery: &Delivery) {
    let (slot, message) = delivery;
    match serde_json::to_string(message) {
        Ok(json) => println!("{slot} <- {json}"),
        Err(e) => eprintln!("{slot} <- <unprintable: {e}>"),
    }
}

// ---------------------------------------------------------------------------
// Main: two players and a bot walk through a short session
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let backend = Arc::new(MemoryBackend::new().with_latency(Duration::from_millis(30)));
    backend.load_json(FIXTURES).await?;
    let engine = build_engine(Arc::clone(&backend))?;

    let (handle, commands) = EngineHandle::channel(engine.config().command_buffer);
    let (deliveries, mut outbound) = mpsc::unbounded_channel();

    let printer = tokio::spawn(async move {
        while let Some(delivery) = outbound.recv().await {
            print(&delivery);
        }
    });

    let script = async {
        let mira = handle
            .connect(ParticipantKind::Player, Some(Position::new(64.0, 64.0)))
            .await?
            .slot;
        let oskar = handle
            .connect(ParticipantKind::Player, Some(Position::new(128.0, 64.0)))
            .await?
            .slot;
        handle
            .connect(ParticipantKind::Bot { bot_id: 1 }, Some(Position::new(0.0, 0.0)))
            .await?;

        handle.chat(mira, "/login mira secret").await?;
        handle.chat(oskar, "/login oskar hunter2").await?;
        tokio::time::sleep(Duration::from_millis(200)).await;

        handle.chat(mira, "/mine").await?;
        handle.chat(mira, "/mine").await?;
        handle.chat(oskar, "/sound abc").await?;
        handle.chat(oskar, "/group create").await?;
        handle.chat(mira, "/pos").await?;
        handle.chat(oskar, "hello square").await?;
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        // Oskar walks off mid-swing.
        handle.chat(oskar, "/mine").await?;
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle
            .move_to(oskar, Some(Position::new(400.0, 64.0)))
            .await?;
        tokio::time::sleep(Duration::from_millis(200)).await;

        handle.choose_option(mira, 3).await?;
        handle.disconnect(oskar).await?;
        handle.shutdown().await
    };

    let (ran, scripted) = tokio::join!(engine.run(commands, deliveries), script);
    ran?;
    scripted?;
    printer.await?;

    if let Some(rows) = backend.rows("tw_accounts").await {
        for row in rows {
            let columns: Vec<String> = ["Username", "Level", "Exp", "LoginDate"]
                .iter()
                .filter_map(|c| row.get(c).map(|v| format!("{c}={v}")))
                .collect();
            println!("saved: {}", columns.join(" "));
        }
    }
    Ok(())
}
