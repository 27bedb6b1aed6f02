//! seed-runner: headless run driver for the Spire generation engine.
//!
//! Usage:
//!   seed-runner --seed 1234567890 --character watcher --ascension 20
//!   seed-runner --seed-long -4213131 --policy random --policy-seed 7 --db run.db
//!   seed-runner --seed ABC123 --ipc-mode

use anyhow::{anyhow, Result};
use spire_core::{
    agent::{drive, FirstChoicePolicy, Policy, RandomPolicy},
    config::{GameData, RunConfig},
    orchestrator::{Action, RunOrchestrator},
    prediction::{predict_boss_relics, predict_card_reward, predict_path, CardRewardQuery},
    seed::{seed_to_string, SeedMaterial},
    store::SimStore,
    types::CharacterClass,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Actions,
    Step {
        action: Action,
    },
    PredictCardReward {
        query: CardRewardQuery,
    },
    PredictBossRelics,
    PredictPath {
        lanes: Vec<usize>,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = match (flag(&args, "--seed"), flag(&args, "--seed-long")) {
        (_, Some(raw)) => SeedMaterial::Numeric(
            raw.parse().map_err(|e| anyhow!("--seed-long {raw}: {e}"))?,
        ),
        (Some(text), None) => SeedMaterial::Text(text.to_string()),
        (None, None) => SeedMaterial::Numeric(42),
    };
    let ascension = parse_arg(&args, "--ascension", 0u8);
    let character: CharacterClass = flag(&args, "--character")
        .unwrap_or("ironclad")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let final_act = args.iter().any(|a| a == "--final-act");
    let policy_name = flag(&args, "--policy").unwrap_or("first");
    let policy_seed = parse_arg(&args, "--policy-seed", 0u64);
    let max_steps = parse_arg(&args, "--max-steps", 2000usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag(&args, "--data-dir");

    let data = match data_dir {
        Some(dir) => GameData::load(dir)?,
        None => GameData::builtin()?,
    };
    let config = RunConfig::new(seed, ascension, character).with_final_act(final_act);
    let resolved = config.seed.resolve()?;

    if !ipc_mode {
        println!("Spire seed-runner");
        println!("  seed:      {} ({resolved})", seed_to_string(resolved));
        println!("  character: {character}");
        println!("  ascension: {ascension}");
        println!("  policy:    {policy_name}");
        println!("  db:        {db}");
        println!("  data_dir:  {}", data_dir.unwrap_or("(builtin)"));
        println!();
    }

    let store = if db == ":memory:" { SimStore::in_memory()? } else { SimStore::open(db)? };
    store.migrate()?;

    let run_id = format!("run-{}", uuid::Uuid::new_v4());
    let started_at = chrono::Utc::now().to_rfc3339();
    store.insert_run(&run_id, resolved, character, ascension, env!("CARGO_PKG_VERSION"), &started_at)?;

    let mut run = RunOrchestrator::new(run_id.clone(), config, data)?;
    run.persist(&store)?;

    if ipc_mode {
        run_ipc_loop(&mut run, &store)?;
    } else {
        let mut policy: Box<dyn Policy> = match policy_name {
            "random" => Box::new(RandomPolicy::new(policy_seed)),
            "first" => Box::new(FirstChoicePolicy),
            other => return Err(anyhow!("unknown policy '{other}' (expected first|random)")),
        };
        let steps = drive(&mut run, policy.as_mut(), max_steps)?;
        run.persist(&store)?;
        print_summary(&run, &store, &run_id, steps)?;
    }

    Ok(())
}

fn run_ipc_loop(run: &mut RunOrchestrator, store: &SimStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                reply(&mut stdout, &serde_json::json!({ "error": e.to_string() }))?;
                continue;
            }
        };

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => serde_json::to_value(run.observe())?,
            IpcCommand::Actions => serde_json::to_value(run.valid_actions())?,
            IpcCommand::Step { action } => match run.step(action) {
                Ok(result) => {
                    run.persist(store)?;
                    serde_json::to_value(result)?
                }
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            IpcCommand::PredictCardReward { query } => match predict_card_reward(run.data(), &query) {
                Ok(prediction) => serde_json::to_value(prediction)?,
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            IpcCommand::PredictBossRelics => match predict_boss_relics(run) {
                Ok(relics) => serde_json::json!({ "relics": relics }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            IpcCommand::PredictPath { lanes } => match predict_path(run, &lanes) {
                Ok(steps) => serde_json::to_value(steps)?,
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
        };
        reply(&mut stdout, &response)?;
    }
    Ok(())
}

fn reply(stdout: &mut io::Stdout, value: &serde_json::Value) -> Result<()> {
    writeln!(stdout, "{value}")?;
    stdout.flush()?;
    Ok(())
}

fn print_summary(run: &RunOrchestrator, store: &SimStore, run_id: &str, steps: usize) -> Result<()> {
    let state = run.state();
    let logged = store.events_for_run(run_id)?.len();

    println!("=== RUN SUMMARY ===");
    println!("  run_id:     {run_id}");
    println!("  steps:      {steps}");
    println!("  phase:      {}", run.phase().name());
    println!("  act/floor:  {}/{}", state.act, state.floor);
    println!("  hp:         {}/{}", state.hp, state.max_hp);
    println!("  gold:       {}", state.gold);
    println!("  deck:       {} cards", state.deck.len());
    println!("  relics:     {}", state.relics.join(", "));
    println!("  potions:    {}", state.potions.join(", "));
    println!("  fights:     {}", state.encounters.len());
    println!("  events log: {logged}");

    println!();
    println!("=== STREAM COUNTERS ===");
    for (name, counter) in run.registry().counters() {
        println!("  {:<12} {counter}", name.name());
    }
    Ok(())
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == name).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
