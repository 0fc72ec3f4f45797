/*
 * Copyright (C) 2023 Asim Ihsan
 * SPDX-License-Identifier: AGPL-3.0-only
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU Affero General Public License as published by the Free
 * Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A
 * PARTICULAR PURPOSE. See the GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License along
 * with this program. If not, see <https://www.gnu.org/licenses/>
 */

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use npc_dialogue::{CheckIn, CheckInWorld, PlazaWorld, RulePreset};
use q_learning::{
    Action, Environment, PolicyLookup, QLearningAgent, Rng, State, StepLimitKind, Trainer,
    TrainingConfig,
};
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "npc-trainer")]
#[command(about = "Teach an NPC what to say with tabular Q-learning")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON training configuration. Flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for the random number generator.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Number of progress reports, 0 for none.
    #[arg(long, global = true)]
    checkpoints: Option<usize>,

    /// Write the learned Q-table to this file as JSON.
    #[arg(long, global = true)]
    dump: Option<PathBuf>,

    /// Print every learned Q-value, best action first.
    #[arg(long, global = true)]
    show_table: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train in the simulated town plaza.
    Plaza {
        /// Training steps.
        #[arg(long)]
        episodes: Option<usize>,
    },
    /// Train on venue check-in records.
    CheckIns {
        /// JSON array of check-in records.
        #[arg(long)]
        records: PathBuf,

        /// Use all five offers and the commerce and nightlife rules.
        #[arg(long)]
        extended: bool,

        /// Only use the first N records.
        #[arg(long)]
        max_records: Option<usize>,

        /// Passes over the records. Picked from the dataset size if not given.
        #[arg(long)]
        epochs: Option<usize>,

        /// Number of categories to show the learned offer for.
        #[arg(long, default_value_t = 10)]
        probes: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Training configuration plus whether it chose a step limit itself. Without a file both are
/// defaults.
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<(TrainingConfig, bool)> {
    match path {
        Some(p) => {
            let content = fs::read_to_string(p)
                .with_context(|| format!("failed to read config {}", p.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("invalid config {}", p.display()))?;
            let has_step_limit = value.get("step_limit").is_some();
            let config: TrainingConfig = serde_json::from_value(value)
                .with_context(|| format!("invalid config {}", p.display()))?;
            Ok((config, has_step_limit))
        }
        None => Ok((TrainingConfig::default(), false)),
    }
}

/// Config file, then command line flags on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<TrainingConfig> {
    let (mut config, has_step_limit) = load_config(cli.config.as_ref())?;

    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(checkpoints) = cli.checkpoints {
        config.checkpoints = checkpoints;
    }

    match &cli.command {
        Commands::Plaza { episodes } => {
            if let Some(episodes) = episodes {
                config.step_limit = StepLimitKind::Steps(*episodes);
            }
        }
        Commands::CheckIns { epochs, .. } => {
            if let Some(epochs) = epochs {
                config.step_limit = StepLimitKind::Epochs(*epochs);
            } else if !has_step_limit {
                config.step_limit = StepLimitKind::AutoEpochs;
            }
        }
    }
    Ok(config)
}

fn load_records(path: &Path, max_records: Option<usize>) -> anyhow::Result<Vec<CheckIn>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read records {}", path.display()))?;
    let mut records: Vec<CheckIn> = serde_json::from_str(&content)
        .with_context(|| format!("invalid records {}", path.display()))?;
    if let Some(max_records) = max_records {
        records.truncate(max_records);
    }
    tracing::info!(records = records.len(), path = %path.display(), "loaded check-ins");
    Ok(records)
}

fn train<_Environment: Environment>(
    environment: _Environment,
    config: &TrainingConfig,
    rng: &mut Rng,
) -> anyhow::Result<QLearningAgent<_Environment::State, _Environment::Action>> {
    let mut trainer =
        Trainer::new(environment, config).context("invalid training configuration")?;
    println!("training for {} steps", trainer.steps());
    let report = trainer.run(rng);
    println!(
        "done: {} steps, mean reward {:.3}, {} states learned",
        report.steps,
        report.mean_reward(),
        trainer.agent().table().len()
    );
    Ok(trainer.into_agent())
}

fn print_policy<_State, _Action>(agent: &QLearningAgent<_State, _Action>)
where
    _State: State,
    _State::Key: Ord + Display,
    _Action: Action + Display,
{
    let mut policy = agent.policy();
    policy.sort_by(|a, b| a.0.cmp(&b.0));
    println!("learned policy:");
    for (key, action, q_value) in policy {
        println!("  {:<40} -> {} ({:.2})", key.to_string(), action, q_value);
    }
}

fn print_table<_State, _Action>(agent: &QLearningAgent<_State, _Action>)
where
    _State: State,
    _State::Key: Ord + Display,
    _Action: Action + Display,
{
    let mut entries: Vec<_> = agent.table().entries().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    println!("q-table:");
    for (key, values) in entries {
        println!("  {}", key);
        for (action, q_value) in values.ranked() {
            println!("    {:<20} {:>9.3}", action.to_string(), q_value);
        }
    }
}

fn finish<_State, _Action>(
    agent: &QLearningAgent<_State, _Action>,
    show_table: bool,
    dump: Option<&PathBuf>,
) -> anyhow::Result<()>
where
    _State: State,
    _State::Key: Ord + Display,
    _Action: Action + Display,
{
    if show_table {
        print_table(agent);
    }
    if let Some(path) = dump {
        let json = agent.table().serialize_table()?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("q-table written to {}", path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tracing::debug!(?config, "resolved config");
    let mut rng = rand_pcg::Pcg64::seed_from_u64(config.seed);

    match &cli.command {
        Commands::Plaza { .. } => {
            let agent = train(PlazaWorld::new(), &config, &mut rng)?;
            print_policy(&agent);
            finish(&agent, cli.show_table, cli.dump.as_ref())?;
        }
        Commands::CheckIns {
            records,
            extended,
            max_records,
            probes,
            ..
        } => {
            let records = load_records(records, *max_records)?;
            let preset = if *extended {
                RulePreset::Extended
            } else {
                RulePreset::Classic
            };
            let world = CheckInWorld::new(records, preset)?;

            println!("top categories:");
            for (category, share) in world.popularity().top(5) {
                println!("  {:<30} {:>6.2}%", category, share * 100.0);
            }

            let agent = train(&world, &config, &mut rng)?;

            println!("learned offers in the afternoon:");
            for (category, lookup) in world.probe(&agent, *probes, &mut rng) {
                let category: String = category.chars().take(20).collect();
                match lookup {
                    PolicyLookup::Known { action, q_value } => {
                        println!("  {:<20} -> {} ({:.2})", category, action, q_value)
                    }
                    PolicyLookup::NoData => println!("  {:<20} -> (no data)", category),
                }
            }
            finish(&agent, cli.show_table, cli.dump.as_ref())?;
        }
    }

    Ok(())
}
