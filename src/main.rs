use clap::Parser;
use pokebattle_rl_env::adapters::websocket::WsConnection;
use pokebattle_rl_env::utils::error::ErrorSeverity;
use pokebattle_rl_env::utils::{logger, validation::Validate};
use pokebattle_rl_env::{
    BattleEnv, BattleOutcome, CliConfig, EnvError, Environment, RenderMode, RewardConfig,
    ShowdownSimulator, SimulatorConfig, TomlConfig,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const MAX_REJECTED_CHOICES: usize = 3;

#[derive(Debug, Default)]
struct Summary {
    wins: usize,
    losses: usize,
    ties: usize,
}

async fn play_episode(
    env: &mut BattleEnv<ShowdownSimulator<WsConnection>>,
    rng: &mut StdRng,
) -> pokebattle_rl_env::Result<(BattleOutcome, f32)> {
    env.reset().await?;
    let mut total_reward = 0.0;
    let mut rejected = 0;

    loop {
        let action = *env
            .valid_actions()
            .choose(rng)
            .ok_or_else(|| EnvError::protocol("no valid action available"))?;

        match env.step(action).await {
            Ok(step) => {
                rejected = 0;
                total_reward += step.reward;
                if let Ok(view) = env.render(RenderMode::Ansi) {
                    tracing::debug!("\n{}", view);
                }
                if step.done {
                    return Ok((step.info.outcome, total_reward));
                }
            }
            Err(EnvError::InvalidAction { action, reason }) if rejected < MAX_REJECTED_CHOICES => {
                rejected += 1;
                tracing::warn!("Action {} rejected ({}), choosing again", action, reason);
            }
            Err(e) => return Err(e),
        }
    }
}

async fn run(config: &CliConfig) -> pokebattle_rl_env::Result<Summary> {
    let (sim_config, reward) = match &config.config {
        Some(path) => {
            let file = TomlConfig::from_file(path)?;
            file.validate()?;
            tracing::info!("Loaded configuration from {}", path);
            (SimulatorConfig::from_provider(&file)?, file.reward)
        }
        None => (SimulatorConfig::from_provider(config)?, RewardConfig::default()),
    };

    let simulator = ShowdownSimulator::connect(sim_config).await?;
    let mut env = BattleEnv::new(simulator, reward);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut summary = Summary::default();
    for episode in 1..=config.episodes {
        let (outcome, total_reward) = play_episode(&mut env, &mut rng).await?;
        tracing::info!(
            "Episode {}/{} finished: {} (reward {:.2}, turns {})",
            episode,
            config.episodes,
            outcome,
            total_reward,
            env.state().turn
        );
        match outcome {
            BattleOutcome::Win => summary.wins += 1,
            BattleOutcome::Loss => summary.losses += 1,
            _ => summary.ties += 1,
        }
    }

    env.close().await?;
    Ok(summary)
}

/// 根據錯誤嚴重程度決定退出碼；對戰未全部完成時一律非零
fn exit_code(e: &EnvError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 4,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting pokebattle-env");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run(&config).await {
        Ok(summary) => {
            tracing::info!(
                "✅ Played {} episodes: {} wins, {} losses, {} ties",
                config.episodes,
                summary.wins,
                summary.losses,
                summary.ties
            );
            println!(
                "✅ {} wins / {} losses / {} ties",
                summary.wins, summary.losses, summary.ties
            );
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            std::process::exit(exit_code(&e));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfinished_run_never_exits_zero() {
        let rejected = EnvError::InvalidAction {
            action: 4,
            reason: "[Invalid choice] Can't switch".to_string(),
        };
        assert_eq!(exit_code(&rejected), 4);
        assert_eq!(exit_code(&EnvError::ConnectionClosed), 2);
        assert_eq!(exit_code(&EnvError::auth("nope")), 1);
    }
}
