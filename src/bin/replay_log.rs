use anyhow::{Context, Result};
use clap::Parser;
use pokebattle_rl_env::core::env::render_text;
use pokebattle_rl_env::utils::logger;
use pokebattle_rl_env::BattleTracker;

const REPLAY_ROOM: &str = "battle-replay";

#[derive(Parser)]
#[command(name = "replay-log")]
#[command(about = "Feed a recorded Showdown protocol log through the battle tracker")]
struct Args {
    /// Log file: raw websocket frames (each starting with `>room`) or a plain replay log
    log: String,

    /// Name of the player whose side is tracked as our own
    #[arg(short, long)]
    username: String,

    /// Print the tracked state every time a decision would be due
    #[arg(long)]
    each_turn: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Plain replay logs have no room headers; wrap them as one frame of a synthetic room.
fn split_frames(content: &str) -> Vec<String> {
    if !content.lines().any(|line| line.starts_with('>')) {
        return vec![format!(">{}\n|init|battle\n{}", REPLAY_ROOM, content)];
    }

    let mut frames: Vec<String> = Vec::new();
    for line in content.lines() {
        if line.starts_with('>') || frames.is_empty() {
            frames.push(line.to_string());
        } else if let Some(frame) = frames.last_mut() {
            frame.push('\n');
            frame.push_str(line);
        }
    }
    frames
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let content = std::fs::read_to_string(&args.log)
        .with_context(|| format!("failed to read {}", args.log))?;

    let mut tracker = BattleTracker::new(args.username.clone());
    for (index, frame) in split_frames(&content).iter().enumerate() {
        let end = tracker
            .process(frame)
            .with_context(|| format!("frame {} could not be applied", index + 1))?;
        if end && args.each_turn {
            println!("{}", render_text(tracker.state()));
        }
    }

    println!("{}", render_text(tracker.state()));
    println!(
        "Outcome: {} after {} turns{}",
        tracker.state().outcome,
        tracker.state().turn,
        if tracker.state().forfeited { " (forfeit)" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_log() {
        let frames = split_frames("|player|p1|a|1\n|turn|1");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with(">battle-replay\n|init|battle\n"));
    }

    #[test]
    fn test_split_raw_frames() {
        let frames = split_frames(">battle-x-1\n|init|battle\n\n>battle-x-1\n|turn|1");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], ">battle-x-1\n|turn|1");
    }
}
