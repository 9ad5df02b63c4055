use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snake_q_learning::agent::{Agent, EpisodeStats, RandomAgent, Report};
use snake_q_learning::compare::compare_agents;
use snake_q_learning::config::{EnvConfig, QLearningConfig, RunConfig};
use snake_q_learning::draw::ConsoleRenderer;
use snake_q_learning::env::{Environment, SnakeEnv};
use snake_q_learning::qlearn::QLearningAgent;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL: &str = "q_learning_model.txt";
/// Exploration rate used by `train` when no config file overrides it
const TRAIN_EPSILON: f64 = 0.3;
const TRAIN_MAX_STEPS: usize = 500;
const DEMO_MAX_STEPS: usize = 200;
const COMPARE_MAX_STEPS: usize = 300;

#[derive(Debug, Parser)]
#[command(name = "snake-rl", author, version, about, long_about = None)]
struct Cli {
    /// JSON file with environment and agent settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a Q-learning agent and save its table
    Train(TrainArgs),
    /// Play greedy episodes with a saved table
    Evaluate(EvaluateArgs),
    /// Watch a random agent play
    Demo(DemoArgs),
    /// Random baseline vs. a saved table, evaluated in parallel
    Compare(CompareArgs),
    /// Print the first states of a saved table
    Show(ShowArgs),
}

#[derive(Debug, clap::Args)]
struct TrainArgs {
    #[arg(long, default_value_t = 1000)]
    episodes: usize,
    /// Episode step cap [default: 500, or the config file's value]
    #[arg(long)]
    max_steps: Option<usize>,
    /// Output path; a `.bin` extension writes a binary snapshot
    #[arg(long, default_value = DEFAULT_MODEL)]
    out: PathBuf,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    gamma: Option<f64>,
    #[arg(long)]
    epsilon: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, clap::Args)]
struct EvaluateArgs {
    #[arg(long, default_value_t = 10)]
    episodes: usize,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: PathBuf,
    /// Draw every step to the console
    #[arg(long)]
    render: bool,
    /// Pause between rendered frames, in milliseconds
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,
}

#[derive(Debug, clap::Args)]
struct DemoArgs {
    #[arg(long, default_value_t = 5)]
    episodes: usize,
    /// Episode step cap [default: 200, or the config file's value]
    #[arg(long)]
    max_steps: Option<usize>,
    #[arg(long)]
    render: bool,
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,
}

#[derive(Debug, clap::Args)]
struct CompareArgs {
    #[arg(long, default_value_t = 20)]
    episodes: usize,
    /// Episode step cap [default: 300, or the config file's value]
    #[arg(long)]
    max_steps: Option<usize>,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: PathBuf,
}

#[derive(Debug, clap::Args)]
struct ShowArgs {
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: PathBuf,
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let run_config = match &cli.config {
        Some(path) => Some(
            RunConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
        ),
        None => None,
    };

    match cli.command {
        Command::Train(args) => train(run_config, &args),
        Command::Evaluate(args) => evaluate(run_config.unwrap_or_default(), &args),
        Command::Demo(args) => demo(run_config, &args),
        Command::Compare(args) => compare(run_config, &args),
        Command::Show(args) => show(&args),
    }
}

fn train(run_config: Option<RunConfig>, args: &TrainArgs) -> Result<()> {
    let env_config = episode_config(run_config.as_ref(), args.max_steps, TRAIN_MAX_STEPS);
    let mut params = match run_config {
        Some(c) => c.agent,
        None => QLearningConfig {
            epsilon: TRAIN_EPSILON,
            ..Default::default()
        },
    };
    if let Some(lr) = args.learning_rate {
        params.alpha = lr;
    }
    if let Some(gamma) = args.gamma {
        params.gamma = gamma;
    }
    if let Some(epsilon) = args.epsilon {
        params.epsilon = epsilon;
    }

    let mut env = SnakeEnv::new(EnvConfig {
        seed: args.seed.or(env_config.seed),
        ..env_config
    });
    let mut agent = match args.seed {
        Some(seed) => QLearningAgent::with_seed(params, seed),
        None => QLearningAgent::new(params),
    };

    let report = agent.train(&mut env, args.episodes)?;
    print_report("Training", &report);

    save_model(&agent, &args.out)?;
    println!("Model saved to {}", args.out.display());
    Ok(())
}

fn evaluate(run_config: RunConfig, args: &EvaluateArgs) -> Result<()> {
    let mut agent = load_model(&args.model)?;
    let mut env = SnakeEnv::new(run_config.env);

    let report = if args.render {
        let saved = agent.epsilon();
        agent.set_epsilon(0.0);
        let report = play_rendered(&mut agent, &mut env, args.episodes, args.delay_ms);
        agent.set_epsilon(saved);
        report?
    } else {
        agent.evaluate(&mut env, args.episodes)?
    };
    print_report("Evaluation", &report);
    Ok(())
}

fn demo(run_config: Option<RunConfig>, args: &DemoArgs) -> Result<()> {
    let mut env = SnakeEnv::new(episode_config(
        run_config.as_ref(),
        args.max_steps,
        DEMO_MAX_STEPS,
    ));
    let mut agent = RandomAgent::new();

    let report = if args.render {
        play_rendered(&mut agent, &mut env, args.episodes, args.delay_ms)?
    } else {
        agent.evaluate(&mut env, args.episodes)?
    };
    print_report("Random agent demo", &report);
    Ok(())
}

fn compare(run_config: Option<RunConfig>, args: &CompareArgs) -> Result<()> {
    let agent = load_model(&args.model)?;
    let env_config = episode_config(run_config.as_ref(), args.max_steps, COMPARE_MAX_STEPS);
    let cmp = compare_agents(env_config, args.episodes, &agent)?;

    println!("Agent comparison over {} episodes:", args.episodes);
    println!("  Random agent average score:     {:.2}", cmp.random.average_score());
    println!("  Q-learning agent average score: {:.2}", cmp.q_learning.average_score());
    match cmp.improvement() {
        Some(pct) => println!("  Improvement: {pct:.1}%"),
        None => println!("  Improvement: n/a (random agent scored nothing)"),
    }
    Ok(())
}

fn show(args: &ShowArgs) -> Result<()> {
    let agent = load_model(&args.model)?;
    print!("{}", agent.summary(args.limit));
    Ok(())
}

/// Environment settings for a command: an explicit `--max-steps` wins, then
/// the config file, then the command's own default.
fn episode_config(run_config: Option<&RunConfig>, max_steps: Option<usize>, fallback: usize) -> EnvConfig {
    match run_config {
        Some(c) => EnvConfig {
            max_steps: max_steps.unwrap_or(c.env.max_steps),
            ..c.env
        },
        None => EnvConfig {
            max_steps: max_steps.unwrap_or(fallback),
            ..Default::default()
        },
    }
}

fn load_model(path: &Path) -> Result<QLearningAgent> {
    let mut agent = QLearningAgent::default();
    let loaded = if is_snapshot(path) {
        agent.load_snapshot(path)
    } else {
        agent.load(path)
    };
    loaded.with_context(|| format!("failed to load model {}", path.display()))?;
    Ok(agent)
}

fn save_model(agent: &QLearningAgent, path: &Path) -> Result<()> {
    let saved = if is_snapshot(path) {
        agent.save_snapshot(path)
    } else {
        agent.save(path)
    };
    saved.with_context(|| format!("failed to save model {}", path.display()))
}

fn is_snapshot(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bin")
}

/// Like `Agent::evaluate`, but draws every frame to stdout.
fn play_rendered(
    agent: &mut dyn Agent,
    env: &mut SnakeEnv,
    episodes: usize,
    delay_ms: u64,
) -> Result<Report> {
    let mut renderer = ConsoleRenderer::stdout(env.game().grid());
    let delay = Duration::from_millis(delay_ms);
    let mut report = Report::default();

    for episode in 0..episodes {
        let mut state = env.reset();
        let mut stats = EpisodeStats::default();
        env.render(&mut renderer);
        while !env.is_done() {
            let action = agent.select_action(&state);
            let (next_state, reward) = env.step(action)?;
            state = next_state;
            stats.reward += reward;
            stats.length += 1;
            env.render(&mut renderer);
            thread::sleep(delay);
        }
        stats.score = env.game().score();
        info!(
            agent = agent.name(),
            episode = episode + 1,
            reward = stats.reward,
            length = stats.length,
            score = stats.score,
            "episode finished"
        );
        report.push(stats);
    }
    Ok(report)
}

fn print_report(title: &str, report: &Report) {
    println!("{title}: {} episodes", report.len());
    println!("  Average reward: {:.2}", report.average_reward());
    println!("  Average length: {:.2}", report.average_length());
    println!("  Average score:  {:.2}", report.average_score());
    println!("  Best score:     {}", report.best_score());
}
