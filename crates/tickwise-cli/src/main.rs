use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tickwise", version, about = "Tickwise Pomodoro timer")]
struct Cli {
    /// Execution context id. Invocations sharing an id share the session tier.
    #[arg(long, global = true, env = "TICKWISE_ORIGIN")]
    origin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickwise=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action, cli.origin),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tickwise", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::timer::TimerAction;
    use tickwise_core::TimerMode;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_start_with_options() {
        let cli = Cli::try_parse_from([
            "tickwise", "timer", "start", "--task", "t-1", "--minutes", "50",
        ])
        .unwrap();
        match cli.command {
            Commands::Timer {
                action: TimerAction::Start { task, minutes },
            } => {
                assert_eq!(task.as_deref(), Some("t-1"));
                assert_eq!(minutes, Some(50));
            }
            _ => panic!("expected timer start"),
        }
    }

    #[test]
    fn parses_mode_names() {
        let cli = Cli::try_parse_from(["tickwise", "timer", "mode", "long-break"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Timer {
                action: TimerAction::Mode {
                    mode: TimerMode::LongBreak
                }
            }
        ));
        assert!(Cli::try_parse_from(["tickwise", "timer", "mode", "nap"]).is_err());
    }

    #[test]
    fn origin_is_global() {
        let cli =
            Cli::try_parse_from(["tickwise", "timer", "status", "--origin", "tab-x"]).unwrap();
        assert_eq!(cli.origin.as_deref(), Some("tab-x"));
    }

    #[test]
    fn parses_health_reset_flag() {
        let cli = Cli::try_parse_from(["tickwise", "timer", "health", "--reset"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Timer {
                action: TimerAction::Health { reset: true }
            }
        ));
    }
}
