use anyhow::Result;
use clap::{Parser, Subcommand};
use siteqa::commands::{advise, ask, build, chat, status};
use siteqa::config::Config;

#[derive(Parser)]
#[command(name = "siteqa")]
#[command(about = "Question answering over a local HTML mirror of a website")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk, embed, and store the site content
    Build {
        /// Rebuild the index even if one already exists
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer a single question and exit
    Ask {
        /// The question to answer from the indexed site
        question: String,
        /// Rebuild the index before answering
        #[arg(long)]
        rebuild: bool,
    },
    /// Interactive question loop (type quit, exit, or q to leave)
    Chat {
        /// Rebuild the index before starting
        #[arg(long)]
        rebuild: bool,
    },
    /// Show configuration, content, index, and provider status
    Status,
    /// Watch the screen and offer advice grounded in the indexed site
    Advise {
        /// Seconds between screen captures
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(".")?;

    match cli.command {
        Commands::Build { rebuild } => {
            build(&config, rebuild).await?;
        }
        Commands::Ask { question, rebuild } => {
            ask(&config, &question, rebuild).await?;
        }
        Commands::Chat { rebuild } => {
            chat(&config, rebuild).await?;
        }
        Commands::Status => {
            status(&config).await?;
        }
        Commands::Advise { interval } => {
            advise(&config, interval).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["siteqa", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Status);
        }
    }

    #[test]
    fn ask_command_takes_question() {
        let cli = Cli::try_parse_from(["siteqa", "ask", "How does gold work?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, rebuild } = parsed.command {
                assert_eq!(question, "How does gold work?");
                assert!(!rebuild);
            }
        }
    }

    #[test]
    fn ask_requires_a_question() {
        let cli = Cli::try_parse_from(["siteqa", "ask"]);
        assert!(cli.is_err());
    }

    #[test]
    fn build_rebuild_flag() {
        let cli = Cli::try_parse_from(["siteqa", "build", "--rebuild"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Build { rebuild } = parsed.command {
                assert!(rebuild);
            }
        }
    }

    #[test]
    fn advise_interval_flag() {
        let cli = Cli::try_parse_from(["siteqa", "advise", "--interval", "10"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Advise { interval } = parsed.command {
                assert_eq!(interval, Some(10));
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["siteqa", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["siteqa", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
