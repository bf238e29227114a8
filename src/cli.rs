use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trove", version, about = "Browse and scan chiptune collections", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "TROVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// More logging; repeat for even more. `RUST_LOG` takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List a directory, an archive or the top of the tree
    Ls {
        /// Identifier (`scheme:/path#sub/path`) or local path
        target: Option<String>,
    },
    /// Write the content of a file
    Cat {
        target: String,
        /// Write here instead of standard output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Find playable modules and add them to the playlist
    Scan {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Show the stored playlist
    Playlist,
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["trove", "scan", "file:///music", "-vv", "--config", "trove.toml"]).unwrap();
        assert_eq!(cli.log_level(), "trace");
        assert_eq!(cli.config, Some(PathBuf::from("trove.toml")));
        assert!(matches!(cli.command, Command::Scan { targets } if targets == ["file:///music"]));
    }

    #[test]
    fn test_scan_needs_a_target() {
        assert!(Cli::try_parse_from(["trove", "scan"]).is_err());
    }
}
