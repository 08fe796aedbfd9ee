//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mailcollect_core::COLLECTED_CONF;

/// Collect emails from local mail stores into a directory of individual files.
#[derive(Parser, Debug)]
#[command(name = "mailcollect", version, about, long_about = None)]
pub struct Cli {
    /// Selection rules file.
    #[arg(short, long, default_value = COLLECTED_CONF)]
    pub rules: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do with the selection.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the selected emails without copying anything.
    Show,
    /// Copy the new selected emails into the output directory.
    Apply {
        /// Copy without asking for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Exclude an email from copying.
    Exclude {
        /// Output filename of the email.
        filename: String,
    },
    /// Stop excluding an email.
    Include {
        /// Output filename of the email.
        filename: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["mailcollect", "--rules", "family.conf", "apply", "-y"]).unwrap();
        assert_eq!(cli.rules, PathBuf::from("family.conf"));
        assert_eq!(cli.command, Command::Apply { yes: true });
    }

    #[test]
    fn test_default_rules_file() {
        let cli = Cli::try_parse_from(["mailcollect", "exclude", "a.mbs"]).unwrap();
        assert_eq!(cli.rules, PathBuf::from(COLLECTED_CONF));
        assert_eq!(
            cli.command,
            Command::Exclude {
                filename: "a.mbs".to_string()
            }
        );
    }
}
