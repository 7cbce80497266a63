//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use roster_core::{MemberNumber, Qualification, RescueAvailability, StormAvailability, UnitCode};

/// Emergency service availability roster.
///
/// Records when members are available for storm and rescue work, and
/// reports who can respond over a window.
#[derive(Debug, Parser)]
#[command(name = "roster", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show database location and store counts.
    Status,

    /// Manage the member directory.
    #[command(subcommand)]
    Members(MembersAction),

    /// Record one availability interval, overwriting what it covers.
    Set {
        #[arg(long)]
        member: MemberNumber,

        /// Scope the interval to one unit.
        #[arg(long)]
        unit: Option<UnitCode>,

        /// Interval start (RFC 3339).
        #[arg(long)]
        start: DateTime<Utc>,

        /// Interval end, exclusive (RFC 3339).
        #[arg(long)]
        end: DateTime<Utc>,

        /// AVAILABLE or UNAVAILABLE.
        #[arg(long)]
        storm: Option<StormAvailability>,

        /// IMMEDIATE, SUPPORT or UNAVAILABLE.
        #[arg(long)]
        rescue: Option<RescueAvailability>,
    },

    /// Replace a window of availability from a JSON file.
    Replace {
        /// JSON object with member, start, end and availabilities.
        file: PathBuf,
    },

    /// Show availability for members over a window.
    Show {
        #[arg(long = "member", required = true, num_args = 1..)]
        members: Vec<MemberNumber>,

        #[arg(long)]
        start: DateTime<Utc>,

        #[arg(long)]
        end: DateTime<Utc>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List members available at an instant.
    Available {
        /// Defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        #[arg(long)]
        unit: Option<UnitCode>,

        /// Only members holding any of these qualification codes.
        #[arg(long = "qualification")]
        qualifications: Vec<Qualification>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Aggregate availability statistics over a window.
    Stats {
        #[arg(long)]
        start: DateTime<Utc>,

        #[arg(long)]
        end: DateTime<Utc>,

        #[arg(long)]
        unit: Option<UnitCode>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage default availability templates.
    #[command(subcommand)]
    Template(TemplateAction),
}

/// Member directory actions.
#[derive(Debug, Subcommand)]
pub enum MembersAction {
    /// Upsert members from a JSON array.
    Import { file: PathBuf },

    /// List directory members.
    List {
        #[arg(long)]
        unit: Option<UnitCode>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List team names.
    Teams {
        #[arg(long)]
        unit: Option<UnitCode>,
    },
}

/// Template actions.
#[derive(Debug, Subcommand)]
pub enum TemplateAction {
    /// Store a template from a JSON file, replacing any previous one.
    Set { file: PathBuf },

    /// Print the stored template.
    Show {
        #[arg(long)]
        member: MemberNumber,

        #[arg(long)]
        unit: Option<UnitCode>,
    },

    /// Project the template onto a window starting at `--start`.
    Apply {
        #[arg(long)]
        member: MemberNumber,

        #[arg(long)]
        unit: Option<UnitCode>,

        #[arg(long)]
        start: DateTime<Utc>,

        /// Defaults to `apply_days` after the start.
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn set_parses_typed_arguments() {
        let cli = Cli::try_parse_from([
            "roster",
            "set",
            "--member",
            "42",
            "--start",
            "2025-03-01T00:00:00Z",
            "--end",
            "2025-03-01T06:00:00Z",
            "--storm",
            "available",
        ])
        .unwrap();

        let Some(Commands::Set { member, storm, rescue, .. }) = cli.command else {
            panic!("expected set command");
        };
        assert_eq!(member.get(), 42);
        assert_eq!(storm, Some(StormAvailability::Available));
        assert_eq!(rescue, None);
    }

    #[test]
    fn member_number_must_be_positive() {
        let result = Cli::try_parse_from([
            "roster",
            "template",
            "show",
            "--member",
            "0",
        ]);
        assert!(result.is_err());
    }
}
