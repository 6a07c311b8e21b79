use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Defect tracking with capacity-aware assignment")]
pub struct Cli {
    /// Path to the bug store file
    #[clap(long, default_value = "bugboard.yaml")]
    pub file: String,

    /// Email of the acting user
    #[clap(long, short = 'a')]
    pub actor: Option<String>,

    /// Emit machine-readable JSON instead of colored text
    #[clap(long)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report a new bug
    Submit {
        /// Application the bug is reported against
        #[clap(long)]
        application: String,

        /// Short title (15-30 characters)
        #[clap(long)]
        title: String,

        /// Description of the problem (30-100 characters)
        #[clap(long)]
        description: String,

        /// Email of the reporting user
        #[clap(long)]
        reporter: String,
    },

    /// Route a bug to a team (admin only)
    AssignTeam {
        bug: String,

        /// Team name: frontend, backend or devops
        #[clap(long)]
        team: String,
    },

    /// Set the bug priority (admin/teamlead, before assignment)
    SetPriority {
        bug: String,

        /// Priority: critical, high, medium or low
        #[clap(long)]
        priority: String,
    },

    /// Manually assign a developer
    AssignDeveloper {
        bug: String,

        /// Email of the developer
        #[clap(long)]
        developer: String,
    },

    /// Manually assign a tester
    AssignTester {
        bug: String,

        /// Email of the tester
        #[clap(long)]
        tester: String,
    },

    /// Remove the developer assignment
    UnassignDeveloper { bug: String },

    /// Remove the tester assignment
    UnassignTester { bug: String },

    /// Let the assignment engine pick a developer
    AutoAssignDeveloper { bug: String },

    /// Let the assignment engine pick a tester
    AutoAssignTester { bug: String },

    /// Re-run auto-assignment over all routed bugs missing a developer
    /// or a tester
    RetryAssign,

    /// Move a bug to a new status
    UpdateStatus {
        bug: String,

        /// Target status, e.g. "Fix In Progress"
        #[clap(long)]
        status: String,

        /// Hours worked; required when completing a fix or a validation
        #[clap(long)]
        hours: Option<f64>,

        /// Free-text reason recorded with the change
        #[clap(long)]
        reason: Option<String>,
    },

    /// Correct previously logged hours
    UpdateHours {
        bug: String,

        /// Which entry to correct: developer or tester
        #[clap(long)]
        role: String,

        /// Corrected hour value
        #[clap(long)]
        hours: f64,
    },

    /// Mark a bug as a duplicate of another
    MarkDuplicate {
        bug: String,

        /// The bug this one duplicates
        #[clap(long)]
        original: String,

        /// Optional explanation
        #[clap(long)]
        explanation: Option<String>,
    },

    /// Undo a duplicate mark, restoring the prior status
    UndoDuplicate { bug: String },

    /// Ask to be replaced on a bug you are assigned to
    RequestReallocation {
        bug: String,

        /// Why you need to hand the bug over (10-100 characters)
        #[clap(long)]
        reason: String,
    },

    /// Approve or reject a reallocation request (admin/teamlead)
    DecideReallocation {
        bug: String,

        /// Id of the request being decided
        #[clap(long)]
        request: String,

        /// Decision: approve or reject
        #[clap(long)]
        decision: String,

        /// Replacement assignee; the engine picks one when omitted
        #[clap(long)]
        replacement: Option<String>,
    },

    /// Ask for a closed bug to be reopened (within 7 days of closure)
    RequestReopen {
        bug: String,

        /// Why the bug should come back
        #[clap(long)]
        reason: String,
    },

    /// Approve or reject a reopen request (admin/teamlead)
    DecideReopen {
        bug: String,

        /// Id of the request being decided
        #[clap(long)]
        request: String,

        /// Decision: approve or reject
        #[clap(long)]
        decision: String,
    },

    /// Reopen a closed bug directly (admin/teamlead, no time window)
    Reopen {
        bug: String,

        /// Free-text reason recorded with the reopen
        #[clap(long)]
        reason: Option<String>,
    },

    /// List bugs, optionally filtered
    List {
        /// Filter by status
        #[clap(long)]
        status: Option<String>,

        /// Filter by team
        #[clap(long)]
        team: Option<String>,
    },

    /// Show one bug in full, including its change history
    Show { bug: String },

    /// Show a user's role grants and workload
    Workload {
        /// Email of the user
        email: String,
    },

    /// Manage users and role grants
    #[clap(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Add a user
    Add {
        /// Full name
        #[clap(long)]
        name: String,

        /// Email address (the user's identity everywhere else)
        #[clap(long)]
        email: String,
    },

    /// Grant a role for one application and team
    Grant {
        /// Email of the user
        email: String,

        #[clap(long)]
        application: String,

        /// Team the grant is scoped to (omit for admin)
        #[clap(long)]
        team: Option<String>,

        /// Role: user, developer, tester, teamlead or admin
        #[clap(long)]
        role: String,

        /// Seniority for developer/tester grants: junior, mid or senior
        #[clap(long)]
        seniority: Option<String>,
    },
}
