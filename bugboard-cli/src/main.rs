mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use uuid::Uuid;

use bugboard_core::ops::report::NewBugReport;
use bugboard_core::ops::{self, Outcome};
use bugboard_core::{
    AssignmentConfig, Bug, BugStatus, BugStore, LogNotifier, Priority, Role, RoleGrant, Seniority,
    Storage, Team, User,
};

use crate::cli::{Cli, Command, UserCommand};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let storage = Storage::new(&cli.file);
    log::debug!("using bug store at {}", cli.file);
    let config = AssignmentConfig::default();
    let now = chrono::Utc::now();

    match &cli.command {
        Command::Submit {
            application,
            title,
            description,
            reporter,
        } => {
            let outcome = storage.update_atomically(|store| {
                ops::report::submit(
                    store,
                    NewBugReport {
                        application,
                        title,
                        description,
                        reporter_email: reporter,
                        initial_status: None,
                    },
                    now,
                )
            })?;
            finish(&cli, outcome)?;
        }
        Command::AssignTeam { bug, team } => {
            let actor = require_actor(&cli)?;
            let team = parse_team(team)?;
            let outcome = storage
                .update_atomically(|store| ops::report::assign_team(store, actor, bug, team, now))?;
            finish(&cli, outcome)?;
        }
        Command::SetPriority { bug, priority } => {
            let actor = require_actor(&cli)?;
            let priority = parse_priority(priority)?;
            let outcome = storage.update_atomically(|store| {
                ops::report::set_priority(store, actor, bug, priority, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::AssignDeveloper { bug, developer } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::assign::assign_developer(store, &config, actor, bug, developer, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::AssignTester { bug, tester } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::assign::assign_tester(store, &config, actor, bug, tester, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::UnassignDeveloper { bug } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::assign::unassign_developer(store, &config, actor, bug, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::UnassignTester { bug } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::assign::unassign_tester(store, &config, actor, bug, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::AutoAssignDeveloper { bug } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::assign::auto_assign_developer(store, &config, actor, bug, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::AutoAssignTester { bug } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::assign::auto_assign_tester(store, &config, actor, bug, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::RetryAssign => {
            let actor = require_actor(&cli)?;
            let (results, events) = storage.update_atomically(|store| {
                let (mut results, mut events) =
                    ops::assign::retry_unassigned(store, &config, actor, now)?;
                let (tester_results, mut tester_events) =
                    ops::assign::retry_unassigned_testers(store, &config, actor, now)?;
                results.extend(tester_results);
                events.append(&mut tester_events);
                Ok::<_, bugboard_core::BugError>((results, events))
            })?;
            bugboard_core::notify::dispatch_all(&LogNotifier, &events);
            if results.is_empty() {
                println!("{}", "No bugs waiting for assignment".dimmed());
            }
            for r in &results {
                match &r.assigned {
                    Some(who) => println!("{} assigned to {}", r.bug_id.green(), who),
                    None => println!("{} still unassigned (no eligible candidate)", r.bug_id.yellow()),
                }
            }
        }
        Command::UpdateStatus {
            bug,
            status,
            hours,
            reason,
        } => {
            let actor = require_actor(&cli)?;
            let status = parse_status(status)?;
            let outcome = storage.update_atomically(|store| {
                ops::status::update_status(
                    store, &config, actor, bug, status, *hours, reason.as_deref(), now,
                )
            })?;
            finish(&cli, outcome)?;
        }
        Command::UpdateHours { bug, role, hours } => {
            let actor = require_actor(&cli)?;
            let role = parse_assignee_role(role)?;
            let outcome = storage.update_atomically(|store| {
                ops::status::update_hours(store, actor, bug, role, *hours)
            })?;
            finish(&cli, outcome)?;
        }
        Command::MarkDuplicate {
            bug,
            original,
            explanation,
        } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::duplicate::mark_duplicate(
                    store, &config, actor, bug, original, explanation.as_deref(), now,
                )
            })?;
            finish(&cli, outcome)?;
        }
        Command::UndoDuplicate { bug } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::duplicate::undo_duplicate(store, &config, actor, bug, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::RequestReallocation { bug, reason } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::reallocation::request_reallocation(store, actor, bug, reason, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::DecideReallocation {
            bug,
            request,
            decision,
            replacement,
        } => {
            let actor = require_actor(&cli)?;
            let request: Uuid = request.parse().context("invalid request id")?;
            let approve = parse_decision(decision)?;
            let outcome = storage.update_atomically(|store| {
                ops::reallocation::decide_reallocation(
                    store, &config, actor, bug, request, approve, replacement.as_deref(), now,
                )
            })?;
            finish(&cli, outcome)?;
        }
        Command::RequestReopen { bug, reason } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::reopen::request_reopen(store, actor, bug, reason, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::DecideReopen {
            bug,
            request,
            decision,
        } => {
            let actor = require_actor(&cli)?;
            let request: Uuid = request.parse().context("invalid request id")?;
            let approve = parse_decision(decision)?;
            let outcome = storage.update_atomically(|store| {
                ops::reopen::decide_reopen(store, &config, actor, bug, request, approve, now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::Reopen { bug, reason } => {
            let actor = require_actor(&cli)?;
            let outcome = storage.update_atomically(|store| {
                ops::reopen::reopen_direct(store, &config, actor, bug, reason.as_deref(), now)
            })?;
            finish(&cli, outcome)?;
        }
        Command::List { status, team } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let team = team.as_deref().map(parse_team).transpose()?;
            list_bugs(&storage.load()?, status, team, cli.json)?;
        }
        Command::Show { bug } => {
            show_bug(&storage.load()?, bug, cli.json)?;
        }
        Command::Workload { email } => {
            show_workload(&storage.load()?, email, cli.json)?;
        }
        Command::User(user_cmd) => {
            handle_user_command(&storage, user_cmd)?;
        }
    }

    Ok(())
}

fn require_actor(cli: &Cli) -> Result<&str> {
    cli.actor
        .as_deref()
        .context("--actor <email> is required for this command")
}

/// Dispatches the committed operation's notifications and prints the result
fn finish(cli: &Cli, outcome: Outcome) -> Result<()> {
    bugboard_core::notify::dispatch_all(&LogNotifier, &outcome.events);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{} {}", outcome.bug_id.green().bold(), outcome.detail);
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<BugStatus> {
    BugStatus::parse(s).with_context(|| format!("unknown status: {}", s))
}

fn parse_priority(s: &str) -> Result<Priority> {
    Priority::parse(s).with_context(|| format!("unknown priority: {}", s))
}

fn parse_team(s: &str) -> Result<Team> {
    Team::parse(s).with_context(|| format!("unknown team: {}", s))
}

fn parse_seniority(s: &str) -> Result<Seniority> {
    Seniority::parse(s).with_context(|| format!("unknown seniority: {}", s))
}

fn parse_assignee_role(s: &str) -> Result<Role> {
    match s.to_lowercase().as_str() {
        "developer" => Ok(Role::Developer),
        "tester" => Ok(Role::Tester),
        _ => bail!("role must be developer or tester, got: {}", s),
    }
}

fn parse_role(s: &str) -> Result<Role> {
    match s.to_lowercase().as_str() {
        "user" => Ok(Role::User),
        "developer" => Ok(Role::Developer),
        "tester" => Ok(Role::Tester),
        "teamlead" => Ok(Role::TeamLead),
        "admin" => Ok(Role::Admin),
        _ => bail!("unknown role: {}", s),
    }
}

fn parse_decision(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "approve" | "approved" => Ok(true),
        "reject" | "rejected" => Ok(false),
        _ => bail!("decision must be approve or reject, got: {}", s),
    }
}

fn status_color(status: BugStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        BugStatus::Open => text.red(),
        BugStatus::Closed => text.green(),
        BugStatus::Duplicate => text.dimmed(),
        BugStatus::TestedVerified | BugStatus::ReadyForClosure => text.cyan(),
        _ => text.yellow(),
    }
}

fn list_bugs(
    store: &BugStore,
    status: Option<BugStatus>,
    team: Option<Team>,
    json: bool,
) -> Result<()> {
    let bugs: Vec<&Bug> = store
        .bugs
        .iter()
        .filter(|b| status.map_or(true, |s| b.status == s))
        .filter(|b| team.map_or(true, |t| b.assigned_team == Some(t)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&bugs)?);
        return Ok(());
    }
    if bugs.is_empty() {
        println!("{}", "No bugs match".dimmed());
        return Ok(());
    }
    for bug in bugs {
        let priority = bug
            .priority
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let team = bug
            .assigned_team
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} [{:<23}] {:<8} {:<9} {}",
            bug.bug_id.bold(),
            status_color(bug.status),
            priority,
            team,
            bug.title
        );
    }
    Ok(())
}

fn show_bug(store: &BugStore, bug_id: &str, json: bool) -> Result<()> {
    let bug = store
        .get_bug(bug_id)
        .with_context(|| format!("bug {} not found", bug_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(bug)?);
        return Ok(());
    }

    println!("{} {}", bug.bug_id.bold(), bug.title);
    println!("  Application: {}", bug.application);
    println!("  Status:      {}", status_color(bug.status));
    if let Some(reason) = &bug.status_reason {
        println!("  Reason:      {}", reason);
    }
    if let Some(priority) = bug.priority {
        println!("  Priority:    {}", priority);
    }
    if let Some(team) = bug.assigned_team {
        println!("  Team:        {}", team);
    }
    println!("  Reporter:    {} <{}>", bug.reported_by.name, bug.reported_by.email);
    if let Some(dev) = &bug.assigned_to.developer {
        println!("  Developer:   {}", dev);
    }
    if let Some(tester) = &bug.assigned_to.tester {
        println!("  Tester:      {}", tester);
    }
    if let Some(h) = bug.developer_resolution_hours {
        println!("  Fix hours:   {:.1}", h);
    }
    if let Some(h) = bug.tester_validation_hours {
        println!("  Test hours:  {:.1}", h);
    }
    if bug.is_duplicate {
        println!(
            "  Duplicate of {}",
            bug.original_bug_id.as_deref().unwrap_or("?")
        );
    }
    if bug.reopened {
        println!("  {}", "Reopened once".yellow());
    }

    if !bug.change_history.is_empty() {
        println!("  History:");
        for entry in &bug.change_history {
            let what = match (entry.previous_status, entry.new_status) {
                (Some(from), Some(to)) => format!("{:?}: {} -> {}", entry.kind, from, to),
                _ => format!("{:?}", entry.kind),
            };
            println!(
                "    {} {} ({} as {})",
                entry.changed_on.format("%Y-%m-%d %H:%M"),
                what,
                entry.changed_by,
                entry.changed_by_role
            );
        }
    }
    Ok(())
}

fn show_workload(store: &BugStore, email: &str, json: bool) -> Result<()> {
    let user = store
        .get_user(email)
        .with_context(|| format!("user {} not found", email))?;

    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
        return Ok(());
    }

    println!("{} <{}>", user.full_name.bold(), user.email);
    for grant in &user.roles {
        let team = grant
            .team
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let seniority = grant
            .seniority
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let hours = format!("{:.1}h", grant.workload_hours);
        println!(
            "  {:<10} {:<12} {:<10} {:<8} {}{}",
            grant.role,
            grant.application,
            team,
            seniority,
            if grant.workload_hours > 40.0 {
                hours.red()
            } else {
                hours.normal()
            },
            if grant.over_loaded {
                " (overloaded)".red().to_string()
            } else {
                String::new()
            }
        );
    }
    Ok(())
}

fn handle_user_command(storage: &Storage, cmd: &UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Add { name, email } => {
            storage.update_atomically(|store| {
                if store.get_user(email).is_some() {
                    return Err(bugboard_core::BugError::Validation(format!(
                        "user {} already exists",
                        email
                    )));
                }
                store.add_user(User {
                    full_name: name.clone(),
                    email: email.clone(),
                    roles: Vec::new(),
                });
                Ok(())
            })?;
            println!("{} added", email.green());
        }
        UserCommand::Grant {
            email,
            application,
            team,
            role,
            seniority,
        } => {
            let role = parse_role(role)?;
            let team = team.as_deref().map(parse_team).transpose()?;
            let seniority = seniority.as_deref().map(parse_seniority).transpose()?;
            if matches!(role, Role::Developer | Role::Tester) && seniority.is_none() {
                bail!("developer and tester grants need --seniority");
            }
            storage.update_atomically(|store| {
                let user = store.get_user_mut(email).ok_or_else(|| {
                    bugboard_core::BugError::NotFound(format!("user {} not found", email))
                })?;
                user.roles.push(RoleGrant {
                    application: application.clone(),
                    team,
                    role,
                    seniority,
                    workload_hours: 0.0,
                    over_loaded: false,
                });
                Ok(())
            })?;
            println!("{} granted {} on {}", email.green(), role, application);
        }
    }
    Ok(())
}
