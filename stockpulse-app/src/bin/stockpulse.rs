//! StockPulse command-line entry point.

use stockpulse_app::{init_tracing, AppError, Dashboard, PulseConfig, RunOutcome};
use stockpulse_core::{AgentEvent, Notification, NotificationLevel, Timestamp};
use stockpulse_events::ActivityUpdate;
use stockpulse_scheduler::ScheduleState;
use tokio::sync::broadcast;

const USAGE: &str = "\
usage: stockpulse [--config <path>] <command>

commands:
  status                      show the schedule and recent executions
  logs [limit]                show recent executions
  toggle                      pause an active schedule or resume a paused one
  run                         analyze the watchlist now and email the report
  watch                       list the watchlist
  watch add <TICKER>          add a ticker
  watch remove <TICKER>       remove a ticker
  settings <email> [timezone] set the delivery email and timezone
  reports [from] [to]         list stored reports, dates as YYYY-MM-DD";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status,
    Logs(Option<usize>),
    Toggle,
    Run,
    Watch,
    WatchAdd(String),
    WatchRemove(String),
    Settings {
        email: String,
        timezone: Option<String>,
    },
    Reports {
        from: Option<String>,
        to: Option<String>,
    },
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, AppError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            [] | ["help"] | ["--help"] | ["-h"] => Self::Help,
            ["status"] => Self::Status,
            ["logs"] => Self::Logs(None),
            ["logs", limit] => Self::Logs(Some(limit.parse().map_err(|_| {
                AppError::Usage(format!("invalid log limit: {}", limit))
            })?)),
            ["toggle"] => Self::Toggle,
            ["run"] => Self::Run,
            ["watch"] => Self::Watch,
            ["watch", "add", ticker] => Self::WatchAdd(ticker.to_string()),
            ["watch", "remove", ticker] => Self::WatchRemove(ticker.to_string()),
            ["settings", email] => Self::Settings {
                email: email.to_string(),
                timezone: None,
            },
            ["settings", email, timezone] => Self::Settings {
                email: email.to_string(),
                timezone: Some(timezone.to_string()),
            },
            ["reports"] => Self::Reports {
                from: None,
                to: None,
            },
            ["reports", from] => Self::Reports {
                from: Some(from.to_string()),
                to: None,
            },
            ["reports", from, to] => Self::Reports {
                from: Some(from.to_string()),
                to: Some(to.to_string()),
            },
            other => {
                return Err(AppError::Usage(format!(
                    "unrecognized command: {}\n\n{}",
                    other.join(" "),
                    USAGE
                )))
            }
        };
        Ok(command)
    }
}

/// Command-line arguments with `--config <path>` removed.
fn command_args() -> Vec<String> {
    let mut args = std::env::args().skip(1);
    let mut rest = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
        } else {
            rest.push(arg);
        }
    }
    rest
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let command = Command::parse(&command_args())?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = PulseConfig::load()?;
    init_tracing(config.log_format)?;
    let mut dashboard = Dashboard::from_config(&config)?;

    match command {
        Command::Help => {}
        Command::Status => {
            let state = dashboard.refresh().await;
            print_status(&dashboard, &state)?;
        }
        Command::Logs(limit) => {
            let limit = limit.unwrap_or(config.log_limit);
            dashboard.refresh_logs(limit).await;
            print_logs(&dashboard);
        }
        Command::Toggle => {
            let state = dashboard.refresh().await;
            if let ScheduleState::LoadFailed { error, .. } = state {
                return Err(AppError::Failed(error));
            }
            let notification = dashboard.toggle_schedule().await;
            report_notification(&notification)?;
            if let Some(schedule) = dashboard.schedule() {
                println!("Schedule is now {}", schedule.status_label());
            }
        }
        Command::Run => {
            let printer = spawn_activity_printer(&dashboard);
            let outcome = dashboard.run_watchlist().await;
            printer.abort();
            let outcome = outcome?;
            print_run(&outcome);
            report_notification(&outcome.notification)?;
        }
        Command::Watch => print_watchlist(&dashboard),
        Command::WatchAdd(ticker) => {
            if !dashboard.add_ticker(&ticker)? {
                println!("{} is already on the watchlist", ticker.trim().to_uppercase());
            }
            print_watchlist(&dashboard);
        }
        Command::WatchRemove(ticker) => {
            if !dashboard.remove_ticker(&ticker)? {
                println!("{} is not on the watchlist", ticker.trim().to_uppercase());
            }
            print_watchlist(&dashboard);
        }
        Command::Settings { email, timezone } => {
            let timezone = timezone.unwrap_or_else(|| dashboard.timezone().to_string());
            dashboard.save_settings(&email, &timezone)?;
            println!("Delivery email: {}", dashboard.email());
            println!("Timezone:       {}", dashboard.timezone());
        }
        Command::Reports { from, to } => {
            let reports = dashboard.reports_between(from.as_deref(), to.as_deref());
            if reports.is_empty() {
                println!("No reports");
            }
            for report in reports {
                println!(
                    "{}  {}  [{}]  emailed={}  {}",
                    report.date,
                    report.status,
                    report.stocks_analyzed.join(", "),
                    report.email_sent,
                    report.portfolio_summary
                );
                for highlight in &report.key_highlights {
                    println!("    - {}", highlight);
                }
            }
        }
    }
    Ok(())
}

fn print_status(dashboard: &Dashboard, state: &ScheduleState) -> Result<(), AppError> {
    let Some(schedule) = state.schedule() else {
        return Err(AppError::Failed(
            state.error().unwrap_or("Schedule not loaded").to_string(),
        ));
    };
    if let Some(error) = state.error() {
        println!("warning: {} (showing last known state)", error);
    }
    println!("Schedule:  {}", schedule.id);
    println!("Status:    {}", schedule.status_label());
    println!(
        "Cadence:   {} ({})",
        dashboard.schedule_phrase().unwrap_or_default(),
        schedule.timezone
    );
    println!("Next run:  {}", format_time(schedule.effective_next_run()));
    println!("Last run:  {}", format_time(schedule.last_run_at));
    println!();
    print_logs(dashboard);
    Ok(())
}

fn print_logs(dashboard: &Dashboard) {
    let logs = dashboard.execution_logs();
    if logs.is_empty() {
        println!("No executions yet");
    }
    for log in logs {
        println!(
            "{}  {}  {}",
            format_time(Some(log.executed_at)),
            if log.success { "ok    " } else { "failed" },
            log.detail.as_deref().unwrap_or("")
        );
    }
}

fn print_watchlist(dashboard: &Dashboard) {
    if dashboard.watchlist().is_empty() {
        println!("Watchlist is empty");
    } else {
        println!("Watchlist: {}", dashboard.watchlist().join(", "));
    }
}

fn print_run(outcome: &RunOutcome) {
    if let Some(report) = &outcome.report {
        println!("Report {} ({})", report.id, report.date);
        if !report.portfolio_summary.is_empty() {
            println!("{}", report.portfolio_summary);
        }
        for highlight in &report.key_highlights {
            println!("  - {}", highlight);
        }
    }
}

fn report_notification(notification: &Notification) -> Result<(), AppError> {
    match notification.level {
        NotificationLevel::Error => Err(AppError::Failed(notification.message.clone())),
        NotificationLevel::Info | NotificationLevel::Success => {
            println!("{}", notification.message);
            Ok(())
        }
    }
}

/// Echo live narration while a run is in flight.
fn spawn_activity_printer(dashboard: &Dashboard) -> tokio::task::JoinHandle<()> {
    let mut updates = dashboard.activity().subscribe();
    let roster = dashboard.roster().clone();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(ActivityUpdate::Event { event, .. }) => match event {
                    AgentEvent::Thinking(thinking) => println!("  ... {}", thinking.message),
                    AgentEvent::Status(status) if status.processing == Some(true) => {
                        let name = status
                            .agent_name
                            .or_else(|| roster.get(&status.agent_id).cloned())
                            .unwrap_or(status.agent_id);
                        println!("  [{}]", name);
                    }
                    AgentEvent::Status(_) => {}
                },
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn format_time(time: Option<Timestamp>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, AppError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Command::parse(&args)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&[]).unwrap(), Command::Help);
        assert_eq!(parse(&["logs", "5"]).unwrap(), Command::Logs(Some(5)));
        assert_eq!(
            parse(&["watch", "add", "aapl"]).unwrap(),
            Command::WatchAdd("aapl".to_string())
        );
        assert_eq!(
            parse(&["reports", "2026-02-01"]).unwrap(),
            Command::Reports {
                from: Some("2026-02-01".to_string()),
                to: None
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(parse(&["logs", "many"]), Err(AppError::Usage(_))));
        assert!(matches!(parse(&["watch", "drop", "X"]), Err(AppError::Usage(_))));
    }
}
