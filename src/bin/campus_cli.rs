//! Command line front end for the campus booking API.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use log::debug;

use campus_book::client::{ApiClient, ClientError, FileTokenStore, DEFAULT_BASE_URL};
use campus_book::models::{BookingType, CreateBookingRequest, Role, SignupRequest};
use campus_book::schedule::{free_windows, is_free, parse_date, parse_time};

#[derive(Debug, Parser)]
#[command(name = "campus-cli", about = "Book campus labs, halls and meeting rooms", version)]
struct Cli {
    /// Base URL of the API, including the `/api` prefix.
    #[arg(long, env = "CAMPUS_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Where login tokens are kept between invocations.
    #[arg(long, env = "CAMPUS_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
        /// STUDENT, STAFF or LAB_INCHARGE.
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        roll_number: Option<String>,
        #[arg(long)]
        employee_id: Option<String>,
        #[arg(long)]
        designation: Option<String>,
    },
    /// List bookable resources.
    Resources,
    /// Show busy slots and free windows of a resource on a day.
    Availability {
        #[arg(long)]
        resource: i64,
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long, default_value = "08:00", value_parser = parse_time_arg)]
        open: NaiveTime,
        #[arg(long, default_value = "20:00", value_parser = parse_time_arg)]
        close: NaiveTime,
    },
    /// Request a booking, either of a resource or of a faculty member's consultation space.
    Book {
        #[arg(long, conflicts_with = "staff_id", required_unless_present = "staff_id")]
        resource: Option<i64>,
        /// Employee id of the staff member to meet.
        #[arg(long)]
        staff_id: Option<String>,
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_time_arg)]
        start: NaiveTime,
        #[arg(long, value_parser = parse_time_arg)]
        end: NaiveTime,
        /// NORMAL, SPECIAL or MEETING.
        #[arg(long = "type", value_parser = parse_booking_type)]
        kind: Option<BookingType>,
        #[arg(long)]
        justification: Option<String>,
    },
    /// List the bookings visible to you.
    Bookings,
    Approve {
        id: i64,
        #[arg(long)]
        remarks: Option<String>,
    },
    Reject {
        id: i64,
        #[arg(long)]
        remarks: String,
    },
    Cancel {
        id: i64,
    },
    Notifications,
    /// Mark every notification as read.
    ReadAll,
    Audit,
    /// Dashboard counters for admins, personal counters for everyone else.
    Stats {
        #[arg(long)]
        dashboard: bool,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse()
}

fn parse_booking_type(raw: &str) -> Result<BookingType, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_uppercase()))
        .map_err(|_| format!("unknown booking type `{raw}`"))
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("`{raw}` is not a YYYY-MM-DD date"))
}

fn parse_time_arg(raw: &str) -> Result<NaiveTime, String> {
    parse_time(raw).ok_or_else(|| format!("`{raw}` is not an HH:MM time"))
}

fn default_token_file() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".campus-cli-tokens.json")
}

#[actix_web::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    let token_file = cli.token_file.unwrap_or_else(default_token_file);
    debug!("Using token file {}", token_file.display());
    let client = ApiClient::new(cli.api_url, Arc::new(FileTokenStore::new(token_file)));

    match run(&client, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ClientError::Unauthorized) => {
            eprintln!("Your session has ended. Run `campus-cli login` to sign in again.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &ApiClient, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Login { email, password } => {
            let auth = client.login(&email, &password).await?;
            println!("Logged in as {} ({})", auth.user.name, auth.user.role);
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Command::Signup {
            name,
            email,
            phone,
            password,
            role,
            department,
            roll_number,
            employee_id,
            designation,
        } => {
            let user = client
                .signup(&SignupRequest {
                    name,
                    email,
                    phone,
                    confirm_password: password.clone(),
                    password,
                    role,
                    department,
                    roll_number,
                    employee_id,
                    designation,
                })
                .await?;
            println!("Registered {} as {}. You can now log in.", user.email, user.role);
        }
        Command::Resources => {
            for r in client.list_resources().await? {
                println!(
                    "{:>4}  {:<28} {:<13} cap {:<4} {}",
                    r.id,
                    r.name,
                    r.kind.as_str(),
                    r.capacity,
                    r.status.as_str()
                );
            }
        }
        Command::Availability {
            resource,
            date,
            open,
            close,
        } => {
            let busy = client.availability(resource, date).await?;
            println!("Busy on {date}:");
            if busy.is_empty() {
                println!("  none");
            }
            for slot in &busy {
                println!("  {} - {}", slot.start_time.format("%H:%M"), slot.end_time.format("%H:%M"));
            }
            println!("Free between {} and {}:", open.format("%H:%M"), close.format("%H:%M"));
            for (start, end) in free_windows(&busy, open, close) {
                println!("  {} - {}", start.format("%H:%M"), end.format("%H:%M"));
            }
        }
        Command::Book {
            resource,
            staff_id,
            date,
            start,
            end,
            kind,
            justification,
        } => {
            if let Some(resource) = resource {
                let busy = client.availability(resource, date).await?;
                if !is_free(&busy, start, end) {
                    eprintln!("warning: the requested slot overlaps an existing booking");
                }
            }
            let booking = client
                .create_booking(&CreateBookingRequest {
                    resource,
                    staff_id,
                    booking_date: date.to_string(),
                    start_time: start.format("%H:%M:%S").to_string(),
                    end_time: end.format("%H:%M:%S").to_string(),
                    booking_type: kind,
                    justification,
                })
                .await?;
            println!(
                "Booking {} for {} is {}",
                booking.id,
                booking.resource_name,
                booking.status.as_str()
            );
        }
        Command::Bookings => {
            for b in client.list_bookings().await? {
                println!(
                    "{:>4}  {} {}-{}  {:<28} {:<8} {:<8} {}",
                    b.id,
                    b.booking_date,
                    b.start_time.format("%H:%M"),
                    b.end_time.format("%H:%M"),
                    b.resource_name,
                    b.booking_type.as_str(),
                    b.status.as_str(),
                    b.user_name
                );
            }
        }
        Command::Approve { id, remarks } => {
            client.approve_booking(id, remarks.as_deref()).await?;
            println!("Booking {id} approved");
        }
        Command::Reject { id, remarks } => {
            client.reject_booking(id, &remarks).await?;
            println!("Booking {id} rejected");
        }
        Command::Cancel { id } => {
            client.cancel_booking(id).await?;
            println!("Booking {id} cancelled");
        }
        Command::Notifications => {
            for n in client.notifications().await? {
                let marker = if n.is_read { " " } else { "*" };
                println!("{marker} {:>4}  {}  {}", n.id, n.created_at.format("%Y-%m-%d %H:%M"), n.message);
            }
        }
        Command::ReadAll => {
            client.mark_all_read().await?;
            println!("All notifications marked as read");
        }
        Command::Audit => {
            for entry in client.audit_logs().await? {
                println!(
                    "{}  {:<18} {:<20} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.user_name.unwrap_or_else(|| "-".to_string()),
                    entry.details
                );
            }
        }
        Command::Stats { dashboard: true } => {
            let stats = client.dashboard_stats().await?;
            println!("Users:             {}", stats.total_users);
            println!("Active bookings:   {}", stats.active_bookings);
            println!("Pending approvals: {}", stats.pending_approvals);
            println!("Resources:         {}", stats.total_resources);
        }
        Command::Stats { dashboard: false } => {
            let stats = client.student_stats().await?;
            println!("Upcoming:  {}", stats.upcoming);
            println!("Pending:   {}", stats.pending);
            println!("Completed: {}", stats.completed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn book_requires_a_target() {
        let parsed = Cli::try_parse_from([
            "campus-cli", "book", "--date", "2030-01-01", "--start", "10:00", "--end", "11:00",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parses_booking_type_case_insensitively() {
        assert_eq!(parse_booking_type("special"), Ok(BookingType::Special));
        assert!(parse_booking_type("vip").is_err());
    }
}
