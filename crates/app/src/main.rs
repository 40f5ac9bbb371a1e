use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
};
use engine::{CreateBillCmd, Engine, Money, ShareSpec};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use uuid::Uuid;

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "billsplit")]
#[command(about = "Record shared bills, split them and track who owes whom")]
struct Cli {
    /// Settings file (without extension).
    #[arg(long, default_value = "settings")]
    config: String,

    /// Database connection string, overrides the settings file.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Group(GroupCommand),
    #[command(subcommand)]
    Bill(BillCommand),
    /// Record a settlement payment against a bill.
    Settle(SettleArgs),
    #[command(subcommand)]
    Balance(BalanceCommand),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Register a user (prompts for the password unless `--password` is set).
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BILLSPLIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Show {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        creator: Uuid,
        #[arg(long = "member")]
        members: Vec<Uuid>,
    },
    AddMember {
        #[arg(long)]
        group: Uuid,
        #[arg(long)]
        member: Uuid,
        #[arg(long = "as")]
        requester: Uuid,
    },
    Show {
        #[arg(long)]
        group: Uuid,
        #[arg(long = "as")]
        user: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum BillCommand {
    Create(BillCreateArgs),
    Show {
        #[arg(long)]
        bill: Uuid,
        #[arg(long = "as")]
        user: Uuid,
    },
    List {
        #[arg(long)]
        group: Uuid,
        #[arg(long = "as")]
        user: Uuid,
    },
}

#[derive(Args, Debug)]
struct BillCreateArgs {
    #[arg(long)]
    group: Uuid,
    #[arg(long = "as")]
    user: Uuid,
    #[arg(long)]
    description: String,
    #[arg(long)]
    total: Money,
    /// Defaults to the requesting user.
    #[arg(long)]
    payer: Option<Uuid>,
    /// `USER_ID` to join the even split, `USER_ID=AMOUNT` to fix an amount.
    #[arg(long = "share", value_parser = parse_share)]
    shares: Vec<ShareSpec>,
}

#[derive(Args, Debug)]
struct SettleArgs {
    #[arg(long)]
    bill: Uuid,
    #[arg(long = "as")]
    user: Uuid,
    #[arg(long)]
    amount: Money,
}

#[derive(Subcommand, Debug)]
enum BalanceCommand {
    /// What a user still owes on one bill.
    Bill {
        #[arg(long)]
        bill: Uuid,
        #[arg(long = "as")]
        user: Uuid,
    },
    /// Net position of a user (or of every member with `--all`) in a group.
    Group {
        #[arg(long)]
        group: Uuid,
        #[arg(long = "as")]
        user: Uuid,
        #[arg(long)]
        all: bool,
    },
}

fn parse_share(raw: &str) -> Result<ShareSpec, String> {
    let (user, amount) = match raw.split_once('=') {
        Some((user, amount)) => (user, Some(amount)),
        None => (raw, None),
    };
    let user_id = Uuid::parse_str(user.trim()).map_err(|err| format!("invalid user id: {err}"))?;
    match amount {
        Some(amount) => {
            let amount = amount.parse::<Money>().map_err(|err| err.to_string())?;
            Ok(ShareSpec::fixed(user_id, amount))
        }
        None => Ok(ShareSpec::even(user_id)),
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> AppResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Reads a password from the terminal without echoing it.
fn prompt_password(prompt: &str) -> AppResult<String> {
    let _raw = RawModeGuard::enter()?;
    let mut out = std::io::stderr();
    execute!(out, Print(prompt))?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };
        match code {
            KeyCode::Enter => break,
            KeyCode::Backspace => {
                buf.pop();
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) => buf.push(ch),
            _ => {}
        }
    }
    execute!(out, Print("\r\n"))?;
    out.flush()?;

    if buf.is_empty() {
        return Err("password must not be empty".into());
    }
    Ok(buf)
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_engine(database_url: &str) -> AppResult<Engine> {
    let db = sea_orm::Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    Ok(Engine::builder().database(db).build().await?)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "billsplit={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let database_url = cli
        .database_url
        .unwrap_or_else(|| settings.database.url());
    tracing::debug!("opening ledger at {database_url}");
    let engine = connect_engine(&database_url).await?;

    match cli.command {
        Command::User(UserCommand::Register {
            name,
            email,
            password,
        }) => {
            let password = match password {
                Some(password) => password,
                None => prompt_password("Password: ")?,
            };
            let user = engine.register_user(&name, &email, &password).await?;
            tracing::info!(user_id = %user.id, "user registered");
            print_json(&user)?;
        }
        Command::User(UserCommand::Show { email }) => match engine.find_user_by_email(&email).await? {
            Some(user) => print_json(&user)?,
            None => {
                eprintln!("user not found: {email}");
                std::process::exit(1);
            }
        },
        Command::Group(GroupCommand::Create {
            name,
            creator,
            members,
        }) => {
            let group = engine.create_group(&name, &members, creator).await?;
            tracing::info!(group_id = %group.id, "group created");
            print_json(&group)?;
        }
        Command::Group(GroupCommand::AddMember {
            group,
            member,
            requester,
        }) => {
            print_json(&engine.add_member(group, member, requester).await?)?;
        }
        Command::Group(GroupCommand::Show { group, user }) => {
            print_json(&engine.authorize_group_access(group, user).await?)?;
        }
        Command::Bill(BillCommand::Create(args)) => {
            let mut cmd = CreateBillCmd::new(args.group, args.user, args.description, args.total)
                .shares(args.shares);
            if let Some(payer) = args.payer {
                cmd = cmd.payer(payer);
            }
            let bill = engine.create_bill(cmd).await?;
            tracing::info!(bill_id = %bill.id, "bill created");
            print_json(&bill)?;
        }
        Command::Bill(BillCommand::Show { bill, user }) => {
            print_json(&engine.bill(bill, user).await?)?;
        }
        Command::Bill(BillCommand::List { group, user }) => {
            print_json(&engine.list_bills(group, user).await?)?;
        }
        Command::Settle(args) => {
            let tx = engine
                .record_transaction(args.bill, args.amount, args.user)
                .await?;
            print_json(&tx)?;
        }
        Command::Balance(BalanceCommand::Bill { bill, user }) => {
            println!("{}", engine.amount_owed(bill, user).await?);
        }
        Command::Balance(BalanceCommand::Group { group, user, all }) => {
            if all {
                let balances = engine.group_balances(group, user).await?;
                let mut rows: Vec<_> = balances.into_iter().collect();
                rows.sort_by_key(|(_, amount)| *amount);
                for (user_id, amount) in rows {
                    println!("{user_id}\t{amount}");
                }
            } else {
                println!("{}", engine.net_balance(group, user).await?);
            }
        }
    }

    Ok(())
}
