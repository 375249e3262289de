//! Admin tools platform - Main entry point
//!
//! Runs the web server and provides management commands for users, tool
//! permissions and sessions.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use admin_tools::accounts::{NewUser, UserStore};
use admin_tools::config::{self, Config};
use admin_tools::db::Database;
use admin_tools::permissions::{Tool, assign_user_to_tool, user_has_tool_permission};
use admin_tools::server::run_server;
use admin_tools::sessions::{SessionCodec, SessionStore, list_active_sessions};
use admin_tools::state::AppState;

/// Admin tools platform - login, tool dashboard and session viewer
#[derive(Parser)]
#[command(name = "admin-tools")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value_os_t = Config::default_path())]
    config: PathBuf,

    /// Data directory for the sqlite database and logs
    #[arg(short, long, default_value_os_t = Config::default_data_dir())]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web server
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// User management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Tool permission management
    Tools {
        #[command(subcommand)]
        command: ToolCommands,
    },

    /// Session management
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Generate a default configuration file
    InitConfig {
        /// Output path (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user (must change password at first login unless told otherwise)
    Create {
        username: String,

        #[arg(long, env = "ADMIN_TOOLS_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "")]
        email: String,

        /// Allow access to the admin site
        #[arg(long)]
        staff: bool,

        /// Grant every permission (implies --staff)
        #[arg(long)]
        superuser: bool,

        /// Do not require a password change at first login
        #[arg(long)]
        no_password_change: bool,
    },

    /// List users
    List,

    /// Reset a user's password
    SetPassword {
        username: String,

        #[arg(long, env = "ADMIN_TOOLS_PASSWORD", hide_env_values = true)]
        password: String,

        /// Require a password change at next login
        #[arg(long)]
        require_change: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ToolArg {
    Annotation,
    SessionViewer,
    All,
}

impl ToolArg {
    fn tools(self) -> Vec<Tool> {
        match self {
            ToolArg::Annotation => vec![Tool::Annotation],
            ToolArg::SessionViewer => vec![Tool::SessionViewer],
            ToolArg::All => Tool::ALL.to_vec(),
        }
    }
}

#[derive(Subcommand)]
enum ToolCommands {
    /// Give a user access to a tool
    Assign {
        #[arg(long)]
        user: String,

        #[arg(long, value_enum)]
        tool: ToolArg,
    },

    /// Show tool groups and their members
    ListGroups,

    /// Give every superuser membership of every tool group
    SuperuserAll,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List active sessions
    List,

    /// Delete expired sessions
    ClearExpired,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on command type
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    match cli.command {
        Commands::Serve { listen } => {
            // For daemon mode: log to both stdout and file with rotation
            init_daemon_logging(&cli.data_dir, filter)?;
            serve(&cli.config, &cli.data_dir, listen).await
        }
        Commands::User { command } => {
            init_cli_logging(filter);
            handle_user_command(command, &cli.data_dir, &cli.config).await
        }
        Commands::Tools { command } => {
            init_cli_logging(filter);
            handle_tool_command(command, &cli.data_dir, &cli.config).await
        }
        Commands::Sessions { command } => {
            init_cli_logging(filter);
            handle_session_command(command, &cli.data_dir, &cli.config).await
        }
        Commands::InitConfig { output } => {
            init_cli_logging(filter);
            generate_config(output)
        }
    }
}

/// Initialize logging for CLI commands (stdout only).
fn init_cli_logging(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Initialize logging for daemon mode (stdout + rotating file).
fn init_daemon_logging(data_dir: &Path, filter: EnvFilter) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    // Daily rotating file, e.g. admin-tools.2026-01-15.log
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("admin-tools")
        .filename_suffix("log")
        .build(&log_dir)
        .with_context(|| "Failed to create log file appender")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer must outlive every log call
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false)) // stdout
        .with(fmt::layer().with_target(true).with_ansi(false).with_writer(non_blocking)) // file
        .init();

    info!("Logging to: {}", log_dir.display());
    Ok(())
}

/// Ensure data directory exists
fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        info!("Created data directory: {}", data_dir.display());
    }
    Ok(())
}

/// Open the database, creating the data directory and running migrations.
async fn open_database(config: &Config, data_dir: &Path) -> Result<Database> {
    ensure_data_dir(data_dir)?;
    Database::new(&config.database, data_dir).await
}

/// Run the web server
async fn serve(config_path: &Path, data_dir: &Path, listen_override: Option<SocketAddr>) -> Result<()> {
    let config = Config::load(config_path)?.validated()?;

    let listen_addr: SocketAddr = match listen_override {
        Some(addr) => addr,
        None => config
            .server
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address in config: {}", config.server.listen_addr))?,
    };

    if config.debug {
        warn!("Debug mode is enabled; do not use in production");
    }
    if config.allowed_hosts.is_empty() && !config.debug {
        warn!("allowed_hosts is empty; every request will be rejected with 400");
    }

    let db = open_database(&config, data_dir).await?;
    let state = AppState::new(config, db.pool())?;

    info!("Admin tools starting...");
    info!("Listening on: http://{}", listen_addr);

    run_server(listen_addr, state).await
}

/// Handle user subcommands
async fn handle_user_command(command: UserCommands, data_dir: &Path, config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = open_database(&config, data_dir).await?;
    let users = UserStore::new(db.pool());

    match command {
        UserCommands::Create {
            username,
            password,
            email,
            staff,
            superuser,
            no_password_change,
        } => {
            let new_user = NewUser {
                email: &email,
                is_staff: staff || superuser,
                is_superuser: superuser,
                must_change_password: !no_password_change,
                ..NewUser::new(&username, &password)
            };
            let user = users.create_user(&new_user).await?;

            println!("Created user: {} (id {})", user.username, user.id);
            if user.is_superuser {
                println!("  Superuser: yes");
            } else if user.is_staff {
                println!("  Staff: yes");
            }
            if user.must_change_password {
                println!("  Must change password at first login");
            }
        }
        UserCommands::List => {
            let all = users.list_users().await?;
            if all.is_empty() {
                println!("No users.");
                return Ok(());
            }

            println!(
                "{:<20} {:<30} {:<6} {:<6} {:<12} {:<20}",
                "USERNAME", "EMAIL", "STAFF", "SUPER", "MUST CHANGE", "LAST LOGIN"
            );
            println!("{}", "-".repeat(99));
            for user in all {
                let last_login = user
                    .last_login
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                let name = if user.is_active {
                    user.username.clone()
                } else {
                    format!("{} (inactive)", user.username)
                };
                println!(
                    "{:<20} {:<30} {:<6} {:<6} {:<12} {:<20}",
                    name,
                    user.email,
                    yes_no(user.is_staff),
                    yes_no(user.is_superuser),
                    yes_no(user.must_change_password),
                    last_login
                );
            }
        }
        UserCommands::SetPassword {
            username,
            password,
            require_change,
        } => {
            let Some(user) = users.get_user_by_username(&username).await? else {
                bail!("User not found: {username}");
            };
            users.set_password(user.id, &password, require_change).await?;

            println!("Password updated for {username}");
            if require_change {
                println!("  Must change password at next login");
            }
        }
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Handle tool permission subcommands
async fn handle_tool_command(command: ToolCommands, data_dir: &Path, config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = open_database(&config, data_dir).await?;
    let users = UserStore::new(db.pool());

    match command {
        ToolCommands::Assign { user, tool } => {
            let Some(account) = users.get_user_by_username(&user).await? else {
                bail!("User not found: {user}");
            };

            for tool in tool.tools() {
                if assign_user_to_tool(&users, &account, tool).await? {
                    println!("Added {} to {} ({})", account.username, tool.group_name(), tool.title());
                } else {
                    println!(
                        "Group {} does not exist; skipped {}",
                        tool.group_name(),
                        tool.title()
                    );
                }
            }
        }
        ToolCommands::ListGroups => {
            let superusers = users.list_superusers().await?;

            for tool in Tool::ALL {
                users.ensure_group(tool.group_name()).await?;
                let members = users.group_members(tool.group_name()).await?;

                println!("{} ({}): {} member(s)", tool.group_name(), tool.title(), members.len());
                for member in &members {
                    let marker = if member.is_superuser { " [superuser]" } else { "" };
                    println!("  - {}{}", member.username, marker);
                }
            }

            if !superusers.is_empty() {
                println!();
                println!("Superusers (access to every tool):");
                for user in &superusers {
                    let tools: Vec<&str> = Tool::ALL
                        .into_iter()
                        .filter(|&t| user_has_tool_permission(user, t))
                        .map(Tool::title)
                        .collect();
                    println!("  - {} ({})", user.username, tools.join(", "));
                }
            }
        }
        ToolCommands::SuperuserAll => {
            let superusers = users.list_superusers().await?;
            if superusers.is_empty() {
                println!("No superusers found.");
                return Ok(());
            }

            for user in &superusers {
                for tool in Tool::ALL {
                    users.ensure_group(tool.group_name()).await?;
                    assign_user_to_tool(&users, user, tool).await?;
                }
                println!("Added {} to all tool groups", user.username);
            }
        }
    }

    Ok(())
}

/// Handle session subcommands
async fn handle_session_command(
    command: SessionCommands,
    data_dir: &Path,
    config_path: &Path,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = open_database(&config, data_dir).await?;
    let sessions = SessionStore::new(db.pool());

    match command {
        SessionCommands::List => {
            let users = UserStore::new(db.pool());
            let config = config.validated()?;
            let codec = SessionCodec::new(&config.secret_key).context("Invalid secret key")?;
            let listed = list_active_sessions(&sessions, &users, &codec, None).await?;

            if listed.is_empty() {
                println!("No active sessions.");
                return Ok(());
            }

            println!("{:<24} {:<24} {:<20} KEYS", "SESSION", "USER", "EXPIRES");
            println!("{}", "-".repeat(90));
            for session in &listed {
                let user = session
                    .user
                    .as_ref()
                    .map(|u| u.username.clone())
                    .unwrap_or_else(|| "(anonymous)".to_string());
                println!(
                    "{:<24} {:<24} {:<20} {}",
                    session.session_key,
                    user,
                    session.expire_date.format("%Y-%m-%d %H:%M"),
                    session.data_keys.join(",")
                );
            }
            println!();
            println!("{} active session(s)", listed.len());
        }
        SessionCommands::ClearExpired => {
            let removed = sessions.clear_expired().await?;
            println!("Deleted {removed} expired session(s)");
        }
    }

    Ok(())
}

/// Generate default config file
fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let content = config::default_config_template();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write config: {}", path.display()))?;
            println!("Configuration written to: {}", path.display());
        }
        None => {
            print!("{content}");
        }
    }

    Ok(())
}
