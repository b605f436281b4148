//! # readlater CLI
//!
//! Administrative front end for the readlater backend. Every command reads
//! the environment configuration first, so a missing required variable
//! stops the process before anything else happens.
//!
//! ## Usage
//!
//! ```bash
//! readlater [--env-file ./env.toml] [--verbose] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `readlater init` | Create the SQLite database and run schema migrations |
//! | `readlater serve` | Start the HTTP server |
//! | `readlater env check` | Validate the environment and print a summary |
//! | `readlater rule create\|delete\|clear\|list` | Manage a user's rules |
//! | `readlater token add\|list\|remove\|clear` | Manage a user's device tokens |
//! | `readlater link save\|list\|archive\|unarchive` | Manage a user's library |
//!
//! `--user` takes a username; the user is created on first use.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use readlater::analytics::LogAnalytics;
use readlater::config::Config;
use readlater::context::AppContext;
use readlater::device_tokens::{self, DeviceTokenCriteria, DeviceTokenFilter};
use readlater::library_items;
use readlater::models::{Folder, NewRule, RuleAction, RuleActionType};
use readlater::resolvers::{self, ArchiveLinkInput, Claims};
use readlater::{db, migrate, rules, server, users};

/// readlater: read-it-later backend services.
#[derive(Parser)]
#[command(name = "readlater", version, about)]
struct Cli {
    /// TOML file whose `[env]` table supplies defaults for environment
    /// variables. The process environment wins.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP server on `SERVER_BIND`.
    Serve,

    /// Environment configuration.
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Manage rules.
    Rule {
        #[command(subcommand)]
        action: RuleCommand,
    },

    /// Manage device tokens.
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },

    /// Manage library links.
    Link {
        #[command(subcommand)]
        action: LinkCommand,
    },
}

#[derive(Subcommand)]
enum EnvAction {
    /// Load the configuration and report what was resolved.
    Check,
}

#[derive(Subcommand)]
enum RuleCommand {
    /// Create a rule, or return the existing rule with the same name.
    Create {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        filter: String,
        #[arg(long)]
        description: Option<String>,
        /// Action as `TYPE` or `TYPE=param,param`, e.g. `ADD_LABEL=news`.
        #[arg(long = "action", value_parser = parse_rule_action)]
        actions: Vec<RuleAction>,
    },
    /// Delete one rule by id.
    Delete {
        #[arg(long)]
        user: String,
        id: String,
    },
    /// Delete all of a user's rules.
    Clear {
        #[arg(long)]
        user: String,
    },
    List {
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    Add {
        #[arg(long)]
        user: String,
        token: String,
    },
    List {
        #[arg(long)]
        user: String,
    },
    /// Remove one token by id.
    Remove {
        #[arg(long)]
        user: String,
        id: String,
    },
    /// Remove all of a user's tokens, or only those equal to `--token`.
    Clear {
        #[arg(long)]
        user: String,
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Subcommand)]
enum LinkCommand {
    /// Save a url to the inbox.
    Save {
        #[arg(long)]
        user: String,
        url: String,
        #[arg(long)]
        title: Option<String>,
    },
    List {
        #[arg(long)]
        user: String,
        /// inbox, archive or following.
        #[arg(long)]
        folder: Option<Folder>,
    },
    Archive {
        #[arg(long)]
        user: String,
        id: String,
    },
    Unarchive {
        #[arg(long)]
        user: String,
        id: String,
    },
}

/// Parse `TYPE` or `TYPE=a,b` for `--action`.
fn parse_rule_action(s: &str) -> Result<RuleAction, String> {
    let (kind, params) = match s.split_once('=') {
        Some((kind, params)) => (kind, params),
        None => (s, ""),
    };
    let action_type: RuleActionType =
        serde_json::from_value(serde_json::Value::String(kind.trim().to_uppercase()))
            .map_err(|_| format!("unknown rule action type: '{}'", kind))?;
    let params = params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    Ok(RuleAction {
        action_type,
        params,
    })
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn user_id(ctx: &AppContext, username: &str) -> anyhow::Result<String> {
    let user = users::ensure_user(&ctx.pool, username, username)
        .await
        .with_context(|| format!("resolving user '{}'", username))?;
    Ok(user.id)
}

async fn run_rule(ctx: &AppContext, command: RuleCommand) -> anyhow::Result<()> {
    match command {
        RuleCommand::Create {
            user,
            name,
            filter,
            description,
            actions,
        } => {
            let uid = user_id(ctx, &user).await?;
            let rule = rules::create_rule(
                ctx,
                &uid,
                NewRule {
                    name,
                    description,
                    actions,
                    filter,
                },
            )
            .await?;
            print_json(&rule)?;
        }
        RuleCommand::Delete { user, id } => {
            let uid = user_id(ctx, &user).await?;
            let rule = rules::delete_rule(ctx, &id, &uid).await?;
            println!("Deleted rule '{}' ({})", rule.name, rule.id);
        }
        RuleCommand::Clear { user } => {
            let uid = user_id(ctx, &user).await?;
            let result = rules::delete_rules(ctx, &uid).await?;
            println!("Deleted {} rule(s)", result.affected);
        }
        RuleCommand::List { user } => {
            let uid = user_id(ctx, &user).await?;
            print_json(&rules::find_rules(ctx, &uid).await?)?;
        }
    }
    Ok(())
}

async fn run_token(ctx: &AppContext, command: TokenCommand) -> anyhow::Result<()> {
    match command {
        TokenCommand::Add { user, token } => {
            let uid = user_id(ctx, &user).await?;
            print_json(&device_tokens::create_device_token(ctx, &uid, &token).await?)?;
        }
        TokenCommand::List { user } => {
            let uid = user_id(ctx, &user).await?;
            print_json(&device_tokens::find_device_tokens_by_user_id(ctx, &uid).await?)?;
        }
        TokenCommand::Remove { user, id } => {
            let uid = user_id(ctx, &user).await?;
            if !device_tokens::delete_device_token(ctx, &id, &uid).await? {
                bail!("no device token {} for user '{}'", id, user);
            }
            println!("Removed device token {}", id);
        }
        TokenCommand::Clear { user, token } => {
            let uid = user_id(ctx, &user).await?;
            device_tokens::delete_device_tokens(
                ctx,
                &uid,
                DeviceTokenCriteria::Filter(DeviceTokenFilter { token }),
            )
            .await?;
            println!("Device tokens cleared");
        }
    }
    Ok(())
}

async fn run_link(ctx: &AppContext, command: LinkCommand) -> anyhow::Result<()> {
    let (user, id, archived) = match command {
        LinkCommand::Save { user, url, title } => {
            let uid = user_id(ctx, &user).await?;
            let title = title.unwrap_or_else(|| url.clone());
            print_json(&library_items::create_library_item(ctx, &uid, &url, &title).await?)?;
            return Ok(());
        }
        LinkCommand::List { user, folder } => {
            let uid = user_id(ctx, &user).await?;
            print_json(&library_items::find_library_items(ctx, &uid, folder).await?)?;
            return Ok(());
        }
        LinkCommand::Archive { user, id } => (user, id, true),
        LinkCommand::Unarchive { user, id } => (user, id, false),
    };

    let claims = Claims::new(user_id(ctx, &user).await?);
    match resolvers::set_link_archived(
        ctx,
        Some(&claims),
        ArchiveLinkInput {
            link_id: id,
            archived,
        },
    )
    .await
    {
        Ok(success) => print_json(&success),
        Err(error) => {
            print_json(&error)?;
            bail!("{}", error.message)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.env_file.as_deref()).context("loading configuration")?;

    if let Commands::Env {
        action: EnvAction::Check,
    } = cli.command
    {
        println!("Configuration OK");
        println!("  API_ENV:     {}", config.server.api_env);
        println!("  instance:    {}", config.server.instance_id);
        println!("  database:    {}", config.pg.db_name);
        println!("  pool max:    {}", config.pg.pool.max);
        println!("  bind:        {}", config.server.bind);
        println!("  local dev:   {}", config.dev.is_local);
        return Ok(());
    }

    let pool = db::connect(&config.pg)
        .await
        .with_context(|| format!("opening database {}", config.pg.db_name))?;
    let ctx = AppContext::new(pool, Arc::new(config), Arc::new(LogAnalytics));

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&ctx.pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            migrate::run_migrations(&ctx.pool).await?;
            server::run_server(ctx).await?;
        }
        Commands::Rule { action } => run_rule(&ctx, action).await?,
        Commands::Token { action } => run_token(&ctx, action).await?,
        Commands::Link { action } => run_link(&ctx, action).await?,
        Commands::Env { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rule_actions() {
        let action = parse_rule_action("add_label=news, weekly").unwrap();
        assert_eq!(action.action_type, RuleActionType::AddLabel);
        assert_eq!(action.params, vec!["news", "weekly"]);

        let action = parse_rule_action("ARCHIVE").unwrap();
        assert_eq!(action.action_type, RuleActionType::Archive);
        assert!(action.params.is_empty());

        assert!(parse_rule_action("EXPLODE").is_err());
    }

    #[test]
    fn cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "readlater",
            "--env-file",
            "env.toml",
            "rule",
            "create",
            "--user",
            "ada",
            "--name",
            "News",
            "--filter",
            "from:news",
            "--action",
            "MARK_AS_READ",
        ])
        .unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("env.toml")));
        match cli.command {
            Commands::Rule {
                action: RuleCommand::Create { name, actions, .. },
            } => {
                assert_eq!(name, "News");
                assert_eq!(actions.len(), 1);
            }
            _ => panic!("wrong command"),
        }
    }
}
