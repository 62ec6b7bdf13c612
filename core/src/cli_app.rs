use crate::aggregator::total_unread;
use crate::backend::ChatBackend;
use crate::chat_session::{ChatSession, SendOutcome};
use crate::config::Config;
use crate::conversations::start_conversation;
use crate::inbox::Inbox;
use crate::local_backend::LocalBackend;
use crate::models::{BusinessProfile, CourierProfile, Role, UserSession};
use crate::timeline::{format_day, format_list_timestamp, TimelineItem};
use anyhow::Context;
use colored::*;
use std::sync::Arc;
use uuid::Uuid;

/// CLI over the local chat store.
pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let bin = args
        .first()
        .map(|s| s.as_str())
        .unwrap_or("kuryelink")
        .to_string();

    let (config, rest) = Config::from_args(args.get(1..).unwrap_or_default())?;
    let Some(command) = rest.first() else {
        print_usage(&bin);
        return Ok(());
    };
    let params = &rest[1..];

    match command.as_str() {
        "new-id" => {
            println!("{}", Uuid::new_v4());
        }
        "business" => {
            if params.len() < 2 {
                usage_hint(&bin, "business <user_id> <business name>");
                return Ok(());
            }
            let backend = open_backend(&config)?;
            let profile = BusinessProfile {
                user_id: parse_id(&params[0])?,
                business_name: params[1..].join(" "),
                logo_url: None,
            };
            backend.upsert_business(profile).await?;
            backend.flush().await?;
            println!("{} Business profile saved", "✓".green().bold());
        }
        "courier" => {
            if params.len() < 2 {
                usage_hint(&bin, "courier <user_id> <first name> [last name]");
                return Ok(());
            }
            let backend = open_backend(&config)?;
            let profile = CourierProfile {
                user_id: parse_id(&params[0])?,
                first_name: params[1].clone(),
                last_name: params.get(2..).filter(|p| !p.is_empty()).map(|p| p.join(" ")),
                avatar_url: None,
            };
            backend.upsert_courier(profile).await?;
            backend.flush().await?;
            println!("{} Courier profile saved", "✓".green().bold());
        }
        "start" => {
            if params.len() < 3 {
                usage_hint(&bin, "start <user_id> <role> <counterpart_id>");
                return Ok(());
            }
            let session = parse_session(&params[0], &params[1])?;
            let backend = open_backend(&config)?;
            let conversation = start_conversation(&backend, &session, parse_id(&params[2])?).await?;
            backend.flush().await?;
            println!(
                "{} Conversation {}",
                "✓".green().bold(),
                conversation.id.to_string().cyan()
            );
        }
        "list" => {
            if params.len() < 2 {
                usage_hint(&bin, "list <user_id> <role>");
                return Ok(());
            }
            let session = parse_session(&params[0], &params[1])?;
            list_conversations(&config, session).await?;
        }
        "open" => {
            if params.len() < 3 {
                usage_hint(&bin, "open <user_id> <role> <conversation_id>");
                return Ok(());
            }
            let session = parse_session(&params[0], &params[1])?;
            show_conversation(&config, session, parse_id(&params[2])?).await?;
        }
        "send" => {
            if params.len() < 4 {
                usage_hint(&bin, "send <user_id> <role> <conversation_id> <message>");
                return Ok(());
            }
            let session = parse_session(&params[0], &params[1])?;
            let backend = Arc::new(open_backend(&config)?);
            let chat = ChatSession::open(backend.clone(), session, parse_id(&params[2])?).await?;
            let outcome = chat.send_text(&params[3..].join(" ")).await;
            backend.flush().await?;
            match outcome {
                Ok(SendOutcome::Sent(message)) => println!(
                    "{} Message sent! ID: {}",
                    "✓".green().bold(),
                    message.id.to_string().cyan()
                ),
                Ok(SendOutcome::Closed) => {
                    println!("{}", "Conversation was removed from your list".yellow())
                }
                Ok(_) => println!("{}", "Nothing to send".yellow()),
                Err(e) => {
                    let shown = chat.last_error().unwrap_or_else(|| e.to_string());
                    eprintln!("{} {}", "✗".red().bold(), shown.red());
                }
            }
        }
        "delete" => {
            if params.len() < 3 {
                usage_hint(&bin, "delete <user_id> <role> <conversation_id>");
                return Ok(());
            }
            let session = parse_session(&params[0], &params[1])?;
            let backend = Arc::new(open_backend(&config)?);
            let inbox = Inbox::open(backend.clone(), session, &config).await;
            match inbox.delete(parse_id(&params[2])?).await {
                Ok(()) => println!("{} Conversation removed from your list", "✓".green().bold()),
                Err(e) => eprintln!(
                    "{} {} ({})",
                    "✗".red().bold(),
                    inbox.last_error().unwrap_or_default().red(),
                    e
                ),
            }
            backend.flush().await?;
        }
        _ => {
            eprintln!("{} Unknown command: {}", "✗".red().bold(), command.red());
            print_usage(&bin);
        }
    }

    Ok(())
}

fn open_backend(config: &Config) -> anyhow::Result<LocalBackend> {
    LocalBackend::from_config(config)
        .with_context(|| format!("open chat store in {}", config.data_dir.display()))
}

fn parse_id(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid id: {}", raw))
}

fn parse_session(user_id: &str, role: &str) -> anyhow::Result<UserSession> {
    Ok(UserSession::new(parse_id(user_id)?, role.parse::<Role>()?))
}

fn usage_hint(bin: &str, usage: &str) {
    eprintln!("{}", format!("Usage: {} {}", bin, usage).yellow());
}

async fn list_conversations(config: &Config, session: UserSession) -> anyhow::Result<()> {
    let backend = Arc::new(open_backend(config)?);
    let inbox = Inbox::open(backend, session, config).await;
    if let Some(error) = inbox.last_error() {
        eprintln!("{} {}", "✗".red().bold(), error.red());
        return Ok(());
    }

    let summaries = inbox.summaries();
    if summaries.is_empty() {
        println!("{}", "No conversations yet".yellow());
        return Ok(());
    }

    let tz = config.timezone();
    let now = chrono::Utc::now();
    println!(
        "{}",
        format!(
            "Conversations ({}, {} unread)",
            summaries.len(),
            total_unread(&summaries)
        )
        .bright_cyan()
        .bold()
    );
    println!("{}", "─".repeat(60).dimmed());
    for s in &summaries {
        let unread = if s.unread_count > 0 {
            format!(" [{}]", s.unread_count).green().bold().to_string()
        } else {
            String::new()
        };
        let preview = if s.is_own_last {
            format!("Siz: {}", s.preview)
        } else {
            s.preview.clone()
        };
        println!(
            "  {} {} ({}){}  {}",
            format_list_timestamp(s.last_activity, now, &tz).dimmed(),
            s.counterpart.masked_name.cyan(),
            s.counterpart.role_label,
            unread,
            s.conversation_id.to_string().dimmed()
        );
        println!("      {}", preview);
    }
    inbox.close().await;
    Ok(())
}

async fn show_conversation(
    config: &Config,
    session: UserSession,
    conversation_id: Uuid,
) -> anyhow::Result<()> {
    let backend = Arc::new(open_backend(config)?);
    let chat = match ChatSession::open(backend.clone(), session, conversation_id).await {
        Ok(chat) => chat,
        Err(e) => {
            eprintln!("{} Conversation not found ({})", "✗".red().bold(), e);
            return Ok(());
        }
    };
    backend.flush().await?;

    let tz = config.timezone();
    let counterpart = chat.counterpart();
    println!(
        "{}",
        format!("{} · {}", counterpart.masked_name, counterpart.role_label)
            .bright_cyan()
            .bold()
    );
    for item in chat.timeline(&tz) {
        match item {
            TimelineItem::DaySeparator(day) => {
                println!("{}", format!("── {} ──", format_day(day)).dimmed());
            }
            TimelineItem::Message {
                message,
                is_own,
                continues_group,
            } => {
                let time = message.created_at.with_timezone(&tz).format("%H:%M").to_string();
                let who = if continues_group {
                    "   ".to_string()
                } else if is_own {
                    "Siz".green().to_string()
                } else {
                    counterpart.masked_name.cyan().to_string()
                };
                let tick = if is_own && message.is_read { " ✓✓" } else { "" };
                println!("  {} {}: {}{}", time.dimmed(), who, message.content, tick);
            }
        }
    }
    chat.close().await;
    Ok(())
}

fn print_usage(bin: &str) {
    println!("{}", "KuryeLink chat CLI".bright_cyan().bold());
    println!();
    println!("{}", "Usage:".bright_white().bold());
    println!("  {} [--data-dir <path>] [--utc-offset <minutes>] <command> [args]", bin.cyan());
    println!();
    println!("{}", "Commands:".bright_white().bold());
    println!("  {}                                    Print a fresh user id", "new-id".cyan());
    println!("  {} <user_id> <name>                 Save a business profile", "business".cyan());
    println!("  {} <user_id> <first> [last]          Save a courier profile", "courier".cyan());
    println!("  {} <user_id> <role> <counterpart_id>   Start or reopen a conversation", "start".cyan());
    println!("  {} <user_id> <role>                     List conversations", "list".cyan());
    println!("  {} <user_id> <role> <conversation_id>   Show a conversation and mark it read", "open".cyan());
    println!("  {} <user_id> <role> <conversation_id> <message>", "send".cyan());
    println!("  {} <user_id> <role> <conversation_id> Hide a conversation from your list", "delete".cyan());
}
