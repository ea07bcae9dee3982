//! History command

use audex_core::model::{EntityRef, LogEntry};
use audex_core::{AuditSettings, GroupedHistory, LogEntryStore};
use clap::Args;

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Entity type the history is displayed under
    #[arg(long = "type")]
    pub entity_type: String,

    #[arg(long)]
    pub id: i64,

    /// One JSON object per entry instead of text
    #[arg(long)]
    pub json: bool,

    #[arg(long, default_value = ".audex/audit.db")]
    pub db: String,
}

pub fn execute(args: HistoryArgs, settings: &AuditSettings) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(&args.db)?;
    let anchor = EntityRef::new(args.entity_type, args.id);
    let history = GroupedHistory::new(store.entries_for_anchor(&anchor)?);

    if history.is_empty() {
        if !args.json {
            println!("No history for {}", anchor);
        }
        return Ok(());
    }

    for group in history.iter() {
        if args.json {
            for entry in group {
                println!("{}", entry_json(entry)?);
            }
            continue;
        }

        match group.first().and_then(|entry| entry.group_key()) {
            Some(request_id) => println!("request {}:", request_id),
            None => println!("(no request):"),
        }
        for entry in group {
            print_entry(entry, settings)?;
        }
    }

    Ok(())
}

fn print_entry(entry: &LogEntry, settings: &AuditSettings) -> Result<(), Box<dyn std::error::Error>> {
    let actor = entry
        .actor
        .map(|actor| actor.get().to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  #{} {} {} {} by {}",
        entry.id.unwrap_or_default(),
        settings.localize_datetime(&entry.created_at),
        entry.action,
        entry.target,
        actor
    );
    for (field, actions) in &entry.changes {
        for (kind, items) in actions {
            println!(
                "    {} {}: {}",
                field,
                kind.as_str(),
                serde_json::to_string(items)?
            );
        }
    }
    Ok(())
}

fn entry_json(entry: &LogEntry) -> Result<String, Box<dyn std::error::Error>> {
    let changes: serde_json::Value = serde_json::from_str(&entry.changes_json()?)?;
    let value = serde_json::json!({
        "id": entry.id,
        "target": entry.target,
        "anchor": entry.anchor,
        "created_at": entry.created_at,
        "actor": entry.actor.map(|actor| actor.get()),
        "action": entry.action.as_str(),
        "request_id": entry.request_id,
        "changes": changes,
    });
    Ok(value.to_string())
}
