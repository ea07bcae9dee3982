//! Actor maintenance commands

use audex_core::LogEntryStore;
use audex_core_types::ActorId;
use clap::Args;

#[derive(Debug, Args)]
pub struct MergeActorArgs {
    #[arg(long)]
    pub from: i64,

    #[arg(long)]
    pub to: i64,

    #[arg(long, default_value = ".audex/audit.db")]
    pub db: String,
}

#[derive(Debug, Args)]
pub struct ForgetActorArgs {
    #[arg(long)]
    pub actor: i64,

    #[arg(long, default_value = ".audex/audit.db")]
    pub db: String,
}

pub fn execute_merge(args: MergeActorArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.from == args.to {
        return Err("--from and --to must name different actors".into());
    }
    let mut store = super::open_store(&args.db)?;
    let moved = store.reassign_actor(ActorId::new(args.from), ActorId::new(args.to))?;
    println!("Reassigned {} entries from actor {} to {}", moved, args.from, args.to);
    Ok(())
}

pub fn execute_forget(args: ForgetActorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = super::open_store(&args.db)?;
    let cleared = store.clear_actor(ActorId::new(args.actor))?;
    println!("Cleared actor {} from {} entries", args.actor, cleared);
    Ok(())
}
