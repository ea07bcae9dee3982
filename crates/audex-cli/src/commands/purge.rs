//! Entity type purge command

use audex_core::LogEntryStore;
use clap::Args;

#[derive(Debug, Args)]
pub struct PurgeTypeArgs {
    #[arg(long = "type")]
    pub entity_type: String,

    #[arg(long, default_value = ".audex/audit.db")]
    pub db: String,
}

pub fn execute(args: PurgeTypeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = super::open_store(&args.db)?;
    let deleted = store.delete_for_entity_type(&args.entity_type)?;
    println!("Deleted {} entries for {}", deleted, args.entity_type);
    Ok(())
}
