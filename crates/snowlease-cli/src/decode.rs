use core::time::Duration;
use std::io::Write;

use serde::Serialize;
use snowlease::{Components, LeaseSnowflakeId, SnowflakeId};

use crate::config::DecodeArgs;

/// One decoded (or freshly emitted) ID as printed on stdout.
#[derive(Debug, Serialize)]
pub struct IdRecord {
    pub id: u64,
    #[serde(flatten)]
    pub components: Components,
    pub unix_millis: u64,
}

impl IdRecord {
    pub fn new(id: LeaseSnowflakeId, epoch: Duration) -> Self {
        Self {
            id: id.to_raw(),
            components: id.components(),
            unix_millis: id.unix_millis(epoch),
        }
    }
}

pub fn run(args: &DecodeArgs) -> anyhow::Result<()> {
    let epoch = Duration::from_millis(args.epoch_millis);
    let mut stdout = std::io::stdout().lock();

    for &raw in &args.ids {
        let id = LeaseSnowflakeId::from_raw(raw);
        serde_json::to_writer(&mut stdout, &IdRecord::new(id, epoch))?;
        writeln!(stdout)?;
        if args.layout {
            eprintln!("{id:?}");
        }
    }
    Ok(())
}
