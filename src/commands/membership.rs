use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{MembershipArgs, resolve_db_path};
use crate::commands::clean::{MembershipParser, TargetField, raw_field};
use crate::store::{RawStore, open_database};

pub fn run(args: MembershipArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.data_root, args.db_path.as_ref());
    let connection = open_database(&db_path)?;
    let raw_store = RawStore::open(&connection)?;

    let record = raw_store
        .load_record(&connection, args.org_id)?
        .with_context(|| format!("organization {} has no raw record", args.org_id))?;

    let members = raw_field(&record, TargetField::Members);
    if members.is_none() {
        warn!(org_id = args.org_id, "raw record has no members section");
    }

    let lines = MembershipParser::new()?.parse(members);
    info!(org_id = args.org_id, lines = lines.len(), "parsed membership list");

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &lines)
        .context("failed to serialize membership json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
