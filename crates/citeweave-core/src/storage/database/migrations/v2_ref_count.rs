use rusqlite::Connection;

use super::Migration;
use crate::error::Result;

pub struct V2RefCount;

impl Migration for V2RefCount {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Add ref_count column to publications table"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        let has_ref_count: bool = conn
            .prepare("SELECT 1 FROM pragma_table_info('publications') WHERE name='ref_count'")?
            .exists([])?;

        if !has_ref_count {
            conn.execute_batch(
                "
                ALTER TABLE publications ADD COLUMN ref_count INTEGER;
                CREATE INDEX IF NOT EXISTS idx_publications_ref_count ON publications(ref_count);
                ",
            )?;
        }
        Ok(())
    }
}
