use rusqlite::Connection;

use crate::database::{create_tables, ensure_parent_dir};
use crate::error::Result;

pub fn conn(database_url: &str) -> Result<Connection> {
    ensure_parent_dir(database_url)?;
    let conn = Connection::open(database_url)?;

    create_tables(&conn)?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::get_prediction_history;

    #[test]
    fn opens_in_memory_and_creates_tables() {
        let conn = conn(":memory:").unwrap();
        assert!(get_prediction_history(&conn).unwrap().is_empty());
    }
}
