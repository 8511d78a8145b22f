use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{Role, Turn};

/// Append turns for a session, then drop everything older than the newest `keep`.
pub fn append_chat_turns(
    conn: &mut Connection,
    session_id: &str,
    turns: &[Turn],
    keep: usize,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO chat_turns (session_id, role, content) VALUES (?1, ?2, ?3)")?;
        for turn in turns {
            stmt.execute(params![session_id, turn.role.as_str(), turn.content])?;
        }
    }
    tx.execute(
        "DELETE FROM chat_turns WHERE session_id = ?1 AND id NOT IN (
             SELECT id FROM chat_turns WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2
         )",
        params![session_id, keep as i64],
    )?;
    tx.commit()?;
    Ok(())
}

/// Stored turns for a session, oldest first.
pub fn load_chat_turns(conn: &Connection, session_id: &str) -> Result<Vec<Turn>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT role, content FROM chat_turns WHERE session_id = ?1 ORDER BY id",
    )?;
    let raw = stmt
        .query_map(params![session_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(role, content)| {
            Ok(Turn {
                role: role.parse::<Role>()?,
                content,
            })
        })
        .collect()
}

pub fn delete_chat_turns(conn: &Connection, session_id: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM chat_turns WHERE session_id = ?1",
        params![session_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn append_trims_to_newest() {
        let mut conn = open_memory_database().unwrap();
        for i in 0..6 {
            append_chat_turns(&mut conn, "s1", &[Turn::user(format!("m{i}"))], 4).unwrap();
        }
        let turns = load_chat_turns(&conn, "s1").unwrap();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].content, "m2");
        assert_eq!(turns[3].content, "m5");
    }

    #[test]
    fn sessions_are_isolated() {
        let mut conn = open_memory_database().unwrap();
        append_chat_turns(&mut conn, "a", &[Turn::user("hi")], 20).unwrap();
        append_chat_turns(&mut conn, "b", &[Turn::assistant("yo")], 20).unwrap();

        assert_eq!(delete_chat_turns(&conn, "a").unwrap(), 1);
        assert!(load_chat_turns(&conn, "a").unwrap().is_empty());
        assert_eq!(load_chat_turns(&conn, "b").unwrap()[0].role, Role::Assistant);
    }
}
