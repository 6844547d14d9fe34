use tokio_rusqlite::{params, Connection, OptionalExtension, Result};

use crate::model::UserContext;

pub async fn init_db(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path).await?;
    create_schema(&conn).await?;
    Ok(conn)
}

pub async fn init_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory().await?;
    create_schema(&conn).await?;
    Ok(conn)
}

async fn create_schema(conn: &Connection) -> Result<()> {
    conn.call(|conn| {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS profiles (
                username TEXT PRIMARY KEY,
                preferred_language TEXT NOT NULL DEFAULT 'en',
                preferred_country TEXT NOT NULL DEFAULT 'us'
                )",
            [],
        )?;
        Ok(())
    })
    .await
}

pub async fn find_profile(conn: &Connection, username: &str) -> Result<Option<UserContext>> {
    let username = username.to_string();
    conn.call(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT preferred_language, preferred_country FROM profiles WHERE username = ?",
        )?;
        let profile = stmt
            .query_row(params![username], |row| {
                Ok(UserContext {
                    language: row.get(0)?,
                    country: row.get(1)?,
                })
            })
            .optional()?;
        Ok(profile)
    })
    .await
}

pub async fn save_profile(conn: &Connection, username: &str, profile: &UserContext) -> Result<()> {
    let username = username.to_string();
    let profile = profile.clone();
    conn.call(move |conn| {
        conn.execute(
            "INSERT INTO profiles (username, preferred_language, preferred_country)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(username) DO UPDATE SET
                preferred_language = excluded.preferred_language,
                preferred_country = excluded.preferred_country",
            params![username, profile.language, profile.country],
        )?;
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_and_updates_profiles() {
        let conn = init_memory_db().await.unwrap();
        assert_eq!(find_profile(&conn, "alice").await.unwrap(), None);

        let de = UserContext {
            language: "de".into(),
            country: "at".into(),
        };
        save_profile(&conn, "alice", &de).await.unwrap();
        assert_eq!(find_profile(&conn, "alice").await.unwrap(), Some(de));

        let fr = UserContext {
            language: "fr".into(),
            country: "fr".into(),
        };
        save_profile(&conn, "alice", &fr).await.unwrap();
        assert_eq!(find_profile(&conn, "alice").await.unwrap(), Some(fr));
        assert_eq!(find_profile(&conn, "bob").await.unwrap(), None);
    }
}
