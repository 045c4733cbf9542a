use crate::models::{
    AnswerValue, ConditionalRule, Poll, Question, QuestionType, StoredAnswer, ValidatedAnswer,
};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use sqlx::{
    Row, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse {column}: {value}")]
    Timestamp { column: &'static str, value: String },

    #[error("Unknown question type: {0}")]
    QuestionType(String),
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        // An in-memory database lives only as long as its single connection.
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = options.connect(db_url).await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                creator_id TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                allow_anonymous BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TEXT NOT NULL,
                expires_at TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id TEXT NOT NULL,
                poll_id TEXT NOT NULL,
                text TEXT NOT NULL,
                kind TEXT NOT NULL,
                options TEXT NOT NULL,
                sort_order INTEGER NOT NULL,
                required BOOLEAN NOT NULL DEFAULT FALSE,
                conditional_logic TEXT,
                position INTEGER NOT NULL,
                PRIMARY KEY (poll_id, id),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS answers (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                value TEXT NOT NULL,
                user_id TEXT,
                session_id TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (poll_id, question_id) REFERENCES questions(poll_id, id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Stores a poll and its questions in one transaction.
    pub async fn create_poll(&self, poll: &Poll) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO polls (id, title, description, creator_id, is_active, allow_anonymous, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(&poll.creator_id)
        .bind(poll.is_active)
        .bind(poll.allow_anonymous)
        .bind(timestamp(poll.created_at))
        .bind(poll.expires_at.map(timestamp))
        .execute(&mut *tx)
        .await?;

        for (i, question) in poll.questions.iter().enumerate() {
            let conditional_logic = question
                .condition
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(
                r#"
                INSERT INTO questions (id, poll_id, text, kind, options, sort_order, required, conditional_logic, position)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&question.id)
            .bind(&poll.id)
            .bind(&question.text)
            .bind(question.kind.as_str())
            .bind(serde_json::to_string(&question.options)?)
            .bind(question.order)
            .bind(question.required)
            .bind(conditional_logic)
            .bind(i as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Loads a poll with its questions, ordered by `order` then by position.
    pub async fn get_poll(&self, poll_id: &str) -> Result<Option<Poll>, StorageError> {
        let Some(poll_row) = sqlx::query(
            r#"
            SELECT id, title, description, creator_id, is_active, allow_anonymous, created_at, expires_at
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let questions = self.get_questions(poll_id).await?;
        poll_from_row(&poll_row, questions).map(Some)
    }

    /// Every poll with its questions, newest first.
    pub async fn list_polls(&self) -> Result<Vec<Poll>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, creator_id, is_active, allow_anonymous, created_at, expires_at
            FROM polls
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut polls = Vec::with_capacity(rows.len());
        for row in rows {
            let questions = self.get_questions(&row.get::<String, _>("id")).await?;
            polls.push(poll_from_row(&row, questions)?);
        }
        Ok(polls)
    }

    async fn get_questions(&self, poll_id: &str) -> Result<Vec<Question>, StorageError> {
        sqlx::query(
            r#"
            SELECT id, text, kind, options, sort_order, required, conditional_logic
            FROM questions
            WHERE poll_id = ?
            ORDER BY sort_order, position
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| -> Result<Question, StorageError> {
            let kind: String = row.get("kind");
            let options: String = row.get("options");
            let conditional_logic: Option<String> = row.get("conditional_logic");
            Ok(Question {
                id: row.get("id"),
                text: row.get("text"),
                kind: QuestionType::parse(&kind).ok_or(StorageError::QuestionType(kind))?,
                options: serde_json::from_str(&options)?,
                order: row.get("sort_order"),
                required: row.get("required"),
                condition: conditional_logic
                    .map(|raw| serde_json::from_str::<ConditionalRule>(&raw))
                    .transpose()?,
            })
        })
        .collect()
    }

    /// Writes the editable poll fields back. Questions are left untouched.
    pub async fn update_poll(&self, poll: &Poll) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE polls
            SET title = ?, description = ?, is_active = ?, allow_anonymous = ?, expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(poll.is_active)
        .bind(poll.allow_anonymous)
        .bind(poll.expires_at.map(timestamp))
        .bind(&poll.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes a poll. Its questions and answers go with it through the
    /// cascading foreign keys.
    pub async fn delete_poll(&self, poll_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM polls WHERE id = ?")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // End a poll (set is_active = false). Returns whether anything changed.
    pub async fn end_poll(&self, poll_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE polls
            SET is_active = FALSE
            WHERE id = ? AND is_active = TRUE
            "#,
        )
        .bind(poll_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // Active polls whose expiry has passed
    pub async fn get_expired_polls(&self, now: DateTime<Utc>) -> Result<Vec<String>, StorageError> {
        let polls = sqlx::query(
            r#"
            SELECT id
            FROM polls
            WHERE expires_at IS NOT NULL AND expires_at < ? AND is_active = TRUE
            "#,
        )
        .bind(timestamp(now))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("id"))
        .collect();
        Ok(polls)
    }

    /// Appends one submission's answers. The batch is written in a single
    /// transaction so a respondent's answers land together or not at all.
    pub async fn save_answers(
        &self,
        poll_id: &str,
        user_id: Option<&str>,
        session_id: &str,
        answers: &[ValidatedAnswer],
    ) -> Result<(), StorageError> {
        let now = timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;

        for answer in answers {
            sqlx::query(
                r#"
                INSERT INTO answers (poll_id, question_id, value, user_id, session_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(poll_id)
            .bind(&answer.question_id)
            .bind(serde_json::to_string(&answer.value)?)
            .bind(user_id)
            .bind(session_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Stored {} answer(s) for poll {}", answers.len(), poll_id);
        Ok(())
    }

    /// Full answer history of a poll in storage order.
    pub async fn get_poll_answers(&self, poll_id: &str) -> Result<Vec<StoredAnswer>, StorageError> {
        sqlx::query(
            r#"
            SELECT question_id, value, user_id, session_id, created_at
            FROM answers
            WHERE poll_id = ?
            ORDER BY seq
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| -> Result<StoredAnswer, StorageError> {
            let value: String = row.get("value");
            Ok(StoredAnswer {
                question_id: row.get("question_id"),
                value: serde_json::from_str::<AnswerValue>(&value)?,
                user_id: row.get("user_id"),
                session_id: row.get("session_id"),
                created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
            })
        })
        .collect()
    }
}

fn poll_from_row(row: &SqliteRow, questions: Vec<Question>) -> Result<Poll, StorageError> {
    let expires_at: Option<String> = row.get("expires_at");

    Ok(Poll {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        creator_id: row.get("creator_id"),
        questions,
        is_active: row.get("is_active"),
        allow_anonymous: row.get("allow_anonymous"),
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
        expires_at: expires_at
            .map(|s| parse_timestamp("expires_at", &s))
            .transpose()?,
    })
}

// Fixed-width UTC timestamps so stored values compare correctly as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::Timestamp {
            column,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionalRule, RuleOperator};
    use chrono::Duration;

    async fn memory_db() -> Database {
        Database::new("sqlite::memory:", 1).await.unwrap()
    }

    fn sample_poll() -> Poll {
        Poll {
            id: "p1".into(),
            title: "Feedback".into(),
            description: Some("Quarterly".into()),
            creator_id: "creator".into(),
            questions: vec![
                Question {
                    id: "q2".into(),
                    text: "Why?".into(),
                    kind: QuestionType::FreeText,
                    options: vec![],
                    order: 1,
                    required: true,
                    condition: Some(ConditionalRule {
                        depends_on_question_id: "q1".into(),
                        expected_answer: "Yes".into(),
                        operator: RuleOperator::NotEquals,
                    }),
                },
                Question {
                    id: "q1".into(),
                    text: "Happy?".into(),
                    kind: QuestionType::SingleChoice,
                    options: vec!["Yes".into(), "No".into()],
                    order: 0,
                    required: true,
                    condition: None,
                },
            ],
            is_active: true,
            allow_anonymous: true,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn poll_round_trips_with_questions_in_order() {
        let db = memory_db().await;
        let poll = sample_poll();
        db.create_poll(&poll).await.unwrap();

        let loaded = db.get_poll("p1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Feedback");
        assert_eq!(loaded.description.as_deref(), Some("Quarterly"));
        let ids: Vec<_> = loaded.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(loaded.questions[1].condition, poll.questions[0].condition);

        assert!(db.get_poll("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn answers_come_back_in_storage_order() {
        let db = memory_db().await;
        db.create_poll(&sample_poll()).await.unwrap();

        let first = vec![
            ValidatedAnswer { question_id: "q1".into(), value: "No".into(), session_id: None },
            ValidatedAnswer { question_id: "q2".into(), value: "Too slow".into(), session_id: None },
        ];
        db.save_answers("p1", None, "s1", &first).await.unwrap();
        let second = vec![ValidatedAnswer { question_id: "q1".into(), value: "Yes".into(), session_id: None }];
        db.save_answers("p1", Some("u1"), "s2", &second).await.unwrap();

        let stored = db.get_poll_answers("p1").await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1].value, AnswerValue::Single("Too slow".into()));
        assert_eq!(stored[1].session_id.as_deref(), Some("s1"));
        assert_eq!(stored[2].user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn failed_batch_leaves_nothing_behind() {
        let db = memory_db().await;
        db.create_poll(&sample_poll()).await.unwrap();

        // The second row violates the question foreign key.
        let batch = vec![
            ValidatedAnswer { question_id: "q1".into(), value: "No".into(), session_id: None },
            ValidatedAnswer { question_id: "nope".into(), value: "x".into(), session_id: None },
        ];
        assert!(db.save_answers("p1", None, "s1", &batch).await.is_err());
        assert!(db.get_poll_answers("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn polls_are_listed_newest_first() {
        let db = memory_db().await;
        let mut older = sample_poll();
        older.created_at = Utc::now() - Duration::hours(1);
        db.create_poll(&older).await.unwrap();

        let mut newer = sample_poll();
        newer.id = "p2".into();
        newer.title = "Follow-up".into();
        db.create_poll(&newer).await.unwrap();

        let polls = db.list_polls().await.unwrap();
        let ids: Vec<_> = polls.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
        assert_eq!(polls[1].questions.len(), 2);
    }

    #[tokio::test]
    async fn update_rewrites_poll_fields() {
        let db = memory_db().await;
        let mut poll = sample_poll();
        db.create_poll(&poll).await.unwrap();

        poll.title = "Renamed".into();
        poll.is_active = false;
        poll.expires_at = Some(Utc::now() + Duration::days(1));
        assert!(db.update_poll(&poll).await.unwrap());

        let loaded = db.get_poll("p1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert!(!loaded.is_active);
        assert!(loaded.expires_at.is_some());
        assert_eq!(loaded.questions.len(), 2);

        poll.id = "missing".into();
        assert!(!db.update_poll(&poll).await.unwrap());
    }

    #[tokio::test]
    async fn delete_cascades_to_questions_and_answers() {
        let db = memory_db().await;
        db.create_poll(&sample_poll()).await.unwrap();
        let batch = vec![ValidatedAnswer { question_id: "q1".into(), value: "No".into(), session_id: None }];
        db.save_answers("p1", None, "s1", &batch).await.unwrap();

        assert!(db.delete_poll("p1").await.unwrap());
        assert!(!db.delete_poll("p1").await.unwrap());
        assert!(db.get_poll("p1").await.unwrap().is_none());
        assert!(db.get_poll_answers("p1").await.unwrap().is_empty());

        let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE poll_id = ?")
            .bind("p1")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(leftover, 0);

        // Ids are free again once the cascade has run.
        db.create_poll(&sample_poll()).await.unwrap();
    }

    #[tokio::test]
    async fn expired_polls_are_found_and_ended() {
        let db = memory_db().await;
        let mut poll = sample_poll();
        poll.expires_at = Some(Utc::now() - Duration::minutes(5));
        db.create_poll(&poll).await.unwrap();

        let expired = db.get_expired_polls(Utc::now()).await.unwrap();
        assert_eq!(expired, vec!["p1".to_string()]);

        assert!(db.end_poll("p1").await.unwrap());
        assert!(!db.end_poll("p1").await.unwrap());
        assert!(db.get_expired_polls(Utc::now()).await.unwrap().is_empty());
        assert!(!db.get_poll("p1").await.unwrap().unwrap().is_active);
    }
}
