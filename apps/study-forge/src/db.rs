//! Database operations for study forge.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use study_engine::{
    EngineError, EngineResult, Flashcard, MasteryLevel, Question, QuestionKind, SessionResult,
    SetId, StudySet, StudySetStore,
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<DbError> for EngineError {
    fn from(e: DbError) -> Self {
        EngineError::Store(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        info!(path = %path.display(), "opened database");
        Ok(db)
    }

    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> DbResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS study_sets (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                source_snippet TEXT NOT NULL,
                source_text TEXT,
                created_at TEXT NOT NULL,
                tags TEXT NOT NULL,
                study_guide TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                set_id TEXT NOT NULL REFERENCES study_sets(id),
                position INTEGER NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                mastery INTEGER NOT NULL,
                next_review_at TEXT NOT NULL,
                last_reviewed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                set_id TEXT NOT NULL REFERENCES study_sets(id),
                position INTEGER NOT NULL,
                kind TEXT NOT NULL,
                prompt TEXT NOT NULL,
                options TEXT,
                expected_answer TEXT NOT NULL,
                explanation TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_results (
                set_id TEXT NOT NULL REFERENCES study_sets(id),
                position INTEGER NOT NULL,
                date TEXT NOT NULL,
                score INTEGER NOT NULL,
                total_questions INTEGER NOT NULL,
                difficulty TEXT NOT NULL,
                mode TEXT NOT NULL,
                PRIMARY KEY (set_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_flashcards_set ON flashcards(set_id, position);
            CREATE INDEX IF NOT EXISTS idx_questions_set ON questions(set_id, position);
            "#,
        )?;
        Ok(())
    }

    // Set operations

    pub fn save_set(&mut self, set: &StudySet) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        let id = set.id.to_string();

        tx.execute(
            "INSERT INTO study_sets (id, title, description, source_snippet, source_text, created_at, tags, study_guide)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title, description = excluded.description,
                source_snippet = excluded.source_snippet, source_text = excluded.source_text,
                tags = excluded.tags, study_guide = excluded.study_guide",
            params![
                id,
                set.title,
                set.description,
                set.source_snippet,
                set.source_text,
                set.created_at.to_rfc3339(),
                serde_json::to_string(&set.tags)?,
                set.study_guide,
            ],
        )?;

        delete_children(&tx, &id)?;

        for (position, card) in set.flashcards.iter().enumerate() {
            tx.execute(
                "INSERT INTO flashcards (id, set_id, position, front, back, mastery, next_review_at, last_reviewed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    card.id.to_string(),
                    id,
                    position as i64,
                    card.front,
                    card.back,
                    i64::from(card.mastery.get()),
                    card.next_review_at.to_rfc3339(),
                    card.last_reviewed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
        }

        for (position, question) in set.questions.iter().enumerate() {
            let options = question
                .options
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                "INSERT INTO questions (id, set_id, position, kind, prompt, options, expected_answer, explanation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    question.id.to_string(),
                    id,
                    position as i64,
                    kind_str(question.kind),
                    question.prompt,
                    options,
                    question.expected_answer,
                    question.explanation,
                ],
            )?;
        }

        for (position, result) in set.results.iter().enumerate() {
            tx.execute(
                "INSERT INTO session_results (set_id, position, date, score, total_questions, difficulty, mode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    position as i64,
                    result.date.to_rfc3339(),
                    result.score,
                    result.total_questions,
                    result.difficulty.to_string(),
                    result.mode.to_string(),
                ],
            )?;
        }

        tx.commit()?;
        debug!(set = %set.id, cards = set.flashcards.len(), "saved set");
        Ok(())
    }

    pub fn delete_set(&mut self, id: SetId) -> DbResult<bool> {
        let tx = self.conn.transaction()?;
        let id_str = id.to_string();
        delete_children(&tx, &id_str)?;
        let removed = tx.execute("DELETE FROM study_sets WHERE id = ?1", params![id_str])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    pub fn get_set(&self, id: SetId) -> DbResult<Option<StudySet>> {
        let mut stmt = self.conn.prepare("SELECT * FROM study_sets WHERE id = ?1")?;
        let set = stmt
            .query_row(params![id.to_string()], parse_set_row)
            .optional()?;

        let Some(mut set) = set else {
            return Ok(None);
        };
        set.flashcards = self.get_flashcards(id)?;
        set.questions = self.get_questions(id)?;
        set.results = self.get_results(id)?;
        Ok(Some(set))
    }

    pub fn list_sets(&self) -> DbResult<Vec<StudySet>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM study_sets ORDER BY created_at DESC")?;
        let ids = stmt
            .query_map([], |row| parse_uuid(row, 0))?
            .collect::<SqlResult<Vec<_>>>()?;

        let mut sets = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(set) = self.get_set(id)? {
                sets.push(set);
            }
        }
        Ok(sets)
    }

    // Child rows

    fn get_flashcards(&self, set_id: SetId) -> DbResult<Vec<Flashcard>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM flashcards WHERE set_id = ?1 ORDER BY position")?;
        let cards = stmt
            .query_map(params![set_id.to_string()], parse_card_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(cards)
    }

    fn get_questions(&self, set_id: SetId) -> DbResult<Vec<Question>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM questions WHERE set_id = ?1 ORDER BY position")?;
        let questions = stmt
            .query_map(params![set_id.to_string()], parse_question_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(questions)
    }

    fn get_results(&self, set_id: SetId) -> DbResult<Vec<SessionResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM session_results WHERE set_id = ?1 ORDER BY position")?;
        let results = stmt
            .query_map(params![set_id.to_string()], parse_result_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(results)
    }
}

impl StudySetStore for Database {
    fn list(&self) -> EngineResult<Vec<StudySet>> {
        Ok(self.list_sets()?)
    }

    fn get(&self, id: SetId) -> EngineResult<Option<StudySet>> {
        Ok(self.get_set(id)?)
    }

    fn put(&mut self, set: &StudySet) -> EngineResult<()> {
        Ok(self.save_set(set)?)
    }

    fn delete(&mut self, id: SetId) -> EngineResult<bool> {
        Ok(self.delete_set(id)?)
    }
}

fn delete_children(conn: &Connection, set_id: &str) -> DbResult<()> {
    conn.execute("DELETE FROM flashcards WHERE set_id = ?1", params![set_id])?;
    conn.execute("DELETE FROM questions WHERE set_id = ?1", params![set_id])?;
    conn.execute("DELETE FROM session_results WHERE set_id = ?1", params![set_id])?;
    Ok(())
}

fn kind_str(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::MultipleChoice => "multiple-choice",
        QuestionKind::TrueFalse => "true-false",
        QuestionKind::ShortAnswer => "short-answer",
    }
}

fn conversion_error<E>(idx: usize, ty: Type, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

fn column_index(row: &Row, name: &str) -> usize {
    row.as_ref().column_index(name).unwrap_or(0)
}

fn parse_uuid(row: &Row, idx: usize) -> SqlResult<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, Type::Text, e))
}

fn parse_uuid_col(row: &Row, name: &str) -> SqlResult<Uuid> {
    parse_uuid(row, column_index(row, name))
}

fn parse_time(row: &Row, name: &str) -> SqlResult<DateTime<Utc>> {
    let s: String = row.get(name)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column_index(row, name), Type::Text, e))
}

fn parse_opt_time(row: &Row, name: &str) -> SqlResult<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(name)?;
    s.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(column_index(row, name), Type::Text, e))
    })
    .transpose()
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row, name: &str) -> SqlResult<T> {
    let s: String = row.get(name)?;
    serde_json::from_str(&s).map_err(|e| conversion_error(column_index(row, name), Type::Text, e))
}

fn parse_set_row(row: &Row) -> SqlResult<StudySet> {
    Ok(StudySet {
        id: parse_uuid_col(row, "id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        source_snippet: row.get("source_snippet")?,
        source_text: row.get("source_text")?,
        created_at: parse_time(row, "created_at")?,
        tags: parse_json(row, "tags")?,
        flashcards: Vec::new(),
        questions: Vec::new(),
        results: Vec::new(),
        study_guide: row.get("study_guide")?,
    })
}

fn parse_card_row(row: &Row) -> SqlResult<Flashcard> {
    let level: i64 = row.get("mastery")?;
    let mastery = MasteryLevel::try_from(level)
        .map_err(|e| conversion_error(column_index(row, "mastery"), Type::Integer, e))?;

    Ok(Flashcard {
        id: parse_uuid_col(row, "id")?,
        front: row.get("front")?,
        back: row.get("back")?,
        mastery,
        next_review_at: parse_time(row, "next_review_at")?,
        last_reviewed_at: parse_opt_time(row, "last_reviewed_at")?,
    })
}

fn parse_question_row(row: &Row) -> SqlResult<Question> {
    let kind_col: String = row.get("kind")?;
    let kind = match kind_col.as_str() {
        "multiple-choice" => QuestionKind::MultipleChoice,
        "true-false" => QuestionKind::TrueFalse,
        "short-answer" => QuestionKind::ShortAnswer,
        other => {
            return Err(conversion_error(
                column_index(row, "kind"),
                Type::Text,
                DbError::Corrupt(format!("unknown question kind '{other}'")),
            ))
        }
    };
    let options: Option<String> = row.get("options")?;
    let options = options
        .map(|s| serde_json::from_str::<Vec<String>>(&s))
        .transpose()
        .map_err(|e| conversion_error(column_index(row, "options"), Type::Text, e))?;

    Ok(Question {
        id: parse_uuid_col(row, "id")?,
        kind,
        prompt: row.get("prompt")?,
        options,
        expected_answer: row.get("expected_answer")?,
        explanation: row.get("explanation")?,
    })
}

fn parse_result_row(row: &Row) -> SqlResult<SessionResult> {
    let difficulty: String = row.get("difficulty")?;
    let mode: String = row.get("mode")?;

    Ok(SessionResult {
        date: parse_time(row, "date")?,
        score: row.get("score")?,
        total_questions: row.get("total_questions")?,
        difficulty: difficulty
            .parse()
            .map_err(|e| conversion_error(column_index(row, "difficulty"), Type::Text, e))?,
        mode: mode
            .parse()
            .map_err(|e| conversion_error(column_index(row, "mode"), Type::Text, e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use study_engine::{commit_review, record_result, Difficulty, SessionMode};

    fn sample_set() -> StudySet {
        let now = Utc::now();
        let mut set = StudySet::new("Geography", now)
            .with_description("Capitals")
            .with_source_text("Paris is the capital of France.")
            .with_tags(["europe", "capitals"]);
        set.flashcards.push(Flashcard::new("France", "Paris", now));
        set.flashcards.push(Flashcard::new("Spain", "Madrid", now));
        set.questions.push(
            Question::new(QuestionKind::MultipleChoice, "Capital of Italy?", "Rome")
                .with_options(["Rome", "Milan", "Turin", "Naples"])
                .with_explanation("Rome has been the capital since 1871."),
        );
        set.questions.push(Question::new(
            QuestionKind::ShortAnswer,
            "Capital of France?",
            "Paris",
        ));
        set.study_guide = "# Capitals".to_string();
        set
    }

    #[test]
    fn test_set_crud() {
        let mut db = Database::in_memory().unwrap();
        let set = sample_set();
        db.save_set(&set).unwrap();

        let loaded = db.get_set(set.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Geography");
        assert_eq!(loaded.tags, vec!["europe", "capitals"]);
        assert_eq!(loaded.flashcards.len(), 2);
        assert_eq!(loaded.flashcards[1].front, "Spain");
        assert_eq!(loaded.questions[0].options.as_ref().unwrap().len(), 4);
        assert_eq!(loaded.questions[1].kind, QuestionKind::ShortAnswer);
        assert_eq!(loaded.source_text, set.source_text);

        assert!(db.delete_set(set.id).unwrap());
        assert!(db.get_set(set.id).unwrap().is_none());
        assert!(!db.delete_set(set.id).unwrap());
    }

    #[test]
    fn test_delete_removes_children() {
        let mut db = Database::in_memory().unwrap();
        let set = sample_set();
        db.save_set(&set).unwrap();
        db.delete_set(set.id).unwrap();

        let orphans: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM flashcards", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_list_newest_first() {
        let mut db = Database::in_memory().unwrap();
        let mut older = sample_set();
        older.title = "Older".to_string();
        older.created_at = Utc::now() - Duration::days(3);
        db.save_set(&older).unwrap();
        db.save_set(&sample_set()).unwrap();

        let titles: Vec<_> = db.list_sets().unwrap().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Geography", "Older"]);
    }

    #[test]
    fn test_review_and_result_through_store() {
        let mut db = Database::in_memory().unwrap();
        let set = sample_set();
        db.save_set(&set).unwrap();
        let card_id = set.flashcards[0].id;
        let now = Utc::now();

        commit_review(&mut db, set.id, card_id, true, now).unwrap();
        record_result(
            &mut db,
            set.id,
            SessionResult {
                date: now,
                score: 1,
                total_questions: 2,
                difficulty: Difficulty::Medium,
                mode: SessionMode::Quiz,
            },
        )
        .unwrap();

        let loaded = db.get_set(set.id).unwrap().unwrap();
        let card = loaded.card(card_id).unwrap();
        assert_eq!(card.mastery.get(), 1);
        assert_eq!(card.last_reviewed_at.unwrap().timestamp(), now.timestamp());
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].mode, SessionMode::Quiz);
    }

    #[test]
    fn test_corrupt_mastery_rejected() {
        let mut db = Database::in_memory().unwrap();
        let set = sample_set();
        db.save_set(&set).unwrap();
        db.conn
            .execute("UPDATE flashcards SET mastery = 9", [])
            .unwrap();

        assert!(matches!(db.get_set(set.id), Err(DbError::Sqlite(_))));
        let err: EngineError = db.get_set(set.id).unwrap_err().into();
        assert!(matches!(err, EngineError::Store(_)));
    }
}
