// src/store/quiz_store.rs

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    models::{
        question::{GeneratedQuestion, Question},
        quiz::{NewQuiz, Quiz},
        result::{AttemptResult, NewAttempt},
    },
    store::StoreError,
};

/// Local persistence of quizzes, their questions and attempt results.
#[derive(Clone)]
pub struct QuizStore {
    pool: SqlitePool,
}

impl QuizStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists a quiz together with its questions and returns the new quiz id.
    ///
    /// The quiz row and every question row are written in one transaction,
    /// so readers never observe questions without their quiz. Dropping the
    /// future before it completes rolls the transaction back.
    pub async fn save_quiz(
        &self,
        quiz: &NewQuiz,
        questions: &[GeneratedQuestion],
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let quiz_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quizzes (title, subject, difficulty, total_questions, quiz_type, format, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&quiz.title)
        .bind(&quiz.subject)
        .bind(quiz.difficulty.as_str())
        .bind(questions.len() as i64)
        .bind(&quiz.quiz_type)
        .bind(&quiz.format)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for q in questions {
            let [a, b, c, d] = &q.options;
            sqlx::query(
                r#"
                INSERT INTO questions
                    (quiz_id, question_text, option_a, option_b, option_c, option_d, correct_option, hint)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(quiz_id)
            .bind(&q.question_text)
            .bind(a)
            .bind(b)
            .bind(c)
            .bind(d)
            .bind(&q.correct_option)
            .bind(&q.hint)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(quiz_id, questions = questions.len(), "Quiz saved");
        Ok(quiz_id)
    }

    /// All quizzes, newest first.
    pub async fn get_quizzes(&self) -> Result<Vec<Quiz>, StoreError> {
        let quizzes = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, title, subject, difficulty, total_questions, quiz_type, format, created_at
            FROM quizzes
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(quizzes)
    }

    pub async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, StoreError> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, title, subject, difficulty, total_questions, quiz_type, format, created_at
            FROM quizzes
            WHERE id = ?
            "#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quiz)
    }

    /// Questions of a quiz in insertion order. Empty if the quiz has none.
    pub async fn get_questions(&self, quiz_id: i64) -> Result<Vec<Question>, StoreError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, quiz_id, question_text, option_a, option_b, option_c, option_d, correct_option, hint
            FROM questions
            WHERE quiz_id = ?
            ORDER BY id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    /// Appends an attempt result. Results are never updated afterwards.
    pub async fn save_result(&self, attempt: &NewAttempt) -> Result<AttemptResult, StoreError> {
        let result = sqlx::query_as::<_, AttemptResult>(
            r#"
            INSERT INTO results (quiz_id, score, total, xp_earned, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, quiz_id, score, total, xp_earned, created_at
            "#,
        )
        .bind(attempt.quiz_id)
        .bind(attempt.score)
        .bind(attempt.total)
        .bind(attempt.xp_earned)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    /// Attempt history, newest first.
    pub async fn get_results(&self) -> Result<Vec<AttemptResult>, StoreError> {
        let results = sqlx::query_as::<_, AttemptResult>(
            r#"
            SELECT id, quiz_id, score, total, xp_earned, created_at
            FROM results
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }
}
