// src/services/orchestrator.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{
        BACKOFF_BASE_SECS, BATCH_DELAY_SECS, MAX_BATCH_ATTEMPTS, QUESTION_BATCH_SIZE,
        QUOTA_COOLDOWN_SECS,
    },
    models::{question::GeneratedQuestion, quiz::Difficulty},
    services::{
        generation::{GenerationService, GenerationServiceError},
        parser::{FormatError, parse_questions},
        prompt::build_prompt,
    },
};

/// Batching, retry and pacing knobs for question generation.
#[derive(Debug, Clone)]
pub struct GenerationPolicy {
    pub batch_size: usize,
    pub max_attempts: usize,
    pub quota_cooldown: Duration,
    /// Backoff after the n-th failed attempt is `backoff_base * 2^n`.
    pub backoff_base: Duration,
    pub batch_delay: Duration,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            batch_size: QUESTION_BATCH_SIZE,
            max_attempts: MAX_BATCH_ATTEMPTS,
            quota_cooldown: Duration::from_secs(QUOTA_COOLDOWN_SECS),
            backoff_base: Duration::from_secs(BACKOFF_BASE_SECS),
            batch_delay: Duration::from_secs(BATCH_DELAY_SECS),
        }
    }
}

impl GenerationPolicy {
    /// Same batching and attempt budget, no waiting. For tests and local tooling.
    pub fn without_delays() -> Self {
        Self {
            quota_cooldown: Duration::ZERO,
            backoff_base: Duration::ZERO,
            batch_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Number of batches needed for `total` questions.
    pub fn batch_count(&self, total: usize) -> usize {
        total.div_ceil(self.batch_size.max(1))
    }

    /// Wait before retrying after `failures` failed attempts of a batch.
    fn retry_delay(&self, failures: usize, quota: bool) -> Duration {
        if quota {
            self.quota_cooldown
        } else {
            self.backoff_base * 2u32.saturating_pow(failures as u32)
        }
    }
}

/// Why a single batch attempt failed.
#[derive(Debug, Clone)]
pub enum BatchFailure {
    Service(GenerationServiceError),
    Format(FormatError),
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchFailure::Service(e) => write!(f, "{}", e),
            BatchFailure::Format(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug)]
pub enum GenerationError {
    InvalidCount(usize),
    /// A batch used up its attempts. Nothing from this generation is kept.
    BatchFailed {
        batch: usize,
        attempts: usize,
        last_error: BatchFailure,
    },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::InvalidCount(n) => write!(f, "invalid question count {}", n),
            GenerationError::BatchFailed {
                batch,
                attempts,
                last_error,
            } => write!(
                f,
                "batch {} failed after {} attempts: {}",
                batch, attempts, last_error
            ),
        }
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    /// True when the final failure was a quota signal.
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            GenerationError::BatchFailed {
                last_error: BatchFailure::Service(e),
                ..
            } if e.is_quota()
        )
    }
}

/// Questions produced by one generation run, with retry bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub questions: Vec<GeneratedQuestion>,
    pub batches: usize,
    pub retries: usize,
    pub quota_cooldowns: usize,
}

/// Turns content into validated questions through sequential, bounded batches.
#[derive(Clone)]
pub struct QuizGenerator {
    service: Arc<dyn GenerationService>,
    policy: GenerationPolicy,
}

impl QuizGenerator {
    pub fn new(service: Arc<dyn GenerationService>, policy: GenerationPolicy) -> Self {
        Self { service, policy }
    }

    /// Generates up to `total` questions. The questions carry no owning quiz.
    pub async fn generate(
        &self,
        content: &str,
        difficulty: Difficulty,
        total: usize,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
        self.generate_with_report(content, difficulty, total)
            .await
            .map(|outcome| outcome.questions)
    }

    /// Like `generate`, also reporting how many retries and cooldowns it took.
    ///
    /// Batches are issued one after another and concatenated in issue order.
    /// A batch that validates fewer questions than requested is accepted as is.
    pub async fn generate_with_report(
        &self,
        content: &str,
        difficulty: Difficulty,
        total: usize,
    ) -> Result<GenerationOutcome, GenerationError> {
        if total == 0 {
            return Err(GenerationError::InvalidCount(total));
        }

        let batches = self.policy.batch_count(total);
        let mut outcome = GenerationOutcome {
            batches,
            ..GenerationOutcome::default()
        };

        for batch in 1..=batches {
            let wanted = self.policy.batch_size.min(total - outcome.questions.len());
            if wanted == 0 {
                break;
            }

            let mut produced = self
                .run_batch(batch, content, difficulty, wanted, &mut outcome)
                .await?;
            produced.truncate(wanted);

            tracing::info!(batch, batches, wanted, got = produced.len(), "Batch generated");
            outcome.questions.extend(produced);

            if batch < batches && !self.policy.batch_delay.is_zero() {
                tokio::time::sleep(self.policy.batch_delay).await;
            }
        }

        Ok(outcome)
    }

    async fn run_batch(
        &self,
        batch: usize,
        content: &str,
        difficulty: Difficulty,
        wanted: usize,
        outcome: &mut GenerationOutcome,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
        let prompt = build_prompt(content, difficulty, wanted);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut failures = 0;

        loop {
            let failure = match self.service.generate_text(&prompt).await {
                Ok(raw) => match parse_questions(&raw) {
                    Ok(questions) => return Ok(questions),
                    Err(e) => BatchFailure::Format(e),
                },
                Err(e) => BatchFailure::Service(e),
            };

            failures += 1;
            if failures >= max_attempts {
                tracing::error!(batch, attempts = failures, error = %failure, "Batch failed, giving up");
                return Err(GenerationError::BatchFailed {
                    batch,
                    attempts: failures,
                    last_error: failure,
                });
            }

            let quota = matches!(&failure, BatchFailure::Service(e) if e.is_quota());
            let wait = self.policy.retry_delay(failures, quota);
            if quota {
                outcome.quota_cooldowns += 1;
            }
            outcome.retries += 1;

            tracing::warn!(
                batch,
                attempt = failures,
                quota,
                wait_secs = wait.as_secs_f64(),
                error = %failure,
                "Batch attempt failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use crate::services::generation::ServiceErrorKind;

    /// Replays scripted responses; once the script runs out it answers with
    /// as many questions as the prompt asks for.
    struct ScriptedService {
        script: Mutex<VecDeque<Result<String, GenerationServiceError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(script: Vec<Result<String, GenerationServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn requested(&self) -> Vec<usize> {
            self.prompts
                .lock()
                .unwrap()
                .iter()
                .map(|p| requested_count(p))
                .collect()
        }
    }

    fn requested_count(prompt: &str) -> usize {
        prompt
            .strip_prefix("Generate exactly ")
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap()
    }

    fn questions_json(n: usize) -> String {
        let items: Vec<_> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Question {i}?"),
                    "options": {"A": "w", "B": "x", "C": "y", "D": format!("z{i}")},
                    "correctAnswer": "D"
                })
            })
            .collect();
        format!("```json\n{}\n```", serde_json::Value::Array(items))
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn generate_text(&self, prompt: &str) -> Result<String, GenerationServiceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(step) => step,
                None => Ok(questions_json(requested_count(prompt))),
            }
        }
    }

    fn transient() -> Result<String, GenerationServiceError> {
        Err(GenerationServiceError::new(ServiceErrorKind::Transient, "connection reset"))
    }

    fn quota() -> Result<String, GenerationServiceError> {
        Err(GenerationServiceError::new(ServiceErrorKind::Quota, "quota exceeded"))
    }

    #[tokio::test(start_paused = true)]
    async fn two_transient_failures_then_success() {
        let service = ScriptedService::new(vec![transient(), transient()]);
        let generator = QuizGenerator::new(service.clone(), GenerationPolicy::default());

        let started = tokio::time::Instant::now();
        let outcome = generator
            .generate_with_report("content", Difficulty::Easy, 10)
            .await
            .unwrap();

        assert_eq!(outcome.questions.len(), 10);
        assert_eq!(outcome.retries, 2);
        assert_eq!(outcome.quota_cooldowns, 0);
        assert_eq!(service.calls(), 3);
        // 2s + 4s of backoff, no cooldown and no trailing batch delay.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_errors_wait_for_the_cooldown() {
        let service = ScriptedService::new(vec![quota()]);
        let generator = QuizGenerator::new(service.clone(), GenerationPolicy::default());

        let started = tokio::time::Instant::now();
        let outcome = generator
            .generate_with_report("content", Difficulty::Hard, 3)
            .await
            .unwrap();

        assert_eq!(outcome.quota_cooldowns, 1);
        assert_eq!(outcome.questions.len(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(QUOTA_COOLDOWN_SECS));
        assert!(elapsed < Duration::from_secs(QUOTA_COOLDOWN_SECS + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_sized_from_the_remaining_count() {
        let service = ScriptedService::new(vec![]);
        let generator = QuizGenerator::new(service.clone(), GenerationPolicy::default());

        let started = tokio::time::Instant::now();
        let questions = generator.generate("content", Difficulty::Mixed, 25).await.unwrap();

        assert_eq!(questions.len(), 25);
        assert_eq!(service.requested(), vec![10, 10, 5]);
        // Two inter-batch pauses.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2 * BATCH_DELAY_SECS));
        assert!(elapsed < Duration::from_secs(2 * BATCH_DELAY_SECS + 1));
    }

    #[tokio::test]
    async fn undercount_is_accepted_and_overcount_trimmed() {
        let service = ScriptedService::new(vec![Ok(questions_json(4)), Ok(questions_json(12))]);
        let generator = QuizGenerator::new(service.clone(), GenerationPolicy::without_delays());

        let questions = generator.generate("content", Difficulty::Medium, 20).await.unwrap();

        // First batch asked for 10 and got 4; second asked for 10 and got 12, trimmed to 10.
        assert_eq!(service.requested(), vec![10, 10]);
        assert_eq!(questions.len(), 14);
    }

    #[tokio::test]
    async fn malformed_response_consumes_an_attempt() {
        let service = ScriptedService::new(vec![Ok("not json at all".to_string())]);
        let generator = QuizGenerator::new(service.clone(), GenerationPolicy::without_delays());

        let outcome = generator
            .generate_with_report("content", Difficulty::Easy, 2)
            .await
            .unwrap();

        assert_eq!(outcome.retries, 1);
        assert_eq!(outcome.questions.len(), 2);
    }

    #[tokio::test]
    async fn exhausted_batch_fails_the_whole_generation() {
        let service = ScriptedService::new(vec![
            Ok(questions_json(10)),
            transient(),
            transient(),
            quota(),
        ]);
        let generator = QuizGenerator::new(service.clone(), GenerationPolicy::without_delays());

        let err = generator.generate("content", Difficulty::Easy, 15).await.unwrap_err();

        match &err {
            GenerationError::BatchFailed { batch, attempts, .. } => {
                assert_eq!(*batch, 2);
                assert_eq!(*attempts, MAX_BATCH_ATTEMPTS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_quota());
        assert_eq!(service.calls(), 1 + MAX_BATCH_ATTEMPTS);
    }

    #[tokio::test]
    async fn zero_questions_is_rejected() {
        let service = ScriptedService::new(vec![]);
        let generator = QuizGenerator::new(service.clone(), GenerationPolicy::without_delays());
        assert!(matches!(
            generator.generate("content", Difficulty::Easy, 0).await,
            Err(GenerationError::InvalidCount(0))
        ));
        assert_eq!(service.calls(), 0);
    }
}
