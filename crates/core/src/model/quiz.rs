use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Wrong submissions allowed before the quiz reveals the answers and closes.
pub const MAX_INCORRECT_ATTEMPTS: u32 = 2;

/// Selected choices by question index. Unanswered questions are simply absent.
pub type Answers = BTreeMap<usize, String>;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("answer key must contain at least one question")]
    EmptyAnswerKey,

    #[error("correct choice for question {0} cannot be blank")]
    BlankChoice(usize),
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// Correct choice for every required question of a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKey {
    correct: BTreeMap<usize, String>,
}

impl AnswerKey {
    /// # Errors
    ///
    /// Returns `QuizError::EmptyAnswerKey` when no question is given and
    /// `QuizError::BlankChoice` when a correct choice is blank.
    pub fn new<I, T>(entries: I) -> Result<Self, QuizError>
    where
        I: IntoIterator<Item = (usize, T)>,
        T: Into<String>,
    {
        let mut correct = BTreeMap::new();
        for (index, choice) in entries {
            let choice = choice.into();
            if choice.trim().is_empty() {
                return Err(QuizError::BlankChoice(index));
            }
            correct.insert(index, choice);
        }
        if correct.is_empty() {
            return Err(QuizError::EmptyAnswerKey);
        }
        Ok(Self { correct })
    }

    /// Number of required questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.correct.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.correct.is_empty()
    }

    #[must_use]
    pub fn choice(&self, index: usize) -> Option<&str> {
        self.correct.get(&index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.correct.iter().map(|(i, c)| (*i, c.as_str()))
    }

    /// Questions answered with the designated choice.
    #[must_use]
    pub fn count_correct(&self, answers: &Answers) -> usize {
        self.correct
            .iter()
            .filter(|(index, choice)| answers.get(index) == Some(*choice))
            .count()
    }
}

//
// ─── VERDICT & FEEDBACK ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Undetermined,
    Correct,
    IncorrectFinal,
}

impl Verdict {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Verdict::Undetermined)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLevel {
    Success,
    /// First miss: a nudge to retry, no answers given away.
    Hint,
    /// Final miss: the correct answers are shown.
    Reveal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub correct_count: usize,
    pub total: usize,
    /// Correct choices by question index. Only filled for `FeedbackLevel::Reveal`.
    pub revealed: Vec<(usize, String)>,
    pub text: String,
}

impl Feedback {
    fn success(total: usize) -> Self {
        let text = if total == 1 {
            "Correct! Well done.".to_owned()
        } else {
            format!("Perfect! You got all {total} questions correct!")
        };
        Self {
            level: FeedbackLevel::Success,
            correct_count: total,
            total,
            revealed: Vec::new(),
            text,
        }
    }

    fn hint(correct_count: usize, total: usize) -> Self {
        let text = if total == 1 {
            "Not quite right. Review what you observed and try again!".to_owned()
        } else {
            format!(
                "You got {correct_count} out of {total} correct. Review what you observed and try again!"
            )
        };
        Self {
            level: FeedbackLevel::Hint,
            correct_count,
            total,
            revealed: Vec::new(),
            text,
        }
    }

    fn reveal(correct_count: usize, key: &AnswerKey) -> Self {
        let revealed: Vec<(usize, String)> =
            key.iter().map(|(i, c)| (i, c.to_owned())).collect();
        let mut text = String::new();
        if let [(_, only)] = revealed.as_slice() {
            let _ = write!(text, "The correct answer is {only}.");
        } else {
            text.push_str("Correct answers:");
            for (n, (_, choice)) in revealed.iter().enumerate() {
                let _ = write!(text, " {}) {choice}", n + 1);
            }
            text.push('.');
        }
        text.push_str(" Study these key concepts!");
        Self {
            level: FeedbackLevel::Reveal,
            correct_count,
            total: key.len(),
            revealed,
            text,
        }
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The quiz already has a terminal verdict; nothing changed.
    Rejected,
    Evaluated {
        verdict: Verdict,
        attempts: u32,
        feedback: Feedback,
    },
}

impl SubmitOutcome {
    #[must_use]
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            SubmitOutcome::Rejected => None,
            SubmitOutcome::Evaluated { verdict, .. } => Some(*verdict),
        }
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&Feedback> {
        match self {
            SubmitOutcome::Rejected => None,
            SubmitOutcome::Evaluated { feedback, .. } => Some(feedback),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerEdit {
    /// The quiz is closed; the edit was dropped.
    Rejected,
    /// Edited during the retry after a first miss; attempts and feedback kept.
    Retrying,
    /// Edited on a fresh quiz; attempts and feedback cleared.
    Fresh,
}

//
// ─── QUIZ STATE ────────────────────────────────────────────────────────────────
//

/// Answer, attempt and verdict state of one quiz.
///
/// A quiz allows one retry: the first wrong submission returns a hint, the
/// second closes the quiz and reveals the answers. A correct submission closes
/// it as well. Closed quizzes ignore edits and submissions until `reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizState {
    answers: Answers,
    attempts: u32,
    verdict: Verdict,
    feedback: Option<Feedback>,
}

impl QuizState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.verdict.is_terminal()
    }

    /// Select `choice` for question `index`.
    ///
    /// After exactly one failed attempt the learner is on their retry, so the
    /// attempt count and hint survive the edit. Any other edit starts the quiz
    /// over from zero attempts.
    pub fn change_answer(&mut self, index: usize, choice: impl Into<String>) -> AnswerEdit {
        if self.is_terminal() {
            return AnswerEdit::Rejected;
        }
        self.answers.insert(index, choice.into());
        if self.attempts == 1 {
            AnswerEdit::Retrying
        } else {
            self.attempts = 0;
            self.feedback = None;
            AnswerEdit::Fresh
        }
    }

    /// Replace the current answers with `answers` and evaluate them.
    pub fn submit(&mut self, answers: Answers, key: &AnswerKey) -> SubmitOutcome {
        if self.is_terminal() {
            return SubmitOutcome::Rejected;
        }
        self.answers = answers;
        self.evaluate(key)
    }

    /// Evaluate the answers collected through `change_answer`.
    pub fn submit_current(&mut self, key: &AnswerKey) -> SubmitOutcome {
        if self.is_terminal() {
            return SubmitOutcome::Rejected;
        }
        self.evaluate(key)
    }

    /// Clear answers, attempts, verdict and feedback.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn evaluate(&mut self, key: &AnswerKey) -> SubmitOutcome {
        let correct_count = key.count_correct(&self.answers);
        let total = key.len();
        self.attempts = self.attempts.saturating_add(1);

        let feedback = if correct_count == total {
            self.verdict = Verdict::Correct;
            Feedback::success(total)
        } else if self.attempts >= MAX_INCORRECT_ATTEMPTS {
            self.verdict = Verdict::IncorrectFinal;
            Feedback::reveal(correct_count, key)
        } else {
            Feedback::hint(correct_count, total)
        };

        self.feedback = Some(feedback.clone());
        SubmitOutcome::Evaluated {
            verdict: self.verdict,
            attempts: self.attempts,
            feedback,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn key_b() -> AnswerKey {
        AnswerKey::new([(0, "b")]).unwrap()
    }

    fn answers(entries: &[(usize, &str)]) -> Answers {
        entries.iter().map(|(i, c)| (*i, (*c).to_owned())).collect()
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = AnswerKey::new(Vec::<(usize, String)>::new()).unwrap_err();
        assert_eq!(err, QuizError::EmptyAnswerKey);
        let err = AnswerKey::new([(3, " ")]).unwrap_err();
        assert_eq!(err, QuizError::BlankChoice(3));
    }

    #[test]
    fn two_misses_close_the_quiz_and_reveal() {
        let key = key_b();
        let mut quiz = QuizState::new();

        let first = quiz.submit(answers(&[(0, "a")]), &key);
        assert_eq!(first.verdict(), Some(Verdict::Undetermined));
        assert_eq!(quiz.attempts(), 1);
        assert_eq!(first.feedback().unwrap().level, FeedbackLevel::Hint);
        assert!(first.feedback().unwrap().revealed.is_empty());

        let second = quiz.submit(answers(&[(0, "a")]), &key);
        assert_eq!(second.verdict(), Some(Verdict::IncorrectFinal));
        assert_eq!(quiz.attempts(), 2);
        let feedback = second.feedback().unwrap();
        assert_eq!(feedback.level, FeedbackLevel::Reveal);
        assert_eq!(feedback.revealed, vec![(0, "b".to_owned())]);
        assert!(feedback.text.contains('b'));
    }

    #[test]
    fn first_try_correct() {
        let mut quiz = QuizState::new();
        let outcome = quiz.submit(answers(&[(0, "b")]), &key_b());
        assert_eq!(outcome.verdict(), Some(Verdict::Correct));
        assert_eq!(quiz.attempts(), 1);
        assert_eq!(outcome.feedback().unwrap().level, FeedbackLevel::Success);
    }

    #[test]
    fn correct_on_retry() {
        let mut quiz = QuizState::new();
        quiz.submit(answers(&[(0, "c")]), &key_b());
        let outcome = quiz.submit(answers(&[(0, "b")]), &key_b());
        assert_eq!(outcome.verdict(), Some(Verdict::Correct));
        assert_eq!(quiz.attempts(), 2);
    }

    #[test]
    fn terminal_quiz_rejects_submissions_and_edits() {
        let mut quiz = QuizState::new();
        quiz.submit(answers(&[(0, "b")]), &key_b());
        let before = quiz.clone();

        assert_eq!(quiz.submit(answers(&[(0, "a")]), &key_b()), SubmitOutcome::Rejected);
        assert_eq!(quiz.submit_current(&key_b()), SubmitOutcome::Rejected);
        assert_eq!(quiz.change_answer(0, "a"), AnswerEdit::Rejected);
        assert_eq!(quiz, before);
    }

    #[test]
    fn partial_credit_counts_only_required_questions() {
        let key = AnswerKey::new([(1, "relight"), (2, "supports"), (3, "air")]).unwrap();
        let mut quiz = QuizState::new();
        let outcome = quiz.submit(
            answers(&[(1, "relight"), (2, "smothers"), (9, "extra")]),
            &key,
        );
        let feedback = outcome.feedback().unwrap();
        assert_eq!(feedback.correct_count, 1);
        assert_eq!(feedback.total, 3);
        assert!(feedback.text.contains("1 out of 3"));
    }

    #[test]
    fn reveal_lists_every_answer_in_order() {
        let key = AnswerKey::new([(1, "relight"), (2, "supports"), (3, "air")]).unwrap();
        let mut quiz = QuizState::new();
        quiz.submit(Answers::new(), &key);
        let outcome = quiz.submit(Answers::new(), &key);
        let text = &outcome.feedback().unwrap().text;
        assert!(text.contains("1) relight 2) supports 3) air"), "{text}");
    }

    #[test]
    fn edit_during_retry_keeps_attempts() {
        let key = key_b();
        let mut quiz = QuizState::new();
        quiz.change_answer(0, "a");
        quiz.submit_current(&key);
        assert_eq!(quiz.attempts(), 1);

        assert_eq!(quiz.change_answer(0, "c"), AnswerEdit::Retrying);
        assert_eq!(quiz.attempts(), 1);
        assert!(quiz.feedback().is_some());

        let outcome = quiz.submit_current(&key);
        assert_eq!(outcome.verdict(), Some(Verdict::IncorrectFinal));
    }

    #[test]
    fn edit_on_fresh_quiz_clears_feedback() {
        let mut quiz = QuizState::new();
        assert_eq!(quiz.change_answer(0, "a"), AnswerEdit::Fresh);
        assert_eq!(quiz.attempts(), 0);
        assert!(quiz.feedback().is_none());
        assert_eq!(quiz.answers().get(&0).map(String::as_str), Some("a"));
    }

    #[test]
    fn attempts_never_decrease_while_undetermined() {
        let key = key_b();
        let mut quiz = QuizState::new();
        let mut last = quiz.attempts();
        let script: [(&str, bool); 4] = [("a", false), ("c", true), ("d", false), ("b", true)];
        for (choice, submit) in script {
            quiz.change_answer(0, choice);
            if submit {
                quiz.submit_current(&key);
            }
            if quiz.verdict() == Verdict::Undetermined {
                assert!(quiz.attempts() >= last);
            }
            last = quiz.attempts();
        }
        assert!(quiz.is_terminal());
    }

    #[test]
    fn reset_reopens_a_closed_quiz() {
        let mut quiz = QuizState::new();
        quiz.submit(answers(&[(0, "b")]), &key_b());
        quiz.reset();
        assert_eq!(quiz.verdict(), Verdict::Undetermined);
        assert_eq!(quiz.attempts(), 0);
        assert!(quiz.answers().is_empty());
        assert!(quiz.feedback().is_none());
        assert!(matches!(
            quiz.submit(answers(&[(0, "a")]), &key_b()),
            SubmitOutcome::Evaluated { .. }
        ));
    }
}
