use crate::models::question::ExamQuestion;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    pub selected_answer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub selected_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub marks_obtained: f64,
}

#[derive(Debug, Clone)]
pub struct GradeSummary {
    pub obtained_marks: f64,
    pub total_marks: f64,
    pub percentage: f64,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub unanswered_count: i32,
    pub per_question: Vec<GradedAnswer>,
}

impl GradeSummary {
    pub fn passed(&self, passing_marks: i32) -> bool {
        self.obtained_marks >= passing_marks as f64
    }
}

pub struct GradingService;

impl GradingService {
    /// Grade a submission against the exam's question set. Pure: the
    /// caller persists the summary.
    ///
    /// Answer codes are single letters compared after trim/uppercase
    /// normalization. A wrong answer deducts `negative_marking` (capped at
    /// the question's marks) when negative marking is enabled; questions
    /// with no submitted entry count as unanswered and contribute zero.
    /// The overall total is floored at zero.
    pub fn grade(
        questions: &[ExamQuestion],
        answers: &[SubmittedAnswer],
        negative_marking: f64,
    ) -> GradeSummary {
        let by_question: HashMap<Uuid, &SubmittedAnswer> =
            answers.iter().map(|a| (a.question_id, a)).collect();

        let mut obtained: f64 = 0.0;
        let mut total: f64 = 0.0;
        let mut correct_count = 0;
        let mut incorrect_count = 0;
        let mut unanswered_count = 0;
        let mut per_question = Vec::with_capacity(questions.len());

        for question in questions {
            total += question.marks as f64;

            let selected = by_question
                .get(&question.id)
                .and_then(|a| a.selected_answer.as_deref())
                .map(normalize_code)
                .filter(|s| !s.is_empty());

            let Some(selected) = selected else {
                unanswered_count += 1;
                per_question.push(GradedAnswer {
                    question_id: question.id,
                    selected_answer: None,
                    is_correct: None,
                    marks_obtained: 0.0,
                });
                continue;
            };

            if selected == normalize_code(&question.correct_answer) {
                correct_count += 1;
                obtained += question.marks as f64;
                per_question.push(GradedAnswer {
                    question_id: question.id,
                    selected_answer: Some(selected),
                    is_correct: Some(true),
                    marks_obtained: question.marks as f64,
                });
            } else {
                incorrect_count += 1;
                let deduction = if negative_marking > 0.0 {
                    negative_marking.min(question.marks as f64)
                } else {
                    0.0
                };
                obtained -= deduction;
                per_question.push(GradedAnswer {
                    question_id: question.id,
                    selected_answer: Some(selected),
                    is_correct: Some(false),
                    marks_obtained: -deduction,
                });
            }
        }

        let obtained = obtained.max(0.0);
        let percentage = if total > 0.0 {
            obtained / total * 100.0
        } else {
            0.0
        };

        GradeSummary {
            obtained_marks: obtained,
            total_marks: total,
            percentage,
            correct_count,
            incorrect_count,
            unanswered_count,
            per_question,
        }
    }
}

fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn question(correct: &str, marks: i32) -> ExamQuestion {
        ExamQuestion {
            id: Uuid::new_v4(),
            exam_id: Uuid::new_v4(),
            question_text: "q".to_string(),
            option_a: Some("1".to_string()),
            option_b: Some("2".to_string()),
            option_c: Some("3".to_string()),
            option_d: Some("4".to_string()),
            correct_answer: correct.to_string(),
            marks,
            position: 0,
            created_at: Utc::now(),
        }
    }

    fn answer(q: &ExamQuestion, code: &str) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: q.id,
            selected_answer: Some(code.to_string()),
        }
    }

    #[test]
    fn three_of_five_correct_is_sixty_percent() {
        let questions: Vec<_> = ["A", "B", "C", "D", "A"]
            .iter()
            .map(|c| question(c, 1))
            .collect();
        let answers = vec![
            answer(&questions[0], "A"),
            answer(&questions[1], "B"),
            answer(&questions[2], "C"),
            answer(&questions[3], "A"),
            answer(&questions[4], "B"),
        ];
        let summary = GradingService::grade(&questions, &answers, 0.0);
        assert_eq!(summary.obtained_marks, 3.0);
        assert_eq!(summary.total_marks, 5.0);
        assert_eq!(summary.percentage, 60.0);
        assert_eq!(summary.correct_count, 3);
        assert_eq!(summary.incorrect_count, 2);
        assert_eq!(summary.unanswered_count, 0);
    }

    #[test]
    fn negative_marking_deducts_quarter_point() {
        let questions: Vec<_> = ["A", "B", "C"].iter().map(|c| question(c, 1)).collect();
        let answers = vec![
            answer(&questions[0], "A"),
            answer(&questions[1], "B"),
            answer(&questions[2], "D"),
        ];
        let summary = GradingService::grade(&questions, &answers, 0.25);
        assert_eq!(summary.obtained_marks, 1.75);
        assert_eq!(summary.correct_count, 2);
        assert_eq!(summary.incorrect_count, 1);
    }

    #[test]
    fn zero_total_marks_yields_zero_percentage() {
        let questions: Vec<ExamQuestion> = Vec::new();
        let summary = GradingService::grade(&questions, &[], 0.0);
        assert_eq!(summary.percentage, 0.0);
        assert_eq!(summary.total_marks, 0.0);
    }

    #[test]
    fn unanswered_questions_count_and_contribute_nothing() {
        let questions: Vec<_> = ["A", "B"].iter().map(|c| question(c, 2)).collect();
        let answers = vec![answer(&questions[0], "a")]; // lowercase normalizes
        let summary = GradingService::grade(&questions, &answers, 0.5);
        assert_eq!(summary.obtained_marks, 2.0);
        assert_eq!(summary.unanswered_count, 1);
        assert_eq!(summary.incorrect_count, 0);
    }

    #[test]
    fn all_wrong_with_negative_marking_floors_at_zero() {
        let questions: Vec<_> = ["A", "B"].iter().map(|c| question(c, 1)).collect();
        let answers = vec![answer(&questions[0], "C"), answer(&questions[1], "C")];
        let summary = GradingService::grade(&questions, &answers, 2.0);
        assert_eq!(summary.obtained_marks, 0.0);
        assert_eq!(summary.percentage, 0.0);
    }

    #[test]
    fn empty_answer_string_is_unanswered() {
        let questions = vec![question("A", 1)];
        let answers = vec![SubmittedAnswer {
            question_id: questions[0].id,
            selected_answer: Some("  ".to_string()),
        }];
        let summary = GradingService::grade(&questions, &answers, 0.25);
        assert_eq!(summary.unanswered_count, 1);
        assert_eq!(summary.obtained_marks, 0.0);
    }
}
