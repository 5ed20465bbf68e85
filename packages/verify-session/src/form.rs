use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Email,
    Number,
    Textarea,
    Select,
    Checkbox,
    Radio,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Read-only view of `GET /forms/{formId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Many(Vec<String>),
}

impl AnswerValue {
    fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Many(values) => values.iter().all(|v| v.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub value: AnswerValue,
}

impl Answer {
    pub fn text(question_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            value: AnswerValue::Text(value.into()),
        }
    }

    pub fn many<I, S>(question_id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question_id: question_id.into(),
            value: AnswerValue::Many(values.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerProblem {
    Missing,
    UnknownQuestion,
    Duplicate,
    InvalidEmail,
    InvalidNumber,
    NotAnOption(String),
    WrongShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerIssue {
    pub question_id: String,
    pub problem: AnswerProblem,
}

impl fmt::Display for AnswerIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.question_id;
        match &self.problem {
            AnswerProblem::Missing => write!(f, "question {id} is required"),
            AnswerProblem::UnknownQuestion => write!(f, "question {id} is not part of this form"),
            AnswerProblem::Duplicate => write!(f, "question {id} was answered more than once"),
            AnswerProblem::InvalidEmail => write!(f, "question {id} needs a valid email address"),
            AnswerProblem::InvalidNumber => write!(f, "question {id} needs a number"),
            AnswerProblem::NotAnOption(value) => write!(f, "\"{value}\" is not an option for question {id}"),
            AnswerProblem::WrongShape => write!(f, "question {id} has the wrong kind of answer"),
        }
    }
}

impl FormDefinition {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Checks answers the way the form page would before letting a submit
    /// through. Blank optional answers are fine.
    pub fn validate_answers(&self, answers: &[Answer]) -> Result<(), Vec<AnswerIssue>> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for answer in answers {
            let issue = |problem| AnswerIssue {
                question_id: answer.question_id.clone(),
                problem,
            };

            if !seen.insert(answer.question_id.as_str()) {
                issues.push(issue(AnswerProblem::Duplicate));
                continue;
            }

            let Some(question) = self.question(&answer.question_id) else {
                issues.push(issue(AnswerProblem::UnknownQuestion));
                continue;
            };

            if answer.value.is_blank() {
                continue;
            }

            if let Some(problem) = check_value(question, &answer.value) {
                issues.push(issue(problem));
            }
        }

        for question in self.questions.iter().filter(|q| q.required) {
            let answered = answers
                .iter()
                .any(|a| a.question_id == question.id && !a.value.is_blank());
            if !answered {
                issues.push(AnswerIssue {
                    question_id: question.id.clone(),
                    problem: AnswerProblem::Missing,
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn check_value(question: &Question, value: &AnswerValue) -> Option<AnswerProblem> {
    match (question.kind, value) {
        (QuestionType::Email, AnswerValue::Text(text)) => {
            (!looks_like_email(text)).then_some(AnswerProblem::InvalidEmail)
        }
        (QuestionType::Number, AnswerValue::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_or(Some(AnswerProblem::InvalidNumber), |n| {
                (!n.is_finite()).then_some(AnswerProblem::InvalidNumber)
            }),
        (QuestionType::Text | QuestionType::Textarea | QuestionType::File, AnswerValue::Text(_)) => None,
        (QuestionType::Select | QuestionType::Radio, AnswerValue::Text(text)) => {
            first_unknown_option(question, std::iter::once(text))
        }
        (QuestionType::Checkbox, AnswerValue::Many(values)) => {
            first_unknown_option(question, values.iter().filter(|v| !v.trim().is_empty()))
        }
        (QuestionType::Checkbox, AnswerValue::Text(text)) => {
            first_unknown_option(question, std::iter::once(text))
        }
        _ => Some(AnswerProblem::WrongShape),
    }
}

fn first_unknown_option<'a>(
    question: &Question,
    mut values: impl Iterator<Item = &'a String>,
) -> Option<AnswerProblem> {
    values
        .find(|v| !question.options.iter().any(|o| o == *v))
        .map(|v| AnswerProblem::NotAnOption(v.clone()))
}

fn looks_like_email(text: &str) -> bool {
    let text = text.trim();
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !text.contains(char::is_whitespace)
}
