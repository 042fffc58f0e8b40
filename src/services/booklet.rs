//! 试卷分组服务 - 业务能力层
//!
//! 同一份定稿题目生成多个分组（A、B、C…）：
//! - A 组：原顺序、原选项，作为参考答案的基准
//! - 其他组：打乱题目顺序；选择题的有效选项文本重新洗牌并按 A、B、C… 重新编号，
//!   正确答案跟随原来的选项文本走
//!
//! 正确答案对应不到有效文本时（历史脏数据），保持原值不动并打上标记。

use crate::error::BookletError;
use crate::models::question::{Question, QuestionFlag, QuestionId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// 分组标签（单个大写字母）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookletGroup(char);

impl BookletGroup {
    /// 参考分组 A
    pub const CANONICAL: BookletGroup = BookletGroup('A');

    pub fn new(label: char) -> Result<Self, BookletError> {
        if label.is_ascii_uppercase() {
            Ok(Self(label))
        } else {
            Err(BookletError::InvalidGroup(label.to_string()))
        }
    }

    /// 前 `count` 个分组：A, B, C…
    pub fn first(count: usize) -> Result<Vec<Self>, BookletError> {
        if !(1..=26).contains(&count) {
            return Err(BookletError::GroupCount(count));
        }
        Ok((b'A'..).take(count).map(|b| Self(b as char)).collect())
    }

    pub fn label(self) -> char {
        self.0
    }

    pub fn is_canonical(self) -> bool {
        self == Self::CANONICAL
    }
}

impl fmt::Display for BookletGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookletGroup {
    type Err = BookletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c.to_ascii_uppercase()),
            _ => Err(BookletError::InvalidGroup(s.to_string())),
        }
    }
}

impl TryFrom<String> for BookletGroup {
    type Error = BookletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookletGroup> for String {
    fn from(value: BookletGroup) -> Self {
        value.0.to_string()
    }
}

/// 单题异常（题目在本分组中的位置从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlaggedQuestion {
    pub position: usize,
    pub question_id: QuestionId,
    pub flag: QuestionFlag,
}

/// 试卷分组（不持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct BookletVariant {
    pub group: BookletGroup,
    pub questions: Vec<Question>,
    pub flags: Vec<FlaggedQuestion>,
}

/// 生成一个分组
///
/// 输入不会被修改，每次都返回新的拷贝。
pub fn generate_variant<R: Rng + ?Sized>(
    scored: &[Question],
    group: BookletGroup,
    rng: &mut R,
) -> BookletVariant {
    let mut questions = scored.to_vec();

    if !group.is_canonical() {
        questions.shuffle(rng);
        for question in questions.iter_mut().filter(|q| q.is_multiple_choice()) {
            relabel_options(question, rng);
        }
    }

    let flags = collect_flags(&questions);
    for flagged in &flags {
        warn!(
            "⚠️ 分组 {} 第 {} 题 ({}): {}",
            group, flagged.position, flagged.question_id, flagged.flag
        );
    }

    BookletVariant {
        group,
        questions,
        flags,
    }
}

/// 打乱选择题的有效选项并重新编号
///
/// 返回正确答案是否仍能对应到原文本。
pub fn relabel_options<R: Rng + ?Sized>(question: &mut Question, rng: &mut R) -> bool {
    let correct_text = question.correct_option_text().map(str::to_string);

    let mut texts: Vec<String> = question
        .options
        .valid()
        .map(|(_, text)| text.to_string())
        .collect();
    texts.shuffle(rng);

    question.options = (b'A'..)
        .map(|b| (b as char).to_string())
        .zip(texts)
        .collect();

    match correct_text {
        Some(text) => {
            if let Some(key) = question.options.key_for_text(&text) {
                debug!("题目 {} 正确答案 {} → {}", question.id, question.correct_answer, key);
                question.correct_answer = key.to_string();
            }
            true
        }
        None => {
            question.add_flag(QuestionFlag::UnresolvedCorrectAnswer);
            false
        }
    }
}

fn collect_flags(questions: &[Question]) -> Vec<FlaggedQuestion> {
    questions
        .iter()
        .enumerate()
        .flat_map(|(idx, question)| {
            let mut flags = question.flags.clone();
            if question.is_multiple_choice()
                && question.correct_option_text().is_none()
                && !flags.contains(&QuestionFlag::UnresolvedCorrectAnswer)
            {
                flags.push(QuestionFlag::UnresolvedCorrectAnswer);
            }
            flags.into_iter().map(move |flag| FlaggedQuestion {
                position: idx + 1,
                question_id: question.id,
                flag,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Complexity, Options, QuestionType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mc(id: u64, options: &[(&str, &str)], correct: &str) -> Question {
        Question {
            id: QuestionId(id),
            course_code: "GEO101".to_string(),
            topic_area: "Capitals".to_string(),
            complexity: Complexity::Easy,
            question_type: QuestionType::MultipleChoice,
            score: 10.0,
            base_score: None,
            text: format!("Question {}", id),
            options: options.iter().copied().collect::<Options>(),
            correct_answer: correct.to_string(),
            created_by: "ayse".to_string(),
            flags: Vec::new(),
        }
    }

    fn tf(id: u64) -> Question {
        Question {
            question_type: QuestionType::TrueFalse,
            options: Options::new(),
            correct_answer: "True".to_string(),
            ..mc(id, &[], "")
        }
    }

    #[test]
    fn group_labels() {
        let groups = BookletGroup::first(4).unwrap();
        assert_eq!(
            groups.iter().map(|g| g.to_string()).collect::<String>(),
            "ABCD"
        );
        assert_eq!("b".parse::<BookletGroup>().unwrap().label(), 'B');
        assert!("AB".parse::<BookletGroup>().is_err());
        assert_eq!(BookletGroup::first(0), Err(BookletError::GroupCount(0)));
    }

    #[test]
    fn canonical_group_is_unchanged() {
        let questions = vec![
            mc(1, &[("A", "Paris"), ("B", "Rome")], "A"),
            tf(2),
            mc(3, &[("A", "Oslo"), ("B", "Bern")], "B"),
        ];
        let mut rng = StdRng::seed_from_u64(9);
        let variant = generate_variant(&questions, BookletGroup::CANONICAL, &mut rng);
        assert_eq!(variant.questions, questions);
        assert!(variant.flags.is_empty());
    }

    #[test]
    fn relabel_keeps_semantic_answer() {
        let original = mc(1, &[("A", "Paris"), ("B", "Rome"), ("C", "Berlin")], "A");
        for seed in 0..32 {
            let mut q = original.clone();
            assert!(relabel_options(&mut q, &mut StdRng::seed_from_u64(seed)));
            assert_eq!(q.options.get(&q.correct_answer), Some("Paris"));
            assert_eq!(q.options.len(), 3);
        }
    }

    #[test]
    fn relabel_drops_empty_options_and_rekeys_contiguously() {
        let mut q = mc(1, &[("A", "Paris"), ("B", ""), ("D", "Rome")], "D");
        relabel_options(&mut q, &mut StdRng::seed_from_u64(4));
        let keys: Vec<_> = q.options.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(q.options.get(&q.correct_answer), Some("Rome"));
    }

    #[test]
    fn unresolved_answer_passes_through_and_is_flagged() {
        let mut q = mc(1, &[("A", "Paris"), ("B", ""), ("C", "Rome")], "B");
        assert!(!relabel_options(&mut q, &mut StdRng::seed_from_u64(2)));
        assert_eq!(q.correct_answer, "B");
        assert!(q.has_flag(QuestionFlag::UnresolvedCorrectAnswer));
    }

    #[test]
    fn shuffled_group_reports_flags_by_position() {
        let questions = vec![
            mc(1, &[("A", "Paris"), ("B", "Rome")], "Z"),
            tf(2),
        ];
        let variant = generate_variant(&questions, BookletGroup::new('B').unwrap(), &mut StdRng::seed_from_u64(1));
        assert_eq!(variant.flags.len(), 1);
        let flagged = variant.flags[0];
        assert_eq!(flagged.question_id, QuestionId(1));
        assert_eq!(variant.questions[flagged.position - 1].id, QuestionId(1));
    }

    #[test]
    fn same_seed_same_variant() {
        let questions: Vec<_> = (1..=10)
            .map(|i| mc(i, &[("A", "w"), ("B", "x"), ("C", "y"), ("D", "z")], "C"))
            .collect();
        let group = BookletGroup::new('C').unwrap();
        let a = generate_variant(&questions, group, &mut StdRng::seed_from_u64(77));
        let b = generate_variant(&questions, group, &mut StdRng::seed_from_u64(77));
        assert_eq!(a, b);
        // 原始输入没有被修改
        assert_eq!(questions[0].correct_answer, "C");
    }
}
