use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 题目 ID（题库中的唯一标识）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u64);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    /// 选择题
    #[serde(rename = "MC")]
    MultipleChoice,
    /// 判断题
    #[serde(rename = "TF")]
    TrueFalse,
    /// 主观题（问答）
    #[serde(rename = "CL")]
    Classical,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::Classical,
    ];

    pub fn code(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "MC",
            QuestionType::TrueFalse => "TF",
            QuestionType::Classical => "CL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "MC" => Some(QuestionType::MultipleChoice),
            "TF" => Some(QuestionType::TrueFalse),
            "CL" => Some(QuestionType::Classical),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 难度等级（1-3）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Complexity {
    Easy = 1,
    Medium = 2,
    Hard = 3,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Complexity::Easy, Complexity::Medium, Complexity::Hard];

    pub fn tier(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Complexity::Easy => "easy",
            Complexity::Medium => "medium",
            Complexity::Hard => "hard",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for Complexity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Complexity::Easy),
            2 => Ok(Complexity::Medium),
            3 => Ok(Complexity::Hard),
            other => Err(format!("难度等级必须在 1-3 之间, 实际为 {}", other)),
        }
    }
}

impl From<Complexity> for u8 {
    fn from(value: Complexity) -> Self {
        value.tier()
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 选择题选项
///
/// 单字母键 → 选项文本，按键排序。只在入库边界构造一次，下游逻辑都假定是这个规范形式。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, String>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.0.insert(key.into(), text.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 所有条目（按键排序）
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 文本非空的有效选项（按键排序）
    pub fn valid(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, text)| !text.trim().is_empty())
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// 键对应的有效文本；文本为空视为不存在
    pub fn valid_text(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|text| !text.trim().is_empty())
    }

    /// 查找绑定到该文本的第一个键
    pub fn key_for_text(&self, text: &str) -> Option<&str> {
        self.iter().find(|(_, t)| *t == text).map(|(k, _)| k)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// 单题异常标记
///
/// 异常数据不会中断整批处理，而是逐题上报给调用方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionFlag {
    /// 入库时 Options 字段无法解析，已按空选项处理
    MalformedOptions,
    /// 正确答案无法对应到任何有效选项文本
    UnresolvedCorrectAnswer,
}

impl fmt::Display for QuestionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionFlag::MalformedOptions => f.write_str("选项字段无法解析"),
            QuestionFlag::UnresolvedCorrectAnswer => f.write_str("正确答案无法对应有效选项"),
        }
    }
}

/// 题目记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub course_code: String,
    pub topic_area: String,
    pub complexity: Complexity,
    pub question_type: QuestionType,
    /// 当前分值（组卷后为分配后的分值）
    pub score: f64,
    /// 出题时的原始分值；重新分配分值时以此为准
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_score: Option<f64>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Options::is_empty")]
    pub options: Options,
    #[serde(default)]
    pub correct_answer: String,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<QuestionFlag>,
}

impl Question {
    pub fn base(&self) -> f64 {
        self.base_score.unwrap_or(self.score)
    }

    pub fn is_multiple_choice(&self) -> bool {
        self.question_type == QuestionType::MultipleChoice
    }

    pub fn has_flag(&self, flag: QuestionFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn add_flag(&mut self, flag: QuestionFlag) {
        if !self.has_flag(flag) {
            self.flags.push(flag);
        }
    }

    /// 选择题的正确答案文本；非选择题或无法解析时为 None
    pub fn correct_option_text(&self) -> Option<&str> {
        if !self.is_multiple_choice() {
            return None;
        }
        self.options.valid_text(self.correct_answer.trim())
    }
}
