//! 入库边界
//!
//! 持久化数据里的 Options 可能是 JSON 字符串、结构化表、旧版 "A) 文本" 行格式，
//! 也可能缺失或类型错误。这里统一规范化为 [`Options`]，下游不再关心原始形态。

use crate::error::PoolError;
use crate::models::question::{Complexity, Options, Question, QuestionFlag, QuestionId, QuestionType};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// 未经规范化的原始选项
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawOptions {
    #[default]
    Missing,
    Structured(BTreeMap<String, String>),
    /// 字段存在但无法解析（记录原因）
    Unreadable(String),
}

/// 原始题目记录（字段名兼容旧版导出的 PascalCase）
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestion {
    #[serde(alias = "QuestionID")]
    pub id: u64,
    #[serde(alias = "CourseCode")]
    pub course_code: String,
    #[serde(alias = "TopicArea", default)]
    pub topic_area: String,
    #[serde(alias = "Complexity")]
    pub complexity: u8,
    #[serde(alias = "QuestionType")]
    pub question_type: String,
    #[serde(alias = "Score")]
    pub score: f64,
    #[serde(alias = "QuestionText")]
    pub text: String,
    #[serde(alias = "Options", default, deserialize_with = "deserialize_options")]
    pub options: RawOptions,
    #[serde(alias = "CorrectAnswer", default)]
    pub correct_answer: Option<String>,
    #[serde(alias = "CreatedBy", default)]
    pub created_by: String,
}

impl RawQuestion {
    /// 规范化为 [`Question`]
    ///
    /// 题型或难度非法时返回错误；选项字段异常只打标记，不会失败。
    pub fn normalize(self) -> Result<Question, PoolError> {
        let id = QuestionId(self.id);
        let question_type =
            QuestionType::from_code(&self.question_type).ok_or_else(|| PoolError::InvalidRecord {
                id,
                reason: format!("未知题型: {}", self.question_type),
            })?;
        let complexity = Complexity::try_from(self.complexity)
            .map_err(|reason| PoolError::InvalidRecord { id, reason })?;

        let mut flags = Vec::new();
        let mut correct_answer = self.correct_answer.unwrap_or_default().trim().to_string();

        let options = if question_type == QuestionType::MultipleChoice {
            match self.options {
                RawOptions::Structured(map) => map.into_iter().collect::<Options>(),
                RawOptions::Missing => Options::new(),
                RawOptions::Unreadable(reason) => {
                    warn!("题目 {} 的选项无法解析，按空选项处理: {}", id, reason);
                    flags.push(QuestionFlag::MalformedOptions);
                    Options::new()
                }
            }
        } else {
            Options::new()
        };

        // 旧版表格模板把正确答案写成选项文本，这里换回对应的键
        if question_type == QuestionType::MultipleChoice && options.get(&correct_answer).is_none() {
            if let Some(key) = options.key_for_text(&correct_answer) {
                debug!("题目 {} 的正确答案为选项文本，已换为键 {}", id, key);
                correct_answer = key.to_string();
            }
        }

        Ok(Question {
            id,
            course_code: self.course_code.trim().to_string(),
            topic_area: self.topic_area.trim().to_string(),
            complexity,
            question_type,
            score: self.score,
            base_score: None,
            text: self.text,
            options,
            correct_answer,
            created_by: self.created_by,
            flags,
        })
    }
}

/// 解析字符串形式的选项：先按 JSON 对象，再按 "A) 文本" 行格式
pub fn parse_encoded_options(encoded: &str) -> RawOptions {
    let trimmed = encoded.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return RawOptions::Missing;
    }

    if trimmed.starts_with('{') {
        return match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(trimmed) {
            Ok(map) => structured_from_json(map),
            Err(e) => RawOptions::Unreadable(format!("JSON 解析失败: {}", e)),
        };
    }

    parse_option_lines(trimmed)
}

fn option_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z])\s*[\)\.:]\s*(.*?)\s*$").ok())
        .as_ref()
}

fn parse_option_lines(text: &str) -> RawOptions {
    let Some(re) = option_line_regex() else {
        return RawOptions::Unreadable("选项行正则表达式无效".to_string());
    };
    let mut map = BTreeMap::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match re.captures(line) {
            Some(caps) => {
                map.insert(caps[1].to_ascii_uppercase(), caps[2].to_string());
            }
            None => {
                return RawOptions::Unreadable(format!("无法识别的选项行: {}", line.trim()));
            }
        }
    }

    RawOptions::Structured(map)
}

fn structured_from_json(map: BTreeMap<String, serde_json::Value>) -> RawOptions {
    let mut out = BTreeMap::new();
    for (key, value) in map {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => {
                return RawOptions::Unreadable(format!("选项 {} 的值类型不支持: {}", key, other));
            }
        };
        out.insert(key.trim().to_ascii_uppercase(), text);
    }
    RawOptions::Structured(out)
}

// Options 字段既可能是字符串也可能是表
fn deserialize_options<'de, D>(deserializer: D) -> Result<RawOptions, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{IgnoredAny, MapAccess, SeqAccess, Visitor};
    use std::fmt;

    struct OptionsVisitor;

    impl<'de> Visitor<'de> for OptionsVisitor {
        type Value = RawOptions;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an options map or an encoded options string")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(parse_encoded_options(value))
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                map.insert(key, value);
            }
            Ok(structured_from_json(map))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(RawOptions::Missing)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(RawOptions::Missing)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(RawOptions::Unreadable(format!("布尔值: {}", value)))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(RawOptions::Unreadable(format!("整数: {}", value)))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(RawOptions::Unreadable(format!("整数: {}", value)))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(RawOptions::Unreadable(format!("浮点数: {}", value)))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(RawOptions::Unreadable("数组".to_string()))
        }
    }

    deserializer.deserialize_any(OptionsVisitor)
}
