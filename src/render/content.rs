//! 文档内容约定
//!
//! PDF 和 Word 两种渲染器共用的内容规划：页眉、身份信息栏、题目标题、
//! 作答区域（选项 / 判断 / 空行）以及答案行。各渲染器只负责排版。

use crate::error::RenderError;
use crate::models::question::{Question, QuestionFlag, QuestionId, QuestionType};
use crate::services::booklet::{BookletGroup, BookletVariant, FlaggedQuestion};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ANSWER_KEY_SUFFIX: &str = " - ANSWER KEY";
pub const CORRECT_ANSWER_LABEL: &str = "CORRECT ANSWER:";
pub const TRUE_AFFORDANCE: &str = "○ True";
pub const FALSE_AFFORDANCE: &str = "○ False";
pub const IDENTIFICATION_FIELDS: [&str; 4] = ["Name Surname:", "Student ID:", "Department:", "Signature:"];

/// 问答题空行数（1-15，默认 5）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ClassicalLines(u8);

impl ClassicalLines {
    pub fn new(lines: u8) -> Result<Self, RenderError> {
        if (1..=15).contains(&lines) {
            Ok(Self(lines))
        } else {
            Err(RenderError::InvalidClassicalLines(lines))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ClassicalLines {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u8> for ClassicalLines {
    type Error = RenderError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClassicalLines> for u8 {
    fn from(value: ClassicalLines) -> Self {
        value.0
    }
}

/// 渲染选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub classical_lines: ClassicalLines,
}

/// 文档类型：试卷 / 参考答案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Exam,
    AnswerKey,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Exam, DocumentKind::AnswerKey];

    /// 打包文件名中的类型段
    pub fn artifact_name(self) -> &'static str {
        match self {
            DocumentKind::Exam => "exam",
            DocumentKind::AnswerKey => "answer_key",
        }
    }

    pub fn is_answer_key(self) -> bool {
        self == DocumentKind::AnswerKey
    }
}

/// 文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// 分页打印格式
    Pdf,
    /// 流式文字处理格式
    Docx,
}

impl DocumentFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 文档页眉信息
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    pub title: String,
    pub course_code: String,
    pub group: BookletGroup,
    pub generated_on: NaiveDate,
}

/// 页眉规划
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBlock {
    pub title_line: String,
    pub meta_line: String,
    /// 试卷才有身份信息栏
    pub identification: bool,
    /// 试卷才有 "BOOKLET TYPE: X"
    pub booklet_marker: Option<String>,
}

pub fn plan_header(meta: &DocumentMeta, kind: DocumentKind) -> HeaderBlock {
    let suffix = if kind.is_answer_key() { ANSWER_KEY_SUFFIX } else { "" };
    HeaderBlock {
        title_line: format!("{}{}", meta.title, suffix),
        meta_line: format!(
            "Course: {} | Booklet: {} | Date: {}",
            meta.course_code,
            meta.group,
            meta.generated_on.format("%d.%m.%Y")
        ),
        identification: !kind.is_answer_key(),
        booklet_marker: (!kind.is_answer_key()).then(|| format!("BOOKLET TYPE: {}", meta.group)),
    }
}

/// 作答区域
#[derive(Debug, Clone, PartialEq)]
pub enum Affordance {
    /// 选择题选项（按键排序，仅有效选项）
    Options(Vec<(String, String)>),
    TrueFalse,
    /// 问答题空行
    AnswerLines(u8),
    /// 参考答案中没有作答区域
    None,
}

/// 单题规划
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBlock {
    pub number: usize,
    pub question_id: QuestionId,
    pub heading: String,
    pub score: f64,
    pub correct_answer: Option<String>,
    pub affordance: Affordance,
    pub flags: Vec<QuestionFlag>,
}

impl QuestionBlock {
    pub fn answer_lines(&self) -> u8 {
        match self.affordance {
            Affordance::AnswerLines(n) => n,
            _ => 0,
        }
    }

    /// 本题在文档中必须出现的文字（按输出顺序）
    pub fn text_fragments(&self) -> Vec<String> {
        let mut fragments = vec![self.heading.clone()];
        if let Some(answer) = &self.correct_answer {
            fragments.push(format!("{} {}", CORRECT_ANSWER_LABEL, answer));
        }
        match &self.affordance {
            Affordance::Options(options) => {
                for (key, text) in options {
                    fragments.push(format!("{})", key));
                    fragments.push(text.clone());
                }
            }
            Affordance::TrueFalse => {
                fragments.push(TRUE_AFFORDANCE.to_string());
                fragments.push(FALSE_AFFORDANCE.to_string());
            }
            Affordance::AnswerLines(_) | Affordance::None => {}
        }
        fragments
    }
}

pub fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

/// 规划一道题
///
/// 选项缺失或正确答案对应不上时照常输出（空选项兜底），只记录标记。
pub fn plan_question(
    number: usize,
    question: &Question,
    kind: DocumentKind,
    options: &RenderOptions,
) -> QuestionBlock {
    let mut flags = question.flags.clone();
    let mut push_flag = |flag: QuestionFlag| {
        if !flags.contains(&flag) {
            flags.push(flag);
        }
    };

    if question.is_multiple_choice() {
        if question.options.valid_count() == 0 {
            push_flag(QuestionFlag::MalformedOptions);
        }
        if question.correct_option_text().is_none() {
            push_flag(QuestionFlag::UnresolvedCorrectAnswer);
        }
    }

    let (heading, correct_answer, affordance) = if kind.is_answer_key() {
        let answer = question.correct_answer.trim();
        let answer = if answer.is_empty() { "-" } else { answer };
        (
            format!("{}. {}", number, question.text),
            Some(answer.to_string()),
            Affordance::None,
        )
    } else {
        let affordance = match question.question_type {
            QuestionType::MultipleChoice => Affordance::Options(
                question
                    .options
                    .valid()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            QuestionType::TrueFalse => Affordance::TrueFalse,
            QuestionType::Classical => Affordance::AnswerLines(options.classical_lines.get()),
        };
        (
            format!(
                "{}. {} ({} pts)",
                number,
                question.text,
                format_score(question.score)
            ),
            None,
            affordance,
        )
    };

    QuestionBlock {
        number,
        question_id: question.id,
        heading,
        score: question.score,
        correct_answer,
        affordance,
        flags,
    }
}

/// 为整个分组规划所有题目（编号从 1 开始）
pub fn plan_questions(
    variant: &BookletVariant,
    kind: DocumentKind,
    options: &RenderOptions,
) -> Vec<QuestionBlock> {
    variant
        .questions
        .iter()
        .enumerate()
        .map(|(idx, q)| plan_question(idx + 1, q, kind, options))
        .collect()
}

/// 已输出的题目（用于跨格式一致性核对）
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuestion {
    pub number: usize,
    pub question_id: QuestionId,
    pub score: f64,
    pub answer_lines: u8,
    pub fragments: Vec<String>,
}

impl From<&QuestionBlock> for RenderedQuestion {
    fn from(block: &QuestionBlock) -> Self {
        Self {
            number: block.number,
            question_id: block.question_id,
            score: block.score,
            answer_lines: block.answer_lines(),
            fragments: block.text_fragments(),
        }
    }
}

/// 核对从文档字节中读回的文字
///
/// 每道题的文字必须按顺序出现；空白和折行忽略不计。
/// 读回的 '?' 可以匹配任意字符（字体缺字）。
pub fn verify_rendered_text(questions: &[RenderedQuestion], runs: &[String]) -> Result<(), String> {
    let haystack: Vec<char> = runs
        .iter()
        .flat_map(|run| run.chars())
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut pos = 0;
    for question in questions {
        for fragment in &question.fragments {
            let needle: Vec<char> = fragment.chars().filter(|c| !c.is_whitespace()).collect();
            match find_from(&haystack, &needle, pos) {
                Some(end) => pos = end,
                None => {
                    return Err(format!(
                        "第 {} 题缺少或顺序错误: \"{}\"",
                        question.number, fragment
                    ))
                }
            }
        }
    }
    Ok(())
}

/// 返回匹配结束的位置
fn find_from(haystack: &[char], needle: &[char], start: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(start);
    }
    let last = haystack.len().checked_sub(needle.len())?;
    (start..=last)
        .find(|&i| {
            haystack[i..i + needle.len()]
                .iter()
                .zip(needle)
                .all(|(h, n)| h == n || *h == '?')
        })
        .map(|i| i + needle.len())
}

/// 渲染结果
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub format: DocumentFormat,
    pub kind: DocumentKind,
    pub group: BookletGroup,
    pub bytes: Vec<u8>,
    pub questions: Vec<RenderedQuestion>,
    pub flags: Vec<FlaggedQuestion>,
}

impl RenderedDocument {
    /// `{类型}_{分组}_{课程}.{扩展名}`
    pub fn file_name(&self, course_code: &str) -> String {
        artifact_file_name(self.kind, self.group, course_code, self.format)
    }
}

pub fn artifact_file_name(
    kind: DocumentKind,
    group: BookletGroup,
    course_code: &str,
    format: DocumentFormat,
) -> String {
    format!(
        "{}_{}_{}.{}",
        kind.artifact_name(),
        group,
        safe_file_segment(course_code),
        format.extension()
    )
}

/// 文件名片段只保留 `[A-Za-z0-9_-]`，其余字符替换为 `_`
pub fn safe_file_segment(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn block_flags(blocks: &[QuestionBlock]) -> Vec<FlaggedQuestion> {
    blocks
        .iter()
        .flat_map(|b| {
            b.flags.iter().map(move |flag| FlaggedQuestion {
                position: b.number,
                question_id: b.question_id,
                flag: *flag,
            })
        })
        .collect()
}

/// 文档渲染器
pub trait DocumentRenderer {
    fn format(&self) -> DocumentFormat;

    fn render(
        &self,
        variant: &BookletVariant,
        meta: &DocumentMeta,
        kind: DocumentKind,
    ) -> Result<RenderedDocument, RenderError>;
}
