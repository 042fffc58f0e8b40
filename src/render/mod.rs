//! 文档渲染层
//!
//! 同一个分组可以输出为 PDF 或 Word；两种格式共用 [`content`] 中的内容规划，
//! 题目、分值、作答区域和答案保持一致。

pub mod content;
pub mod docx;
pub mod pdf;

pub use content::{
    artifact_file_name, safe_file_segment, verify_rendered_text, ClassicalLines, DocumentFormat,
    DocumentKind, DocumentMeta, DocumentRenderer, RenderOptions, RenderedDocument,
    RenderedQuestion,
};
pub use docx::DocxRenderer;
pub use pdf::PdfRenderer;

use crate::error::RenderError;

/// 从文档字节中读回正文文字
pub fn extract_text(format: DocumentFormat, bytes: &[u8]) -> Result<Vec<String>, RenderError> {
    match format {
        DocumentFormat::Pdf => pdf::extract_text(bytes),
        DocumentFormat::Docx => docx::extract_text(bytes),
    }
}

/// 两种格式的渲染器
pub fn renderers(options: RenderOptions) -> Vec<Box<dyn DocumentRenderer + Send + Sync>> {
    vec![
        Box::new(PdfRenderer::new(options)),
        Box::new(DocxRenderer::new(options)),
    ]
}
