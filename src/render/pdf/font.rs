//! 内嵌字体（DejaVu Sans）
//!
//! 以 Type0 / CIDFontType2 方式整体嵌入，文本按字形编号（Identity-H）写出，
//! 并附带 ToUnicode 映射，土耳其语等非 Latin-1 字符可以正常显示和复制。

use crate::error::RenderError;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use ttf_parser::{Face, GlyphId};

const REGULAR: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");
const BOLD: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans-Bold.ttf");

/// ToUnicode 中每个 bfchar 段最多 100 条
const BFCHAR_CHUNK: usize = 100;

/// 已用字形 → 对应字符
pub(crate) type GlyphMap = BTreeMap<u16, char>;

pub(crate) struct FontFace {
    name: &'static str,
    data: &'static [u8],
    face: Face<'static>,
    /// 字体单位 → 千分之一 em
    scale: f64,
    /// 缺字时使用 '?' 的字形
    fallback: u16,
    stem_v: u16,
}

impl FontFace {
    pub fn regular() -> Result<Self, RenderError> {
        Self::parse("DejaVuSans", REGULAR, 80)
    }

    pub fn bold() -> Result<Self, RenderError> {
        Self::parse("DejaVuSans-Bold", BOLD, 140)
    }

    fn parse(name: &'static str, data: &'static [u8], stem_v: u16) -> Result<Self, RenderError> {
        let face = Face::parse(data, 0)
            .map_err(|e| RenderError::Pdf(format!("字体 {} 解析失败: {}", name, e)))?;
        let scale = 1000.0 / f64::from(face.units_per_em());
        let fallback = face.glyph_index('?').map(|g| g.0).unwrap_or(0);
        Ok(Self {
            name,
            data,
            face,
            scale,
            fallback,
            stem_v,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn data(&self) -> &'static [u8] {
        self.data
    }

    /// 字符对应的字形；字体中没有的字符写成 '?'
    pub fn glyph(&self, c: char) -> (u16, char) {
        let c = if c.is_control() { ' ' } else { c };
        match self.face.glyph_index(c) {
            Some(id) => (id.0, c),
            None => (self.fallback, '?'),
        }
    }

    /// 字形宽度（千分之一 em）
    pub fn advance(&self, glyph: u16) -> f64 {
        self.face
            .glyph_hor_advance(GlyphId(glyph))
            .map(|a| f64::from(a) * self.scale)
            .unwrap_or(0.0)
    }

    /// 文本宽度（千分之一 em）
    pub fn text_units(&self, text: &str) -> f64 {
        text.chars().map(|c| self.advance(self.glyph(c).0)).sum()
    }

    /// 把文本编码为十六进制字形串，同时记录用到的字形
    pub fn encode(&self, text: &str, used: &mut GlyphMap) -> String {
        let mut hex = String::with_capacity(text.len() * 4);
        for c in text.chars() {
            let (glyph, mapped) = self.glyph(c);
            used.entry(glyph).or_insert(mapped);
            let _ = write!(hex, "{:04X}", glyph);
        }
        hex
    }

    fn scaled(&self, units: i16) -> i64 {
        (f64::from(units) * self.scale).round() as i64
    }

    pub fn descriptor(&self, font_file: usize) -> String {
        let bbox = self.face.global_bounding_box();
        let cap_height = self.face.capital_height().unwrap_or(self.face.ascender());
        format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags 32 /FontBBox [{} {} {} {}] \
             /ItalicAngle 0 /Ascent {} /Descent {} /CapHeight {} /StemV {} /FontFile2 {} 0 R >>",
            self.name,
            self.scaled(bbox.x_min),
            self.scaled(bbox.y_min),
            self.scaled(bbox.x_max),
            self.scaled(bbox.y_max),
            self.scaled(self.face.ascender()),
            self.scaled(self.face.descender()),
            self.scaled(cap_height),
            self.stem_v,
            font_file
        )
    }

    /// CIDFont 的 /W 数组
    pub fn widths(&self, used: &GlyphMap) -> String {
        let mut out = String::from("[");
        for glyph in used.keys() {
            let _ = write!(out, " {} [{:.0}]", glyph, self.advance(*glyph));
        }
        out.push_str(" ]");
        out
    }
}

/// ToUnicode CMap；`resource` 写进 CMapName，便于回读时对应字体
pub(crate) fn to_unicode_cmap(resource: &str, used: &GlyphMap) -> String {
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    let _ = writeln!(out, "/CMapName /{}-UCS def", resource);
    out.push_str("/CMapType 2 def\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let entries: Vec<(&u16, &char)> = used.iter().collect();
    for chunk in entries.chunks(BFCHAR_CHUNK) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for (glyph, c) in chunk {
            let mut units = [0u16; 2];
            let hex: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(out, "<{:04X}> <{}>", glyph, hex);
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turkish_letters_have_glyphs() {
        let font = FontFace::regular().unwrap();
        for c in "ğĞşŞıİçÇöÖüÜ○".chars() {
            let (glyph, mapped) = font.glyph(c);
            assert_ne!(glyph, 0, "{}", c);
            assert_eq!(mapped, c);
        }
    }

    #[test]
    fn missing_glyph_falls_back_to_question_mark() {
        let font = FontFace::regular().unwrap();
        assert_eq!(font.glyph('中'), font.glyph('?'));
    }

    #[test]
    fn bold_is_wider_than_regular() {
        let regular = FontFace::regular().unwrap();
        let bold = FontFace::bold().unwrap();
        assert!(bold.text_units("Sınav") > regular.text_units("Sınav"));
        assert!(regular.text_units("WWW") > regular.text_units("iii"));
    }

    #[test]
    fn cmap_lists_used_glyphs() {
        let font = FontFace::regular().unwrap();
        let mut used = GlyphMap::new();
        let hex = font.encode("ağ", &mut used);
        assert_eq!(hex.len(), 8);
        let cmap = to_unicode_cmap("F1", &used);
        assert!(cmap.contains("/CMapName /F1-UCS def"));
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains(&format!("<{:04X}> <011F>", font.glyph('ğ').0)));
    }
}
