//! Source map (revision 3) emission.

use serde::{Deserialize, Serialize};

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A source map document for a single generated file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        // Serializing plain strings and integers cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Single-source map builder. Mappings must be added in generated order.
#[derive(Debug)]
pub struct SourceMapBuilder {
    source: String,
    source_content: Option<String>,
    mappings: String,
    line: u32,
    first_in_line: bool,
    prev_gen_col: i64,
    prev_src_line: i64,
    prev_src_col: i64,
}

impl SourceMapBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_content: None,
            mappings: String::new(),
            line: 0,
            first_in_line: true,
            prev_gen_col: 0,
            prev_src_line: 0,
            prev_src_col: 0,
        }
    }

    pub fn source_content(mut self, content: impl Into<String>) -> Self {
        self.source_content = Some(content.into());
        self
    }

    /// Map generated `(gen_line, gen_col)` to original `(src_line, src_col)`.
    /// All positions are zero-based.
    pub fn add(&mut self, gen_line: u32, gen_col: u32, src_line: u32, src_col: u32) {
        while self.line < gen_line {
            self.mappings.push(';');
            self.line += 1;
            self.first_in_line = true;
            self.prev_gen_col = 0;
        }

        if !self.first_in_line {
            self.mappings.push(',');
        }
        self.first_in_line = false;

        encode_vlq(&mut self.mappings, i64::from(gen_col) - self.prev_gen_col);
        // Single source: index delta is always zero
        encode_vlq(&mut self.mappings, 0);
        encode_vlq(&mut self.mappings, i64::from(src_line) - self.prev_src_line);
        encode_vlq(&mut self.mappings, i64::from(src_col) - self.prev_src_col);

        self.prev_gen_col = i64::from(gen_col);
        self.prev_src_line = i64::from(src_line);
        self.prev_src_col = i64::from(src_col);
    }

    pub fn build(self) -> SourceMap {
        SourceMap {
            version: 3,
            file: None,
            sources: vec![self.source],
            sources_content: vec![self.source_content],
            names: Vec::new(),
            mappings: self.mappings,
        }
    }
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut s = String::new();
        encode_vlq(&mut s, value);
        s
    }

    #[test]
    fn test_vlq_encoding() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-17), "jB");
    }

    #[test]
    fn test_line_offset_mappings() {
        let mut builder = SourceMapBuilder::new("/app/a.js").source_content("a\nb\n");
        builder.add(1, 0, 0, 0);
        builder.add(2, 0, 1, 0);
        let map = builder.build();
        assert_eq!(map.mappings, ";AAAA;AACA");
        assert_eq!(map.sources, vec!["/app/a.js".to_string()]);
    }

    #[test]
    fn test_multiple_segments_in_line() {
        let mut builder = SourceMapBuilder::new("x.js");
        builder.add(0, 0, 0, 0);
        builder.add(0, 4, 0, 6);
        assert_eq!(builder.build().mappings, "AAAA,IAAM");
    }

    #[test]
    fn test_json_shape() {
        let mut builder = SourceMapBuilder::new("x.js").source_content("1");
        builder.add(0, 0, 0, 0);
        let json = builder.build().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["sourcesContent"][0], "1");
        assert_eq!(value["mappings"], "AAAA");
        assert!(value.get("file").is_none());
        assert_eq!(SourceMap::from_json(&json).unwrap().mappings, "AAAA");
    }
}
