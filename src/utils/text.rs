//! 模型回复的文本清理

use regex::Regex;

const OPENING_FENCE: &str = r"(?i)^```(?:xml|musicxml|mei|abc|humdrum|krn)?\s*\n?";
const CLOSING_FENCE: &str = r"\n?```\s*$";

/// 去掉包在回复外层的 markdown 代码块标记
///
/// 只处理开头一个、结尾一个，内容中间的 ``` 保持不变
pub fn clean_code_blocks(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in [OPENING_FENCE, CLOSING_FENCE] {
        if let Ok(re) = Regex::new(pattern) {
            cleaned = re.replace(&cleaned, "").into_owned();
        }
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fences() {
        assert_eq!(clean_code_blocks("```xml\n<note/>\n```"), "<note/>");
        assert_eq!(clean_code_blocks("```MusicXML\n<score/>\n```  "), "<score/>");
        assert_eq!(clean_code_blocks("```\nX:1\nK:C\n```"), "X:1\nK:C");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(clean_code_blocks("<score/>"), "<score/>");
        assert_eq!(clean_code_blocks(""), "");
    }
}
