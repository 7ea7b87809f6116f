//! 提示词组装 - 业务能力层
//!
//! 只负责"把各个段落拼成一份提示词"，不读文件、不调模型。
//!
//! - `assemble`：纯函数，总会成功，便于调试时查看正文
//! - `build`：在 `assemble` 的基础上校验温度和 max_tokens，产出不可变的
//!   `CompiledPrompt`，这是模型调用前唯一的校验点

use crate::error::ValidationError;
use crate::models::{CompiledPrompt, PromptRequest, SectionKey};

const SECTION_SEPARATOR: &str = "\n\n";

/// 提示词组装器
pub struct PromptAssembler<'a> {
    request: &'a PromptRequest,
}

impl<'a> PromptAssembler<'a> {
    pub fn new(request: &'a PromptRequest) -> Self {
        Self { request }
    }

    /// 组装用户正文
    ///
    /// 未指定顺序（或过滤后为空）时使用旧版固定顺序
    /// `[format_instructions, encoded_score, *guides, task_text]`，不加标题；
    /// 指定顺序时逐个解析段落，配置了标题的段落前加 `### <标题>`。
    /// 去掉首尾空白后为空的段落一律跳过。
    pub fn assemble(&self) -> String {
        match self.request.section_order.as_deref() {
            Some(order) if !order.is_empty() => self.assemble_ordered(order),
            _ => self.assemble_legacy(),
        }
    }

    fn assemble_legacy(&self) -> String {
        let req = self.request;
        let guides = req.normalized_guides();

        std::iter::once(req.format_instructions.as_str())
            .chain(std::iter::once(req.encoded_score.as_str()))
            .chain(guides)
            .chain(std::iter::once(req.task_text.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }

    fn assemble_ordered(&self, order: &[SectionKey]) -> String {
        let mut sections = Vec::new();

        for &key in order {
            let header = self
                .request
                .section_headers
                .get(&key)
                .map(String::as_str)
                .filter(|h| !h.is_empty());

            for text in self.resolve(key) {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match header {
                    Some(h) => sections.push(format!("### {}\n\n{}", h, text)),
                    None => sections.push(text.to_string()),
                }
            }
        }

        sections.join(SECTION_SEPARATOR)
    }

    /// 段落键对应的文本；guides 展开为列表
    fn resolve(&self, key: SectionKey) -> Vec<&'a str> {
        let req = self.request;
        match key {
            SectionKey::FormatInstructions => vec![req.format_instructions.as_str()],
            SectionKey::EncodedScore => vec![req.encoded_score.as_str()],
            SectionKey::Guides => req.normalized_guides(),
            SectionKey::TaskText => vec![req.task_text.as_str()],
        }
    }

    /// 组装并校验，产出 `CompiledPrompt`
    pub fn build(&self) -> Result<CompiledPrompt, ValidationError> {
        let temperature = self.request.temperature;
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(ValidationError::TemperatureOutOfRange(temperature));
        }

        let max_tokens = match self.request.max_tokens {
            None => None,
            Some(n) => Some(
                u32::try_from(n)
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or(ValidationError::InvalidMaxTokens(n))?,
            ),
        };

        Ok(CompiledPrompt::new(
            self.request.system_instructions.clone(),
            self.assemble(),
            temperature,
            self.request.model_name_override.clone(),
            max_tokens,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guides(items: &[&str]) -> Vec<Option<String>> {
        items.iter().map(|g| Some(g.to_string())).collect()
    }

    fn sample_request() -> PromptRequest {
        PromptRequest::new("Fmt", "Data", guides(&["G1", "G2"]), "Q")
    }

    #[test]
    fn test_legacy_order() {
        let req = sample_request();
        assert_eq!(
            PromptAssembler::new(&req).assemble(),
            "Fmt\n\nData\n\nG1\n\nG2\n\nQ"
        );
    }

    #[test]
    fn test_legacy_order_ignores_headers() {
        let req = sample_request().with_header(SectionKey::TaskText, "Task");
        assert_eq!(
            PromptAssembler::new(&req).assemble(),
            "Fmt\n\nData\n\nG1\n\nG2\n\nQ"
        );
    }

    fn permutations(items: &[SectionKey]) -> Vec<Vec<SectionKey>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_every_order_is_respected() {
        let keys = [
            SectionKey::FormatInstructions,
            SectionKey::EncodedScore,
            SectionKey::Guides,
            SectionKey::TaskText,
        ];
        let text_of = |k: SectionKey| match k {
            SectionKey::FormatInstructions => "Fmt",
            SectionKey::EncodedScore => "Data",
            SectionKey::Guides => "G1\n\nG2",
            SectionKey::TaskText => "Q",
        };

        let all = permutations(&keys);
        assert_eq!(all.len(), 24);
        for order in all {
            let expected = order.iter().map(|&k| text_of(k)).collect::<Vec<_>>().join("\n\n");
            let req = sample_request().with_section_order(order);
            assert_eq!(PromptAssembler::new(&req).assemble(), expected);
        }
    }

    #[test]
    fn test_header_injection() {
        let req = PromptRequest::new("Fmt", "Data", vec![], "  What is the species?  ")
            .with_section_order(vec![SectionKey::TaskText])
            .with_header(SectionKey::TaskText, "Task");
        assert_eq!(
            PromptAssembler::new(&req).assemble(),
            "### Task\n\nWhat is the species?"
        );
    }

    #[test]
    fn test_guides_header_repeats_per_guide() {
        let req = sample_request()
            .with_section_order(vec![SectionKey::Guides, SectionKey::TaskText])
            .with_header(SectionKey::Guides, "Guide");
        assert_eq!(
            PromptAssembler::new(&req).assemble(),
            "### Guide\n\nG1\n\n### Guide\n\nG2\n\nQ"
        );
    }

    #[test]
    fn test_blank_sections_vanish() {
        let req = PromptRequest::new("  ", "Data", vec![Some("\n".to_string())], "")
            .with_section_order(vec![
                SectionKey::TaskText,
                SectionKey::Guides,
                SectionKey::FormatInstructions,
                SectionKey::EncodedScore,
            ])
            .with_header(SectionKey::TaskText, "Task")
            .with_header(SectionKey::FormatInstructions, "Output Format (MEI)");
        assert_eq!(PromptAssembler::new(&req).assemble(), "Data");

        let legacy = PromptRequest::new("", " Data ", vec![], "  ");
        assert_eq!(PromptAssembler::new(&legacy).assemble(), "Data");
    }

    #[test]
    fn test_guide_filtering_matches_clean_list() {
        let noisy = PromptRequest::new(
            "Fmt",
            "Data",
            vec![
                Some("A".to_string()),
                None,
                Some(String::new()),
                Some("  ".to_string()),
                Some("B".to_string()),
            ],
            "Q",
        );
        let clean = PromptRequest::new("Fmt", "Data", guides(&["A", "B"]), "Q");

        assert_eq!(
            PromptAssembler::new(&noisy).assemble(),
            PromptAssembler::new(&clean).assemble()
        );

        let order = vec![SectionKey::Guides, SectionKey::TaskText];
        let noisy = noisy.with_section_order(order.clone());
        let clean = clean.with_section_order(order);
        assert_eq!(
            PromptAssembler::new(&noisy).assemble(),
            PromptAssembler::new(&clean).assemble()
        );
    }

    #[test]
    fn test_duplicate_keys_render_twice() {
        let req = sample_request().with_section_order(vec![SectionKey::TaskText, SectionKey::TaskText]);
        assert_eq!(PromptAssembler::new(&req).assemble(), "Q\n\nQ");
    }

    #[test]
    fn test_empty_order_falls_back_to_legacy() {
        let req = sample_request().with_section_order(SectionKey::filter_known(&["nope", "bogus"]));
        assert_eq!(
            PromptAssembler::new(&req).assemble(),
            "Fmt\n\nData\n\nG1\n\nG2\n\nQ"
        );
    }

    #[test]
    fn test_temperature_boundaries() {
        for ok in [0.0, 1.0, 0.5] {
            let req = sample_request().with_temperature(ok);
            let compiled = PromptAssembler::new(&req).build().unwrap();
            assert_eq!(compiled.temperature(), ok);
        }
        for bad in [-0.0001, 1.0001, 1.5, f64::NAN, f64::INFINITY] {
            let req = sample_request().with_temperature(bad);
            assert!(matches!(
                PromptAssembler::new(&req).build(),
                Err(ValidationError::TemperatureOutOfRange(_))
            ));
        }
    }

    #[test]
    fn test_assemble_still_works_with_bad_temperature() {
        let req = sample_request().with_temperature(3.0);
        let assembler = PromptAssembler::new(&req);
        assert!(assembler.build().is_err());
        assert_eq!(assembler.assemble(), "Fmt\n\nData\n\nG1\n\nG2\n\nQ");
    }

    #[test]
    fn test_max_tokens_validation() {
        let req = sample_request().with_max_tokens(Some(2048));
        assert_eq!(PromptAssembler::new(&req).build().unwrap().max_tokens(), Some(2048));

        for bad in [0, -5] {
            let req = sample_request().with_max_tokens(Some(bad));
            assert_eq!(
                PromptAssembler::new(&req).build().unwrap_err(),
                ValidationError::InvalidMaxTokens(bad)
            );
        }
    }

    #[test]
    fn test_build_passes_through_fields() {
        let req = sample_request()
            .with_system_instructions("You are a music theorist.")
            .with_model_name_override(Some("claude-3-haiku".to_string()))
            .with_temperature(0.7);
        let compiled = PromptAssembler::new(&req).build().unwrap();

        assert_eq!(compiled.system_instructions(), "You are a music theorist.");
        assert_eq!(compiled.model_name_override(), Some("claude-3-haiku"));
        assert_eq!(compiled.user_body(), "Fmt\n\nData\n\nG1\n\nG2\n\nQ");
        assert_eq!(compiled.max_tokens(), None);
    }
}
