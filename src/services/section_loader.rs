//! 段落加载服务 - 业务能力层
//!
//! 只负责"为一次运行读齐所有源文本"：格式说明、乐谱编码、题目、guide，
//! 并按数据集约定给出段落顺序和标题。不组装、不调模型。

use tracing::{debug, warn};

use crate::error::AppResult;
use crate::infrastructure::{load_text_file, ArtifactLocator, Lookup};
use crate::models::{Datatype, PromptRequest, SectionKey};

/// 使用"题目优先"顺序的数据集（空名视为默认数据集）
const TASK_FIRST_DATASETS: [&str; 2] = ["", "fux-counterpoint"];

/// 段落加载服务
pub struct SectionLoader {
    locator: ArtifactLocator,
}

impl SectionLoader {
    pub fn new(locator: ArtifactLocator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &ArtifactLocator {
        &self.locator
    }

    /// 读取一次运行的全部段落
    ///
    /// # 参数
    /// - `lookup`: 文件标识
    /// - `guide`: guide 引用，仅在 `lookup.context` 为真时读取
    /// - `dataset`: 数据集名，决定段落顺序与标题
    ///
    /// # 返回
    /// 未设置温度等参数的 `PromptRequest`；必需文件缺失时返回 `NotFound`
    pub fn load(&self, lookup: &Lookup<'_>, guide: Option<&str>, dataset: &str) -> AppResult<PromptRequest> {
        let format_path = self.locator.find_base_format_required(lookup.datatype)?;
        let encoded_path = self.locator.find_encoded_required(lookup)?;
        let task_path = self.locator.find_task_required(lookup)?;
        debug!(
            "源文件: format={}, encoded={}, task={}",
            format_path.display(),
            encoded_path.display(),
            task_path.display()
        );

        let guides = if lookup.context {
            self.load_guides(guide)?
        } else {
            Vec::new()
        };

        let request = PromptRequest::new(
            load_text_file(&format_path)?,
            load_text_file(&encoded_path)?,
            guides,
            load_text_file(&task_path)?,
        );

        Ok(apply_dataset_layout(request, dataset, lookup.datatype))
    }

    /// guide 缺失只警告，不中断运行
    fn load_guides(&self, guide: Option<&str>) -> AppResult<Vec<Option<String>>> {
        let Some(reference) = guide.filter(|g| !g.trim().is_empty()) else {
            warn!("⚠️ 已开启 context 但未指定 guide");
            return Ok(Vec::new());
        };
        match self.locator.find_guide(reference) {
            Some(path) => Ok(vec![Some(load_text_file(&path)?)]),
            None => {
                warn!("⚠️ 未找到 guide 文件: {}", reference);
                Ok(Vec::new())
            }
        }
    }
}

/// 按数据集设置段落顺序与标题
///
/// 默认数据集使用 题目 → guide → 格式说明 → 编码 的顺序并加标题，
/// 其余数据集保持旧版顺序、不加标题
pub fn apply_dataset_layout(request: PromptRequest, dataset: &str, datatype: Datatype) -> PromptRequest {
    if !TASK_FIRST_DATASETS.contains(&dataset) {
        return request;
    }
    let upper = datatype.name().to_uppercase();
    request
        .with_section_order(vec![
            SectionKey::TaskText,
            SectionKey::Guides,
            SectionKey::FormatInstructions,
            SectionKey::EncodedScore,
        ])
        .with_header(SectionKey::TaskText, "Task")
        .with_header(SectionKey::Guides, "Guide")
        .with_header(SectionKey::FormatInstructions, format!("Output Format ({})", upper))
        .with_header(SectionKey::EncodedScore, format!("Encoded {} Source", upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PromptAssembler;
    use std::fs;
    use std::path::Path;

    fn dataset(root: &Path) {
        fs::create_dir_all(root.join("encoded/mei")).unwrap();
        fs::create_dir_all(root.join("prompts/base")).unwrap();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::write(root.join("encoded/mei/Fux1.mei"), "<mei/>\n").unwrap();
        fs::write(root.join("prompts/base/base_mei.md"), "Answer in MEI.").unwrap();
        fs::write(root.join("prompts/prompt.md"), "  Complete the counterpoint.  ").unwrap();
        fs::write(root.join("guides/Pierre-Guide.md"), "Avoid parallel fifths.").unwrap();
    }

    #[test]
    fn test_fux_dataset_order_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        dataset(dir.path());
        let loader = SectionLoader::new(ArtifactLocator::for_dataset(dir.path()));
        let lookup = Lookup::new("Fux1", Datatype::Mei).with_context(true);

        let request = loader
            .load(&lookup, Some("Pierre-Guide.md"), "fux-counterpoint")
            .unwrap();
        let body = PromptAssembler::new(&request).assemble();

        assert_eq!(
            body,
            "### Task\n\nComplete the counterpoint.\n\n\
             ### Guide\n\nAvoid parallel fifths.\n\n\
             ### Output Format (MEI)\n\nAnswer in MEI.\n\n\
             ### Encoded MEI Source\n\n<mei/>"
        );
    }

    #[test]
    fn test_other_dataset_uses_legacy_order() {
        let request = apply_dataset_layout(PromptRequest::new("F", "D", vec![], "Q"), "bach-chorales", Datatype::Abc);
        assert!(request.section_order.is_none());
        assert_eq!(PromptAssembler::new(&request).assemble(), "F\n\nD\n\nQ");
    }

    #[test]
    fn test_guides_ignored_without_context() {
        let dir = tempfile::tempdir().unwrap();
        dataset(dir.path());
        let loader = SectionLoader::new(ArtifactLocator::for_dataset(dir.path()));
        let lookup = Lookup::new("Fux1", Datatype::Mei);

        let request = loader.load(&lookup, Some("Pierre-Guide.md"), "fux-counterpoint").unwrap();
        assert!(request.normalized_guides().is_empty());
    }

    #[test]
    fn test_missing_guide_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        dataset(dir.path());
        let loader = SectionLoader::new(ArtifactLocator::for_dataset(dir.path()));
        let lookup = Lookup::new("Fux1", Datatype::Mei).with_context(true);

        let request = loader.load(&lookup, Some("Nope.md"), "fux-counterpoint").unwrap();
        assert!(request.normalized_guides().is_empty());
    }

    #[test]
    fn test_missing_encoded_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        dataset(dir.path());
        let loader = SectionLoader::new(ArtifactLocator::for_dataset(dir.path()));
        let lookup = Lookup::new("Fux9", Datatype::Mei);

        let err = loader.load(&lookup, None, "fux-counterpoint").unwrap_err();
        assert!(matches!(err, crate::error::AppError::NotFound(_)));
    }
}
