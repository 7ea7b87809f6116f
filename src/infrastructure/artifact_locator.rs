//! 源文件定位 - 基础设施层
//!
//! 根据 (file_id, datatype, context, exam_date) 在新旧几种目录布局中查找
//! 乐谱编码文件、题目文件和格式说明。
//!
//! 每种布局是一个纯函数 `(locator, lookup) -> Option<PathBuf>`，按顺序尝试，
//! 第一个命中即返回。`find_*_optional` 永不报错，`find_*_required` 在整条链
//! 都未命中时返回 `NotFound`，两者共用同一条查找链。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::{AppResult, NotFoundError};
use crate::models::Datatype;

/// 一次查找的逻辑标识
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub file_id: &'a str,
    pub datatype: Datatype,
    pub context: bool,
    /// 旧版数据集的考试日期子目录
    pub exam_date: Option<&'a str>,
}

impl<'a> Lookup<'a> {
    pub fn new(file_id: &'a str, datatype: Datatype) -> Self {
        Self {
            file_id,
            datatype,
            context: false,
            exam_date: None,
        }
    }

    pub fn with_context(mut self, context: bool) -> Self {
        self.context = context;
        self
    }

    pub fn with_exam_date(mut self, exam_date: Option<&'a str>) -> Self {
        self.exam_date = exam_date.filter(|d| !d.is_empty());
        self
    }
}

/// 查找策略
pub type Strategy = fn(&ArtifactLocator, &Lookup<'_>) -> Option<PathBuf>;

/// 乐谱编码文件：`encoded/<datatype>` → 旧版考试日期布局
///
/// 旧版平铺布局同样是 `encoded/<datatype>`，与第一步重合，不再单列
const ENCODED_CHAIN: [(&str, Strategy); 2] = [
    ("encoded/<datatype>", encoded_datatype_layout),
    ("encoded/<exam_date>/<datatype>", encoded_exam_layout),
];

/// 题目文本：单一 prompt.md → 旧版逐题文件
const TASK_CHAIN: [(&str, Strategy); 2] = [
    ("prompts/prompt.md", task_single_prompt),
    ("prompts/questions/<context>/<datatype>", task_legacy_question),
];

/// 格式说明：base_<datatype>.md → base_<datatype>.txt
const BASE_FORMAT_CHAIN: [(&str, Strategy); 2] = [
    ("prompts/base/base_<datatype>.md", base_format_md),
    ("prompts/base/base_<datatype>.txt", base_format_txt),
];

/// 源文件定位器
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    encoded_root: PathBuf,
    prompts_root: PathBuf,
    guides_root: PathBuf,
}

impl ArtifactLocator {
    pub fn new(
        encoded_root: impl Into<PathBuf>,
        prompts_root: impl Into<PathBuf>,
        guides_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            encoded_root: encoded_root.into(),
            prompts_root: prompts_root.into(),
            guides_root: guides_root.into(),
        }
    }

    /// 按数据集根目录的标准布局创建
    pub fn for_dataset(dataset_root: &Path) -> Self {
        Self::new(
            dataset_root.join("encoded"),
            dataset_root.join("prompts"),
            dataset_root.join("guides"),
        )
    }

    pub fn encoded_root(&self) -> &Path {
        &self.encoded_root
    }

    pub fn prompts_root(&self) -> &Path {
        &self.prompts_root
    }

    pub fn guides_root(&self) -> &Path {
        &self.guides_root
    }

    fn first_match(&self, chain: &[(&str, Strategy)], lookup: &Lookup<'_>) -> Option<PathBuf> {
        chain.iter().find_map(|(name, strategy)| {
            let hit = strategy(self, lookup);
            if let Some(path) = &hit {
                tracing::debug!("{} 命中布局 {}: {}", lookup.file_id, name, path.display());
            }
            hit
        })
    }

    pub fn find_encoded_optional(&self, lookup: &Lookup<'_>) -> Option<PathBuf> {
        self.first_match(&ENCODED_CHAIN, lookup)
    }

    pub fn find_encoded_required(&self, lookup: &Lookup<'_>) -> AppResult<PathBuf> {
        self.find_encoded_optional(lookup).ok_or_else(|| {
            NotFoundError::EncodedFile {
                file_id: lookup.file_id.to_string(),
                dir: self.encoded_root.join(lookup.datatype.name()),
            }
            .into()
        })
    }

    pub fn find_task_optional(&self, lookup: &Lookup<'_>) -> Option<PathBuf> {
        self.first_match(&TASK_CHAIN, lookup)
    }

    pub fn find_task_required(&self, lookup: &Lookup<'_>) -> AppResult<PathBuf> {
        self.find_task_optional(lookup).ok_or_else(|| {
            NotFoundError::QuestionFile {
                file_id: lookup.file_id.to_string(),
                dir: legacy_question_dir(self, lookup),
            }
            .into()
        })
    }

    pub fn find_base_format_optional(&self, datatype: Datatype) -> Option<PathBuf> {
        self.first_match(&BASE_FORMAT_CHAIN, &Lookup::new("", datatype))
    }

    pub fn find_base_format_required(&self, datatype: Datatype) -> AppResult<PathBuf> {
        self.find_base_format_optional(datatype).ok_or_else(|| {
            NotFoundError::BaseFormatPrompt {
                datatype: datatype.name().to_string(),
                dir: self.prompts_root.join("base"),
            }
            .into()
        })
    }

    /// guide 引用：先按给定路径，再相对 guides 目录
    pub fn find_guide(&self, reference: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(reference);
        if direct.is_file() {
            return Some(direct);
        }
        let relative = self.guides_root.join(reference);
        relative.is_file().then_some(relative)
    }
}

// ========== 查找策略 ==========

fn encoded_datatype_layout(locator: &ArtifactLocator, lookup: &Lookup<'_>) -> Option<PathBuf> {
    let dir = locator.encoded_root.join(lookup.datatype.name());
    find_encoded_file(lookup.file_id, lookup.datatype, &dir)
}

fn encoded_exam_layout(locator: &ArtifactLocator, lookup: &Lookup<'_>) -> Option<PathBuf> {
    let exam_date = lookup.exam_date?;
    let dir = locator
        .encoded_root
        .join(exam_date)
        .join(lookup.datatype.name());
    find_encoded_file(lookup.file_id, lookup.datatype, &dir)
}

fn task_single_prompt(locator: &ArtifactLocator, _lookup: &Lookup<'_>) -> Option<PathBuf> {
    let path = locator.prompts_root.join("prompt.md");
    path.is_file().then_some(path)
}

fn legacy_question_dir(locator: &ArtifactLocator, lookup: &Lookup<'_>) -> PathBuf {
    let suffix = if lookup.context { "context" } else { "no_context" };
    locator
        .prompts_root
        .join("questions")
        .join(suffix)
        .join(lookup.datatype.name())
}

fn task_legacy_question(locator: &ArtifactLocator, lookup: &Lookup<'_>) -> Option<PathBuf> {
    find_question_file(lookup.file_id, lookup.context, &legacy_question_dir(locator, lookup))
}

fn base_format_md(locator: &ArtifactLocator, lookup: &Lookup<'_>) -> Option<PathBuf> {
    base_format_with_ext(locator, lookup.datatype, "md")
}

fn base_format_txt(locator: &ArtifactLocator, lookup: &Lookup<'_>) -> Option<PathBuf> {
    base_format_with_ext(locator, lookup.datatype, "txt")
}

fn base_format_with_ext(locator: &ArtifactLocator, datatype: Datatype, ext: &str) -> Option<PathBuf> {
    let path = locator
        .prompts_root
        .join("base")
        .join(format!("base_{}.{}", datatype.name(), ext));
    path.is_file().then_some(path)
}

// ========== 单目录查找 ==========

/// 在目录中查找编码文件：先精确匹配 `<file_id><ext>`，再递归匹配 `*<file_id><ext>`
pub fn find_encoded_file(file_id: &str, datatype: Datatype, dir: &Path) -> Option<PathBuf> {
    let file_name = format!("{}{}", file_id, datatype.extension());
    let candidate = dir.join(&file_name);
    if candidate.is_file() {
        return Some(candidate);
    }
    walk_files(dir)
        .into_iter()
        .find(|p| file_name_of(p).is_some_and(|n| n.ends_with(&file_name)))
}

/// 旧版数据集的逐题文件：`<id>.context.txt` / `<id>.nocontext.txt`，
/// 其次 `*<id>*ContextPrompt.txt` / `*<id>*NoContextPrompt.txt`
pub fn find_question_file(file_id: &str, context: bool, dir: &Path) -> Option<PathBuf> {
    let suffix = if context { "context" } else { "nocontext" };
    let candidate = dir.join(format!("{}.{}.txt", file_id, suffix));
    if candidate.is_file() {
        return Some(candidate);
    }
    let tail = if context { "Context" } else { "NoContext" };
    let pattern = format!(
        "{}/*{}*{}Prompt.txt",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(file_id),
        tail
    );
    // glob 的结果按路径排序
    glob::glob(&pattern)
        .ok()?
        .flatten()
        .find(|p| p.is_file())
}

// ========== 列表 ==========

/// 各已知格式子目录下编码文件的文件名（去扩展名），排序去重
pub fn list_file_ids(encoded_root: &Path) -> Vec<String> {
    let mut ids = BTreeSet::new();
    for sub in subdirectories(encoded_root) {
        let Some(datatype) = file_name_of(&sub).and_then(Datatype::from_dir_name) else {
            continue;
        };
        for file in walk_files(&sub) {
            if let Some(id) = file_name_of(&file).and_then(|n| n.strip_suffix(datatype.extension())) {
                if !id.is_empty() {
                    ids.insert(id.to_string());
                }
            }
        }
    }
    ids.into_iter().collect()
}

/// 非空的已知格式子目录
pub fn list_datatypes(encoded_root: &Path) -> Vec<Datatype> {
    let mut found = BTreeSet::new();
    for sub in subdirectories(encoded_root) {
        let Some(datatype) = file_name_of(&sub).and_then(Datatype::from_dir_name) else {
            continue;
        };
        let non_empty = WalkDir::new(&sub)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .flatten()
            .next()
            .is_some();
        if non_empty {
            found.insert(datatype);
        }
    }
    found.into_iter().collect()
}

/// guides 目录下所有 `.txt` / `.md` 文件的相对路径
pub fn list_guides(guides_root: &Path) -> Vec<String> {
    let mut guides: Vec<String> = walk_files(guides_root)
        .into_iter()
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "txt" || e == "md")
        })
        .filter_map(|p| {
            p.strip_prefix(guides_root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    guides.sort();
    guides
}

// ========== 目录遍历 ==========

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// 目录下的直接子目录（按名称排序，不跟随符号链接）
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect()
}

/// 递归列出目录下所有文件（按名称深度优先，目录不存在时为空）
fn walk_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn touch(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn dataset() -> (tempfile::TempDir, ArtifactLocator) {
        let dir = tempfile::tempdir().unwrap();
        let locator = ArtifactLocator::for_dataset(dir.path());
        (dir, locator)
    }

    #[test]
    fn test_find_encoded_new_layout_exact() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("encoded/mei/Fux1.mei"), "<mei/>");

        let found = locator
            .find_encoded_required(&Lookup::new("Fux1", Datatype::Mei))
            .unwrap();
        assert_eq!(found, dir.path().join("encoded/mei/Fux1.mei"));
    }

    #[test]
    fn test_find_encoded_recursive_fallback() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("encoded/abc/nested/Ex_Fux1.abc"), "X:1");

        let found = locator
            .find_encoded_optional(&Lookup::new("Fux1", Datatype::Abc))
            .unwrap();
        assert!(found.ends_with("nested/Ex_Fux1.abc"));
    }

    #[test]
    fn test_find_encoded_exam_date_layout() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("encoded/August2024/humdrum/Q1b.krn"), "**kern");

        let without_date = Lookup::new("Q1b", Datatype::Humdrum);
        let with_date = without_date.with_exam_date(Some("August2024"));

        let found = locator.find_encoded_optional(&with_date).unwrap();
        assert!(found.ends_with("August2024/humdrum/Q1b.krn"));
        // 不给考试日期时只查 encoded/<datatype>
        assert!(locator.find_encoded_optional(&without_date).is_none());
    }

    #[test]
    fn test_new_layout_takes_precedence() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("encoded/mei/Fux1.mei"), "new");
        touch(&dir.path().join("encoded/Jan2020/mei/Fux1.mei"), "old");

        let lookup = Lookup::new("Fux1", Datatype::Mei).with_exam_date(Some("Jan2020"));
        let found = locator.find_encoded_required(&lookup).unwrap();
        assert_eq!(found, dir.path().join("encoded/mei/Fux1.mei"));
    }

    #[test]
    fn test_encoded_optional_vs_required() {
        let (_dir, locator) = dataset();
        let lookup = Lookup::new("Missing", Datatype::Mei);

        assert!(locator.find_encoded_optional(&lookup).is_none());
        let err = locator.find_encoded_required(&lookup).unwrap_err();
        assert!(matches!(
            err,
            AppError::NotFound(NotFoundError::EncodedFile { .. })
        ));
    }

    #[test]
    fn test_task_prefers_single_prompt() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("prompts/prompt.md"), "Task");
        touch(
            &dir.path().join("prompts/questions/context/mei/Q1.context.txt"),
            "Legacy",
        );

        let lookup = Lookup::new("Q1", Datatype::Mei).with_context(true);
        let found = locator.find_task_required(&lookup).unwrap();
        assert_eq!(found, dir.path().join("prompts/prompt.md"));
    }

    #[test]
    fn test_task_legacy_question_files() {
        let (dir, locator) = dataset();
        touch(
            &dir.path().join("prompts/questions/context/mei/Q1.context.txt"),
            "ctx",
        );
        touch(
            &dir.path()
                .join("prompts/questions/no_context/mei/RCM6_Q2_NoContextPrompt.txt"),
            "noctx",
        );

        let ctx = Lookup::new("Q1", Datatype::Mei).with_context(true);
        assert!(locator
            .find_task_required(&ctx)
            .unwrap()
            .ends_with("Q1.context.txt"));

        let no_ctx = Lookup::new("Q2", Datatype::Mei);
        assert!(locator
            .find_task_required(&no_ctx)
            .unwrap()
            .ends_with("RCM6_Q2_NoContextPrompt.txt"));

        assert!(locator
            .find_task_optional(&Lookup::new("Q9", Datatype::Mei))
            .is_none());
    }

    #[test]
    fn test_base_format_md_before_txt() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("prompts/base/base_abc.txt"), "txt");
        touch(&dir.path().join("prompts/base/base_abc.md"), "md");

        let found = locator.find_base_format_required(Datatype::Abc).unwrap();
        assert!(found.ends_with("base_abc.md"));
        assert!(locator.find_base_format_required(Datatype::Mei).is_err());
    }

    #[test]
    fn test_find_guide_relative_to_guides_dir() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("guides/Pierre-Guide.md"), "guide");

        assert!(locator.find_guide("Pierre-Guide.md").is_some());
        assert!(locator.find_guide("Nobody-Guide.md").is_none());
    }

    #[test]
    fn test_listing() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("encoded/mei/Fux1.mei"), "");
        touch(&dir.path().join("encoded/mei/Fux2.mei"), "");
        touch(&dir.path().join("encoded/humdrum/Fux1.krn"), "");
        touch(&dir.path().join("encoded/humdrum/readme.txt"), "");
        touch(&dir.path().join("encoded/scratch/Other.mei"), "");
        std::fs::create_dir_all(dir.path().join("encoded/abc")).unwrap();
        touch(&dir.path().join("guides/Pierre-Guide.md"), "");
        touch(&dir.path().join("guides/extra/LLM.txt"), "");
        touch(&dir.path().join("guides/notes.pdf"), "");

        assert_eq!(list_file_ids(locator.encoded_root()), vec!["Fux1", "Fux2"]);
        assert_eq!(
            list_datatypes(locator.encoded_root()),
            vec![Datatype::Humdrum, Datatype::Mei]
        );
        assert_eq!(
            list_guides(locator.guides_root()),
            vec!["Pierre-Guide.md", "extra/LLM.txt"]
        );
    }

    #[test]
    fn test_exam_date_folder_ignored_without_date() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("encoded/Jan2020/mei/Fux1.mei"), "old");

        let err = locator
            .find_encoded_required(&Lookup::new("Fux1", Datatype::Mei))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::NotFound(NotFoundError::EncodedFile { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_not_followed() {
        let (dir, locator) = dataset();
        touch(&dir.path().join("encoded/mei/Fux1.mei"), "<mei/>");
        touch(&dir.path().join("guides/Pierre-Guide.md"), "guide");
        std::os::unix::fs::symlink(
            dir.path().join("encoded/mei"),
            dir.path().join("encoded/mei/loop"),
        )
        .unwrap();
        std::os::unix::fs::symlink(dir.path().join("guides"), dir.path().join("guides/loop"))
            .unwrap();

        assert_eq!(list_file_ids(locator.encoded_root()), vec!["Fux1"]);
        assert_eq!(list_guides(locator.guides_root()), vec!["Pierre-Guide.md"]);
        assert!(locator
            .find_encoded_optional(&Lookup::new("Missing", Datatype::Mei))
            .is_none());
    }

    #[test]
    fn test_listing_missing_dirs() {
        let (_dir, locator) = dataset();
        assert!(list_file_ids(locator.encoded_root()).is_empty());
        assert!(list_datatypes(locator.encoded_root()).is_empty());
        assert!(list_guides(locator.guides_root()).is_empty());
    }
}
