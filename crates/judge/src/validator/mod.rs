//! 提交代码准入检查。
//!
//! 在运行任何测试用例之前，检查提交代码引用的包是否全部位于白名单内。
//! 任何白名单外的导入都会使整个提交被判为 `InvalidCode`。

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::ValidatorKind;
use crate::error::{JudgeError, Result};

pub mod lexical;
pub mod syntax;

pub use lexical::LexicalValidator;
pub use syntax::SyntaxValidator;

/// 准入检查结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// `package` 为第一个不在白名单内的导入。
    Rejected { package: String },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// 代码准入检查器。
///
/// 实现必须是纯函数：同一份源码多次检查得到相同结果。
pub trait CodeValidator: Send + Sync {
    fn name(&self) -> &str;

    fn admit(&self, source: &str) -> Admission;
}

/// 包白名单。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    packages: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, package: &str) -> bool {
        self.packages.contains(package)
    }
}

/// 读取提交的源文件。读取失败属于系统错误，不会被映射为任何判题结果。
pub async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| JudgeError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

pub fn build_validator(kind: ValidatorKind, allow_list: AllowList) -> Arc<dyn CodeValidator> {
    match kind {
        ValidatorKind::Lexical => Arc::new(LexicalValidator::new(allow_list)),
        ValidatorKind::Syntax => Arc::new(SyntaxValidator::new(allow_list)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validators() -> Vec<Arc<dyn CodeValidator>> {
        let allow = AllowList::new(["fmt", "strings", "sort"]);
        vec![
            build_validator(ValidatorKind::Lexical, allow.clone()),
            build_validator(ValidatorKind::Syntax, allow),
        ]
    }

    #[test]
    fn allowed_imports_are_admitted_by_every_strategy() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"strings\"\n)\n\nimport \"sort\"\n";

        for validator in validators() {
            assert_eq!(validator.admit(source), Admission::Admitted, "{}", validator.name());
        }
    }

    #[test]
    fn disallowed_import_is_rejected_in_any_position() {
        let sources = [
            "package main\nimport (\n\"os\"\n\"fmt\"\n)\n",
            "package main\nimport (\n\"fmt\"\n\"os\"\n)\n",
            "package main\nimport (\n\"fmt\"\n\"strings\"\n\"os\"\n)\n",
            "package main\nimport \"fmt\"\nimport \"os\"\n",
        ];

        for validator in validators() {
            for source in sources {
                assert_eq!(
                    validator.admit(source),
                    Admission::Rejected {
                        package: "os".to_string()
                    },
                    "{} on {source:?}",
                    validator.name()
                );
            }
        }
    }

    #[test]
    fn admission_is_deterministic() {
        let source = "package main\nimport \"net/http\"\n";

        for validator in validators() {
            assert_eq!(validator.admit(source), validator.admit(source));
        }
    }

    #[tokio::test]
    async fn unreadable_source_is_a_system_error() {
        let err = read_source(Path::new("/nonexistent/goj/main.go"))
            .await
            .expect_err("missing file should fail");

        assert!(matches!(err, JudgeError::SourceUnreadable { .. }));
    }
}
