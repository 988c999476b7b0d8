use super::{Admission, AllowList, CodeValidator};

const KEYWORD: &str = "import";

/// 基于子串扫描的导入检查。
///
/// 只看关键字后第一个非空白字符：`"` 为单行导入，`(` 为分组导入。
/// 扫描不理解字符串和注释，关键字出现在其中时可能误判；
/// 带别名的单行导入（如 `import f "fmt"`）不会被检查。
#[derive(Debug, Clone)]
pub struct LexicalValidator {
    allow_list: AllowList,
}

impl LexicalValidator {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    fn check(&self, package: String) -> Result<(), Admission> {
        if self.allow_list.permits(&package) {
            Ok(())
        } else {
            Err(Admission::Rejected { package })
        }
    }

    fn scan(&self, source: &str) -> Result<(), Admission> {
        let bytes = source.as_bytes();
        let mut pos = 0;

        while let Some(found) = source[pos..].find(KEYWORD) {
            let mut cursor = pos + found + KEYWORD.len();
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }

            match bytes.get(cursor) {
                Some(b'(') => {
                    cursor += 1;
                    while cursor < bytes.len() && bytes[cursor] != b')' {
                        if bytes[cursor] == b'"' {
                            let (package, end) = quoted(source, cursor + 1);
                            self.check(package)?;
                            cursor = end;
                        }
                        cursor += 1;
                    }
                }
                Some(b'"') => {
                    let (package, end) = quoted(source, cursor + 1);
                    self.check(package)?;
                    cursor = end;
                }
                _ => {}
            }

            pos = cursor.min(bytes.len());
        }

        Ok(())
    }
}

/// Text from `start` up to the next `"`, and the index of that quote (or the end of input).
fn quoted(source: &str, start: usize) -> (String, usize) {
    let bytes = source.as_bytes();
    let end = bytes[start.min(bytes.len())..]
        .iter()
        .position(|b| *b == b'"')
        .map_or(bytes.len(), |offset| start + offset);

    (
        String::from_utf8_lossy(&bytes[start.min(end)..end]).into_owned(),
        end,
    )
}

impl CodeValidator for LexicalValidator {
    fn name(&self) -> &str {
        "lexical"
    }

    fn admit(&self, source: &str) -> Admission {
        match self.scan(source) {
            Ok(()) => Admission::Admitted,
            Err(rejected) => rejected,
        }
    }
}
