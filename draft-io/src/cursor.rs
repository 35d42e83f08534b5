use std::borrow::Cow;

use crate::DxfError;

/// 组码流游标：按行寻址，偶数位置为组码行，奇数位置为值行。
///
/// 所有读取都基于下标，`prev()` 之后的 `next()` 会回到原位置并给出同一行，
/// 解析器借此实现“预读后回退”。
#[derive(Debug, Clone)]
pub struct GroupCodeCursor<'a> {
    lines: Vec<Cow<'a, str>>,
    index: usize,
}

impl<'a> GroupCodeCursor<'a> {
    /// 按行切分文本（兼容 `\r\n`）。
    pub fn from_text(source: &'a str) -> Self {
        Self {
            lines: source
                .lines()
                .map(|line| Cow::Borrowed(line.trim_end_matches('\r')))
                .collect(),
            index: 0,
        }
    }

    /// 从已经拆分好的 (组码, 值) 序列构造。
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        let mut lines = Vec::new();
        for (code, value) in pairs {
            lines.push(Cow::Owned(code.to_string()));
            lines.push(Cow::Owned(value.into()));
        }
        Self { lines, index: 0 }
    }

    /// 当前游标所在行的行号（从 1 开始）。
    #[inline]
    pub fn line_number(&self) -> usize {
        self.index + 1
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.index >= self.lines.len()
    }

    /// 游标所在位置的行，不移动游标。
    pub fn current(&self) -> Result<&str, DxfError> {
        self.lines
            .get(self.index)
            .map(|line| &**line)
            .ok_or(DxfError::CursorExhausted {
                line: self.line_number(),
            })
    }

    /// 返回游标所在位置的行，然后前进一行。
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<&str, DxfError> {
        let index = self.index;
        if index >= self.lines.len() {
            return Err(DxfError::CursorExhausted {
                line: self.line_number(),
            });
        }
        self.index += 1;
        Ok(&*self.lines[index])
    }

    /// 后退一行并返回新位置上的行。
    pub fn prev(&mut self) -> Result<&str, DxfError> {
        if self.index == 0 {
            return Err(DxfError::CursorUnderflow);
        }
        self.index -= 1;
        self.current()
    }

    /// 奇偶判定：为 `true` 时游标停在值行上。
    #[inline]
    pub fn odd(&self) -> bool {
        self.index % 2 == 1
    }

    /// 读取一个完整的 (组码, 值) 对。
    pub fn read_pair(&mut self) -> Result<(i32, String), DxfError> {
        debug_assert!(!self.odd(), "游标未对齐到组码行");
        let line = self.line_number();
        let code = parse_code(self.next()?, line)?;
        let value = self.next()?.to_string();
        Ok((code, value))
    }

    /// 回退一个完整的 (组码, 值) 对。
    pub fn unread_pair(&mut self) -> Result<(), DxfError> {
        self.prev()?;
        self.prev()?;
        Ok(())
    }

    /// 预读下一个组码；输入已结束时返回 `None`。
    pub fn peek_code(&self) -> Result<Option<i32>, DxfError> {
        if self.is_exhausted() {
            return Ok(None);
        }
        parse_code(self.current()?, self.line_number()).map(Some)
    }
}

fn parse_code(raw: &str, line: usize) -> Result<i32, DxfError> {
    raw.trim().parse::<i32>().map_err(|_| DxfError::InvalidCode {
        raw: raw.trim().to_string(),
        line,
    })
}
