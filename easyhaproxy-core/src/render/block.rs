/// One top-level section (`global`, `frontend x`, ...) and its directives.
#[derive(Debug, Default)]
pub(crate) struct Block {
    header: String,
    lines: Vec<String>,
}

const INDENT: &str = "    ";

impl Block {
    pub(crate) fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            lines: Vec::new(),
        }
    }

    pub(crate) fn line(&mut self, directive: impl Into<String>) -> &mut Self {
        self.lines.push(format!("{INDENT}{}", directive.into()));
        self
    }

    /// Adds a multi-line snippet, indenting each non-empty line.
    pub(crate) fn snippet(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            if line.trim().is_empty() {
                self.lines.push(String::new());
            } else {
                self.lines.push(format!("{INDENT}{line}"));
            }
        }
        self
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::with_capacity(64 * (self.lines.len() + 1));
        out.push_str(&self.header);
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
