// src/extract/tag_stack.rs

/// Open-tag nesting path seen so far while streaming markup events.
#[derive(Debug, Default, Clone)]
pub struct TagStack {
    tags: Vec<String>,
}

impl TagStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, tag: &str) {
        self.tags.push(tag.to_ascii_lowercase());
    }

    /// Pops up to and including the nearest `tag`. A close tag that was never
    /// opened leaves the stack untouched.
    pub fn exit(&mut self, tag: &str) {
        if let Some(pos) = self.tags.iter().rposition(|t| t.eq_ignore_ascii_case(tag)) {
            self.tags.truncate(pos);
        }
    }

    /// True when the innermost open tag is `tag`.
    pub fn is_in(&self, tag: &str) -> bool {
        self.tags
            .last()
            .map_or(false, |t| t.eq_ignore_ascii_case(tag))
    }

    /// True when the innermost `seq.len()` open tags equal `seq`, outermost first.
    pub fn is_in_sequence(&self, seq: &[&str]) -> bool {
        if seq.len() > self.tags.len() {
            return false;
        }
        let top = &self.tags[self.tags.len() - seq.len()..];
        top.iter().zip(seq).all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    pub fn depth(&self) -> usize {
        self.tags.len()
    }
}
