//! Unlock directives embedded in character replies.
//!
//! A character reveals a secret by writing `[UNLOCK:flag_name]` somewhere
//! in its reply. Directives are stripped before the text is shown or
//! stored; anything that does not match the exact form stays as text.

const OPEN: &str = "[UNLOCK:";

/// An instruction extracted from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    FlagUnlock { name: String },
}

/// A reply with its directives removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub text: String,
    pub directives: Vec<Directive>,
}

impl ParsedReply {
    /// Flag names in the order they appeared.
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().map(|d| match d {
            Directive::FlagUnlock { name } => name.as_str(),
        })
    }
}

/// Format a directive the way a character is told to write it.
pub fn directive(name: &str) -> String {
    format!("{OPEN}{name}]")
}

fn is_flag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `name` can be written inside a directive and parsed back.
pub fn is_valid_flag_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_flag_char)
}

/// Split a raw reply into display text and directives.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let mut text = String::with_capacity(raw.len());
    let mut directives = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        text.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let name_len = after
            .char_indices()
            .find(|&(_, c)| !is_flag_char(c))
            .map(|(i, _)| i)
            .unwrap_or(after.len());

        if name_len > 0 && after[name_len..].starts_with(']') {
            directives.push(Directive::FlagUnlock {
                name: after[..name_len].to_string(),
            });
            rest = &after[name_len + 1..];
        } else {
            // Not a directive; keep the opener and continue after it.
            text.push_str(OPEN);
            rest = after;
        }
    }
    text.push_str(rest);

    let text = if directives.is_empty() {
        text.trim().to_string()
    } else {
        tidy_spacing(&text)
    };

    ParsedReply { text, directives }
}

/// Collapse the double spaces left behind where directives were removed.
fn tidy_spacing(text: &str) -> String {
    text.lines()
        .map(|line| line.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
