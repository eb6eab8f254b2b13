//! Mailboxes in address headers (RFC 5322 §3.4).
//!
//! Outlook display lists separate recipients with `;` and often carry only
//! names, so both separators and name-only entries are accepted.

use std::fmt;

/// Characters that force a display name into a quoted string.
const SPECIALS: &[char] = &[',', ';', '<', '>', '@', '"', '(', ')', '[', ']', ':'];

/// A display name and an address; either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mailbox {
    pub name: String,
    pub addr: String,
}

impl Mailbox {
    /// Build from separately stored fields.
    ///
    /// Outlook repeats the address as the name when there is none; that copy
    /// is dropped.
    pub fn new(name: &str, addr: &str) -> Self {
        let (name, addr) = (name.trim(), addr.trim());
        Self {
            name: if name.eq_ignore_ascii_case(addr) {
                String::new()
            } else {
                name.to_string()
            },
            addr: addr.to_string(),
        }
    }

    /// `Name <addr>`, `<addr>`, a bare `addr`, or a bare name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some((name, rest)) = raw.rsplit_once('<') {
            if let Some((addr, _)) = rest.split_once('>') {
                return Self {
                    name: unquote(name),
                    addr: addr.trim().to_string(),
                };
            }
        }
        if raw.contains('@') {
            Self {
                name: String::new(),
                addr: raw.to_string(),
            }
        } else {
            Self {
                name: unquote(raw),
                addr: String::new(),
            }
        }
    }

    /// Split on `,` or `;` outside quotes and angle brackets; empty entries are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_list(raw)
            .into_iter()
            .map(Self::parse)
            .filter(|m| !m.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.addr.is_empty()
    }

    /// Header value for several mailboxes.
    pub fn join(list: &[Self]) -> String {
        list.iter().map(Self::to_string).collect::<Vec<_>>().join(", ")
    }
}

/// Header form. A name with specials is quoted so it parses back the same.
impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.contains(SPECIALS) {
            format!("\"{}\"", self.name.replace('\\', "\\\\").replace('"', "\\\""))
        } else {
            self.name.clone()
        };
        match (name.is_empty(), self.addr.is_empty()) {
            (true, _) => f.write_str(&self.addr),
            (false, true) => f.write_str(&name),
            (false, false) => write!(f, "{name} <{}>", self.addr),
        }
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let (mut quoted, mut angle) = (false, false);
    for (i, ch) in raw.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' | ';' if !quoted && !angle => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Mailbox::parse("bob@example.com"), Mailbox::new("", "bob@example.com"));
        assert_eq!(Mailbox::parse("<bob@example.com>"), Mailbox::new("", "bob@example.com"));
        assert_eq!(
            Mailbox::parse("\"Smith, Bob\" <bob@example.com>"),
            Mailbox::new("Smith, Bob", "bob@example.com")
        );
        assert_eq!(Mailbox::parse("张三").name, "张三");
        assert!(Mailbox::parse("  ").is_empty());
    }

    #[test]
    fn test_outlook_display_list() {
        let list = Mailbox::parse_list("Alice Smith; \"Doe; Jane\" <jane@example.com>; ");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Alice Smith");
        assert!(list[0].addr.is_empty());
        assert_eq!(list[1].name, "Doe; Jane");
        assert_eq!(list[1].addr, "jane@example.com");
    }

    #[test]
    fn test_repeated_address_is_not_a_name() {
        assert_eq!(Mailbox::new("BOB@example.com", "bob@example.com").to_string(), "bob@example.com");
        assert_eq!(Mailbox::new(" Bob ", "bob@example.com").to_string(), "Bob <bob@example.com>");
    }

    #[test]
    fn test_join_quotes_specials() {
        let m = Mailbox::new("Last, First", "lf@example.com");
        let joined = Mailbox::join(&[m.clone(), Mailbox::new("", "x@example.com")]);
        assert_eq!(joined, "\"Last, First\" <lf@example.com>, x@example.com");
        assert_eq!(Mailbox::parse_list(&joined)[0], m);
    }
}
