//! LDIF (RFC 2849) rendering of directory entries.
//!
//! Values that are not LDIF safe strings are base64-encoded, so every emitted
//! line is plain ASCII and can be folded at a fixed column.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::account::DirectoryEntry;

/// Maximum line length before folding.
const LINE_WIDTH: usize = 76;

impl DirectoryEntry {
    /// Distinguished name of this entry under `base_dn`.
    pub fn dn(&self, base_dn: &str) -> String {
        if base_dn.is_empty() {
            format!("uid={}", self.uid)
        } else {
            format!("uid={},{}", self.uid, base_dn)
        }
    }

    /// Render this entry as one LDIF content record.
    ///
    /// Absent and empty attribute values are left out.
    pub fn to_ldif(&self, base_dn: &str) -> String {
        let mut out = String::new();
        push_line(&mut out, "dn", &self.dn(base_dn));
        for class in &self.object_class {
            push_line(&mut out, "objectClass", class);
        }

        let attrs: [(&str, Option<&str>); 6] = [
            ("cn", Some(self.cn.as_str())),
            ("sn", self.sn.as_deref()),
            ("givenname", self.givenname.as_deref()),
            ("mail", self.mail.as_deref()),
            ("uid", Some(self.uid.as_str())),
            ("carlicense", Some(self.carlicense.as_str())),
        ];
        for (name, value) in attrs {
            match value {
                Some(v) if !v.is_empty() => push_line(&mut out, name, v),
                _ => {}
            }
        }
        out
    }
}

/// Render a complete LDIF document: a `version: 1` header followed by one
/// record per entry, separated by blank lines.
pub fn render_ldif(entries: &[DirectoryEntry], base_dn: &str) -> String {
    let mut out = String::from("version: 1\n");
    for entry in entries {
        out.push('\n');
        out.push_str(&entry.to_ldif(base_dn));
    }
    out
}

/// RFC 2849 SAFE-STRING, with trailing spaces treated as unsafe too.
fn is_safe_string(value: &str) -> bool {
    let bytes = value.as_bytes();
    let Some(&first) = bytes.first() else {
        return true;
    };
    if matches!(first, b' ' | b':' | b'<') || bytes.last() == Some(&b' ') {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii() && !matches!(b, b'\0' | b'\n' | b'\r'))
}

fn push_line(out: &mut String, attr: &str, value: &str) {
    let line = if is_safe_string(value) {
        format!("{attr}: {value}")
    } else {
        format!("{attr}:: {}", STANDARD.encode(value))
    };
    out.push_str(&fold_line(&line));
}

/// Fold an ASCII line at [`LINE_WIDTH`] with newline + space continuations.
fn fold_line(line: &str) -> String {
    if line.len() <= LINE_WIDTH {
        return format!("{line}\n");
    }

    let mut result = String::with_capacity(line.len() + line.len() / LINE_WIDTH * 2 + 1);
    let (head, mut rest) = line.split_at(LINE_WIDTH);
    result.push_str(head);
    result.push('\n');

    // Continuation lines spend one column on the leading space.
    while !rest.is_empty() {
        let take = rest.len().min(LINE_WIDTH - 1);
        let (chunk, tail) = rest.split_at(take);
        result.push(' ');
        result.push_str(chunk);
        result.push('\n');
        rest = tail;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;

    fn jane() -> DirectoryEntry {
        Account::new(
            Some("u1".into()),
            Some("Jane".into()),
            Some("Doe".into()),
            Some("jane@x.org".into()),
        )
        .to_directory_entry()
    }

    #[test]
    fn test_render_entry() {
        let ldif = jane().to_ldif("ou=people,dc=example,dc=com");
        let sum = "645a3a84a606b369c60b4a6ebc5449f88825e6bc";
        let expected = format!(
            "dn: uid={sum},ou=people,dc=example,dc=com\n\
             objectClass: top\n\
             objectClass: inetOrgPerson\n\
             cn: Jane Doe\n\
             sn: Doe\n\
             givenname: Jane\n\
             mail: jane@x.org\n\
             uid: {sum}\n\
             carlicense: {sum}\n"
        );
        assert_eq!(ldif, expected);
    }

    #[test]
    fn test_absent_attributes_are_omitted() {
        let entry = Account::new(None, None, None, None).to_directory_entry();
        let ldif = entry.to_ldif("dc=example,dc=com");
        assert!(!ldif.contains("\ncn:"));
        assert!(!ldif.contains("\nsn:"));
        assert!(!ldif.contains("\ngivenname:"));
        assert!(!ldif.contains("\nmail:"));
        assert!(ldif.contains("uid: da39a3ee5e6b4b0d3255bfef95601890afd80709\n"));
    }

    #[test]
    fn test_non_ascii_value_is_base64() {
        let entry = Account::new(None, Some("Jürgen".into()), None, None).to_directory_entry();
        let ldif = entry.to_ldif("dc=example,dc=com");
        assert!(ldif.contains("givenname:: SsO8cmdlbg==\n"));
        assert!(ldif.contains("cn:: SsO8cmdlbg==\n"));
    }

    #[test]
    fn test_unsafe_leading_and_trailing_characters() {
        assert!(is_safe_string("plain value"));
        assert!(is_safe_string(""));
        assert!(!is_safe_string(" lead"));
        assert!(!is_safe_string("trail "));
        assert!(!is_safe_string(":colon"));
        assert!(!is_safe_string("<url"));
        assert!(!is_safe_string("line\nbreak"));

        let mut out = String::new();
        push_line(&mut out, "sn", " lead");
        assert_eq!(out, "sn:: IGxlYWQ=\n");
    }

    #[test]
    fn test_long_lines_are_folded() {
        let base_dn = format!("ou={},dc=example,dc=com", "x".repeat(120));
        let ldif = jane().to_ldif(&base_dn);
        let dn_line: Vec<&str> = ldif.lines().take_while(|l| !l.starts_with("objectClass")).collect();

        assert!(dn_line.len() > 1);
        assert!(dn_line.iter().all(|l| l.len() <= LINE_WIDTH));
        assert!(dn_line[1..].iter().all(|l| l.starts_with(' ')));

        let unfolded: String = dn_line
            .iter()
            .enumerate()
            .map(|(i, l)| if i == 0 { *l } else { &l[1..] })
            .collect();
        assert_eq!(unfolded, format!("dn: {}", jane().dn(&base_dn)));
    }

    #[test]
    fn test_render_document() {
        let entries = vec![jane(), jane()];
        let doc = render_ldif(&entries, "dc=example,dc=com");
        assert!(doc.starts_with("version: 1\n\ndn: uid="));
        assert_eq!(doc.matches("\ndn: ").count(), 2);
        assert_eq!(doc.matches("\n\n").count(), 2);
    }

    #[test]
    fn test_empty_base_dn() {
        assert_eq!(
            jane().dn(""),
            "uid=645a3a84a606b369c60b4a6ebc5449f88825e6bc"
        );
    }
}
