//! The normalized identity record and its derived views.
//!
//! An [`Account`] is built from exactly one catalog row. Everything else on
//! it (display name, fingerprint, directory projection) is recomputed on
//! demand from the four stored fields.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::source::AccountRow;

/// Object classes attached to every directory entry, in order.
pub const OBJECT_CLASSES: [&str; 2] = ["top", "inetOrgPerson"];

/// One identity record from the employee or student catalog.
///
/// Fields are stored verbatim and never change after construction. The `id`
/// is unique per instance and plays no part in equality or the checksum.
#[derive(Debug, Clone)]
pub struct Account {
    id: Uuid,
    uid: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    mail: Option<String>,
}

impl Account {
    /// Create an account with a freshly generated `id`.
    pub fn new(
        uid: Option<String>,
        firstname: Option<String>,
        lastname: Option<String>,
        mail: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            uid,
            firstname,
            lastname,
            mail,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn firstname(&self) -> Option<&str> {
        self.firstname.as_deref()
    }

    pub fn lastname(&self) -> Option<&str> {
        self.lastname.as_deref()
    }

    pub fn mail(&self) -> Option<&str> {
        self.mail.as_deref()
    }

    /// First and last name joined by a space, surrounding whitespace trimmed.
    ///
    /// Only ASCII whitespace and NUL are trimmed. Unicode spaces such as
    /// NBSP are part of the name.
    pub fn displayname(&self) -> String {
        format!(
            "{} {}",
            self.firstname().unwrap_or(""),
            self.lastname().unwrap_or("")
        )
        .trim_matches(is_trimmed)
        .to_string()
    }

    /// Lowercase hex SHA-1 over `uid`, `firstname`, `lastname` and `mail`
    /// concatenated without separators (absent fields count as empty).
    pub fn checksum(&self) -> String {
        let mut hasher = Sha1::new();
        for field in [&self.uid, &self.firstname, &self.lastname, &self.mail] {
            hasher.update(field.as_deref().unwrap_or("").as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Project this account onto an `inetOrgPerson` directory entry.
    ///
    /// The checksum is used for both `uid` and `carlicense`.
    pub fn to_directory_entry(&self) -> DirectoryEntry {
        let checksum = self.checksum();
        DirectoryEntry {
            sn: self.lastname.clone(),
            givenname: self.firstname.clone(),
            mail: self.mail.clone(),
            cn: self.displayname(),
            uid: checksum.clone(),
            carlicense: checksum,
            object_class: OBJECT_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

fn is_trimmed(c: char) -> bool {
    matches!(c, '\0' | '\t' | '\n' | '\x0B' | '\x0C' | '\r' | ' ')
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.firstname == other.firstname
            && self.lastname == other.lastname
            && self.mail == other.mail
    }
}

impl Eq for Account {}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account::new(row.uid, row.firstname, row.lastname, row.mail)
    }
}

/// Directory-entry projection of an [`Account`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub sn: Option<String>,
    pub givenname: Option<String>,
    pub mail: Option<String>,
    pub cn: String,
    pub uid: String,
    pub carlicense: String,
    #[serde(rename = "objectClass")]
    pub object_class: Vec<String>,
}
