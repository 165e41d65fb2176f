use std::fmt::{Display, Formatter};

/// Group number reserved for the file header.
pub const HEADER_GROUP: i64 = 0;

/// Identifies one stored group (point, line, polygon or header).
///
/// A reference is never reused while the group it names exists. Group
/// number 0 of every file is the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupRef {
    file_id: u32,
    group_number: i64,
}

impl GroupRef {
    pub fn new(file_id: u32, group_number: i64) -> Self {
        GroupRef {
            file_id,
            group_number,
        }
    }

    /// The header group of the given file.
    pub fn header(file_id: u32) -> Self {
        GroupRef::new(file_id, HEADER_GROUP)
    }

    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    pub fn group_number(&self) -> i64 {
        self.group_number
    }

    pub fn is_header(&self) -> bool {
        self.group_number == HEADER_GROUP
    }
}

impl Display for GroupRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_id, self.group_number)
    }
}
