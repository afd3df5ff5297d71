//! Storage file identity.
//!
//! Every file the engine stores is identified by a [`FileType`] and a file
//! number. On disk the pair maps to the usual LevelDB names:
//!
//! | Type | Name |
//! |------|------|
//! | Manifest | `MANIFEST-000007` |
//! | Log | `000007.log` |
//! | Table | `000007.ldb` |
//! | Temp | `000007.tmp` |

use std::fmt;

/// Kind of a storage file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Version edit log. Needs a directory sync to survive a crash.
    Manifest,
    /// Write-ahead log.
    Log,
    /// Sorted table.
    Table,
    /// Scratch file, usually renamed into place.
    Temp,
}

impl FileType {
    /// Whether syncing this file also requires syncing its directory.
    pub const fn needs_dir_sync(self) -> bool {
        matches!(self, FileType::Manifest)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Manifest => "manifest",
            FileType::Log => "journal",
            FileType::Table => "table",
            FileType::Temp => "temp",
        };
        f.write_str(name)
    }
}

/// Identity of a storage file: a type plus a file number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDesc {
    pub kind: FileType,
    pub num: u64,
}

impl FileDesc {
    #[must_use]
    pub const fn new(kind: FileType, num: u64) -> Self {
        Self { kind, num }
    }

    #[must_use]
    pub const fn manifest(num: u64) -> Self {
        Self::new(FileType::Manifest, num)
    }

    #[must_use]
    pub const fn log(num: u64) -> Self {
        Self::new(FileType::Log, num)
    }

    #[must_use]
    pub const fn table(num: u64) -> Self {
        Self::new(FileType::Table, num)
    }

    #[must_use]
    pub const fn temp(num: u64) -> Self {
        Self::new(FileType::Temp, num)
    }

    /// On-disk file name.
    pub fn file_name(&self) -> String {
        match self.kind {
            FileType::Manifest => format!("MANIFEST-{:06}", self.num),
            FileType::Log => format!("{:06}.log", self.num),
            FileType::Table => format!("{:06}.ldb", self.num),
            FileType::Temp => format!("{:06}.tmp", self.num),
        }
    }

    /// Parse an on-disk file name back into a descriptor.
    ///
    /// Accepts the legacy `.sst` table suffix as well. Returns `None` for
    /// names that are not storage files (`LOCK`, `CURRENT`, `LOG`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(num) = name.strip_prefix("MANIFEST-") {
            return parse_num(num).map(Self::manifest);
        }

        let (num, ext) = name.split_once('.')?;
        let kind = match ext {
            "log" => FileType::Log,
            "ldb" | "sst" => FileType::Table,
            "tmp" => FileType::Temp,
            _ => return None,
        };
        parse_num(num).map(|num| Self::new(kind, num))
    }
}

fn parse_num(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl fmt::Display for FileDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.num)
    }
}
