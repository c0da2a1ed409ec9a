use crate::humanize::format_bytes;
use std::io::{self, Write};

/// Total message size per folder, in the order the folders were measured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FolderSizes {
    entries: Vec<(String, u64)>,
}

impl FolderSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the size of `folder`, replacing an earlier entry for it.
    pub fn insert(&mut self, folder: &str, bytes: u64) {
        match self.entries.iter_mut().find(|(name, _)| name == folder) {
            Some(entry) => entry.1 = bytes,
            None => self.entries.push((folder.to_string(), bytes)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, folder: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(name, _)| name == folder)
            .map(|&(_, bytes)| bytes)
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|&(_, bytes)| bytes).sum()
    }

    /// Largest folders first. Folders of equal size keep their order.
    pub fn sort_by_size(&mut self) {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(name, bytes)| (name.as_str(), *bytes))
    }
}

/// Prints one `folder: size` line per folder followed by the total. Folders
/// keep their order unless `sort_by_size` asks for the largest first.
pub fn write_report<W: Write>(out: &mut W, sizes: &FolderSizes, sort_by_size: bool)
    -> io::Result<()>
{
    let mut sorted;
    let sizes = if sort_by_size {
        sorted = sizes.clone();
        sorted.sort_by_size();
        &sorted
    } else {
        sizes
    };
    for (folder, bytes) in sizes.iter() {
        writeln!(out, "{}: {}", folder, format_bytes(bytes))?;
    }
    writeln!(out, "Total space used: {}", format_bytes(sizes.total()))
}
