//! Fixed-capacity in-RAM hierarchical file system, grounded in the
//! original kernel's `fs_create_directory`/`fs_create_file`/`fs_delete`
//! table layout (`FS_MAX_DIRECTORIES` directories, `FS_MAX_FILES` files,
//! `FS_MAX_FILES_PER_DIR` children per directory) but with a file's
//! backing storage re-modeled as a tagged union (empty / resident in RAM
//! / resident on disk at an LBA) instead of a single fixed data pointer,
//! so a file can be created in RAM and only later get a disk-backed LBA
//! once it is flushed.

use alloc::string::String;
use alloc::vec::Vec;

use spin::Mutex;

use crate::config::{
    FS_MAX_DIRECTORIES, FS_MAX_FILENAME_LEN, FS_MAX_FILES, FS_MAX_FILES_PER_DIR, FS_MAX_PATH_LEN,
};
use crate::error::FsError;

pub const ROOT_DIR_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 1 << 0;
        const HIDDEN    = 1 << 1;
        const SYSTEM    = 1 << 2;
    }
}

#[derive(Clone)]
enum FileData {
    Empty,
    InRam(Vec<u8>),
    OnDisk { drive: usize, lba: u32, len: u32 },
}

struct Directory {
    used: bool,
    name: [u8; FS_MAX_FILENAME_LEN],
    name_len: u8,
    parent: u32,
    children: [(EntryKind, u32); FS_MAX_FILES_PER_DIR],
    child_count: usize,
}

struct FileNode {
    used: bool,
    name: [u8; FS_MAX_FILENAME_LEN],
    name_len: u8,
    parent: u32,
    attrs: Attributes,
    data: FileData,
}

fn store_name(buf: &mut [u8; FS_MAX_FILENAME_LEN], name: &str) -> Result<u8, FsError> {
    let bytes = name.as_bytes();
    if bytes.len() > FS_MAX_FILENAME_LEN {
        return Err(FsError::NameTooLong);
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len() as u8)
}

fn load_name(buf: &[u8; FS_MAX_FILENAME_LEN], len: u8) -> &str {
    core::str::from_utf8(&buf[..len as usize]).unwrap_or("?")
}

/// Split an absolute or relative path into its component names. Pure and
/// architecture-independent: `/docs/a.txt` -> `["docs", "a.txt"]`, and a
/// leading `/` is simply a no-op empty first component that gets filtered.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

struct Filesystem {
    dirs: [Directory; FS_MAX_DIRECTORIES],
    files: [FileNode; FS_MAX_FILES],
}

impl Filesystem {
    fn new() -> Self {
        const EMPTY_DIR: Directory = Directory {
            used: false,
            name: [0; FS_MAX_FILENAME_LEN],
            name_len: 0,
            parent: 0,
            children: [(EntryKind::File, 0); FS_MAX_FILES_PER_DIR],
            child_count: 0,
        };
        const EMPTY_FILE: FileNode = FileNode {
            used: false,
            name: [0; FS_MAX_FILENAME_LEN],
            name_len: 0,
            parent: 0,
            attrs: Attributes::empty(),
            data: FileData::Empty,
        };
        let mut fs = Filesystem { dirs: [EMPTY_DIR; FS_MAX_DIRECTORIES], files: [EMPTY_FILE; FS_MAX_FILES] };
        fs.dirs[ROOT_DIR_ID as usize].used = true;
        fs.dirs[ROOT_DIR_ID as usize].parent = ROOT_DIR_ID;
        fs
    }

    fn find_child(&self, dir_id: u32, name: &str) -> Option<(EntryKind, u32)> {
        let dir = &self.dirs[dir_id as usize];
        dir.children[..dir.child_count].iter().copied().find(|(kind, id)| match kind {
            EntryKind::Directory => load_name(&self.dirs[*id as usize].name, self.dirs[*id as usize].name_len) == name,
            EntryKind::File => load_name(&self.files[*id as usize].name, self.files[*id as usize].name_len) == name,
        })
    }

    fn resolve(&self, start_dir: u32, path: &str) -> Result<(EntryKind, u32), FsError> {
        if path.len() > FS_MAX_PATH_LEN {
            return Err(FsError::PathTooLong);
        }
        let mut cur_kind = EntryKind::Directory;
        let mut cur_id = if path.starts_with('/') { ROOT_DIR_ID } else { start_dir };
        let mut first = true;
        for component in split_path(path) {
            if !first && cur_kind != EntryKind::Directory {
                return Err(FsError::NotADirectory);
            }
            first = false;
            match self.find_child(cur_id, component) {
                Some((kind, id)) => {
                    cur_kind = kind;
                    cur_id = id;
                }
                None => return Err(FsError::NotFound),
            }
        }
        Ok((cur_kind, cur_id))
    }

    fn resolve_parent<'a>(&self, start_dir: u32, path: &'a str) -> Result<(u32, &'a str), FsError> {
        let (dir_part, name) = match path.rfind('/') {
            Some(idx) => (&path[..idx.max(1)], &path[idx + 1..]),
            None => ("", path),
        };
        if name.is_empty() {
            return Err(FsError::NotFound);
        }
        let parent = if dir_part.is_empty() {
            start_dir
        } else {
            match self.resolve(start_dir, dir_part)? {
                (EntryKind::Directory, id) => id,
                (EntryKind::File, _) => return Err(FsError::NotADirectory),
            }
        };
        Ok((parent, name))
    }

    fn free_dir_slot(&self) -> Option<u32> {
        (0..FS_MAX_DIRECTORIES as u32).find(|&i| !self.dirs[i as usize].used)
    }

    fn free_file_slot(&self) -> Option<u32> {
        (0..FS_MAX_FILES as u32).find(|&i| !self.files[i as usize].used)
    }

    fn add_child(&mut self, dir_id: u32, kind: EntryKind, child_id: u32) -> Result<(), FsError> {
        let dir = &mut self.dirs[dir_id as usize];
        if dir.child_count >= FS_MAX_FILES_PER_DIR {
            return Err(FsError::DirectoryFull);
        }
        dir.children[dir.child_count] = (kind, child_id);
        dir.child_count += 1;
        Ok(())
    }

    fn remove_child(&mut self, dir_id: u32, kind: EntryKind, child_id: u32) {
        let dir = &mut self.dirs[dir_id as usize];
        if let Some(pos) = dir.children[..dir.child_count].iter().position(|c| *c == (kind, child_id)) {
            for i in pos..dir.child_count - 1 {
                dir.children[i] = dir.children[i + 1];
            }
            dir.child_count -= 1;
        }
    }

    fn mkdir(&mut self, start_dir: u32, path: &str) -> Result<u32, FsError> {
        let (parent, name) = self.resolve_parent(start_dir, path)?;
        if self.find_child(parent, name).is_some() {
            return Err(FsError::NameExists);
        }
        let id = self.free_dir_slot().ok_or(FsError::TableFull)?;
        let dir = &mut self.dirs[id as usize];
        let name_len = store_name(&mut dir.name, name)?;
        dir.used = true;
        dir.name_len = name_len;
        dir.parent = parent;
        dir.child_count = 0;
        self.add_child(parent, EntryKind::Directory, id)?;
        Ok(id)
    }

    fn create_file(&mut self, start_dir: u32, path: &str) -> Result<u32, FsError> {
        let (parent, name) = self.resolve_parent(start_dir, path)?;
        if self.find_child(parent, name).is_some() {
            return Err(FsError::NameExists);
        }
        let id = self.free_file_slot().ok_or(FsError::TableFull)?;
        let file = &mut self.files[id as usize];
        let name_len = store_name(&mut file.name, name)?;
        file.used = true;
        file.name_len = name_len;
        file.parent = parent;
        file.attrs = Attributes::empty();
        file.data = FileData::Empty;
        self.add_child(parent, EntryKind::File, id)?;
        Ok(id)
    }

    fn delete(&mut self, start_dir: u32, path: &str) -> Result<(), FsError> {
        let (kind, id) = self.resolve(start_dir, path)?;
        let (parent, _) = self.resolve_parent(start_dir, path)?;
        match kind {
            EntryKind::Directory => {
                if id == ROOT_DIR_ID {
                    return Err(FsError::NotADirectory);
                }
                if self.dirs[id as usize].child_count != 0 {
                    return Err(FsError::DirectoryNotEmpty);
                }
                self.dirs[id as usize].used = false;
            }
            EntryKind::File => {
                self.files[id as usize].used = false;
                self.files[id as usize].data = FileData::Empty;
            }
        }
        self.remove_child(parent, kind, id);
        Ok(())
    }

    fn write(&mut self, file_id: u32, data: &[u8]) -> Result<(), FsError> {
        let file = self.files.get_mut(file_id as usize).filter(|f| f.used).ok_or(FsError::NotFound)?;
        if file.attrs.contains(Attributes::READ_ONLY) {
            return Err(FsError::NameExists);
        }
        file.data = FileData::InRam(Vec::from(data));
        Ok(())
    }

    fn read(&self, file_id: u32) -> Result<Vec<u8>, FsError> {
        let file = self.files.get(file_id as usize).filter(|f| f.used).ok_or(FsError::NotFound)?;
        match &file.data {
            FileData::Empty => Ok(Vec::new()),
            FileData::InRam(buf) => Ok(buf.clone()),
            FileData::OnDisk { drive, lba, len } => {
                let sectors = len.div_ceil(crate::drivers::ata::SECTOR_SIZE as u32) as u8;
                let mut buf = alloc::vec![0u8; sectors as usize * crate::drivers::ata::SECTOR_SIZE];
                crate::drivers::ata::read_sectors(*drive, *lba, sectors, &mut buf).map_err(|_| FsError::NotFound)?;
                buf.truncate(*len as usize);
                Ok(buf)
            }
        }
    }

    fn list_dir(&self, dir_id: u32) -> Result<Vec<(String, EntryKind)>, FsError> {
        let dir = self.dirs.get(dir_id as usize).filter(|d| d.used).ok_or(FsError::NotADirectory)?;
        Ok(dir.children[..dir.child_count]
            .iter()
            .map(|(kind, id)| {
                let name = match kind {
                    EntryKind::Directory => load_name(&self.dirs[*id as usize].name, self.dirs[*id as usize].name_len),
                    EntryKind::File => load_name(&self.files[*id as usize].name, self.files[*id as usize].name_len),
                };
                (String::from(name), *kind)
            })
            .collect())
    }
}

static FS: Mutex<Option<Filesystem>> = Mutex::new(None);

/// # Safety
/// Must run once at boot.
pub unsafe fn init() {
    *FS.lock() = Some(Filesystem::new());
}

pub struct Stat {
    pub kind: EntryKind,
    pub size: usize,
    pub attrs: Attributes,
}

pub fn mkdir(start_dir: u32, path: &str) -> Result<u32, FsError> {
    FS.lock().as_mut().expect("fs not initialized").mkdir(start_dir, path)
}

pub fn create_file(start_dir: u32, path: &str) -> Result<u32, FsError> {
    FS.lock().as_mut().expect("fs not initialized").create_file(start_dir, path)
}

pub fn delete(start_dir: u32, path: &str) -> Result<(), FsError> {
    FS.lock().as_mut().expect("fs not initialized").delete(start_dir, path)
}

pub fn write(file_id: u32, data: &[u8]) -> Result<(), FsError> {
    FS.lock().as_mut().expect("fs not initialized").write(file_id, data)
}

pub fn read(file_id: u32) -> Result<Vec<u8>, FsError> {
    FS.lock().as_ref().expect("fs not initialized").read(file_id)
}

pub fn list_dir(start_dir: u32, path: &str) -> Result<Vec<(String, EntryKind)>, FsError> {
    let fs = FS.lock();
    let fs = fs.as_ref().expect("fs not initialized");
    let (kind, id) = if path.is_empty() { (EntryKind::Directory, start_dir) } else { fs.resolve(start_dir, path)? };
    if kind != EntryKind::Directory {
        return Err(FsError::NotADirectory);
    }
    fs.list_dir(id)
}

pub fn resolve(start_dir: u32, path: &str) -> Result<(EntryKind, u32), FsError> {
    FS.lock().as_ref().expect("fs not initialized").resolve(start_dir, path)
}

/// Reconstruct the absolute path of a directory by walking its parent
/// chain back to the root. Used by `pwd`/`getcwd`, which only ever carry
/// a directory id internally.
pub fn path_of(dir_id: u32) -> String {
    let fs = FS.lock();
    let fs = fs.as_ref().expect("fs not initialized");
    if dir_id == ROOT_DIR_ID {
        return String::from("/");
    }
    let mut components = Vec::new();
    let mut cur = dir_id;
    while cur != ROOT_DIR_ID {
        let dir = &fs.dirs[cur as usize];
        components.push(load_name(&dir.name, dir.name_len));
        cur = dir.parent;
    }
    let mut path = String::new();
    for component in components.iter().rev() {
        path.push('/');
        path.push_str(component);
    }
    path
}

pub fn stat(start_dir: u32, path: &str) -> Result<Stat, FsError> {
    let fs = FS.lock();
    let fs = fs.as_ref().expect("fs not initialized");
    let (kind, id) = fs.resolve(start_dir, path)?;
    match kind {
        EntryKind::Directory => Ok(Stat { kind, size: fs.dirs[id as usize].child_count, attrs: Attributes::empty() }),
        EntryKind::File => {
            let file = &fs.files[id as usize];
            let size = match &file.data {
                FileData::Empty => 0,
                FileData::InRam(buf) => buf.len(),
                FileData::OnDisk { len, .. } => *len as usize,
            };
            Ok(Stat { kind, size, attrs: file.attrs })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_drops_empty_components() {
        let parts: Vec<&str> = split_path("/docs/a.txt").collect();
        assert_eq!(parts, ["docs", "a.txt"]);
    }

    #[test]
    fn end_to_end_mkdir_create_write_read_delete() {
        let mut fs = Filesystem::new();
        let docs = fs.mkdir(ROOT_DIR_ID, "/docs").unwrap();
        let file_id = fs.create_file(docs, "a.txt").unwrap();
        fs.write(file_id, b"hello").unwrap();
        assert_eq!(fs.read(file_id).unwrap(), b"hello");

        let listing = fs.list_dir(docs).unwrap();
        assert_eq!(listing, alloc::vec![(String::from("a.txt"), EntryKind::File)]);

        assert_eq!(fs.delete(ROOT_DIR_ID, "/docs").unwrap_err(), FsError::DirectoryNotEmpty);
        fs.delete(docs, "a.txt").unwrap();
        fs.delete(ROOT_DIR_ID, "/docs").unwrap();
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut fs = Filesystem::new();
        fs.create_file(ROOT_DIR_ID, "a.txt").unwrap();
        assert_eq!(fs.create_file(ROOT_DIR_ID, "a.txt").unwrap_err(), FsError::NameExists);
    }

    #[test]
    fn path_through_a_file_is_rejected() {
        let mut fs = Filesystem::new();
        fs.create_file(ROOT_DIR_ID, "a.txt").unwrap();
        assert_eq!(fs.resolve(ROOT_DIR_ID, "/a.txt/b").unwrap_err(), FsError::NotADirectory);
    }
}
