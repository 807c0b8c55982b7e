//! Line-oriented command shell: the interactive "external collaborator"
//! surface of the kernel (§4.10). Reads decoded ASCII from the keyboard
//! ring buffer, echoes to the VGA console, and dispatches a fixed command
//! table directly against `fs`/`mm`/`sched`/`drivers::ata` — this runs
//! with full kernel privilege, so it calls those modules' own APIs
//! rather than going through the `int 0x80` gate meant for tasks.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{FS_MAX_PATH_LEN, HEAP_SIZE};
use crate::drivers::{ata, keyboard};
use crate::fs::{self, EntryKind};
use crate::mm::{heap, pmm};
use crate::{print, println};

const PROMPT: &str = "ace> ";

struct Shell {
    cwd: u32,
}

impl Shell {
    fn new() -> Self {
        Shell { cwd: fs::ROOT_DIR_ID }
    }

    fn read_line(&self) -> String {
        let mut line = String::new();
        loop {
            match keyboard::read_key() {
                Some(b'\n') => {
                    println!();
                    return line;
                }
                Some(0x08) => {
                    if line.pop().is_some() {
                        print!("\u{8} \u{8}");
                    }
                }
                Some(byte) if line.len() < FS_MAX_PATH_LEN => {
                    let ch = byte as char;
                    line.push(ch);
                    print!("{ch}");
                }
                Some(_) => {}
                None => crate::arch::hlt(),
            }
        }
    }

    fn run(&mut self) -> ! {
        println!("aceOS shell. Type 'help' for the command list.");
        loop {
            print!("{PROMPT}");
            let line = self.read_line();
            let mut words = line.split_whitespace();
            let Some(command) = words.next() else { continue };
            let rest: Vec<&str> = words.collect();
            self.dispatch(command, &rest);
        }
    }

    fn dispatch(&mut self, command: &str, args: &[&str]) {
        let result = match command {
            "help" => {
                self.cmd_help();
                Ok(())
            }
            "clear" => {
                crate::drivers::vga::clear_screen();
                Ok(())
            }
            "version" => {
                println!("aceOS kernel {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            "echo" => {
                println!("{}", args.join(" "));
                Ok(())
            }
            "pwd" => {
                println!("{}", fs::path_of(self.cwd));
                Ok(())
            }
            "cd" => self.cmd_cd(args),
            "ls" => self.cmd_ls(args),
            "mkdir" => self.cmd_mkdir(args),
            "touch" => self.cmd_touch(args),
            "cat" => self.cmd_cat(args),
            "write" => self.cmd_write(args),
            "cp" => self.cmd_cp(args),
            "mv" => self.cmd_mv(args),
            "rm" => self.cmd_rm(args),
            "find" => self.cmd_find(args),
            "tree" => self.cmd_tree(args),
            "stat" => self.cmd_stat(args),
            "fsinfo" => {
                self.cmd_fsinfo();
                Ok(())
            }
            "meminfo" => {
                self.cmd_meminfo();
                Ok(())
            }
            "diskinfo" => {
                self.cmd_diskinfo();
                Ok(())
            }
            "timer" => {
                println!("uptime: {} ms", crate::arch::x86::pit::uptime_ms());
                Ok(())
            }
            "ps" => {
                self.cmd_ps();
                Ok(())
            }
            "debug" => {
                println!("cwd dir id: {}", self.cwd);
                Ok(())
            }
            "test" => {
                self.cmd_test();
                Ok(())
            }
            "" => Ok(()),
            other => Err(format!("unknown command: {other}")),
        };
        if let Err(message) = result {
            println!("Error: {message}");
        }
    }

    fn cmd_help(&self) {
        println!("commands: help clear version echo pwd cd ls mkdir touch cat write cp mv rm find tree stat fsinfo meminfo diskinfo timer ps debug test");
    }

    fn cmd_cd(&mut self, args: &[&str]) -> Result<(), String> {
        let path = args.first().copied().unwrap_or("/");
        match fs::resolve(self.cwd, path) {
            Ok((EntryKind::Directory, id)) => {
                self.cwd = id;
                Ok(())
            }
            Ok((EntryKind::File, _)) => Err(format!("{path}: not a directory")),
            Err(e) => Err(format!("{path}: {e:?}")),
        }
    }

    fn cmd_ls(&self, args: &[&str]) -> Result<(), String> {
        let path = args.first().copied().unwrap_or("");
        let entries = fs::list_dir(self.cwd, path).map_err(|e| format!("{e:?}"))?;
        for (name, kind) in entries {
            let suffix = if kind == EntryKind::Directory { "/" } else { "" };
            println!("{name}{suffix}");
        }
        Ok(())
    }

    fn cmd_mkdir(&self, args: &[&str]) -> Result<(), String> {
        let path = args.first().ok_or_else(|| String::from("mkdir: missing path"))?;
        fs::mkdir(self.cwd, path).map(|_| ()).map_err(|e| format!("{e:?}"))
    }

    fn cmd_touch(&self, args: &[&str]) -> Result<(), String> {
        let path = args.first().ok_or_else(|| String::from("touch: missing path"))?;
        fs::create_file(self.cwd, path).map(|_| ()).map_err(|e| format!("{e:?}"))
    }

    fn cmd_cat(&self, args: &[&str]) -> Result<(), String> {
        let path = args.first().ok_or_else(|| String::from("cat: missing path"))?;
        let (kind, id) = fs::resolve(self.cwd, path).map_err(|e| format!("{e:?}"))?;
        if kind != EntryKind::File {
            return Err(format!("{path}: is a directory"));
        }
        let data = fs::read(id).map_err(|e| format!("{e:?}"))?;
        println!("{}", core::str::from_utf8(&data).unwrap_or("<binary data>"));
        Ok(())
    }

    fn cmd_write(&self, args: &[&str]) -> Result<(), String> {
        let path = args.first().ok_or_else(|| String::from("write: missing path"))?;
        let text = args.get(1..).unwrap_or(&[]).join(" ");
        let (_, id) = fs::resolve(self.cwd, path)
            .or_else(|_| fs::create_file(self.cwd, path).map(|id| (EntryKind::File, id)))
            .map_err(|e| format!("{e:?}"))?;
        fs::write(id, text.as_bytes()).map_err(|e| format!("{e:?}"))
    }

    fn cmd_cp(&self, args: &[&str]) -> Result<(), String> {
        let (&src, &dst) = (args.first().ok_or_else(|| String::from("cp: missing source"))?, args.get(1).ok_or_else(|| String::from("cp: missing destination"))?);
        let (kind, id) = fs::resolve(self.cwd, src).map_err(|e| format!("{e:?}"))?;
        if kind != EntryKind::File {
            return Err(String::from("cp: source is a directory"));
        }
        let data = fs::read(id).map_err(|e| format!("{e:?}"))?;
        let new_id = fs::create_file(self.cwd, dst).map_err(|e| format!("{e:?}"))?;
        fs::write(new_id, &data).map_err(|e| format!("{e:?}"))
    }

    fn cmd_mv(&self, args: &[&str]) -> Result<(), String> {
        let (&src, &dst) = (args.first().ok_or_else(|| String::from("mv: missing source"))?, args.get(1).ok_or_else(|| String::from("mv: missing destination"))?);
        let (kind, id) = fs::resolve(self.cwd, src).map_err(|e| format!("{e:?}"))?;
        if kind == EntryKind::File {
            let data = fs::read(id).map_err(|e| format!("{e:?}"))?;
            let new_id = fs::create_file(self.cwd, dst).map_err(|e| format!("{e:?}"))?;
            fs::write(new_id, &data).map_err(|e| format!("{e:?}"))?;
            fs::delete(self.cwd, src).map_err(|e| format!("{e:?}"))
        } else {
            Err(String::from("mv: directories not supported"))
        }
    }

    fn cmd_rm(&self, args: &[&str]) -> Result<(), String> {
        let path = args.first().ok_or_else(|| String::from("rm: missing path"))?;
        fs::delete(self.cwd, path).map_err(|e| format!("{e:?}"))
    }

    fn cmd_find(&self, args: &[&str]) -> Result<(), String> {
        let name = args.first().ok_or_else(|| String::from("find: missing name"))?;
        self.walk(fs::ROOT_DIR_ID, &String::from("/"), &mut |path, entry_name, _| {
            if entry_name == *name {
                println!("{path}");
            }
        });
        Ok(())
    }

    fn cmd_tree(&self, _args: &[&str]) -> Result<(), String> {
        self.walk(self.cwd, &fs::path_of(self.cwd), &mut |path, _, kind| {
            let marker = if kind == EntryKind::Directory { "/" } else { "" };
            println!("{path}{marker}");
        });
        Ok(())
    }

    fn walk(&self, dir: u32, prefix: &str, visit: &mut impl FnMut(&str, &str, EntryKind)) {
        let Ok(entries) = fs::list_dir(dir, "") else { return };
        for (name, kind) in entries {
            let path = if prefix == "/" { format!("/{name}") } else { format!("{prefix}/{name}") };
            visit(&path, &name, kind);
            if kind == EntryKind::Directory {
                if let Ok((_, id)) = fs::resolve(dir, &name) {
                    self.walk(id, &path, &mut *visit);
                }
            }
        }
    }

    fn cmd_stat(&self, args: &[&str]) -> Result<(), String> {
        let path = args.first().ok_or_else(|| String::from("stat: missing path"))?;
        let stat = fs::stat(self.cwd, path).map_err(|e| format!("{e:?}"))?;
        println!("kind: {:?}, size: {} bytes", stat.kind, stat.size);
        Ok(())
    }

    fn cmd_fsinfo(&self) {
        println!(
            "fs: {} dirs max, {} files max, {} children/dir max",
            crate::config::FS_MAX_DIRECTORIES,
            crate::config::FS_MAX_FILES,
            crate::config::FS_MAX_FILES_PER_DIR
        );
    }

    fn cmd_meminfo(&self) {
        let stats = heap::stats();
        println!(
            "frames: {}/{} free, heap: {} KiB free of {} KiB",
            pmm::free_frames(),
            pmm::total_frames(),
            stats.free_bytes / 1024,
            HEAP_SIZE / 1024
        );
    }

    fn cmd_diskinfo(&self) {
        for drive in 0..crate::config::MAX_ATA_DRIVES {
            if let Some(info) = ata::get_info(drive) {
                println!(
                    "ata{drive}: {} ({} sectors, {}/{}/{})",
                    info.model_str(),
                    info.total_sectors,
                    info.cylinders,
                    info.heads,
                    info.sectors_per_track
                );
            }
        }
    }

    fn cmd_ps(&self) {
        println!("{:<6}{:<6}{:<10}{:<10}{}", "PID", "PPID", "STATE", "PRIO", "NAME");
        for p in crate::sched::snapshot_all() {
            println!("{:<6}{:<6}{:<10?}{:<10?}{}", p.pid, p.parent_pid, p.state, p.priority, p.name);
        }
    }

    fn cmd_test(&self) {
        println!("heap validate: {}", if heap::validate() { "ok" } else { "CORRUPT" });
    }
}

/// # Safety
/// Must run once, as the last step of boot, after every driver and
/// subsystem has been initialized and interrupts are enabled.
pub unsafe fn run() -> ! {
    Shell::new().run()
}
