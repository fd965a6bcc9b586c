use colored::Colorize;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::keys::KeySchedule;
use crate::types::VideoList;

static DEBUG: AtomicBool = AtomicBool::new(false);

pub fn set_debug(on: bool) {
    DEBUG.store(on, Ordering::Relaxed);
}

pub fn is_debug() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

pub fn debug<S: AsRef<str>>(msg: S) {
    if is_debug() {
        eprintln!("[DEBUG] {}", msg.as_ref());
    }
}

pub fn print_json<T: Serialize + std::fmt::Debug>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{:?}", value),
    }
}

pub fn print_video_list_human(list: &VideoList) {
    if list.sources.is_empty() {
        println!("{}", "no playable sources".red().bold());
    } else {
        println!("{}", "sources:".green().bold());
        for (i, s) in list.sources.iter().enumerate() {
            let mut line = format!("{}. {}", i + 1, s.file.cyan());
            if let Some(kind) = &s.kind {
                line.push_str(&format!(" | {}", kind));
            }
            println!("{}", line);
        }
    }
    if !list.tracks.is_empty() {
        println!("{}", "tracks:".green().bold());
        for (i, t) in list.tracks.iter().enumerate() {
            let mut line = format!("{}. {}", i + 1, t.file);
            if let Some(label) = &t.label {
                line.push_str(&format!(" | {}", label));
            }
            if let Some(kind) = &t.kind {
                line.push_str(&format!(" | {}", kind));
            }
            if t.default {
                line.push_str(&format!(" | {}", "default".bold()));
            }
            println!("{}", line);
        }
    }
}

pub fn print_schedule_human(schedule: &KeySchedule) {
    println!("{} {}", "pairs:".bold(), schedule.pairs().len());

    let idx_header = "#";
    let start_header = "start";
    let len_header = "length";
    let idx_width = std::cmp::max(idx_header.len(), format!("{}", schedule.pairs().len()).len());

    println!("{:<iw$}  {:>6}  {}", idx_header.bold(), start_header.bold(), len_header.bold(), iw = idx_width);
    println!("{:<iw$}  {:>6}  {}", "-".repeat(idx_width), "-".repeat(6), "-".repeat(6), iw = idx_width);
    for (i, pair) in schedule.pairs().iter().enumerate() {
        println!("{:<iw$}  {:>6}  {}", i + 1, pair.start, pair.length, iw = idx_width);
    }
}
