//! Parser for `git status --porcelain=v2 --branch -z` output.

use super::traits::{HeadState, WorkingTreeState};

/// Parses NUL-separated porcelain v2 output into a [`WorkingTreeState`].
///
/// Ignored entries (`!`) are skipped. For renames and copies both the new and
/// the original path are reported, so that staging them records the move.
pub fn parse_porcelain_v2(output: &str) -> WorkingTreeState {
    let mut head_name: Option<String> = None;
    let mut detached = false;
    let mut initial = false;
    let mut changed_paths = Vec::new();

    let mut records = output.split('\0').filter(|r| !r.is_empty());
    while let Some(record) = records.next() {
        if let Some(header) = record.strip_prefix("# ") {
            if let Some(oid) = header.strip_prefix("branch.oid ") {
                initial = oid == "(initial)";
            } else if let Some(head) = header.strip_prefix("branch.head ") {
                if head == "(detached)" {
                    detached = true;
                } else {
                    head_name = Some(head.to_string());
                }
            }
            continue;
        }

        match record.as_bytes().first() {
            Some(b'1') => {
                if let Some(path) = record.splitn(9, ' ').nth(8) {
                    changed_paths.push(path.to_string());
                }
            },
            Some(b'2') => {
                if let Some(path) = record.splitn(10, ' ').nth(9) {
                    changed_paths.push(path.to_string());
                }
                if let Some(orig) = records.next() {
                    changed_paths.push(orig.to_string());
                }
            },
            Some(b'u') => {
                if let Some(path) = record.splitn(11, ' ').nth(10) {
                    changed_paths.push(path.to_string());
                }
            },
            Some(b'?') => {
                if let Some(path) = record.strip_prefix("? ") {
                    changed_paths.push(path.to_string());
                }
            },
            _ => {},
        }
    }

    let head = if initial {
        HeadState::Unborn
    } else if detached {
        HeadState::Detached
    } else {
        match head_name {
            Some(name) => HeadState::Branch(name),
            None => HeadState::Detached,
        }
    };

    WorkingTreeState {
        head,
        changed_paths,
    }
}
