//! Composite keys and ordering tables for the push/platform/group tree.

use std::cmp::Ordering;

use crate::models::PushId;

/// Known platforms in display priority order, with their display names.
///
/// Platforms absent from this table sort after every known platform.
pub const PLATFORM_ORDER: &[(&str, &str)] = &[
    ("linux32", "Linux"),
    ("linux32-devedition", "Linux DevEdition"),
    ("linux32-nightly", "Linux Nightly"),
    ("linux64", "Linux x64"),
    ("linux64-asan", "Linux x64 asan"),
    ("linux64-add-on-devel", "Linux x64 addon"),
    ("linux64-devedition", "Linux x64 DevEdition"),
    ("linux64-qr", "Linux x64 QuantumRender"),
    ("linux64-nightly", "Linux x64 Nightly"),
    ("linux64-ccov", "Linux x64 CCov"),
    ("linux64-noopt", "Linux x64 NoOpt"),
    ("osx-10-7", "OS X 10.7"),
    ("osx-10-9", "OS X 10.9"),
    ("osx-10-10", "OS X 10.10"),
    ("osx-10-11", "OS X 10.11"),
    ("macosx64", "OS X 10.11"),
    ("osx-cross", "OS X Cross Compiled"),
    ("windowsxp", "Windows XP"),
    ("windows7-32", "Windows 7"),
    ("windows7-32-vm", "Windows 7 VM"),
    ("windows8-64", "Windows 8 x64"),
    ("windows10-32", "Windows 10"),
    ("windows10-64", "Windows 10 x64"),
    ("windows10-64-vm", "Windows 10 x64 VM"),
    ("windows2012-32", "Windows 2012"),
    ("windows2012-64", "Windows 2012 x64"),
    ("android-4-0-armv7-api15", "Android 4.0 API15+"),
    ("android-4-2-x86", "Android 4.2 x86"),
    ("android-4-3-armv7-api15", "Android 4.3 API15+"),
    ("android-5-0-armv8-api15", "Android 5.0 AArch64 API15+"),
    ("android-api-15-gradle", "Android API15+ Gradle"),
    ("gecko-decision", "Gecko Decision Task"),
    ("lint", "Linting"),
    ("other", "Other"),
];

/// Build option display order within one platform.
pub const OPTION_ORDER: &[&str] = &["opt", "pgo", "asan", "tsan", "debug", "cc", "addon"];

/// Human-readable platform name, falling back to the raw name.
pub fn platform_display_name(name: &str) -> &str {
    PLATFORM_ORDER
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, display)| *display)
        .unwrap_or(name)
}

/// Sort priority of a platform row; `None` for platforms not in the table.
pub fn platform_priority(name: &str, option: &str) -> Option<usize> {
    let index = PLATFORM_ORDER.iter().position(|(key, _)| *key == name)?;
    let option_rank = OPTION_ORDER
        .iter()
        .position(|o| *o == option)
        .unwrap_or(OPTION_ORDER.len());
    Some(index * 100 + option_rank)
}

/// Compare two platform rows: known platforms by priority, unknown ones last,
/// ties broken by name then option.
pub fn compare_platforms(a: (&str, &str), b: (&str, &str)) -> Ordering {
    let rank = |(name, option): (&str, &str)| platform_priority(name, option).unwrap_or(usize::MAX);
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.0.cmp(b.0))
        .then_with(|| a.1.cmp(b.1))
}

/// Replace characters that are unsafe in element ids with `-`.
///
/// Runs of whitespace collapse to a single `-`.
pub fn escape(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut in_space = false;
    for c in id.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        match c {
            ':' | '[' | ']' | '?' | ',' | '.' => out.push('-'),
            _ => out.push(c),
        }
    }
    out
}

/// Globally unique row id of a platform.
pub fn platform_row_id(repo: &str, push_id: PushId, name: &str, option: &str) -> String {
    escape(&format!("{}{}{}{}", repo, push_id, name, option))
}

/// Globally unique key of a job group.
pub fn group_map_key(
    push_id: PushId,
    symbol: &str,
    tier: Option<i32>,
    platform: &str,
    option: &str,
) -> String {
    let tier = tier.map(|t| t.to_string()).unwrap_or_default();
    escape(&format!("{}{}{}{}{}", push_id, symbol, tier, platform, option))
}

/// Group tier as stored on a group node: only recorded when it is not 1.
pub fn group_tier(tier: i32) -> Option<i32> {
    (tier != 1).then_some(tier)
}

/// Natural ordering: digit runs compare numerically, everything else by character.
///
/// `R2` sorts before `R10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut a_chars);
                let nb = take_digits(&mut b_chars);
                let ord = compare_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.cmp(&cb);
                if ord != Ordering::Equal {
                    return ord;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied()
        && c.is_ascii_digit()
    {
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
