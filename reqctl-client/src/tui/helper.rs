use chrono::{DateTime, Utc};
use ratatui::crossterm;

#[derive(Clone, Copy)]
pub enum Align {
    Left,
    Right,
}

pub struct RenderOpts {
    pub use_color: bool,
    pub indent: usize,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            indent: 2,
        }
    }
}

pub fn terminal_width() -> Option<usize> {
    match crossterm::terminal::size() {
        Ok((w, _h)) if w > 0 => Some(w as usize),
        _ => None,
    }
}

/// Width as rendered, skipping ANSI color sequences.
pub fn visible_width(s: &str) -> usize {
    let mut w = 0usize;
    let mut it = s.chars().peekable();
    while let Some(ch) = it.next() {
        if ch == '\x1b' {
            if it.peek() == Some(&'[') {
                it.next();
                for c in it.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        w += 1;
    }
    w
}

/// Cuts to `max_w` visible chars, marking the cut with an ellipsis.
pub fn truncate_visible(s: &str, max_w: usize) -> String {
    if visible_width(s) <= max_w {
        return s.to_string();
    }
    if max_w == 0 {
        return String::new();
    }
    let plain: String = strip_ansi(s);
    let mut out: String = plain.chars().take(max_w - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut it = s.chars().peekable();
    while let Some(ch) = it.next() {
        if ch == '\x1b' && it.peek() == Some(&'[') {
            it.next();
            for c in it.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

fn pad(s: &str, width: usize, align: Align) -> String {
    let t = truncate_visible(s, width);
    let fill = " ".repeat(width.saturating_sub(visible_width(&t)));
    match align {
        Align::Left => format!("{t}{fill}"),
        Align::Right => format!("{fill}{t}"),
    }
}

#[derive(Clone)]
pub struct ColSpec {
    pub title: &'static str,
    pub min: usize,
    pub max: Option<usize>,
    pub weight: usize,
    pub align: Align,
}

pub struct Table {
    gutter: usize,
    cols: Vec<ColSpec>,
    widths: Vec<usize>,
}

impl Table {
    pub fn new(w: usize, gutter: usize, cols: Vec<ColSpec>) -> Self {
        let widths = compute_widths(w.max(40), gutter, &cols);
        Self {
            gutter,
            cols,
            widths,
        }
    }

    pub fn header(&self, out: &mut String, opts: &RenderOpts) {
        let cells: Vec<String> = self
            .cols
            .iter()
            .map(|c| paint(opts.use_color, c.title, BOLD))
            .collect();
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        self.row(out, &refs, opts);
    }

    pub fn row(&self, out: &mut String, cells: &[&str], opts: &RenderOpts) {
        let mut line = " ".repeat(opts.indent);
        for (i, col) in self.cols.iter().enumerate() {
            if i > 0 {
                line.push_str(&" ".repeat(self.gutter));
            }
            let cell = cells.get(i).copied().unwrap_or("");
            line.push_str(&pad(cell, self.widths[i], col.align));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
}

/// Starts every column at its minimum, then hands out the remaining width
/// proportionally to weight until columns hit their max.
fn compute_widths(w: usize, gutter: usize, cols: &[ColSpec]) -> Vec<usize> {
    let mut widths: Vec<usize> = cols.iter().map(|c| c.min).collect();
    let used = widths.iter().sum::<usize>() + gutter * cols.len().saturating_sub(1);
    let mut remaining = w.saturating_sub(used);

    while remaining > 0 {
        let growable: Vec<usize> = (0..cols.len())
            .filter(|&i| cols[i].weight > 0 && cols[i].max.is_none_or(|m| widths[i] < m))
            .collect();
        let total_weight: usize = growable.iter().map(|&i| cols[i].weight).sum();
        if total_weight == 0 {
            break;
        }

        let budget = remaining;
        let mut given = 0;
        for &i in &growable {
            let share = (budget * cols[i].weight / total_weight).max(1);
            let cap = cols[i].max.map_or(usize::MAX, |m| m - widths[i]);
            let add = share.min(cap).min(remaining - given);
            widths[i] += add;
            given += add;
        }
        if given == 0 {
            break;
        }
        remaining -= given;
    }

    widths
}

/// Age of a timestamp relative to now, e.g. "3 days ago".
pub fn format_relative_time(time: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(*time);

    let secs = duration.num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }

    let plural = |n: i64, unit: &str| format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" });

    let mins = duration.num_minutes();
    if mins < 60 {
        return format!("{} min ago", mins);
    }
    let hours = duration.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = duration.num_days();
    if days < 30 {
        return plural(days, "day");
    }
    if days < 365 {
        return plural(days / 30, "month");
    }
    plural(days / 365, "year")
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

fn paint(enabled: bool, s: &str, code: &str) -> String {
    if enabled {
        format!("{code}{s}{RESET}")
    } else {
        s.to_string()
    }
}

pub fn dim(opts: &RenderOpts, s: &str) -> String {
    paint(opts.use_color, s, DIM)
}
pub fn green(opts: &RenderOpts, s: &str) -> String {
    paint(opts.use_color, s, GREEN)
}
pub fn red(opts: &RenderOpts, s: &str) -> String {
    paint(opts.use_color, s, RED)
}
pub fn yellow(opts: &RenderOpts, s: &str) -> String {
    paint(opts.use_color, s, YELLOW)
}
pub fn bold(opts: &RenderOpts, s: &str) -> String {
    paint(opts.use_color, s, BOLD)
}

pub fn pending_badge(opts: &RenderOpts, pending: bool) -> String {
    if pending {
        yellow(opts, "pending")
    } else {
        dim(opts, "-")
    }
}
