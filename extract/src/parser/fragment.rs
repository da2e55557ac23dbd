//! Fragment discovery and tree reconstruction within one activity block.
//!
//! A block lists fragments twice: once in an `Added Fragments:` summary
//!
//! ```text
//! Added Fragments:
//! #0: HomeFragment{a1b2c3} (6c1e...) id=0x7f0a0123 tag=home
//! ```
//!
//! and once as a detail region that starts with the same text and ends at the
//! fragment's `mView=` line. The summary text after `": "` is the token used
//! to find the detail region. Details carry `mParentFragment=`, which is all
//! the tree is rebuilt from.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

use dumpscope_core::{FragmentRecord, LifecycleState};

use super::{ScanState, capture, parse_bool_or};

/// Summary section header.
pub const ADDED_FRAGMENTS_MARKER: &str = "Added Fragments:";
/// Prefix of the line that closes a detail region.
pub const VIEW_MARKER: &str = "mView=";

static PATTERNS: LazyLock<FragmentPatterns> = LazyLock::new(FragmentPatterns::new);

struct FragmentPatterns {
    // HomeFragment{a1b2c3}
    instance: Regex,
    tag: Regex,
    state: Regex,
    who: Regex,
    // mParentFragment=HomeFragment{a1b2c3}
    parent: Regex,
    hidden: Regex,
    user_visible_hint: Regex,
    // mContainer=android.widget.FrameLayout{5a2b1c V.E...... 0,0-1080,1920 #7f0a0123 app:id/container}
    container: Regex,
}

impl FragmentPatterns {
    fn new() -> Self {
        Self {
            instance: Regex::new(r"^\s*([^\s{]+\{[0-9a-fA-F]+\})").expect("static regex must compile"),
            tag: Regex::new(r"\bmTag=(\S+)").expect("static regex must compile"),
            state: Regex::new(r"\bmState=(-?\d+)").expect("static regex must compile"),
            who: Regex::new(r"\bmWho=(\S+)").expect("static regex must compile"),
            parent: Regex::new(r"\bmParentFragment=([^\s{]+)(\{[0-9a-fA-F]+\})?")
                .expect("static regex must compile"),
            hidden: Regex::new(r"\bmHidden=(true|false)").expect("static regex must compile"),
            user_visible_hint: Regex::new(r"\bmUserVisibleHint=(true|false)")
                .expect("static regex must compile"),
            container: Regex::new(r"\bmContainer=(null|[^\s{}]+\{[^}]*\})")
                .expect("static regex must compile"),
        }
    }
}

/// How child fragments are matched to their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum FragmentGrouping {
    /// Match on the instance identity (`Class{hash}`), so same-class
    /// siblings keep their own children.
    #[default]
    Instance,
    /// Match on the parent's class name only. Two parents of the same class
    /// both receive the union of their children.
    ClassName,
}

/// Collects the summary tokens from every `Added Fragments:` section.
///
/// A section runs from its header up to the first line that does not start
/// with `#`. Nested fragment managers print their own sections, so scanning
/// resumes after each one closes.
pub fn collect_brief_tokens(lines: &[&str]) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut state = ScanState::Scanning;

    for line in lines {
        let trimmed = line.trim();
        if state == ScanState::Collecting {
            if trimmed.starts_with('#') {
                if let Some((_, token)) = trimmed.split_once(": ") {
                    tokens.push(token.trim().to_string());
                }
                continue;
            }
            state = ScanState::Closed;
        }
        if trimmed == ADDED_FRAGMENTS_MARKER {
            state = ScanState::Collecting;
        }
    }

    tokens
}

/// Finds the detail region for each token and returns its lines joined by
/// single spaces, in block order.
///
/// A region opens at a line equal to a token and closes, exclusive, at the
/// next `mView=` line. A later token line replaces a pending start; a region
/// still open at the end of the block is discarded.
pub fn detail_regions(lines: &[&str], tokens: &[String]) -> Vec<String> {
    let tokens: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let mut regions = Vec::new();
    let mut start: Option<usize> = None;

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if tokens.contains(trimmed) {
            start = Some(index);
        } else if trimmed.starts_with(VIEW_MARKER) {
            if let Some(open) = start.take() {
                let joined = lines[open..index]
                    .iter()
                    .map(|l| l.trim())
                    .collect::<Vec<_>>()
                    .join(" ");
                regions.push(joined);
            }
        }
    }

    if start.is_some() {
        debug!("Discarding fragment detail region with no mView line");
    }
    regions
}

/// Parses one joined detail region. Missing fields take their defaults.
pub fn parse_fragment_detail(text: &str) -> FragmentRecord {
    let p = &*PATTERNS;
    let text = text.trim();

    let class_name = match text.split_once('{') {
        Some((class, _)) => class.trim().to_string(),
        None => text.split_whitespace().next().unwrap_or_default().to_string(),
    };
    let instance = capture(&p.instance, text, 1)
        .map(str::to_string)
        .unwrap_or_else(|| class_name.clone());

    let (parent, parent_instance) = match p.parent.captures(text) {
        Some(caps) if &caps[1] != "null" => {
            let class = caps[1].to_string();
            let instance = match caps.get(2) {
                Some(hash) => format!("{class}{}", hash.as_str()),
                None => class.clone(),
            };
            (Some(class), Some(instance))
        }
        _ => (None, None),
    };

    let state = capture(&p.state, text, 1)
        .and_then(|code| code.parse::<i32>().ok())
        .map(LifecycleState::from_code)
        .unwrap_or_default();

    let container = match capture(&p.container, text, 1) {
        Some("null") | None => String::new(),
        Some(container) => container.to_string(),
    };

    FragmentRecord {
        class_name,
        instance,
        tag: capture(&p.tag, text, 1)
            .filter(|tag| *tag != "null")
            .map(str::to_string),
        state,
        who: capture(&p.who, text, 1).unwrap_or_default().to_string(),
        parent,
        parent_instance,
        hidden: parse_bool_or(capture(&p.hidden, text, 1), false),
        user_visible_hint: parse_bool_or(capture(&p.user_visible_hint, text, 1), true),
        container,
        children: Vec::new(),
    }
}

/// Rebuilds the containment tree and returns the top-level fragments.
///
/// Roots are the fragments with no parent reference. A fragment whose parent
/// is not in the list, or that only sits on a reference cycle, is attached as
/// a root as well so that nothing is lost.
pub fn build_tree(fragments: Vec<FragmentRecord>, grouping: FragmentGrouping) -> Vec<FragmentRecord> {
    let own_keys: HashSet<&str> = fragments.iter().map(|f| own_key(f, grouping)).collect();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, fragment) in fragments.iter().enumerate() {
        if let Some(parent) = parent_key(fragment, grouping) {
            groups.entry(parent).or_default().push(index);
        }
    }

    let mut builder = TreeBuilder {
        fragments: &fragments,
        groups: &groups,
        grouping,
        placed: vec![false; fragments.len()],
        ancestors: Vec::new(),
    };

    let mut roots = Vec::new();
    for (index, fragment) in fragments.iter().enumerate() {
        match parent_key(fragment, grouping) {
            None => roots.push(builder.build(index)),
            Some(parent) if !own_keys.contains(parent) => {
                debug!(
                    fragment = %fragment.instance,
                    parent,
                    "Parent fragment not found, attaching as root"
                );
                roots.push(builder.build(index));
            }
            Some(_) => {}
        }
    }

    for index in 0..fragments.len() {
        if !builder.placed[index] {
            debug!(fragment = %fragments[index].instance, "Fragment on a parent cycle, attaching as root");
            roots.push(builder.build(index));
        }
    }

    roots
}

/// Runs the full discovery pipeline over one activity block.
pub fn extract_fragments(lines: &[&str], grouping: FragmentGrouping) -> Vec<FragmentRecord> {
    let tokens = collect_brief_tokens(lines);
    if tokens.is_empty() {
        return Vec::new();
    }
    let parsed: Vec<FragmentRecord> = detail_regions(lines, &tokens)
        .iter()
        .map(|region| parse_fragment_detail(region))
        .collect();
    build_tree(parsed, grouping)
}

fn own_key(fragment: &FragmentRecord, grouping: FragmentGrouping) -> &str {
    match grouping {
        FragmentGrouping::Instance => &fragment.instance,
        FragmentGrouping::ClassName => &fragment.class_name,
    }
}

fn parent_key(fragment: &FragmentRecord, grouping: FragmentGrouping) -> Option<&str> {
    match grouping {
        FragmentGrouping::Instance => fragment.parent_instance.as_deref(),
        FragmentGrouping::ClassName => fragment.parent.as_deref(),
    }
}

struct TreeBuilder<'a> {
    fragments: &'a [FragmentRecord],
    groups: &'a HashMap<&'a str, Vec<usize>>,
    grouping: FragmentGrouping,
    placed: Vec<bool>,
    ancestors: Vec<usize>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, index: usize) -> FragmentRecord {
        self.placed[index] = true;
        self.ancestors.push(index);

        let mut node = self.fragments[index].clone();
        let key = own_key(&self.fragments[index], self.grouping);
        let child_indices = self.groups.get(key).cloned().unwrap_or_default();
        for child in child_indices {
            if self.ancestors.contains(&child) {
                continue;
            }
            node.children.push(self.build(child));
        }

        self.ancestors.pop();
        node
    }
}
