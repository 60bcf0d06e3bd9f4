// src/extractors/section.rs

// --- Imports ---
use std::ops::Range;

use crate::extractors::appendix::find_appendix_marker;
use crate::transform::comments::dead_regions;
use crate::utils::error::SectionError;
use crate::utils::scan::{balanced_group, read_control_word, skip_control_symbol, skip_whitespace};

// --- Constants ---
/// Path segment standing for everything after `\appendix`.
pub const APPENDIX_SEGMENT: &str = "Appendix";
/// Separator for path queries such as `Method > Setup`.
pub const PATH_SEPARATOR: char = '>';

const END_DOCUMENT: &str = "\\end{document}";

// --- Data Structures ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionLevel {
    Section,
    Subsection,
    Subsubsection,
}

impl SectionLevel {
    fn from_command(name: &str) -> Option<Self> {
        match name {
            "section" => Some(Self::Section),
            "subsection" => Some(Self::Subsection),
            "subsubsection" => Some(Self::Subsubsection),
            _ => None,
        }
    }

    fn rank(self) -> usize {
        match self {
            Self::Section => 0,
            Self::Subsection => 1,
            Self::Subsubsection => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SectionNode {
    /// Raw title as written (`Results \& Discussion`).
    pub title: String,
    pub level: SectionLevel,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Byte ranges of the body, heading included. More than one only when a
    /// sibling with the same title was folded into this node.
    pub spans: Vec<Range<usize>>,
    pub in_appendix: bool,
}

/// A sectioning command as it appears in the text.
#[derive(Debug)]
struct Heading {
    level: SectionLevel,
    title: String,
    start: usize,
}

/// Arena-backed forest of sections, in document order.
#[derive(Debug, Clone, Default)]
pub struct SectionTree {
    nodes: Vec<SectionNode>,
    roots: Vec<usize>,
    appendix_at: Option<usize>,
}

/// Comparison key: `\&` and `&` compare equal and runs of whitespace
/// collapse. Case is significant.
fn normalize(title: &str) -> String {
    title.replace("\\&", "&").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_headings(text: &str) -> Vec<Heading> {
    let dead = dead_regions(text);
    let mut headings = Vec::new();
    let mut i = 0;
    while let Some(rel) = text[i..].find('\\') {
        let at = i + rel;
        let Some((name, end)) = read_control_word(text, at) else {
            i = skip_control_symbol(text, at);
            continue;
        };
        i = end;
        let Some(level) = SectionLevel::from_command(name) else { continue };
        if dead.contains(at) {
            continue;
        }

        let mut j = end;
        if text.as_bytes().get(j) == Some(&b'*') {
            j += 1;
        }
        j = skip_whitespace(text, j);
        if text.as_bytes().get(j) == Some(&b'[') {
            match balanced_group(text, j) {
                Some((_, after)) => j = skip_whitespace(text, after),
                None => continue,
            }
        }
        let Some((inner, after)) = balanced_group(text, j) else {
            tracing::debug!("Unbalanced title for \\{} at byte {}", name, at);
            continue;
        };
        headings.push(Heading {
            level,
            title: text[inner].trim().to_string(),
            start: at,
        });
        i = after;
    }
    headings
}

impl SectionTree {
    /// Builds the forest from final document text.
    pub fn build(text: &str) -> Self {
        let appendix_at = find_appendix_marker(text);
        let doc_end = text.find(END_DOCUMENT).unwrap_or(text.len());
        let headings: Vec<Heading> = collect_headings(text)
            .into_iter()
            .filter(|h| h.start < doc_end)
            .collect();

        let mut tree = SectionTree {
            nodes: Vec::new(),
            roots: Vec::new(),
            appendix_at,
        };
        // Most recent open node per level.
        let mut open: [Option<usize>; 3] = [None; 3];
        let mut crossed_appendix = false;

        for (k, heading) in headings.iter().enumerate() {
            let in_appendix = appendix_at.is_some_and(|a| heading.start >= a);
            if in_appendix && !crossed_appendix {
                crossed_appendix = true;
                open = [None; 3];
            }

            let mut end = headings[k + 1..]
                .iter()
                .find(|h| h.level <= heading.level)
                .map_or(doc_end, |h| h.start);
            if let Some(a) = appendix_at {
                if heading.start < a && end > a {
                    end = a;
                }
            }
            let span = heading.start..end;

            let rank = heading.level.rank();
            let parent = open[..rank].iter().rev().find_map(|slot| *slot);
            let siblings = match parent {
                Some(p) => &tree.nodes[p].children,
                None => &tree.roots,
            };
            let key = normalize(&heading.title);
            let existing = siblings.iter().copied().find(|&s| {
                let node = &tree.nodes[s];
                node.level == heading.level && node.in_appendix == in_appendix && normalize(&node.title) == key
            });

            let idx = match existing {
                Some(idx) => {
                    tracing::debug!("Folding repeated sibling '{}' into its first occurrence", heading.title);
                    tree.nodes[idx].spans.push(span);
                    idx
                }
                None => {
                    let idx = tree.nodes.len();
                    tree.nodes.push(SectionNode {
                        title: heading.title.clone(),
                        level: heading.level,
                        parent,
                        children: Vec::new(),
                        spans: vec![span],
                        in_appendix,
                    });
                    match parent {
                        Some(p) => tree.nodes[p].children.push(idx),
                        None => tree.roots.push(idx),
                    }
                    idx
                }
            };

            open[rank] = Some(idx);
            for slot in open.iter_mut().skip(rank + 1) {
                *slot = None;
            }
        }

        tracing::info!("Built section tree with {} nodes ({} top-level)", tree.nodes.len(), tree.roots.len());
        tree
    }

    pub fn nodes(&self) -> &[SectionNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn appendix_at(&self) -> Option<usize> {
        self.appendix_at
    }

    /// Ancestor titles plus the node's own, prefixed with `Appendix` for
    /// nodes after the marker.
    pub fn path(&self, idx: usize) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = Some(idx);
        while let Some(i) = current {
            path.push(self.nodes[i].title.as_str());
            current = self.nodes[i].parent;
        }
        if self.nodes[idx].in_appendix {
            path.push(APPENDIX_SEGMENT);
        }
        path.reverse();
        path
    }

    pub fn path_string(&self, idx: usize) -> String {
        self.path(idx).join(" > ")
    }

    /// Finds the single node whose path ends with the query's segments.
    pub fn find(&self, query: &str) -> Result<usize, SectionError> {
        let segments: Vec<String> = query
            .split(PATH_SEPARATOR)
            .map(normalize)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Err(SectionError::NotFound(query.to_string()));
        }

        let matches: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| {
                let path: Vec<String> = self.path(idx).into_iter().map(normalize).collect();
                path.ends_with(&segments)
            })
            .collect();

        match matches.as_slice() {
            [] => Err(SectionError::NotFound(query.to_string())),
            [only] => Ok(*only),
            many => Err(SectionError::Ambiguous {
                query: query.to_string(),
                paths: many.iter().map(|&idx| self.path_string(idx)).collect(),
            }),
        }
    }

    /// Body text of the section named by `query`.
    pub fn section_text(&self, text: &str, query: &str) -> Result<String, SectionError> {
        let idx = self.find(query)?;
        let node = &self.nodes[idx];
        tracing::debug!("Section '{}' resolved to '{}'", query, self.path_string(idx));
        Ok(node.spans.iter().map(|span| &text[span.clone()]).collect())
    }

    /// Titles only, two spaces per level. Appendix sections are listed under
    /// an `Appendix` line.
    pub fn render_listing(&self) -> String {
        let mut out = String::new();
        let mut appendix_listed = false;
        for &root in &self.roots {
            let indent = if self.nodes[root].in_appendix {
                if !appendix_listed {
                    out.push_str(APPENDIX_SEGMENT);
                    out.push('\n');
                    appendix_listed = true;
                }
                1
            } else {
                0
            };
            self.render_node(root, indent, &mut out);
        }
        out
    }

    fn render_node(&self, idx: usize, depth: usize, out: &mut String) {
        let node = &self.nodes[idx];
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.title);
        out.push('\n');
        for &child in &node.children {
            self.render_node(child, depth + 1, out);
        }
    }
}
