/* src/server/markdoc/rust/src/layout.rs */

use std::path::{Path, PathBuf};

use crate::context::MarkdownMeta;

pub const LAYOUT_FILE: &str = "+layout.md";

pub fn is_layout(file: &Path) -> bool {
  file.file_name().is_some_and(|name| name == LAYOUT_FILE)
}

/// Layout files in `file`'s ancestor directories up to `root`, outermost first.
pub fn find_layouts(root: &Path, file: &Path) -> Vec<PathBuf> {
  if !file.starts_with(root) {
    return Vec::new();
  }
  let mut layouts = Vec::new();
  for dir in file.ancestors().skip(1) {
    if !dir.starts_with(root) {
      break;
    }
    let candidate = dir.join(LAYOUT_FILE);
    if candidate.is_file() {
      layouts.push(candidate);
    }
  }
  layouts.reverse();
  layouts
}

/// Fold layout metadata (outermost first) into a page's own metadata.
pub fn merge(page: &mut MarkdownMeta, layouts: &[&MarkdownMeta]) {
  for layout in layouts.iter().rev() {
    if page.title.is_none() {
      page.title = layout.title.clone();
    }

    let at = layout.slot.unwrap_or(layout.headings.len()).min(layout.headings.len());
    let mut headings = layout.headings[..at].to_vec();
    headings.append(&mut page.headings);
    headings.extend_from_slice(&layout.headings[at..]);
    page.headings = headings;

    page.last_modified = match (page.last_modified, layout.last_modified) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    };
  }

  let mut frontmatter = serde_json::Map::new();
  for layout in layouts {
    frontmatter.extend(layout.frontmatter.clone());
  }
  frontmatter.extend(std::mem::take(&mut page.frontmatter));
  page.frontmatter = frontmatter;
}
