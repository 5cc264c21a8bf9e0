//! Client-side explorer state.
//!
//! A [`Navigator`] tracks where the user is below a fixed base prefix (an
//! opportunity root); a [`Selection`] tracks which keys are checked.  The
//! [`Explorer`] ties them to the last listing fetched from the API.  None
//! of this talks to the store: callers issue the HTTP request for
//! [`Navigator::current_prefix`] and feed the result to
//! [`Explorer::apply_listing`].

use std::collections::BTreeSet;
use thiserror::Error;

use crate::storage::backend::DELIMITER;
use crate::vfs::Listing;

/// Rejected navigation transitions.  State is unchanged on error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Already at the base folder")]
    AtBase,

    #[error("Invalid folder name: {0:?}")]
    InvalidSegment(String),

    /// Breadcrumb index lies inside the fixed base prefix.
    #[error("Breadcrumb {index} is above the base folder")]
    AboveBase { index: usize },

    #[error("Breadcrumb {index} is out of range")]
    OutOfRange { index: usize },
}

/// One breadcrumb in the full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub label: String,
    pub index: usize,
    /// Base segments cannot be navigated to.
    pub navigable: bool,
    pub is_last: bool,
}

/// Path state below a fixed base prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    base_prefix: String,
    base_segments: Vec<String>,
    path: Vec<String>,
}

impl Navigator {
    /// Start at `base_prefix`, normalised to end in `/` unless empty.
    pub fn new(base_prefix: &str) -> Self {
        let base_segments: Vec<String> = base_prefix
            .split(DELIMITER)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let base_prefix = if base_segments.is_empty() {
            String::new()
        } else {
            format!("{}{DELIMITER}", base_segments.join(DELIMITER))
        };
        Self {
            base_prefix,
            base_segments,
            path: Vec::new(),
        }
    }

    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    /// Segments below the base.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn at_base(&self) -> bool {
        self.path.is_empty()
    }

    /// Prefix to list for the current location.
    pub fn current_prefix(&self) -> String {
        if self.path.is_empty() {
            self.base_prefix.clone()
        } else {
            format!(
                "{}{}{DELIMITER}",
                self.base_prefix,
                self.path.join(DELIMITER)
            )
        }
    }

    /// Enter child folder `folder`.
    pub fn descend(&mut self, folder: &str) -> Result<(), NavigationError> {
        if folder.is_empty() || folder.contains(DELIMITER) {
            return Err(NavigationError::InvalidSegment(folder.to_string()));
        }
        self.path.push(folder.to_string());
        Ok(())
    }

    /// Go back one level.  Not allowed at the base.
    pub fn ascend(&mut self) -> Result<(), NavigationError> {
        self.path.pop().map(|_| ()).ok_or(NavigationError::AtBase)
    }

    /// Truncate to breadcrumb `index` (base segments first, then path).
    pub fn jump_to(&mut self, index: usize) -> Result<(), NavigationError> {
        let offset = self.base_segments.len();
        if index >= offset + self.path.len() {
            return Err(NavigationError::OutOfRange { index });
        }
        if index < offset {
            return Err(NavigationError::AboveBase { index });
        }
        self.path.truncate(index - offset + 1);
        Ok(())
    }

    /// Breadcrumbs for the full path, base segments first.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let offset = self.base_segments.len();
        let total = offset + self.path.len();
        self.base_segments
            .iter()
            .chain(self.path.iter())
            .enumerate()
            .map(|(index, label)| Breadcrumb {
                label: label.clone(),
                index,
                navigable: index >= offset,
                is_last: index + 1 == total,
            })
            .collect()
    }
}

/// Set of checked keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    keys: BTreeSet<String>,
}

impl Selection {
    /// Flip `key` in or out of the selection.  Returns whether it is now selected.
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.keys.remove(key) {
            false
        } else {
            self.keys.insert(key.to_string());
            true
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    /// Rename works on exactly one key.
    pub fn can_rename(&self) -> bool {
        self.keys.len() == 1
    }

    pub fn can_delete(&self) -> bool {
        !self.keys.is_empty()
    }

    /// The key to rename, when exactly one is selected.
    pub fn rename_candidate(&self) -> Option<&str> {
        if self.can_rename() {
            self.keys.iter().next().map(String::as_str)
        } else {
            None
        }
    }
}

/// Sibling key for renaming `old_key` to `new_name`.
///
/// Folder keys keep their trailing `/`.  Returns `None` for an empty or
/// unchanged name, or a name containing `/`.
pub fn rename_target(old_key: &str, new_name: &str) -> Option<String> {
    let is_folder = old_key.ends_with(DELIMITER);
    let trimmed = old_key.strip_suffix(DELIMITER).unwrap_or(old_key);
    let (parent, old_name) = match trimmed.rfind(DELIMITER) {
        Some(pos) => trimmed.split_at(pos + 1),
        None => ("", trimmed),
    };
    if new_name.is_empty() || new_name == old_name || new_name.contains(DELIMITER) {
        return None;
    }
    let suffix = if is_folder { DELIMITER } else { "" };
    Some(format!("{parent}{new_name}{suffix}"))
}

/// Navigator, selection and the last listing, as one view.
#[derive(Debug, Clone)]
pub struct Explorer {
    pub navigator: Navigator,
    pub selection: Selection,
    listing: Listing,
}

impl Explorer {
    pub fn new(base_prefix: &str) -> Self {
        let navigator = Navigator::new(base_prefix);
        let listing = Listing {
            prefix: navigator.current_prefix(),
            entries: Vec::new(),
        };
        Self {
            navigator,
            selection: Selection::default(),
            listing,
        }
    }

    /// Replace the displayed listing and clear the selection.
    pub fn apply_listing(&mut self, listing: Listing) {
        self.listing = listing;
        self.selection.clear();
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    /// Whether the displayed listing matches the current location.
    pub fn is_stale(&self) -> bool {
        self.listing.prefix != self.navigator.current_prefix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::Entry;

    #[test]
    fn test_base_prefix_normalised() {
        assert_eq!(
            Navigator::new("acme/opportunities/deal1").base_prefix(),
            "acme/opportunities/deal1/"
        );
        assert_eq!(
            Navigator::new("acme/opportunities/deal1/").base_prefix(),
            "acme/opportunities/deal1/"
        );
        assert_eq!(Navigator::new("").base_prefix(), "");
    }

    #[test]
    fn test_descend_and_ascend() {
        let mut nav = Navigator::new("acme/opportunities/deal1/");
        assert_eq!(nav.current_prefix(), "acme/opportunities/deal1/");

        nav.descend("drafts").unwrap();
        nav.descend("v2").unwrap();
        assert_eq!(nav.current_prefix(), "acme/opportunities/deal1/drafts/v2/");

        nav.ascend().unwrap();
        assert_eq!(nav.current_prefix(), "acme/opportunities/deal1/drafts/");
        nav.ascend().unwrap();
        assert!(nav.at_base());
        assert_eq!(nav.ascend(), Err(NavigationError::AtBase));
        assert_eq!(nav.current_prefix(), "acme/opportunities/deal1/");
    }

    #[test]
    fn test_descend_rejects_bad_segments() {
        let mut nav = Navigator::new("a/");
        assert!(nav.descend("").is_err());
        assert!(nav.descend("x/y").is_err());
        assert!(nav.at_base());
    }

    #[test]
    fn test_jump_to() {
        let mut nav = Navigator::new("acme/opportunities/deal1/");
        for seg in ["a", "b", "c"] {
            nav.descend(seg).unwrap();
        }
        // Base occupies indices 0..3; "a" is index 3.
        nav.jump_to(4).unwrap();
        assert_eq!(nav.path(), ["a", "b"]);
        assert_eq!(nav.current_prefix(), "acme/opportunities/deal1/a/b/");

        assert_eq!(nav.jump_to(1), Err(NavigationError::AboveBase { index: 1 }));
        assert_eq!(nav.jump_to(9), Err(NavigationError::OutOfRange { index: 9 }));
        assert_eq!(nav.path(), ["a", "b"]);

        nav.jump_to(3).unwrap();
        assert_eq!(nav.path(), ["a"]);
    }

    #[test]
    fn test_jump_to_last_base_segment_is_rejected() {
        let mut nav = Navigator::new("p/opportunities/o/");
        nav.descend("x").unwrap();
        assert!(nav.jump_to(2).is_err());
        assert_eq!(nav.path(), ["x"]);
    }

    #[test]
    fn test_breadcrumbs() {
        let mut nav = Navigator::new("p/opportunities/o/");
        nav.descend("x").unwrap();
        let crumbs = nav.breadcrumbs();
        let labels: Vec<&str> = crumbs.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["p", "opportunities", "o", "x"]);
        assert!(crumbs[..3].iter().all(|c| !c.navigable));
        assert!(crumbs[3].navigable);
        assert!(crumbs[3].is_last);
        assert!(!crumbs[2].is_last);
    }

    #[test]
    fn test_selection_guards() {
        let mut sel = Selection::default();
        assert!(!sel.can_rename());
        assert!(!sel.can_delete());

        assert!(sel.toggle("a/x.txt"));
        assert!(sel.can_rename());
        assert!(sel.can_delete());
        assert_eq!(sel.rename_candidate(), Some("a/x.txt"));

        sel.toggle("a/sub/");
        assert!(!sel.can_rename());
        assert!(sel.can_delete());
        assert_eq!(sel.rename_candidate(), None);

        assert!(!sel.toggle("a/x.txt"));
        assert_eq!(sel.keys(), vec!["a/sub/"]);
    }

    #[test]
    fn test_rename_target() {
        assert_eq!(
            rename_target("acme/deal1/spec.pdf", "spec_v2.pdf").as_deref(),
            Some("acme/deal1/spec_v2.pdf")
        );
        assert_eq!(
            rename_target("acme/deal1/drafts/", "final").as_deref(),
            Some("acme/deal1/final/")
        );
        assert_eq!(rename_target("top.txt", "other.txt").as_deref(), Some("other.txt"));
        assert_eq!(rename_target("acme/a.txt", "a.txt"), None);
        assert_eq!(rename_target("acme/a.txt", ""), None);
        assert_eq!(rename_target("acme/a.txt", "x/y"), None);
    }

    #[test]
    fn test_rename_target_repeated_name_in_path() {
        // Only the last segment changes even when the name repeats above it.
        assert_eq!(
            rename_target("plan/plan", "draft").as_deref(),
            Some("plan/draft")
        );
    }

    #[test]
    fn test_apply_listing_clears_selection() {
        let mut explorer = Explorer::new("acme/opportunities/deal1/");
        explorer.selection.toggle("acme/opportunities/deal1/a.txt");
        explorer.navigator.descend("sub").unwrap();
        assert!(explorer.is_stale());

        explorer.apply_listing(Listing {
            prefix: "acme/opportunities/deal1/sub/".into(),
            entries: vec![Entry::Folder {
                name: "inner".into(),
                marker_key: "acme/opportunities/deal1/sub/inner/".into(),
            }],
        });
        assert!(explorer.selection.is_empty());
        assert!(!explorer.is_stale());
        assert_eq!(explorer.listing().folder_names(), vec!["inner"]);
    }
}
