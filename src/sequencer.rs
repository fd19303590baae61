//! Picks which image to show next from the flat collection.
//!
//! The position is tracked by path rather than by number, so removals
//! anywhere in the collection never make the sequencer skip or repeat.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PlayMode;

/// One selection: the index it had at pick time and the path it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Unset,
    /// `path` is the current image.
    At { path: PathBuf, hint: usize },
    /// The current image was removed; `path` took its place.
    Before { path: PathBuf, hint: usize },
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    items: Vec<PathBuf>,
    cursor: Cursor,
    mode: PlayMode,
    rng: StdRng,
}

impl Sequencer {
    #[must_use]
    pub fn new(mode: PlayMode, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            items: Vec::new(),
            cursor: Cursor::Unset,
            mode,
            rng,
        }
    }

    /// Swap in a freshly scanned collection and forget the old position.
    pub fn replace(&mut self, items: Vec<PathBuf>) {
        self.items = items;
        self.cursor = Cursor::Unset;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    #[must_use]
    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.items
    }

    /// Index of the current image, re-resolved against the current collection.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match &self.cursor {
            Cursor::At { path, hint } => self.locate(path, *hint),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        match &self.cursor {
            Cursor::At { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }

    /// Advance. Ordered mode wraps to the first image past the end; random
    /// mode has no direction.
    pub fn next(&mut self) -> Option<Pick> {
        if self.items.is_empty() {
            return None;
        }
        if self.mode == PlayMode::Random {
            return self.random();
        }
        let len = self.items.len();
        let index = match self.resolve() {
            Resolved::Unset => 0,
            Resolved::At(i) => (i + 1) % len,
            Resolved::Before(i) => i,
        };
        self.at(index)
    }

    /// Step back. Ordered mode wraps to the last image below the first.
    pub fn previous(&mut self) -> Option<Pick> {
        if self.items.is_empty() {
            return None;
        }
        if self.mode == PlayMode::Random {
            return self.random();
        }
        let len = self.items.len();
        let index = match self.resolve() {
            Resolved::Unset => len - 1,
            Resolved::At(i) | Resolved::Before(i) => (i + len - 1) % len,
        };
        self.at(index)
    }

    /// Select `index`. Out of range yields `None` and leaves the position alone.
    pub fn at(&mut self, index: usize) -> Option<Pick> {
        let path = self.items.get(index)?.clone();
        self.cursor = Cursor::At {
            path: path.clone(),
            hint: index,
        };
        Some(Pick { index, path })
    }

    /// Move the position back to `path` without producing a pick. A path that
    /// is missing (or `None`) forgets the position.
    pub fn restore(&mut self, path: Option<&Path>) {
        let hint = match &self.cursor {
            Cursor::At { hint, .. } | Cursor::Before { hint, .. } => *hint,
            Cursor::Unset => 0,
        };
        self.cursor = match path.and_then(|p| self.locate(p, hint)) {
            Some(index) => Cursor::At {
                path: self.items[index].clone(),
                hint: index,
            },
            None => Cursor::Unset,
        };
    }

    /// Select a uniformly random image.
    pub fn random(&mut self) -> Option<Pick> {
        if self.items.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..self.items.len());
        self.at(index)
    }

    /// Remove `path` from the collection.
    ///
    /// If it was the current image, the image that slid into its slot becomes
    /// the anchor for the next pick (wrapping to the first image when the last
    /// one was removed).
    pub fn remove(&mut self, path: &Path) -> bool {
        let Some(pos) = self.items.iter().position(|p| p == path) else {
            return false;
        };
        self.items.remove(pos);

        let anchored_here = match &self.cursor {
            Cursor::At { path: p, .. } | Cursor::Before { path: p, .. } => p == path,
            Cursor::Unset => false,
        };
        if anchored_here {
            self.cursor = if self.items.is_empty() {
                Cursor::Unset
            } else {
                let hint = pos % self.items.len();
                Cursor::Before {
                    path: self.items[hint].clone(),
                    hint,
                }
            };
        }
        true
    }

    fn resolve(&self) -> Resolved {
        match &self.cursor {
            Cursor::Unset => Resolved::Unset,
            Cursor::At { path, hint } => self
                .locate(path, *hint)
                .map_or(Resolved::Unset, Resolved::At),
            Cursor::Before { path, hint } => self
                .locate(path, *hint)
                .map_or(Resolved::Unset, Resolved::Before),
        }
    }

    fn locate(&self, path: &Path, hint: usize) -> Option<usize> {
        if self.items.get(hint).is_some_and(|p| p == path) {
            return Some(hint);
        }
        self.items.iter().position(|p| p == path)
    }
}

#[derive(Debug, Clone, Copy)]
enum Resolved {
    Unset,
    At(usize),
    Before(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(names: &[&str]) -> Sequencer {
        let mut seq = Sequencer::new(PlayMode::Ordered, Some(7));
        seq.replace(names.iter().map(PathBuf::from).collect());
        seq
    }

    #[test]
    fn ordered_wraps_in_both_directions() {
        let mut seq = ordered(&["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(seq.at(2).unwrap().path, PathBuf::from("c.jpg"));
        let next = seq.next().unwrap();
        assert_eq!((next.index, next.path), (0, PathBuf::from("a.jpg")));
        let prev = seq.previous().unwrap();
        assert_eq!((prev.index, prev.path), (2, PathBuf::from("c.jpg")));
    }

    #[test]
    fn ordered_full_lap_visits_each_once() {
        let names = ["a", "b", "c", "d", "e"];
        let mut seq = ordered(&names);
        seq.at(0).unwrap();
        let mut seen = vec![0usize];
        for _ in 0..names.len() {
            seen.push(seq.next().unwrap().index);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn first_pick_without_position() {
        let mut seq = ordered(&["a", "b", "c"]);
        assert_eq!(seq.next().unwrap().index, 0);
        let mut seq = ordered(&["a", "b", "c"]);
        assert_eq!(seq.previous().unwrap().index, 2);
    }

    #[test]
    fn out_of_range_at_reports_nothing() {
        let mut seq = ordered(&["a", "b"]);
        seq.at(1).unwrap();
        assert!(seq.at(5).is_none());
        assert_eq!(seq.current_index(), Some(1));
    }

    #[test]
    fn random_picks_stay_in_collection() {
        let mut seq = Sequencer::new(PlayMode::Random, Some(42));
        let items: Vec<PathBuf> = ["x", "y", "z"].iter().map(PathBuf::from).collect();
        seq.replace(items.clone());
        for _ in 0..100 {
            let pick = seq.next().unwrap();
            assert!(pick.index < items.len());
            assert_eq!(items[pick.index], pick.path);
            let pick = seq.previous().unwrap();
            assert!(items.contains(&pick.path));
        }
    }

    #[test]
    fn empty_collection_yields_nothing() {
        let mut seq = Sequencer::new(PlayMode::Random, None);
        assert!(seq.next().is_none());
        assert!(seq.previous().is_none());
        assert!(seq.random().is_none());
        seq.set_mode(PlayMode::Ordered);
        assert!(seq.next().is_none());
    }

    #[test]
    fn removing_current_resumes_at_successor() {
        let mut seq = ordered(&["a", "b", "c", "d"]);
        seq.at(1).unwrap();
        assert!(seq.remove(Path::new("b")));
        assert_eq!(seq.current_index(), None);
        assert_eq!(seq.next().unwrap().path, PathBuf::from("c"));

        seq.at(1).unwrap(); // "c"
        seq.remove(Path::new("c"));
        assert_eq!(seq.previous().unwrap().path, PathBuf::from("a"));
    }

    #[test]
    fn removing_last_current_wraps_to_first() {
        let mut seq = ordered(&["a", "b", "c"]);
        seq.at(2).unwrap();
        seq.remove(Path::new("c"));
        assert_eq!(seq.next().unwrap().path, PathBuf::from("a"));
    }

    #[test]
    fn removing_earlier_path_keeps_identity() {
        let mut seq = ordered(&["a", "b", "c", "d"]);
        seq.at(2).unwrap(); // "c"
        seq.remove(Path::new("a"));
        assert_eq!(seq.current_index(), Some(1));
        assert_eq!(seq.current_path(), Some(Path::new("c")));
        assert_eq!(seq.next().unwrap().path, PathBuf::from("d"));
    }

    #[test]
    fn restore_returns_to_shown_image() {
        let mut seq = ordered(&["a", "b", "c"]);
        seq.at(0).unwrap();
        seq.next().unwrap(); // "b" picked but never shown
        seq.restore(Some(Path::new("a")));
        assert_eq!(seq.current_path(), Some(Path::new("a")));
        assert_eq!(seq.next().unwrap().path, PathBuf::from("b"));

        seq.restore(Some(Path::new("gone")));
        assert_eq!(seq.current_index(), None);
        assert_eq!(seq.next().unwrap().index, 0);

        seq.restore(None);
        assert_eq!(seq.previous().unwrap().index, 2);
    }

    #[test]
    fn removing_everything_resets() {
        let mut seq = ordered(&["a"]);
        seq.at(0).unwrap();
        seq.remove(Path::new("a"));
        assert!(seq.is_empty());
        assert!(seq.next().is_none());
        assert!(!seq.remove(Path::new("a")));
    }
}
