use std::collections::BTreeSet;

/// Modifier state of a list click, already resolved by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Plain,
    Ctrl,
    Shift,
}

/// Multi-select state over the *filtered* item sequence.
///
/// Indices are positions in the filtered sequence, not the base one; the
/// owner clears (or explicitly restores) the selection whenever that
/// sequence is replaced. Observers are notified synchronously on every
/// mutation with the new sorted index list.
pub struct SelectionModel {
    selected: BTreeSet<usize>,
    last_clicked: Option<usize>,
    observers: Vec<Box<dyn FnMut(&[usize])>>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self {
            selected: BTreeSet::new(),
            last_clicked: None,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn FnMut(&[usize])>) {
        self.observers.push(observer);
    }

    /// Apply one click at `index` against a sequence of `len` items.
    /// Out-of-range clicks are ignored.
    pub fn click(&mut self, index: usize, kind: ClickKind, len: usize) {
        if index >= len {
            return;
        }
        match kind {
            ClickKind::Plain => {
                self.selected.clear();
                self.selected.insert(index);
                self.last_clicked = Some(index);
            }
            ClickKind::Ctrl => {
                if !self.selected.remove(&index) {
                    self.selected.insert(index);
                }
                self.last_clicked = Some(index);
            }
            ClickKind::Shift => {
                match self.last_clicked {
                    Some(anchor) => {
                        // Inclusive range replaces the prior selection; the
                        // anchor itself does not move.
                        let lo = anchor.min(index);
                        let hi = anchor.max(index).min(len - 1);
                        self.selected.clear();
                        self.selected.extend(lo..=hi);
                    }
                    None => {
                        self.selected.clear();
                        self.selected.insert(index);
                        self.last_clicked = Some(index);
                    }
                }
            }
        }
        self.notify();
    }

    /// Drop everything. Used on sequence replacement and filter changes.
    pub fn clear(&mut self) {
        let was_empty = self.selected.is_empty() && self.last_clicked.is_none();
        self.selected.clear();
        self.last_clicked = None;
        if !was_empty {
            self.notify();
        }
    }

    /// Best-effort restoration after a refresh: the orchestrator re-resolved
    /// the surviving indices by display name and hands them back.
    pub fn restore(&mut self, indices: &[usize], len: usize) {
        self.selected = indices.iter().copied().filter(|&i| i < len).collect();
        self.last_clicked = self.selected.iter().next_back().copied();
        self.notify();
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn indices(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    fn notify(&mut self) {
        let sorted: Vec<usize> = self.selected.iter().copied().collect();
        for obs in &mut self.observers {
            obs(&sorted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_plain_click_replaces_selection() {
        let mut sel = SelectionModel::new();
        sel.click(5, ClickKind::Plain, 10);
        assert_eq!(sel.indices(), vec![5]);
        sel.click(2, ClickKind::Plain, 10);
        assert_eq!(sel.indices(), vec![2]);
    }

    #[test]
    fn test_ctrl_click_toggles() {
        let mut sel = SelectionModel::new();
        sel.click(5, ClickKind::Plain, 10);
        sel.click(5, ClickKind::Ctrl, 10);
        assert!(sel.is_empty());
        sel.click(3, ClickKind::Ctrl, 10);
        sel.click(7, ClickKind::Ctrl, 10);
        assert_eq!(sel.indices(), vec![3, 7]);
    }

    #[test]
    fn test_shift_click_selects_inclusive_range() {
        let mut sel = SelectionModel::new();
        sel.click(2, ClickKind::Plain, 10);
        sel.click(7, ClickKind::Shift, 10);
        assert_eq!(sel.indices(), vec![2, 3, 4, 5, 6, 7]);

        // Range replaces, and works backwards from the same anchor.
        sel.click(0, ClickKind::Shift, 10);
        assert_eq!(sel.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_shift_click_without_anchor_acts_as_plain() {
        let mut sel = SelectionModel::new();
        sel.click(0, ClickKind::Shift, 10);
        assert_eq!(sel.indices(), vec![0]);
    }

    #[test]
    fn test_out_of_range_click_ignored() {
        let mut sel = SelectionModel::new();
        sel.click(10, ClickKind::Plain, 10);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_observer_sees_sorted_indices_synchronously() {
        let seen: Rc<RefCell<Vec<Vec<usize>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        let mut sel = SelectionModel::new();
        sel.add_observer(Box::new(move |ids| sink.borrow_mut().push(ids.to_vec())));

        sel.click(7, ClickKind::Plain, 10);
        sel.click(3, ClickKind::Ctrl, 10);
        assert_eq!(*seen.borrow(), vec![vec![7], vec![3, 7]]);
    }

    #[test]
    fn test_restore_filters_out_of_range() {
        let mut sel = SelectionModel::new();
        sel.restore(&[1, 4, 99], 5);
        assert_eq!(sel.indices(), vec![1, 4]);
    }

    #[test]
    fn test_clear_resets_anchor() {
        let mut sel = SelectionModel::new();
        sel.click(4, ClickKind::Plain, 10);
        sel.clear();
        sel.click(8, ClickKind::Shift, 10);
        // No anchor after clear: shift behaves like plain.
        assert_eq!(sel.indices(), vec![8]);
    }
}
