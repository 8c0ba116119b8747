//! The `cells()` accessor: typed views, positional selection and
//! assignment by index, slice or boolean mask.

use std::ops::RangeBounds;

use notebox_shared::{CellType, NoteboxError, Result};

use crate::cell::Cell;
use crate::filter::CellFilter;
use crate::notebook::{Notebook, resolve_range};
use crate::outputs::Outputs;

/// Read-only view over a notebook's cells.
#[derive(Debug, Clone, Copy)]
pub struct Cells<'a> {
    cells: &'a [Cell],
}

impl<'a> Cells<'a> {
    pub(crate) fn new(cells: &'a [Cell]) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Cell> {
        self.cells.iter()
    }

    pub fn get(&self, index: usize) -> Option<&'a Cell> {
        self.cells.get(index)
    }

    fn of_type(&self, cell_type: CellType) -> Vec<&'a Cell> {
        self.cells
            .iter()
            .filter(|c| c.cell_type() == cell_type)
            .collect()
    }

    pub fn code(&self) -> Vec<&'a Cell> {
        self.of_type(CellType::Code)
    }

    pub fn markdown(&self) -> Vec<&'a Cell> {
        self.of_type(CellType::Markdown)
    }

    pub fn raw(&self) -> Vec<&'a Cell> {
        self.of_type(CellType::Raw)
    }

    /// Code cells holding an error output.
    pub fn errors(&self) -> Vec<&'a Cell> {
        self.cells.iter().filter(|c| c.has_error()).collect()
    }

    /// The outputs of every code cell, in cell order.
    pub fn outputs(&self) -> Vec<Outputs<'a>> {
        self.cells
            .iter()
            .filter(|c| c.cell_type() == CellType::Code)
            .map(Cell::outputs)
            .collect()
    }

    pub fn slice(&self, range: impl RangeBounds<usize>) -> Result<&'a [Cell]> {
        let range = resolve_range(range, self.cells.len())?;
        Ok(&self.cells[range])
    }

    /// Cells at the `true` positions of `mask`, which must be as long as
    /// the notebook.
    pub fn mask(&self, mask: &[bool]) -> Result<Vec<&'a Cell>> {
        check_mask(mask, self.cells.len())?;
        Ok(self
            .cells
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(cell, _)| cell)
            .collect())
    }

    /// Cells at `indices`, in the order given.
    pub fn take(&self, indices: &[usize]) -> Result<Vec<&'a Cell>> {
        indices
            .iter()
            .map(|&index| {
                self.cells.get(index).ok_or(NoteboxError::Index {
                    index,
                    len: self.cells.len(),
                })
            })
            .collect()
    }

    pub fn filter(&self, filter: &CellFilter) -> Vec<&'a Cell> {
        self.cells.iter().filter(|c| filter.matches(c)).collect()
    }

    pub fn exclude(&self, filter: &CellFilter) -> Vec<&'a Cell> {
        self.cells.iter().filter(|c| !filter.matches(c)).collect()
    }
}

impl<'a> IntoIterator for Cells<'a> {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

fn check_mask(mask: &[bool], len: usize) -> Result<()> {
    if mask.len() == len {
        Ok(())
    } else {
        Err(NoteboxError::Index {
            index: mask.len(),
            len,
        })
    }
}

/// Mutable accessor over a notebook's cells.
///
/// Incoming cells are given ids that fit the notebook's format version.
#[derive(Debug)]
pub struct CellsMut<'a> {
    notebook: &'a mut Notebook,
}

impl<'a> CellsMut<'a> {
    pub(crate) fn new(notebook: &'a mut Notebook) -> Self {
        Self { notebook }
    }

    fn len(&self) -> usize {
        self.notebook.len()
    }

    fn out_of_range(&self, index: usize) -> NoteboxError {
        NoteboxError::Index {
            index,
            len: self.len(),
        }
    }

    /// Replace the cell at `index`, returning the old one.
    pub fn set(&mut self, index: usize, cell: Cell) -> Result<Cell> {
        if index >= self.len() {
            return Err(self.out_of_range(index));
        }
        let cell = self.notebook.adopt(cell);
        Ok(std::mem::replace(
            &mut self.notebook.raw_cells_mut()[index],
            cell,
        ))
    }

    /// Replace the cells in `range` with `cells` (any count), returning the
    /// removed ones.
    pub fn set_slice(
        &mut self,
        range: impl RangeBounds<usize>,
        cells: impl IntoIterator<Item = Cell>,
    ) -> Result<Vec<Cell>> {
        let range = resolve_range(range, self.len())?;
        let incoming: Vec<Cell> = cells.into_iter().collect();
        let mut adopted = Vec::with_capacity(incoming.len());
        for cell in incoming {
            let cell = self.notebook.adopt(cell);
            adopted.push(cell);
        }
        Ok(self
            .notebook
            .raw_cells_mut()
            .splice(range, adopted)
            .collect())
    }

    /// Assign `cells`, in order, to the `true` positions of `mask`.
    pub fn set_masked(&mut self, mask: &[bool], cells: Vec<Cell>) -> Result<()> {
        check_mask(mask, self.len())?;
        let positions: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(i, _)| i)
            .collect();
        self.set_indexed(&positions, cells)
    }

    /// Assign `cells[k]` to position `indices[k]`.
    pub fn set_indexed(&mut self, indices: &[usize], cells: Vec<Cell>) -> Result<()> {
        if indices.len() != cells.len() {
            return Err(NoteboxError::Index {
                index: cells.len(),
                len: indices.len(),
            });
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(self.out_of_range(bad));
        }
        for (&index, cell) in indices.iter().zip(cells) {
            self.set(index, cell)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Cell> {
        if index >= self.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.notebook.raw_cells_mut().remove(index))
    }

    pub fn remove_range(&mut self, range: impl RangeBounds<usize>) -> Result<Vec<Cell>> {
        let range = resolve_range(range, self.len())?;
        Ok(self.notebook.raw_cells_mut().drain(range).collect())
    }

    /// Remove the cells at `indices` (any order, duplicates ignored),
    /// returning them in notebook order.
    pub fn remove_indexed(&mut self, indices: &[usize]) -> Result<Vec<Cell>> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(self.out_of_range(bad));
        }
        let cells = std::mem::take(self.notebook.raw_cells_mut());
        let (removed, kept): (Vec<_>, Vec<_>) = cells
            .into_iter()
            .enumerate()
            .partition(|(i, _)| indices.contains(i));
        *self.notebook.raw_cells_mut() = kept.into_iter().map(|(_, c)| c).collect();
        Ok(removed.into_iter().map(|(_, c)| c).collect())
    }

    /// Replace every cell.
    pub fn replace_all(&mut self, cells: impl IntoIterator<Item = Cell>) {
        self.clear();
        for cell in cells {
            self.notebook.push(cell);
        }
    }

    pub fn clear(&mut self) {
        self.notebook.raw_cells_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use notebox_shared::Output;

    use super::*;

    fn notebook() -> Notebook {
        Notebook::from_cells([
            Cell::markdown("# intro"),
            Cell::code("a = 1"),
            Cell::code("b")
                .with_outputs(vec![Output::error("NameError", "b", vec![])])
                .unwrap(),
            Cell::raw("raw"),
        ])
    }

    fn sources<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Vec<&'a str> {
        cells.into_iter().map(Cell::source).collect()
    }

    #[test]
    fn typed_views() {
        let nb = notebook();
        let cells = nb.cells();
        assert_eq!(sources(cells.code()), vec!["a = 1", "b"]);
        assert_eq!(sources(cells.markdown()), vec!["# intro"]);
        assert_eq!(sources(cells.raw()), vec!["raw"]);
        assert_eq!(sources(cells.errors()), vec!["b"]);
        let outputs = cells.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].errors().len(), 1);
    }

    #[test]
    fn positional_selection() {
        let nb = notebook();
        let cells = nb.cells();
        assert_eq!(sources(cells.slice(1..3).unwrap()), vec!["a = 1", "b"]);
        assert_eq!(
            sources(cells.mask(&[true, false, false, true]).unwrap()),
            vec!["# intro", "raw"]
        );
        assert!(cells.mask(&[true]).is_err());
        assert_eq!(sources(cells.take(&[3, 0]).unwrap()), vec!["raw", "# intro"]);
        assert!(matches!(
            cells.take(&[9]).unwrap_err(),
            NoteboxError::Index { index: 9, len: 4 }
        ));
    }

    #[test]
    fn filter_and_exclude() {
        let nb = notebook();
        let code = CellFilter::new().cell_type(CellType::Code);
        assert_eq!(nb.cells().filter(&code).len(), 2);
        assert_eq!(sources(nb.cells().exclude(&code)), vec!["# intro", "raw"]);
    }

    #[test]
    fn masked_and_indexed_assignment() {
        let mut nb = notebook();
        nb.cells_mut()
            .set_masked(
                &[false, true, false, true],
                vec![Cell::code("x"), Cell::code("y")],
            )
            .unwrap();
        assert_eq!(sources(&nb), vec!["# intro", "x", "b", "y"]);

        nb.cells_mut()
            .set_indexed(&[0], vec![Cell::markdown("# new")])
            .unwrap();
        assert_eq!(nb[0].source(), "# new");

        assert!(nb.cells_mut().set_indexed(&[0, 1], vec![Cell::raw("")]).is_err());
        assert!(nb.cells_mut().set_indexed(&[7], vec![Cell::raw("")]).is_err());
    }

    #[test]
    fn removal_forms() {
        let mut nb = notebook();
        let removed = nb.cells_mut().remove_indexed(&[3, 0]).unwrap();
        assert_eq!(sources(&removed), vec!["# intro", "raw"]);
        assert_eq!(sources(&nb), vec!["a = 1", "b"]);

        let drained = nb.cells_mut().remove_range(..).unwrap();
        assert_eq!(drained.len(), 2);
        assert!(nb.is_empty());

        nb.cells_mut().replace_all([Cell::code("fresh")]);
        assert_eq!(sources(&nb), vec!["fresh"]);
        nb.cells_mut().clear();
        assert!(nb.is_empty());
    }
}
