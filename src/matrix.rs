//! Feature matrix assembly.
//!
//! Construction happens in two phases with two representations:
//!
//! 1. [`RelationBlock`] keeps one sorted column set per row, so each closure
//!    pair is a cheap single-cell write.
//! 2. [`FeatureMatrix`] freezes the relation rows, plus any attribute block,
//!    into CSR form for row slicing.

use crate::closure::SubsumptionPair;
use crate::error::{EncoderError, Result};
use crate::vectorize::AttributeBlock;
use sprs::{CsMat, CsVecView};
use std::collections::{BTreeSet, HashMap};

/// Stable mapping from code to row (and relation column).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeIndex {
    codes: Vec<String>,
    positions: HashMap<String, usize>,
}

impl CodeIndex {
    /// Index codes in order of first appearance. Repeats are ignored.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for code in codes {
            let code = code.into();
            if !index.positions.contains_key(&code) {
                index.positions.insert(code.clone(), index.codes.len());
                index.codes.push(code);
            }
        }
        index
    }

    pub fn get(&self, code: &str) -> Option<usize> {
        self.positions.get(code).copied()
    }

    /// Position of `code`, or [`EncoderError::UnknownCode`].
    pub fn position(&self, code: &str) -> Result<usize> {
        self.get(code)
            .ok_or_else(|| EncoderError::UnknownCode(code.to_string()))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.positions.contains_key(code)
    }

    /// Codes in index order.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Square code × code subsumption block, optimized for single-cell writes.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationBlock {
    rows: Vec<BTreeSet<usize>>,
}

impl RelationBlock {
    /// One-hot base: every code is related to itself.
    pub fn identity(n: usize) -> Self {
        Self {
            rows: (0..n).map(|i| BTreeSet::from([i])).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Set cell `(row, col)`. Returns `false` if it was already set.
    ///
    /// # Panics
    /// If `row` or `col` is outside the block.
    pub fn set(&mut self, row: usize, col: usize) -> bool {
        assert!(col < self.rows.len(), "column {} out of bounds", col);
        self.rows[row].insert(col)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.contains(&col))
    }

    /// Record that `pair.source` is subsumed by `pair.target`.
    ///
    /// Both codes must be in `index`; the block is sized from it.
    pub fn insert(&mut self, index: &CodeIndex, pair: &SubsumptionPair) -> Result<bool> {
        let row = index.position(&pair.source)?;
        let col = index.position(&pair.target)?;
        Ok(self.set(row, col))
    }

    /// Columns set in `row`, ascending.
    pub fn row(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[row].iter().copied()
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BTreeSet::len).sum()
    }
}

/// Read-only CSR feature matrix with column labels.
#[derive(Clone, Debug)]
pub struct FeatureMatrix {
    matrix: CsMat<f64>,
    feature_names: Vec<String>,
    relation_cols: usize,
}

impl FeatureMatrix {
    /// Concatenate the relation block and optional attribute block column-wise.
    ///
    /// Relation columns are labelled with the indexed codes, attribute
    /// columns with their feature names.
    pub fn assemble(
        index: &CodeIndex,
        relations: RelationBlock,
        attributes: Option<AttributeBlock>,
    ) -> Result<Self> {
        let n = index.len();
        if relations.len() != n {
            return Err(EncoderError::Shape(format!(
                "relation block has {} rows, index has {} codes",
                relations.len(),
                n
            )));
        }
        let attributes = attributes.unwrap_or_else(|| AttributeBlock {
            feature_names: Vec::new(),
            rows: vec![Vec::new(); n],
        });
        if attributes.n_rows() != n {
            return Err(EncoderError::Shape(format!(
                "attribute block has {} rows, index has {} codes",
                attributes.n_rows(),
                n
            )));
        }

        let n_cols = n + attributes.n_cols();
        let mut indptr = Vec::with_capacity(n + 1);
        let mut indices = Vec::with_capacity(relations.nnz() + attributes.nnz());
        let mut data = Vec::with_capacity(indices.capacity());
        indptr.push(0);

        for (row, attribute_row) in attributes.rows.iter().enumerate() {
            for col in relations.row(row) {
                indices.push(col);
                data.push(1.0);
            }
            for &(col, value) in attribute_row {
                indices.push(n + col);
                data.push(value);
            }
            indptr.push(indices.len());
        }

        let mut feature_names = index.codes().to_vec();
        feature_names.extend(attributes.feature_names);

        Ok(Self {
            matrix: CsMat::new((n, n_cols), indptr, indices, data),
            feature_names,
            relation_cols: n,
        })
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.matrix.rows(), self.matrix.cols())
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Column labels: codes, then attribute features.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of leading subsumption columns.
    pub fn relation_cols(&self) -> usize {
        self.relation_cols
    }

    /// Underlying CSR matrix.
    pub fn csr(&self) -> &CsMat<f64> {
        &self.matrix
    }

    pub fn row(&self, row: usize) -> Option<CsVecView<'_, f64>> {
        self.matrix.outer_view(row)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.matrix.get(row, col).copied()
    }

    /// Gather rows in the given order; repeats are allowed.
    ///
    /// # Panics
    /// If any row index is out of bounds.
    pub fn select_rows(&self, rows: &[usize]) -> CsMat<f64> {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        for &row in rows {
            let view = self
                .matrix
                .outer_view(row)
                .unwrap_or_else(|| panic!("row {} out of bounds", row));
            for (col, &value) in view.iter() {
                indices.push(col);
                data.push(value);
            }
            indptr.push(indices.len());
        }

        CsMat::new((rows.len(), self.matrix.cols()), indptr, indices, data)
    }
}

/// Concatenate CSR blocks with equal row counts column-wise.
pub fn hstack(blocks: &[CsMat<f64>]) -> Result<CsMat<f64>> {
    let Some(first) = blocks.first() else {
        return Err(EncoderError::Shape("nothing to stack".to_string()));
    };
    let n_rows = first.rows();
    if let Some(block) = blocks.iter().find(|b| b.rows() != n_rows) {
        return Err(EncoderError::Shape(format!(
            "cannot stack blocks with {} and {} rows",
            n_rows,
            block.rows()
        )));
    }

    let n_cols: usize = blocks.iter().map(|b| b.cols()).sum();
    let mut indptr = Vec::with_capacity(n_rows + 1);
    let mut indices = Vec::with_capacity(blocks.iter().map(|b| b.nnz()).sum());
    let mut data = Vec::with_capacity(indices.capacity());
    indptr.push(0);

    for row in 0..n_rows {
        let mut offset = 0;
        for block in blocks {
            if let Some(view) = block.outer_view(row) {
                for (col, &value) in view.iter() {
                    indices.push(offset + col);
                    data.push(value);
                }
            }
            offset += block.cols();
        }
        indptr.push(indices.len());
    }

    Ok(CsMat::new((n_rows, n_cols), indptr, indices, data))
}
