//! Base table scan
//!
//! The only node that touches storage directly. Optimization picks the
//! physical index whose ordering starts with the requested one; execution
//! opens a cursor on that index and applies any pushed-down equality
//! restriction as a key range.

use crate::data::cols::is_prefix;
use crate::data::{Dir, Fixed, Header, Keyrange, Record, Row};
use crate::storage::{IndexIter, TableDesc, Tran};

use super::errors::{QueryError, QueryResult};
use super::node::PlanState;

pub struct Scan {
    pub(crate) plan: PlanState,
    tran: Tran,
    desc: TableDesc,
    /// Index committed by freeze; defaults to the primary key.
    chosen: Vec<String>,
    range: Keyrange,
    iter: Option<Box<dyn IndexIter>>,
}

impl Scan {
    pub(crate) fn new(tran: Tran, table: &str) -> QueryResult<Scan> {
        let desc = tran
            .table(table)
            .ok_or_else(|| QueryError::unknown_table(table))?;
        let chosen = desc.keys[0].clone();
        Ok(Scan {
            plan: PlanState::default(),
            tran,
            desc,
            chosen,
            range: Keyrange::all(),
            iter: None,
        })
    }

    pub(crate) fn table_name(&self) -> &str {
        &self.desc.name
    }

    pub(crate) fn chosen_index(&self) -> &[String] {
        &self.chosen
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.desc.columns.clone()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        self.desc.keys.clone()
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        Vec::new()
    }

    pub(crate) fn header(&self) -> Header {
        Header::single(self.desc.columns.clone())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        self.desc.nrecords
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.desc.totalsize
    }

    fn columnsize(&self) -> u64 {
        let cells = self.desc.nrecords.max(1) * self.desc.columns.len().max(1) as u64;
        (self.desc.totalsize / cells).max(1)
    }

    /// Cost of reading the whole table through one physical index.
    fn index_cost(&self, ix: &[String]) -> f64 {
        let keysize = ix.len() as f64 * self.columnsize() as f64 * 2.0;
        self.desc.totalsize as f64 + self.desc.nrecords as f64 * keysize
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        _needs: &[String],
        _firstneeds: &[String],
        _is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        let mut best: Option<(Vec<String>, f64)> = None;
        for ix in self.desc.keys_and_indexes() {
            if !is_prefix(index, &ix) {
                continue;
            }
            let cost = self.index_cost(&ix);
            if best.as_ref().map_or(true, |(_, c)| cost < *c) {
                best = Some((ix, cost));
            }
        }
        match best {
            Some((ix, cost)) => {
                if freeze {
                    self.chosen = ix;
                }
                cost
            }
            None => crate::plan::cost::IMPOSSIBLE,
        }
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        if cols.is_empty() {
            self.range = Keyrange::all();
        } else {
            if !is_prefix(cols, &self.chosen) {
                return Err(QueryError::infeasible(format!(
                    "select columns ({}) are not a prefix of the scan index ({})",
                    cols.join(","),
                    self.chosen.join(",")
                )));
            }
            self.range = Keyrange::prefix(vals.clone(), vals.clone());
        }
        if let Some(iter) = &mut self.iter {
            iter.set_range(self.range.clone());
        }
        Ok(())
    }

    pub(crate) fn rewind(&mut self) {
        if let Some(iter) = &mut self.iter {
            iter.rewind();
        }
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        if self.iter.is_none() {
            let mut iter = self.tran.open(&self.desc.name, &self.chosen)?;
            iter.set_range(self.range.clone());
            self.iter = Some(iter);
        }
        Ok(self.iter.as_mut().and_then(|it| it.get(dir)))
    }

    pub(crate) fn output(&mut self, rec: Record) -> QueryResult<()> {
        self.tran.output(&self.desc.name, rec)?;
        Ok(())
    }

    pub(crate) fn explain(&self) -> String {
        format!("{}^({})", self.desc.name, self.chosen.join(","))
    }
}
