//! Worker communication.
//!
//! A `Communicator` is one worker's endpoint: its rank, the worker count,
//! ordered point to point messages, and collective barriers.
//! Messages between a given pair of workers arrive in send order.
//! Every collective must be entered by all workers in the same order.

mod single;
mod thread_comm;

pub use single::*;
pub use thread_comm::*;

use crate::error::*;

pub trait Communicator: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Never blocks.
    fn send(&self, dest: usize, data: Vec<f64>) -> HeatResult<()>;

    /// Blocks until the next message from `source` is available.
    fn recv(&self, source: usize) -> HeatResult<Vec<f64>>;

    /// Block until every worker has entered the barrier.
    /// Fails instead of hanging when a peer has gone away.
    fn barrier(&self) -> HeatResult<()> {
        self.all_gather(Vec::new()).map(|_| ())
    }

    fn is_root(&self) -> bool {
        self.rank() == 0
    }

    /// Logical AND of `ok` over every worker, every worker gets the same answer.
    fn all_agree(&self, ok: bool) -> HeatResult<bool> {
        let flags = self.all_gather(vec![if ok { 1.0 } else { 0.0 }])?;
        Ok(flags.iter().all(|f| f[0] != 0.0))
    }

    /// Every worker's `data`, indexed by rank, on every worker.
    fn all_gather(&self, data: Vec<f64>) -> HeatResult<Vec<Vec<f64>>> {
        let size = self.size();
        if size == 1 {
            return Ok(vec![data]);
        }
        if self.is_root() {
            let mut gathered = Vec::with_capacity(size);
            gathered.push(data);
            for source in 1..size {
                gathered.push(self.recv(source)?);
            }
            let flat: Vec<f64> = gathered
                .iter()
                .flat_map(|g| std::iter::once(g.len() as f64).chain(g.iter().copied()))
                .collect();
            for dest in 1..size {
                self.send(dest, flat.clone())?;
            }
            Ok(gathered)
        } else {
            self.send(0, data)?;
            let flat = self.recv(0)?;
            unflatten(&flat, size)
        }
    }
}

/// Inverse of the length prefixed packing in `all_gather`.
fn unflatten(flat: &[f64], size: usize) -> HeatResult<Vec<Vec<f64>>> {
    let mut result = Vec::with_capacity(size);
    let mut cursor = 0;
    while cursor < flat.len() {
        let len = flat[cursor] as usize;
        let end = cursor + 1 + len;
        if end > flat.len() {
            return Err(HeatError::Communication(format!(
                "gather message truncated, expected {end} values, got {}",
                flat.len()
            )));
        }
        result.push(flat[cursor + 1..end].to_vec());
        cursor = end;
    }
    if result.len() != size {
        return Err(HeatError::Communication(format!(
            "gather message held {} entries for {size} workers",
            result.len()
        )));
    }
    Ok(result)
}
