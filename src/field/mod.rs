//! Distributed field: one `Fab` for every box the calling worker owns.
//!
//! Ghost values are undefined until `fill_boundary` has run
//! after the last write to valid cells.

mod exchange;
mod fab;

pub use exchange::*;
pub use fab::*;

use crate::comm::*;
use crate::domain::*;
use crate::error::*;
use crate::geometry::*;
use crate::partition::*;
use std::sync::Arc;

pub struct Field<const GRID_DIMENSION: usize> {
    geometry: Geometry<GRID_DIMENSION>,
    partition: Arc<Partition<GRID_DIMENSION>>,
    rank: usize,
    n_comp: usize,
    n_ghost: usize,
    /// Owned boxes in canonical order, paired with their box index.
    fabs: Vec<(usize, Fab<GRID_DIMENSION>)>,
    plan: ExchangePlan<GRID_DIMENSION>,
}

impl<const GRID_DIMENSION: usize> Field<GRID_DIMENSION> {
    /// Allocate zeroed storage for every box of `partition` owned by `rank`.
    pub fn define(
        geometry: &Geometry<GRID_DIMENSION>,
        partition: Arc<Partition<GRID_DIMENSION>>,
        rank: usize,
        n_comp: usize,
        n_ghost: usize,
    ) -> HeatResult<Self> {
        profiling::scope!("field::define");
        let fabs = partition
            .local_indices(rank)
            .map(|i| {
                Fab::new(partition.boxes()[i], n_comp, n_ghost).map(|fab| (i, fab))
            })
            .collect::<HeatResult<Vec<_>>>()?;
        let plan = ExchangePlan::new(geometry, &partition, n_ghost, rank);
        log::debug!(
            "rank {rank}: defined field over {} of {} boxes, {} exchange tags",
            fabs.len(),
            partition.len(),
            plan.len()
        );
        Ok(Field {
            geometry: *geometry,
            partition,
            rank,
            n_comp,
            n_ghost,
            fabs,
            plan,
        })
    }

    /// A second field over the same boxes and ownership.
    pub fn define_like(&self) -> HeatResult<Self> {
        Self::define(
            &self.geometry,
            self.partition.clone(),
            self.rank,
            self.n_comp,
            self.n_ghost,
        )
    }

    pub fn geometry(&self) -> &Geometry<GRID_DIMENSION> {
        &self.geometry
    }

    pub fn partition(&self) -> &Arc<Partition<GRID_DIMENSION>> {
        &self.partition
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn n_comp(&self) -> usize {
        self.n_comp
    }

    pub fn n_ghost(&self) -> usize {
        self.n_ghost
    }

    /// Owned boxes with their box index, canonical order.
    pub fn fabs(&self) -> impl Iterator<Item = (usize, &Fab<GRID_DIMENSION>)> {
        self.fabs.iter().map(|(i, fab)| (*i, fab))
    }

    pub fn fabs_mut(
        &mut self,
    ) -> impl Iterator<Item = (usize, &mut Fab<GRID_DIMENSION>)> {
        self.fabs.iter_mut().map(|(i, fab)| (*i, fab))
    }

    pub fn fab(&self, box_index: usize) -> Option<&Fab<GRID_DIMENSION>> {
        self.local_slot(box_index).map(|s| &self.fabs[s].1)
    }

    pub fn fab_mut(
        &mut self,
        box_index: usize,
    ) -> Option<&mut Fab<GRID_DIMENSION>> {
        self.local_slot(box_index).map(move |s| &mut self.fabs[s].1)
    }

    fn local_slot(&self, box_index: usize) -> Option<usize> {
        self.fabs
            .binary_search_by_key(&box_index, |(i, _)| *i)
            .ok()
    }

    /// Same boxes, ownership, and shape.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.rank == other.rank
            && self.n_comp == other.n_comp
            && self.n_ghost == other.n_ghost
            && self.partition.as_ref() == other.partition.as_ref()
    }

    /// Set every value of every component, ghost cells included.
    pub fn set_val(&mut self, value: f64) {
        for (_, fab) in self.fabs.iter_mut() {
            for comp in fab.comps_mut() {
                comp.par_set_values(|_| value);
            }
        }
    }

    /// Fill ghost cells from the valid cells of neighboring boxes,
    /// wrapping around every periodic axis. Collective, every worker
    /// must call it. Sends go out first, then local copies happen,
    /// then we block on what our ghosts need from other workers.
    pub fn fill_boundary<C: Communicator>(&mut self, comm: &C) -> HeatResult<()> {
        profiling::scope!("field::fill_boundary");
        debug_assert_eq!(comm.rank(), self.rank);

        for peer in (0..comm.size()).filter(|p| *p != self.rank) {
            let mut message = Vec::new();
            for tag in self.plan.send_tags(peer) {
                let src = &self.fabs[self.slot(tag.src_box)].1;
                let region = tag.src_region();
                for comp in src.comps() {
                    comp.pack_region(&region, &mut message);
                }
            }
            if !message.is_empty() {
                comm.send(peer, message)?;
            }
        }

        let mut scratch = Vec::new();
        for tag in self.plan.local_tags() {
            let src_slot = self.slot(tag.src_box);
            let dst_slot = self.slot(tag.dst_box);
            let src_region = tag.src_region();
            for c in 0..self.n_comp {
                scratch.clear();
                self.fabs[src_slot].1.comp(c).pack_region(&src_region, &mut scratch);
                self.fabs[dst_slot]
                    .1
                    .comp_mut(c)
                    .unpack_region(&tag.dst_region, &scratch);
            }
        }

        for peer in (0..comm.size()).filter(|p| *p != self.rank) {
            let expected: usize = self
                .plan
                .recv_tags(peer)
                .map(|t| t.dst_region.buffer_size() * self.n_comp)
                .sum();
            if expected == 0 {
                continue;
            }
            let message = comm.recv(peer)?;
            if message.len() != expected {
                return Err(HeatError::Communication(format!(
                    "rank {} expected {expected} ghost values from rank {peer}, got {}",
                    self.rank,
                    message.len()
                )));
            }
            let mut cursor = 0;
            for tag in self.plan.recv_tags(peer) {
                let dst_slot = self.slot(tag.dst_box);
                for c in 0..self.n_comp {
                    cursor += self.fabs[dst_slot]
                        .1
                        .comp_mut(c)
                        .unpack_region(&tag.dst_region, &message[cursor..]);
                }
            }
        }
        Ok(())
    }

    fn slot(&self, box_index: usize) -> usize {
        match self.local_slot(box_index) {
            Some(s) => s,
            None => panic!("rank {} does not own box {box_index}", self.rank),
        }
    }

    /// Copy `n_comp` components starting at `src_comp` of `other`
    /// into components starting at `dst_comp`, over the valid cells
    /// grown by `n_ghost`.
    pub fn copy_from(
        &mut self,
        other: &Self,
        src_comp: usize,
        dst_comp: usize,
        n_comp: usize,
        n_ghost: usize,
    ) {
        profiling::scope!("field::copy_from");
        assert!(
            self.partition.same_layout(&other.partition) && self.rank == other.rank,
            "copy_from needs fields over the same partition"
        );
        assert!(src_comp + n_comp <= other.n_comp && dst_comp + n_comp <= self.n_comp);
        assert!(n_ghost <= self.n_ghost && n_ghost <= other.n_ghost);

        for ((_, dst), (_, src)) in self.fabs.iter_mut().zip(&other.fabs) {
            let region = dst.valid().grow(n_ghost as i32);
            for k in 0..n_comp {
                let src_domain = src.comp(src_comp + k);
                dst.comp_mut(dst_comp + k)
                    .par_set_region(&region, |c| src_domain.view(&c));
            }
        }
    }

    /// Per box sums of the valid cells of one component, owned boxes only.
    pub fn local_box_sums(&self, comp: usize) -> Vec<(usize, f64)> {
        self.fabs
            .iter()
            .map(|(i, fab)| (*i, fab.comp(comp).region_sum(fab.valid())))
            .collect()
    }

    /// Sum of the valid cells of one component over the whole domain.
    /// Box sums are combined in box order, so the result is bit for bit
    /// independent of how many workers share the boxes.
    pub fn sum<C: Communicator>(&self, comp: usize, comm: &C) -> HeatResult<f64> {
        let per_box = self.gather_box_values(comm, |fab| {
            fab.comp(comp).region_sum(fab.valid())
        })?;
        Ok(per_box.iter().sum())
    }

    pub fn max<C: Communicator>(&self, comp: usize, comm: &C) -> HeatResult<f64> {
        let per_box = self.gather_box_values(comm, |fab| {
            let d = fab.comp(comp);
            fab.valid().coord_iter().map(|c| d.view(&c)).fold(f64::MIN, f64::max)
        })?;
        Ok(per_box.into_iter().fold(f64::MIN, f64::max))
    }

    pub fn min<C: Communicator>(&self, comp: usize, comm: &C) -> HeatResult<f64> {
        let per_box = self.gather_box_values(comm, |fab| {
            let d = fab.comp(comp);
            fab.valid().coord_iter().map(|c| d.view(&c)).fold(f64::MAX, f64::min)
        })?;
        Ok(per_box.into_iter().fold(f64::MAX, f64::min))
    }

    /// One value per box, in box order, on every worker.
    fn gather_box_values<C, F>(&self, comm: &C, f: F) -> HeatResult<Vec<f64>>
    where
        C: Communicator,
        F: Fn(&Fab<GRID_DIMENSION>) -> f64,
    {
        let mut local = Vec::with_capacity(2 * self.fabs.len());
        for (i, fab) in &self.fabs {
            local.push(*i as f64);
            local.push(f(fab));
        }
        let mut per_box = vec![f64::NAN; self.partition.len()];
        for worker in comm.all_gather(local)? {
            for pair in worker.chunks_exact(2) {
                per_box[pair[0] as usize] = pair[1];
            }
        }
        Ok(per_box)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::util::*;

    fn setup<const GRID_DIMENSION: usize>(
        n_cell: i32,
        max: i32,
    ) -> Field<GRID_DIMENSION> {
        let geom = Geometry::<GRID_DIMENSION>::new(n_cell).unwrap();
        let p = Arc::new(partition(&geom, max, 1).unwrap());
        Field::define(&geom, p, 0, 1, 1).unwrap()
    }

    fn linear_value<const GRID_DIMENSION: usize>(c: &Coord<GRID_DIMENSION>) -> f64 {
        let mut v = 0.0;
        for d in 0..GRID_DIMENSION {
            v = v * 100.0 + c[d] as f64;
        }
        v
    }

    fn check_periodic_ghosts<const GRID_DIMENSION: usize>(n_cell: i32, max: i32) {
        let mut field = setup::<GRID_DIMENSION>(n_cell, max);
        field.set_val(-1.0);
        for (_, fab) in field.fabs_mut() {
            let valid = *fab.valid();
            fab.comp_mut(0).par_set_region(&valid, |c| linear_value(&c));
        }
        field.fill_boundary(&SingleWorker).unwrap();

        for (_, fab) in field.fabs() {
            for c in fab.grown().coord_iter() {
                let image = c.map(|x| x.rem_euclid(n_cell));
                assert_eq!(fab.comp(0).view(&c), linear_value(&image));
            }
        }
    }

    #[test]
    fn define_test() {
        let field = setup::<2>(8, 4);
        assert_eq!(field.fabs().count(), 4);
        assert!(field.fab(3).is_some());
        assert!(field.fab(4).is_none());

        let geom = Geometry::<2>::new(8).unwrap();
        let p = Arc::new(partition(&geom, 4, 3).unwrap());
        let f1 = Field::define(&geom, p, 1, 1, 1).unwrap();
        let owned: Vec<_> = f1.fabs().map(|(i, _)| i).collect();
        assert_eq!(owned, vec![1]);
    }

    #[test]
    fn periodic_ghosts_test() {
        check_periodic_ghosts::<2>(8, 8);
        check_periodic_ghosts::<2>(8, 4);
        check_periodic_ghosts::<2>(9, 2);
        check_periodic_ghosts::<3>(6, 6);
        check_periodic_ghosts::<3>(6, 3);
    }

    #[test]
    fn copy_from_test() {
        let mut a = setup::<2>(8, 4);
        let mut b = a.define_like().unwrap();
        a.set_val(3.0);
        b.set_val(-1.0);
        b.copy_from(&a, 0, 0, 1, 0);
        for (_, fab) in b.fabs() {
            for c in fab.grown().coord_iter() {
                let expected = if fab.valid().contains(&c) { 3.0 } else { -1.0 };
                assert_eq!(fab.comp(0).view(&c), expected);
            }
        }

        b.copy_from(&a, 0, 0, 1, 1);
        for (_, fab) in b.fabs() {
            assert!(fab.comp(0).buffer().iter().all(|v| *v == 3.0));
        }
    }

    #[test]
    fn reductions_test() {
        let mut field = setup::<2>(8, 4);
        field.set_val(0.5);
        for (_, fab) in field.fabs_mut() {
            let valid = *fab.valid();
            fab.comp_mut(0).par_set_region(&valid, |c| (c[0] + c[1]) as f64);
        }
        assert_eq!(field.sum(0, &SingleWorker).unwrap(), 448.0);
        assert_eq!(field.max(0, &SingleWorker).unwrap(), 14.0);
        assert_eq!(field.min(0, &SingleWorker).unwrap(), 0.0);
        assert_eq!(field.local_box_sums(0).len(), 4);
    }

    #[test]
    fn multi_worker_ghosts_test() {
        let n_cell = 10;
        let results = run_workers(3, |comm| {
            let geom = Geometry::<2>::new(n_cell).unwrap();
            let p = Arc::new(partition(&geom, 3, comm.size()).unwrap());
            let mut field = Field::define(&geom, p, comm.rank(), 2, 1).unwrap();
            field.set_val(-1.0);
            for (_, fab) in field.fabs_mut() {
                let valid = *fab.valid();
                fab.comp_mut(0).par_set_region(&valid, |c| linear_value(&c));
                fab.comp_mut(1).par_set_region(&valid, |c| -linear_value(&c));
            }
            field.fill_boundary(&comm).unwrap();

            let mut ok = true;
            for (_, fab) in field.fabs() {
                for c in fab.grown().coord_iter() {
                    let image = c.map(|x| x.rem_euclid(n_cell));
                    ok &= fab.comp(0).view(&c) == linear_value(&image);
                    ok &= fab.comp(1).view(&c) == -linear_value(&image);
                }
            }
            let sum = field.sum(0, &comm).unwrap();
            (ok, sum)
        });
        let expected_sum: f64 = (0..10)
            .flat_map(|i| (0..10).map(move |j| (i * 100 + j) as f64))
            .sum();
        for (ok, sum) in results {
            assert!(ok);
            assert_eq!(sum, expected_sum);
        }
    }
}
